use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::{Result, ViewError};

pub const API_BASE_ENV: &str = "PROFILE_VIEW_API_BASE";
pub const TIMEOUT_ENV: &str = "PROFILE_VIEW_TIMEOUT_SECS";
const DEFAULT_API_BASE: &str = "http://localhost:5000/api/";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Where the backend lives and how long a single request may take.
///
/// The timeout is the only timeout in the crate; a request that exceeds it
/// fails like any other transport error.
#[derive(Clone, Debug, Deserialize)]
pub struct BackendConfig {
    pub base_url: Url,
    #[serde(default = "default_timeout", with = "secs")]
    pub timeout: Duration,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for BackendConfig {
    /// Local development backend, 10 second timeout.
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_API_BASE)
                .expect("default api base is a valid url"),
            timeout: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl BackendConfig {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: with_trailing_slash(Url::parse(base_url)?)?,
            ..Self::default()
        })
    }

    /// Preset for slow links: 30 second timeout.
    pub fn patient(base_url: &str) -> Result<Self> {
        Ok(Self {
            timeout: Duration::from_secs(30),
            ..Self::new(base_url)?
        })
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let mut config: Self = serde_json::from_str(raw)?;
        config.base_url = with_trailing_slash(config.base_url)?;
        Ok(config)
    }

    /// Defaults overridden by `PROFILE_VIEW_API_BASE` and
    /// `PROFILE_VIEW_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var(API_BASE_ENV) {
            Ok(base) => Self::new(&base)?,
            Err(_) => Self::default(),
        };
        if let Ok(secs) = std::env::var(TIMEOUT_ENV) {
            let secs = secs.trim().parse::<u64>().map_err(|_| {
                ViewError::Config(format!("{} is not a number", TIMEOUT_ENV))
            })?;
            config.timeout = Duration::from_secs(secs);
        }
        log::info!("[config] using api base {}", config.base_url);
        Ok(config)
    }
}

fn with_trailing_slash(mut url: Url) -> Result<Url> {
    if url.cannot_be_a_base() {
        return Err(ViewError::Config(format!("{} cannot be a base url", url)));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn default_timeout() -> Duration {
    Duration::from_secs(DEFAULT_TIMEOUT_SECS)
}

fn default_user_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
