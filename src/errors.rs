use thiserror::Error;

pub type Result<T> = std::result::Result<T, ViewError>;

#[derive(Error, Debug)]
pub enum ViewError {
    #[error("no subject specified")]
    NoSubject,
    #[error("sign in required")]
    SignInRequired,
    #[error("identity record carries no usable id")]
    MalformedIdentity,
    #[error("user profile not found")]
    NotFound,
    #[error("could not identify the current user")]
    Unauthenticated,
    #[error("connection request conflicts: {0}")]
    Conflict(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("operation superseded")]
    Superseded,
    #[error("Parsing error")]
    Parse,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ViewError {
    /// Text shown in the page-level error slot.
    pub fn page_message(&self) -> String {
        match self {
            Self::Transport(_) | Self::Parse | Self::Other(_) => {
                "Failed to load user profile.".to_owned()
            }
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for ViewError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for ViewError {
    fn from(_: serde_json::Error) -> Self {
        Self::Parse
    }
}

impl From<url::ParseError> for ViewError {
    fn from(e: url::ParseError) -> Self {
        Self::Config(e.to_string())
    }
}
