use std::sync::{PoisonError, RwLock};

/// Source of the viewer's session token.
///
/// The controller asks it whether anyone is signed in before fetching; the
/// HTTP backend attaches its token and clears it when the backend rejects it.
pub trait SessionProvider: Send + Sync {
    fn token(&self) -> Option<String>;
    fn clear(&self);
}

/// Session held in memory, set by whatever performed the sign-in.
#[derive(Debug, Default)]
pub struct MemorySession {
    token: RwLock<Option<String>>,
}

impl MemorySession {
    pub fn new<S: Into<String>>(token: S) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }

    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn set<S: Into<String>>(&self, token: S) {
        *self
            .token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(token.into());
    }
}

impl SessionProvider for MemorySession {
    fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .filter(|t| !t.is_empty())
    }

    fn clear(&self) {
        log::debug!("clearing session token");
        *self
            .token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }
}
