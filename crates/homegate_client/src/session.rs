//! Session token holder.
//!
//! The token lives in a `watch` channel so the push channel can follow
//! login and logout without polling. Logout only discards the token; the
//! server keeps honouring it until it expires.

use tokio::sync::watch;
use tracing::info;

/// Holds the current session token, if any.
#[derive(Debug)]
pub struct Session {
    token: watch::Sender<Option<String>>,
}

impl Session {
    /// Creates a logged-out session.
    pub fn new() -> Self {
        let (token, _) = watch::channel(None);
        Self { token }
    }

    /// Stores a freshly issued token.
    pub fn set_token(&self, token: impl Into<String>) {
        let token = token.into();
        self.token.send_modify(|current| *current = Some(token));
        info!("session token stored");
    }

    /// Discards the token.
    pub fn clear(&self) {
        let was_logged_in = self.token.send_if_modified(|current| current.take().is_some());
        if was_logged_in {
            info!("session token discarded");
        }
    }

    /// Returns a copy of the current token.
    pub fn token(&self) -> Option<String> {
        self.token.borrow().clone()
    }

    /// Returns true if a token is held.
    pub fn is_logged_in(&self) -> bool {
        self.token.borrow().is_some()
    }

    /// Value for the `authorization` header: the token, or empty.
    pub fn authorization(&self) -> String {
        self.token().unwrap_or_default()
    }

    /// Watches token changes.
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.token.subscribe()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
