//! Session token store
//!
//! Replaces ambient token globals with an explicit handle that is injected
//! into the request layer and the scanner. Backed by a watch channel so
//! readers never block and observers can react to sign-in/sign-out.

use std::sync::Arc;

use atelier_model::SessionTokens;
use tokio::sync::watch;
use tracing::debug;

/// Shared, cloneable handle to the current session tokens.
#[derive(Clone, Debug)]
pub struct SessionStore {
    sender: Arc<watch::Sender<Option<SessionTokens>>>,
    receiver: watch::Receiver<Option<SessionTokens>>,
}

impl SessionStore {
    /// Create an empty (signed-out) store
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(None);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    /// Create a store that starts signed in
    pub fn with_tokens(tokens: SessionTokens) -> Self {
        let store = Self::new();
        store.set(tokens);
        store
    }

    /// Current tokens, if signed in
    pub fn get(&self) -> Option<SessionTokens> {
        self.receiver.borrow().clone()
    }

    /// Replace the tokens (login or refresh)
    pub fn set(&self, tokens: SessionTokens) {
        debug!(
            "[SessionStore] Tokens updated (refreshable: {})",
            tokens.can_refresh()
        );
        self.sender.send_replace(Some(tokens));
    }

    /// Drop the session (logout or unrecoverable refresh failure)
    pub fn clear(&self) {
        if self.sender.send_replace(None).is_some() {
            debug!("[SessionStore] Session cleared");
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.receiver
            .borrow()
            .as_ref()
            .map(|tokens| tokens.access_token.clone())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.receiver
            .borrow()
            .as_ref()
            .and_then(|tokens| tokens.refresh_token.clone())
            .filter(|token| !token.is_empty())
    }

    /// `Authorization` header value for the current session
    pub fn bearer(&self) -> Option<String> {
        self.receiver.borrow().as_ref().map(SessionTokens::bearer)
    }

    pub fn is_authenticated(&self) -> bool {
        self.receiver.borrow().is_some()
    }

    /// Subscribe to session changes
    pub fn subscribe(&self) -> watch::Receiver<Option<SessionTokens>> {
        self.sender.subscribe()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_clear_round_trip() {
        let store = SessionStore::new();
        assert!(!store.is_authenticated());
        assert_eq!(store.bearer(), None);

        store.set(SessionTokens::new("access-1", Some("refresh-1".into())));
        assert!(store.is_authenticated());
        assert_eq!(store.access_token().as_deref(), Some("access-1"));
        assert_eq!(store.refresh_token().as_deref(), Some("refresh-1"));
        assert_eq!(store.bearer().as_deref(), Some("Bearer access-1"));

        store.clear();
        assert!(!store.is_authenticated());
        assert_eq!(store.get(), None);
    }

    #[test]
    fn clones_share_state() {
        let store = SessionStore::new();
        let other = store.clone();
        store.set(SessionTokens::new("shared", None));
        assert_eq!(other.access_token().as_deref(), Some("shared"));
        assert_eq!(other.refresh_token(), None);
    }

    #[tokio::test]
    async fn subscribers_observe_sign_out() {
        let store = SessionStore::with_tokens(SessionTokens::new("a", None));
        let mut rx = store.subscribe();
        store.clear();
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_none());
    }
}
