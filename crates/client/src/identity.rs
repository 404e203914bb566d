//! Identity provider seam.
//!
//! The wallet that actually mints credentials is an external collaborator;
//! this module only defines the shape the client consumes: a current-identity
//! accessor plus change notifications.

use tokio::sync::watch;

use vickrey_types::Identity;

/// Source of authenticated identities and identity-change notifications.
pub trait IdentityProvider: Send + Sync {
    /// Identity currently held by the provider, if connected.
    fn current(&self) -> Option<Identity>;

    /// Subscribe to identity changes. Receivers observe connects as
    /// `Some(identity)` and disconnects as `None`.
    fn subscribe(&self) -> watch::Receiver<Option<Identity>>;
}

/// In-memory provider for tests and the CLI, where the credential arrives
/// out of band (issued by the ledger's development identity endpoint).
pub struct MemoryIdentityProvider {
    tx: watch::Sender<Option<Identity>>,
}

impl MemoryIdentityProvider {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    /// Provider that starts out already connected.
    pub fn connected(identity: Identity) -> Self {
        let (tx, _) = watch::channel(Some(identity));
        Self { tx }
    }

    pub fn connect(&self, identity: Identity) {
        self.tx.send_replace(Some(identity));
    }

    pub fn disconnect(&self) {
        self.tx.send_replace(None);
    }
}

impl Default for MemoryIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider for MemoryIdentityProvider {
    fn current(&self) -> Option<Identity> {
        self.tx.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vickrey_types::{Principal, SessionToken};

    fn identity() -> Identity {
        Identity::new(
            Principal::self_authenticating(b"wallet"),
            SessionToken::new("token"),
        )
    }

    #[tokio::test]
    async fn connect_and_disconnect_notify_subscribers() {
        let provider = MemoryIdentityProvider::new();
        let mut rx = provider.subscribe();
        assert!(provider.current().is_none());

        provider.connect(identity());
        rx.changed().await.expect("connect notification");
        assert_eq!(rx.borrow_and_update().clone(), Some(identity()));
        assert_eq!(provider.current(), Some(identity()));

        provider.disconnect();
        rx.changed().await.expect("disconnect notification");
        assert!(rx.borrow_and_update().is_none());
        assert!(provider.current().is_none());
    }
}
