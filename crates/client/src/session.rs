//! Session manager: the state machine over identity presence.
//!
//! Owns the single authenticated proxy. The proxy is replaced, never
//! mutated, on every identity change; callers fetch the current reference
//! at call time instead of caching one across identity boundaries.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use vickrey_types::Identity;

use crate::channel::ChannelFactory;
use crate::error::ClientError;
use crate::service::AuctionService;

/// Observable session phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No identity bound; only read-only operations are permitted.
    Anonymous,
    /// Identity available, authenticated channel still being built.
    Authenticating,
    /// Identity bound and authenticated proxy cached.
    Authenticated,
}

enum Phase {
    Anonymous,
    Authenticating { identity: Identity },
    Authenticated {
        identity: Identity,
        proxy: Arc<AuctionService>,
    },
}

struct Inner {
    phase: Phase,
    /// Bumped on every transition; a channel build commits only if the
    /// epoch it started under is still current.
    epoch: u64,
}

/// Owns the current identity and the proxy bound to it.
pub struct SessionManager {
    factory: ChannelFactory,
    inner: RwLock<Inner>,
}

impl SessionManager {
    pub fn new(factory: ChannelFactory) -> Self {
        Self {
            factory,
            inner: RwLock::new(Inner {
                phase: Phase::Anonymous,
                epoch: 0,
            }),
        }
    }

    pub fn state(&self) -> SessionState {
        match self.inner.read().phase {
            Phase::Anonymous => SessionState::Anonymous,
            Phase::Authenticating { .. } => SessionState::Authenticating,
            Phase::Authenticated { .. } => SessionState::Authenticated,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.state() == SessionState::Authenticated
    }

    /// Identity observed most recently, whether or not its channel build has
    /// completed yet.
    pub fn current_identity(&self) -> Option<Identity> {
        match &self.inner.read().phase {
            Phase::Anonymous => None,
            Phase::Authenticating { identity } => Some(identity.clone()),
            Phase::Authenticated { identity, .. } => Some(identity.clone()),
        }
    }

    /// Identity of a fully authenticated session, or `NotAuthenticated`.
    pub fn authenticated_identity(&self) -> Result<Identity, ClientError> {
        match &self.inner.read().phase {
            Phase::Authenticated { identity, .. } => Ok(identity.clone()),
            _ => Err(ClientError::NotAuthenticated),
        }
    }

    /// The cached authenticated proxy. Always bound to the most recently
    /// observed identity; never a superseded one.
    pub fn authenticated_proxy(&self) -> Result<Arc<AuctionService>, ClientError> {
        match &self.inner.read().phase {
            Phase::Authenticated { proxy, .. } => Ok(Arc::clone(proxy)),
            _ => Err(ClientError::NotAuthenticated),
        }
    }

    /// Bind a freshly observed identity: build an authenticated channel and
    /// cache a proxy over it, discarding whatever proxy was cached before.
    ///
    /// If the identity changes again while the build is in flight, the stale
    /// build result is dropped instead of committed. A failed build leaves
    /// the session anonymous.
    pub async fn bind_identity(&self, identity: Identity) -> Result<(), ClientError> {
        let epoch = {
            let mut inner = self.inner.write();
            inner.epoch += 1;
            inner.phase = Phase::Authenticating {
                identity: identity.clone(),
            };
            inner.epoch
        };

        match self.factory.build(Some(&identity)).await {
            Ok(channel) => {
                let proxy = Arc::new(AuctionService::new(channel));
                let mut inner = self.inner.write();
                if inner.epoch != epoch {
                    debug!(
                        principal = %identity.principal,
                        "identity superseded during channel build, discarding proxy"
                    );
                    return Err(ClientError::Authentication(
                        "identity changed while signing in".into(),
                    ));
                }
                info!(principal = %identity.principal, "session authenticated");
                inner.phase = Phase::Authenticated { identity, proxy };
                Ok(())
            }
            Err(err) => {
                let mut inner = self.inner.write();
                if inner.epoch == epoch {
                    inner.phase = Phase::Anonymous;
                }
                Err(ClientError::Authentication(err.to_string()))
            }
        }
    }

    /// Identity disconnected: drop the session and its proxy.
    pub fn clear_identity(&self) {
        let mut inner = self.inner.write();
        inner.epoch += 1;
        inner.phase = Phase::Anonymous;
        debug!("session cleared");
    }

    /// Tear down the session because the remote rejected its credential.
    /// Returns whether a session was actually dropped, so the transition
    /// happens (and is reported) at most once per expiry.
    pub fn force_sign_out(&self) -> bool {
        let mut inner = self.inner.write();
        if matches!(inner.phase, Phase::Anonymous) {
            return false;
        }
        inner.epoch += 1;
        inner.phase = Phase::Anonymous;
        info!("session credential rejected by the remote, signed out");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Endpoint, Environment};
    use vickrey_types::{Principal, SessionToken};

    fn offline_factory() -> ChannelFactory {
        // Production skips the trust bootstrap, so channel builds succeed
        // without a live endpoint.
        ChannelFactory::with_endpoint(
            Environment::Production,
            Endpoint::new("http://127.0.0.1:1", "auc-backend"),
        )
    }

    fn identity(seed: &str) -> Identity {
        Identity::new(
            Principal::self_authenticating(seed.as_bytes()),
            SessionToken::new(format!("token-{seed}")),
        )
    }

    #[test]
    fn starts_anonymous() {
        let session = SessionManager::new(offline_factory());
        assert_eq!(session.state(), SessionState::Anonymous);
        assert!(session.authenticated_identity().is_err());
        assert!(session.authenticated_proxy().is_err());
    }

    #[test]
    fn force_sign_out_without_session_is_a_no_op() {
        let session = SessionManager::new(offline_factory());
        assert!(!session.force_sign_out());
    }

    #[tokio::test]
    async fn bind_then_clear_round_trip() {
        let session = SessionManager::new(offline_factory());
        let id = identity("alice");

        session.bind_identity(id.clone()).await.expect("bind");
        assert!(session.is_authenticated());
        assert_eq!(session.authenticated_identity().unwrap(), id);
        assert_eq!(
            session.authenticated_proxy().unwrap().bound_principal(),
            Some(id.principal)
        );

        session.clear_identity();
        assert_eq!(session.state(), SessionState::Anonymous);
        assert!(session.authenticated_proxy().is_err());
    }

    #[tokio::test]
    async fn rebinding_replaces_the_proxy() {
        let session = SessionManager::new(offline_factory());
        let alice = identity("alice");
        let bob = identity("bob");

        session.bind_identity(alice.clone()).await.expect("bind a");
        session.bind_identity(bob.clone()).await.expect("bind b");

        let proxy = session.authenticated_proxy().unwrap();
        assert_eq!(proxy.bound_principal(), Some(bob.principal));
    }

    #[tokio::test]
    async fn force_sign_out_drops_session_once() {
        let session = SessionManager::new(offline_factory());
        session.bind_identity(identity("alice")).await.expect("bind");

        assert!(session.force_sign_out());
        assert!(!session.force_sign_out());
        assert_eq!(session.state(), SessionState::Anonymous);
    }
}
