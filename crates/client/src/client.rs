//! Orchestrated auction operations and the local view of auction state.
//!
//! Every mutating operation runs the same envelope: authenticated
//! precondition, a channel built fresh for this call against the identity
//! active right now, the validated remote call, then a mandatory refetch of
//! the auction list before control returns. Local state is a read-through
//! cache of the remote source of truth; it is never advanced optimistically.

use std::sync::Arc;

use jsonrpsee::core::client::Error as RpcError;
use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use vickrey_types::{Auction, Identity, Settlement};

use crate::channel::ChannelFactory;
use crate::config::{Endpoint, Environment};
use crate::error::{is_authorization_expiry, remote_error_message, ClientError};
use crate::service::AuctionService;
use crate::session::SessionManager;

/// Shortest auction lifetime the client will ask for.
pub const MIN_AUCTION_DURATION_SECS: u64 = 60;

/// The auction client: session handling, orchestrated mutations, and the
/// last-fetched auction snapshot.
pub struct AuctionClient {
    factory: ChannelFactory,
    session: SessionManager,
    auctions: RwLock<Vec<Auction>>,
    last_error: RwLock<Option<String>>,
}

impl AuctionClient {
    /// Client against the environment's default endpoint.
    pub fn new(environment: Environment) -> Self {
        Self::from_factory(ChannelFactory::new(environment))
    }

    /// Client against an explicit endpoint.
    pub fn with_endpoint(environment: Environment, endpoint: Endpoint) -> Self {
        Self::from_factory(ChannelFactory::with_endpoint(environment, endpoint))
    }

    fn from_factory(factory: ChannelFactory) -> Self {
        Self {
            session: SessionManager::new(factory.clone()),
            factory,
            auctions: RwLock::new(Vec::new()),
            last_error: RwLock::new(None),
        }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    /// Last successfully fetched auction snapshot.
    pub fn current_auctions(&self) -> Vec<Auction> {
        self.auctions.read().clone()
    }

    /// Most recent surfaced failure, if the user has not dismissed it.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    pub fn clear_error(&self) {
        *self.last_error.write() = None;
    }

    // ============ Session lifecycle ============

    /// Bind a connected identity and refresh the auction view over the new
    /// session. A failed channel build leaves the session anonymous.
    pub async fn sign_in(&self, identity: Identity) -> Result<(), ClientError> {
        self.session
            .bind_identity(identity)
            .await
            .map_err(|err| self.surface(err))?;
        if let Err(err) = self.refresh_auctions().await {
            warn!(error = %err, "post-sign-in refresh failed");
        }
        Ok(())
    }

    /// Drop the session on identity disconnect. The auction snapshot is
    /// retained; it was valid when fetched and stays a read-only copy.
    pub fn sign_out(&self) {
        self.session.clear_identity();
    }

    /// React to an identity-change notification from the provider.
    pub async fn handle_identity_change(&self, identity: Option<Identity>) {
        match identity {
            Some(identity) => {
                if let Err(err) = self.sign_in(identity).await {
                    warn!(error = %err, "identity bind failed");
                }
            }
            None => self.sign_out(),
        }
    }

    /// Drive `handle_identity_change` from a provider subscription.
    pub fn spawn_identity_watcher(
        self: Arc<Self>,
        mut rx: watch::Receiver<Option<Identity>>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let next = rx.borrow_and_update().clone();
                self.handle_identity_change(next).await;
            }
        })
    }

    // ============ Read path ============

    /// Fetch the authoritative auction list and replace the local snapshot.
    ///
    /// Runs over a channel bound to the current identity when one is bound,
    /// anonymously otherwise. Concurrent refreshes race; the last response
    /// to land wins, which is fine for an idempotent read.
    pub async fn refresh_auctions(&self) -> Result<(), ClientError> {
        let identity = self.session.current_identity();
        let channel = self
            .factory
            .build(identity.as_ref())
            .await
            .map_err(|err| self.surface(ClientError::from(err)))?;
        let service = AuctionService::new(channel);

        match service.list_active_auctions().await {
            Ok(auctions) => {
                *self.auctions.write() = auctions;
                Ok(())
            }
            Err(err) => Err(self.classify(err)),
        }
    }

    // ============ Mutating operations ============

    /// Create an auction; returns the newly assigned identifier.
    pub async fn create_auction(
        &self,
        title: &str,
        description: &str,
        duration_secs: u64,
        reserve_price: u64,
    ) -> Result<u64, ClientError> {
        let identity = self.require_authenticated()?;

        if title.trim().is_empty() {
            return Err(self.surface(ClientError::InvalidArgument("title must not be empty")));
        }
        if duration_secs < MIN_AUCTION_DURATION_SECS {
            return Err(self.surface(ClientError::InvalidArgument(
                "duration must be at least 60 seconds",
            )));
        }
        if reserve_price < 1 {
            return Err(self.surface(ClientError::InvalidArgument(
                "reserve price must be at least 1",
            )));
        }

        let service = self.fresh_service_for(&identity).await?;
        let auction_id = service
            .create_auction(title, description, duration_secs, reserve_price)
            .await
            .map_err(|err| self.classify(err))?;
        info!(auction_id, "auction created");

        self.refetch_after_mutation().await;
        Ok(auction_id)
    }

    /// Place a bid. `Ok(false)` is a normal negative outcome (below reserve,
    /// auction not active): nothing is surfaced and no session state moves.
    pub async fn place_bid(&self, auction_id: u64, amount: u64) -> Result<bool, ClientError> {
        let identity = self.require_authenticated()?;

        if amount < 1 {
            return Err(self.surface(ClientError::InvalidArgument("bid must be at least 1")));
        }

        let service = self.fresh_service_for(&identity).await?;
        let accepted = service
            .place_bid(auction_id, amount)
            .await
            .map_err(|err| self.classify(err))?;
        info!(auction_id, amount, accepted, "bid acknowledged");

        self.refetch_after_mutation().await;
        Ok(accepted)
    }

    /// End an auction. `Ok(None)` means no qualifying winner; informational,
    /// not a failure.
    pub async fn end_auction(&self, auction_id: u64) -> Result<Option<Settlement>, ClientError> {
        let identity = self.require_authenticated()?;

        let service = self.fresh_service_for(&identity).await?;
        let settlement = service
            .end_auction(auction_id)
            .await
            .map_err(|err| self.classify(err))?;
        match &settlement {
            Some(s) => info!(auction_id, winner = %s.winner, price = s.price, "auction settled"),
            None => info!(auction_id, "auction ended with no qualifying winner"),
        }

        self.refetch_after_mutation().await;
        Ok(settlement)
    }

    // ============ Envelope pieces ============

    /// Mutating-call precondition: an authenticated session, checked before
    /// any argument validation or channel work.
    fn require_authenticated(&self) -> Result<Identity, ClientError> {
        self.session
            .authenticated_identity()
            .map_err(|err| self.surface(err))
    }

    /// Channel freshness: build a channel for this one call, bound to the
    /// identity active now. The session's cached proxy is not used here; it
    /// may predate a credential refresh.
    async fn fresh_service_for(&self, identity: &Identity) -> Result<AuctionService, ClientError> {
        let channel = self
            .factory
            .build(Some(identity))
            .await
            .map_err(|err| self.surface(ClientError::Authentication(err.to_string())))?;
        Ok(AuctionService::new(channel))
    }

    /// Mandatory post-acknowledgment refetch. Runs exactly once per
    /// successful mutation, strictly after the remote acknowledged it. A
    /// refetch failure does not undo the mutation; it is surfaced and the
    /// stale snapshot stands until the next refresh.
    async fn refetch_after_mutation(&self) {
        if let Err(err) = self.refresh_auctions().await {
            warn!(error = %err, "post-mutation refresh failed");
        }
    }

    /// Classify a remote failure. An authorization-expiry signature tears
    /// the session down (once) so the user is compelled to re-authenticate;
    /// everything else is surfaced verbatim with the session intact.
    fn classify(&self, err: RpcError) -> ClientError {
        let message = remote_error_message(&err);
        let classified = if is_authorization_expiry(&message) {
            self.session.force_sign_out();
            ClientError::AuthorizationExpired
        } else {
            ClientError::RemoteCall(message)
        };
        self.surface(classified)
    }

    /// Record a failure for the UI surface and hand it back to the caller.
    fn surface(&self, err: ClientError) -> ClientError {
        *self.last_error.write() = Some(err.to_string());
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vickrey_types::{Principal, SessionToken};

    fn offline_client() -> AuctionClient {
        // Production skips the trust bootstrap; nothing here touches the
        // network until a call is issued.
        AuctionClient::with_endpoint(
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

    #[tokio::test]
    async fn mutations_require_authentication() {
        let client = offline_client();
        let err = client.create_auction("Vase", "Ming era", 3600, 100).await;
        assert!(matches!(err, Err(ClientError::NotAuthenticated)));

        let err = client.place_bid(1, 50).await;
        assert!(matches!(err, Err(ClientError::NotAuthenticated)));

        let err = client.end_auction(1).await;
        assert!(matches!(err, Err(ClientError::NotAuthenticated)));

        assert!(client.last_error().is_some());
    }

    #[tokio::test]
    async fn argument_contracts_are_checked_before_any_call() {
        let client = offline_client();
        client
            .session()
            .bind_identity(identity("alice"))
            .await
            .expect("offline bind");

        let err = client.create_auction("", "desc", 3600, 100).await;
        assert!(matches!(err, Err(ClientError::InvalidArgument(_))));

        let err = client.create_auction("Vase", "desc", 59, 100).await;
        assert!(matches!(err, Err(ClientError::InvalidArgument(_))));

        let err = client.create_auction("Vase", "desc", 3600, 0).await;
        assert!(matches!(err, Err(ClientError::InvalidArgument(_))));

        let err = client.place_bid(1, 0).await;
        assert!(matches!(err, Err(ClientError::InvalidArgument(_))));

        // Rejected locally: the session is untouched.
        assert!(client.is_authenticated());
    }

    #[tokio::test]
    async fn clear_error_dismisses_the_surface() {
        let client = offline_client();
        let _ = client.place_bid(1, 10).await;
        assert!(client.last_error().is_some());
        client.clear_error();
        assert!(client.last_error().is_none());
    }
}
