//! Mock auction ledger for local development and tests.
//!
//! This provides a JSON-RPC server simulating the remote execution
//! environment the client talks to: the auction engine (bid qualification,
//! second-price settlement), the trust bootstrap endpoint, and a
//! development identity issuer standing in for a wallet.

pub mod error;
pub mod handlers;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use jsonrpsee::core::async_trait;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObjectOwned;
use parking_lot::RwLock;
use tracing::info;

use vickrey_types::{
    Auction, CreateAuctionParams, EndAuctionParams, Identity, PlaceBidParams, Principal,
    SessionToken, Settlement, DEFAULT_SERVICE_ID,
};

use crate::state::LedgerState;

/// RPC API of the mock ledger. The `auction_*`, `query_*` and `chain_*`
/// methods mirror the production gateway; `auth_*` and `admin_*` exist for
/// development and tests.
#[rpc(server)]
pub trait LedgerApi {
    // ============ Query Methods ============

    /// All auctions with their authoritative lifecycle state.
    #[method(name = "query_listActiveAuctions")]
    async fn list_active_auctions(&self) -> Result<Vec<Auction>, ErrorObjectOwned>;

    /// Root of trust for the given hosted service.
    #[method(name = "chain_getRootKey")]
    async fn get_root_key(&self, service: String) -> Result<String, ErrorObjectOwned>;

    // ============ Auction Methods ============

    /// Create a new auction.
    #[method(name = "auction_create")]
    async fn create_auction(&self, params: CreateAuctionParams) -> Result<u64, ErrorObjectOwned>;

    /// Place a bid; `false` means the engine rejected it.
    #[method(name = "auction_placeBid")]
    async fn place_bid(&self, params: PlaceBidParams) -> Result<bool, ErrorObjectOwned>;

    /// End an auction; `None` means no qualifying winner.
    #[method(name = "auction_end")]
    async fn end_auction(
        &self,
        params: EndAuctionParams,
    ) -> Result<Option<Settlement>, ErrorObjectOwned>;

    // ============ Identity Methods ============

    /// Issue a development identity, minting a principal when none given.
    #[method(name = "auth_connect")]
    async fn connect(&self, principal: Option<String>) -> Result<Identity, ErrorObjectOwned>;

    /// Drop a session.
    #[method(name = "auth_disconnect")]
    async fn disconnect(&self, token: String) -> Result<bool, ErrorObjectOwned>;

    // ============ Admin Methods ============

    /// Set the simulated timestamp (for testing time-dependent logic).
    #[method(name = "admin_setTimestamp")]
    async fn set_timestamp(&self, timestamp: u64) -> Result<bool, ErrorObjectOwned>;

    /// Invalidate a session so calls presenting it are rejected.
    #[method(name = "admin_expireSession")]
    async fn expire_session(&self, token: String) -> Result<bool, ErrorObjectOwned>;

    /// How many times a wire method has been invoked.
    #[method(name = "admin_methodCallCount")]
    async fn method_call_count(&self, method: String) -> Result<u64, ErrorObjectOwned>;
}

/// Implementation of the mock ledger RPC server.
pub struct LedgerServer {
    state: Arc<RwLock<LedgerState>>,
}

impl LedgerServer {
    pub fn new() -> Self {
        Self::with_service(DEFAULT_SERVICE_ID)
    }

    pub fn with_service(service: &str) -> Self {
        Self {
            state: Arc::new(RwLock::new(LedgerState::new(service))),
        }
    }

    fn rpc_error(msg: &str) -> ErrorObjectOwned {
        ErrorObjectOwned::owned(-32000, msg.to_string(), None::<()>)
    }
}

impl Default for LedgerServer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerApiServer for LedgerServer {
    async fn list_active_auctions(&self) -> Result<Vec<Auction>, ErrorObjectOwned> {
        let mut state = self.state.write();
        state.record_call("query_listActiveAuctions");
        Ok(handlers::handle_list(&state))
    }

    async fn get_root_key(&self, service: String) -> Result<String, ErrorObjectOwned> {
        let mut state = self.state.write();
        state.record_call("chain_getRootKey");
        handlers::handle_root_key(&state, &service).map_err(|e| Self::rpc_error(&e.to_string()))
    }

    async fn create_auction(&self, params: CreateAuctionParams) -> Result<u64, ErrorObjectOwned> {
        let mut state = self.state.write();
        state.record_call("auction_create");

        let owner = handlers::authorize(&state, &params.token)
            .map_err(|e| Self::rpc_error(&e.to_string()))?;
        let auction_id = handlers::handle_create_auction(
            &mut state,
            owner,
            &params.title,
            &params.description,
            params.duration_secs,
            params.reserve_price,
        )
        .map_err(|e| Self::rpc_error(&e.to_string()))?;

        info!(auction_id, owner = %owner, "auction created");
        Ok(auction_id)
    }

    async fn place_bid(&self, params: PlaceBidParams) -> Result<bool, ErrorObjectOwned> {
        let mut state = self.state.write();
        state.record_call("auction_placeBid");

        let bidder = handlers::authorize(&state, &params.token)
            .map_err(|e| Self::rpc_error(&e.to_string()))?;
        let accepted =
            handlers::handle_place_bid(&mut state, bidder, params.auction_id, params.amount)
                .map_err(|e| Self::rpc_error(&e.to_string()))?;

        info!(
            auction_id = params.auction_id,
            bidder = %bidder,
            accepted,
            "bid processed"
        );
        Ok(accepted)
    }

    async fn end_auction(
        &self,
        params: EndAuctionParams,
    ) -> Result<Option<Settlement>, ErrorObjectOwned> {
        let mut state = self.state.write();
        state.record_call("auction_end");

        let caller = handlers::authorize(&state, &params.token)
            .map_err(|e| Self::rpc_error(&e.to_string()))?;
        let settlement = handlers::handle_end_auction(&mut state, caller, params.auction_id)
            .map_err(|e| Self::rpc_error(&e.to_string()))?;

        match &settlement {
            Some(s) => info!(
                auction_id = params.auction_id,
                winner = %s.winner,
                price = s.price,
                "auction settled"
            ),
            None => info!(auction_id = params.auction_id, "auction ended without winner"),
        }
        Ok(settlement)
    }

    async fn connect(&self, principal: Option<String>) -> Result<Identity, ErrorObjectOwned> {
        let mut state = self.state.write();
        state.record_call("auth_connect");

        let principal = match principal {
            Some(text) => Some(
                Principal::from_text(&text).map_err(|e| Self::rpc_error(&e.to_string()))?,
            ),
            None => None,
        };
        let identity = handlers::handle_connect(&mut state, principal);
        info!(principal = %identity.principal, "identity connected");
        Ok(identity)
    }

    async fn disconnect(&self, token: String) -> Result<bool, ErrorObjectOwned> {
        let mut state = self.state.write();
        state.record_call("auth_disconnect");
        Ok(handlers::handle_disconnect(&mut state, &SessionToken::new(token)))
    }

    async fn set_timestamp(&self, timestamp: u64) -> Result<bool, ErrorObjectOwned> {
        let mut state = self.state.write();
        state.timestamp = timestamp;
        info!(timestamp, "timestamp set");
        Ok(true)
    }

    async fn expire_session(&self, token: String) -> Result<bool, ErrorObjectOwned> {
        let mut state = self.state.write();
        Ok(handlers::handle_expire_session(
            &mut state,
            &SessionToken::new(token),
        ))
    }

    async fn method_call_count(&self, method: String) -> Result<u64, ErrorObjectOwned> {
        let state = self.state.read();
        Ok(state.call_count(&method))
    }
}

/// Start a ledger on `addr` (use port 0 for an ephemeral port). Returns the
/// bound address and the handle keeping the server alive.
pub async fn spawn(addr: SocketAddr) -> std::io::Result<(SocketAddr, ServerHandle)> {
    let server = Server::builder().build(addr).await?;
    let local_addr = server.local_addr()?;
    let handle = server.start(LedgerServer::new().into_rpc());
    info!(%local_addr, "mock ledger listening");
    Ok((local_addr, handle))
}
