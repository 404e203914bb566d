//! Typed proxy over the remote auction service.
//!
//! One proxy wraps one channel; the channel's bound credential authorizes
//! the mutating operations. Replacing the identity means replacing the
//! proxy, never updating it in place.

use jsonrpsee::core::client::{ClientT, Error as RpcError};

use vickrey_types::{
    Auction, CreateAuctionParams, EndAuctionParams, PlaceBidParams, Principal, SessionToken,
    Settlement,
};

use crate::channel::Channel;

/// Remote auction service reachable over one bound channel.
pub struct AuctionService {
    channel: Channel,
}

impl AuctionService {
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }

    /// Principal of the identity this proxy is bound to, if any.
    pub fn bound_principal(&self) -> Option<Principal> {
        self.channel.identity().map(|id| id.principal)
    }

    fn credential(&self) -> Result<SessionToken, RpcError> {
        self.channel
            .credential()
            .cloned()
            .ok_or_else(|| RpcError::Custom("mutating call issued over an anonymous channel".into()))
    }

    /// Fetch the authoritative auction set. Works over anonymous channels.
    pub async fn list_active_auctions(&self) -> Result<Vec<Auction>, RpcError> {
        self.channel
            .http()
            .request("query_listActiveAuctions", Vec::<()>::new())
            .await
    }

    /// Create an auction, returning its newly assigned identifier.
    pub async fn create_auction(
        &self,
        title: &str,
        description: &str,
        duration_secs: u64,
        reserve_price: u64,
    ) -> Result<u64, RpcError> {
        let params = CreateAuctionParams {
            token: self.credential()?,
            title: title.to_string(),
            description: description.to_string(),
            duration_secs,
            reserve_price,
        };
        self.channel
            .http()
            .request("auction_create", vec![params])
            .await
    }

    /// Place a bid. `false` means the engine rejected the bid (below
    /// reserve, auction not active); that is a normal outcome, not a fault.
    pub async fn place_bid(&self, auction_id: u64, amount: u64) -> Result<bool, RpcError> {
        let params = PlaceBidParams {
            token: self.credential()?,
            auction_id,
            amount,
        };
        self.channel
            .http()
            .request("auction_placeBid", vec![params])
            .await
    }

    /// End an auction. `None` means no qualifying winner; the settlement
    /// price is the engine's second-price determination, opaque to us.
    pub async fn end_auction(&self, auction_id: u64) -> Result<Option<Settlement>, RpcError> {
        let params = EndAuctionParams {
            token: self.credential()?,
            auction_id,
        };
        self.channel
            .http()
            .request("auction_end", vec![params])
            .await
    }
}
