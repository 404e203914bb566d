//! Client SDK for a sealed-bid auction service on a remote ledger.
//!
//! This crate provides the session and call-orchestration layer:
//! - Binding a user's identity to freshly built authenticated channels
//! - Detecting expired authorization material and forcing re-authentication
//! - Issuing create/bid/end operations over identity-consistent channels
//! - Converging local auction state by refetching after every mutation
//!
//! The auction engine itself (bid comparison, second-price settlement) runs
//! remotely and is reached only through the typed [`service::AuctionService`]
//! proxy.

pub mod channel;
pub mod client;
pub mod config;
pub mod error;
pub mod identity;
pub mod service;
pub mod session;

pub use channel::{Channel, ChannelError, ChannelFactory};
pub use client::{AuctionClient, MIN_AUCTION_DURATION_SECS};
pub use config::{Endpoint, Environment};
pub use error::ClientError;
pub use identity::{IdentityProvider, MemoryIdentityProvider};
pub use session::{SessionManager, SessionState};
