//! Mock ledger error types.

use thiserror::Error;

/// Errors the ledger reports back over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("auction not found: {0}")]
    AuctionNotFound(u64),

    #[error("auction {0} already ended")]
    AlreadyEnded(u64),

    #[error("only the auction owner may end it")]
    NotOwner,

    /// The message fragment "invalid delegation" is the signature
    /// authenticated clients recognize as credential expiry.
    #[error("invalid delegation: session credential rejected or expired")]
    InvalidDelegation,

    #[error("invalid request: {0}")]
    InvalidRequest(&'static str),

    #[error("unknown service id: {0}")]
    UnknownService(String),
}
