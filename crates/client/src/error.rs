//! Client error taxonomy and remote-error classification.

use jsonrpsee::core::client::Error as RpcError;
use thiserror::Error;

use crate::channel::ChannelError;

/// Error messages carrying any of these fragments mean the presented
/// credential was rejected as invalid or expired, as opposed to a transport
/// fault or an engine-side rejection.
const AUTHORIZATION_EXPIRY_SIGNATURES: &[&str] =
    &["invalid delegation", "delegation expired", "certificate expired"];

/// Errors surfaced by the orchestrated auction operations.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("not authenticated: connect an identity before mutating auctions")]
    NotAuthenticated,

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("session expired or invalidated: reconnect your identity and retry")]
    AuthorizationExpired,

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("remote call failed: {0}")]
    RemoteCall(String),
}

impl ClientError {
    /// Whether this error tears down session state. Authorization expiry is
    /// the only class that does.
    pub fn forces_sign_out(&self) -> bool {
        matches!(self, ClientError::AuthorizationExpired)
    }
}

/// True if a remote error message matches the authorization-expiry
/// signature. Matching is case-insensitive on message fragments because the
/// remote does not expose a structured code for this class.
pub fn is_authorization_expiry(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    AUTHORIZATION_EXPIRY_SIGNATURES
        .iter()
        .any(|sig| message.contains(sig))
}

/// The human-relevant message of a remote call failure: the call error body
/// when the remote answered, the transport error otherwise.
pub fn remote_error_message(err: &RpcError) -> String {
    match err {
        RpcError::Call(object) => object.message().to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_signature_matches_case_insensitively() {
        assert!(is_authorization_expiry("Invalid delegation: expired"));
        assert!(is_authorization_expiry("request failed: INVALID DELEGATION"));
        assert!(is_authorization_expiry("delegation expired at height 9"));
    }

    #[test]
    fn other_failures_are_not_expiry() {
        assert!(!is_authorization_expiry("auction not found: 7"));
        assert!(!is_authorization_expiry("connection refused"));
        assert!(!is_authorization_expiry("only the auction owner may end it"));
    }

    #[test]
    fn only_expiry_forces_sign_out() {
        assert!(ClientError::AuthorizationExpired.forces_sign_out());
        assert!(!ClientError::NotAuthenticated.forces_sign_out());
        assert!(!ClientError::RemoteCall("boom".into()).forces_sign_out());
    }
}
