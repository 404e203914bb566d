//! Core type definitions for the sealed-bid auction client.
//!
//! This crate provides the data structures shared between the client and the
//! ledger side of the wire: principals, session credentials, auction
//! snapshots, settlement records, and the JSON-RPC parameter structs.
//! Byte-valued identifiers travel hex-encoded.

use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Service endpoint identifier of the auction backend, used when a host
/// serves more than one ledger service.
pub const DEFAULT_SERVICE_ID: &str = "auc-backend";

// =========================
// IDENTITY
// =========================

/// Stable, globally unique account identifier (32 bytes, hex text encoding).
///
/// Independent of any particular credential instance: expiring a session
/// token does not change the principal behind it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Principal([u8; 32]);

/// Errors parsing a principal from its text encoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrincipalParseError {
    #[error("principal is not valid hex: {0}")]
    InvalidHex(String),

    #[error("principal must be 32 bytes, got {0}")]
    InvalidLength(usize),
}

impl Principal {
    /// Build a principal from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive a self-authenticating principal from credential key material.
    pub fn self_authenticating(public_key: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"AUCTION_PRINCIPAL_V1:");
        hasher.update(public_key);
        Self(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex text encoding, the form principals take on the wire and in logs.
    pub fn to_text(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse the hex text encoding produced by [`Principal::to_text`].
    pub fn from_text(s: &str) -> Result<Self, PrincipalParseError> {
        let bytes = hex::decode(s.trim_start_matches("0x"))
            .map_err(|e| PrincipalParseError::InvalidHex(e.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| PrincipalParseError::InvalidLength(b.len()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl Serialize for Principal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_text())
    }
}

impl<'de> Deserialize<'de> for Principal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Principal::from_text(&text).map_err(D::Error::custom)
    }
}

/// Opaque session credential issued by the identity provider.
///
/// May be invalidated or expired server-side at any time; the client never
/// inspects it, only presents it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An authenticated identity: a principal plus the credential currently
/// authorizing calls on its behalf. At most one is active per session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub principal: Principal,
    pub token: SessionToken,
}

impl Identity {
    pub fn new(principal: Principal, token: SessionToken) -> Self {
        Self { principal, token }
    }
}

// =========================
// AUCTION TYPES
// =========================

/// Auction lifecycle state, owned and advanced exclusively by the remote
/// engine. Local copies are read-only snapshots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuctionStatus {
    /// Accepting bids
    Active,
    /// Ended with a settled winner
    Ended,
    /// Ended with no qualifying bid
    NoWinner,
}

impl AuctionStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, AuctionStatus::Active)
    }
}

impl fmt::Display for AuctionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuctionStatus::Active => "active",
            AuctionStatus::Ended => "ended",
            AuctionStatus::NoWinner => "no_winner",
        };
        f.write_str(s)
    }
}

/// A remote-owned auction record as returned by `query_listActiveAuctions`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auction {
    pub id: u64,
    pub title: String,
    pub description: String,
    pub reserve_price: u64,
    pub start_time: u64,
    pub end_time: u64,
    pub state: AuctionStatus,
    pub owner: Principal,
}

/// Settlement record returned when an auction ends with a winner. The price
/// is the engine's second-price determination: the highest losing bid, with
/// the reserve price as floor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub winner: Principal,
    pub price: u64,
}

// =========================
// WIRE PARAMETERS
// =========================

/// Parameters for `auction_create`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateAuctionParams {
    pub token: SessionToken,
    pub title: String,
    pub description: String,
    pub duration_secs: u64,
    pub reserve_price: u64,
}

/// Parameters for `auction_placeBid`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlaceBidParams {
    pub token: SessionToken,
    pub auction_id: u64,
    pub amount: u64,
}

/// Parameters for `auction_end`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EndAuctionParams {
    pub token: SessionToken,
    pub auction_id: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn principal_text_round_trip() {
        let p = Principal::from_bytes([7u8; 32]);
        let text = p.to_text();
        assert_eq!(text.len(), 64);
        assert_eq!(Principal::from_text(&text).unwrap(), p);
    }

    #[test]
    fn principal_rejects_bad_input() {
        assert!(matches!(
            Principal::from_text("zz"),
            Err(PrincipalParseError::InvalidHex(_))
        ));
        assert!(matches!(
            Principal::from_text("abcd"),
            Err(PrincipalParseError::InvalidLength(2))
        ));
    }

    #[test]
    fn self_authenticating_is_stable_and_distinct() {
        let a = Principal::self_authenticating(b"key-a");
        let b = Principal::self_authenticating(b"key-b");
        assert_eq!(a, Principal::self_authenticating(b"key-a"));
        assert_ne!(a, b);
    }

    #[test]
    fn auction_status_wire_encoding() {
        assert_eq!(
            serde_json::to_string(&AuctionStatus::NoWinner).unwrap(),
            "\"no_winner\""
        );
        let state: AuctionStatus = serde_json::from_str("\"active\"").unwrap();
        assert!(state.is_active());
    }

    #[test]
    fn auction_serde_round_trip() {
        let auction = Auction {
            id: 7,
            title: "Vase".into(),
            description: "Ming era".into(),
            reserve_price: 100,
            start_time: 1_000,
            end_time: 4_600,
            state: AuctionStatus::Active,
            owner: Principal::self_authenticating(b"owner"),
        };
        let json = serde_json::to_string(&auction).unwrap();
        let back: Auction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, auction);
    }
}
