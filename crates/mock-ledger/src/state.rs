//! In-memory ledger state.
//!
//! A simplified stand-in for the remote execution environment's storage:
//! auctions, their bids, issued sessions, and a simulated clock that tests
//! can advance.

use std::collections::HashMap;

use rand::rngs::OsRng;
use rand::RngCore;

use vickrey_types::{Auction, Principal};

/// A stored bid. Only qualifying bids (at or above reserve, inside the
/// bidding window) are recorded; rejected ones never reach storage.
#[derive(Debug, Clone)]
pub struct BidRecord {
    pub bidder: Principal,
    pub amount: u64,
}

/// An issued session credential. Expired records stay around so expiry is
/// distinguishable from plain garbage tokens in logs, though both fail
/// authorization the same way.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub principal: Principal,
    pub expired: bool,
}

/// Ledger state behind the RPC surface.
#[derive(Debug)]
pub struct LedgerState {
    /// Service endpoint identifier this ledger hosts
    pub service: String,

    /// Root of trust handed to bootstrapping channels, fixed at startup
    pub root_key: String,

    /// Simulated timestamp, advanced by admin calls
    pub timestamp: u64,

    /// Next auction ID to assign
    pub next_auction_id: u64,

    /// All auctions by ID
    pub auctions: HashMap<u64, Auction>,

    /// Qualifying bids per auction
    pub bids: HashMap<u64, Vec<BidRecord>>,

    /// Issued sessions keyed by token text
    pub sessions: HashMap<String, SessionRecord>,

    /// RPC invocation counters, keyed by wire method name
    pub method_calls: HashMap<String, u64>,
}

impl LedgerState {
    pub fn new(service: impl Into<String>) -> Self {
        let mut root_key = [0u8; 32];
        OsRng.fill_bytes(&mut root_key);
        Self {
            service: service.into(),
            root_key: hex::encode(root_key),
            timestamp: 0,
            next_auction_id: 1,
            auctions: HashMap::new(),
            bids: HashMap::new(),
            sessions: HashMap::new(),
            method_calls: HashMap::new(),
        }
    }

    /// Get the next auction ID and increment.
    pub fn allocate_auction_id(&mut self) -> u64 {
        let id = self.next_auction_id;
        self.next_auction_id += 1;
        id
    }

    pub fn record_call(&mut self, method: &str) {
        *self.method_calls.entry(method.to_string()).or_insert(0) += 1;
    }

    pub fn call_count(&self, method: &str) -> u64 {
        self.method_calls.get(method).copied().unwrap_or(0)
    }
}
