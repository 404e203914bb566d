//! Call handlers for the mock ledger.
//!
//! These functions implement the engine semantics the real ledger owns:
//! credential checks, bid qualification against the reserve, and
//! second-price settlement.

use std::cmp::Reverse;

use rand::rngs::OsRng;
use rand::RngCore;

use vickrey_types::{Auction, AuctionStatus, Identity, Principal, SessionToken, Settlement};

use crate::error::LedgerError;
use crate::state::{BidRecord, LedgerState, SessionRecord};

/// Result type for handlers.
pub type HandlerResult<T> = Result<T, LedgerError>;

/// Issue a fresh session for `principal`, minting one when none is given.
pub fn handle_connect(state: &mut LedgerState, principal: Option<Principal>) -> Identity {
    let principal = principal.unwrap_or_else(|| {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        Principal::self_authenticating(&seed)
    });

    let mut token = [0u8; 32];
    OsRng.fill_bytes(&mut token);
    let token = SessionToken::new(hex::encode(token));

    state.sessions.insert(
        token.as_str().to_string(),
        SessionRecord {
            principal,
            expired: false,
        },
    );
    Identity::new(principal, token)
}

/// Drop a session. Returns whether one existed.
pub fn handle_disconnect(state: &mut LedgerState, token: &SessionToken) -> bool {
    state.sessions.remove(token.as_str()).is_some()
}

/// Resolve a presented credential to its principal. Unknown and expired
/// tokens fail identically, with the expiry signature in the message.
pub fn authorize(state: &LedgerState, token: &SessionToken) -> HandlerResult<Principal> {
    match state.sessions.get(token.as_str()) {
        Some(record) if !record.expired => Ok(record.principal),
        _ => Err(LedgerError::InvalidDelegation),
    }
}

/// Mark a session expired so subsequent calls presenting it are rejected.
pub fn handle_expire_session(state: &mut LedgerState, token: &SessionToken) -> bool {
    match state.sessions.get_mut(token.as_str()) {
        Some(record) => {
            record.expired = true;
            true
        }
        None => false,
    }
}

/// Hand out the root of trust, checking the caller asked for the service
/// this ledger actually hosts.
pub fn handle_root_key(state: &LedgerState, service: &str) -> HandlerResult<String> {
    if service != state.service {
        return Err(LedgerError::UnknownService(service.to_string()));
    }
    Ok(state.root_key.clone())
}

/// Handle auction creation.
pub fn handle_create_auction(
    state: &mut LedgerState,
    owner: Principal,
    title: &str,
    description: &str,
    duration_secs: u64,
    reserve_price: u64,
) -> HandlerResult<u64> {
    if title.trim().is_empty() {
        return Err(LedgerError::InvalidRequest("title must not be empty"));
    }
    if duration_secs < 60 {
        return Err(LedgerError::InvalidRequest("duration must be at least 60 seconds"));
    }
    if reserve_price < 1 {
        return Err(LedgerError::InvalidRequest("reserve price must be at least 1"));
    }

    let id = state.allocate_auction_id();
    let auction = Auction {
        id,
        title: title.to_string(),
        description: description.to_string(),
        reserve_price,
        start_time: state.timestamp,
        end_time: state.timestamp + duration_secs,
        state: AuctionStatus::Active,
        owner,
    };
    state.auctions.insert(id, auction);
    state.bids.insert(id, Vec::new());
    Ok(id)
}

/// Handle a bid. `Ok(false)` is the rejection path: auction not active,
/// bidding window closed, or amount below the reserve.
pub fn handle_place_bid(
    state: &mut LedgerState,
    bidder: Principal,
    auction_id: u64,
    amount: u64,
) -> HandlerResult<bool> {
    let (status, end_time, reserve_price) = {
        let auction = state
            .auctions
            .get(&auction_id)
            .ok_or(LedgerError::AuctionNotFound(auction_id))?;
        (auction.state, auction.end_time, auction.reserve_price)
    };

    if !status.is_active() || state.timestamp > end_time {
        return Ok(false);
    }
    if amount < reserve_price {
        return Ok(false);
    }

    state
        .bids
        .entry(auction_id)
        .or_default()
        .push(BidRecord { bidder, amount });
    Ok(true)
}

/// Handle ending an auction: owner-only, settles at the second-highest
/// qualifying bid with the reserve price as floor. `Ok(None)` means no
/// qualifying bid was ever recorded; the auction closes without a winner.
pub fn handle_end_auction(
    state: &mut LedgerState,
    caller: Principal,
    auction_id: u64,
) -> HandlerResult<Option<Settlement>> {
    let (owner, status, reserve_price) = {
        let auction = state
            .auctions
            .get(&auction_id)
            .ok_or(LedgerError::AuctionNotFound(auction_id))?;
        (auction.owner, auction.state, auction.reserve_price)
    };

    if owner != caller {
        return Err(LedgerError::NotOwner);
    }
    if !status.is_active() {
        return Err(LedgerError::AlreadyEnded(auction_id));
    }

    let bids = state.bids.get(&auction_id).cloned().unwrap_or_default();

    // Highest bid wins, earliest bid on ties. All stored bids qualify.
    let winner = bids
        .iter()
        .enumerate()
        .max_by_key(|(idx, bid)| (bid.amount, Reverse(*idx)))
        .map(|(_, bid)| bid.bidder);

    let settlement = winner.map(|winner| {
        let mut amounts: Vec<u64> = bids.iter().map(|b| b.amount).collect();
        amounts.sort_unstable_by(|a, b| b.cmp(a));
        let price = if amounts.len() >= 2 {
            amounts[1].max(reserve_price)
        } else {
            reserve_price
        };
        Settlement { winner, price }
    });

    if let Some(auction) = state.auctions.get_mut(&auction_id) {
        auction.state = if settlement.is_some() {
            AuctionStatus::Ended
        } else {
            AuctionStatus::NoWinner
        };
    }

    Ok(settlement)
}

/// All auctions with their authoritative lifecycle state, stable order.
pub fn handle_list(state: &LedgerState) -> Vec<Auction> {
    let mut auctions: Vec<Auction> = state.auctions.values().cloned().collect();
    auctions.sort_by_key(|a| a.id);
    auctions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(seed: &str) -> Principal {
        Principal::self_authenticating(seed.as_bytes())
    }

    fn seeded_auction(state: &mut LedgerState, owner: Principal, reserve: u64) -> u64 {
        handle_create_auction(state, owner, "Vase", "Ming era", 3600, reserve).expect("create")
    }

    #[test]
    fn connect_issues_distinct_sessions() {
        let mut state = LedgerState::new("auc-backend");
        let a = handle_connect(&mut state, None);
        let b = handle_connect(&mut state, None);
        assert_ne!(a.token, b.token);
        assert_eq!(authorize(&state, &a.token).unwrap(), a.principal);
    }

    #[test]
    fn expired_or_unknown_tokens_fail_authorization() {
        let mut state = LedgerState::new("auc-backend");
        let identity = handle_connect(&mut state, None);

        assert!(handle_expire_session(&mut state, &identity.token));
        assert_eq!(
            authorize(&state, &identity.token),
            Err(LedgerError::InvalidDelegation)
        );
        assert_eq!(
            authorize(&state, &SessionToken::new("garbage")),
            Err(LedgerError::InvalidDelegation)
        );
    }

    #[test]
    fn root_key_requires_the_hosted_service() {
        let state = LedgerState::new("auc-backend");
        assert_eq!(handle_root_key(&state, "auc-backend").unwrap(), state.root_key);
        assert!(matches!(
            handle_root_key(&state, "other"),
            Err(LedgerError::UnknownService(_))
        ));
    }

    #[test]
    fn create_auction_validates_inputs() {
        let mut state = LedgerState::new("auc-backend");
        let owner = principal("owner");

        assert!(handle_create_auction(&mut state, owner, " ", "d", 3600, 100).is_err());
        assert!(handle_create_auction(&mut state, owner, "t", "d", 59, 100).is_err());
        assert!(handle_create_auction(&mut state, owner, "t", "d", 3600, 0).is_err());

        let id = seeded_auction(&mut state, owner, 100);
        let auction = &state.auctions[&id];
        assert_eq!(auction.state, AuctionStatus::Active);
        assert_eq!(auction.end_time, auction.start_time + 3600);
    }

    #[test]
    fn bids_below_reserve_are_rejected_not_errors() {
        let mut state = LedgerState::new("auc-backend");
        let id = seeded_auction(&mut state, principal("owner"), 100);

        assert_eq!(handle_place_bid(&mut state, principal("bidder"), id, 50), Ok(false));
        assert_eq!(handle_place_bid(&mut state, principal("bidder"), id, 100), Ok(true));
        assert!(matches!(
            handle_place_bid(&mut state, principal("bidder"), 999, 100),
            Err(LedgerError::AuctionNotFound(999))
        ));
    }

    #[test]
    fn bids_after_the_window_are_rejected() {
        let mut state = LedgerState::new("auc-backend");
        let id = seeded_auction(&mut state, principal("owner"), 100);

        state.timestamp = 3601;
        assert_eq!(handle_place_bid(&mut state, principal("bidder"), id, 200), Ok(false));
    }

    #[test]
    fn second_price_settlement_with_two_bids() {
        let mut state = LedgerState::new("auc-backend");
        let owner = principal("owner");
        let id = seeded_auction(&mut state, owner, 100);

        handle_place_bid(&mut state, principal("a"), id, 150).unwrap();
        handle_place_bid(&mut state, principal("b"), id, 300).unwrap();

        let settlement = handle_end_auction(&mut state, owner, id)
            .expect("end")
            .expect("winner");
        assert_eq!(settlement.winner, principal("b"));
        assert_eq!(settlement.price, 150);
        assert_eq!(state.auctions[&id].state, AuctionStatus::Ended);
    }

    #[test]
    fn single_bid_settles_at_the_reserve_floor() {
        let mut state = LedgerState::new("auc-backend");
        let owner = principal("owner");
        let id = seeded_auction(&mut state, owner, 100);

        handle_place_bid(&mut state, principal("a"), id, 500).unwrap();

        let settlement = handle_end_auction(&mut state, owner, id)
            .expect("end")
            .expect("winner");
        assert_eq!(settlement.winner, principal("a"));
        assert_eq!(settlement.price, 100);
    }

    #[test]
    fn ties_go_to_the_earliest_bid() {
        let mut state = LedgerState::new("auc-backend");
        let owner = principal("owner");
        let id = seeded_auction(&mut state, owner, 100);

        handle_place_bid(&mut state, principal("first"), id, 200).unwrap();
        handle_place_bid(&mut state, principal("second"), id, 200).unwrap();

        let settlement = handle_end_auction(&mut state, owner, id)
            .expect("end")
            .expect("winner");
        assert_eq!(settlement.winner, principal("first"));
        assert_eq!(settlement.price, 200);
    }

    #[test]
    fn no_qualifying_bid_means_no_winner() {
        let mut state = LedgerState::new("auc-backend");
        let owner = principal("owner");
        let id = seeded_auction(&mut state, owner, 100);

        handle_place_bid(&mut state, principal("a"), id, 50).unwrap();

        let settlement = handle_end_auction(&mut state, owner, id).expect("end");
        assert!(settlement.is_none());
        assert_eq!(state.auctions[&id].state, AuctionStatus::NoWinner);
    }

    #[test]
    fn only_the_owner_may_end_and_only_once() {
        let mut state = LedgerState::new("auc-backend");
        let owner = principal("owner");
        let id = seeded_auction(&mut state, owner, 100);

        assert_eq!(
            handle_end_auction(&mut state, principal("stranger"), id),
            Err(LedgerError::NotOwner)
        );
        handle_end_auction(&mut state, owner, id).expect("end");
        assert_eq!(
            handle_end_auction(&mut state, owner, id),
            Err(LedgerError::AlreadyEnded(id))
        );
    }
}
