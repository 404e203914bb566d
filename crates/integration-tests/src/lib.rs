//! End-to-end integration tests for the auction client.
//!
//! Each test drives the real client stack (channel factory, session
//! manager, orchestrated operations) against an in-process mock ledger on
//! an ephemeral port:
//! 1. Identity issuance and sign-in
//! 2. Orchestrated create/bid/end calls
//! 3. Post-mutation refetch and snapshot convergence
//! 4. Credential-expiry recovery

#![cfg(test)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use jsonrpsee::core::client::ClientT;
use jsonrpsee::http_client::HttpClientBuilder;
use jsonrpsee::server::ServerHandle;

use vickrey_client::{
    AuctionClient, ClientError, Endpoint, Environment, IdentityProvider, MemoryIdentityProvider,
};
use vickrey_types::{AuctionStatus, Identity, Principal, SessionToken, DEFAULT_SERVICE_ID};

async fn start_ledger() -> (SocketAddr, ServerHandle) {
    let addr: SocketAddr = "127.0.0.1:0".parse().expect("loopback addr");
    vickrey_mock_ledger::spawn(addr).await.expect("spawn ledger")
}

fn test_client(addr: SocketAddr) -> AuctionClient {
    AuctionClient::with_endpoint(
        Environment::Local,
        Endpoint::new(format!("http://{addr}"), DEFAULT_SERVICE_ID),
    )
}

/// Obtain a fresh identity from the ledger's development issuer, the way a
/// wallet would hand one to the client.
async fn connect_identity(addr: SocketAddr) -> Identity {
    let http = HttpClientBuilder::default()
        .build(format!("http://{addr}"))
        .expect("raw client");
    http.request("auth_connect", vec![Option::<String>::None])
        .await
        .expect("auth_connect")
}

async fn expire_session(addr: SocketAddr, token: &SessionToken) {
    let http = HttpClientBuilder::default()
        .build(format!("http://{addr}"))
        .expect("raw client");
    let expired: bool = http
        .request("admin_expireSession", vec![token.to_string()])
        .await
        .expect("admin_expireSession");
    assert!(expired, "session to expire must exist");
}

async fn call_count(addr: SocketAddr, method: &str) -> u64 {
    let http = HttpClientBuilder::default()
        .build(format!("http://{addr}"))
        .expect("raw client");
    http.request("admin_methodCallCount", vec![method.to_string()])
        .await
        .expect("admin_methodCallCount")
}

/// Sign in a fresh identity and create one auction, returning the owner
/// client, its identity, and the auction id.
async fn seeded_auction(addr: SocketAddr, reserve: u64) -> (AuctionClient, Identity, u64) {
    let owner = test_client(addr);
    let identity = connect_identity(addr).await;
    owner.sign_in(identity.clone()).await.expect("sign in");
    let auction_id = owner
        .create_auction("Vase", "Ming era", 3600, reserve)
        .await
        .expect("create auction");
    (owner, identity, auction_id)
}

#[tokio::test]
async fn anonymous_client_lists_auctions() {
    let (addr, _handle) = start_ledger().await;
    let (_owner, _identity, auction_id) = seeded_auction(addr, 100).await;

    let viewer = test_client(addr);
    assert!(!viewer.is_authenticated());

    viewer.refresh_auctions().await.expect("anonymous list");
    let auctions = viewer.current_auctions();
    assert_eq!(auctions.len(), 1);
    assert_eq!(auctions[0].id, auction_id);
}

#[tokio::test]
async fn created_auction_lands_in_the_snapshot_without_manual_refresh() {
    let (addr, _handle) = start_ledger().await;
    let (owner, identity, auction_id) = seeded_auction(addr, 100).await;

    // The orchestrated create already refetched; the snapshot must hold the
    // new auction before any explicit refresh.
    let auctions = owner.current_auctions();
    let auction = auctions
        .iter()
        .find(|a| a.id == auction_id)
        .expect("created auction in snapshot");
    assert_eq!(auction.reserve_price, 100);
    assert_eq!(auction.state, AuctionStatus::Active);
    assert_eq!(auction.owner, identity.principal);
}

#[tokio::test]
async fn bid_below_reserve_is_a_negative_result_not_an_error() {
    let (addr, _handle) = start_ledger().await;
    let (_owner, _identity, auction_id) = seeded_auction(addr, 100).await;

    let bidder = test_client(addr);
    bidder
        .sign_in(connect_identity(addr).await)
        .await
        .expect("sign in");

    let accepted = bidder.place_bid(auction_id, 50).await.expect("bid call");
    assert!(!accepted);
    assert!(bidder.last_error().is_none());
    assert!(bidder.is_authenticated());
}

#[tokio::test]
async fn ending_with_two_bids_settles_at_the_second_price() {
    let (addr, _handle) = start_ledger().await;
    let (owner, _identity, auction_id) = seeded_auction(addr, 100).await;

    let low = test_client(addr);
    low.sign_in(connect_identity(addr).await).await.expect("sign in");
    assert!(low.place_bid(auction_id, 150).await.expect("low bid"));

    let high = test_client(addr);
    let high_identity = connect_identity(addr).await;
    high.sign_in(high_identity.clone()).await.expect("sign in");
    assert!(high.place_bid(auction_id, 300).await.expect("high bid"));

    let settlement = owner
        .end_auction(auction_id)
        .await
        .expect("end call")
        .expect("qualifying winner");
    assert_eq!(settlement.winner, high_identity.principal);
    assert_eq!(settlement.price, 150);

    let auctions = owner.current_auctions();
    let auction = auctions.iter().find(|a| a.id == auction_id).expect("snapshot");
    assert_eq!(auction.state, AuctionStatus::Ended);
}

#[tokio::test]
async fn ending_without_qualifying_bids_reports_no_winner() {
    let (addr, _handle) = start_ledger().await;
    let (owner, _identity, auction_id) = seeded_auction(addr, 100).await;

    let settlement = owner.end_auction(auction_id).await.expect("end call");
    assert!(settlement.is_none());
    assert!(owner.last_error().is_none());

    let auctions = owner.current_auctions();
    let auction = auctions.iter().find(|a| a.id == auction_id).expect("snapshot");
    assert_eq!(auction.state, AuctionStatus::NoWinner);
}

#[tokio::test]
async fn credential_expiry_forces_a_single_sign_out() {
    let (addr, _handle) = start_ledger().await;
    let (_owner, _identity, auction_id) = seeded_auction(addr, 100).await;

    let bidder = test_client(addr);
    let bidder_identity = connect_identity(addr).await;
    bidder.sign_in(bidder_identity.clone()).await.expect("sign in");
    let before = bidder.current_auctions();
    assert_eq!(before.len(), 1);

    expire_session(addr, &bidder_identity.token).await;

    let err = bidder.place_bid(auction_id, 150).await;
    assert!(matches!(err, Err(ClientError::AuthorizationExpired)));
    assert!(!bidder.is_authenticated());

    // The snapshot survives the sign-out untouched.
    assert_eq!(bidder.current_auctions(), before);

    // Signed out, the next attempt is rejected locally without reaching the
    // wire: the ledger saw exactly one bid attempt.
    let err = bidder.place_bid(auction_id, 150).await;
    assert!(matches!(err, Err(ClientError::NotAuthenticated)));
    assert_eq!(call_count(addr, "auction_placeBid").await, 1);
}

#[tokio::test]
async fn every_successful_mutation_refetches_exactly_once() {
    let (addr, _handle) = start_ledger().await;

    let owner = test_client(addr);
    owner.sign_in(connect_identity(addr).await).await.expect("sign in");

    let baseline = call_count(addr, "query_listActiveAuctions").await;

    let auction_id = owner
        .create_auction("Vase", "Ming era", 3600, 100)
        .await
        .expect("create");
    assert_eq!(call_count(addr, "query_listActiveAuctions").await, baseline + 1);

    assert!(owner.place_bid(auction_id, 150).await.expect("accepted bid"));
    assert_eq!(call_count(addr, "query_listActiveAuctions").await, baseline + 2);

    // A rejected bid is still an acknowledged mutation attempt: it refetches.
    assert!(!owner.place_bid(auction_id, 10).await.expect("rejected bid"));
    assert_eq!(call_count(addr, "query_listActiveAuctions").await, baseline + 3);

    owner.end_auction(auction_id).await.expect("end");
    assert_eq!(call_count(addr, "query_listActiveAuctions").await, baseline + 4);
}

#[tokio::test]
async fn anonymous_mutations_never_reach_the_wire() {
    let (addr, _handle) = start_ledger().await;
    let client = test_client(addr);

    assert!(matches!(
        client.create_auction("Vase", "Ming era", 3600, 100).await,
        Err(ClientError::NotAuthenticated)
    ));
    assert!(matches!(
        client.place_bid(1, 50).await,
        Err(ClientError::NotAuthenticated)
    ));
    assert!(matches!(
        client.end_auction(1).await,
        Err(ClientError::NotAuthenticated)
    ));

    assert_eq!(call_count(addr, "auction_create").await, 0);
    assert_eq!(call_count(addr, "auction_placeBid").await, 0);
    assert_eq!(call_count(addr, "auction_end").await, 0);
}

#[tokio::test]
async fn session_proxy_always_tracks_the_latest_identity() {
    let (addr, _handle) = start_ledger().await;
    let client = test_client(addr);

    let alice = connect_identity(addr).await;
    client.sign_in(alice.clone()).await.expect("sign in alice");
    assert_eq!(
        client.session().authenticated_proxy().expect("proxy").bound_principal(),
        Some(alice.principal)
    );

    let bob = connect_identity(addr).await;
    client.sign_in(bob.clone()).await.expect("sign in bob");
    assert_eq!(
        client.session().authenticated_proxy().expect("proxy").bound_principal(),
        Some(bob.principal)
    );

    client.sign_out();
    assert!(client.session().authenticated_proxy().is_err());
}

#[tokio::test]
async fn refresh_is_idempotent_between_mutations() {
    let (addr, _handle) = start_ledger().await;
    let (_owner, _identity, _auction_id) = seeded_auction(addr, 100).await;

    let viewer = test_client(addr);
    viewer.refresh_auctions().await.expect("first refresh");
    let first = viewer.current_auctions();
    viewer.refresh_auctions().await.expect("second refresh");
    assert_eq!(viewer.current_auctions(), first);
}

#[tokio::test]
async fn unreachable_endpoint_fails_sign_in_and_stays_anonymous() {
    // Nothing listens on this port; the local-deployment trust bootstrap
    // cannot complete.
    let client = AuctionClient::with_endpoint(
        Environment::Local,
        Endpoint::new("http://127.0.0.1:1", DEFAULT_SERVICE_ID),
    );
    let identity = Identity::new(
        Principal::self_authenticating(b"offline"),
        SessionToken::new("offline-token"),
    );

    let err = client.sign_in(identity).await;
    assert!(matches!(err, Err(ClientError::Authentication(_))));
    assert!(!client.is_authenticated());
    assert!(client.last_error().is_some());
}

#[tokio::test]
async fn identity_watcher_follows_the_provider() {
    let (addr, _handle) = start_ledger().await;
    let client = Arc::new(test_client(addr));

    let provider = MemoryIdentityProvider::new();
    let _watcher = Arc::clone(&client).spawn_identity_watcher(provider.subscribe());

    provider.connect(connect_identity(addr).await);
    wait_until(|| client.is_authenticated()).await;

    provider.disconnect();
    wait_until(|| !client.is_authenticated()).await;
}

async fn wait_until(cond: impl Fn() -> bool) {
    for _ in 0..250 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn only_the_owner_may_end_and_failures_keep_the_session() {
    let (addr, _handle) = start_ledger().await;
    let (_owner, _identity, auction_id) = seeded_auction(addr, 100).await;

    let stranger = test_client(addr);
    stranger
        .sign_in(connect_identity(addr).await)
        .await
        .expect("sign in");

    let err = stranger.end_auction(auction_id).await;
    match err {
        Err(ClientError::RemoteCall(message)) => {
            assert!(message.contains("owner"), "unexpected message: {message}")
        }
        other => panic!("expected RemoteCall error, got {other:?}"),
    }

    // An engine-side rejection is not an authorization problem.
    assert!(stranger.is_authenticated());
}
