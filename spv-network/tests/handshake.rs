//! Connection state-machine tests, driven over an in-memory pipe.

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::DuplexStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;

use spv_chain::block::Height;
use spv_chain::parameters::{genesis_hash, Network};
use spv_network::{
    Codec, Config, Connection, GetHeaders, Message, Nonce, PeerError, PeerEvent, PeerRequest,
    PeerServices, ProtocolVersion, Timings, Version,
};

fn peer_addr() -> SocketAddr {
    "127.0.0.1:18333".parse().unwrap()
}

fn fast_timings() -> Timings {
    Timings {
        connect: Duration::from_secs(1),
        handshake: Duration::from_millis(500),
        getaddr: Duration::from_millis(100),
        ping_interval: Duration::from_millis(50),
        pong: Duration::from_millis(200),
    }
}

struct Harness {
    run: JoinHandle<PeerError>,
    remote: Framed<DuplexStream, Codec>,
    events: mpsc::UnboundedReceiver<PeerEvent>,
    requests: mpsc::UnboundedSender<PeerRequest>,
}

/// Spawn a connection whose socket we hold the other end of.
fn start_connection(timings: Timings) -> Harness {
    let (events_tx, events) = mpsc::unbounded_channel();
    let (requests, requests_rx) = mpsc::unbounded_channel();
    let (local, remote) = tokio::io::duplex(1 << 16);

    let connection = Connection::new(
        peer_addr(),
        local,
        Config::new(Network::Testnet),
        timings,
        events_tx,
        requests_rx,
    );
    let run = tokio::spawn(connection.run());

    let remote = Framed::new(
        remote,
        Codec::builder().for_network(Network::Testnet).finish(),
    );
    Harness {
        run,
        remote,
        events,
        requests,
    }
}

fn remote_version() -> Message {
    Message::Version(Version::new(
        ProtocolVersion(70_015),
        "127.0.0.1:0".parse().unwrap(),
        PeerServices::empty(),
        PeerServices::NODE_NETWORK,
        peer_addr(),
        Nonce(42),
        "/peer:1.0/".to_owned(),
        Height(1000),
        false,
    ))
}

async fn next_message(harness: &mut Harness) -> Message {
    harness
        .remote
        .next()
        .await
        .expect("the connection should still be open")
        .expect("the frame should decode")
}

/// Complete the handshake from the remote side, asserting the client's
/// wire order: version, then (after our version) verack, then getaddr.
async fn complete_handshake(harness: &mut Harness) {
    match next_message(harness).await {
        Message::Version(v) => assert_eq!(v.version, ProtocolVersion(70_015)),
        other => panic!("expected version first, got {}", other),
    }

    harness.remote.send(remote_version()).await.unwrap();
    harness.remote.send(Message::Verack).await.unwrap();

    assert!(matches!(next_message(harness).await, Message::Verack));
    assert!(matches!(next_message(harness).await, Message::GetAddr));
}

#[tokio::test]
async fn handshake_reaches_ready_and_sends_getheaders() {
    spv_test::init();
    let mut harness = start_connection(Timings::default());

    complete_handshake(&mut harness).await;

    match harness.events.recv().await.unwrap() {
        PeerEvent::Ready { addr, peer } => {
            assert_eq!(addr, peer_addr());
            assert_eq!(peer.version, Some(ProtocolVersion(70_015)));
            assert_eq!(peer.user_agent.as_deref(), Some("/peer:1.0/"));
            assert_eq!(peer.nonce, Some(Nonce(42)));
        }
        other => panic!("expected a Ready event, got {:?}", other),
    }

    // the swarm drives sync through the connection
    harness
        .requests
        .send(PeerRequest::Send(Message::GetHeaders(GetHeaders {
            block_locator_hashes: vec![genesis_hash(Network::Testnet)],
            stop_hash: None,
        })))
        .unwrap();
    match next_message(&mut harness).await {
        Message::GetHeaders(inner) => {
            assert_eq!(
                inner.block_locator_hashes,
                vec![genesis_hash(Network::Testnet)]
            );
            assert_eq!(inner.stop_hash, None);
        }
        other => panic!("expected getheaders, got {}", other),
    }

    harness.requests.send(PeerRequest::Shutdown).unwrap();
    let reason = harness.run.await.unwrap();
    assert!(matches!(reason, PeerError::ClientShutdown));
}

#[tokio::test]
async fn verack_before_version_is_tolerated() {
    spv_test::init();
    let mut harness = start_connection(Timings::default());

    match next_message(&mut harness).await {
        Message::Version(_) => {}
        other => panic!("expected version first, got {}", other),
    }

    // eager peers ack before introducing themselves
    harness.remote.send(Message::Verack).await.unwrap();
    harness.remote.send(remote_version()).await.unwrap();

    assert!(matches!(next_message(&mut harness).await, Message::Verack));
    assert!(matches!(next_message(&mut harness).await, Message::GetAddr));
    assert!(matches!(
        harness.events.recv().await.unwrap(),
        PeerEvent::Ready { .. }
    ));
}

#[tokio::test]
async fn commands_before_the_handshake_disconnect() {
    spv_test::init();
    let mut harness = start_connection(Timings::default());

    harness.remote.send(Message::Ping(Nonce(1))).await.unwrap();

    let reason = harness.run.await.unwrap();
    assert!(matches!(reason, PeerError::WrongMessage { .. }));
    // the swarm never heard the connection was ready
    assert!(harness.events.recv().await.is_none());
}

#[tokio::test]
async fn a_silent_peer_times_out_of_the_handshake() {
    spv_test::init();
    let mut harness = start_connection(fast_timings());

    // swallow the client's version and say nothing
    let _ = next_message(&mut harness).await;

    let reason = harness.run.await.unwrap();
    assert!(matches!(reason, PeerError::HandshakeTimeout));
}

#[tokio::test]
async fn pings_answer_and_pongs_are_checked() {
    spv_test::init();
    let mut harness = start_connection(fast_timings());
    complete_handshake(&mut harness).await;

    // our ping gets our pong back
    harness.remote.send(Message::Ping(Nonce(99))).await.unwrap();
    loop {
        match next_message(&mut harness).await {
            Message::Pong(nonce) => {
                assert_eq!(nonce, Nonce(99));
                break;
            }
            // the client's own heartbeat may interleave
            Message::Ping(nonce) => harness.remote.send(Message::Pong(nonce)).await.unwrap(),
            other => panic!("unexpected message {}", other),
        }
    }
}

#[tokio::test]
async fn a_wrong_pong_nonce_disconnects() {
    spv_test::init();
    let mut harness = start_connection(fast_timings());
    complete_handshake(&mut harness).await;

    let ping_nonce = loop {
        match next_message(&mut harness).await {
            Message::Ping(nonce) => break nonce,
            _ => continue,
        }
    };

    harness
        .remote
        .send(Message::Pong(Nonce(ping_nonce.0.wrapping_add(1))))
        .await
        .unwrap();

    let reason = harness.run.await.unwrap();
    assert!(matches!(reason, PeerError::PongMismatch { .. }));
}

#[tokio::test]
async fn a_missing_pong_disconnects() {
    spv_test::init();
    let mut harness = start_connection(fast_timings());
    complete_handshake(&mut harness).await;

    // read the ping and never answer
    loop {
        match next_message(&mut harness).await {
            Message::Ping(_) => break,
            _ => continue,
        }
    }

    let reason = harness.run.await.unwrap();
    assert!(matches!(reason, PeerError::PongTimeout(_)));
}

#[tokio::test]
async fn silence_after_getaddr_asks_for_another_seed() {
    spv_test::init();
    let mut harness = start_connection(fast_timings());
    complete_handshake(&mut harness).await;

    assert!(matches!(
        harness.events.recv().await.unwrap(),
        PeerEvent::Ready { .. }
    ));
    match harness.events.recv().await.unwrap() {
        PeerEvent::AddrTimeout { addr } => assert_eq!(addr, peer_addr()),
        other => panic!("expected an AddrTimeout event, got {:?}", other),
    }
}
