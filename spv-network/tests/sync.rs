//! Swarm-level tests against scripted peers on localhost.

use std::net::SocketAddr;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, watch};
use tokio_util::codec::Framed;

use spv_chain::block::{merkle, CountedHeader, Header, Height};
use spv_chain::parameters::{genesis_header, Network};
use spv_network::{
    Client, Codec, Config, Message, Nonce, PeerServices, ProtocolVersion, Timings, Version,
};
use spv_state::{ChainStore, Config as StateConfig};

fn child_of(parent: &Header, salt: u8) -> Header {
    Header::new(
        parent.version,
        parent.hash(),
        merkle::Root([salt; 32]),
        parent.time + ChronoDuration::minutes(10),
        parent.difficulty_threshold,
        u32::from(salt),
    )
}

fn counted(header: Header) -> CountedHeader {
    CountedHeader {
        header,
        transaction_count: 0,
    }
}

fn fast_timings() -> Timings {
    Timings {
        connect: Duration::from_secs(1),
        handshake: Duration::from_secs(2),
        getaddr: Duration::from_secs(30),
        ping_interval: Duration::from_secs(30),
        pong: Duration::from_secs(5),
    }
}

/// Answer the client's handshake from the accepting side.
async fn answer_handshake(framed: &mut Framed<TcpStream, Codec>, our_addr: SocketAddr) {
    match framed.next().await.unwrap().unwrap() {
        Message::Version(_) => {}
        other => panic!("expected the client's version, got {}", other),
    }
    framed
        .send(Message::Version(Version::new(
            ProtocolVersion(70_015),
            "127.0.0.1:0".parse().unwrap(),
            PeerServices::empty(),
            PeerServices::NODE_NETWORK,
            our_addr,
            Nonce(7),
            "/scripted-peer:0.1/".to_owned(),
            Height(2),
            false,
        )))
        .await
        .unwrap();
    framed.send(Message::Verack).await.unwrap();
    match framed.next().await.unwrap().unwrap() {
        Message::Verack => {}
        other => panic!("expected the client's verack, got {}", other),
    }
}

/// Serve one connection: shake hands, then answer the first `getheaders`
/// with `batch` and every later one with an empty `headers`. Signals
/// `done` after the empty reply goes out.
async fn serve_headers_once(
    listener: TcpListener,
    batch: Vec<CountedHeader>,
    done: oneshot::Sender<()>,
) {
    let our_addr = listener.local_addr().unwrap();
    let (stream, _) = listener.accept().await.unwrap();
    let mut framed = Framed::new(
        stream,
        Codec::builder().for_network(Network::Testnet).finish(),
    );
    answer_handshake(&mut framed, our_addr).await;

    let mut batch = Some(batch);
    let mut done = Some(done);
    loop {
        match framed.next().await {
            None | Some(Err(_)) => break,
            Some(Ok(Message::GetHeaders(_))) => match batch.take() {
                Some(headers) if !headers.is_empty() => {
                    framed.send(Message::Headers(headers)).await.unwrap()
                }
                _ => {
                    framed.send(Message::Headers(Vec::new())).await.unwrap();
                    if let Some(done) = done.take() {
                        let _ = done.send(());
                    }
                }
            },
            Some(Ok(Message::Ping(nonce))) => {
                framed.send(Message::Pong(nonce)).await.unwrap()
            }
            Some(Ok(_)) => {}
        }
    }
}

fn test_client(dir: &tempfile::TempDir, peers: Vec<SocketAddr>) -> Client {
    let store = ChainStore::new(
        &StateConfig {
            data_dir: dir.path().to_path_buf(),
        },
        Network::Testnet,
    )
    .expect("store opens");

    let mut config = Config::new(Network::Testnet);
    config.dns_seeds = Vec::new();
    config.target_connections = 1;
    config.initial_peers = peers;

    Client::with_timings(config, store, fast_timings())
}

#[tokio::test]
async fn client_syncs_headers_from_a_peer() {
    spv_test::init();

    let genesis = genesis_header(Network::Testnet);
    let a = child_of(&genesis, 1);
    let b = child_of(&a, 2);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let peer_addr = listener.local_addr().unwrap();
    let (done_tx, done_rx) = oneshot::channel();
    let server = tokio::spawn(serve_headers_once(
        listener,
        vec![counted(a), counted(b)],
        done_tx,
    ));

    let dir = tempfile::TempDir::new().unwrap();
    let mut client = test_client(&dir, vec![peer_addr]);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    {
        let run = client.run(shutdown_rx);
        tokio::pin!(run);
        tokio::select! {
            result = &mut run => panic!("client exited early: {:?}", result),
            _ = done_rx => {}
        }
        shutdown_tx.send(true).unwrap();
        run.await.expect("clean shutdown");
    }

    assert_eq!(client.store().height(), Height(2));
    assert_eq!(client.store().tip().header.hash(), b.hash());

    server.await.unwrap();
}

#[tokio::test]
async fn client_reaches_a_live_peer_despite_dead_ones() {
    spv_test::init();

    // an address nobody listens on: bind, remember, release
    let dead_addr = {
        let placeholder = TcpListener::bind("127.0.0.1:0").await.unwrap();
        placeholder.local_addr().unwrap()
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let live_addr = listener.local_addr().unwrap();
    let (done_tx, done_rx) = oneshot::channel();
    let server = tokio::spawn(serve_headers_once(listener, Vec::new(), done_tx));

    let dir = tempfile::TempDir::new().unwrap();
    let mut client = test_client(&dir, vec![dead_addr, live_addr]);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    {
        let run = client.run(shutdown_rx);
        tokio::pin!(run);
        tokio::select! {
            result = &mut run => panic!("client exited early: {:?}", result),
            _ = done_rx => {}
        }
        shutdown_tx.send(true).unwrap();
        run.await.expect("clean shutdown");
    }

    // the live peer answered getheaders with an empty batch: caught up
    assert_eq!(client.store().height(), Height(0));

    server.await.unwrap();
}
