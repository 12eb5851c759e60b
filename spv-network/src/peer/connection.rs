//! The per-peer state machine.
//!
//! A [`Connection`] owns one socket. It speaks the version/verack
//! handshake, answers pings, keeps its own heartbeat running, and
//! translates everything the swarm cares about into [`PeerEvent`]s on a
//! channel. The swarm talks back through [`PeerRequest`]s; it never
//! touches the socket directly.

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};

use spv_chain::block::{self, CountedHeader};

use crate::config::Config;
use crate::constants;
use crate::meta_addr::MetaAddr;
use crate::protocol::external::{
    message::Version,
    types::{Nonce, PeerServices, ProtocolVersion},
    Codec, Message,
};

use super::error::PeerError;

/// Where a connection stands in the version/verack exchange.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HandshakeState {
    /// Waiting for the peer's `version`.
    NeedVersion,
    /// Waiting for the peer's `verack`.
    NeedVerack,
    /// Handshake complete; the heartbeat is running.
    Connected,
    /// Torn down, or in the process of tearing down.
    Closing,
}

/// Metadata learned about the remote peer during the handshake.
#[derive(Clone, Debug)]
pub struct Peer {
    pub addr: SocketAddr,
    pub version: Option<ProtocolVersion>,
    pub services: Option<PeerServices>,
    pub user_agent: Option<String>,
    pub nonce: Option<Nonce>,
    pub start_height: Option<block::Height>,
}

impl Peer {
    fn new(addr: SocketAddr) -> Peer {
        Peer {
            addr,
            version: None,
            services: None,
            user_agent: None,
            nonce: None,
            start_height: None,
        }
    }
}

/// Timer durations for one connection.
///
/// The defaults are the protocol values; tests shrink them.
#[derive(Clone, Copy, Debug)]
pub struct Timings {
    /// TCP connect deadline.
    pub connect: Duration,
    /// Deadline for the whole version/verack exchange.
    pub handshake: Duration,
    /// How long to wait for `addr` gossip after our `getaddr`.
    pub getaddr: Duration,
    /// Interval between our pings.
    pub ping_interval: Duration,
    /// Deadline for the matching pong.
    pub pong: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            connect: constants::CONNECT_TIMEOUT,
            handshake: constants::HANDSHAKE_TIMEOUT,
            getaddr: constants::GETADDR_TIMEOUT,
            ping_interval: constants::PING_INTERVAL,
            pong: constants::PONG_TIMEOUT,
        }
    }
}

/// Events a connection reports to the swarm that owns it.
#[derive(Debug)]
pub enum PeerEvent {
    /// The handshake completed; the connection accepts requests now.
    Ready { addr: SocketAddr, peer: Peer },
    /// The peer gossiped addresses.
    Addrs {
        addr: SocketAddr,
        addrs: Vec<MetaAddr>,
    },
    /// The peer sent a batch of headers.
    Headers {
        addr: SocketAddr,
        headers: Vec<CountedHeader>,
    },
    /// No `addr` gossip arrived within the getaddr window.
    AddrTimeout { addr: SocketAddr },
    /// The connection ended; the handle can be discarded.
    Closed { addr: SocketAddr, reason: PeerError },
}

/// Requests the swarm can push into a connection.
#[derive(Debug)]
pub enum PeerRequest {
    /// Write a message to the remote peer.
    Send(Message),
    /// An addr batch from this peer taught the swarm at least one new
    /// address; stop waiting for gossip.
    AddrsAcknowledged,
    /// Tear the connection down.
    Shutdown,
}

/// The swarm's handle to one connection.
///
/// Dropping the handle does not tear down the connection; send
/// [`PeerRequest::Shutdown`] (or drop the whole channel) for that.
#[derive(Debug)]
pub struct ConnectionHandle {
    addr: SocketAddr,
    requests: mpsc::UnboundedSender<PeerRequest>,
}

impl ConnectionHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Push a request into the connection. Requests to a connection that
    /// already hung up are dropped silently; its `Closed` event is already
    /// on its way.
    pub fn send(&self, request: PeerRequest) {
        let _ = self.requests.send(request);
    }

    pub fn shutdown(&self) {
        let _ = self.requests.send(PeerRequest::Shutdown);
    }
}

/// Open a connection to `addr` and drive it as a background task.
///
/// Every outcome, including a failed TCP connect, is reported as a
/// [`PeerEvent::Closed`] on `events`.
pub fn connect(
    addr: SocketAddr,
    config: Config,
    timings: Timings,
    events: mpsc::UnboundedSender<PeerEvent>,
) -> ConnectionHandle {
    let (requests_tx, requests_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let reason = match time::timeout(timings.connect, TcpStream::connect(addr)).await {
            Err(_elapsed) => PeerError::ConnectTimeout,
            Ok(Err(e)) => PeerError::Io(e),
            Ok(Ok(stream)) => {
                Connection::new(addr, stream, config, timings, events.clone(), requests_rx)
                    .run()
                    .await
            }
        };
        debug!(%addr, %reason, "connection finished");
        let _ = events.send(PeerEvent::Closed { addr, reason });
    });
    ConnectionHandle {
        addr,
        requests: requests_tx,
    }
}

/// One peer connection: socket, read state, handshake state, timers.
///
/// Generic over the byte stream so tests can run it over an in-memory
/// duplex pipe instead of TCP.
pub struct Connection<S> {
    addr: SocketAddr,
    framed: tokio_util::codec::Framed<S, Codec>,
    state: HandshakeState,
    peer: Peer,
    config: Config,
    timings: Timings,
    events: mpsc::UnboundedSender<PeerEvent>,
    requests: mpsc::UnboundedReceiver<PeerRequest>,
    /// The nonce we sent in our `version`, to recognise self-connections.
    our_nonce: Nonce,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(
        addr: SocketAddr,
        stream: S,
        config: Config,
        timings: Timings,
        events: mpsc::UnboundedSender<PeerEvent>,
        requests: mpsc::UnboundedReceiver<PeerRequest>,
    ) -> Self {
        let codec = Codec::builder()
            .for_network(config.network)
            .with_metrics_label(addr.to_string())
            .finish();
        Self {
            addr,
            framed: tokio_util::codec::Framed::new(stream, codec),
            state: HandshakeState::NeedVersion,
            peer: Peer::new(addr),
            config,
            timings,
            events,
            requests,
            our_nonce: Nonce::default(),
        }
    }

    /// Drive the connection until it ends, returning why it ended.
    pub async fn run(mut self) -> PeerError {
        let reason = match self.handshake().await {
            Ok(()) => self.connected().await,
            Err(e) => e,
        };
        self.state = HandshakeState::Closing;
        reason
    }

    /// The version/verack exchange, bounded by one overall deadline.
    ///
    /// A `verack` that lands before the peer's `version` is tolerated and
    /// remembered; anything else early is a protocol violation.
    async fn handshake(&mut self) -> Result<(), PeerError> {
        self.send_version().await?;

        let deadline = Instant::now() + self.timings.handshake;
        let mut verack_seen = false;

        while self.state != HandshakeState::Connected {
            tokio::select! {
                result = time::timeout_at(deadline, self.framed.next()) => {
                    let msg = result
                        .map_err(|_elapsed| PeerError::HandshakeTimeout)?
                        .ok_or(PeerError::ConnectionClosed)??;
                    self.handle_handshake_message(msg, &mut verack_seen).await?;
                }
                request = self.requests.recv() => {
                    match request {
                        None | Some(PeerRequest::Shutdown) => return Err(PeerError::ClientShutdown),
                        Some(other) => trace!(%self.addr, ?other, "ignoring request during handshake"),
                    }
                }
            }
        }
        Ok(())
    }

    async fn handle_handshake_message(
        &mut self,
        msg: Message,
        verack_seen: &mut bool,
    ) -> Result<(), PeerError> {
        match (self.state, msg) {
            (HandshakeState::NeedVersion, Message::Version(remote)) => {
                debug!(
                    addr = %self.addr,
                    version = ?remote.version,
                    user_agent = %remote.user_agent,
                    "peer introduced itself",
                );
                self.peer.version = Some(remote.version);
                self.peer.services = Some(remote.services);
                self.peer.user_agent = Some(remote.user_agent);
                self.peer.nonce = Some(remote.nonce);
                self.peer.start_height = Some(remote.start_height);

                self.framed.send(Message::Verack).await?;
                self.state = if *verack_seen {
                    HandshakeState::Connected
                } else {
                    HandshakeState::NeedVerack
                };
                Ok(())
            }
            (HandshakeState::NeedVersion, Message::Verack) => {
                *verack_seen = true;
                Ok(())
            }
            (HandshakeState::NeedVerack, Message::Verack) => {
                self.state = HandshakeState::Connected;
                Ok(())
            }
            (state, msg) => Err(PeerError::WrongMessage {
                command: msg.to_string(),
                state,
            }),
        }
    }

    async fn send_version(&mut self) -> Result<(), PeerError> {
        let version = Version::new(
            self.config.protocol_version,
            self.addr,
            PeerServices::NODE_NETWORK,
            self.config.our_services,
            SocketAddr::from(([0, 0, 0, 0], self.config.port)),
            self.our_nonce,
            self.config.user_agent.clone(),
            block::Height(0),
            self.config.relay,
        );
        self.framed.send(Message::Version(version)).await?;
        Ok(())
    }

    /// The post-handshake loop: request gossip once, ping on an interval,
    /// and relay everything interesting to the swarm.
    async fn connected(&mut self) -> PeerError {
        if let Err(e) = self.framed.send(Message::GetAddr).await {
            return e.into();
        }
        let _ = self.events.send(PeerEvent::Ready {
            addr: self.addr,
            peer: self.peer.clone(),
        });

        let mut ping_interval = time::interval_at(
            Instant::now() + self.timings.ping_interval,
            self.timings.ping_interval,
        );
        let mut getaddr_deadline = Box::pin(time::sleep(self.timings.getaddr));
        let mut getaddr_pending = true;
        let mut pong_deadline = Box::pin(time::sleep(Duration::from_secs(0)));
        let mut pending_ping: Option<Nonce> = None;

        loop {
            tokio::select! {
                msg = self.framed.next() => {
                    let msg = match msg {
                        None => return PeerError::ConnectionClosed,
                        Some(Err(e)) => return e.into(),
                        Some(Ok(msg)) => msg,
                    };
                    if let Err(e) = self.handle_message(msg, &mut pending_ping).await {
                        return e;
                    }
                }
                request = self.requests.recv() => {
                    match request {
                        None | Some(PeerRequest::Shutdown) => return PeerError::ClientShutdown,
                        Some(PeerRequest::Send(msg)) => {
                            if let Err(e) = self.framed.send(msg).await {
                                return e.into();
                            }
                        }
                        Some(PeerRequest::AddrsAcknowledged) => getaddr_pending = false,
                    }
                }
                _ = ping_interval.tick() => {
                    let nonce = Nonce::default();
                    trace!(addr = %self.addr, ?nonce, "sending ping");
                    pending_ping = Some(nonce);
                    pong_deadline.as_mut().reset(Instant::now() + self.timings.pong);
                    if let Err(e) = self.framed.send(Message::Ping(nonce)).await {
                        return e.into();
                    }
                }
                _ = pong_deadline.as_mut(), if pending_ping.is_some() => {
                    return PeerError::PongTimeout(pending_ping.expect("guarded by the branch condition"));
                }
                _ = getaddr_deadline.as_mut(), if getaddr_pending => {
                    getaddr_pending = false;
                    debug!(addr = %self.addr, "no addr gossip within the getaddr window");
                    let _ = self.events.send(PeerEvent::AddrTimeout { addr: self.addr });
                }
            }
        }
    }

    /// Dispatch one post-handshake message.
    async fn handle_message(
        &mut self,
        msg: Message,
        pending_ping: &mut Option<Nonce>,
    ) -> Result<(), PeerError> {
        match msg {
            Message::Ping(nonce) => {
                self.framed.send(Message::Pong(nonce)).await?;
            }
            Message::Pong(nonce) => match pending_ping.take() {
                Some(expected) if expected == nonce => {
                    trace!(addr = %self.addr, "pong matched");
                }
                Some(expected) => {
                    return Err(PeerError::PongMismatch {
                        expected,
                        got: nonce,
                    });
                }
                None => {
                    trace!(addr = %self.addr, "ignoring unsolicited pong");
                }
            },
            Message::Addr(addrs) => {
                debug!(addr = %self.addr, count = addrs.len(), "peer gossiped addresses");
                let _ = self.events.send(PeerEvent::Addrs {
                    addr: self.addr,
                    addrs,
                });
            }
            Message::Headers(headers) => {
                let _ = self.events.send(PeerEvent::Headers {
                    addr: self.addr,
                    headers,
                });
            }
            Message::Reject {
                message,
                ccode,
                reason,
                ..
            } => {
                // noisy peers are not protocol violators; log and carry on
                error!(
                    addr = %self.addr,
                    %message,
                    ?ccode,
                    %reason,
                    "peer rejected one of our messages",
                );
            }
            Message::Version(_) | Message::Verack => {
                return Err(PeerError::WrongMessage {
                    command: msg.to_string(),
                    state: self.state,
                });
            }
            // serving data is out of scope
            other @ Message::GetAddr
            | other @ Message::GetBlocks(_)
            | other @ Message::GetHeaders(_)
            | other @ Message::Inv(_)
            | other @ Message::Mempool
            | other @ Message::SendHeaders => {
                debug!(addr = %self.addr, %other, "ignoring message this client does not serve");
            }
        }
        Ok(())
    }
}
