//! The swarm-level client.
//!
//! One [`Client`] owns the chain store, the address book, and every
//! [`ConnectionHandle`]. It discovers peers through DNS seeds, keeps the
//! connection pool at its target size with replacement, and iterates
//! `getheaders` against one peer at a time until the tip is caught up.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::pin::Pin;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Sleep};

use spv_chain::block::CountedHeader;
use spv_state::{ChainStore, PutOutcome, StoreError};

use crate::address_book::AddressBook;
use crate::config::Config;
use crate::constants;
use crate::meta_addr::MetaAddr;
use crate::peer::{
    connect, ConnectionHandle, Peer, PeerError, PeerEvent, PeerRequest, Timings,
};
use crate::protocol::external::message::GetHeaders;
use crate::protocol::external::Message;

/// A fatal, process-ending failure.
///
/// Per-peer trouble never lands here; it is absorbed by connection
/// replacement. What remains is chain-integrity or resource failure.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The chain store failed or detected an integrity violation.
    #[error("chain store error: {0}")]
    Store(#[from] StoreError),

    /// A peer was needed and there was nobody left to call.
    #[error("no candidate peers available")]
    NoCandidatePeers,
}

/// The swarm: every connection, the known-peer set, and the sync driver.
pub struct Client {
    config: Config,
    store: ChainStore,
    address_book: AddressBook,
    connections: HashMap<SocketAddr, ConnectionHandle>,
    ready: HashSet<SocketAddr>,
    timings: Timings,

    events_tx: mpsc::UnboundedSender<PeerEvent>,
    events_rx: mpsc::UnboundedReceiver<PeerEvent>,
    dns_tx: mpsc::UnboundedSender<Vec<SocketAddr>>,
    dns_rx: mpsc::UnboundedReceiver<Vec<SocketAddr>>,
    dns_lookups: Vec<JoinHandle<()>>,

    /// The peer holding the one outstanding `getheaders`, if any.
    sync_peer: Option<SocketAddr>,
    header_deadline: Pin<Box<Sleep>>,

    shutdown: bool,
}

impl Client {
    pub fn new(config: Config, store: ChainStore) -> Client {
        Client::with_timings(config, store, Timings::default())
    }

    /// A client with non-default timers, for tests.
    pub fn with_timings(config: Config, store: ChainStore, timings: Timings) -> Client {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (dns_tx, dns_rx) = mpsc::unbounded_channel();
        Client {
            config,
            store,
            address_book: AddressBook::new(),
            connections: HashMap::new(),
            ready: HashSet::new(),
            timings,
            events_tx,
            events_rx,
            dns_tx,
            dns_rx,
            dns_lookups: Vec::new(),
            sync_peer: None,
            header_deadline: Box::pin(time::sleep(Duration::from_secs(0))),
            shutdown: false,
        }
    }

    /// The store, for inspection after `run` returns.
    pub fn store(&self) -> &ChainStore {
        &self.store
    }

    /// Run until shutdown is signalled or a fatal error occurs.
    ///
    /// Either way every connection, timer, and DNS request is torn down
    /// and the tip is saved before this returns.
    pub async fn run(
        &mut self,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), ClientError> {
        info!(network = %self.config.network, "starting client");
        self.begin_dns_lookups();
        let seeded: Vec<SocketAddr> = self.config.initial_peers.clone();
        for addr in seeded {
            self.address_book.add_seed(addr);
        }
        self.fill_connections();

        let result = self.event_loop(&mut shutdown).await;
        self.shutdown();
        if let Err(error) = self.store.save_tip() {
            warn!(%error, "failed to save the tip during shutdown");
        }
        result
    }

    async fn event_loop(
        &mut self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), ClientError> {
        loop {
            tokio::select! {
                Some(event) = self.events_rx.recv() => self.handle_peer_event(event)?,
                Some(addrs) = self.dns_rx.recv() => self.handle_dns_addrs(addrs),
                _ = self.header_deadline.as_mut(), if self.sync_peer.is_some() => {
                    self.handle_header_timeout()?
                }
                _ = shutdown.changed() => {
                    info!("shutdown requested");
                    return Ok(());
                }
            }
        }
    }

    /// Tear everything down. Idempotent.
    pub fn shutdown(&mut self) {
        if self.shutdown {
            return;
        }
        self.shutdown = true;
        info!(
            connections = self.connections.len(),
            "shutting down the swarm",
        );
        for (_, handle) in self.connections.drain() {
            handle.shutdown();
        }
        self.ready.clear();
        self.sync_peer = None;
        for lookup in self.dns_lookups.drain(..) {
            lookup.abort();
        }
    }

    /// Kick off one non-blocking lookup per configured DNS seed.
    fn begin_dns_lookups(&mut self) {
        let port = self.config.port;
        for seed in self.config.dns_seeds.clone() {
            let dns_tx = self.dns_tx.clone();
            debug!(%seed, "resolving DNS seed");
            self.dns_lookups.push(tokio::spawn(async move {
                match tokio::net::lookup_host((seed.as_str(), port)).await {
                    Ok(addrs) => {
                        let _ = dns_tx.send(addrs.collect());
                    }
                    Err(error) => debug!(%seed, %error, "DNS seed lookup failed"),
                }
            }));
        }
    }

    fn handle_dns_addrs(&mut self, addrs: Vec<SocketAddr>) {
        let mut new = 0;
        for addr in addrs {
            if self.address_book.add_seed(addr) {
                new += 1;
            }
        }
        debug!(new, "learned addresses from a DNS seed");
        self.fill_connections();
    }

    fn handle_peer_event(&mut self, event: PeerEvent) -> Result<(), ClientError> {
        match event {
            PeerEvent::Ready { addr, peer } => self.handle_ready(addr, peer)?,
            PeerEvent::Addrs { addr, addrs } => self.handle_addrs(addr, addrs),
            PeerEvent::Headers { addr, headers } => self.handle_headers(addr, headers)?,
            PeerEvent::AddrTimeout { addr } => self.handle_addr_timeout(addr),
            PeerEvent::Closed { addr, reason } => self.handle_closed(addr, reason)?,
        }
        Ok(())
    }

    fn handle_ready(&mut self, addr: SocketAddr, peer: Peer) -> Result<(), ClientError> {
        info!(
            %addr,
            user_agent = peer.user_agent.as_deref().unwrap_or(""),
            "peer connection ready",
        );
        self.ready.insert(addr);
        if let Some(services) = peer.services {
            self.address_book.update(MetaAddr::new(addr, services));
        }

        // start (or resume) syncing once somebody can serve headers
        if self.sync_peer.is_none()
            && !self
                .store
                .tip_is_recent(constants::TIP_RECENCY_CUTOFF_SECS)
        {
            self.request_headers(None)?;
        }
        Ok(())
    }

    fn handle_addrs(&mut self, addr: SocketAddr, addrs: Vec<MetaAddr>) {
        let mut new = 0;
        for meta in addrs {
            if self.address_book.update(meta) {
                new += 1;
            }
        }
        if new > 0 {
            debug!(%addr, new, "learned peers from addr gossip");
            if let Some(handle) = self.connections.get(&addr) {
                handle.send(PeerRequest::AddrsAcknowledged);
            }
            metrics::gauge!("peers.known").set(self.address_book.len() as f64);
            self.fill_connections();
        }
    }

    fn handle_headers(
        &mut self,
        addr: SocketAddr,
        headers: Vec<CountedHeader>,
    ) -> Result<(), ClientError> {
        if headers.is_empty() {
            if self.sync_peer.take() == Some(addr) {
                info!(height = %self.store.height(), "header chain is caught up");
            }
            return Ok(());
        }

        debug!(%addr, count = headers.len(), "ingesting headers");
        let mut progressed = false;
        for counted in headers {
            match self.store.put_header(counted.header) {
                Ok(PutOutcome::Attached(_)) | Ok(PutOutcome::Orphaned) => progressed = true,
                Ok(PutOutcome::AlreadyStored) => {}
                Err(StoreError::InvalidHeader(reason)) => {
                    // the header is the peer's fault, not ours
                    warn!(%addr, reason, "peer sent an invalid header");
                    self.notify_error(addr, PeerError::WrongMessage {
                        command: "headers".to_owned(),
                        state: crate::peer::HandshakeState::Connected,
                    })?;
                    return Ok(());
                }
                Err(fatal) => return Err(fatal.into()),
            }
        }
        self.store.save_tip()?;
        metrics::gauge!("sync.height").set(self.store.height().0 as f64);

        // same peer, next batch; a batch of nothing but known headers
        // would loop forever, so it ends the cycle instead
        if self.sync_peer == Some(addr) {
            self.sync_peer = None;
            if progressed {
                self.request_headers(None)?;
            } else {
                warn!(%addr, "peer resent known headers; ending this sync cycle");
            }
        }
        Ok(())
    }

    fn handle_addr_timeout(&mut self, addr: SocketAddr) {
        if self.shutdown || self.connections.len() >= self.config.target_connections {
            return;
        }
        // this peer has no gossip for us; bring in a fresh seed peer
        if let Some(seed) = self.address_book.select_seed(&self.connections) {
            debug!(quiet = %addr, replacement = %seed, "trying another seed peer");
            self.open_connection(seed);
        }
    }

    fn handle_closed(&mut self, addr: SocketAddr, reason: PeerError) -> Result<(), ClientError> {
        match reason {
            PeerError::ClientShutdown => debug!(%addr, "connection closed"),
            ref transient @ PeerError::Io(_)
            | ref transient @ PeerError::ConnectTimeout
            | ref transient @ PeerError::ConnectionClosed => {
                debug!(%addr, error = %transient, "lost connection")
            }
            ref violation => warn!(%addr, error = %violation, "dropping misbehaving peer"),
        }
        self.notify_error(addr, reason)
    }

    /// The single entry point for a dead or misbehaving connection: remove
    /// it, restart sync elsewhere if it held the outstanding request, and
    /// attempt one replacement.
    fn notify_error(&mut self, addr: SocketAddr, _reason: PeerError) -> Result<(), ClientError> {
        if let Some(handle) = self.connections.remove(&addr) {
            handle.shutdown();
        }
        self.ready.remove(&addr);
        metrics::gauge!("peers.connected").set(self.connections.len() as f64);

        if self.shutdown {
            return Ok(());
        }

        if self.sync_peer == Some(addr) {
            self.sync_peer = None;
            self.request_headers(Some(addr))?;
        }

        // selection with an empty book is a programming error upstream:
        // nothing can refill the pool, so the client cannot make progress
        if self.address_book.is_empty() {
            return Err(ClientError::NoCandidatePeers);
        }

        // replace the lost connection with a distinct peer
        match self.address_book.select_peer(&self.connections, Some(addr)) {
            Some(replacement) => self.open_connection(replacement),
            None => debug!(%addr, "no distinct replacement peer available yet"),
        }
        Ok(())
    }

    /// Open connections until the pool reaches its target size.
    fn fill_connections(&mut self) {
        while !self.shutdown && self.connections.len() < self.config.target_connections {
            match self.address_book.select_peer(&self.connections, None) {
                Some(addr) => self.open_connection(addr),
                None => break,
            }
        }
    }

    fn open_connection(&mut self, addr: SocketAddr) {
        debug!(%addr, "opening connection");
        let handle = connect(
            addr,
            self.config.clone(),
            self.timings,
            self.events_tx.clone(),
        );
        self.connections.insert(addr, handle);
        metrics::gauge!("peers.connected").set(self.connections.len() as f64);
    }

    /// Issue the next `getheaders` against a ready peer, avoiding
    /// `exclude` (the peer that just failed us).
    ///
    /// The locator is the tip hash alone; with one outstanding request at
    /// a time, the reply either extends the tip or tells us we are done.
    fn request_headers(&mut self, exclude: Option<SocketAddr>) -> Result<(), ClientError> {
        let candidates: Vec<SocketAddr> = self
            .ready
            .iter()
            .copied()
            .filter(|a| Some(*a) != exclude && self.connections.contains_key(a))
            .collect();
        let peer = match pick_random(&candidates) {
            Some(peer) => peer,
            None => {
                // nobody to ask right now; the next Ready event restarts sync
                debug!("no ready peer to request headers from");
                return Ok(());
            }
        };

        let request = Message::GetHeaders(GetHeaders {
            block_locator_hashes: vec![self.store.tip().header.hash()],
            stop_hash: None,
        });
        debug!(%peer, tip = %self.store.height(), "requesting headers");
        if let Some(handle) = self.connections.get(&peer) {
            handle.send(PeerRequest::Send(request));
        }
        self.sync_peer = Some(peer);

        let jitter = rand::thread_rng().gen_range(constants::HEADERS_TIMEOUT_SECS);
        self.header_deadline
            .as_mut()
            .reset(Instant::now() + Duration::from_secs(jitter));
        Ok(())
    }

    /// The outstanding `getheaders` went unanswered; ask somebody else.
    fn handle_header_timeout(&mut self) -> Result<(), ClientError> {
        let stalled = self.sync_peer.take();
        if let Some(peer) = stalled {
            warn!(%peer, "header request timed out");
        }
        self.request_headers(stalled)
    }
}

fn pick_random(candidates: &[SocketAddr]) -> Option<SocketAddr> {
    if candidates.is_empty() {
        return None;
    }
    let index = rand::thread_rng().gen_range(0..candidates.len());
    Some(candidates[index])
}
