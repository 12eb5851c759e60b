//! The set of peers we could connect to.

use std::collections::HashMap;
use std::net::SocketAddr;

use indexmap::{IndexMap, IndexSet};
use rand::Rng;

use crate::meta_addr::MetaAddr;
use crate::peer::ConnectionHandle;

/// Candidate peers, split by how much we know about them.
///
/// Seed addresses come from DNS and are bare endpoints; learned peers come
/// from `addr` gossip and handshakes and carry metadata. Selection prefers
/// learned peers, because a peer another node vouched for recently beats a
/// seed entry of unknown age.
#[derive(Debug, Default)]
pub struct AddressBook {
    seeds: IndexSet<SocketAddr>,
    known: IndexMap<SocketAddr, MetaAddr>,
}

impl AddressBook {
    pub fn new() -> AddressBook {
        AddressBook::default()
    }

    /// Record an address from a DNS seed. Returns whether it was new.
    pub fn add_seed(&mut self, addr: SocketAddr) -> bool {
        self.seeds.insert(addr)
    }

    /// Record or refresh a learned peer. Returns whether the address was
    /// previously unknown to the learned set.
    pub fn update(&mut self, meta: MetaAddr) -> bool {
        self.known.insert(meta.addr, meta).is_none()
    }

    /// Total number of candidate addresses, connected or not.
    pub fn len(&self) -> usize {
        self.known.len() + self.seeds.iter().filter(|a| !self.known.contains_key(*a)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty() && self.seeds.is_empty()
    }

    /// Pick a peer we are not currently connected to, uniformly at random,
    /// preferring the learned set over the seed set. `avoid` additionally
    /// excludes a peer we just lost, so its replacement is a distinct one.
    pub fn select_peer(
        &self,
        connected: &HashMap<SocketAddr, ConnectionHandle>,
        avoid: Option<SocketAddr>,
    ) -> Option<SocketAddr> {
        let eligible = |addr: &SocketAddr| !connected.contains_key(addr) && Some(*addr) != avoid;

        let learned: Vec<SocketAddr> = self.known.keys().copied().filter(eligible).collect();
        if let Some(addr) = pick(&learned) {
            return Some(addr);
        }

        let seeds: Vec<SocketAddr> = self.seeds.iter().copied().filter(eligible).collect();
        pick(&seeds)
    }

    /// Pick an unconnected seed address at random.
    pub fn select_seed(
        &self,
        connected: &HashMap<SocketAddr, ConnectionHandle>,
    ) -> Option<SocketAddr> {
        let seeds: Vec<SocketAddr> = self
            .seeds
            .iter()
            .copied()
            .filter(|addr| !connected.contains_key(addr))
            .collect();
        pick(&seeds)
    }
}

fn pick(candidates: &[SocketAddr]) -> Option<SocketAddr> {
    if candidates.is_empty() {
        return None;
    }
    let index = rand::thread_rng().gen_range(0..candidates.len());
    Some(candidates[index])
}
