//! Generate header-chain testing constructions
use chrono::{Duration, Utc};

use crate::parameters::{genesis_header, Network};
use crate::work::difficulty::CompactDifficulty;

use super::super::{merkle, Header};

/// Generate a header whose parent is `parent`, with a synthetic merkle root
/// derived from `salt` so sibling headers get distinct hashes.
pub fn child_of(parent: &Header, salt: u8) -> Header {
    Header::new(
        parent.version,
        parent.hash(),
        merkle::Root([salt; 32]),
        parent.time + Duration::minutes(10),
        parent.difficulty_threshold,
        u32::from(salt),
    )
}

/// Generate a chain of `len` headers starting from the genesis block of
/// `network`, genesis included.
pub fn chain(network: Network, len: usize) -> Vec<Header> {
    let mut headers = Vec::with_capacity(len);
    headers.push(genesis_header(network));
    for i in 1..len {
        let child = child_of(headers.last().expect("chain is never empty"), i as u8);
        headers.push(child);
    }
    headers
}

/// Generate a standalone header unconnected to any chain.
pub fn orphan_header() -> Header {
    Header::new(
        2,
        super::super::Hash([0xab; 32]),
        merkle::Root([0xcd; 32]),
        Utc::now(),
        CompactDifficulty(0x1d00_ffff),
        7,
    )
}
