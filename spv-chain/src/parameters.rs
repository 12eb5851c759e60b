//! Consensus parameters for the supported Bitcoin networks.

mod checkpoint;
mod genesis;
mod network;

pub use checkpoint::checkpoint_hash;
pub use genesis::{genesis_hash, genesis_header, GENESIS_PREVIOUS_BLOCK_HASH};
pub use network::Network;
