//! Core data structures for a Bitcoin header chain: block headers and their
//! hashes, the wire serialization framework they share with the network
//! protocol, and the consensus parameters (genesis blocks, checkpoints,
//! difficulty encoding) a header-only client needs.

#![allow(clippy::unit_arg)]

#[macro_use]
extern crate serde;

pub mod block;
pub mod compactint;
pub mod parameters;
pub mod serialization;
pub mod transaction;
pub mod work;

mod cached;

pub use cached::Cached;
pub use serialization::{
    BitcoinDeserialize, BitcoinDeserializeInto, BitcoinSerialize, SerializationError,
};
