//! Networking code for the SPV client: the Bitcoin wire codec, the
//! per-peer connection state machine, and the swarm-level client that
//! keeps a pool of peers alive and drives header synchronisation.

#[macro_use]
extern crate tracing;

mod address_book;
mod client;
mod config;
mod meta_addr;
mod peer;
mod protocol;

pub mod constants;

pub use address_book::AddressBook;
pub use client::{Client, ClientError};
pub use config::Config;
pub use meta_addr::MetaAddr;
pub use peer::{
    connect, Connection, ConnectionHandle, HandshakeState, Peer, PeerError, PeerEvent,
    PeerRequest, Timings,
};
pub use protocol::external::message::{GetBlocks, GetHeaders, RejectReason};
pub use protocol::external::types::{Nonce, PeerServices, ProtocolVersion};
pub use protocol::external::{Codec, Command, InventoryHash, Message, Version};

/// A boxed error for channel and task plumbing.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
