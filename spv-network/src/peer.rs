//! Per-peer connection handling.

mod connection;
mod error;

pub use connection::{
    connect, Connection, ConnectionHandle, HandshakeState, Peer, PeerEvent, PeerRequest, Timings,
};
pub use error::PeerError;
