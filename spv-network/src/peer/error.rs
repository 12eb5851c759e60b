use thiserror::Error;

use spv_chain::SerializationError;

use super::connection::HandshakeState;
use crate::protocol::external::types::Nonce;

/// Why a connection ended.
///
/// Everything here is scoped to one peer: the swarm logs the reason,
/// removes the connection, and tries a replacement. Nothing a peer does
/// aborts the process.
#[derive(Error, Debug)]
pub enum PeerError {
    /// The frame layer rejected incoming bytes (bad magic, bad checksum,
    /// an oversized list, or a malformed body).
    #[error("serialization error: {0}")]
    Serialization(#[from] SerializationError),

    /// The socket failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The TCP connect did not complete in time.
    #[error("connect attempt timed out")]
    ConnectTimeout,

    /// The peer did not finish the version/verack exchange in time.
    #[error("peer did not complete the handshake in time")]
    HandshakeTimeout,

    /// The peer spoke out of turn.
    #[error("peer sent '{command}' in state {state:?}")]
    WrongMessage {
        command: String,
        state: HandshakeState,
    },

    /// The peer answered our ping with somebody else's nonce.
    #[error("peer answered ping {expected:?} with pong {got:?}")]
    PongMismatch { expected: Nonce, got: Nonce },

    /// The peer did not answer our ping at all.
    #[error("peer did not answer ping {0:?} in time")]
    PongTimeout(Nonce),

    /// The peer hung up.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// We hung up.
    #[error("connection shut down locally")]
    ClientShutdown,
}
