use thiserror::Error;

use spv_chain::block;

/// An error from the chain store.
///
/// Everything except [`StoreError::InvalidHeader`] is an integrity or
/// resource failure and is fatal to the process; `InvalidHeader` blames the
/// peer that supplied the header.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The database itself failed.
    #[error("database error: {0}")]
    Sled(#[from] sled::Error),

    /// A stored value could not be decoded.
    #[error("corrupt database entry: {0}")]
    Corrupt(&'static str),

    /// A stored or incoming value failed to (de)serialize.
    #[error("serialization error: {0}")]
    Serialization(#[from] spv_chain::SerializationError),

    /// The chain contradicts a hard-coded checkpoint.
    #[error("checkpoint mismatch at height {height}: expected {expected}, found {found}")]
    CheckpointMismatch {
        height: block::Height,
        expected: block::Hash,
        found: block::Hash,
    },

    /// A header was looked up that the store has never seen.
    #[error("no stored header with hash {0}")]
    MissingHeader(block::Hash),

    /// A peer handed us a header the store refuses to hold.
    #[error("invalid header: {0}")]
    InvalidHeader(&'static str),
}
