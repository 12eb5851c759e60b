//! Persistent storage for the header chain.
//!
//! The store keeps every header it has ever seen in an embedded sled
//! database, indexed by hash and by height, resolves orphan headers when
//! their parents arrive, and tracks the best tip across restarts.

mod config;
mod error;
mod sled_state;

pub use config::Config;
pub use error::StoreError;
pub use sled_state::{ChainHeader, ChainStore, PutOutcome};
