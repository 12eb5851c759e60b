use serde::{Deserialize, Serialize};
use spv_serde_derive::{BtcDeserialize, BtcSerialize};

use crate::{BitcoinDeserialize, BitcoinSerialize, SerializationError};

/// The height of a block in its chain: the number of ancestors between it
/// and the genesis block, which sits at height zero.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Serialize,
    Deserialize,
    BtcSerialize,
    BtcDeserialize,
)]
pub struct Height(pub u32);

impl Height {
    pub const MAX: Height = Height(u32::MAX);

    /// The height of the block after one at this height.
    pub fn succ(self) -> Height {
        Height(self.0 + 1)
    }
}

impl std::fmt::Display for Height {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
