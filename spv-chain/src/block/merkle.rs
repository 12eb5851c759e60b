//! The Merkle root commitment carried in a block header.
//!
//! Header-only clients never recompute this tree; the type exists so the
//! header round-trips byte for byte.

use std::fmt;

use serde::{Deserialize, Serialize};
use spv_serde_derive::{BtcDeserialize, BtcSerialize};

use crate::{BitcoinDeserialize, BitcoinSerialize, SerializationError};

/// The root of the transaction Merkle tree, in wire byte order.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, BtcSerialize, BtcDeserialize)]
pub struct Root(pub [u8; 32]);

impl fmt::Debug for Root {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut reversed_bytes = self.0;
        reversed_bytes.reverse();
        f.debug_tuple("merkle::Root")
            .field(&hex::encode(&reversed_bytes))
            .finish()
    }
}

impl std::str::FromStr for Root {
    type Err = SerializationError;

    /// Parses the display (big-endian) form into wire order.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0; 32];
        if hex::decode_to_slice(s, &mut bytes[..]).is_err() {
            Err(SerializationError::Parse("hex decoding error"))
        } else {
            bytes.reverse();
            Ok(Root(bytes))
        }
    }
}
