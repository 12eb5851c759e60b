//! Transaction identifiers.
//!
//! This client ignores transactions, but `inv` messages on the wire still
//! carry transaction hashes, so the identifier type exists to keep those
//! messages fully typed.

use std::{fmt, io};

use serde::{Deserialize, Serialize};

use crate::serialization::{BitcoinDeserialize, BitcoinSerialize, SerializationError};

/// A hash of a transaction, in display orientation like [`crate::block::Hash`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Hash(pub [u8; 32]);

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("transaction::Hash")
            .field(&hex::encode(&self.0))
            .finish()
    }
}

impl BitcoinSerialize for Hash {
    fn bitcoin_serialize<W: io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        let mut bytes = self.0;
        bytes.reverse();
        target.write_all(&bytes)
    }
}

impl BitcoinDeserialize for Hash {
    fn bitcoin_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError>
    where
        Self: Sized,
    {
        let mut bytes = <[u8; 32]>::bitcoin_deserialize(&mut reader)?;
        bytes.reverse();
        Ok(Hash(bytes))
    }
}
