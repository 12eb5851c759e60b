//! Byte encodings for sled keys and values.
//!
//! Values hold hashes in display orientation; keys hold the raw internal
//! byte order so the height index stays sortable and hash keys match the
//! wire bytes.

use std::convert::TryInto;

use spv_chain::{block, BitcoinDeserialize, BitcoinSerialize};

use super::ChainHeader;
use crate::StoreError;

/// One-byte discriminator for the hash view: `h` + internal hash bytes.
pub(super) const HEADER_PREFIX: u8 = b'h';
/// One-byte discriminator for the height view: `y` + big-endian height.
pub(super) const HEIGHT_PREFIX: u8 = b'y';
/// One-byte discriminator for the orphan view: `o` + internal parent hash.
pub(super) const ORPHAN_PREFIX: u8 = b'o';
/// The reserved key holding the canonical tip hash.
pub(super) const TIP_KEY: &[u8] = b"tip";

/// Length of an encoded [`ChainHeader`]: the 80 wire bytes plus the height.
const CHAIN_HEADER_LEN: usize = 88;

pub(super) fn header_key(hash: &block::Hash) -> [u8; 33] {
    prefixed_hash_key(HEADER_PREFIX, hash)
}

pub(super) fn orphan_key(parent: &block::Hash) -> [u8; 33] {
    prefixed_hash_key(ORPHAN_PREFIX, parent)
}

pub(super) fn height_key(height: block::Height) -> [u8; 9] {
    let mut key = [0u8; 9];
    key[0] = HEIGHT_PREFIX;
    key[1..].copy_from_slice(&(height.0 as u64).to_be_bytes());
    key
}

fn prefixed_hash_key(prefix: u8, hash: &block::Hash) -> [u8; 33] {
    let mut key = [0u8; 33];
    key[0] = prefix;
    key[1..].copy_from_slice(&hash.reversed());
    key
}

/// Conversion into sled's value representation.
pub(super) trait IntoSled {
    fn as_sled_bytes(&self) -> Vec<u8>;
}

/// Fallible conversion out of sled's value representation.
pub(super) trait FromSled: Sized {
    fn from_ivec(bytes: &sled::IVec) -> Result<Self, StoreError>;
}

impl IntoSled for ChainHeader {
    fn as_sled_bytes(&self) -> Vec<u8> {
        let mut bytes = self
            .header
            .bitcoin_serialize_to_vec()
            .expect("serializing to a vec is infallible");
        bytes.extend_from_slice(&(self.height.0 as u64).to_le_bytes());
        bytes
    }
}

impl FromSled for ChainHeader {
    fn from_ivec(bytes: &sled::IVec) -> Result<Self, StoreError> {
        if bytes.len() != CHAIN_HEADER_LEN {
            return Err(StoreError::Corrupt("header entry has the wrong length"));
        }
        let header = block::Header::bitcoin_deserialize(&bytes[..80])?;
        let height: [u8; 8] = bytes[80..]
            .try_into()
            .expect("length was checked above");
        let height = u64::from_le_bytes(height);
        if height > u32::MAX as u64 {
            return Err(StoreError::Corrupt("stored height out of range"));
        }
        Ok(ChainHeader {
            header,
            height: block::Height(height as u32),
        })
    }
}

impl IntoSled for block::Hash {
    fn as_sled_bytes(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl FromSled for block::Hash {
    fn from_ivec(bytes: &sled::IVec) -> Result<Self, StoreError> {
        let bytes: [u8; 32] = bytes
            .as_ref()
            .try_into()
            .map_err(|_| StoreError::Corrupt("hash entry has the wrong length"))?;
        Ok(block::Hash(bytes))
    }
}
