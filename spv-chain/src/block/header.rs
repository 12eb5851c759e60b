use std::io::{self, Cursor, Write};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::compactint::CompactInt;
use crate::serialization::{sha256d, BitcoinDeserialize, BitcoinSerialize, SerializationError};
use crate::{cached::Cached, work::difficulty::CompactDifficulty};

use super::{merkle, Hash};

/// A block header, containing metadata about a block.
///
/// How are blocks chained together? They are chained together via the
/// backwards reference (previous header hash) present in the block
/// header. Each block points backwards to its parent, all the way
/// back to the genesis block (the first block in the blockchain).
#[derive(
    Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize,
)]
pub struct Header {
    /// The block's version field.
    pub version: u32,

    /// The hash of the previous block, used to create a chain of blocks back to
    /// the genesis block.
    ///
    /// This ensures no previous block can be changed without also changing this
    /// block's header.
    pub previous_block_hash: Hash,

    /// The root of the transaction Merkle tree, binding the block header to
    /// the transactions in the block.
    pub merkle_root: merkle::Root,

    /// The block timestamp is a Unix epoch time (UTC) when the miner
    /// started hashing the header (according to the miner).
    pub time: DateTime<Utc>,

    /// An encoded version of the target threshold this block's header
    /// hash must be less than or equal to, in the same nBits format
    /// used by Bitcoin.
    ///
    /// [Bitcoin-nBits](https://bitcoin.org/en/developer-reference#target-nbits)
    pub difficulty_threshold: CompactDifficulty,

    /// An arbitrary field that miners can change to modify the header
    /// hash in order to produce a hash less than or equal to the
    /// target threshold.
    pub nonce: u32,

    /// For efficiency, we cache the hash of this block after computing it the
    /// first time. This field is not part of the consensus serialization.
    hash: Cached<Hash>,
}

impl Header {
    /// Returns length of a serialized header in bytes
    pub const fn len() -> usize {
        80
    }

    pub fn new(
        version: u32,
        previous_block_hash: Hash,
        merkle_root: merkle::Root,
        time: DateTime<Utc>,
        difficulty_threshold: CompactDifficulty,
        nonce: u32,
    ) -> Header {
        Header {
            version,
            previous_block_hash,
            merkle_root,
            time,
            difficulty_threshold,
            nonce,
            hash: Cached::new(),
        }
    }

    /// The hash of this header, cached when the header was deserialized.
    pub fn hash(&self) -> Hash {
        match self.hash.value() {
            Some(hash) => hash,
            None => Hash::from(self),
        }
    }

    /// Age of the header's timestamp relative to the current wall clock,
    /// in seconds. Headers with future timestamps report zero.
    pub fn age(&self) -> u32 {
        let age = Utc::now().timestamp() - self.time.timestamp();
        if age < 0 {
            0
        } else if age > u32::MAX as i64 {
            u32::MAX
        } else {
            age as u32
        }
    }
}

impl BitcoinSerialize for Header {
    fn bitcoin_serialize<W: io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        self.version.bitcoin_serialize(&mut target)?;
        self.previous_block_hash.bitcoin_serialize(&mut target)?;
        self.merkle_root.bitcoin_serialize(&mut target)?;
        self.time.bitcoin_serialize(&mut target)?;
        self.difficulty_threshold.bitcoin_serialize(&mut target)?;
        self.nonce.bitcoin_serialize(&mut target)?;
        Ok(())
    }
}

impl BitcoinDeserialize for Header {
    /// Reads exactly the 80 header bytes, hashing them as a side effect so
    /// the parsed header arrives with its hash pre-cached.
    fn bitcoin_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError>
    where
        Self: Sized,
    {
        let mut raw = [0u8; 80];
        reader.read_exact(&mut raw)?;

        let mut hash_writer = sha256d::Writer::default();
        hash_writer
            .write_all(&raw)
            .expect("Sha256dWriter is infallible");
        let mut hash_bytes = hash_writer.finish();
        hash_bytes.reverse();
        let own_hash = Hash::from_bytes_exact(hash_bytes);

        let mut src = Cursor::new(&raw[..]);
        Ok(Header {
            version: u32::bitcoin_deserialize(&mut src)?,
            previous_block_hash: Hash::bitcoin_deserialize(&mut src)?,
            merkle_root: merkle::Root::bitcoin_deserialize(&mut src)?,
            time: <DateTime<Utc>>::bitcoin_deserialize(&mut src)?,
            difficulty_threshold: CompactDifficulty::bitcoin_deserialize(&mut src)?,
            nonce: u32::bitcoin_deserialize(&mut src)?,
            hash: Cached::from(own_hash),
        })
    }
}

/// A header with a count of the number of transactions in its block.
///
/// This structure is used in the `headers` message of the Bitcoin network
/// protocol; the count is always zero there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountedHeader {
    pub header: Header,
    pub transaction_count: usize,
}

impl BitcoinSerialize for CountedHeader {
    fn bitcoin_serialize<W: io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        self.header.bitcoin_serialize(&mut target)?;
        CompactInt::from(self.transaction_count).bitcoin_serialize(&mut target)?;
        Ok(())
    }
}

impl BitcoinDeserialize for CountedHeader {
    fn bitcoin_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError>
    where
        Self: Sized,
    {
        Ok(CountedHeader {
            header: Header::bitcoin_deserialize(&mut reader)?,
            transaction_count: CompactInt::bitcoin_deserialize(&mut reader)?.value() as usize,
        })
    }
}
