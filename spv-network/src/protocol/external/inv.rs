//! Inventory items for the Bitcoin protocol.

use std::io::{Read, Write};

use spv_chain::{
    block,
    serialization::{BitcoinDeserialize, BitcoinSerialize, SerializationError},
    transaction,
};

/// An inventory hash which refers to some advertised or requested data.
///
/// Bitcoin calls this an "inventory vector" but it is just a typed hash, not a
/// container, so we do not use that term to avoid confusion with `Vec<T>`.
///
/// This client never requests data, so these are decoded, logged, and
/// dropped; the type keeps the decoding honest.
///
/// [Bitcoin reference](https://en.bitcoin.it/wiki/Protocol_documentation#Inventory_Vectors)
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum InventoryHash {
    /// An error.
    ///
    /// The Bitcoin wiki just says "Any data of with this number may be ignored",
    /// so we don't include a typed hash.
    Error,
    /// A hash of a transaction.
    Tx(transaction::Hash),
    /// A hash of a block.
    Block(block::Hash),
    /// A hash of a filtered block.
    ///
    /// Only meaningful to peers that have loaded a bloom filter.
    FilteredBlock(block::Hash),
}

impl From<transaction::Hash> for InventoryHash {
    fn from(tx: transaction::Hash) -> InventoryHash {
        InventoryHash::Tx(tx)
    }
}

impl From<block::Hash> for InventoryHash {
    fn from(hash: block::Hash) -> InventoryHash {
        InventoryHash::Block(hash)
    }
}

impl BitcoinSerialize for InventoryHash {
    fn bitcoin_serialize<W: Write>(&self, mut writer: W) -> Result<(), std::io::Error> {
        let code: u32 = match *self {
            InventoryHash::Error => 0,
            InventoryHash::Tx(_) => 1,
            InventoryHash::Block(_) => 2,
            InventoryHash::FilteredBlock(_) => 3,
        };
        code.bitcoin_serialize(&mut writer)?;
        match *self {
            InventoryHash::Error => [0u8; 32].bitcoin_serialize(&mut writer),
            InventoryHash::Tx(hash) => hash.bitcoin_serialize(&mut writer),
            InventoryHash::Block(hash) => hash.bitcoin_serialize(&mut writer),
            InventoryHash::FilteredBlock(hash) => hash.bitcoin_serialize(&mut writer),
        }
    }
}

impl BitcoinDeserialize for InventoryHash {
    fn bitcoin_deserialize<R: Read>(mut reader: R) -> Result<Self, SerializationError> {
        let code = u32::bitcoin_deserialize(&mut reader)?;
        match code {
            0 => {
                <[u8; 32]>::bitcoin_deserialize(&mut reader)?;
                Ok(InventoryHash::Error)
            }
            1 => Ok(InventoryHash::Tx(transaction::Hash::bitcoin_deserialize(
                &mut reader,
            )?)),
            2 => Ok(InventoryHash::Block(block::Hash::bitcoin_deserialize(
                &mut reader,
            )?)),
            3 => Ok(InventoryHash::FilteredBlock(
                block::Hash::bitcoin_deserialize(&mut reader)?,
            )),
            _ => Err(SerializationError::Parse("invalid inventory code")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spv_chain::BitcoinDeserializeInto;

    #[test]
    fn inventory_roundtrip() {
        for inv in &[
            InventoryHash::Error,
            InventoryHash::Tx(transaction::Hash([0xaa; 32])),
            InventoryHash::Block(block::Hash([0xbb; 32])),
            InventoryHash::FilteredBlock(block::Hash([0xcc; 32])),
        ] {
            let bytes = inv.bitcoin_serialize_to_vec().unwrap();
            assert_eq!(bytes.len(), 36);
            let parsed: InventoryHash = bytes.as_slice().bitcoin_deserialize_into().unwrap();
            assert_eq!(parsed, *inv);
        }
    }

    #[test]
    fn invalid_inventory_code_is_rejected() {
        let mut bytes = vec![9, 0, 0, 0];
        bytes.extend_from_slice(&[0u8; 32]);
        assert!(InventoryHash::bitcoin_deserialize(bytes.as_slice()).is_err());
    }
}
