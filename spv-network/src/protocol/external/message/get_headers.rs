use spv_chain::{block, compactint::CompactInt, BitcoinSerialize};

/// The body of a `getheaders` message, minus the leading protocol version,
/// which the codec writes and reads because it owns the negotiated value.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct GetHeaders {
    /// A list of the sender's best known block hashes, ordered from newest
    /// to oldest.
    pub block_locator_hashes: Vec<block::Hash>,
    /// The stop hash. `None` (serialized as 32 zero bytes) asks for as
    /// many headers as fit in one message (up to 2000).
    pub stop_hash: Option<block::Hash>,
}

impl BitcoinSerialize for GetHeaders {
    fn bitcoin_serialize<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        self.block_locator_hashes.bitcoin_serialize(&mut target)?;
        match self.stop_hash {
            Some(hash) => hash.bitcoin_serialize(&mut target),
            None => [0u8; 32].bitcoin_serialize(&mut target),
        }
    }
}

impl GetHeaders {
    #[cfg(test)]
    fn serialized_size(&self) -> usize {
        CompactInt::size(self.block_locator_hashes.len())
            + (self.block_locator_hashes.len() * 32)
            + 32 // stop hash
    }
}

#[test]
fn serial_size() {
    let int1 = block::Hash::from_bytes_exact([0u8; 32]);
    let int2 = block::Hash::from_bytes_exact([1u8; 32]);
    let int3 = block::Hash::from_bytes_exact([3u8; 32]);
    let msg = GetHeaders {
        block_locator_hashes: Vec::from([int1, int2, int3]),
        stop_hash: Some(block::Hash::from_bytes_exact([0u8; 32])),
    };
    let serial = msg
        .bitcoin_serialize_to_vec()
        .expect("Serializing into vec shouldn't fail");
    assert_eq!(serial.len(), msg.serialized_size());
}
