use spv_chain::{block, BitcoinSerialize};

/// The body of a `getblocks` message, laid out exactly like
/// [`super::GetHeaders`]; the peer answers with an `inv` of at most 500
/// block hashes rather than with headers.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct GetBlocks {
    /// A list of the sender's best known block hashes, ordered from newest
    /// to oldest.
    pub block_locator_hashes: Vec<block::Hash>,
    /// The last block hash to request, or `None` for "as many as fit".
    pub stop_hash: Option<block::Hash>,
}

impl BitcoinSerialize for GetBlocks {
    fn bitcoin_serialize<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        self.block_locator_hashes.bitcoin_serialize(&mut target)?;
        match self.stop_hash {
            Some(hash) => hash.bitcoin_serialize(&mut target),
            None => [0u8; 32].bitcoin_serialize(&mut target),
        }
    }
}
