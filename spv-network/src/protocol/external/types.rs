//! Newtype wrappers for the primitive values that cross the wire.

use std::fmt;

use bitflags::bitflags;
use rand::Rng;

use spv_chain::parameters::Network;
use spv_chain::{BitcoinDeserialize, BitcoinSerialize, SerializationError};
use spv_serde_derive::{BtcDeserialize, BtcSerialize};

use crate::constants::magics;

/// A magic number identifying the network a frame belongs to.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct Magic(pub [u8; 4]);

impl fmt::Debug for Magic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Magic").field(&hex::encode(&self.0)).finish()
    }
}

impl From<Network> for Magic {
    fn from(network: Network) -> Self {
        match network {
            Network::Mainnet => Magic(magics::MAINNET),
            Network::Testnet => Magic(magics::TESTNET3),
        }
    }
}

/// A protocol version number.
#[derive(
    Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, BtcSerialize, BtcDeserialize,
)]
pub struct ProtocolVersion(pub u32);

/// A nonce used to correlate `ping`s with `pong`s, and to detect
/// connections to self during the handshake.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, BtcSerialize, BtcDeserialize)]
pub struct Nonce(pub u64);

impl Default for Nonce {
    fn default() -> Self {
        Self(rand::thread_rng().gen())
    }
}

bitflags! {
    /// The service flags a node advertises in `version` and `addr` messages.
    ///
    /// This client advertises none of them: it serves nothing.
    pub struct PeerServices: u64 {
        /// NODE_NETWORK: the node serves full blocks.
        const NODE_NETWORK = 1;
        /// NODE_GETUTXO (BIP64).
        const NODE_GETUTXO = 2;
        /// NODE_BLOOM (BIP111).
        const NODE_BLOOM = 4;
        /// NODE_WITNESS (BIP144).
        const NODE_WITNESS = 8;
        /// NODE_NETWORK_LIMITED (BIP159).
        const NODE_NETWORK_LIMITED = 1024;
    }
}

impl Default for PeerServices {
    fn default() -> Self {
        PeerServices::empty()
    }
}

impl BitcoinSerialize for PeerServices {
    fn bitcoin_serialize<W: std::io::Write>(&self, target: W) -> Result<(), std::io::Error> {
        self.bits().bitcoin_serialize(target)
    }
}

impl BitcoinDeserialize for PeerServices {
    fn bitcoin_deserialize<R: std::io::Read>(reader: R) -> Result<Self, SerializationError>
    where
        Self: Sized,
    {
        // keep unknown bits: peers advertise flags newer than this list
        Ok(PeerServices {
            bits: u64::bitcoin_deserialize(reader)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spv_chain::BitcoinDeserializeInto;

    #[test]
    fn magics_match_the_known_networks() {
        assert_eq!(Magic::from(Network::Testnet).0, [0x0b, 0x11, 0x09, 0x07]);
        assert_eq!(Magic::from(Network::Mainnet).0, [0xf9, 0xbe, 0xb4, 0xd9]);
    }

    #[test]
    fn unknown_service_bits_survive_a_roundtrip() {
        let bytes = (1u64 << 23 | 1).bitcoin_serialize_to_vec().unwrap();
        let services: PeerServices = bytes.as_slice().bitcoin_deserialize_into().unwrap();
        assert!(services.contains(PeerServices::NODE_NETWORK));
        assert_eq!(
            services.bits().bitcoin_serialize_to_vec().unwrap(),
            bytes
        );
    }
}
