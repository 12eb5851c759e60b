use std::net::SocketAddr;

use chrono::{DateTime, TimeZone, Utc};

use spv_chain::{block, BitcoinDeserialize, BitcoinSerialize, SerializationError};

use super::super::types::{Nonce, PeerServices, ProtocolVersion};

/// Peers older than this omit the sender half of the payload.
const MIN_VERSION_WITH_SENDER: ProtocolVersion = ProtocolVersion(106);
/// Peers older than this omit the relay flag (BIP 37).
const MIN_VERSION_WITH_RELAY: ProtocolVersion = ProtocolVersion(70_001);

/// A `version` message.
///
/// Note that although this is called `version` in Bitcoin, its role is really
/// analogous to a `ClientHello` message in TLS, used to begin a handshake, and
/// is distinct from a simple version number.
///
/// [Bitcoin reference](https://en.bitcoin.it/wiki/Protocol_documentation#version)
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Version {
    /// The network version number supported by the sender.
    pub version: ProtocolVersion,

    /// The network services advertised by the sender.
    pub services: PeerServices,

    /// The time when the version message was sent.
    ///
    /// Unlike every other timestamp on the wire, this one is 8 bytes.
    pub timestamp: DateTime<Utc>,

    /// The network address of the node receiving this message, and its
    /// advertised network services.
    pub address_recv: (PeerServices, SocketAddr),

    /// The network address of the node sending this message, and its
    /// advertised network services.
    pub address_from: (PeerServices, SocketAddr),

    /// Node random nonce, randomly generated every time a version
    /// packet is sent. This nonce is used to detect connections
    /// to self.
    pub nonce: Nonce,

    /// The user agent advertised by the sender.
    pub user_agent: String,

    /// The last block received by the emitting node.
    pub start_height: block::Height,

    /// Whether the remote peer should announce relayed
    /// transactions or not, see [BIP 0037](https://github.com/bitcoin/bips/blob/master/bip-0037.mediawiki)
    pub relay: bool,
}

impl Version {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        version: ProtocolVersion,
        their_addr: SocketAddr,
        their_services: PeerServices,
        our_services: PeerServices,
        our_addr: SocketAddr,
        nonce: Nonce,
        user_agent: String,
        start_height: block::Height,
        relay: bool,
    ) -> Version {
        // To stay within the range where bitcoin core will ignore our clock skew,
        // truncate the timestamp to the nearest 5 minutes.
        let now = Utc::now().timestamp();
        let timestamp = Utc
            .timestamp_opt(now - now.rem_euclid(5 * 60), 0)
            .single()
            .expect("the current time is always in range");
        Version {
            version,
            services: our_services,
            timestamp,
            address_recv: (their_services, their_addr),
            address_from: (our_services, our_addr),
            nonce,
            user_agent,
            start_height,
            relay,
        }
    }
}

impl BitcoinSerialize for Version {
    fn bitcoin_serialize<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        self.version.bitcoin_serialize(&mut target)?;
        self.services.bitcoin_serialize(&mut target)?;
        self.timestamp.timestamp().bitcoin_serialize(&mut target)?;
        self.address_recv.bitcoin_serialize(&mut target)?;
        self.address_from.bitcoin_serialize(&mut target)?;
        self.nonce.bitcoin_serialize(&mut target)?;
        self.user_agent.bitcoin_serialize(&mut target)?;
        self.start_height.bitcoin_serialize(&mut target)?;
        self.relay.bitcoin_serialize(&mut target)?;
        Ok(())
    }
}

impl BitcoinDeserialize for Version {
    /// Decodes the fields peers older than the field's introduction omit
    /// as their defaults, the way bitcoind does.
    fn bitcoin_deserialize<R: std::io::Read>(mut reader: R) -> Result<Self, SerializationError>
    where
        Self: Sized,
    {
        let version = ProtocolVersion::bitcoin_deserialize(&mut reader)?;
        let services = PeerServices::bitcoin_deserialize(&mut reader)?;
        let timestamp = Utc
            .timestamp_opt(i64::bitcoin_deserialize(&mut reader)?, 0)
            .single()
            .ok_or(SerializationError::Parse("out of range timestamp"))?;
        let address_recv = <(PeerServices, SocketAddr)>::bitcoin_deserialize(&mut reader)?;

        let unspecified = SocketAddr::from(([0, 0, 0, 0], 0));
        let mut msg = Version {
            version,
            services,
            timestamp,
            address_recv,
            address_from: (PeerServices::empty(), unspecified),
            nonce: Nonce(0),
            user_agent: String::new(),
            start_height: block::Height(0),
            relay: false,
        };

        if version >= MIN_VERSION_WITH_SENDER {
            msg.address_from = <(PeerServices, SocketAddr)>::bitcoin_deserialize(&mut reader)?;
            msg.nonce = Nonce::bitcoin_deserialize(&mut reader)?;
            msg.user_agent = String::bitcoin_deserialize(&mut reader)?;
            msg.start_height = block::Height::bitcoin_deserialize(&mut reader)?;
            if version >= MIN_VERSION_WITH_RELAY {
                msg.relay = bool::bitcoin_deserialize(&mut reader)?;
            }
        }

        Ok(msg)
    }
}
