//! An address of a peer on the network, with learned metadata.

use std::net::SocketAddr;

use chrono::{DateTime, Utc};

use spv_chain::{BitcoinDeserialize, BitcoinSerialize, SerializationError};
use spv_serde_derive::{BtcDeserialize, BtcSerialize};

use crate::protocol::external::types::PeerServices;

/// One entry of an `addr` message: an address, the services its node
/// claims to offer, and when the gossiping peer last heard from it.
///
/// Field order is the wire order: a 4-byte timestamp, the services mask,
/// then the 16-byte address and big-endian port.
#[derive(Copy, Clone, Debug, Eq, PartialEq, BtcSerialize, BtcDeserialize)]
pub struct MetaAddr {
    /// The last time another node claimed this peer was reachable.
    pub last_seen: DateTime<Utc>,

    /// The services advertised for this peer.
    pub services: PeerServices,

    /// The peer's endpoint.
    pub addr: SocketAddr,
}

impl MetaAddr {
    /// An entry stamped with the current time, for addresses learned
    /// outside `addr` gossip (handshakes, DNS seeds).
    pub fn new(addr: SocketAddr, services: PeerServices) -> MetaAddr {
        MetaAddr {
            last_seen: Utc::now(),
            services,
            addr,
        }
    }
}
