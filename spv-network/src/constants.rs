//! Protocol constants and tuning knobs.

use std::ops::Range;
use std::time::Duration;

use spv_chain::parameters::Network;

use crate::protocol::external::types::ProtocolVersion;

/// The protocol version this client advertises in its handshake.
pub const CURRENT_VERSION: ProtocolVersion = ProtocolVersion(70_015);

/// The user agent advertised in `version` messages.
pub const USER_AGENT: &str = "/spv:0.1.0/";

/// The network magics that open every frame.
pub mod magics {
    /// Mainnet, `0xD9B4BEF9` little-endian.
    pub const MAINNET: [u8; 4] = [0xf9, 0xbe, 0xb4, 0xd9];
    /// Testnet3, `0x0709110B` little-endian.
    pub const TESTNET3: [u8; 4] = [0x0b, 0x11, 0x09, 0x07];
}

/// How long a TCP connect may take before the peer is given up on.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// How long the peer has to finish the version/verack exchange.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// How long after `getaddr` we wait for gossip before asking the swarm to
/// try another seed peer.
pub const GETADDR_TIMEOUT: Duration = Duration::from_secs(5);

/// The interval between our `ping`s on an established connection.
pub const PING_INTERVAL: Duration = Duration::from_secs(60);

/// How long the peer has to answer a `ping`.
pub const PONG_TIMEOUT: Duration = Duration::from_secs(5);

/// The jitter range for the `getheaders` reply timeout, in seconds.
pub const HEADERS_TIMEOUT_SECS: Range<u64> = 15..20;

/// A tip younger than this many seconds means the chain is caught up.
pub const TIP_RECENCY_CUTOFF_SECS: u32 = 3600;

/// The most addresses a single `addr` message may carry.
pub const MAX_ADDRS_IN_MESSAGE: usize = 1000;

/// The most locator hashes a `getheaders` or `getblocks` may carry.
pub const MAX_LOCATOR_HASHES: usize = 2000;

/// The most headers a single `headers` message may carry.
pub const MAX_HEADERS_IN_MESSAGE: usize = 2000;

/// The most entries a single `inv` message may carry.
pub const MAX_INV_IN_MESSAGE: usize = 50_000;

/// The DNS seeds used to discover the first peers on `network`.
///
/// Copied from the Bitcoin Core chainparams lists.
pub fn dns_seeds(network: Network) -> &'static [&'static str] {
    match network {
        Network::Mainnet => &[
            "seed.bitcoin.sipa.be",
            "dnsseed.bluematt.me",
            "seed.bitcoinstats.com",
        ],
        Network::Testnet => &[
            "testnet-seed.bitcoin.jonasschnelli.ch",
            "seed.tbtc.petertodd.org",
            "testnet-seed.bluematt.me",
        ],
    }
}
