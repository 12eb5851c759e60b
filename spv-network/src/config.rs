//! Networking configuration.

use std::net::SocketAddr;

use spv_chain::parameters::Network;

use crate::constants;
use crate::protocol::external::types::{PeerServices, ProtocolVersion};

/// Configuration for the swarm and its connections.
///
/// Built once by the binary from CLI options and passed by value into
/// every component that needs it; nothing reads process-wide state.
#[derive(Clone, Debug)]
pub struct Config {
    /// The network to connect to.
    pub network: Network,

    /// The port peers are expected to listen on.
    pub port: u16,

    /// The protocol version advertised in our handshake.
    pub protocol_version: ProtocolVersion,

    /// The user agent advertised in our handshake.
    pub user_agent: String,

    /// The services we advertise. An SPV client serves nothing.
    pub our_services: PeerServices,

    /// Whether peers should relay transactions to us (BIP 37).
    pub relay: bool,

    /// How many concurrent peer connections to maintain.
    pub target_connections: usize,

    /// The DNS seeds used to discover the first peers.
    pub dns_seeds: Vec<String>,

    /// Fixed peers to use alongside (or instead of) DNS discovery.
    pub initial_peers: Vec<SocketAddr>,
}

impl Config {
    /// The default configuration for `network`.
    pub fn new(network: Network) -> Config {
        Config {
            network,
            port: network.default_port(),
            protocol_version: constants::CURRENT_VERSION,
            user_agent: constants::USER_AGENT.to_owned(),
            our_services: PeerServices::empty(),
            relay: false,
            target_connections: 8,
            dns_seeds: constants::dns_seeds(network)
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
            initial_peers: Vec::new(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new(Network::default())
    }
}
