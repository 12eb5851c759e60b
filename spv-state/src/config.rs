use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use spv_chain::parameters::Network;

/// Configuration for the chain store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// The root directory for the database.
    ///
    /// Each network gets its own subdirectory, so a mainnet and a testnet
    /// store can share a `data_dir`.
    pub data_dir: PathBuf,
}

impl Config {
    /// The sled configuration for `network` under this data directory.
    pub fn sled_config(&self, network: Network) -> sled::Config {
        let path = self.data_dir.join(network.lowercase_name());
        sled::Config::new().path(path)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".spv"),
        }
    }
}
