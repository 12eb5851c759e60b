//! The SPV daemon: a long-running node that follows the testnet3 header
//! chain.
//!
//! Everything interesting lives in the library crates; this binary parses
//! options, sets up logging and the lock file, wires the signal handlers
//! to the client's shutdown, and maps failures to exit codes: 0 for a
//! clean shutdown, 1 for argument or resource errors at startup, 2 for
//! fatal integrity violations at runtime.

mod args;
mod lock;

use gumdrop::Options;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use spv_chain::parameters::Network;
use spv_network::{Client, ProtocolVersion};
use spv_state::ChainStore;

use crate::args::Args;
use crate::lock::LockFile;

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let args = match Args::parse_args_default(&argv) {
        Ok(args) => args,
        Err(error) => {
            eprintln!("{}: {}", env!("CARGO_PKG_NAME"), error);
            eprintln!();
            eprintln!("Usage:\n{}", Args::usage());
            return 1;
        }
    };

    if args.help {
        println!("A simple Bitcoin SPV client.");
        println!();
        println!("Usage:\n{}", Args::usage());
        return 0;
    }
    if args.version {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        return 0;
    }

    init_tracing(args.debug);
    if let Err(error) = color_eyre::install() {
        error!(%error, "failed to install error reporting hooks");
    }

    if args.delete_data {
        match std::fs::remove_dir_all(&args.data_dir) {
            Ok(()) => info!(path = %args.data_dir.display(), "removed data directory"),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
            Err(error) => {
                error!(%error, path = %args.data_dir.display(), "failed to remove data directory");
                return 1;
            }
        }
    }

    let _lock = match LockFile::acquire(&args.lock_path()) {
        Ok(lock) => lock,
        Err(error) => {
            error!(
                %error,
                path = %args.lock_path().display(),
                "failed to acquire the lock file; is another instance running?",
            );
            return 1;
        }
    };

    let network = Network::Testnet;

    let mut net_config = spv_network::Config::new(network);
    net_config.target_connections = args.connections;
    if let Some(version) = args.protocol_version {
        net_config.protocol_version = ProtocolVersion(version);
    }
    if let Some(port) = args.protocol_port {
        net_config.port = port;
    }
    if let Some(user_agent) = args.protocol_user_agent.clone() {
        net_config.user_agent = user_agent;
    }

    let state_config = spv_state::Config {
        data_dir: args.data_dir.clone(),
    };

    // One thread for everything: the client, its connections, and the
    // store all run cooperatively on this runtime.
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(error) => {
            error!(%error, "failed to start the runtime");
            return 1;
        }
    };

    runtime.block_on(async move {
        let store = match ChainStore::new(&state_config, network) {
            Ok(store) => store,
            Err(error) => {
                error!(%error, "failed to open the chain store");
                return 1;
            }
        };
        info!(height = %store.height(), "chain store open");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(wait_for_shutdown_signal(shutdown_tx));

        let mut client = Client::new(net_config, store);
        match client.run(shutdown_rx).await {
            Ok(()) => {
                info!(height = %client.store().height(), "shut down cleanly");
                0
            }
            Err(error) => {
                error!(%error, "fatal error");
                2
            }
        }
    })
}

async fn wait_for_shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(error) => {
            error!(%error, "failed to install the SIGTERM handler");
            return;
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(error) = result {
                error!(%error, "failed to listen for SIGINT");
                return;
            }
            info!("received interrupt signal");
        }
        _ = sigterm.recv() => info!("received terminate signal"),
    }
    let _ = shutdown_tx.send(true);
}

fn init_tracing(debug: bool) {
    let default_filter = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
