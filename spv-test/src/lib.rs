//! Shared initialisation for tests across the workspace.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

pub mod prelude {
    pub use color_eyre::eyre::{eyre, Result};
}

static INIT: Once = Once::new();

/// Initialise tracing and error reports for a test.
///
/// Safe to call from every test; only the first call in a process has any
/// effect. Set `RUST_LOG` to see output from the code under test.
pub fn init() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
        let _ = color_eyre::install();
    });
}
