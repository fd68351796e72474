//! dataapi - command-line client for document collections served over a
//! JSON command API
//!
//! # Usage
//!
//! ```bash
//! dataapi --uri "http://localhost:8181/v1/ks?applicationToken=..." collections
//! dataapi -k ks find users '{"age": {"$gt": 30}}' --limit 10 --pretty
//! ```

use tracing_subscriber::EnvFilter;

use dataapi::cli::CliInterface;
use dataapi::error::Result;

/// Application entry point
#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Main application logic
///
/// 1. Parse command-line arguments and load configuration
/// 2. Initialize logging
/// 3. Run the requested command
///
/// # Returns
/// * `Result<()>` - Success or error
async fn run() -> Result<()> {
    let cli = CliInterface::new()?;
    initialize_logging(&cli);
    cli.run().await
}

/// Initialize logging from the effective log level
///
/// `RUST_LOG` takes precedence over the configured level. Logs go to stderr
/// so command output on stdout stays machine-readable.
///
/// # Arguments
/// * `cli` - CLI interface with the loaded configuration
fn initialize_logging(cli: &CliInterface) {
    let logging = &cli.config().logging;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.filter_directives()));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if logging.timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }
}
