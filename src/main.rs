//! route-chain demo server.
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server (axum catch-all, layers)
//!                         │
//!                         ▼
//!                     routing::App ── middleware chain ──▶ mounted Router
//!                         │                                    │
//!                         ▼                                    ▼
//!     ◀────────────── ResponseContext ◀──────────────── resource controller
//!                                                              │
//!                                                              ▼
//!                                                      store::FileStore
//! ```

use std::path::PathBuf;

use clap::Parser;

use route_chain::config::{load_config, validate_config, ServerConfig};
use route_chain::lifecycle::startup;

#[derive(Parser)]
#[command(name = "route-chain")]
#[command(about = "Express-style routing demo server", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };

    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
        if let Err(errors) = validate_config(&config) {
            for error in &errors {
                eprintln!("invalid configuration: {error}");
            }
            return Err(format!("{} configuration error(s)", errors.len()).into());
        }
    }

    startup::run(config).await
}
