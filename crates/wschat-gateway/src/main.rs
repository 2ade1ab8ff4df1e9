//! Chat server entry point
//!
//! Run with:
//! ```bash
//! cargo run -p wschat-gateway
//! ```
//!
//! Configuration is loaded from environment variables (and `.env` if present).

use tracing::{error, info};
use wschat_common::{try_init_tracing_with_config, AppConfig, AppResult, TracingConfig};

#[tokio::main]
async fn main() {
    // Load configuration before tracing so the log format can follow it
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = try_init_tracing_with_config(TracingConfig::from_settings(&config.app)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run(config).await {
        error!(code = e.error_code(), error = %e, "Chat server failed");
        std::process::exit(1);
    }
}

async fn run(config: AppConfig) -> AppResult<()> {
    info!(
        app = %config.app.name,
        env = ?config.app.env,
        addr = %config.gateway.address(),
        "Starting chat server"
    );

    wschat_gateway::run(config).await
}
