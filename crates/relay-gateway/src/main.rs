//! Relay Gateway entry point
//!
//! Run with:
//! ```bash
//! cargo run -p relay-gateway
//! ```
//!
//! Configuration is loaded from environment variables.

use relay_common::{init_tracing, RelayConfig, RelayResult, TracingConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Load configuration before tracing so the log format follows APP_ENV
    let config = match RelayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = init_tracing(&TracingConfig::for_environment(config.app.env)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run(config).await {
        error!(code = e.error_code(), error = %e, "Gateway failed");
        std::process::exit(1);
    }
}

async fn run(config: RelayConfig) -> RelayResult<()> {
    info!(
        app = %config.app.name,
        env = ?config.app.env,
        backend = ?config.channel.backend,
        topic = %config.channel.topic,
        port = config.gateway.port,
        "Starting Relay Gateway..."
    );

    relay_gateway::run(config).await
}
