//! Hearth server binary.
//!
//! # Usage
//!
//! ```bash
//! # Listen on the default port
//! hearth-server --bind 0.0.0.0:7777
//!
//! # Verbose logging, smaller connection limit
//! RUST_LOG=debug hearth-server --bind 127.0.0.1:7777 --max-connections 100
//! ```

use std::time::Duration;

use clap::Parser;
use hearth_server::{DEFAULT_WELCOME_BANNER, DriverConfig, Server, ServerRuntimeConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Hearth chat relay
#[derive(Parser, Debug)]
#[command(name = "hearth-server")]
#[command(about = "Multi-room TCP chat relay")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:7777")]
    bind: String,

    /// Maximum concurrent connections
    #[arg(long, default_value = "10000")]
    max_connections: usize,

    /// How often the event loop checks for shutdown, in milliseconds
    #[arg(long, default_value = "1000")]
    poll_interval_ms: u64,

    /// Maximum bytes read from a socket at once
    #[arg(long, default_value = "1024")]
    read_buffer_size: usize,

    /// Lines queued for one client before it counts as unresponsive
    #[arg(long, default_value = "256")]
    outbound_queue_depth: usize,

    /// Banner sent to clients after they register
    #[arg(long, default_value = DEFAULT_WELCOME_BANNER)]
    welcome: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Hearth server starting");
    tracing::info!("Binding to {}", args.bind);

    let config = ServerRuntimeConfig {
        bind_address: args.bind,
        poll_interval: Duration::from_millis(args.poll_interval_ms),
        read_buffer_size: args.read_buffer_size,
        outbound_queue_depth: args.outbound_queue_depth,
        driver: DriverConfig { max_connections: args.max_connections, welcome_banner: args.welcome },
        ..Default::default()
    };

    let server = Server::bind(config).await?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, shutting down");
            shutdown.shutdown();
        }
    });

    server.run().await?;

    Ok(())
}
