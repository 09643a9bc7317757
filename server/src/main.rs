use clap::Parser;
use garden_server::config::{ServerConfig, DEFAULT_OBSERVER_CAPACITY};
use garden_server::server::Server;
use log::{error, info};
use std::time::Duration;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Port for gardener connections
    #[arg(short, long, default_value = "8080")]
    port: u16,
    /// Port for observer connections (defaults to port + 1)
    #[arg(short, long)]
    observer_port: Option<u16>,
    /// Grid side in [2, 10]; the field is 2*side by 2*side
    #[arg(short, long, allow_hyphen_values = true)]
    side: i32,
    /// Seed for blocked plot placement
    #[arg(long)]
    seed: Option<u64>,
    /// Maximum number of concurrent observers
    #[arg(long, default_value_t = DEFAULT_OBSERVER_CAPACITY)]
    max_observers: usize,
    /// How long shutdown waits for gardeners before abandoning them
    #[arg(long)]
    grace_period_ms: Option<u64>,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        let mut config = ServerConfig::new(self.host, self.port, self.side);
        config.observer_port = self.observer_port;
        config.seed = self.seed;
        config.observer_capacity = self.max_observers;
        config.grace_period = self.grace_period_ms.map(Duration::from_millis);
        config
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let config = Args::parse().into_config();

    let server = match Server::bind(config).await {
        Ok(server) => server,
        Err(e) => {
            error!("Startup failed: {}", e);
            eprintln!("garden-server: {}", e);
            std::process::exit(1);
        }
    };

    let shutdown = server.shutdown_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                println!("Received Ctrl+C, shutting down gracefully...");
                shutdown.cancel();
            }
            Err(e) => error!("Unable to listen for Ctrl+C: {}", e),
        }
    });

    let report = server.run().await;
    info!("{:?}", report);
}
