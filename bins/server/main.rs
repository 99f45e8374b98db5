//! # Order Server
//!
//! WebSocket server streaming live pizza order updates to connected viewers.
//!
//! ## Features
//! - Replays active orders to each new client.
//! - Simulates order creation and completion while clients are connected.
//! - Accepts `{"action":"complete","orderId":"..."}` from any client.
//! - Sweeps old completed orders in the background.
//!
//! ## Command-line Options
//! - `--listen-addr` / `-a`: WebSocket listen address (default `0.0.0.0:8080`).
//! - `--tick-sec`: Simulation tick period in seconds.
//! - `--new-order-probability`: Chance that a tick creates an order.
//! - `--sweep-sec` / `--retention-sec`: Order sweep period and retention.
//! - `--write-timeout-ms`: Per-write deadline for client sends.
//! - `--log-level` / `-l`: Log level (`error`, `warn`, `info`, `debug`, `trace`).

use order_stream::config::ServerConfig;
use order_stream::errors::CliError;
use order_stream::order_server::OrderServer;
use order_stream::ws_server::WsServer;
use std::sync::Arc;
use std::time::Duration;
use structopt::StructOpt;

/// Command-line options for the Order Server
#[derive(Debug, StructOpt)]
#[structopt(
    name = "order_server",
    about = "WebSocket server for real-time pizza order updates"
)]
struct Opt {
    /// WebSocket listen address, e.g., 0.0.0.0:8080
    #[structopt(short = "a", long, default_value = "0.0.0.0:8080")]
    listen_addr: String,

    /// Simulation tick period in seconds [default: 20]
    #[structopt(long)]
    tick_sec: Option<u64>,

    /// Probability that a simulation tick creates a new order [default: 0.6]
    #[structopt(long)]
    new_order_probability: Option<f64>,

    /// Order sweep period in seconds [default: 60]
    #[structopt(long)]
    sweep_sec: Option<u64>,

    /// Age in seconds after which completed orders are evicted [default: 300]
    #[structopt(long)]
    retention_sec: Option<u64>,

    /// Deadline in milliseconds for a single write to a client [default: 5000]
    #[structopt(long)]
    write_timeout_ms: Option<u64>,

    /// Log level: error, warn, info, debug, trace
    #[structopt(short, long, default_value = "info")]
    log_level: String,
}

impl Opt {
    /// Applies the given flags on top of the built-in defaults.
    fn to_config(&self) -> ServerConfig {
        let mut config = ServerConfig {
            listen_addr: self.listen_addr.clone(),
            ..ServerConfig::default()
        };
        if let Some(secs) = self.sweep_sec {
            config.sweep_period = Duration::from_secs(secs);
        }
        if let Some(secs) = self.retention_sec {
            config.order_retention = Duration::from_secs(secs);
        }
        if let Some(ms) = self.write_timeout_ms {
            config.write_timeout = Duration::from_millis(ms);
        }
        if let Some(secs) = self.tick_sec {
            config.simulation.tick = Duration::from_secs(secs);
        }
        if let Some(p) = self.new_order_probability {
            config.simulation.new_order_probability = p;
        }
        config
    }
}

/// Initializes the logger using env_logger with the given level
fn init_logger(level: &str) -> Result<(), CliError> {
    let mut builder = env_logger::Builder::new();

    let log_level = match level.to_lowercase().as_str() {
        "error" => log::LevelFilter::Error,
        "warn" => log::LevelFilter::Warn,
        "info" => log::LevelFilter::Info,
        "debug" => log::LevelFilter::Debug,
        "trace" => log::LevelFilter::Trace,
        _ => log::LevelFilter::Info,
    };

    builder.filter_level(log_level);
    builder.format_timestamp_micros();
    builder.format_module_path(false);
    builder.format_target(false);
    builder
        .try_init()
        .map_err(|e| CliError::GeneralError(e.to_string()))
}

fn main() -> Result<(), CliError> {
    let opt = Opt::from_args();
    init_logger(&opt.log_level)?;

    log::info!("Starting Order Server");
    log::debug!("Command line options: {:?}", opt);

    let order_server = Arc::new(OrderServer::new(opt.to_config())?);

    log::info!("Starting order sweeper");
    order_server.start()?;

    let listen_addr = &order_server.config().listen_addr;
    let ws_server = WsServer::new(listen_addr, order_server.clone())?;
    log::info!(
        "Server listening on {}. Waiting for client connections...",
        listen_addr
    );

    ws_server.start()?;

    order_server.shutdown();
    log::info!("Server shutdown complete");
    Ok(())
}
