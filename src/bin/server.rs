//! Room presence and membership broker.
//!
//! Accepts WebSocket connections from peers, groups them into named rooms,
//! and fans out join/leave/liveness events so the peers can negotiate their
//! media sessions directly with each other.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin server
//! cargo run --bin server -- --host 0.0.0.0 --port 3001
//! ```

use clap::Parser;
use room_manager::{common::logger::setup_logger, config::Settings, server::run_server};

#[derive(Parser, Debug)]
#[command(name = "server")]
#[command(about = "WebSocket room presence and membership broker", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "3001")]
    port: u16,
}

#[tokio::main]
async fn main() {
    setup_logger(env!("CARGO_BIN_NAME"), "debug");

    let args = Args::parse();

    let settings = Settings {
        host: args.host,
        port: args.port,
        ..Settings::default()
    };

    if let Err(e) = run_server(settings).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
