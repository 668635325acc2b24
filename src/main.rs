//! The relaycast server binary.
//!
//! Binds a loopback listener on the given port and relays every client's
//! bytes to every other client until the process is killed or a fatal error
//! tears the relay down.

use clap::Parser;
use config::Config;
use relaycast::RelayServer;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Tracing Initialization
// ============================================================================

/// Initialize tracing for the relaycast crate based on verbosity level
fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => return, // No tracing
        1 => "info",
        2 => "debug",
        _ => "trace", // 3 or more
    };

    let filter = format!("relaycast={}", level);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(true)
        .with_writer(std::io::stderr)
        .pretty()
        .init();
}

// ============================================================================
// CLI Argument Parsing
// ============================================================================

#[derive(Parser)]
#[command(author, version, about = "Broadcast relay server", long_about = None)]
struct Args {
    /// Port to listen on (loopback only; 0 picks an ephemeral port)
    port: u16,

    /// Increase logging verbosity (-v: info, -vv: debug, -vvv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file path (TOML format)
    #[arg(long)]
    config: Option<String>,
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> ExitCode {
    let args = Args::parse();

    init_tracing(args.verbose);

    // Create config - load from file if specified, otherwise use defaults
    let config = if let Some(config_path) = &args.config {
        match Config::builder()
            .add_source(config::File::with_name(config_path))
            .build()
        {
            Ok(c) => c,
            Err(err) => {
                eprintln!("Failed to load config file '{}': {}", config_path, err);
                return ExitCode::FAILURE;
            }
        }
    } else {
        Config::default()
    };

    let mut server = match RelayServer::new(&config, args.port) {
        Ok(s) => s,
        Err(err) => {
            eprintln!("Failed to start relay on port {}: {err}", args.port);
            return ExitCode::FAILURE;
        }
    };

    // The single-threaded event loop. Only a fatal error returns, and the
    // relay has already torn its connections down by then.
    if let Err(err) = server.run() {
        eprintln!("Fatal error: {err}");
    }
    ExitCode::FAILURE
}
