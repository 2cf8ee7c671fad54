//! objcat - stream remote objects to stdout
//!
//! Concatenates one or more objects from an S3-compatible service onto
//! standard output, fetching large objects as parallel ranged reads.

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use objcat::commands::{self, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let exit_code = commands::execute(cli).await;

    std::process::exit(exit_code.as_i32());
}

/// Log to stderr so stdout carries only object bytes
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}
