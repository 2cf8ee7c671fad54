//! CLI command definitions and execution
//!
//! This module contains the CLI command tree and dispatches to the
//! command implementations.

use clap::{Parser, Subcommand};

use crate::exit_code::ExitCode;
use crate::output::OutputConfig;

pub mod cat;
mod completions;

/// objcat - stream remote objects to stdout
///
/// Concatenates objects from S3-compatible storage onto standard output,
/// reading large objects as parallel ranged requests.
#[derive(Parser, Debug)]
#[command(name = "objcat")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format: human-readable or JSON
    #[arg(long, global = true, default_value = "false")]
    pub json: bool,

    /// Suppress warnings
    #[arg(short, long, global = true, default_value = "false")]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true, default_value = "false")]
    pub debug: bool,

    /// Storage endpoint URL, overriding the config file
    #[arg(long, global = true, env = "OBJCAT_ENDPOINT_URL")]
    pub endpoint_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Concatenate remote objects to stdout
    Cat(cat::CatArgs),

    /// Generate shell completion scripts
    Completions(completions::CompletionsArgs),
}

/// Execute the CLI command and return an exit code
pub async fn execute(cli: Cli) -> ExitCode {
    let output_config = OutputConfig {
        json: cli.json,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Cat(args) => cat::execute(args, output_config, cli.endpoint_url).await,
        Commands::Completions(args) => completions::execute(args),
    }
}
