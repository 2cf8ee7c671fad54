//! cat command - Concatenate objects to stdout
//!
//! Resolves the target into objects, then streams each one to stdout in
//! key order with no separator between objects.

use clap::Args;
use oc_core::{
    CatOptions, CatPipeline, CatSummary, Config, ConfigManager, Error, ObjectStore, RetryPolicy,
    Target,
};
use oc_s3::S3Client;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

const OPERATION: &str = "cat";

/// Concatenate remote objects to stdout
#[derive(Args, Debug)]
pub struct CatArgs {
    /// Target: s3://bucket/key, s3://bucket/prefix/ or s3://bucket/pattern*
    pub target: String,

    /// Size of each ranged read, e.g. 8MiB (default from config: 50MiB)
    #[arg(short = 'p', long, value_parser = parse_size)]
    pub part_size: Option<u64>,

    /// Ranged reads in flight per object (default from config: 5)
    #[arg(short = 'c', long)]
    pub concurrency: Option<usize>,

    /// Specific version ID to retrieve; single object targets only
    #[arg(long)]
    pub version_id: Option<String>,

    /// Treat the key as literal text: no wildcard expansion of `*`, `?` or `[`
    #[arg(long)]
    pub literal: bool,
}

/// Execute the cat command
pub async fn execute(
    args: CatArgs,
    output_config: OutputConfig,
    endpoint_url: Option<String>,
) -> ExitCode {
    let command = format!("{OPERATION} {}", args.target);
    let mut formatter = Formatter::new(output_config.clone());

    let config = match ConfigManager::new().and_then(|manager| manager.load()) {
        Ok(config) => config,
        Err(e) => return report(&formatter, &command, &e),
    };
    if config.defaults.json_output() && !formatter.is_json() {
        formatter = Formatter::new(OutputConfig {
            json: true,
            ..output_config
        });
    }

    // Everything below up to the client is checked without touching the network
    let target = match Target::parse(&args.target, args.version_id.clone())
        .map(|target| if args.literal { target.into_literal() } else { target })
        .and_then(|target| target.validate_version_scope().map(|()| target))
    {
        Ok(target) => target,
        Err(e) => return report(&formatter, &command, &e),
    };

    let options = match cat_options(&args, &config) {
        Ok(options) => options,
        Err(e) => return report(&formatter, &command, &e),
    };

    let storage = match endpoint_url {
        Some(endpoint) => config.storage.clone().with_endpoint(endpoint),
        None => Ok(config.storage.clone()),
    };
    let client = match storage {
        Ok(storage) => S3Client::new(&storage).await,
        Err(e) => Err(e),
    };
    let client = match client {
        Ok(client) => client,
        Err(e) => return report(&formatter, &command, &e),
    };

    let mut stdout = tokio::io::stdout();
    let code = tokio::select! {
        code = cat_to(&client, &target, options, &mut stdout, &formatter) => code,
        _ = tokio::signal::ctrl_c() => {
            formatter.warning("interrupted, in-flight reads cancelled");
            ExitCode::Interrupted
        }
    };
    // Bytes already written still reach the reader after an interrupt
    if let Err(e) = stdout.flush().await {
        tracing::debug!(error = %e, "stdout flush failed");
    }
    code
}

/// Merge flags over configuration defaults
fn cat_options(args: &CatArgs, config: &Config) -> oc_core::Result<CatOptions> {
    let part_size = args.part_size.unwrap_or(config.defaults.part_size);
    let concurrency = args.concurrency.unwrap_or(config.defaults.concurrency);
    let retry = RetryPolicy::from_config(&config.storage.retry, &config.storage.timeout);
    Ok(CatOptions::new(part_size, concurrency)?.with_retry(retry))
}

/// Run the pipeline for `target` into `sink`, reporting any failure
pub async fn cat_to<W>(
    store: &dyn ObjectStore,
    target: &Target,
    options: CatOptions,
    sink: &mut W,
    formatter: &Formatter,
) -> ExitCode
where
    W: AsyncWrite + Unpin + Send + ?Sized,
{
    let command = format!("{OPERATION} {}", target.raw());
    match CatPipeline::new(store, options).run(target, sink).await {
        Ok(CatSummary { objects, bytes, .. }) => {
            tracing::debug!(objects, bytes, "cat succeeded");
            ExitCode::Success
        }
        Err(e) => report(formatter, &command, &e),
    }
}

fn report(formatter: &Formatter, command: &str, error: &Error) -> ExitCode {
    tracing::debug!(kind = %error.kind(), error = ?error, "cat failed");
    formatter.error(OPERATION, command, &error.to_string());
    ExitCode::from(error)
}

/// Parse a byte size such as `1048576`, `8M`, `8MiB` or `1g`
///
/// Suffixes are binary multiples and case-insensitive.
pub fn parse_size(value: &str) -> Result<u64, String> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (digits, suffix) = value.split_at(split);
    if digits.is_empty() {
        return Err(format!("invalid size '{value}': expected a number"));
    }
    let number: u64 = digits
        .parse()
        .map_err(|e| format!("invalid size '{value}': {e}"))?;

    let multiplier: u64 = match suffix.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kb" | "kib" => 1 << 10,
        "m" | "mb" | "mib" => 1 << 20,
        "g" | "gb" | "gib" => 1 << 30,
        other => return Err(format!("invalid size '{value}': unknown unit '{other}'")),
    };

    number
        .checked_mul(multiplier)
        .ok_or_else(|| format!("invalid size '{value}': too large"))
}
