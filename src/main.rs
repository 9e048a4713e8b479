//! nscache - Cache Administration Tool
//!
//! Inspect and manipulate a namespaced cache from the command line.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌──────────────────────────┐
//! │  Args / YAML │───▶│ CacheConfig  │───▶│ AsyncCache<Box<dyn ..>>  │
//! │  (clap, env) │    │              │    │  file / literal / shm    │
//! └──────────────┘    └──────────────┘    └──────────────────────────┘
//! ```
//!
//! Values given to `set` are stored as JSON; text that does not parse as
//! JSON is stored as a JSON string.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{debug, error, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use nscache::config::{BackendConfig, CacheConfig};
use nscache::file::FileCacheConfig;
use nscache::{AsyncCache, Cache, CacheStats, Result};

// =============================================================================
// CLI Arguments
// =============================================================================

/// nscache - namespaced key-value cache administration
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Cache directory
    #[arg(long, env = "NSCACHE_DIR", default_value = "/tmp/nscache")]
    dir: PathBuf,

    /// Number of nested shard directories (0-16)
    #[arg(long, env = "NSCACHE_DIRECTORY_LEVEL", default_value = "0")]
    level: usize,

    /// Entry file extension (defaults to .cache, or .json with --literal)
    #[arg(long, env = "NSCACHE_EXTENSION")]
    extension: Option<String>,

    /// Use the literal document format (JSON payloads only)
    #[arg(long, env = "NSCACHE_LITERAL")]
    literal: bool,

    /// Namespace to operate in
    #[arg(long, env = "NSCACHE_NAMESPACE")]
    namespace: Option<String>,

    /// YAML cache configuration; replaces the directory options
    #[arg(long, env = "NSCACHE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the value stored under an id (exit code 1 on miss)
    Get { id: String },

    /// Store a value
    Set {
        id: String,
        value: String,
        /// Time to live in seconds (0 = never expires)
        #[arg(long, default_value = "0")]
        ttl: u64,
    },

    /// Print whether a live entry exists
    Has { id: String },

    /// Remove an entry
    Delete { id: String },

    /// Invalidate every entry of the namespace
    Clear,

    /// Remove every entry in the backend, across namespaces
    Flush,

    /// Print backend statistics as JSON
    Stats,
}

impl Args {
    fn cache_config(&self) -> Result<CacheConfig> {
        let mut config = match &self.config {
            Some(path) => CacheConfig::from_yaml_file(path)?,
            None => {
                let mut file = FileCacheConfig::new(&self.dir).with_directory_level(self.level);
                file.extension = self.extension.clone();
                let backend = if self.literal {
                    BackendConfig::LiteralFile(file)
                } else {
                    BackendConfig::File(file)
                };
                CacheConfig {
                    backend,
                    ..Default::default()
                }
            }
        };

        if let Some(namespace) = &self.namespace {
            config.namespace = namespace.clone();
        }
        Ok(config)
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args);

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let config = args.cache_config()?;
    debug!(?config, "resolved cache configuration");

    let cache = AsyncCache::new(Cache::from_config(&config)?);

    match args.command {
        Command::Get { id } => match cache.get_raw(id).await? {
            Some(value) => {
                println!("{}", String::from_utf8_lossy(&value));
                Ok(ExitCode::SUCCESS)
            }
            None => Ok(ExitCode::from(1)),
        },
        Command::Set { id, value, ttl } => {
            let value = serde_json::from_str::<serde_json::Value>(&value)
                .unwrap_or(serde_json::Value::String(value));
            cache.set(id, &value, ttl).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Has { id } => {
            println!("{}", cache.has(id).await?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Delete { id } => {
            cache.delete(id).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Clear => {
            cache.clear().await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Flush => {
            cache.flush().await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Stats => {
            let report = stats_report(cache.stats().await?)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Stats as JSON with the derived hit ratio alongside the raw counters
fn stats_report(stats: Option<CacheStats>) -> Result<serde_json::Value> {
    let Some(stats) = stats else {
        return Ok(serde_json::Value::Null);
    };

    let mut report = serde_json::to_value(&stats)?;
    if let Some(fields) = report.as_object_mut() {
        fields.insert("hit_ratio".into(), serde_json::json!(stats.hit_ratio()));
    }
    Ok(report)
}

// =============================================================================
// Logging
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
