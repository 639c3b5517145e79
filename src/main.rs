#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::doc_markdown,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::uninlined_format_args
)]

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use tradelens::{
    AnalysisCache, AnalysisClient, AnalyzeOptions, Config, TracingNotices, UsageLimitsService,
};

/// TradeLens — AI analysis client for your trading journal.
#[derive(Parser, Debug)]
#[command(name = "tradelens")]
#[command(version)]
#[command(about = "Run AI analyses against your trading journal.", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a named AI operation
    #[command(long_about = "\
Run a named AI operation against the backend.

The payload is an arbitrary JSON object forwarded to the operation. \
With --cache-key, an identical earlier result is reused without a \
network call; --refresh forces a re-fetch and overwrites the entry.

Examples:
  tradelens analyze pattern-analysis --cache-key pattern-recognition
  tradelens analyze weekly-review --payload '{\"week\":\"2026-W31\"}'")]
    Analyze {
        /// Operation name (e.g. pattern-analysis, weekly-review)
        operation: String,
        /// JSON payload for the operation
        #[arg(long, default_value = "{}")]
        payload: String,
        /// Cache key to reuse and store the result under
        #[arg(long)]
        cache_key: Option<String>,
        /// Ignore a cached entry and re-fetch
        #[arg(long)]
        refresh: bool,
        /// Suppress the credits notice; print the JSON result only
        #[arg(long)]
        quiet: bool,
    },

    /// Fetch and show current AI usage limits
    Limits,

    /// Inspect or clear the analysis cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },

    /// Generate shell completions
    Completions { shell: clap_complete::Shell },
}

#[derive(Subcommand, Debug)]
enum CacheCommands {
    /// Show entry count and mirror location
    Stats,
    /// Remove one cached analysis
    Clear {
        /// Cache key to remove
        key: String,
    },
    /// Remove every cached analysis whose key starts with the prefix
    ClearPrefix {
        /// Key prefix (e.g. "weekly-review-")
        prefix: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(config_dir) = &cli.config_dir {
        if config_dir.trim().is_empty() {
            anyhow::bail!("--config-dir cannot be empty");
        }
        std::env::set_var("TRADELENS_CONFIG_DIR", config_dir);
    }

    // Completions must remain stdout-only and should not load config or
    // initialize logging, so sourced completion scripts stay clean.
    if let Commands::Completions { shell } = &cli.command {
        let mut command = Cli::command();
        let name = command.get_name().to_string();
        clap_complete::generate(*shell, &mut command, name, &mut std::io::stdout().lock());
        return Ok(());
    }

    // Initialize logging - respects RUST_LOG env var, defaults to INFO
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let config = Config::load()?;
    let client = build_client(&config);

    match cli.command {
        Commands::Analyze {
            operation,
            payload,
            cache_key,
            refresh,
            quiet,
        } => {
            let payload: serde_json::Value =
                serde_json::from_str(&payload).context("--payload must be valid JSON")?;
            let options = AnalyzeOptions {
                cache_key,
                suppress_notice: quiet,
                bypass_cache: refresh,
            };

            let result = client.analyze_with(&operation, payload, options).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.success {
                std::process::exit(1);
            }
        }

        Commands::Limits => match client.fetch_limits().await {
            Some(limits) => {
                println!("Remaining:    {}", limits.remaining);
                println!("Weekly limit: {}", limits.weekly_limit);
                match limits.resets_at {
                    Some(resets_at) => println!("Resets at:    {resets_at}"),
                    None => println!("Resets at:    unknown"),
                }
            }
            None => anyhow::bail!("could not fetch usage limits"),
        },

        Commands::Cache { command } => match command {
            CacheCommands::Stats => {
                println!("Entries: {}", client.cache().len());
                match client.cache().mirror_path() {
                    Some(path) => println!("Mirror:  {}", path.display()),
                    None => println!("Mirror:  disabled"),
                }
            }
            CacheCommands::Clear { key } => {
                if client.clear_cached(&key) {
                    println!("Removed '{key}'");
                } else {
                    println!("No cached analysis under '{key}'");
                }
            }
            CacheCommands::ClearPrefix { prefix } => {
                let removed = client.clear_cache_prefix(&prefix);
                println!("Removed {removed} cached analyses");
            }
        },

        Commands::Completions { .. } => unreachable!("handled before config load"),
    }

    Ok(())
}

fn build_client(config: &Config) -> AnalysisClient {
    let cache = match config.cache_mirror_path() {
        Some(path) => Arc::new(AnalysisCache::load(path, Arc::new(TracingNotices))),
        None => Arc::new(AnalysisCache::in_memory()),
    };
    let limits = Arc::new(UsageLimitsService::new());

    AnalysisClient::with_retry(
        config.api_url.clone(),
        config.api_token.clone(),
        cache,
        limits,
        config.retry(),
    )
}
