#![deny(unsafe_code)]

//! Switchyard CLI — assemble project context and route it to one provider.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use switchyard_config::{AppConfig, MAX_FILES_LIMIT};
use switchyard_core::context::{ContextEngine, ContextError, ContextPayload};
use switchyard_core::llm::{ModelRouter, RouteRequest, registry_from_config};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Switchyard — context-aware routing of coding requests to LLM providers.
#[derive(Parser)]
#[command(name = "switchyard", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "switchyard.toml")]
    config: PathBuf,

    /// Project root to index.
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index the project and report skipped entries.
    Index,

    /// Show the files that would accompany a query.
    Context {
        /// The query to score files against.
        query: String,

        /// Files the query is explicitly about.
        #[arg(short, long = "file")]
        files: Vec<PathBuf>,

        /// Override `context.max_files`.
        #[arg(long, value_parser = max_files_parser())]
        max_files: Option<usize>,

        /// Summarize lower-ranked files instead of dropping them.
        #[arg(long)]
        summaries: bool,
    },

    /// Assemble context, route the query and print the response.
    Route {
        /// The request.
        query: String,

        /// Files the request is explicitly about.
        #[arg(short, long = "file")]
        files: Vec<PathBuf>,

        /// Preferred model.
        #[arg(long)]
        model: Option<String>,

        /// Preferred provider.
        #[arg(long)]
        provider: Option<String>,

        /// Summarize lower-ranked files instead of dropping them.
        #[arg(long)]
        summaries: bool,
    },

    /// List configured providers with priority and availability.
    Providers,

    /// Validate and display configuration.
    Config {
        /// Show the resolved configuration.
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, found) = load_config(&cli.config).await?;

    let filter = match cli.verbose {
        0 => config.logging.level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    if !found {
        info!(path = %cli.config.display(), "Config file not found, using defaults");
    }

    match cli.command {
        Commands::Index => cmd_index(&cli.root, &config)?,
        Commands::Context {
            query,
            files,
            max_files,
            summaries,
        } => cmd_context(&cli.root, &config, &query, &files, max_files, summaries)?,
        Commands::Route {
            query,
            files,
            model,
            provider,
            summaries,
        } => {
            cmd_route(
                &cli.root,
                &config,
                RouteArgs {
                    query,
                    files,
                    model,
                    provider,
                    summaries,
                },
            )
            .await?
        }
        Commands::Providers => cmd_providers(&config),
        Commands::Config { show } => cmd_config(&cli.config, &config, show)?,
    }

    Ok(())
}

fn cmd_index(root: &Path, config: &AppConfig) -> Result<()> {
    let engine = open_engine(root, config)?;
    let report = engine.last_report();
    println!("Indexed {} files under {}", report.indexed, engine.indexer().root().display());
    for skipped in &report.skipped {
        println!("  skipped {}: {}", skipped.path.display(), skipped.reason);
    }
    Ok(())
}

fn cmd_context(
    root: &Path,
    config: &AppConfig,
    query: &str,
    files: &[PathBuf],
    max_files: Option<usize>,
    summaries: bool,
) -> Result<()> {
    let mut engine = open_engine(root, config)?;
    if let Some(n) = max_files {
        engine.set_max_files(n);
    }
    let files = absolutize(files);
    let payload = engine.get_context(query, &files, summaries || config.context.use_summaries)?;

    for (path, entry) in payload.iter() {
        let kind = if entry.is_summary() { "summary" } else { "full" };
        println!("{kind:>8}  {path}");
    }
    let stats = engine.stats(&payload);
    println!(
        "\n{} files, {} chars, ~{} tokens ({} remaining)",
        stats.files, stats.characters, stats.tokens, stats.tokens_remaining
    );
    Ok(())
}

struct RouteArgs {
    query: String,
    files: Vec<PathBuf>,
    model: Option<String>,
    provider: Option<String>,
    summaries: bool,
}

async fn cmd_route(root: &Path, config: &AppConfig, args: RouteArgs) -> Result<()> {
    let mut engine = open_engine(root, config)?;
    let files = absolutize(&args.files);
    let payload = match engine.get_context(
        &args.query,
        &files,
        args.summaries || config.context.use_summaries,
    ) {
        Ok(payload) => payload,
        Err(ContextError::Empty { candidates }) => {
            warn!(candidates, "No context selected, sending the query alone");
            ContextPayload::new()
        }
        Err(e) => return Err(e.into()),
    };
    let context_tokens = engine.stats(&payload).tokens;

    let registry = Arc::new(registry_from_config(config));
    if registry.is_empty() {
        anyhow::bail!("no providers configured; set an API key such as SWITCHYARD_ANTHROPIC_API_KEY");
    }
    let router = ModelRouter::new(registry);

    let mut request = RouteRequest::new(args.query)
        .with_context_tokens(context_tokens)
        .with_temperature(config.models.temperature);
    if !payload.is_empty() {
        request = request.with_context(payload.render());
    }
    request.preferred_model = args.model.or_else(|| config.models.preferred_model.clone());
    request.preferred_provider = args
        .provider
        .or_else(|| config.models.preferred_provider.clone());
    request.max_tokens = config.models.max_tokens;

    let routed = router.route(&request).await?;
    println!("{}", routed.response.content);
    eprintln!(
        "\n[{} / {}] {} tokens, ${:.4}",
        routed.decision.provider,
        routed.response.model,
        routed.response.tokens_used,
        routed.response.cost
    );
    Ok(())
}

fn cmd_providers(config: &AppConfig) {
    let registry = registry_from_config(config);
    let order = registry.priority_order();
    for status in registry.statuses() {
        let state = if status.available { "available" } else { "unavailable" };
        println!(
            "{:<16} priority {:<3} {:<12} {}",
            status.name,
            status.priority,
            state,
            status.models.join(", ")
        );
    }
    for name in config.providers.keys().filter(|n| !order.contains(n)) {
        println!("{name:<16} not configured (no API key)");
    }
}

fn cmd_config(config_path: &Path, config: &AppConfig, show: bool) -> Result<()> {
    if show {
        let toml_str = toml::to_string_pretty(config).context("serializing configuration")?;
        println!("{toml_str}");
    } else {
        println!("Configuration at '{}' is valid.", config_path.display());
    }
    Ok(())
}

fn max_files_parser() -> clap::builder::RangedU64ValueParser<usize> {
    clap::builder::RangedU64ValueParser::new().range(1..=MAX_FILES_LIMIT as u64)
}

fn open_engine(root: &Path, config: &AppConfig) -> Result<ContextEngine> {
    ContextEngine::open(root, &config.context)
        .with_context(|| format!("opening project at {}", root.display()))
}

/// Resolve CLI paths against the working directory so they match the index.
fn absolutize(files: &[PathBuf]) -> Vec<PathBuf> {
    files
        .iter()
        .map(|f| {
            f.canonicalize()
                .or_else(|_| std::path::absolute(f))
                .unwrap_or_else(|_| f.clone())
        })
        .collect()
}

async fn load_config(path: &Path) -> Result<(AppConfig, bool)> {
    if path.exists() {
        let config = AppConfig::load(path)
            .await
            .with_context(|| format!("loading {}", path.display()))?;
        Ok((config, true))
    } else {
        Ok((AppConfig::default(), false))
    }
}
