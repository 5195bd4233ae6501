use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use manna_gateway::{
    AttemptSink, GatewayConfig, JsonlSink, NullSink, ProviderConfig, ProviderManager,
    TextProvider, build_providers,
};

mod bootstrap;

const TEST_PROMPT: &str = "Say hello in one sentence.";

/// Outer bound on a single health probe, over and above the adapter's own
/// per-call timeout.
const PROBE_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Parser)]
#[command(name = "manna")]
#[command(version)]
#[command(about = "Manna — multi-provider AI gateway tools")]
struct Cli {
    /// Append attempt records to this JSONL file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe every provider slot and report UP / DOWN / NO KEY status
    Check,

    /// Exercise each configured provider through the gateway surface
    Diagnose,

    /// Send a one-shot prompt through the failover chain
    Ask {
        /// The prompt to send
        prompt: String,
    },

    /// List active providers in failover order
    Providers,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = bootstrap::config_from_env();
    let configured = config
        .providers
        .iter()
        .filter(|p| !p.api_key.is_empty())
        .count();
    debug!("Provider roster: {} slots, {} configured", config.providers.len(), configured);

    let sink: Arc<dyn AttemptSink> = match &cli.log_file {
        Some(path) => {
            info!("Recording attempts to {}", path.display());
            Arc::new(JsonlSink::new(path))
        }
        None => Arc::new(NullSink),
    };

    match cli.command {
        Commands::Check => cmd_check(&config).await,
        Commands::Diagnose => cmd_diagnose(&config).await,
        Commands::Ask { prompt } => cmd_ask(&config, sink, &prompt).await,
        Commands::Providers => cmd_providers(&config),
    }
}

/// One provider instance for an individual roster slot, if configured
fn single_provider(cfg: &ProviderConfig) -> Option<Box<dyn TextProvider>> {
    build_providers(&GatewayConfig {
        providers: vec![cfg.clone()],
    })
    .pop()
}

async fn cmd_check(config: &GatewayConfig) -> Result<()> {
    println!("{}", "=".repeat(70));
    println!("  Manna — provider health check");
    println!("  {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));
    println!("{}\n", "=".repeat(70));

    let mut up = 0usize;
    let mut down = 0usize;
    let mut no_key = 0usize;

    for (idx, cfg) in config.providers.iter().enumerate() {
        let label = format!("{}. {}", idx + 1, display_name(idx, cfg));

        let Some(provider) = single_provider(cfg) else {
            println!("  {label}: NO KEY");
            no_key += 1;
            continue;
        };

        let start = Instant::now();
        match tokio::time::timeout(PROBE_TIMEOUT, provider.generate(TEST_PROMPT)).await {
            Ok(Ok(response)) => {
                let latency = start.elapsed().as_millis();
                let preview: String = response.chars().take(40).collect();
                println!("  {label}: UP ({latency}ms) — \"{}\"", preview.replace('\n', " "));
                up += 1;
            }
            Ok(Err(e)) => {
                let latency = start.elapsed().as_millis();
                let msg: String = e.to_string().chars().take(60).collect();
                println!("  {label}: DOWN ({latency}ms) — {msg}");
                down += 1;
            }
            Err(_) => {
                println!("  {label}: DOWN — probe timed out after {}s", PROBE_TIMEOUT.as_secs());
                down += 1;
            }
        }
    }

    println!("\n{}", "=".repeat(70));
    println!("  SUMMARY: {up} UP | {down} DOWN | {no_key} NO KEY");
    println!("{}", "=".repeat(70));

    if up >= 3 {
        println!("\n  Healthy — enough providers are online.");
    } else if up >= 1 {
        println!("\n  WARNING — only {up} provider(s) online. Monitor closely.");
    } else {
        println!("\n  CRITICAL — all providers are down. Check API keys.");
    }
    Ok(())
}

async fn cmd_diagnose(config: &GatewayConfig) -> Result<()> {
    let manager = ProviderManager::from_config(config);
    let active = manager.active_providers();
    println!("Active providers: {}", active.join(", "));

    if active.is_empty() {
        println!("No providers active. Set at least one provider API key.");
        return Ok(());
    }

    for (idx, cfg) in config.providers.iter().enumerate() {
        let Some(provider) = single_provider(cfg) else {
            continue;
        };

        println!("\nTesting {}...", display_name(idx, cfg));
        let start = Instant::now();
        match provider.generate("Say 'API Online'").await {
            Ok(response) => {
                let duration = start.elapsed().as_millis();
                println!("  ok ({duration}ms): \"{}\"", response.trim());
            }
            Err(e) => {
                println!("  failed: {e}");
            }
        }
    }
    Ok(())
}

async fn cmd_ask(config: &GatewayConfig, sink: Arc<dyn AttemptSink>, prompt: &str) -> Result<()> {
    let manager = ProviderManager::from_config_with_sink(config, sink);
    let generation = manager.generate_response(prompt).await?;
    println!("[{}]\n{}", generation.provider, generation.text);
    Ok(())
}

fn cmd_providers(config: &GatewayConfig) -> Result<()> {
    let manager = ProviderManager::from_config(config);
    for name in manager.active_providers() {
        println!("{name}");
    }
    Ok(())
}

fn display_name(roster_idx: usize, cfg: &ProviderConfig) -> String {
    cfg.name
        .clone()
        .unwrap_or_else(|| {
            bootstrap::ROSTER
                .get(roster_idx)
                .map(|e| e.display_name().to_string())
                .unwrap_or_else(|| cfg.kind.display_name().to_string())
        })
}
