//! Usage Nudge Agent CLI
//!
//! Privacy-first phone usage monitor with gentle interventions.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use usage_nudge_agent::{
    agent::{spawn_event_pump, Agent, AgentPorts},
    classifier::{InsightClient, InsightConfig, LinearModel, Model, RemoteModel},
    collector::{Collector, PlatformBridge, UsageLog},
    config::Config,
    core::Scheduler,
    intervention::CommandSink,
    transparency::create_shared_log_with_persistence,
    PRIVACY_DECLARATION, VERSION,
};

#[derive(Parser)]
#[command(name = "usage-nudge")]
#[command(version = VERSION)]
#[command(about = "Privacy-first usage monitor with gentle interventions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start monitoring. Outbound commands are written to stdout as JSON lines
    Start {
        /// Read platform notifications from this file instead of stdin
        #[arg(long)]
        input: Option<PathBuf>,

        /// Use a remote classifier at this URL instead of the bundled model
        #[arg(long)]
        remote_classifier: Option<String>,

        /// API token for the text-insight service
        #[arg(long)]
        insight_token: Option<String>,
    },

    /// Pause collection
    Pause,

    /// Resume collection
    Resume,

    /// Show current status
    Status,

    /// Display privacy declaration
    Privacy,

    /// Show configuration
    Config,

    /// Ask the text-insight service about a piece of text
    Insight {
        text: String,

        /// API token (defaults to the configured one)
        #[arg(long)]
        token: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Start {
            input,
            remote_classifier,
            insight_token,
        } => cmd_start(input, remote_classifier, insight_token).await,
        Commands::Pause => cmd_pause(),
        Commands::Resume => cmd_resume(),
        Commands::Status => {
            cmd_status();
            Ok(())
        }
        Commands::Privacy => {
            cmd_privacy();
            Ok(())
        }
        Commands::Config => {
            cmd_config();
            Ok(())
        }
        Commands::Insight { text, token } => cmd_insight(&text, token).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

/// Logs go to stderr; stdout carries outbound commands.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_config() -> Config {
    Config::load().unwrap_or_else(|e| {
        tracing::warn!("Using default configuration: {e}");
        Config::default()
    })
}

fn build_model(config: &Config) -> anyhow::Result<Model> {
    if let Some(url) = &config.remote_classifier_url {
        tracing::info!(%url, "Using remote classifier");
        return Ok(Model::Remote(RemoteModel::new(url.clone())?));
    }
    match &config.model_weights_path {
        Some(path) => Ok(Model::Local(LinearModel::from_file(path)?)),
        None => Ok(Model::Local(LinearModel::default())),
    }
}

async fn cmd_start(
    input: Option<PathBuf>,
    remote_classifier: Option<String>,
    insight_token: Option<String>,
) -> anyhow::Result<()> {
    let mut config = load_config();
    if remote_classifier.is_some() {
        config.remote_classifier_url = remote_classifier;
    }
    if let Some(token) = insight_token {
        match config.insight.as_mut() {
            Some(insight) => insight.api_token = token,
            None => config.insight = Some(InsightConfig::new(token)),
        }
    }
    if let Err(e) = config.ensure_directories() {
        tracing::warn!("Could not create directories: {e}");
    }

    eprintln!("Usage Nudge Agent v{VERSION}");
    eprintln!("  Window duration: {}s", config.window_duration.as_secs());
    eprintln!("  Nudge cooldown: {} min", config.nudge_cooldown_minutes);
    eprintln!("  Friction targets: {}", config.friction_targets.len());
    eprintln!(
        "  Text insight: {}",
        if config.insight.is_some() {
            "enabled"
        } else {
            "disabled"
        }
    );
    eprintln!("Press Ctrl+C to stop");

    let transparency = create_shared_log_with_persistence(config.transparency_path());
    let usage_log = Arc::new(UsageLog::with_labels(
        config.app_labels.clone().into_iter().collect::<HashMap<_, _>>(),
    ));
    let sink = Arc::new(CommandSink::stdout());
    sink.set_overlay_permitted(config.overlay_permitted);

    let ports = AgentPorts {
        usage_source: usage_log.clone(),
        labels: usage_log.clone(),
        presenter: sink.clone(),
        lifecycle: sink.clone(),
    };
    let mut agent = Agent::new(&config, build_model(&config)?, ports, transparency.clone());
    if let Some(insight) = config.insight.clone() {
        agent = agent.with_insight(InsightClient::new(insight)?);
    }
    let agent = Arc::new(agent);

    let mut collector = Collector::new();
    collector.start()?;
    let running = Arc::new(AtomicBool::new(true));

    let bridge = PlatformBridge::new(collector.sender(), usage_log, transparency.clone());
    let reader: Box<dyn BufRead + Send> = match &input {
        Some(path) => Box::new(BufReader::new(
            std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(std::io::stdin())),
    };
    // The reader may block on stdin indefinitely, so it is never joined.
    let _reader = bridge.spawn_reader(reader, running.clone());
    let pump = spawn_event_pump(agent.clone(), collector.receiver().clone(), running.clone());

    let mut scheduler = Scheduler::new();
    agent.spawn(&mut scheduler);

    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    ctrlc::set_handler(move || token.cancel()).context("setting Ctrl+C handler")?;

    // Re-read the config every second so `usage-nudge pause/resume` can
    // control a running agent.
    if config.paused {
        eprintln!("Collection is currently paused. Run `usage-nudge resume` to start.");
    }
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(Duration::from_secs(1)) => {
                if let Ok(latest) = Config::load() {
                    agent.set_paused(latest.paused);
                    sink.set_overlay_permitted(latest.overlay_permitted);
                }
            }
        }
    }

    eprintln!();
    eprintln!("Stopping...");
    scheduler.shutdown().await;
    running.store(false, std::sync::atomic::Ordering::SeqCst);
    collector.stop();
    if pump.join().is_err() {
        tracing::error!("Event pump panicked");
    }

    if let Err(e) = transparency.save() {
        tracing::warn!("Could not save transparency log: {e}");
    }

    eprintln!();
    eprintln!("{}", transparency.summary());
    Ok(())
}

fn cmd_pause() -> anyhow::Result<()> {
    let mut config = load_config();
    config.paused = true;
    config.save().context("saving config")?;
    println!("Collection paused. Use 'usage-nudge resume' to continue.");
    Ok(())
}

fn cmd_resume() -> anyhow::Result<()> {
    let mut config = load_config();
    config.paused = false;
    config.save().context("saving config")?;
    println!("Collection resumed.");
    Ok(())
}

fn cmd_status() {
    let config = load_config();

    println!("Usage Nudge Agent Status");
    println!("========================");
    println!();

    println!("Configuration:");
    println!("  Window duration: {}s", config.window_duration.as_secs());
    println!("  Usage poll interval: {}s", config.usage_poll_interval.as_secs());
    println!("  Nudge cooldown: {} min", config.nudge_cooldown_minutes);
    println!(
        "  Classifier: {}",
        config.remote_classifier_url.as_deref().unwrap_or("bundled")
    );
    println!(
        "  Friction targets: {}",
        config
            .friction_targets
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("  Overlay permitted: {}", config.overlay_permitted);
    println!("  Paused: {}", config.paused);
    println!();

    // Load and show transparency stats if available
    let stats_path = config.transparency_path();
    if stats_path.exists() {
        if let Ok(content) = std::fs::read_to_string(&stats_path) {
            if let Ok(stats) = serde_json::from_str::<serde_json::Value>(&content) {
                println!("Cumulative Statistics:");
                for (key, label) in [
                    ("screen_events", "Screen events"),
                    ("usage_events", "App usage events"),
                    ("typing_events", "Text-change events"),
                    ("windows_completed", "Windows completed"),
                    ("nudges_shown", "Nudges shown"),
                    ("friction_actions", "Launch friction actions"),
                ] {
                    if let Some(value) = stats.get(key) {
                        println!("  {label}: {value}");
                    }
                }
            }
        }
    } else {
        println!("No previous session data found.");
    }
}

fn cmd_privacy() {
    println!("{PRIVACY_DECLARATION}");
}

fn cmd_config() {
    let config = load_config();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}

async fn cmd_insight(text: &str, token: Option<String>) -> anyhow::Result<()> {
    let config = load_config();
    let insight = match (token, config.insight) {
        (Some(token), Some(mut configured)) => {
            configured.api_token = token;
            configured
        }
        (Some(token), None) => InsightConfig::new(token),
        (None, Some(configured)) => configured,
        (None, None) => anyhow::bail!("no insight token configured; pass --token"),
    };

    let insights = InsightClient::new(insight)?.analyze(text).await?;
    println!("{}", serde_json::to_string_pretty(&insights)?);
    Ok(())
}
