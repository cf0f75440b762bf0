// msgdeck CLI - Command Line Interface Entry Point

mod watch;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::debug;

use msgdeck_config::{Config, ConfigLoader, loader::parse_override};
use msgdeck_core::{
    EventStreamClient, RunControlClient, SCENARIO_PRESETS, ScenarioPreset, SseTransport,
    StatusPoller, StatusSettings, StreamSettings,
};
use msgdeck_protocol::{CustomRunConfig, RunConfig, RunStatusSnapshot, ScenarioId};

/// msgdeck - operator console for the messaging processing backend
#[derive(Parser, Debug)]
#[command(name = "msgdeck")]
#[command(version, about, long_about = None)]
struct TopCli {
    #[clap(flatten)]
    config_overrides: CliConfigOverrides,

    /// Backend base URL (shorthand for -c server.base_url=URL)
    #[arg(long = "base-url", global = true, value_name = "URL")]
    base_url: Option<String>,

    #[clap(subcommand)]
    command: Commands,
}

/// CLI configuration overrides
#[derive(Debug, Args)]
struct CliConfigOverrides {
    /// Configuration override in key=value format
    #[arg(short = 'c', long = "config", value_name = "KEY=VALUE", global = true)]
    overrides: Vec<String>,
}

/// Available commands
#[derive(Debug, Subcommand)]
enum Commands {
    /// Start a run from a named scenario or explicit parameters
    Start(StartArgs),

    /// Stop the current run
    Stop,

    /// Reset the backend
    Reset {
        /// Also delete the on-disk queue file
        #[arg(long)]
        delete_disk_queue_file: bool,
    },

    /// Print the current run status once
    Status,

    /// List the scenario presets
    Scenarios,

    /// Follow connection, status and events until Ctrl-C
    Watch {
        /// Print each event as a JSON line
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Args)]
struct StartArgs {
    /// Let the backend run a named scenario
    #[arg(
        long,
        conflicts_with_all = [
            "preset",
            "worker_threads",
            "queue_capacity",
            "processing_delay_ms",
            "message_count",
        ]
    )]
    scenario: Option<ScenarioId>,

    /// Fill the parameters below from a scenario preset
    #[arg(long, value_name = "SCENARIO")]
    preset: Option<ScenarioId>,

    #[arg(long)]
    worker_threads: Option<u32>,

    #[arg(long)]
    queue_capacity: Option<u32>,

    #[arg(long)]
    processing_delay_ms: Option<u64>,

    #[arg(long)]
    message_count: Option<u64>,
}

/// Parameters the start form is pre-filled with.
const FORM_DEFAULTS: CustomRunConfig = CustomRunConfig {
    worker_threads: 2,
    queue_capacity: 10,
    processing_delay_ms: 1000,
    message_count: 20,
};

impl StartArgs {
    fn run_config(&self) -> RunConfig {
        if let Some(id) = self.scenario {
            return RunConfig::scenario(id);
        }
        let base = self
            .preset
            .map(|id| ScenarioPreset::for_id(id).config)
            .unwrap_or(FORM_DEFAULTS);
        RunConfig::Custom(CustomRunConfig {
            worker_threads: self.worker_threads.unwrap_or(base.worker_threads),
            queue_capacity: self.queue_capacity.unwrap_or(base.queue_capacity),
            processing_delay_ms: self.processing_delay_ms.unwrap_or(base.processing_delay_ms),
            message_count: self.message_count.unwrap_or(base.message_count),
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays clean for `watch --json`.
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info".to_string())
                .as_str(),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = TopCli::parse();
    let config = load_config(&cli)?;
    debug!(base_url = %config.server.base_url, "configuration loaded");

    match cli.command {
        Commands::Start(args) => {
            let run = args.run_config();
            control_client(&config).start(&run).await?;
            println!("Run started: {}", describe_run(&run));
        }
        Commands::Stop => {
            control_client(&config).stop().await?;
            println!("Run stopped.");
        }
        Commands::Reset {
            delete_disk_queue_file,
        } => {
            control_client(&config).reset(delete_disk_queue_file).await?;
            if delete_disk_queue_file {
                println!("Backend reset, disk queue file deleted.");
            } else {
                println!("Backend reset.");
            }
        }
        Commands::Status => {
            let snapshot = control_client(&config).fetch_status().await?;
            println!("{}", describe_status(&snapshot));
        }
        Commands::Scenarios => list_scenarios(),
        Commands::Watch { json } => run_watch(&config, json).await?,
    }

    Ok(())
}

fn load_config(cli: &TopCli) -> Result<Config> {
    let mut overrides = cli
        .config_overrides
        .overrides
        .iter()
        .map(|raw| parse_override(raw))
        .collect::<msgdeck_config::Result<Vec<_>>>()?;
    if let Some(url) = &cli.base_url {
        overrides.push(("server.base_url".to_string(), url.clone()));
    }
    let project_dir = std::env::current_dir().context("failed to resolve working directory")?;
    ConfigLoader::new()
        .with_project_dir(project_dir)
        .load_with_cli_overrides(overrides)
        .context("failed to load configuration")
}

fn control_client(config: &Config) -> RunControlClient {
    RunControlClient::from_config(&config.server)
}

async fn run_watch(config: &Config, json: bool) -> Result<()> {
    let transport = Arc::new(SseTransport::from_config(&config.server));
    let stream = EventStreamClient::new(transport, StreamSettings::from(&config.stream));
    let poller = StatusPoller::spawn(
        Arc::new(control_client(config)),
        StatusSettings::from(&config.status),
    );
    if !json {
        println!("Watching {} (Ctrl-C to quit)", config.server.base_url);
    }
    watch::run(stream, poller, json).await
}

fn list_scenarios() {
    println!("Scenario presets:");
    println!();
    println!("  ID  WORKERS  QUEUE  DELAY(ms)  MESSAGES");
    for preset in SCENARIO_PRESETS {
        let c = preset.config;
        println!(
            "  {:<2}  {:>7}  {:>5}  {:>9}  {:>8}",
            preset.id.as_str(),
            c.worker_threads,
            c.queue_capacity,
            c.processing_delay_ms,
            c.message_count
        );
    }
    println!();
    println!("Use: msgdeck start --scenario <ID>, or --preset <ID> to tweak the parameters");
}

fn describe_run(run: &RunConfig) -> String {
    match run {
        RunConfig::Scenario { scenario } => format!("scenario {scenario}"),
        RunConfig::Custom(c) => format!(
            "{} workers, queue {}, delay {} ms, {} messages",
            c.worker_threads, c.queue_capacity, c.processing_delay_ms, c.message_count
        ),
    }
}

fn describe_status(snapshot: &RunStatusSnapshot) -> String {
    let mut line = format!("Status: {}", snapshot.status.as_str());
    if let Some(run_id) = &snapshot.run_id {
        line.push_str(&format!("  run={run_id}"));
    }
    if let Some(mode) = &snapshot.scenario_mode {
        line.push_str(&format!("  scenario={mode}"));
    }
    line
}
