//! PARITY Protocol CLI
//!
//! Runs scripted scenarios against a persisted protocol engine and inspects
//! the stored state.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use console::style;
use tracing::info;

use parity::cli::{resolve_account, CliConfig, OutputFormat, Scenario, ScenarioRunner};
use parity::core::access::{AllowAll, RoleRegistry};
use parity::governance::ProtocolParameter;
use parity::protocol::{EngineState, EventLog, ProtocolEngine, ProtocolEvent};

/// PARITY Protocol CLI - synthetic asset tracking the KSM/DOT market cap ratio
#[derive(Parser)]
#[command(name = "parity")]
#[command(version = parity::VERSION)]
#[command(about = "Command-line interface for the PARITY protocol", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to data directory
    #[arg(short, long, env = "PARITY_DATA_DIR", default_value = "~/.parity")]
    data_dir: PathBuf,

    /// Protocol configuration file (defaults to config.json in the data directory)
    #[arg(short, long, env = "PARITY_CONFIG")]
    config: Option<PathBuf>,

    /// Output format: text, json or json-pretty
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Protocol configuration
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Run a scenario file against the stored state
    Run {
        /// Scenario JSON file
        scenario: PathBuf,

        /// Ignore any stored state and start from genesis
        #[arg(long)]
        fresh: bool,

        /// Do not persist the resulting state
        #[arg(long)]
        no_save: bool,
    },

    /// Protocol statistics from the stored state
    Status,

    /// Position of one account
    Position {
        /// Account label or hex address
        account: String,
    },

    /// Stored events
    Events {
        /// Only events of this block
        #[arg(short, long)]
        block: Option<u64>,
    },

    /// Adjustable parameters with their bounds
    Parameters,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write the default configuration
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
    /// Validate the effective configuration
    Validate,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run_command(&cli) {
        eprintln!("{} {}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }
}

fn run_command(cli: &Cli) -> anyhow::Result<()> {
    let config = CliConfig {
        config_file: cli.config.clone(),
        format: cli.format,
        color: !cli.no_color,
        ..CliConfig::new(&cli.data_dir)
    };

    match &cli.command {
        Commands::Config(cmd) => cmd_config(&config, cmd),
        Commands::Run { scenario, fresh, no_save } => cmd_run(&config, scenario, *fresh, *no_save),
        Commands::Status => cmd_status(&config),
        Commands::Position { account } => cmd_position(&config, account),
        Commands::Events { block } => cmd_events(&config, *block),
        Commands::Parameters => cmd_parameters(&config),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMMAND HANDLERS
// ═══════════════════════════════════════════════════════════════════════════════

fn cmd_config(config: &CliConfig, cmd: &ConfigCommands) -> anyhow::Result<()> {
    let out = config.formatter();
    match cmd {
        ConfigCommands::Init { force } => {
            let path = config.init_protocol_config(*force)?;
            out.success(&format!("Wrote default configuration to {}", path.display()));
        }
        ConfigCommands::Show => {
            out.data(&config.load_protocol_config()?);
        }
        ConfigCommands::Validate => {
            config.load_protocol_config()?;
            out.success(&format!(
                "Configuration is valid ({})",
                config.protocol_config_path().display()
            ));
        }
    }
    Ok(())
}

fn cmd_run(config: &CliConfig, path: &Path, fresh: bool, no_save: bool) -> anyhow::Result<()> {
    let out = config.formatter();
    let scenario = Scenario::load(path)?;
    let admin = scenario.admin_address()?;
    let manager = config.open_state()?;

    let stored = if fresh { None } else { manager.load_state()? };
    let engine = match stored {
        Some(state) => {
            info!(block = state.block_height, "Resuming from stored state");
            ProtocolEngine::from_state(state, RoleRegistry::with_admin(admin))
        }
        None => {
            let protocol_config = match &scenario.config {
                Some(c) => c.clone(),
                None => config.load_protocol_config()?,
            };
            ProtocolEngine::new(protocol_config, RoleRegistry::with_admin(admin))?
        }
    };

    let started = chrono::Utc::now();
    let mut runner = ScenarioRunner::new(engine, admin);
    let report = runner.run(&scenario)?;
    let elapsed = chrono::Utc::now() - started;

    if out.format() == OutputFormat::Text {
        out.section(&format!("Scenario: {}", report.name));
        let rows: Vec<Vec<String>> = report
            .steps
            .iter()
            .map(|s| vec![s.index.to_string(), s.step.clone(), s.outcome.clone()])
            .collect();
        out.table(&["#", "Step", "Outcome"], &rows);
        out.statistics(&report.statistics);
    } else {
        out.data(&report);
    }

    if no_save {
        out.info("State not saved (--no-save)");
    } else {
        let state = runner.into_engine().into_state();
        save_events(&manager, &report.events)?;
        let metadata = manager.save_state(&state)?;
        out.success(&format!(
            "Saved state at block {} (root {})",
            metadata.block_height,
            &metadata.state_root.to_hex()[..16]
        ));
    }
    out.info(&format!(
        "{} steps in {} ms",
        report.steps.len(),
        elapsed.num_milliseconds()
    ));
    Ok(())
}

fn cmd_status(config: &CliConfig) -> anyhow::Result<()> {
    let engine = stored_engine(config)?;
    config.formatter().statistics(&engine.statistics());
    Ok(())
}

fn cmd_position(config: &CliConfig, account: &str) -> anyhow::Result<()> {
    let engine = stored_engine(config)?;
    let position = engine.user_position(&resolve_account(account)?);
    config.formatter().position(account, &position);
    Ok(())
}

fn cmd_events(config: &CliConfig, block: Option<u64>) -> anyhow::Result<()> {
    let manager = config.open_state()?;
    let events = match block {
        Some(height) => manager.load_block_events(height)?,
        None => manager.load_all_events()?,
    };
    let out = config.formatter();
    if events.is_empty() && out.format() == OutputFormat::Text {
        out.info("No events stored");
        return Ok(());
    }
    out.events(&events);
    Ok(())
}

fn cmd_parameters(config: &CliConfig) -> anyhow::Result<()> {
    let protocol_config = match config.open_state()?.load_state()? {
        Some(state) => state.config,
        None => config.load_protocol_config()?,
    };
    let rows: Vec<Vec<String>> = ProtocolParameter::ALL
        .iter()
        .map(|p| {
            let (min, max) = p.bounds();
            vec![
                p.key().to_string(),
                p.get(&protocol_config).to_string(),
                format!("{}..={}", min, max),
                p.description().to_string(),
            ]
        })
        .collect();
    config
        .formatter()
        .table(&["Parameter", "Value", "Bounds", "Description"], &rows);
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Read-only engine over the stored snapshot
fn stored_engine(config: &CliConfig) -> anyhow::Result<ProtocolEngine<AllowAll>> {
    let state: EngineState = config
        .open_state()?
        .load_state()?
        .ok_or_else(|| anyhow::anyhow!("no stored state; run a scenario first"))?;
    Ok(ProtocolEngine::from_state(state, AllowAll))
}

/// Append run events to the per-block event store
fn save_events<B: parity::storage::StorageBackend>(
    manager: &parity::storage::StateManager<B>,
    events: &[ProtocolEvent],
) -> anyhow::Result<()> {
    let mut by_block: BTreeMap<u64, Vec<ProtocolEvent>> = BTreeMap::new();
    for event in events {
        by_block.entry(event.block_height()).or_default().push(event.clone());
    }
    for (height, new_events) in by_block {
        let mut log = EventLog::new();
        for event in manager.load_block_events(height)?.into_iter().chain(new_events) {
            log.push(event);
        }
        manager.save_block_events(height, &log)?;
    }
    Ok(())
}
