use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use colored::*;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use syncpilot_cli::client::OrchestratorClient;
use syncpilot_cli::config::{AppConfig, ConfigManager};
use syncpilot_cli::error::{CliError, CliResult};
use syncpilot_cli::output::{OutputFormat, OutputFormatter, create_formatter};
use syncpilot_cli::server::Server;
use syncpilot_cli::terminal;
use syncpilot_core::{InstanceId, Operation};

#[derive(Parser)]
#[command(name = "syncpilot")]
#[command(author, version, about = "syncpilot - Replication job orchestrator", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Print JSON instead of human-readable text
    #[arg(long, global = true)]
    json: bool,

    /// Use this configuration file instead of the default location
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the orchestrator server
    Serve {
        /// Address to listen on (overrides server.listen_addr)
        #[arg(short, long, value_name = "ADDR")]
        listen: Option<String>,
    },

    /// Drive replication on an instance through a running orchestrator
    Instance {
        #[command(subcommand)]
        command: InstanceCommand,
    },

    /// Check that the orchestrator is up
    Health,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum InstanceCommand {
    /// Start replication
    Start { id: String },

    /// Stop replication
    Stop { id: String },

    /// Commit (cut over) replication
    Commit { id: String },

    /// Reverse the replication direction
    Reverse { id: String },

    /// Refresh and show the state of an instance
    Status { id: String },

    /// Show the last known state of every instance
    List,
}

impl InstanceCommand {
    fn operation(&self) -> Option<(Operation, &str)> {
        match self {
            InstanceCommand::Start { id } => Some((Operation::Start, id.as_str())),
            InstanceCommand::Stop { id } => Some((Operation::Stop, id.as_str())),
            InstanceCommand::Commit { id } => Some((Operation::Commit, id.as_str())),
            InstanceCommand::Reverse { id } => Some((Operation::Reverse, id.as_str())),
            InstanceCommand::Status { .. } | InstanceCommand::List => None,
        }
    }
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Get a configuration value
    Get {
        /// Configuration key (e.g., orchestrator.commit.max_lag_seconds)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., orchestrator.poll_interval_seconds)
        key: String,

        /// Value to set
        value: String,
    },

    /// List all configuration values
    List,

    /// Print the configuration file location
    Path,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.debug, matches!(cli.command, Commands::Serve { .. }));
    if !terminal::supports_ansi() {
        colored::control::set_override(false);
    }

    let debug = cli.debug;
    if let Err(error) = run(cli).await {
        eprint!("{}", error.format_for_user(debug));
        std::process::exit(error.exit_code() as i32);
    }
}

fn init_logging(debug: bool, serving: bool) {
    if debug {
        env_logger::Builder::from_env(env_logger::Env::default())
            .filter_level(log::LevelFilter::Info)
            .filter_module("syncpilot_core", log::LevelFilter::Debug)
            .filter_module("syncpilot_cli", log::LevelFilter::Debug)
            .format_timestamp_millis()
            .init();
        eprintln!("Debug logging enabled");
    } else {
        // The server narrates its work; client commands only surface problems
        let default_filter = if serving { "info" } else { "warn" };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
            .init();
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let manager = match cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new(),
    };
    let format = OutputFormat::detect(cli.json);

    match cli.command {
        Commands::Serve { listen } => serve_command(&manager, listen).await,
        Commands::Instance { command } => {
            let config = load_config(&manager)?;
            instance_command(&config, format, command).await
        }
        Commands::Health => {
            let config = load_config(&manager)?;
            let client = client_for(&config)?;
            let health = client.health().await?;
            emit(formatter(format).format_health(&health)?);
            Ok(())
        }
        Commands::Config { command } => config_command(manager, command),
        Commands::Completions { shell } => {
            generate_completions(shell);
            Ok(())
        }
    }
}

fn load_config(manager: &ConfigManager) -> CliResult<AppConfig> {
    manager
        .load()
        .map_err(|e| CliError::config(&format!("{e:#}")))
}

fn client_for(config: &AppConfig) -> CliResult<OrchestratorClient> {
    Ok(OrchestratorClient::new(
        &config.client.server_url,
        Duration::from_secs(config.client.timeout_seconds),
    )?)
}

fn formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    create_formatter(format, terminal::supports_ansi())
}

/// Print formatter output with exactly one trailing newline
fn emit(text: String) {
    println!("{}", text.trim_end_matches('\n'));
}

async fn serve_command(manager: &ConfigManager, listen: Option<String>) -> CliResult<()> {
    let config = manager
        .load_validated()
        .map_err(|e| CliError::config(&format!("{e:#}")))?;
    let listen_addr = listen.unwrap_or(config.server.listen_addr);

    log::debug!(
        "Managing {} instance(s), polling every {}s",
        config.orchestrator.instances.len(),
        config.orchestrator.poll_interval_seconds
    );
    let controller = config
        .orchestrator
        .build_controller()
        .map_err(|e| CliError::config(&e.to_string()))?;

    Server::new(controller, listen_addr).run().await?;
    Ok(())
}

async fn instance_command(
    config: &AppConfig,
    format: OutputFormat,
    command: InstanceCommand,
) -> CliResult<()> {
    let client = client_for(config)?;
    let formatter = formatter(format);

    if let Some((operation, id)) = command.operation() {
        let response = client.execute(operation, &InstanceId::from(id)).await?;
        emit(formatter.format_operation(&response)?);
        return Ok(());
    }

    match command {
        InstanceCommand::Status { id } => {
            let snapshot = client.status(&InstanceId::from(id)).await?;
            emit(formatter.format_snapshot(&snapshot)?);
        }
        InstanceCommand::List => {
            let snapshots = client.list().await?;
            emit(formatter.format_snapshots(&snapshots)?);
        }
        _ => {}
    }

    Ok(())
}

fn config_command(mut manager: ConfigManager, command: ConfigCommand) -> CliResult<()> {
    let config_error = |e: anyhow::Error| CliError::config(&format!("{e:#}"));

    match command {
        ConfigCommand::Get { key } => {
            let value = manager.get(&key).map_err(config_error)?;
            println!("{value}");
        }
        ConfigCommand::Set { key, value } => {
            manager.set(&key, &value).map_err(config_error)?;
            eprintln!("{}", format!("Set {key} = {value}").green());
            eprintln!(
                "Configuration saved to: {}",
                manager.get_config_path().display()
            );
        }
        ConfigCommand::List => {
            let items = manager.list().map_err(config_error)?;
            eprintln!("{}", "Configuration:".bold().blue());
            eprintln!("Config file: {}", manager.get_config_path().display());
            eprintln!();

            // Group items by section
            let mut sections: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();
            for (key, value) in items {
                let section = key.split('.').next().unwrap_or("general").to_string();
                sections.entry(section).or_default().push((key, value));
            }

            for (section, items) in sections {
                println!("[{}]", section.yellow());
                for (key, value) in items {
                    let display_key = key.split_once('.').map_or(key.as_str(), |(_, rest)| rest);
                    println!("  {} = {}", display_key.cyan(), value);
                }
                println!();
            }
        }
        ConfigCommand::Path => {
            println!("{}", manager.get_config_path().display());
        }
    }

    Ok(())
}

fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();

    generate(shell, &mut cmd, name, &mut std::io::stdout());
}
