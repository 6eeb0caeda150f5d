//! schedbot CLI
//!
//! Command-line interface for the schedule bot's store: migrates the
//! legacy JSON document and inspects or edits persisted state.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use schedbot_core::{Config, Store};

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "schedbot")]
#[command(about = "schedbot - schedule bot storage and migration tool")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log more (-v: info, -vv: debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to the SQLite database (overrides config)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate the legacy JSON document into the database (default)
    Migrate {
        /// Path to the legacy JSON document
        #[arg(long)]
        legacy: Option<PathBuf>,
        /// Skip copying files into the backup directory
        #[arg(long)]
        no_backup: bool,
    },
    /// Show record counts and statistics
    Status,
    /// Show configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// Manage administrators
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },
    /// Manage global settings
    Setting {
        #[command(subcommand)]
        command: SettingCommands,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
}

#[derive(Subcommand)]
enum AdminCommands {
    /// List administrators
    #[command(alias = "ls")]
    List,
    /// Grant admin rights
    Add {
        /// Telegram user id
        user_id: i64,
    },
    /// Revoke admin rights
    #[command(alias = "rm")]
    Remove {
        /// Telegram user id
        user_id: i64,
    },
}

#[derive(Subcommand)]
enum SettingCommands {
    /// List all settings
    #[command(alias = "ls")]
    List,
    /// Show one setting
    Get {
        /// Setting key
        key: String,
    },
    /// Create or replace a setting
    Set {
        /// Setting key
        key: String,
        /// Setting value
        value: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let mut config = load_config(cli.config.as_ref())?;
    if let Some(database) = cli.database {
        config.database_path = Some(database);
    }

    // Commands that don't need the store
    match cli.command {
        None => return commands::migrate::run(&config, &output),
        Some(Commands::Migrate { legacy, no_backup }) => {
            if let Some(legacy) = legacy {
                config.legacy_path = Some(legacy);
            }
            if no_backup {
                config.backups_enabled = false;
            }
            return commands::migrate::run(&config, &output);
        }
        Some(Commands::Config { command }) => {
            return match command {
                Some(ConfigCommands::Show) | None => {
                    commands::config::show(&config, cli.config.as_ref(), &output)
                }
            };
        }
        Some(command) => {
            let mut store = Store::open(&config).with_context(|| {
                format!("Failed to open database at {:?}", config.database_path())
            })?;

            match command {
                Commands::Status => commands::status::show(&store, &output),
                Commands::Admin { command } => handle_admin_command(command, &mut store, &output),
                Commands::Setting { command } => {
                    handle_setting_command(command, &mut store, &output)
                }
                Commands::Migrate { .. } | Commands::Config { .. } => unreachable!(), // Handled above
            }
        }
    }
}

fn handle_admin_command(command: AdminCommands, store: &mut Store, output: &Output) -> Result<()> {
    match command {
        AdminCommands::List => commands::admin::list(store, output),
        AdminCommands::Add { user_id } => commands::admin::add(store, user_id, output),
        AdminCommands::Remove { user_id } => commands::admin::remove(store, user_id, output),
    }
}

fn handle_setting_command(
    command: SettingCommands,
    store: &mut Store,
    output: &Output,
) -> Result<()> {
    match command {
        SettingCommands::List => commands::setting::list(store, output),
        SettingCommands::Get { key } => commands::setting::get(store, &key, output),
        SettingCommands::Set { key, value } => commands::setting::set(store, &key, &value, output),
    }
}

fn load_config(config_path: Option<&PathBuf>) -> Result<Config> {
    match config_path {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")
}

/// Log to stderr, filtered by `RUST_LOG` or the verbosity flag
fn init_logging(verbose: u8) {
    let log_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    let env_filter = if verbose == 0 {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("schedbot_core={},schedbot_cli={}", log_level, log_level))
        })
    } else {
        EnvFilter::new(format!("schedbot_core={},schedbot_cli={}", log_level, log_level))
    };

    // Ignore error if already initialized
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_subcommand_means_migrate() {
        let cli = Cli::try_parse_from(["schedbot"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_migrate_flags() {
        let cli = Cli::try_parse_from([
            "schedbot",
            "migrate",
            "--legacy",
            "old.json",
            "--database",
            "new.db",
            "--no-backup",
            "--json",
        ])
        .unwrap();

        assert!(cli.json);
        assert_eq!(cli.database, Some(PathBuf::from("new.db")));
        match cli.command {
            Some(Commands::Migrate { legacy, no_backup }) => {
                assert_eq!(legacy, Some(PathBuf::from("old.json")));
                assert!(no_backup);
            }
            _ => panic!("expected migrate"),
        }
    }

    #[test]
    fn test_admin_ids_are_integers() {
        assert!(Cli::try_parse_from(["schedbot", "admin", "add", "111"]).is_ok());
        assert!(Cli::try_parse_from(["schedbot", "admin", "add", "abc"]).is_err());
    }
}
