//! Config command handlers

use std::path::PathBuf;

use anyhow::Result;

use schedbot_core::Config;

use crate::output::{Output, OutputFormat};

/// Show the effective configuration (after env and CLI overrides)
pub fn show(config: &Config, config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    match output.format {
        OutputFormat::Json => {
            output.json(&serde_json::json!({
                "data_dir": config.data_dir,
                "database_path": config.database_path(),
                "legacy_path": config.legacy_path(),
                "backup_dir": config.backup_dir(),
                "backups_enabled": config.backups_enabled,
                "busy_timeout_ms": config.busy_timeout_ms,
                "bootstrap_admins": config.bootstrap_admins
            }));
        }
        OutputFormat::Quiet => {
            println!("{}", config.database_path().display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            let admins = if config.bootstrap_admins.is_empty() {
                "(not set)".to_string()
            } else {
                config
                    .bootstrap_admins
                    .iter()
                    .map(|id| id.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            };

            println!("Configuration:");
            println!("  data_dir:         {}", config.data_dir.display());
            println!("  database:         {}", config.database_path().display());
            println!("  legacy_file:      {}", config.legacy_path().display());
            println!("  backup_dir:       {}", config.backup_dir().display());
            println!("  backups_enabled:  {}", config.backups_enabled);
            println!("  busy_timeout_ms:  {}", config.busy_timeout_ms);
            println!("  bootstrap_admins: {}", admins);
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}
