//! Migrate command handler

use anyhow::Result;

use schedbot_core::{migrate, Config};

use crate::output::Output;

/// Run the legacy migration and print its report
///
/// On failure a banner (and a recovery hint, if one applies) is printed
/// before the error is returned, so the process exits non-zero.
pub fn run(config: &Config, output: &Output) -> Result<()> {
    match migrate::run(config) {
        Ok(report) => {
            output.print_report(&report);
            Ok(())
        }
        Err(e) => {
            output.failure(&format!("Migration failed: {}", e));
            if !output.is_json() && !output.is_quiet() {
                if let Some(hint) = e.recovery_suggestion() {
                    eprintln!("  {}", hint);
                }
            }
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;
    use tempfile::TempDir;

    #[test]
    fn test_run_bootstraps_empty_dir() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::with_data_dir(temp_dir.path());

        run(&config, &Output::new(OutputFormat::Quiet)).unwrap();

        assert!(config.database_path().exists());
    }

    #[test]
    fn test_run_fails_on_malformed_document() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::with_data_dir(temp_dir.path());
        std::fs::write(config.legacy_path(), "{ broken").unwrap();

        let result = run(&config, &Output::new(OutputFormat::Quiet));

        assert!(result.is_err());
        assert!(!config.database_path().exists());
    }
}
