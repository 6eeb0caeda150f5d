//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use schedbot_core::{MigrationOutcome, MigrationReport, SettingEntry, Stats};
use serde::Serialize;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    /// Check if output is JSON
    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Print a value as pretty JSON
    pub fn json<T: Serialize + ?Sized>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("Failed to encode output: {}", e),
        }
    }

    /// Print the result of a migration run
    pub fn print_report(&self, report: &MigrationReport) {
        match self.format {
            OutputFormat::Human => {
                match report.outcome {
                    MigrationOutcome::Bootstrapped => {
                        println!("No legacy document found; initialized an empty database.");
                        if report.seeded_admins > 0 {
                            println!("Seeded admins: {}", report.seeded_admins);
                        }
                    }
                    MigrationOutcome::Migrated => {
                        println!("Migrated:");
                        println!("  Users:    {}", report.users);
                        println!("  Chats:    {}", report.chats);
                        println!("  Admins:   {}", report.admins);
                        println!("  Settings: {}", report.settings);
                        if report.skipped > 0 {
                            println!("  Skipped:  {}", report.skipped);
                        }
                    }
                }
                if !report.defaults_written.is_empty() {
                    println!("Default settings written: {}", report.defaults_written.join(", "));
                }

                if !report.warnings.is_empty() {
                    println!();
                    println!("── Warnings ({}) ──", report.warnings.len());
                    for warning in &report.warnings {
                        println!("⚠ {}", warning);
                    }
                }

                if !report.backups.is_empty() {
                    println!();
                    println!("Backups:");
                    for backup in &report.backups {
                        println!("  {}", backup.display());
                    }
                }

                println!();
                self.print_counts(&report.stats);
                println!();
                self.success("Migration completed successfully");
            }
            OutputFormat::Json => self.json(report),
            OutputFormat::Quiet => {
                println!(
                    "{} {} {}",
                    report.stats.users, report.stats.chats, report.stats.admins
                );
            }
        }
    }

    /// Print store totals
    pub fn print_counts(&self, stats: &Stats) {
        println!("Database now holds:");
        println!("  Users:  {}", stats.users);
        println!("  Chats:  {}", stats.chats);
        println!("  Admins: {}", stats.admins);
    }

    /// Print a list of admin ids
    pub fn print_admins(&self, admins: &[i64]) {
        match self.format {
            OutputFormat::Human => {
                if admins.is_empty() {
                    println!("No admins configured.");
                    return;
                }
                for user_id in admins {
                    println!("{}", user_id);
                }
                println!("\n{} admin(s)", admins.len());
            }
            OutputFormat::Json => self.json(admins),
            OutputFormat::Quiet => {
                for user_id in admins {
                    println!("{}", user_id);
                }
            }
        }
    }

    /// Print a list of settings
    pub fn print_settings(&self, settings: &[SettingEntry]) {
        match self.format {
            OutputFormat::Human => {
                if settings.is_empty() {
                    println!("No settings found.");
                    return;
                }
                let width = settings.iter().map(|s| s.key.len()).max().unwrap_or(0);
                for setting in settings {
                    println!(
                        "{:width$}  {}",
                        setting.key,
                        truncate(&setting.value, 60),
                        width = width
                    );
                }
                println!("\n{} setting(s)", settings.len());
            }
            OutputFormat::Json => self.json(settings),
            OutputFormat::Quiet => {
                for setting in settings {
                    println!("{}={}", setting.key, setting.value);
                }
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a failure banner to stderr
    pub fn failure(&self, message: &str) {
        match self.format {
            OutputFormat::Human => eprintln!("✗ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "error", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

/// Truncate a string to max length, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
