//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/schedbot/config.toml)
//! 3. Environment variables (SCHEDBOT_* prefix)
//!
//! Environment variables take precedence over config file values.
//! The CLI may override paths once more after loading.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix
const ENV_PREFIX: &str = "SCHEDBOT";

/// File name of the SQLite store inside `data_dir`
pub const DATABASE_FILE: &str = "bot_database.db";

/// File name of the legacy JSON document inside `data_dir`
pub const LEGACY_FILE: &str = "bot_database.json";

/// Directory name for pre-migration backups inside `data_dir`
pub const BACKUP_DIR: &str = "backups";

/// Default SQLite lock wait
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the database, legacy document and backups
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Explicit database path (defaults to `data_dir/bot_database.db`)
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Explicit legacy document path (defaults to `data_dir/bot_database.json`)
    #[serde(default)]
    pub legacy_path: Option<PathBuf>,

    /// Explicit backup directory (defaults to `data_dir/backups`)
    #[serde(default)]
    pub backup_dir: Option<PathBuf>,

    /// Whether migration copies the legacy document and database first
    #[serde(default = "default_true")]
    pub backups_enabled: bool,

    /// How long a write waits on a locked database before failing
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Admins seeded into a freshly bootstrapped store
    #[serde(default)]
    pub bootstrap_admins: Vec<i64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database_path: None,
            legacy_path: None,
            backup_dir: None,
            backups_enabled: true,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            bootstrap_admins: Vec::new(),
        }
    }
}

impl Config {
    /// Configuration rooted at a directory, ignoring file and environment
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (SCHEDBOT_DATA_DIR, SCHEDBOT_DATABASE, ...)
    /// 2. Config file (~/.config/schedbot/config.toml or SCHEDBOT_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(val) = env_var("DATA_DIR") {
            self.data_dir = PathBuf::from(val);
        }

        if let Some(val) = env_var("DATABASE") {
            self.database_path = non_empty_path(val);
        }

        if let Some(val) = env_var("LEGACY_FILE") {
            self.legacy_path = non_empty_path(val);
        }

        if let Some(val) = env_var("BACKUP_DIR") {
            self.backup_dir = non_empty_path(val);
        }

        if let Some(val) = env_var("BACKUPS") {
            self.backups_enabled = val.eq_ignore_ascii_case("true") || val == "1";
        }

        if let Some(val) = env_var("BUSY_TIMEOUT_MS") {
            self.busy_timeout_ms = val
                .trim()
                .parse()
                .with_context(|| format!("Invalid {}_BUSY_TIMEOUT_MS: {:?}", ENV_PREFIX, val))?;
        }

        // Comma separated list, e.g. "111,222"
        if let Some(val) = env_var("ADMIN_IDS") {
            self.bootstrap_admins = val
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<i64>()
                        .with_context(|| format!("Invalid admin id in {}_ADMIN_IDS: {:?}", ENV_PREFIX, s))
                })
                .collect::<Result<_>>()?;
        }

        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with SCHEDBOT_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Some(path) = env_var("CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("schedbot")
            .join("config.toml")
    }

    /// Get the path to the SQLite database
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join(DATABASE_FILE))
    }

    /// Get the path to the legacy JSON document
    pub fn legacy_path(&self) -> PathBuf {
        self.legacy_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join(LEGACY_FILE))
    }

    /// Get the directory that receives pre-migration backups
    pub fn backup_dir(&self) -> PathBuf {
        self.backup_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join(BACKUP_DIR))
    }

    /// Lock wait as a `Duration`
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

fn env_var(suffix: &str) -> Option<String> {
    std::env::var(format!("{}_{}", ENV_PREFIX, suffix)).ok()
}

fn non_empty_path(val: String) -> Option<PathBuf> {
    if val.is_empty() {
        None
    } else {
        Some(PathBuf::from(val))
    }
}

/// The bot keeps its files next to the process by default
fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_true() -> bool {
    true
}

fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "SCHEDBOT_DATA_DIR",
        "SCHEDBOT_DATABASE",
        "SCHEDBOT_LEGACY_FILE",
        "SCHEDBOT_BACKUP_DIR",
        "SCHEDBOT_BACKUPS",
        "SCHEDBOT_BUSY_TIMEOUT_MS",
        "SCHEDBOT_ADMIN_IDS",
    ];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.backups_enabled);
        assert_eq!(config.busy_timeout_ms, DEFAULT_BUSY_TIMEOUT_MS);
        assert!(config.bootstrap_admins.is_empty());
        assert_eq!(config.data_dir, PathBuf::from("."));
    }

    #[test]
    fn test_file_paths() {
        let config = Config::with_data_dir("/srv/bot");

        assert_eq!(config.database_path(), PathBuf::from("/srv/bot/bot_database.db"));
        assert_eq!(config.legacy_path(), PathBuf::from("/srv/bot/bot_database.json"));
        assert_eq!(config.backup_dir(), PathBuf::from("/srv/bot/backups"));
    }

    #[test]
    fn test_explicit_paths_win_over_data_dir() {
        let mut config = Config::with_data_dir("/srv/bot");
        config.database_path = Some(PathBuf::from("/var/lib/bot.db"));
        config.legacy_path = Some(PathBuf::from("/tmp/old.json"));

        assert_eq!(config.database_path(), PathBuf::from("/var/lib/bot.db"));
        assert_eq!(config.legacy_path(), PathBuf::from("/tmp/old.json"));
        assert_eq!(config.backup_dir(), PathBuf::from("/srv/bot/backups"));
    }

    #[test]
    fn test_env_override_paths() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("SCHEDBOT_DATA_DIR", "/tmp/schedbot-test");
        env::set_var("SCHEDBOT_DATABASE", "/tmp/other.db");
        config.apply_env_overrides().unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/schedbot-test"));
        assert_eq!(config.database_path(), PathBuf::from("/tmp/other.db"));
        assert_eq!(
            config.legacy_path(),
            PathBuf::from("/tmp/schedbot-test/bot_database.json")
        );

        // Empty string clears the explicit path
        env::set_var("SCHEDBOT_DATABASE", "");
        config.apply_env_overrides().unwrap();
        assert!(config.database_path.is_none());
    }

    #[test]
    fn test_env_override_backups_and_timeout() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("SCHEDBOT_BACKUPS", "false");
        env::set_var("SCHEDBOT_BUSY_TIMEOUT_MS", "250");
        config.apply_env_overrides().unwrap();

        assert!(!config.backups_enabled);
        assert_eq!(config.busy_timeout(), Duration::from_millis(250));

        env::set_var("SCHEDBOT_BUSY_TIMEOUT_MS", "soon");
        assert!(config.apply_env_overrides().is_err());
    }

    #[test]
    fn test_env_override_admin_ids() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("SCHEDBOT_ADMIN_IDS", "111, 222,");
        config.apply_env_overrides().unwrap();
        assert_eq!(config.bootstrap_admins, vec![111, 222]);

        env::set_var("SCHEDBOT_ADMIN_IDS", "111,abc");
        assert!(config.apply_env_overrides().is_err());
    }

    #[test]
    fn test_load_from_str() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            data_dir = "/custom/data"
            backups_enabled = false
            busy_timeout_ms = 1000
            bootstrap_admins = [42]
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/custom/data"));
        assert!(!config.backups_enabled);
        assert_eq!(config.busy_timeout_ms, 1000);
        assert_eq!(config.bootstrap_admins, vec![42]);
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);

        let path = PathBuf::from("/nonexistent/config.toml");
        let config = Config::load_from_path(&path).unwrap();
        assert!(config.backups_enabled);
        assert!(config.database_path.is_none());
    }

    #[test]
    fn test_serialization() {
        let config = Config {
            data_dir: PathBuf::from("/data/bot"),
            database_path: Some(PathBuf::from("/data/bot/prod.db")),
            legacy_path: None,
            backup_dir: None,
            backups_enabled: false,
            busy_timeout_ms: 2000,
            bootstrap_admins: vec![1, 2],
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.data_dir, config.data_dir);
        assert_eq!(parsed.database_path, config.database_path);
        assert_eq!(parsed.bootstrap_admins, config.bootstrap_admins);
        assert!(!parsed.backups_enabled);
    }
}
