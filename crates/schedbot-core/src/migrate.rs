//! Migration from the legacy JSON document
//!
//! A run goes through these states:
//!
//! 1. **Load**: read the legacy document. If it is absent, **bootstrap** an
//!    empty store (schema, default settings, configured admins) and stop.
//! 2. **Plan**: turn the parsed document into validated records. Gaps in
//!    individual records become warnings; a chat without a file name is
//!    skipped. Malformed documents never get this far (`Error::Parse`).
//! 3. **Backup**: copy the legacy file and any existing database aside.
//! 4. **Apply**: write every category in one transaction. A fault anywhere
//!    rolls back the whole run.
//! 5. **Report**: counts, warnings and the resulting `Stats`.
//!
//! Running the migration again over the same document leaves the store in
//! the same state. The legacy document is never modified.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::legacy::{LegacyDocument, LegacyRecord};
use crate::models::{FormatType, Stats};
use crate::storage::StorageError;
use crate::store::Store;

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationOutcome {
    /// No legacy document; the store was initialized empty
    Bootstrapped,
    /// A legacy document was copied into the store
    Migrated,
}

/// A user record ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedUser {
    pub user_id: i64,
    pub education_type: String,
    pub course: String,
    pub group_name: String,
    pub format_type: FormatType,
}

/// A chat record ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedChat {
    pub chat_id: i64,
    pub education_type: String,
    pub course: String,
    pub group_name: String,
    pub file_name: String,
    pub format_type: FormatType,
}

/// Everything a migration will write, decided before the store is touched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationPlan {
    pub users: Vec<PlannedUser>,
    pub chats: Vec<PlannedChat>,
    pub admins: Vec<i64>,
    pub settings: Vec<(String, String)>,
    /// Records left out of the plan
    pub skipped: usize,
    pub warnings: Vec<String>,
}

/// Summary of a migration run
#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub outcome: MigrationOutcome,
    pub users: usize,
    pub chats: usize,
    pub admins: usize,
    pub settings: usize,
    pub skipped: usize,
    /// Admins seeded from configuration during a bootstrap
    pub seeded_admins: usize,
    /// Default settings that were missing and got written
    pub defaults_written: Vec<String>,
    pub warnings: Vec<String>,
    pub backups: Vec<PathBuf>,
    /// Store totals after the run
    pub stats: Stats,
}

impl MigrationReport {
    fn new(outcome: MigrationOutcome) -> Self {
        Self {
            outcome,
            users: 0,
            chats: 0,
            admins: 0,
            settings: 0,
            skipped: 0,
            seeded_admins: 0,
            defaults_written: Vec::new(),
            warnings: Vec::new(),
            backups: Vec::new(),
            stats: Stats::default(),
        }
    }
}

impl MigrationPlan {
    /// Validate a parsed document record by record
    pub fn from_document(doc: LegacyDocument) -> Self {
        let mut plan = MigrationPlan::default();

        let users = plan.unique_ids("user", doc.users);
        let chats = plan.unique_ids("chat", doc.chats);

        for (user_id, record) in users {
            let label = format!("user {}", user_id);
            let (education_type, course, group_name) =
                plan.required_fields(&label, &record);
            let format_type = plan.format(&label, record.format.as_deref());
            plan.users.push(PlannedUser {
                user_id,
                education_type,
                course,
                group_name,
                format_type,
            });
        }

        for (chat_id, record) in chats {
            let label = format!("chat {}", chat_id);
            let file_name = match record.file_name.as_deref().map(str::trim) {
                Some(name) if !name.is_empty() => name.to_string(),
                _ => {
                    plan.warn(format!("{}: no file name, skipped", label));
                    plan.skipped += 1;
                    continue;
                }
            };
            let (education_type, course, group_name) =
                plan.required_fields(&label, &record);
            let format_type = plan.format(&label, record.format.as_deref());
            plan.chats.push(PlannedChat {
                chat_id,
                education_type,
                course,
                group_name,
                file_name,
                format_type,
            });
        }

        let mut admins = doc.admin_ids;
        admins.sort_unstable();
        admins.dedup();
        plan.admins = admins;

        for (key, value) in doc.settings {
            if key.trim().is_empty() {
                plan.warn("setting with an empty key, skipped".to_string());
                plan.skipped += 1;
                continue;
            }
            plan.settings.push((key, value));
        }

        plan
    }

    /// Collapse entries whose keys parse to the same id ("1" and "01")
    ///
    /// The later entry wins, matching what two upserts would leave behind.
    fn unique_ids(
        &mut self,
        kind: &str,
        records: Vec<(i64, LegacyRecord)>,
    ) -> BTreeMap<i64, LegacyRecord> {
        let mut unique = BTreeMap::new();
        for (id, record) in records {
            if unique.insert(id, record).is_some() {
                self.warn(format!("{} {}: duplicate id, earlier entry skipped", kind, id));
                self.skipped += 1;
            }
        }
        unique
    }

    fn required_fields(&mut self, label: &str, record: &LegacyRecord) -> (String, String, String) {
        let mut missing = Vec::new();
        let mut take = |name: &'static str, value: &Option<String>| match value {
            Some(value) => value.clone(),
            None => {
                missing.push(name);
                String::new()
            }
        };
        let fields = (
            take("education_type", &record.education_type),
            take("course", &record.course),
            take("group", &record.group),
        );
        if !missing.is_empty() {
            self.warn(format!("{}: missing {}", label, missing.join(", ")));
        }
        fields
    }

    fn format(&mut self, label: &str, raw: Option<&str>) -> FormatType {
        match raw {
            None => FormatType::default(),
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                self.warn(format!(
                    "{}: unknown format '{}', using {}",
                    label,
                    raw,
                    FormatType::default()
                ));
                FormatType::default()
            }),
        }
    }

    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }
}

/// Run a complete migration as configured
///
/// The legacy document is parsed before the store is opened, so a
/// malformed document leaves both files untouched.
pub fn run(config: &Config) -> Result<MigrationReport> {
    let legacy_path = config.legacy_path();
    info!("Looking for legacy document at {:?}", legacy_path);

    let Some(doc) = LegacyDocument::load(&legacy_path)? else {
        info!("No legacy document found, bootstrapping an empty store");
        let mut store = Store::open(config)?;
        return bootstrap(&mut store, &config.bootstrap_admins);
    };

    let plan = MigrationPlan::from_document(doc);

    let backups = if config.backups_enabled {
        create_backups(config)?
    } else {
        Vec::new()
    };

    let mut store = Store::open(config)?;
    let mut report = apply(&mut store, &plan)?;
    report.backups = backups;
    Ok(report)
}

/// Initialize an empty store: schema, default settings and seed admins
pub fn bootstrap(store: &mut Store, admins: &[i64]) -> Result<MigrationReport> {
    store.initialize()?;

    let mut report = MigrationReport::new(MigrationOutcome::Bootstrapped);
    let tx = store.transaction()?;
    report.defaults_written = tx
        .ensure_default_settings()?
        .into_iter()
        .map(String::from)
        .collect();
    for &user_id in admins {
        if tx.add_admin(user_id)? {
            report.seeded_admins += 1;
        }
    }
    report.stats = tx.stats()?;
    tx.commit()?;

    info!(seeded_admins = report.seeded_admins, "Bootstrap complete");
    Ok(report)
}

/// Write a plan in a single transaction
///
/// Either every record in the plan is stored or none is.
pub fn apply(store: &mut Store, plan: &MigrationPlan) -> Result<MigrationReport> {
    store.initialize()?;

    let mut report = MigrationReport::new(MigrationOutcome::Migrated);
    report.skipped = plan.skipped;
    report.warnings = plan.warnings.clone();

    let tx = store.transaction()?;

    for user in &plan.users {
        tx.save_user(
            user.user_id,
            &user.education_type,
            &user.course,
            &user.group_name,
            user.format_type,
        )?;
        report.users += 1;
    }
    info!(count = report.users, "Migrated users");

    for chat in &plan.chats {
        tx.save_chat(
            chat.chat_id,
            &chat.education_type,
            &chat.course,
            &chat.group_name,
            &chat.file_name,
            chat.format_type,
        )?;
        report.chats += 1;
    }
    info!(count = report.chats, "Migrated chats");

    for &user_id in &plan.admins {
        tx.add_admin(user_id)?;
        report.admins += 1;
    }
    info!(count = report.admins, "Migrated admins");

    for (key, value) in &plan.settings {
        tx.set_setting(key, value)?;
        report.settings += 1;
    }
    info!(count = report.settings, "Migrated settings");

    report.defaults_written = tx
        .ensure_default_settings()?
        .into_iter()
        .map(String::from)
        .collect();
    report.stats = tx.stats()?;
    tx.commit()?;

    info!(
        users = report.stats.users,
        chats = report.stats.chats,
        admins = report.stats.admins,
        "Migration committed"
    );
    Ok(report)
}

/// Copy the legacy document and the current database into the backup dir
///
/// The database is checkpointed first so its `.db` copy is complete on
/// its own. Only if another connection blocks the checkpoint is the
/// `-wal` file copied alongside. Files that don't exist are skipped.
/// Returns the paths written.
pub fn create_backups(config: &Config) -> Result<Vec<PathBuf>> {
    let backup_dir = config.backup_dir();
    let database = config.database_path();

    let mut sources = vec![config.legacy_path()];
    if database.is_file() {
        let complete = Store::open_at(&database, config.busy_timeout())?.checkpoint()?;
        if !complete {
            let mut wal = database.clone().into_os_string();
            wal.push("-wal");
            sources.push(PathBuf::from(wal));
        }
        sources.insert(1, database);
    }
    let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();

    let mut written = Vec::new();
    for source in sources.iter().filter(|path| path.is_file()) {
        if written.is_empty() {
            fs::create_dir_all(&backup_dir).map_err(|source| StorageError::CreateDirectory {
                path: backup_dir.clone(),
                source,
            })?;
        }
        let target = backup_dir.join(backup_name(source, &stamp));
        fs::copy(source, &target).map_err(|e| StorageError::from_io(e, target.clone()))?;
        info!("Backed up {:?} to {:?}", source, target);
        written.push(target);
    }
    Ok(written)
}

fn backup_name(source: &Path, stamp: &str) -> String {
    let name = source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "backup".to_string());
    format!("{}.{}.bak", name, stamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ValidationError};
    use crate::models::CHECK_INTERVAL_KEY;
    use tempfile::TempDir;

    const SCENARIO: &str = r#"{
        "users": {"111": {"educationType": "daytime", "course": "4", "groupName": "ISE-74R", "formatType": "photo"}},
        "chats": {"-100555": {"educationType": "daytime", "course": "4", "groupName": "ISE-74R", "fileName": "ISE-74R.pdf", "formatType": "pdf"}},
        "admins": [111],
        "settings": {"check_interval": "30"}
    }"#;

    fn setup(legacy: Option<&str>) -> (TempDir, Config) {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::with_data_dir(temp_dir.path());
        if let Some(content) = legacy {
            fs::write(config.legacy_path(), content).unwrap();
        }
        (temp_dir, config)
    }

    fn open(config: &Config) -> Store {
        Store::open(config).unwrap()
    }

    #[test]
    fn test_bootstrap_without_legacy_document() {
        let (_temp_dir, config) = setup(None);

        let report = run(&config).unwrap();

        assert_eq!(report.outcome, MigrationOutcome::Bootstrapped);
        assert_eq!(
            (report.users, report.chats, report.admins, report.settings),
            (0, 0, 0, 0)
        );
        assert_eq!(report.stats, Stats::default());
        assert!(config.database_path().exists());

        let store = open(&config);
        assert_eq!(store.get_setting(CHECK_INTERVAL_KEY).unwrap().as_deref(), Some("30"));
        assert_eq!(store.get_stats().unwrap(), Stats::default());
    }

    #[test]
    fn test_bootstrap_seeds_configured_admins() {
        let (_temp_dir, mut config) = setup(None);
        config.bootstrap_admins = vec![7, 7, 8];

        let report = run(&config).unwrap();

        assert_eq!(report.seeded_admins, 2);
        assert_eq!(open(&config).get_all_admins().unwrap(), vec![7, 8]);
    }

    #[test]
    fn test_bootstrap_twice_is_harmless() {
        let (_temp_dir, config) = setup(None);

        let first = run(&config).unwrap();
        let second = run(&config).unwrap();

        assert!(!first.defaults_written.is_empty());
        assert!(second.defaults_written.is_empty());
    }

    #[test]
    fn test_scenario_migration() {
        let (_temp_dir, config) = setup(Some(SCENARIO));

        let report = run(&config).unwrap();

        assert_eq!(report.outcome, MigrationOutcome::Migrated);
        assert_eq!(
            (report.users, report.chats, report.admins, report.settings),
            (1, 1, 1, 1)
        );
        assert_eq!(
            report.stats,
            Stats {
                users: 1,
                chats: 1,
                admins: 1
            }
        );
        assert!(report.warnings.is_empty());

        let store = open(&config);
        let user = store.get_user(111).unwrap().unwrap();
        assert_eq!(user.education_type, "daytime");
        assert_eq!(user.course, "4");
        assert_eq!(user.group_name, "ISE-74R");
        assert_eq!(user.format_type, FormatType::Photo);

        let chat = store.get_chat(-100555).unwrap().unwrap();
        assert_eq!(chat.file_name, "ISE-74R.pdf");
        assert_eq!(chat.format_type, FormatType::Pdf);

        assert!(store.is_admin(111).unwrap());
        assert_eq!(store.get_check_interval().unwrap(), 30);
        assert_eq!(
            store.get_stats().unwrap(),
            Stats {
                users: 1,
                chats: 1,
                admins: 1
            }
        );
    }

    #[test]
    fn test_migration_is_idempotent() {
        let (_temp_dir, config) = setup(Some(SCENARIO));

        run(&config).unwrap();
        let first = open(&config);
        let users = first.get_all_users().unwrap();
        let chats = first.get_all_chats().unwrap();
        let settings: Vec<_> = first
            .get_all_settings()
            .unwrap()
            .into_iter()
            .map(|s| (s.key, s.value))
            .collect();
        drop(first);

        let report = run(&config).unwrap();
        let second = open(&config);

        assert_eq!(report.stats, Stats { users: 1, chats: 1, admins: 1 });
        let again = second.get_all_users().unwrap();
        assert_eq!(again.len(), users.len());
        assert_eq!(again[0].group_name, users[0].group_name);
        assert_eq!(again[0].created_at, users[0].created_at);
        assert!(again[0].updated_at >= users[0].updated_at);
        assert_eq!(second.get_all_chats().unwrap().len(), chats.len());
        let settings_again: Vec<_> = second
            .get_all_settings()
            .unwrap()
            .into_iter()
            .map(|s| (s.key, s.value))
            .collect();
        assert_eq!(settings_again, settings);
    }

    #[test]
    fn test_malformed_json_writes_nothing() {
        let (_temp_dir, config) = setup(Some("{\"users\": {"));

        let err = run(&config).unwrap_err();

        assert!(matches!(err, Error::Parse { .. }));
        assert!(!config.database_path().exists());
        assert_eq!(fs::read_to_string(config.legacy_path()).unwrap(), "{\"users\": {");
    }

    #[test]
    fn test_malformed_admins_writes_nothing() {
        let legacy = r#"{
            "users": {"111": {"education_type": "daytime", "course": "4", "group": "ISE-74R"}},
            "chats": {"-100555": {"group": "ISE-74R", "file_name": "ISE-74R.pdf"}},
            "admin_ids": ["not-a-number"],
            "settings": {"check_interval": "30"}
        }"#;
        let (_temp_dir, config) = setup(Some(legacy));
        // Pre-existing store, to check nothing lands in it
        open(&config);

        let err = run(&config).unwrap_err();

        assert!(matches!(err, Error::Parse { .. }));
        assert_eq!(open(&config).get_stats().unwrap(), Stats::default());
        assert_eq!(fs::read_to_string(config.legacy_path()).unwrap(), legacy);
    }

    #[test]
    fn test_empty_document() {
        let (_temp_dir, config) = setup(Some("{}"));

        let report = run(&config).unwrap();

        assert_eq!(report.outcome, MigrationOutcome::Migrated);
        assert_eq!(
            (report.users, report.chats, report.admins, report.settings),
            (0, 0, 0, 0)
        );
        assert_eq!(report.stats, Stats::default());
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let legacy = r#"{
            "schema": 2,
            "users": {"5": {"education_type": "evening", "course": "1", "group": "B-11", "locale": "ru"}}
        }"#;
        let (_temp_dir, config) = setup(Some(legacy));

        let report = run(&config).unwrap();

        assert_eq!(report.users, 1);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_record_gaps_become_warnings() {
        let legacy = r#"{
            "users": {
                "1": {"course": "2", "group": "A-21", "format": "fax"},
                "2": {"education_type": "daytime", "course": "1", "group": "A-11"}
            },
            "chats": {
                "-10": {"education_type": "daytime", "course": "1", "group": "A-11"},
                "-20": {"education_type": "daytime", "course": "1", "group": "A-11", "file_name": "  "},
                "-30": {"education_type": "daytime", "course": "1", "group": "A-11", "fileName": "A-11.pdf"}
            }
        }"#;
        let (_temp_dir, config) = setup(Some(legacy));

        let report = run(&config).unwrap();

        assert_eq!(report.users, 2);
        assert_eq!(report.chats, 1);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.warnings.len(), 4);

        let store = open(&config);
        let user = store.get_user(1).unwrap().unwrap();
        assert_eq!(user.education_type, "");
        assert_eq!(user.format_type, FormatType::Photo);
        assert!(store.get_chat(-10).unwrap().is_none());
        assert!(store.get_chat(-30).unwrap().is_some());
    }

    #[test]
    fn test_non_string_setting_values() {
        let (_temp_dir, config) =
            setup(Some(r#"{"settings": {"check_interval": 15, "paused": true}}"#));

        run(&config).unwrap();

        let store = open(&config);
        assert_eq!(store.get_check_interval().unwrap(), 15);
        assert_eq!(store.get_setting("paused").unwrap().as_deref(), Some("true"));
        // Filled in after the legacy settings
        assert_eq!(store.get_setting("default_format").unwrap().as_deref(), Some("photo"));
    }

    #[test]
    fn test_apply_rolls_back_everything_on_failure() {
        let mut store = Store::open_in_memory().unwrap();
        let plan = MigrationPlan {
            users: vec![PlannedUser {
                user_id: 1,
                education_type: "daytime".to_string(),
                course: "1".to_string(),
                group_name: "A-11".to_string(),
                format_type: FormatType::Photo,
            }],
            chats: vec![PlannedChat {
                chat_id: -1,
                education_type: "daytime".to_string(),
                course: "1".to_string(),
                group_name: "A-11".to_string(),
                file_name: String::new(),
                format_type: FormatType::Pdf,
            }],
            admins: vec![1],
            ..Default::default()
        };

        let err = apply(&mut store, &plan).unwrap_err();

        assert!(matches!(err, Error::Validation(ValidationError::EmptyFileName)));
        assert_eq!(store.get_stats().unwrap(), Stats::default());
        assert!(store.get_all_settings().unwrap().is_empty());
    }

    #[test]
    fn test_backups_created() {
        let (_temp_dir, config) = setup(Some(SCENARIO));
        open(&config);

        let report = run(&config).unwrap();

        assert!(report.backups.len() >= 2);
        for backup in &report.backups {
            assert!(backup.starts_with(config.backup_dir()));
            assert!(backup.extension().is_some_and(|ext| ext == "bak"));
            assert!(backup.exists());
        }
        let legacy_backup = report
            .backups
            .iter()
            .find(|path| {
                path.file_name()
                    .is_some_and(|name| name.to_string_lossy().starts_with("bot_database.json."))
            })
            .unwrap();
        assert_eq!(
            fs::read_to_string(legacy_backup).unwrap(),
            fs::read_to_string(config.legacy_path()).unwrap()
        );
    }

    #[test]
    fn test_database_backup_is_self_contained() {
        let (temp_dir, config) = setup(Some(SCENARIO));
        // Writer left open, so its changes still sit in the WAL
        let mut bot = open(&config);
        bot.save_user(999, "evening", "2", "B-21", FormatType::Pdf).unwrap();

        let report = run(&config).unwrap();
        drop(bot);

        assert!(report
            .backups
            .iter()
            .all(|path| !path.to_string_lossy().contains("-wal")));
        let db_backup = report
            .backups
            .iter()
            .find(|path| {
                path.file_name()
                    .is_some_and(|name| name.to_string_lossy().starts_with("bot_database.db."))
            })
            .unwrap();

        let restored_path = temp_dir.path().join("restored.db");
        fs::copy(db_backup, &restored_path).unwrap();
        let restored = Store::open_at(&restored_path, config.busy_timeout()).unwrap();
        assert!(restored.get_user(999).unwrap().is_some());
        // Taken before the migration wrote anything
        assert!(restored.get_user(111).unwrap().is_none());
    }

    #[test]
    fn test_backup_dir_that_cannot_be_created() {
        let (temp_dir, mut config) = setup(Some(SCENARIO));
        let blocker = temp_dir.path().join("not-a-dir");
        fs::write(&blocker, "").unwrap();
        config.backup_dir = Some(blocker.clone());

        let err = run(&config).unwrap_err();

        assert!(matches!(
            err,
            Error::Storage(StorageError::CreateDirectory { ref path, .. }) if *path == blocker
        ));
        assert!(open(&config).get_user(111).unwrap().is_none());
    }

    #[test]
    fn test_backups_disabled() {
        let (_temp_dir, mut config) = setup(Some(SCENARIO));
        config.backups_enabled = false;

        let report = run(&config).unwrap();

        assert!(report.backups.is_empty());
        assert!(!config.backup_dir().exists());
    }

    #[test]
    fn test_legacy_document_left_in_place() {
        let (_temp_dir, config) = setup(Some(SCENARIO));

        run(&config).unwrap();

        assert_eq!(fs::read_to_string(config.legacy_path()).unwrap(), SCENARIO);
    }

    #[test]
    fn test_ids_that_parse_equal_are_migrated_once() {
        let legacy = r#"{
            "users": {
                "01": {"education_type": "daytime", "course": "1", "group": "A-11"},
                "1": {"education_type": "daytime", "course": "2", "group": "A-21"}
            }
        }"#;
        let (_temp_dir, config) = setup(Some(legacy));

        let report = run(&config).unwrap();

        assert_eq!(report.users, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.stats.users, 1);
        // Keys are visited in order, so "1" comes after "01"
        assert_eq!(open(&config).get_user(1).unwrap().unwrap().group_name, "A-21");
    }

    #[test]
    fn test_plan_dedups_admins() {
        let doc = LegacyDocument {
            admin_ids: vec![3, 1, 3],
            ..Default::default()
        };
        assert_eq!(MigrationPlan::from_document(doc).admins, vec![1, 3]);
    }
}
