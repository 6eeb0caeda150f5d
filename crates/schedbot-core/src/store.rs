//! Unified storage interface
//!
//! The `Store` is the only API the bot's command handlers and scheduler
//! use to read and write persisted state. It owns a single SQLite
//! connection, opened once at process start.
//!
//! ## Writes
//!
//! Every public write runs in its own `IMMEDIATE` transaction and is
//! independently atomic. Writes take `&mut self`, so all of them go
//! through one writer. Batches that must commit together (the legacy
//! migration) use [`Store::transaction`].
//!
//! ## Reads
//!
//! Reads see the last committed state. A read that hits a locked
//! database is retried a few times with linear backoff before the
//! `StorageError::Locked` is surfaced.
//!
//! ## Usage
//!
//! ```ignore
//! let mut store = Store::open(&config)?;
//!
//! store.save_user(111, "daytime", "4", "ISE-74R", FormatType::Photo)?;
//! let user = store.get_user(111)?;
//! ```

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use chrono::Utc;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Result, ValidationError};
use crate::models::{
    AdminEntry, ChatPreference, ExtendedStats, FormatType, SettingEntry, Stats, UserPreference,
    CHECK_INTERVAL_KEY, DEFAULT_CHECK_INTERVAL, DEFAULT_SETTINGS,
};
use crate::storage::records::{self, ChatRow};
use crate::storage::{self, StorageError};

/// Attempts made by a read before a lock error is returned
const READ_ATTEMPTS: u32 = 3;

/// Backoff unit between read attempts (multiplied by the attempt number)
const READ_BACKOFF: Duration = Duration::from_millis(50);

/// Persistent store for user, chat, admin and setting records
pub struct Store {
    conn: Connection,
    /// `None` for in-memory stores
    path: Option<PathBuf>,
}

impl Store {
    /// Open the store at the configured database path
    pub fn open(config: &Config) -> Result<Self> {
        Self::open_at(config.database_path(), config.busy_timeout())
    }

    /// Open the store at an explicit path
    ///
    /// Creates the file and schema on first use.
    pub fn open_at(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        let path = path.as_ref();
        let conn = storage::open_connection(path, busy_timeout)?;
        let store = Self {
            conn,
            path: Some(path.to_path_buf()),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Open an in-memory store (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: storage::open_in_memory()?,
            path: None,
        };
        store.initialize()?;
        Ok(store)
    }

    /// Create the four tables if absent
    ///
    /// Safe to call on every start; existing rows are untouched.
    pub fn initialize(&self) -> Result<()> {
        if !storage::is_initialized(&self.conn) {
            info!("Creating database schema");
        }
        storage::init_schema(&self.conn)?;
        Ok(())
    }

    /// Path of the database file, if on disk
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Fold the WAL back into the database file
    ///
    /// Afterwards the `.db` file alone holds every committed write, so it
    /// can be copied as a self-contained backup. Returns `false` if another
    /// connection kept the log from being fully copied.
    pub fn checkpoint(&self) -> Result<bool> {
        let complete = storage::checkpoint(&self.conn)?;
        if !complete {
            warn!("WAL checkpoint incomplete, database is in use elsewhere");
        }
        Ok(complete)
    }

    /// Start a batch of writes that commit or roll back together
    ///
    /// The batch rolls back if dropped without [`StoreTransaction::commit`].
    pub fn transaction(&mut self) -> Result<StoreTransaction<'_>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        Ok(StoreTransaction { tx })
    }

    /// Run a read, retrying briefly while the database is locked
    fn read<T>(&self, op: impl Fn(&Connection) -> rusqlite::Result<T>) -> Result<T> {
        let mut attempt = 1;
        loop {
            match op(&self.conn) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    let err = StorageError::from(e);
                    if err.is_retryable() && attempt < READ_ATTEMPTS {
                        warn!(attempt, "Database locked during read, retrying");
                        thread::sleep(READ_BACKOFF * attempt);
                        attempt += 1;
                        continue;
                    }
                    return Err(err.into());
                }
            }
        }
    }

    // ==================== Users ====================

    /// Insert or update a user's preferences
    pub fn save_user(
        &mut self,
        user_id: i64,
        education_type: &str,
        course: &str,
        group_name: &str,
        format_type: FormatType,
    ) -> Result<()> {
        let tx = self.transaction()?;
        tx.save_user(user_id, education_type, course, group_name, format_type)?;
        tx.commit()
    }

    /// Get a user by id
    pub fn get_user(&self, user_id: i64) -> Result<Option<UserPreference>> {
        self.read(|conn| records::get_user(conn, user_id))
    }

    /// Delete a user; returns `false` if there was nothing to delete
    pub fn delete_user(&mut self, user_id: i64) -> Result<bool> {
        let tx = self.transaction()?;
        let removed = tx.delete_user(user_id)?;
        tx.commit()?;
        Ok(removed)
    }

    /// Get all users, ordered by id
    pub fn get_all_users(&self) -> Result<Vec<UserPreference>> {
        self.read(records::all_users)
    }

    // ==================== Chats ====================

    /// Insert or update a chat's preferences
    ///
    /// Fails with `ValidationError::EmptyFileName` before touching the database
    /// if `file_name` is blank.
    pub fn save_chat(
        &mut self,
        chat_id: i64,
        education_type: &str,
        course: &str,
        group_name: &str,
        file_name: &str,
        format_type: FormatType,
    ) -> Result<()> {
        validate_file_name(file_name)?;
        let tx = self.transaction()?;
        tx.save_chat(
            chat_id,
            education_type,
            course,
            group_name,
            file_name,
            format_type,
        )?;
        tx.commit()
    }

    pub fn get_chat(&self, chat_id: i64) -> Result<Option<ChatPreference>> {
        self.read(|conn| records::get_chat(conn, chat_id))
    }

    /// Delete a chat; returns `false` if there was nothing to delete
    pub fn delete_chat(&mut self, chat_id: i64) -> Result<bool> {
        let tx = self.transaction()?;
        let removed = tx.delete_chat(chat_id)?;
        tx.commit()?;
        Ok(removed)
    }

    /// Get all chats, ordered by id
    pub fn get_all_chats(&self) -> Result<Vec<ChatPreference>> {
        self.read(records::all_chats)
    }

    // ==================== Admins ====================

    pub fn is_admin(&self, user_id: i64) -> Result<bool> {
        self.read(|conn| records::is_admin(conn, user_id))
    }

    /// Grant admin rights; returns `false` if the user already had them
    pub fn add_admin(&mut self, user_id: i64) -> Result<bool> {
        let tx = self.transaction()?;
        let added = tx.add_admin(user_id)?;
        tx.commit()?;
        Ok(added)
    }

    /// Revoke admin rights; returns `false` if the user had none
    pub fn remove_admin(&mut self, user_id: i64) -> Result<bool> {
        let tx = self.transaction()?;
        let removed = tx.remove_admin(user_id)?;
        tx.commit()?;
        Ok(removed)
    }

    /// Ids of all admins, ascending
    pub fn get_all_admins(&self) -> Result<Vec<i64>> {
        Ok(self
            .get_admin_entries()?
            .into_iter()
            .map(|entry| entry.user_id)
            .collect())
    }

    /// All admins with the time they were added
    pub fn get_admin_entries(&self) -> Result<Vec<AdminEntry>> {
        self.read(records::all_admins)
    }

    // ==================== Settings ====================

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        self.read(|conn| records::get_setting(conn, key))
    }

    /// Store a setting; typed values are encoded by the caller
    pub fn set_setting(&mut self, key: &str, value: &str) -> Result<()> {
        validate_setting_key(key)?;
        let tx = self.transaction()?;
        tx.set_setting(key, value)?;
        tx.commit()
    }

    /// All settings, ordered by key
    pub fn get_all_settings(&self) -> Result<Vec<SettingEntry>> {
        self.read(records::all_settings)
    }

    /// Write the default settings that are missing
    ///
    /// Returns the keys that were written. Existing values are never replaced.
    pub fn ensure_default_settings(&mut self) -> Result<Vec<&'static str>> {
        let tx = self.transaction()?;
        let written = tx.ensure_default_settings()?;
        tx.commit()?;
        Ok(written)
    }

    /// Schedule polling interval in minutes
    ///
    /// Falls back to the default when unset.
    pub fn get_check_interval(&self) -> Result<u32> {
        match self.get_setting(CHECK_INTERVAL_KEY)? {
            Some(value) => match value.trim().parse::<u32>() {
                Ok(minutes) if minutes > 0 => Ok(minutes),
                _ => Err(ValidationError::InvalidSettingValue {
                    key: CHECK_INTERVAL_KEY.to_string(),
                    value,
                }
                .into()),
            },
            None => Ok(DEFAULT_CHECK_INTERVAL),
        }
    }

    pub fn set_check_interval(&mut self, minutes: u32) -> Result<()> {
        if minutes == 0 {
            return Err(ValidationError::InvalidCheckInterval(minutes).into());
        }
        self.set_setting(CHECK_INTERVAL_KEY, &minutes.to_string())
    }

    // ==================== Statistics ====================

    /// Live counts of users, chats and admins
    pub fn get_stats(&self) -> Result<Stats> {
        self.read(records::stats)
    }

    /// Breakdown of users by education type, course, group and format
    pub fn get_extended_stats(&self) -> Result<ExtendedStats> {
        let now = Utc::now();
        self.read(|conn| records::extended_stats(conn, now))
    }
}

/// A batch of writes committed atomically
///
/// Offers the same write operations as [`Store`]. Dropping it without
/// calling [`commit`](Self::commit) rolls every write back.
pub struct StoreTransaction<'a> {
    tx: Transaction<'a>,
}

impl StoreTransaction<'_> {
    pub fn save_user(
        &self,
        user_id: i64,
        education_type: &str,
        course: &str,
        group_name: &str,
        format_type: FormatType,
    ) -> Result<()> {
        records::upsert_user(
            &self.tx,
            user_id,
            education_type,
            course,
            group_name,
            format_type,
            now_millis(),
        )?;
        debug!(user_id, "Saved user");
        Ok(())
    }

    pub fn delete_user(&self, user_id: i64) -> Result<bool> {
        Ok(records::delete_user(&self.tx, user_id)?)
    }

    pub fn save_chat(
        &self,
        chat_id: i64,
        education_type: &str,
        course: &str,
        group_name: &str,
        file_name: &str,
        format_type: FormatType,
    ) -> Result<()> {
        validate_file_name(file_name)?;
        let row = ChatRow {
            chat_id,
            education_type,
            course,
            group_name,
            file_name,
            format_type,
        };
        records::upsert_chat(&self.tx, &row, now_millis())?;
        debug!(chat_id, "Saved chat");
        Ok(())
    }

    pub fn delete_chat(&self, chat_id: i64) -> Result<bool> {
        Ok(records::delete_chat(&self.tx, chat_id)?)
    }

    pub fn add_admin(&self, user_id: i64) -> Result<bool> {
        let added = records::insert_admin(&self.tx, user_id, now_millis())?;
        if added {
            debug!(user_id, "Added admin");
        }
        Ok(added)
    }

    pub fn remove_admin(&self, user_id: i64) -> Result<bool> {
        Ok(records::delete_admin(&self.tx, user_id)?)
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        validate_setting_key(key)?;
        records::upsert_setting(&self.tx, key, value, now_millis())?;
        debug!(key, "Saved setting");
        Ok(())
    }

    pub fn ensure_default_settings(&self) -> Result<Vec<&'static str>> {
        let now = now_millis();
        let mut written = Vec::new();
        for (key, value) in DEFAULT_SETTINGS {
            if records::insert_setting_if_missing(&self.tx, key, value, now)? {
                written.push(*key);
            }
        }
        if !written.is_empty() {
            info!(keys = ?written, "Wrote default settings");
        }
        Ok(written)
    }

    /// Counts as seen from inside the batch (including uncommitted writes)
    pub fn stats(&self) -> Result<Stats> {
        Ok(records::stats(&self.tx)?)
    }

    /// Commit every write in the batch
    pub fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn validate_file_name(file_name: &str) -> std::result::Result<(), ValidationError> {
    if file_name.trim().is_empty() {
        return Err(ValidationError::EmptyFileName);
    }
    Ok(())
}

fn validate_setting_key(key: &str) -> std::result::Result<(), ValidationError> {
    if key.trim().is_empty() {
        return Err(ValidationError::EmptySettingKey);
    }
    Ok(())
}
