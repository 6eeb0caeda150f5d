//! Row-level SQL for the four record kinds
//!
//! Every function takes a plain `&Connection` so it runs equally inside a
//! single-write transaction or the migration's outer transaction
//! (`Transaction` derefs to `Connection`). Validation happens before
//! these are called.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Result, Row, ToSql};

use crate::models::{
    AdminEntry, ChatPreference, ExtendedStats, FormatType, SettingEntry, Stats, UserPreference,
};

impl ToSql for FormatType {
    fn to_sql(&self) -> Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for FormatType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// Convert stored epoch milliseconds back to a timestamp
fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
}

// ==================== Users ====================

const USER_COLUMNS: &str =
    "user_id, education_type, course, group_name, format_type, created_at, updated_at";

fn user_from_row(row: &Row<'_>) -> Result<UserPreference> {
    Ok(UserPreference {
        user_id: row.get(0)?,
        education_type: row.get(1)?,
        course: row.get(2)?,
        group_name: row.get(3)?,
        format_type: row.get(4)?,
        created_at: from_millis(row.get(5)?),
        updated_at: from_millis(row.get(6)?),
    })
}

/// Insert or update a user, keeping `created_at` from the first write
pub fn upsert_user(
    conn: &Connection,
    user_id: i64,
    education_type: &str,
    course: &str,
    group_name: &str,
    format_type: FormatType,
    now: i64,
) -> Result<()> {
    // MAX() keeps updated_at monotonic if the wall clock steps back
    conn.execute(
        r#"
        INSERT INTO users (user_id, education_type, course, group_name, format_type, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
        ON CONFLICT(user_id) DO UPDATE SET
            education_type = excluded.education_type,
            course = excluded.course,
            group_name = excluded.group_name,
            format_type = excluded.format_type,
            updated_at = MAX(users.updated_at, excluded.updated_at)
        "#,
        params![user_id, education_type, course, group_name, format_type, now],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, user_id: i64) -> Result<Option<UserPreference>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE user_id = ?", USER_COLUMNS),
        params![user_id],
        user_from_row,
    )
    .optional()
}

pub fn delete_user(conn: &Connection, user_id: i64) -> Result<bool> {
    let removed = conn.execute("DELETE FROM users WHERE user_id = ?", params![user_id])?;
    Ok(removed > 0)
}

pub fn all_users(conn: &Connection) -> Result<Vec<UserPreference>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM users ORDER BY user_id",
        USER_COLUMNS
    ))?;
    let users = stmt
        .query_map([], user_from_row)?
        .collect::<Result<Vec<_>>>()?;
    Ok(users)
}

// ==================== Chats ====================

const CHAT_COLUMNS: &str =
    "chat_id, education_type, course, group_name, file_name, format_type, created_at, updated_at";

fn chat_from_row(row: &Row<'_>) -> Result<ChatPreference> {
    Ok(ChatPreference {
        chat_id: row.get(0)?,
        education_type: row.get(1)?,
        course: row.get(2)?,
        group_name: row.get(3)?,
        file_name: row.get(4)?,
        format_type: row.get(5)?,
        created_at: from_millis(row.get(6)?),
        updated_at: from_millis(row.get(7)?),
    })
}

/// Chat columns bundled for `upsert_chat`
pub struct ChatRow<'a> {
    pub chat_id: i64,
    pub education_type: &'a str,
    pub course: &'a str,
    pub group_name: &'a str,
    pub file_name: &'a str,
    pub format_type: FormatType,
}

/// Insert or update a chat, keeping `created_at` from the first write
pub fn upsert_chat(conn: &Connection, chat: &ChatRow<'_>, now: i64) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO chats (chat_id, education_type, course, group_name, file_name, format_type, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
        ON CONFLICT(chat_id) DO UPDATE SET
            education_type = excluded.education_type,
            course = excluded.course,
            group_name = excluded.group_name,
            file_name = excluded.file_name,
            format_type = excluded.format_type,
            updated_at = MAX(chats.updated_at, excluded.updated_at)
        "#,
        params![
            chat.chat_id,
            chat.education_type,
            chat.course,
            chat.group_name,
            chat.file_name,
            chat.format_type,
            now,
        ],
    )?;
    Ok(())
}

pub fn get_chat(conn: &Connection, chat_id: i64) -> Result<Option<ChatPreference>> {
    conn.query_row(
        &format!("SELECT {} FROM chats WHERE chat_id = ?", CHAT_COLUMNS),
        params![chat_id],
        chat_from_row,
    )
    .optional()
}

pub fn delete_chat(conn: &Connection, chat_id: i64) -> Result<bool> {
    let removed = conn.execute("DELETE FROM chats WHERE chat_id = ?", params![chat_id])?;
    Ok(removed > 0)
}

pub fn all_chats(conn: &Connection) -> Result<Vec<ChatPreference>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM chats ORDER BY chat_id",
        CHAT_COLUMNS
    ))?;
    let chats = stmt
        .query_map([], chat_from_row)?
        .collect::<Result<Vec<_>>>()?;
    Ok(chats)
}

// ==================== Admins ====================

pub fn is_admin(conn: &Connection, user_id: i64) -> Result<bool> {
    conn.prepare("SELECT 1 FROM admins WHERE user_id = ?")?
        .exists(params![user_id])
}

/// Add an admin; returns `false` if already present (first `added_at` kept)
pub fn insert_admin(conn: &Connection, user_id: i64, now: i64) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT INTO admins (user_id, added_at) VALUES (?1, ?2) ON CONFLICT(user_id) DO NOTHING",
        params![user_id, now],
    )?;
    Ok(inserted > 0)
}

pub fn delete_admin(conn: &Connection, user_id: i64) -> Result<bool> {
    let removed = conn.execute("DELETE FROM admins WHERE user_id = ?", params![user_id])?;
    Ok(removed > 0)
}

pub fn all_admins(conn: &Connection) -> Result<Vec<AdminEntry>> {
    let mut stmt = conn.prepare("SELECT user_id, added_at FROM admins ORDER BY user_id")?;
    let admins = stmt
        .query_map([], |row| {
            Ok(AdminEntry {
                user_id: row.get(0)?,
                added_at: from_millis(row.get(1)?),
            })
        })?
        .collect::<Result<Vec<_>>>()?;
    Ok(admins)
}

// ==================== Settings ====================

pub fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM settings WHERE key = ?",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

pub fn upsert_setting(conn: &Connection, key: &str, value: &str, now: i64) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
        ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = MAX(settings.updated_at, excluded.updated_at)
        "#,
        params![key, value, now],
    )?;
    Ok(())
}

/// Write a setting only if the key is absent; returns whether it was written
pub fn insert_setting_if_missing(conn: &Connection, key: &str, value: &str, now: i64) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3) ON CONFLICT(key) DO NOTHING",
        params![key, value, now],
    )?;
    Ok(inserted > 0)
}

pub fn all_settings(conn: &Connection) -> Result<Vec<SettingEntry>> {
    let mut stmt = conn.prepare("SELECT key, value, updated_at FROM settings ORDER BY key")?;
    let settings = stmt
        .query_map([], |row| {
            Ok(SettingEntry {
                key: row.get(0)?,
                value: row.get(1)?,
                updated_at: from_millis(row.get(2)?),
            })
        })?
        .collect::<Result<Vec<_>>>()?;
    Ok(settings)
}

// ==================== Statistics ====================

/// Count all three record kinds in one statement (one consistent snapshot)
pub fn stats(conn: &Connection) -> Result<Stats> {
    conn.query_row(
        r#"
        SELECT
            (SELECT COUNT(*) FROM users),
            (SELECT COUNT(*) FROM chats),
            (SELECT COUNT(*) FROM admins)
        "#,
        [],
        |row| {
            Ok(Stats {
                users: row.get(0)?,
                chats: row.get(1)?,
                admins: row.get(2)?,
            })
        },
    )
}

fn grouped_counts(conn: &Connection, sql: &str) -> Result<Vec<(String, i64)>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<(String, i64)>>>()?;
    Ok(rows)
}

/// Breakdowns of the user table; `now` anchors the 7-day sign-up window
pub fn extended_stats(conn: &Connection, now: DateTime<Utc>) -> Result<ExtendedStats> {
    let users_by_education = grouped_counts(
        conn,
        "SELECT education_type, COUNT(*) FROM users GROUP BY education_type",
    )?
    .into_iter()
    .collect();

    let users_by_course = grouped_counts(
        conn,
        "SELECT course, COUNT(*) FROM users GROUP BY course ORDER BY course",
    )?
    .into_iter()
    .collect();

    let top_groups = grouped_counts(
        conn,
        r#"
        SELECT group_name, COUNT(*) AS cnt
        FROM users
        GROUP BY group_name
        ORDER BY cnt DESC, group_name
        LIMIT 10
        "#,
    )?;

    let users_by_format = grouped_counts(
        conn,
        "SELECT format_type, COUNT(*) FROM users GROUP BY format_type",
    )?
    .into_iter()
    .collect();

    let since = (now - Duration::days(7)).timestamp_millis();
    let mut stmt = conn.prepare(
        r#"
        SELECT date(created_at / 1000, 'unixepoch') AS day, COUNT(*)
        FROM users
        WHERE created_at >= ?
        GROUP BY day
        ORDER BY day DESC
        "#,
    )?;
    let days = stmt
        .query_map(params![since], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?
        .collect::<Result<Vec<_>>>()?;

    let recent_signups = days
        .into_iter()
        .filter_map(|(day, count)| {
            NaiveDate::parse_from_str(&day, "%Y-%m-%d")
                .ok()
                .map(|date| (date, count))
        })
        .collect();

    Ok(ExtendedStats {
        users_by_education,
        users_by_course,
        top_groups,
        users_by_format,
        recent_signups,
    })
}
