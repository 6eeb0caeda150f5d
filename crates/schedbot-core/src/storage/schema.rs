//! SQLite schema for the bot's persisted state
//!
//! Four tables, each keyed by its natural identifier. Creation is
//! idempotent so it runs on every process start.

use rusqlite::{Connection, Result};

/// Tables owned by the store
pub const TABLES: [&str; 4] = ["users", "chats", "admins", "settings"];

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    // Timestamps are epoch milliseconds; defaults evaluate to the write instant
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            user_id INTEGER PRIMARY KEY,
            education_type TEXT NOT NULL,
            course TEXT NOT NULL,
            group_name TEXT NOT NULL,
            format_type TEXT NOT NULL DEFAULT 'photo',
            created_at INTEGER NOT NULL
                DEFAULT (CAST((julianday('now') - 2440587.5) * 86400000 AS INTEGER)),
            updated_at INTEGER NOT NULL
                DEFAULT (CAST((julianday('now') - 2440587.5) * 86400000 AS INTEGER))
        );

        CREATE TABLE IF NOT EXISTS chats (
            chat_id INTEGER PRIMARY KEY,
            education_type TEXT NOT NULL,
            course TEXT NOT NULL,
            group_name TEXT NOT NULL,
            file_name TEXT NOT NULL CHECK (length(file_name) > 0),
            format_type TEXT NOT NULL DEFAULT 'photo',
            created_at INTEGER NOT NULL
                DEFAULT (CAST((julianday('now') - 2440587.5) * 86400000 AS INTEGER)),
            updated_at INTEGER NOT NULL
                DEFAULT (CAST((julianday('now') - 2440587.5) * 86400000 AS INTEGER))
        );

        CREATE TABLE IF NOT EXISTS admins (
            user_id INTEGER PRIMARY KEY,
            added_at INTEGER NOT NULL
                DEFAULT (CAST((julianday('now') - 2440587.5) * 86400000 AS INTEGER))
        );

        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL
                DEFAULT (CAST((julianday('now') - 2440587.5) * 86400000 AS INTEGER))
        );

        -- Dashboard breakdowns group by these
        CREATE INDEX IF NOT EXISTS idx_users_education ON users(education_type);
        CREATE INDEX IF NOT EXISTS idx_users_course ON users(course);
        CREATE INDEX IF NOT EXISTS idx_chats_education ON chats(education_type);
        CREATE INDEX IF NOT EXISTS idx_chats_course ON chats(course);
        "#,
    )
}

/// Check whether every table exists
pub fn is_initialized(conn: &Connection) -> bool {
    TABLES.iter().all(|table| {
        conn.prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name=?")
            .and_then(|mut stmt| stmt.exists([table]))
            .unwrap_or(false)
    })
}
