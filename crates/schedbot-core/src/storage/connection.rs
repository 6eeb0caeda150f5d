//! Opening and configuring SQLite connections

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;
use tracing::debug;

use super::error::{StorageError, StorageResult};

/// Open (or create) the database file at `path`
///
/// Creates missing parent directories, switches the journal to WAL and
/// bounds lock waits with `busy_timeout`.
pub fn open_connection(path: &Path, busy_timeout: Duration) -> StorageResult<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }

    let conn = Connection::open(path)?;
    configure(&conn, busy_timeout)?;

    debug!("Opened SQLite database at {:?}", path);
    Ok(conn)
}

/// Open a private in-memory database (for testing)
pub fn open_in_memory() -> StorageResult<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn, Duration::ZERO)?;
    Ok(conn)
}

/// Copy the WAL into the main database file and truncate the log
///
/// Returns `false` if another connection kept part of the log from being
/// copied. In-memory databases have no log and always return `true`.
pub fn checkpoint(conn: &Connection) -> StorageResult<bool> {
    let (busy, log_frames, checkpointed): (i64, i64, i64) =
        conn.query_row("PRAGMA wal_checkpoint(TRUNCATE);", [], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })?;
    debug!(log_frames, checkpointed, "WAL checkpoint");
    Ok(busy == 0)
}

fn configure(conn: &Connection, busy_timeout: Duration) -> StorageResult<()> {
    conn.busy_timeout(busy_timeout)?;

    // In-memory databases report "memory" and keep it
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    debug!("SQLite journal mode: {}", mode);

    conn.execute_batch(
        "PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a").join("b").join("bot.db");

        open_connection(&path, Duration::from_millis(100)).unwrap();

        assert!(path.exists());
    }

    #[test]
    fn test_wal_mode_enabled() {
        let temp_dir = TempDir::new().unwrap();
        let conn =
            open_connection(&temp_dir.path().join("bot.db"), Duration::from_millis(100)).unwrap();

        let mode: String = conn
            .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[test]
    fn test_checkpoint_truncates_wal() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bot.db");
        let conn = open_connection(&path, Duration::from_millis(100)).unwrap();
        conn.execute_batch("CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (1);")
            .unwrap();

        let wal = temp_dir.path().join("bot.db-wal");
        assert!(std::fs::metadata(&wal).unwrap().len() > 0);

        assert!(checkpoint(&conn).unwrap());
        assert_eq!(std::fs::metadata(&wal).unwrap().len(), 0);
    }

    #[test]
    fn test_checkpoint_in_memory() {
        let conn = open_in_memory().unwrap();
        assert!(checkpoint(&conn).unwrap());
    }

    #[test]
    fn test_garbage_file_is_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bot.db");
        std::fs::write(&path, vec![b'x'; 4096]).unwrap();

        let err = open_connection(&path, Duration::from_millis(100)).unwrap_err();
        assert!(matches!(err, StorageError::Corrupt(_)), "got {:?}", err);
    }
}
