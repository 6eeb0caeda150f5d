//! Storage layer
//!
//! SQLite persistence for the bot's state.
//!
//! ## Layout
//!
//! - `connection`: opening the database file (WAL journal, busy timeout)
//! - `schema`: idempotent creation of the four tables
//! - `records`: row-level SQL shared by single writes and batches
//! - `error`: `StorageError`, classified by SQLite result code
//!
//! The public API on top of this lives in `crate::store`.

pub mod connection;
pub mod error;
pub mod records;
pub mod schema;

pub use connection::{checkpoint, open_connection, open_in_memory};
pub use error::{StorageError, StorageResult};
pub use schema::{init_schema, is_initialized};
