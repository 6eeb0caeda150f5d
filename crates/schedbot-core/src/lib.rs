//! schedbot Core Library
//!
//! This crate provides the persistence layer for schedbot, a chat bot that
//! delivers class schedules to subscribed users and group chats.
//!
//! # Architecture
//!
//! - **SQLite**: Source of truth for users, chats, admins and settings
//! - **Legacy JSON**: The bot's previous whole-document store, read once by
//!   the migration and never written
//!
//! All reads and writes go through a single [`Store`] per process.
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let mut store = Store::open(&config)?;
//!
//! // Subscribe a user
//! store.save_user(111, "daytime", "4", "ISE-74R", FormatType::Photo)?;
//!
//! // Query
//! let stats = store.get_stats()?;
//! ```
//!
//! # Modules
//!
//! - `store`: Unified storage interface (main entry point)
//! - `models`: Records, format types and statistics
//! - `storage`: SQLite connection, schema and row-level SQL
//! - `legacy`: Parsing of the legacy JSON document
//! - `migrate`: One-shot migration from the legacy document
//! - `config`: Application configuration
//! - `error`: Crate-level error types

pub mod config;
pub mod error;
pub mod legacy;
pub mod migrate;
pub mod models;
pub mod storage;
pub mod store;

pub use config::Config;
pub use error::{Error, Result, ValidationError};
pub use legacy::{LegacyDocument, LegacyError, LegacyRecord};
pub use migrate::{MigrationOutcome, MigrationPlan, MigrationReport};
pub use models::{
    AdminEntry, ChatPreference, ExtendedStats, FormatType, SettingEntry, Stats, UserPreference,
};
pub use storage::StorageError;
pub use store::{Store, StoreTransaction};
