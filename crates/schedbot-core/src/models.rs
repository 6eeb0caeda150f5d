//! Data models for the bot's persisted state
//!
//! Defines the four record kinds kept by the store (user and chat
//! schedule preferences, admin entries, settings) plus the aggregate
//! statistics computed over them.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Setting key holding the schedule polling interval, in minutes
pub const CHECK_INTERVAL_KEY: &str = "check_interval";

/// Setting key holding the format offered to new users
pub const DEFAULT_FORMAT_KEY: &str = "default_format";

/// Polling interval used when none is stored
pub const DEFAULT_CHECK_INTERVAL: u32 = 30;

/// Settings written on bootstrap when absent
pub const DEFAULT_SETTINGS: &[(&str, &str)] = &[
    (CHECK_INTERVAL_KEY, "30"),
    (DEFAULT_FORMAT_KEY, "photo"),
];

/// How a schedule is delivered to a user or chat
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatType {
    /// Rendered page images
    #[default]
    Photo,
    /// The original PDF file
    Pdf,
}

impl FormatType {
    pub const ALL: [FormatType; 2] = [FormatType::Photo, FormatType::Pdf];

    /// Text encoding used in the database
    pub fn as_str(self) -> &'static str {
        match self {
            FormatType::Photo => "photo",
            FormatType::Pdf => "pdf",
        }
    }
}

impl fmt::Display for FormatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormatType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "photo" => Ok(FormatType::Photo),
            "pdf" => Ok(FormatType::Pdf),
            _ => Err(ValidationError::UnknownFormat(s.to_string())),
        }
    }
}

/// A private user's schedule subscription
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserPreference {
    /// Telegram user id
    pub user_id: i64,
    /// Study mode, e.g. "daytime" or "evening"
    pub education_type: String,
    pub course: String,
    pub group_name: String,
    pub format_type: FormatType,
    /// When this user was first stored
    pub created_at: DateTime<Utc>,
    /// When this user was last written
    pub updated_at: DateTime<Utc>,
}

/// A group chat's schedule subscription
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatPreference {
    /// Telegram chat id (negative for groups and supergroups)
    pub chat_id: i64,
    pub education_type: String,
    pub course: String,
    pub group_name: String,
    /// Schedule file posted to the chat, e.g. "ISE-74R.pdf"
    pub file_name: String,
    pub format_type: FormatType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Membership in the admin allow-list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdminEntry {
    pub user_id: i64,
    pub added_at: DateTime<Utc>,
}

/// A bot-wide key/value setting; values are opaque to the store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SettingEntry {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

/// Row counts per record kind
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stats {
    pub users: i64,
    pub chats: i64,
    pub admins: i64,
}

/// Breakdown of the user base for the admin dashboard
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExtendedStats {
    pub users_by_education: BTreeMap<String, i64>,
    pub users_by_course: BTreeMap<String, i64>,
    /// Most subscribed groups, largest first (at most 10)
    pub top_groups: Vec<(String, i64)>,
    pub users_by_format: BTreeMap<String, i64>,
    /// New users per day over the last 7 days, newest first
    pub recent_signups: Vec<(NaiveDate, i64)>,
}
