//! Legacy JSON document
//!
//! Before the SQLite store, the bot kept all of its state in one JSON
//! file that was rewritten on every change:
//!
//! ```text
//! {
//!   "users":     { "111": { "education_type": "daytime", "course": "4",
//!                           "group": "ISE-74R", "format": "photo" } },
//!   "chats":     { "-100555": { ..., "file_name": "ISE-74R.pdf" } },
//!   "admin_ids": [111],
//!   "settings":  { "check_interval": "30" }
//! }
//! ```
//!
//! Parsing checks the shape of every collection and the ids; problems
//! there make the whole document unusable. Gaps inside individual records
//! (missing fields, odd formats) are left for the migration planner to
//! warn about. Unknown keys are ignored at every level.

use std::fs;
use std::io;
use std::path::Path;

use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::error::{Error, Result};
use crate::storage::StorageError;

/// Why a legacy document could not be used
#[derive(Error, Debug)]
pub enum LegacyError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("'{at}' must be {expected}")]
    Shape { at: String, expected: &'static str },

    #[error("'{at}' has id '{value}', which is not an integer")]
    Id { at: String, value: String },
}

/// One user or chat entry
///
/// Older documents use camelCase or longer field names; when a record
/// carries more than one spelling of a field, the snake_case one wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegacyRecord {
    pub education_type: Option<String>,
    pub course: Option<String>,
    pub group: Option<String>,
    pub format: Option<String>,
    pub file_name: Option<String>,
}

/// Every accepted spelling, each in its own slot
#[derive(Deserialize)]
struct RawRecord {
    #[serde(default, deserialize_with = "lenient_text")]
    education_type: Option<String>,
    #[serde(default, rename = "educationType", deserialize_with = "lenient_text")]
    education_type_camel: Option<String>,

    #[serde(default, deserialize_with = "lenient_text")]
    course: Option<String>,

    #[serde(default, deserialize_with = "lenient_text")]
    group: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    group_name: Option<String>,
    #[serde(default, rename = "groupName", deserialize_with = "lenient_text")]
    group_name_camel: Option<String>,

    #[serde(default, deserialize_with = "lenient_text")]
    format: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    format_type: Option<String>,
    #[serde(default, rename = "formatType", deserialize_with = "lenient_text")]
    format_type_camel: Option<String>,

    #[serde(default, deserialize_with = "lenient_text")]
    file_name: Option<String>,
    #[serde(default, rename = "fileName", deserialize_with = "lenient_text")]
    file_name_camel: Option<String>,
}

impl From<RawRecord> for LegacyRecord {
    fn from(raw: RawRecord) -> Self {
        Self {
            education_type: raw.education_type.or(raw.education_type_camel),
            course: raw.course,
            group: raw.group.or(raw.group_name).or(raw.group_name_camel),
            format: raw.format.or(raw.format_type).or(raw.format_type_camel),
            file_name: raw.file_name.or(raw.file_name_camel),
        }
    }
}

/// A parsed legacy document with numeric ids and string-encoded settings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegacyDocument {
    pub users: Vec<(i64, LegacyRecord)>,
    pub chats: Vec<(i64, LegacyRecord)>,
    pub admin_ids: Vec<i64>,
    pub settings: Vec<(String, String)>,
}

impl LegacyDocument {
    /// Load the document at `path`
    ///
    /// Returns `None` if the file doesn't exist, `Error::Parse` if it
    /// exists but is malformed. The file is only read, never modified.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StorageError::ReadError {
                    path: path.to_path_buf(),
                    source,
                }
                .into())
            }
        };

        let doc = Self::from_slice(&bytes).map_err(|e| Error::Parse {
            path: path.to_path_buf(),
            details: e.to_string(),
        })?;

        debug!(
            users = doc.users.len(),
            chats = doc.chats.len(),
            admins = doc.admin_ids.len(),
            settings = doc.settings.len(),
            "Parsed legacy document"
        );
        Ok(Some(doc))
    }

    /// Parse a document from UTF-8 JSON bytes
    pub fn from_slice(bytes: &[u8]) -> std::result::Result<Self, LegacyError> {
        let value: Value = serde_json::from_slice(bytes)?;
        let root = value.as_object().ok_or_else(|| LegacyError::Shape {
            at: "<document>".to_string(),
            expected: "an object",
        })?;

        Ok(Self {
            users: parse_records(root, "users")?,
            chats: parse_records(root, "chats")?,
            admin_ids: parse_admins(root)?,
            settings: parse_settings(root)?,
        })
    }
}

/// Collection under `key`, treating absent and `null` as empty
fn collection<'a>(root: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    root.get(key).filter(|value| !value.is_null())
}

fn parse_records(
    root: &Map<String, Value>,
    key: &str,
) -> std::result::Result<Vec<(i64, LegacyRecord)>, LegacyError> {
    let Some(value) = collection(root, key) else {
        return Ok(Vec::new());
    };
    let entries = value.as_object().ok_or_else(|| LegacyError::Shape {
        at: key.to_string(),
        expected: "an object keyed by id",
    })?;

    entries
        .iter()
        .map(|(id, entry)| {
            let at = format!("{}.{}", key, id);
            let id = parse_id(id).ok_or_else(|| LegacyError::Id {
                at: key.to_string(),
                value: id.clone(),
            })?;
            if !entry.is_object() {
                return Err(LegacyError::Shape {
                    at,
                    expected: "an object",
                });
            }
            let record = LegacyRecord::from(RawRecord::deserialize(entry)?);
            Ok((id, record))
        })
        .collect()
}

fn parse_admins(root: &Map<String, Value>) -> std::result::Result<Vec<i64>, LegacyError> {
    let (key, value) = match collection(root, "admin_ids") {
        Some(value) => ("admin_ids", value),
        None => match collection(root, "admins") {
            Some(value) => ("admins", value),
            None => return Ok(Vec::new()),
        },
    };
    let items = value.as_array().ok_or_else(|| LegacyError::Shape {
        at: key.to_string(),
        expected: "a list of ids",
    })?;

    items
        .iter()
        .map(|item| {
            let id = match item {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => parse_id(s),
                _ => None,
            };
            id.ok_or_else(|| LegacyError::Id {
                at: key.to_string(),
                value: item.to_string(),
            })
        })
        .collect()
}

fn parse_settings(
    root: &Map<String, Value>,
) -> std::result::Result<Vec<(String, String)>, LegacyError> {
    let Some(value) = collection(root, "settings") else {
        return Ok(Vec::new());
    };
    let entries = value.as_object().ok_or_else(|| LegacyError::Shape {
        at: "settings".to_string(),
        expected: "an object",
    })?;

    Ok(entries
        .iter()
        .map(|(key, value)| (key.clone(), encode_setting(value)))
        .collect())
}

/// Strings are stored verbatim; anything else as its JSON text
fn encode_setting(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_id(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}

/// Accept strings and numbers (courses were sometimes stored as `4`)
fn lenient_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(de::Error::custom(format!(
            "expected a string, found {}",
            other
        ))),
    }
}
