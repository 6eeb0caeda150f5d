//! Setting command handlers

use anyhow::{bail, Context, Result};

use schedbot_core::models::{CHECK_INTERVAL_KEY, DEFAULT_FORMAT_KEY};
use schedbot_core::{FormatType, Store};

use crate::output::{Output, OutputFormat};

/// List all settings
pub fn list(store: &Store, output: &Output) -> Result<()> {
    let settings = store.get_all_settings()?;
    output.print_settings(&settings);
    Ok(())
}

/// Print one setting's value
pub fn get(store: &Store, key: &str, output: &Output) -> Result<()> {
    let Some(value) = store.get_setting(key)? else {
        bail!("Setting '{}' is not set", key);
    };

    match output.format {
        OutputFormat::Json => output.json(&serde_json::json!({ "key": key, "value": value })),
        OutputFormat::Human | OutputFormat::Quiet => println!("{}", value),
    }
    Ok(())
}

/// Create or replace a setting
///
/// `check_interval` and `default_format` are checked before storing.
pub fn set(store: &mut Store, key: &str, value: &str, output: &Output) -> Result<()> {
    if key == CHECK_INTERVAL_KEY {
        let minutes: u32 = value
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: expected minutes", key))?;
        store.set_check_interval(minutes)?;
    } else if key == DEFAULT_FORMAT_KEY {
        let format: FormatType = value.parse()?;
        store.set_setting(key, format.as_str())?;
    } else {
        store.set_setting(key, value)?;
    }

    output.success(&format!("Set {} = {}", key, value));
    Ok(())
}
