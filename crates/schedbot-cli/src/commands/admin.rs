//! Admin command handlers

use anyhow::Result;

use schedbot_core::Store;

use crate::output::Output;

/// List admin user ids
pub fn list(store: &Store, output: &Output) -> Result<()> {
    let admins = store.get_all_admins()?;
    output.print_admins(&admins);
    Ok(())
}

/// Grant admin rights
pub fn add(store: &mut Store, user_id: i64, output: &Output) -> Result<()> {
    if store.add_admin(user_id)? {
        output.success(&format!("Added admin {}", user_id));
    } else {
        output.message(&format!("{} is already an admin", user_id));
    }
    Ok(())
}

/// Revoke admin rights
pub fn remove(store: &mut Store, user_id: i64, output: &Output) -> Result<()> {
    if store.remove_admin(user_id)? {
        output.success(&format!("Removed admin {}", user_id));
    } else {
        output.message(&format!("{} is not an admin", user_id));
    }
    Ok(())
}
