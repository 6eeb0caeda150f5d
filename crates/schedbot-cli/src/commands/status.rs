//! Status command handler

use anyhow::Result;

use schedbot_core::Store;

use crate::output::{Output, OutputFormat};

/// Show record counts and statistics
pub fn show(store: &Store, output: &Output) -> Result<()> {
    let stats = store.get_stats()?;
    let extended = store.get_extended_stats()?;
    let check_interval = store.get_check_interval()?;

    match output.format {
        OutputFormat::Json => {
            output.json(&serde_json::json!({
                "database": store.path(),
                "check_interval": check_interval,
                "counts": stats,
                "extended": extended
            }));
        }
        OutputFormat::Quiet => {
            println!("{} {} {}", stats.users, stats.chats, stats.admins);
        }
        OutputFormat::Human => {
            println!("schedbot Status");
            println!("===============");
            println!();
            if let Some(path) = store.path() {
                println!("Database: {}", path.display());
            }
            println!("Check interval: {} min", check_interval);
            println!();
            output.print_counts(&stats);

            print_breakdown("By education type", &extended.users_by_education);
            print_breakdown("By course", &extended.users_by_course);
            print_breakdown("By format", &extended.users_by_format);

            if !extended.top_groups.is_empty() {
                println!();
                println!("Top groups:");
                for (group, count) in &extended.top_groups {
                    println!("  {:<16} {}", group, count);
                }
            }

            println!();
            println!("Signups (last 7 days):");
            if extended.recent_signups.is_empty() {
                println!("  none");
            }
            for (day, count) in &extended.recent_signups {
                println!("  {}  {}", day.format("%Y-%m-%d"), count);
            }
        }
    }

    Ok(())
}

fn print_breakdown<'a>(title: &str, counts: impl IntoIterator<Item = (&'a String, &'a i64)>) {
    let mut counts = counts.into_iter().peekable();
    if counts.peek().is_none() {
        return;
    }
    println!();
    println!("{}:", title);
    for (name, count) in counts {
        let name = if name.is_empty() { "(unset)" } else { name.as_str() };
        println!("  {:<16} {}", name, count);
    }
}
