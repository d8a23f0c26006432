//! # Tasknest — to-do lists with one-shot desktop reminders
//!
//! Thin controller over the service crate: list/task CRUD, reminder
//! scheduling, and a `watch` mode that keeps the process alive so
//! pending reminders can fire.
//!
//! Usage:
//!   tasknest new "Errands"
//!   tasknest add "Errands" "Buy milk"
//!   tasknest remind set "Errands" "2026-09-01 09:00"
//!   tasknest watch

use anyhow::Result;
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tasknest_core::TasknestConfig;
use tasknest_scheduler::TodoService;

#[derive(Parser)]
#[command(name = "tasknest", version, about = "📝 Tasknest — to-do lists with reminders")]
struct Cli {
    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new list
    New { title: String },
    /// Delete a list (cancels its reminder)
    Delete { title: String },
    /// Rename a list, moving its reminder with it
    Rename { old: String, new: String },
    /// Add a task to a list
    Add { title: String, task: String },
    /// Remove a task by its number (as printed by `show`)
    Remove { title: String, index: usize },
    /// Show all lists, or one list with its tasks
    Show { title: Option<String> },
    /// Mark a list done (check-marks every task, drops the reminder)
    Done { title: String },
    /// Manage a list's reminder
    Remind {
        #[command(subcommand)]
        action: RemindAction,
    },
    /// Run in the foreground so reminders fire; Ctrl-C to stop
    Watch,
}

#[derive(Subcommand)]
enum RemindAction {
    /// Schedule the reminder, e.g. "2026-09-01 09:00"
    Set { title: String, when: String },
    /// Clear the reminder
    Clear { title: String },
}

/// Accept the persisted ISO form plus the friendlier space-separated
/// variants with or without seconds.
fn parse_when(s: &str) -> Result<NaiveDateTime> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    for format in FORMATS {
        if let Ok(at) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(at);
        }
    }
    anyhow::bail!("could not parse '{s}' as a date/time (try YYYY-MM-DD HH:MM)")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "tasknest=debug,tasknest_scheduler=debug"
    } else {
        "tasknest=info,tasknest_scheduler=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let config = TasknestConfig::load()?;
    tracing::debug!("Snapshot file: {}", config.storage.data_file.display());
    let service = TodoService::from_config(&config);

    match cli.command {
        Command::New { title } => {
            service.create_list(&title).await?;
            service.save().await?;
            println!("Created list '{title}'");
        }
        Command::Delete { title } => {
            service.delete_list(&title).await?;
            service.save().await?;
            println!("Deleted list '{title}'");
        }
        Command::Rename { old, new } => {
            service.rename_list(&old, &new).await?;
            service.save().await?;
            println!("Renamed '{old}' to '{new}'");
        }
        Command::Add { title, task } => {
            service.add_task(&title, &task).await?;
            service.save().await?;
            println!("Added to '{title}': {task}");
        }
        Command::Remove { title, index } => {
            // `show` prints 1-based numbers.
            let removed = service.remove_task(&title, index.saturating_sub(1)).await?;
            service.save().await?;
            println!("Removed: {removed}");
        }
        Command::Show { title: Some(title) } => {
            let tasks = service
                .tasks_of(&title)
                .await
                .ok_or_else(|| anyhow::anyhow!("no list titled '{title}'"))?;
            println!("{title}");
            for (i, task) in tasks.iter().enumerate() {
                println!("  {}. {task}", i + 1);
            }
            match service.reminder_of(&title).await.as_deref() {
                Some("") | None => println!("  (no reminder set)"),
                Some(at) => println!("  reminder: {at}"),
            }
        }
        Command::Show { title: None } => {
            let titles = service.list_titles().await;
            if titles.is_empty() {
                println!("No lists yet. Create one with `tasknest new <title>`.");
            }
            for title in titles {
                let count = service.tasks_of(&title).await.map_or(0, |t| t.len());
                let reminder = service.reminder_of(&title).await.unwrap_or_default();
                if reminder.is_empty() {
                    println!("{title} ({count} tasks)");
                } else {
                    println!("{title} ({count} tasks, reminder {reminder})");
                }
            }
        }
        Command::Done { title } => {
            service.mark_done(&title).await?;
            service.save().await?;
            println!("Marked '{title}' done");
        }
        Command::Remind { action } => match action {
            RemindAction::Set { title, when } => {
                let at = parse_when(&when)?;
                service.set_reminder(&title, at).await?;
                println!("Reminder set for '{title}' at {at}");
                println!("(run `tasknest watch` to keep reminders firing)");
            }
            RemindAction::Clear { title } => {
                service.clear_reminder(&title).await?;
                println!("Reminder cleared for '{title}'");
            }
        },
        Command::Watch => {
            service.set_on_fired(std::sync::Arc::new(|title: &str| {
                println!("🔔 Reminder fired for '{title}' (reminder cleared)");
            }));
            service.start().await;
            println!("Watching for reminders. Ctrl-C to stop.");
            tokio::signal::ctrl_c().await?;
            service.shutdown().await;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_when_accepts_common_forms() {
        assert!(parse_when("2026-09-01T09:00:00").is_ok());
        assert!(parse_when("2026-09-01 09:00").is_ok());
        assert!(parse_when("tomorrow").is_err());
    }
}
