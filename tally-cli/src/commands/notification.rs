//! Notification command handlers

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use tally_client::OrchestratorClient;
use tally_core::domain::notification::{Notification, Priority};
use tally_core::dto::notification::NotificationQuery;
use uuid::Uuid;

/// Notification subcommands
#[derive(Subcommand)]
pub enum NotificationCommands {
    /// List notifications
    List {
        /// Only unread notifications
        #[arg(long, conflicts_with = "read")]
        unread: bool,

        /// Only read notifications
        #[arg(long)]
        read: bool,

        /// Only notifications from the run at this time (YYYY-MM-DD_HH:MM)
        #[arg(short, long)]
        timestamp: Option<String>,
    },
    /// Mark a notification as read
    Read {
        /// Notification ID
        id: Uuid,
    },
}

pub async fn handle_notification_command(
    command: NotificationCommands,
    client: &OrchestratorClient,
) -> Result<()> {
    match command {
        NotificationCommands::List {
            unread,
            read,
            timestamp,
        } => {
            let query = NotificationQuery {
                timestamp,
                read: read_filter(unread, read),
            };
            list_notifications(client, &query).await
        }
        NotificationCommands::Read { id } => {
            client.mark_notification_read(id).await?;
            println!("{}", "✓ Notification marked as read".green().bold());
            println!("  ID: {}", id.to_string().cyan());
            Ok(())
        }
    }
}

fn read_filter(unread: bool, read: bool) -> Option<bool> {
    match (unread, read) {
        (true, _) => Some(false),
        (_, true) => Some(true),
        _ => None,
    }
}

async fn list_notifications(client: &OrchestratorClient, query: &NotificationQuery) -> Result<()> {
    let notifications = client.list_notifications(query).await?;

    if notifications.is_empty() {
        println!("{}", "No notifications found.".yellow());
        return Ok(());
    }

    println!(
        "{}",
        format!("Found {} notification(s):", notifications.len()).bold()
    );
    println!();
    for notification in &notifications {
        print_notification(notification);
    }
    Ok(())
}

fn print_notification(notification: &Notification) {
    let priority = match notification.priority {
        Priority::High => "high".red().bold(),
        Priority::Medium => "medium".yellow(),
        Priority::Low => "low".dimmed(),
    };
    let marker = if notification.read {
        "○".dimmed()
    } else {
        "●".cyan()
    };

    println!("  {} {} [{}]", marker, notification.title.bold(), priority);
    println!("    ID:   {}", notification.id.to_string().dimmed());
    println!("    Time: {}", notification.timestamp.to_rfc3339().dimmed());
    println!("    {}", notification.message);
    println!();
}
