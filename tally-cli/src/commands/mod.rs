//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod notification;
mod pipeline;
mod task;

pub use notification::NotificationCommands;
pub use pipeline::PipelineCommands;
pub use task::TaskCommands;

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use tally_client::OrchestratorClient;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run tasks and inspect their results
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },
    /// List and acknowledge notifications
    Notifications {
        #[command(subcommand)]
        command: NotificationCommands,
    },
    /// Pipeline status
    Pipeline {
        #[command(subcommand)]
        command: PipelineCommands,
    },
    /// Check that the orchestrator is reachable
    Health,
}

/// Route a command to its handler module
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    let client = OrchestratorClient::new(&config.orchestrator_url);

    match command {
        Commands::Task { command } => task::handle_task_command(command, &client).await,
        Commands::Notifications { command } => {
            notification::handle_notification_command(command, &client).await
        }
        Commands::Pipeline { command } => pipeline::handle_pipeline_command(command, &client).await,
        Commands::Health => {
            client.health().await?;
            println!(
                "{} {}",
                "✓ Orchestrator is healthy:".green().bold(),
                client.base_url().cyan()
            );
            Ok(())
        }
    }
}
