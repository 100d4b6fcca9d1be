//! Pipeline command handlers

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use tally_client::OrchestratorClient;

/// Pipeline subcommands
#[derive(Subcommand)]
pub enum PipelineCommands {
    /// Show the schema version and time of the most recent result
    Latest,
}

pub async fn handle_pipeline_command(
    command: PipelineCommands,
    client: &OrchestratorClient,
) -> Result<()> {
    match command {
        PipelineCommands::Latest => {
            let latest = client.latest_pipeline().await?;

            println!("{}", "Latest Pipeline:".bold());
            println!("  Schema version: {}", latest.schema_version.cyan());
            match latest.timestamp {
                Some(timestamp) => println!("  Last run:       {}", timestamp.to_rfc3339()),
                None => println!("  Last run:       {}", "never".yellow()),
            }
            Ok(())
        }
    }
}
