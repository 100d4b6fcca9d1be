//! Task command handlers
//!
//! Runs pipeline tasks and prints their stored results.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use serde_json::Value as JsonValue;
use tally_client::OrchestratorClient;
use tally_core::domain::task::{TaskId, TaskResult, TaskStatus};
use tally_core::dto::task::{TaskEnvelope, TaskParams};

/// Task subcommands
#[derive(Subcommand)]
pub enum TaskCommands {
    /// Run a task
    Run {
        /// Task number or name (e.g. 3 or segmentation)
        task: TaskId,

        /// Parameters as key=value pairs (e.g. n_clusters=4 granularity=monthly)
        #[arg(short, long, value_parser = parse_key_val)]
        param: Vec<(String, String)>,
    },
    /// Show stored results of a task
    Results {
        /// Task number or name
        task: TaskId,

        /// Only rows from the run at this time (YYYY-MM-DD_HH:MM)
        #[arg(short, long)]
        timestamp: Option<String>,
    },
}

/// Parse a single key=value pair
fn parse_key_val(s: &str) -> Result<(String, String)> {
    let pos = s
        .find('=')
        .ok_or_else(|| anyhow::anyhow!("invalid KEY=value: no `=` found in `{}`", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

/// Values that parse as JSON keep their type; anything else is a string
fn build_params(pairs: Vec<(String, String)>) -> TaskParams {
    pairs
        .into_iter()
        .map(|(key, raw)| {
            let value = serde_json::from_str(&raw).unwrap_or(JsonValue::String(raw));
            (key, value)
        })
        .collect()
}

pub async fn handle_task_command(command: TaskCommands, client: &OrchestratorClient) -> Result<()> {
    match command {
        TaskCommands::Run { task, param } => run_task(client, task, build_params(param)).await,
        TaskCommands::Results { task, timestamp } => {
            show_results(client, task, timestamp.as_deref()).await
        }
    }
}

async fn run_task(client: &OrchestratorClient, task: TaskId, params: TaskParams) -> Result<()> {
    println!("{} {}", "Running task".bold(), task.to_string().cyan());

    let envelope = client
        .run_task(task, &params)
        .await
        .with_context(|| format!("Task {} failed", task))?;

    print_envelope(&envelope)
}

async fn show_results(
    client: &OrchestratorClient,
    task: TaskId,
    timestamp: Option<&str>,
) -> Result<()> {
    let rows = client.task_results(task, timestamp).await?;

    println!(
        "{}",
        format!("Found {} result(s) for task {}:", rows.len(), task).bold()
    );
    println!();
    for row in &rows {
        print_row(row);
    }
    Ok(())
}

fn colored_status(status: TaskStatus) -> ColoredString {
    match status {
        TaskStatus::Success => status.as_str().green(),
        TaskStatus::NoData => status.as_str().yellow(),
        TaskStatus::Error => status.as_str().red(),
    }
}

fn print_envelope(envelope: &TaskEnvelope) -> Result<()> {
    println!("  Status:         {}", colored_status(envelope.status).bold());
    println!("  Pipeline:       {}", envelope.pipeline_id);
    println!("  Schema version: {}", envelope.schema_version.dimmed());
    println!(
        "  Timestamp:      {}",
        envelope.timestamp.to_rfc3339().dimmed()
    );
    if let Some(message) = &envelope.message {
        println!("  Message:        {}", message);
    }
    println!();
    println!("{}", serde_json::to_string_pretty(&envelope.result)?);
    Ok(())
}

fn print_row(row: &TaskResult) {
    let mut label = row.timestamp_key();
    if let Some(granularity) = row.granularity {
        label.push_str(&format!(" [{}]", granularity));
    }
    if row.summary {
        label.push_str(" [summary]");
    }

    println!("  {} {}", "▸".cyan(), label.bold());
    println!("    ID:      {}", row.id.to_string().dimmed());
    println!("    Status:  {}", colored_status(row.status));
    if let Some(message) = &row.message {
        println!("    Message: {}", message);
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("granularity=monthly").unwrap(),
            ("granularity".to_string(), "monthly".to_string())
        );
        assert_eq!(
            parse_key_val("note=a=b").unwrap(),
            ("note".to_string(), "a=b".to_string())
        );
        assert!(parse_key_val("oops").is_err());
    }

    #[test]
    fn test_build_params_keeps_json_types() {
        let params = build_params(vec![
            ("n_clusters".to_string(), "4".to_string()),
            ("include_reports".to_string(), "false".to_string()),
            ("granularity".to_string(), "monthly".to_string()),
            ("recipients".to_string(), r#"{"high": "vip@example.com"}"#.to_string()),
        ]);

        assert_eq!(params["n_clusters"], 4);
        assert_eq!(params["include_reports"], false);
        assert_eq!(params["granularity"], "monthly");
        assert_eq!(params["recipients"]["high"], "vip@example.com");
    }
}
