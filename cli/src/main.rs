//! Storewatch CLI
//!
//! Runs the bucket snapshot job as a one-shot task, or talks to a running
//! Storewatch API server.
//!
//! # Usage
//!
//! ```bash
//! storewatch run
//! storewatch trigger --api-url http://localhost:8080
//! storewatch health
//! ```

#![deny(unsafe_code)]

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use shared::pipeline::{PipelineError, RunSummary};

/// Storewatch CLI - Cloud Storage bucket size snapshots
#[derive(Parser)]
#[command(name = "storewatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// API server URL
    #[arg(
        short,
        long,
        env = "STOREWATCH_API_URL",
        default_value = "http://localhost:8080"
    )]
    api_url: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect and load once in this process, then exit
    Run,
    /// Ask a running server to collect and load
    Trigger,
    /// Check API server health
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run) => {
            api::init_tracing();
            match run_once().await {
                Ok(summary) => print_summary(&summary),
                Err(e) => {
                    let (index, attempt) = task_coordinates(|key| std::env::var(key).ok());
                    let kind = e
                        .downcast_ref::<PipelineError>()
                        .map_or_else(|| "config".to_string(), |p| p.kind().to_string());
                    tracing::error!(
                        task_index = %index,
                        task_attempt = %attempt,
                        kind = %kind,
                        error = %format!("{e:#}"),
                        "Task failed"
                    );
                    eprintln!("Task #{index}, Attempt #{attempt} failed: {e:#}");
                    std::process::exit(1);
                }
            }
        }
        Some(Commands::Trigger) => {
            let body = trigger(&cli.api_url).await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Some(Commands::Health) => {
            let body = health(&cli.api_url).await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        None => {
            println!("Storewatch CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for usage information");
        }
    }

    Ok(())
}

/// Loads configuration and runs the job; configuration errors fail the task too.
async fn run_once() -> Result<RunSummary> {
    let config = api::Config::from_env()?;
    api::run_job(&config).await
}

/// Cloud Run task index and attempt, `0` when not running as a job.
fn task_coordinates(lookup: impl Fn(&str) -> Option<String>) -> (String, String) {
    (
        lookup("CLOUD_RUN_TASK_INDEX").unwrap_or_else(|| "0".to_string()),
        lookup("CLOUD_RUN_TASK_ATTEMPT").unwrap_or_else(|| "0".to_string()),
    )
}

fn print_summary(summary: &RunSummary) {
    println!(
        "Collected {} records for {} and wrote {} rows",
        summary.records_collected, summary.project_id, summary.rows_written
    );
}

fn endpoint(api_url: &str, path: &str) -> String {
    format!("{}/{path}", api_url.trim_end_matches('/'))
}

async fn trigger(api_url: &str) -> Result<serde_json::Value> {
    let url = endpoint(api_url, "run");
    tracing::debug!(%url, "Triggering run");

    let response = reqwest::Client::new()
        .post(&url)
        .send()
        .await
        .with_context(|| format!("Failed to reach {url}"))?;
    let status = response.status();
    let body: serde_json::Value = response
        .json()
        .await
        .context("Server returned a non-JSON body")?;

    if !status.is_success() {
        bail!(
            "Run failed ({}): {}",
            body["kind"].as_str().unwrap_or("unknown"),
            body["error"].as_str().unwrap_or("no error message")
        );
    }
    Ok(body)
}

async fn health(api_url: &str) -> Result<serde_json::Value> {
    let url = endpoint(api_url, "health");
    let response = reqwest::get(&url)
        .await
        .with_context(|| format!("Failed to reach {url}"))?
        .error_for_status()?;
    Ok(response.json().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse() {
        let cli = Cli::try_parse_from(["storewatch"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_cli_subcommands() {
        let cli = Cli::try_parse_from(["storewatch", "run"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Run)));

        let cli = Cli::try_parse_from(["storewatch", "trigger"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Trigger)));

        let cli = Cli::try_parse_from(["storewatch", "health"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Health)));
    }

    #[test]
    fn test_cli_api_url_flag() {
        let cli =
            Cli::try_parse_from(["storewatch", "--api-url", "http://jobs:9000", "trigger"]).unwrap();
        assert_eq!(cli.api_url, "http://jobs:9000");
    }

    #[test]
    fn test_endpoint_joins_paths() {
        assert_eq!(endpoint("http://localhost:8080/", "run"), "http://localhost:8080/run");
        assert_eq!(endpoint("http://localhost:8080", "health"), "http://localhost:8080/health");
    }

    #[test]
    fn test_task_coordinates() {
        assert_eq!(task_coordinates(|_| None), ("0".to_string(), "0".to_string()));

        let (index, attempt) = task_coordinates(|key| match key {
            "CLOUD_RUN_TASK_INDEX" => Some("3".to_string()),
            "CLOUD_RUN_TASK_ATTEMPT" => Some("1".to_string()),
            _ => None,
        });
        assert_eq!(index, "3");
        assert_eq!(attempt, "1");
    }

    #[test]
    fn test_cli_rejects_unknown_command() {
        assert!(Cli::try_parse_from(["storewatch", "logs"]).is_err());
    }
}
