//! Cadence CLI - Command-line client for the Cadence scheduler

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9527";

#[derive(Parser)]
#[command(name = "cadence-cli")]
#[command(about = "Cadence job scheduler CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "CADENCE_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Schedule a sequence for a number of subscribers
    Submit {
        /// JSON file holding either a step array or {"steps": [...]}
        #[arg(short, long, conflicts_with = "steps")]
        file: Option<PathBuf>,

        /// Step array as an inline JSON string
        #[arg(long)]
        steps: Option<String>,

        /// Number of subscribers the sequence fans out to
        #[arg(short, long)]
        subscribers: i64,
    },

    /// Show queue depth per status
    Stats,
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Deserialize)]
struct StatsResult {
    initialized_jobs: i64,
    in_progress_jobs: i64,
    completed_jobs: i64,
    failed_jobs: i64,
    uptime_seconds: u64,
}

#[derive(Tabled)]
struct StatusRow {
    status: &'static str,
    jobs: i64,
}

async fn call_rpc(url: &str, method: &str, params: Value) -> Result<Value> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: 1,
    };

    let client = reqwest::Client::new();
    let response: JsonRpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .context("Failed to connect to daemon")?
        .json()
        .await
        .context("Failed to parse response")?;

    if let Some(error) = response.error {
        anyhow::bail!("RPC error ({}): {}", error.code, error.message);
    }

    response
        .result
        .ok_or_else(|| anyhow::anyhow!("No result in response"))
}

/// Accepts a bare step array or an object with a `steps` array
fn parse_steps(raw: &str) -> Result<Vec<Value>> {
    let value: Value = serde_json::from_str(raw).context("Invalid JSON")?;
    let steps = match value {
        Value::Array(steps) => steps,
        Value::Object(mut obj) => match obj.remove("steps") {
            Some(Value::Array(steps)) => steps,
            _ => anyhow::bail!("Expected a \"steps\" array"),
        },
        _ => anyhow::bail!("Expected a step array or an object with \"steps\""),
    };
    Ok(steps)
}

fn load_steps(file: Option<&Path>, inline: Option<&str>) -> Result<Vec<Value>> {
    match (file, inline) {
        (Some(path), _) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            parse_steps(&raw)
        }
        (None, Some(raw)) => parse_steps(raw),
        (None, None) => anyhow::bail!("Pass either --file or --steps"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Submit {
            file,
            steps,
            subscribers,
        } => {
            let steps = load_steps(file.as_deref(), steps.as_deref())?;
            let step_count = steps.len();
            let params = json!({
                "steps": steps,
                "subscribers": subscribers,
            });

            let result = call_rpc(&cli.rpc_url, "sequence.submit.v1", params).await?;
            let scheduled = result["jobs_scheduled"].as_u64().unwrap_or(0);

            println!("{}", "✓ Sequence scheduled".green().bold());
            println!();
            println!("  {} {}", "Steps:".bold(), step_count);
            println!("  {} {}", "Subscribers:".bold(), subscribers);
            println!("  {} {}", "Jobs scheduled:".bold(), scheduled);
        }

        Commands::Stats => {
            println!("{}", "Queue Status".cyan().bold());
            println!();

            match call_rpc(&cli.rpc_url, "admin.stats.v1", json!({})).await {
                Ok(result) => {
                    let stats: StatsResult = serde_json::from_value(result)?;
                    println!("  {} {}", "RPC URL:".bold(), cli.rpc_url);
                    println!("  {} {}", "Status:".bold(), "ONLINE".green());
                    println!("  {} {} seconds", "Uptime:".bold(), stats.uptime_seconds);
                    println!();

                    let rows = vec![
                        StatusRow {
                            status: "INITIALIZED",
                            jobs: stats.initialized_jobs,
                        },
                        StatusRow {
                            status: "IN_PROGRESS",
                            jobs: stats.in_progress_jobs,
                        },
                        StatusRow {
                            status: "COMPLETED",
                            jobs: stats.completed_jobs,
                        },
                        StatusRow {
                            status: "FAILED",
                            jobs: stats.failed_jobs,
                        },
                    ];
                    println!("{}", Table::new(rows));
                }
                Err(e) => {
                    println!("  {} {}", "Status:".bold(), "ERROR".red());
                    println!("  {} {}", "Error:".bold(), e);
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_steps_accepts_bare_array() {
        let steps = parse_steps(r#"[{"type": "job", "metadata": "hi"}]"#).unwrap();
        assert_eq!(steps.len(), 1);
    }

    #[test]
    fn test_parse_steps_accepts_wrapped_array() {
        let steps = parse_steps(r#"{"steps": [{}, {}]}"#).unwrap();
        assert_eq!(steps.len(), 2);
    }

    #[test]
    fn test_parse_steps_rejects_other_shapes() {
        assert!(parse_steps("42").is_err());
        assert!(parse_steps(r#"{"steps": 1}"#).is_err());
        assert!(parse_steps("not json").is_err());
    }

    #[test]
    fn test_load_steps_requires_a_source() {
        assert!(load_steps(None, None).is_err());
        assert!(load_steps(Some(Path::new("/nonexistent/steps.json")), None).is_err());
    }
}
