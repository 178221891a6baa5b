// Subprocess dispatcher
// Runs a configured command once per job; exit code 0 means the job completed.
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{info, warn};

use cadence_core::domain::JobId;
use cadence_core::port::{DispatchError, JobDispatcher};

/// Environment variable carrying the job id to the child
pub const JOB_ID_ENV: &str = "CADENCE_JOB_ID";

/// Bytes of stderr kept in a rejection reason
const STDERR_TAIL_BYTES: usize = 512;

#[derive(Debug, Clone)]
pub struct SubprocessConfig {
    /// Program to run
    pub command: String,
    /// Arguments passed before the job id
    pub args: Vec<String>,
    /// Daemon environment variables the child may see
    pub env_allowlist: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub timeout: Duration,
}

/// Spawns isolated child processes with environment allowlisting
pub struct SubprocessDispatcher {
    config: SubprocessConfig,
}

impl SubprocessDispatcher {
    pub fn new(config: SubprocessConfig) -> Self {
        Self { config }
    }

    /// Filter environment variables to allowlist only
    fn filter_env(&self, env: impl IntoIterator<Item = (String, String)>) -> HashMap<String, String> {
        env.into_iter()
            .filter(|(k, _)| self.config.env_allowlist.contains(k))
            .collect()
    }

    fn build_command(&self, job_id: JobId) -> Command {
        let mut command = Command::new(&self.config.command);
        command
            .args(&self.config.args)
            .arg(job_id.to_string())
            .env_clear()
            .envs(self.filter_env(std::env::vars()))
            .env(JOB_ID_ENV, job_id.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.config.working_dir {
            command.current_dir(dir);
        }
        command
    }
}

#[async_trait]
impl JobDispatcher for SubprocessDispatcher {
    async fn dispatch(&self, job_id: JobId) -> Result<(), DispatchError> {
        let started = Instant::now();

        let child = self
            .build_command(job_id)
            .spawn()
            .map_err(|e| DispatchError::SpawnFailed(format!("{}: {}", self.config.command, e)))?;

        // Dropping the future on timeout drops the child, which kills it
        let output = match timeout(self.config.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(DispatchError::Unavailable(format!(
                    "waiting for {}: {}",
                    self.config.command, e
                )))
            }
            Err(_) => {
                warn!(job_id, timeout_ms = self.config.timeout.as_millis() as u64, "Dispatch timed out");
                return Err(DispatchError::Timeout(self.config.timeout.as_millis() as u64));
            }
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        if output.status.success() {
            info!(job_id, duration_ms, "Subprocess dispatch completed");
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail = tail(&stderr, STDERR_TAIL_BYTES);
        warn!(
            job_id,
            duration_ms,
            exit_code = ?output.status.code(),
            stderr = %tail,
            "Subprocess dispatch failed"
        );
        Err(DispatchError::Rejected {
            job_id,
            reason: match output.status.code() {
                Some(code) => format!("exit code {code}: {tail}"),
                None => format!("terminated by signal: {tail}"),
            },
        })
    }
}

/// Last `max` bytes of `s`, cut on a char boundary
fn tail(s: &str, max: usize) -> &str {
    let trimmed = s.trim_end();
    if trimmed.len() <= max {
        return trimmed;
    }
    let mut start = trimmed.len() - max;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    &trimmed[start..]
}
