//! Duck provider backed by an external command.
//!
//! Each query spawns the configured program, writes the [`DuckQuery`] as one
//! JSON object to its stdin and expects `{"observation": "...", "question": "..."}`
//! on stdout. The child is killed once the timeout elapses.

use std::io::{Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::atomic::Ordering;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use duck_provider::{
    CancelSignal, DuckError, DuckInitError, DuckProfile, DuckProvider, DuckQuery, DuckReply,
};
use serde::Deserialize;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// Stable provider identifier used for explicit startup selection.
pub const PROCESS_PROVIDER_ID: &str = "process";

const MAX_STDERR_CHARS: usize = 400;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessDuckConfig {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl ProcessDuckConfig {
    /// Splits a whitespace-separated command line into program and arguments.
    pub fn from_command_line(command_line: &str, timeout: Duration) -> Result<Self, DuckInitError> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| DuckInitError::new("duck command must not be empty"))?;

        Ok(Self {
            program,
            args: parts.collect(),
            timeout,
        })
    }
}

#[derive(Debug, Deserialize)]
struct WireReply {
    observation: String,
    #[serde(default)]
    question: String,
}

#[derive(Debug, Clone)]
pub struct ProcessDuck {
    config: ProcessDuckConfig,
}

impl ProcessDuck {
    pub fn new(config: ProcessDuckConfig) -> Result<Self, DuckInitError> {
        if config.program.trim().is_empty() {
            return Err(DuckInitError::new("duck command must not be empty"));
        }
        if config.timeout.is_zero() {
            return Err(DuckInitError::new("duck timeout must be greater than zero"));
        }

        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &ProcessDuckConfig {
        &self.config
    }
}

impl DuckProvider for ProcessDuck {
    fn profile(&self) -> DuckProfile {
        DuckProfile {
            provider_id: PROCESS_PROVIDER_ID.to_string(),
            description: format!("external command `{}`", self.config.program),
        }
    }

    fn query(&self, query: &DuckQuery, cancel: CancelSignal) -> Result<DuckReply, DuckError> {
        if cancel.load(Ordering::SeqCst) {
            return Err(DuckError::Cancelled);
        }

        let payload = serde_json::to_vec(query)
            .map_err(|error| DuckError::Unavailable(format!("failed to encode query: {error}")))?;

        let mut child = Command::new(&self.config.program)
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|error| {
                DuckError::Unavailable(format!(
                    "failed to launch `{}`: {error}",
                    self.config.program
                ))
            })?;

        // Drained while waiting so a chatty duck cannot fill the pipe and stall.
        let stdout_reader = spawn_pipe_reader(child.stdout.take());
        let stderr_reader = spawn_pipe_reader(child.stderr.take());

        if let Some(mut stdin) = child.stdin.take() {
            // A duck may answer without reading its input; a closed pipe is not a failure.
            if let Err(error) = stdin.write_all(&payload) {
                debug!(%error, "duck command did not consume the query");
            }
        }

        let timeout = self.config.timeout;
        let status = match child.wait_timeout(timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                warn!(timeout_ms = timeout.as_millis() as u64, "duck command timed out");
                return Err(DuckError::Timeout(timeout));
            }
            Err(error) => {
                let _ = child.kill();
                return Err(DuckError::Unavailable(format!(
                    "failed waiting for duck command: {error}"
                )));
            }
        };

        if cancel.load(Ordering::SeqCst) {
            return Err(DuckError::Cancelled);
        }

        let stdout = join_pipe_reader(stdout_reader);
        let stderr = join_pipe_reader(stderr_reader);

        if !status.success() {
            let stderr: String = String::from_utf8_lossy(&stderr)
                .trim()
                .chars()
                .take(MAX_STDERR_CHARS)
                .collect();
            return Err(DuckError::Unavailable(format!(
                "duck command failed ({}): {stderr}",
                format_exit_status(status)
            )));
        }

        parse_reply(&stdout)
    }
}

fn parse_reply(stdout: &[u8]) -> Result<DuckReply, DuckError> {
    let reply: WireReply = serde_json::from_slice(stdout)
        .map_err(|error| DuckError::InvalidReply(error.to_string()))?;

    if reply.observation.trim().is_empty() {
        return Err(DuckError::InvalidReply(
            "observation must not be empty".to_string(),
        ));
    }

    Ok(DuckReply::new(
        reply.observation.trim(),
        reply.question.trim(),
    ))
}

fn read_pipe_bytes(pipe: Option<impl Read>) -> Vec<u8> {
    let Some(mut pipe) = pipe else {
        return Vec::new();
    };

    let mut bytes = Vec::new();
    let _ = pipe.read_to_end(&mut bytes);
    bytes
}

fn spawn_pipe_reader<R>(pipe: Option<R>) -> JoinHandle<Vec<u8>>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || read_pipe_bytes(pipe))
}

fn join_pipe_reader(reader: JoinHandle<Vec<u8>>) -> Vec<u8> {
    reader.join().unwrap_or_default()
}

fn format_exit_status(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit_code={code}"),
        None => "exit_code=terminated_by_signal".to_string(),
    }
}
