//! CLI delivery adapter: hands finished records to the downstream telemetry
//! binary, one process invocation per record.

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;
use tokio::process::Command;

use edt_core::{EventRecord, HeartbeatRecord, Sink};

/// Failures delivering through the downstream CLI.
#[derive(Debug, Error)]
pub enum CliSinkError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}")]
    Failed { program: String, status: ExitStatus },
}

/// Delivers records by invoking the downstream telemetry CLI.
///
/// The CLI owns storage and remote sync; this adapter only shells out and
/// reports the exit status. Retry policy is the caller's concern.
#[derive(Debug, Clone)]
pub struct CliSink {
    program: PathBuf,
}

impl CliSink {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Triggers the downstream CLI's own sync of stored telemetry.
    pub async fn sync(&self) -> Result<(), CliSinkError> {
        self.run(vec!["sync".to_string()]).await
    }

    async fn run(&self, args: Vec<String>) -> Result<(), CliSinkError> {
        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .await
            .map_err(|source| CliSinkError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            tracing::warn!(stderr = %stderr.trim(), "telemetry CLI stderr");
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            tracing::debug!(stdout = %stdout.trim(), "telemetry CLI output");
        }

        if output.status.success() {
            Ok(())
        } else {
            Err(CliSinkError::Failed {
                program: self.program.display().to_string(),
                status: output.status,
            })
        }
    }
}

impl Sink for CliSink {
    type Error = CliSinkError;

    async fn deliver_event(&self, record: EventRecord) -> Result<(), CliSinkError> {
        self.run(event_args(&record)).await
    }

    async fn deliver_heartbeat(&self, record: HeartbeatRecord) -> Result<(), CliSinkError> {
        self.run(heartbeat_args(&record)).await
    }
}

/// Argument vector for the CLI's `event` subcommand.
#[must_use]
pub fn event_args(record: &EventRecord) -> Vec<String> {
    vec![
        "event".to_string(),
        "-t".to_string(),
        record.start.to_string(),
        "--end-timestamp".to_string(),
        record.end.to_string(),
        "-c".to_string(),
        record.category.to_string(),
        "-a".to_string(),
        record.app.clone(),
        "-e".to_string(),
        record.entity.clone(),
        "--entity-type".to_string(),
        record.entity_type.to_string(),
        "-d".to_string(),
        record.duration_secs.to_string(),
        "-s".to_string(),
        record.source.clone(),
        "-p".to_string(),
        record.project.display().to_string(),
    ]
}

/// Argument vector for the CLI's `heartbeat` subcommand.
#[must_use]
pub fn heartbeat_args(record: &HeartbeatRecord) -> Vec<String> {
    let mut args = vec![
        "heartbeat".to_string(),
        "--project".to_string(),
        record.project.display().to_string(),
        "--timestamp".to_string(),
        record.timestamp.to_string(),
        "--entity".to_string(),
        record.entity.clone(),
        "--entity-type".to_string(),
        record.entity_type.to_string(),
        "--app".to_string(),
        record.app.clone(),
        "--lines".to_string(),
        record.line_count.to_string(),
        "--cursorpos".to_string(),
        record.cursor_offset.to_string(),
    ];
    if record.is_write {
        args.push("--is-write".to_string());
    }
    args
}
