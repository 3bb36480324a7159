// src/exec/builder.rs

//! Runs the build command and relays its output.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::errors::{DevloopError, Result};
use crate::exec::ACTIVE_ENV_VAR;
use crate::exec::backend::{BoxFuture, BuildOutcome, Builder};
use crate::report::{LineKind, Reporter};

/// Lines starting with this marker name the package/module the following
/// diagnostics belong to.
pub const CONTEXT_MARKER: &str = "# ";

/// Classify one line of compiler output.
pub fn classify_line(line: &str) -> LineKind {
    if line.trim().is_empty() {
        LineKind::Blank
    } else if line.starts_with(CONTEXT_MARKER) {
        LineKind::Context
    } else {
        LineKind::Error
    }
}

/// Build a shell command appropriate for the platform.
pub fn shell_command(command: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command);
        c
    }
}

/// Production [`Builder`]: runs `build_cmd` through the shell inside `root`.
pub struct CommandBuilder {
    command: String,
    root: PathBuf,
    reporter: Arc<dyn Reporter>,
}

impl std::fmt::Debug for CommandBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBuilder")
            .field("command", &self.command)
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl CommandBuilder {
    pub fn new(command: impl Into<String>, root: impl Into<PathBuf>, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            command: command.into(),
            root: root.into(),
            reporter,
        }
    }

    pub fn from_config(config: &Config, reporter: Arc<dyn Reporter>) -> Self {
        Self::new(config.build_cmd(), config.root(), reporter)
    }

    /// Run the command to completion, streaming combined stdout/stderr to the
    /// reporter line by line.
    pub async fn run(&self) -> Result<BuildOutcome> {
        if self.command.trim().is_empty() {
            return Err(DevloopError::EmptyCommand);
        }

        info!(cmd = %self.command, root = ?self.root, "running build");

        let mut cmd = shell_command(&self.command);
        cmd.current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env(ACTIVE_ENV_VAR, "1")
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| DevloopError::Spawn {
            program: self.command.clone(),
            source,
        })?;

        let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, line_tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, line_tx.clone()));
        }
        drop(line_tx);

        // Ends once both pipes are closed.
        while let Some(line) = line_rx.recv().await {
            self.reporter.build_line(classify_line(&line), &line);
        }

        let status = child.wait().await?;
        debug!(exit_code = ?status.code(), "build finished");

        Ok(if status.success() {
            BuildOutcome::Success
        } else {
            BuildOutcome::Failed {
                code: status.code(),
            }
        })
    }
}

impl Builder for CommandBuilder {
    fn build(&self) -> BoxFuture<'_, BuildOutcome> {
        Box::pin(async move {
            match self.run().await {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(error = %err, "build could not be run");
                    self.reporter.build_line(LineKind::Error, &err.to_string());
                    BuildOutcome::Failed { code: None }
                }
            }
        })
    }
}

/// Relay output line by line until EOF.
///
/// Lines are decoded lossily: a build that prints invalid UTF-8 must keep its
/// pipes drained, or its next write fails and the outcome is misreported.
async fn forward_lines<R>(reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut receiver_gone = false;
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                if receiver_gone {
                    continue;
                }
                let line = decode_line(&buf);
                if tx.send(line).is_err() {
                    receiver_gone = true;
                }
            }
            Err(err) => {
                debug!(error = %err, "build output stream failed");
                break;
            }
        }
    }
}

/// Decode one raw output line, dropping the line terminator.
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}
