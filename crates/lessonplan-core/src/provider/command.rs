//! Provider backed by a local CLI.
//!
//! Runs the configured program (by default `claude -p`), writes the prompt
//! to its stdin and returns its stdout. The child is killed if the
//! generate future is dropped, so orchestrator timeouts and cancellation
//! do not leave processes behind.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use super::trait_def::ContentProvider;
use crate::error::ProviderError;

/// Longest stderr excerpt carried in an error message.
const STDERR_EXCERPT: usize = 500;

#[derive(Debug, Clone)]
pub struct CommandProvider {
    name: String,
    program: String,
    args: Vec<String>,
}

impl CommandProvider {
    /// `claude -p`, found via `$PATH`.
    pub fn new() -> Self {
        Self::with_command("claude", ["-p"])
    }

    pub fn with_command<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: "claude-cli".to_string(),
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Override the name recorded on attempts.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl Default for CommandProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn excerpt(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    text.trim().chars().take(STDERR_EXCERPT).collect()
}

#[async_trait]
impl ContentProvider for CommandProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ProviderError::Transport(format!("failed to spawn {}: {e}", self.program))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ProviderError::Transport("child stdin unavailable".to_string()))?;

        // Feed stdin while collecting output so a chatty child cannot block
        // on a full stdout pipe.
        let write = async move {
            let result = stdin.write_all(prompt.as_bytes()).await;
            drop(stdin);
            result
        };
        let (written, output) = tokio::join!(write, child.wait_with_output());

        let output = output.map_err(|e| {
            ProviderError::Transport(format!("failed to wait for {}: {e}", self.program))
        })?;
        if let Err(e) = written {
            // A child that exits without reading its input reports through
            // the exit status below.
            debug!(program = %self.program, error = %e, "prompt write failed");
        }

        if !output.status.success() {
            let stderr = excerpt(&output.stderr);
            warn!(
                program = %self.program,
                status = %output.status,
                "content provider command failed"
            );
            return Err(ProviderError::Transport(format!(
                "{} exited with {}: {}",
                self.program, output.status, stderr
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
