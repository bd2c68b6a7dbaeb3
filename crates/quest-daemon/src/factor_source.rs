//! Factor extraction through an external program.
//!
//! The program receives the score request as JSON on stdin and must print a
//! factor object (bare or `{"factors": .., "rationale": ..}`) on stdout.
//! Decoding and clamping of the payload happen in `quest-scoring`.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use quest_scoring::{FactorSource, Result, ScoringError};
use quest_types::scoring::ScoreRequest;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::config::ScoringConfig;

/// Runs a configured command once per request.
#[derive(Debug, Clone)]
pub struct ProcessFactorSource {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl ProcessFactorSource {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    /// `None` when no factor command is configured.
    pub fn from_config(config: &ScoringConfig) -> Option<Self> {
        let program = config.factor_command.trim();
        if program.is_empty() {
            return None;
        }
        Some(Self::new(
            program,
            config.factor_args.clone(),
            Duration::from_millis(config.factor_timeout_ms),
        ))
    }
}

#[async_trait]
impl FactorSource for ProcessFactorSource {
    /// Run the program and return its raw stdout.
    ///
    /// # Errors
    ///
    /// - [`ScoringError::SourceUnavailable`] if the program cannot be started
    /// - [`ScoringError::SourceTimeout`] if it does not exit in time (it is killed)
    /// - [`ScoringError::SourceFailed`] on a non-zero exit status
    /// - [`ScoringError::MalformedPayload`] if stdout is not UTF-8
    async fn extract(&self, request: &ScoreRequest) -> Result<String> {
        let input = serde_json::to_vec(&serde_json::json!({
            "title": request.title(),
            "description": request.description,
            "minutes": request.minutes,
            "difficulty": request.difficulty,
        }))
        .map_err(|e| ScoringError::SourceUnavailable(format!("encode request: {e}")))?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ScoringError::SourceUnavailable(format!("{}: {e}", self.program)))?;

        let run = async move {
            if let Some(mut stdin) = child.stdin.take() {
                // The program may answer without reading its input.
                if let Err(e) = stdin.write_all(&input).await {
                    debug!("factor source closed stdin early: {}", e);
                }
            }
            child.wait_with_output().await
        };

        let output = match tokio::time::timeout(self.timeout, run).await {
            Err(_) => {
                return Err(ScoringError::SourceTimeout {
                    timeout_ms: self.timeout.as_millis() as u64,
                })
            }
            Ok(Err(e)) => return Err(ScoringError::SourceUnavailable(e.to_string())),
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            return Err(ScoringError::SourceFailed {
                status: output.status.code().unwrap_or(-1),
            });
        }

        String::from_utf8(output.stdout).map_err(|e| ScoringError::MalformedPayload(e.to_string()))
    }
}
