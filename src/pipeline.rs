//! # Transcription Pipeline
//!
//! Drives one upload through the external transcription executable:
//!
//! ```text
//! Received → Stored → Invoked → ArtifactFound   → Success
//!                             → ArtifactMissing → Failure (tool output)
//!                             → ReadError       → Failure (internal)
//! ```
//!
//! The tool's exit code is informational only. Whether a transcript file
//! shows up at the expected path is the sole success signal, so a tool that
//! exits non-zero but still writes its JSON counts as a success.
//!
//! No timeout is applied: a hung tool holds the request open until it exits.

use crate::config::TranscriberConfig;
use crate::error::{AppError, AppResult};
use crate::multipart::UploadedFile;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, info};

/// Captured outcome of one run of the external executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// What a request gets back from the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptionResult {
    /// Artifact contents, verbatim. Not checked for well-formedness.
    Transcript(String),
    /// No artifact was produced; carries what the tool had to say.
    ToolFailed(ToolOutput),
}

impl TranscriptionResult {
    /// Collapse into the handler's error type.
    pub fn into_transcript(self) -> AppResult<String> {
        match self {
            TranscriptionResult::Transcript(body) => Ok(body),
            TranscriptionResult::ToolFailed(output) => Err(AppError::ExternalToolFailure {
                exit_code: output.exit_code,
                stdout: output.stdout,
                stderr: output.stderr,
            }),
        }
    }
}

/// Stores uploads and runs the transcription executable against them.
///
/// The upload directory is injected so tests can point the pipeline at a
/// temporary directory.
#[derive(Debug, Clone)]
pub struct TranscriptionPipeline {
    upload_dir: PathBuf,
    transcriber: TranscriberConfig,
}

impl TranscriptionPipeline {
    pub fn new(upload_dir: impl Into<PathBuf>, transcriber: TranscriberConfig) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            transcriber,
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Run the full pipeline for one uploaded file.
    pub async fn run(&self, file: UploadedFile) -> AppResult<TranscriptionResult> {
        let started = Instant::now();

        let saved = self.store(&file).await?;
        let output = self.invoke(&saved).await?;
        let result = self.collect(&saved, output).await?;

        let outcome = match &result {
            TranscriptionResult::Transcript(_) => "artifact_found",
            TranscriptionResult::ToolFailed(_) => "artifact_missing",
        };
        info!(
            filename = %file.filename,
            outcome,
            duration_ms = %started.elapsed().as_millis(),
            "Transcription finished"
        );

        Ok(result)
    }

    /// Write the payload under its client-supplied name, replacing any
    /// earlier upload with the same name.
    pub async fn store(&self, file: &UploadedFile) -> AppResult<PathBuf> {
        let path = self.upload_dir.join(&file.filename);

        tokio::fs::write(&path, &file.bytes).await.map_err(|e| {
            AppError::Internal(format!("failed to save upload to {}: {}", path.display(), e))
        })?;

        info!(path = %path.display(), size_bytes = file.bytes.len(), "Saved upload");
        Ok(path)
    }

    /// Run the executable once and wait for it to exit.
    pub async fn invoke(&self, input: &Path) -> AppResult<ToolOutput> {
        info!(
            executable = %self.transcriber.executable,
            input = %input.display(),
            model = %self.transcriber.model,
            "Starting transcription tool"
        );

        let output = Command::new(&self.transcriber.executable)
            .arg(input)
            .arg("--model")
            .arg(&self.transcriber.model)
            .arg("--output_format")
            .arg(&self.transcriber.output_format)
            .arg("--output_dir")
            .arg(&self.upload_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                AppError::Internal(format!(
                    "failed to run {}: {}",
                    self.transcriber.executable, e
                ))
            })?;

        let tool_output = ToolOutput {
            exit_code: exit_code(output.status),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!(
            exit_code = ?tool_output.exit_code,
            stdout_len = tool_output.stdout.len(),
            stderr_len = tool_output.stderr.len(),
            "Transcription tool exited"
        );

        Ok(tool_output)
    }

    /// Turn the tool's run into a result by looking for its artifact.
    pub async fn collect(&self, input: &Path, output: ToolOutput) -> AppResult<TranscriptionResult> {
        let artifact = artifact_path(input);

        if !tokio::fs::try_exists(&artifact).await.unwrap_or(false) {
            return Ok(TranscriptionResult::ToolFailed(output));
        }

        let body = tokio::fs::read_to_string(&artifact).await.map_err(|e| {
            AppError::Internal(format!(
                "failed to read transcript {}: {}",
                artifact.display(),
                e
            ))
        })?;

        Ok(TranscriptionResult::Transcript(body))
    }
}

/// Where the tool is expected to leave its transcript for `input`.
///
/// The last `.`-delimited extension of the file name is replaced with
/// `.json` (`sample.wav` → `sample.json`, `a.tar.gz` → `a.tar.json`); a name
/// without a dot just gets `.json` appended. The directory never changes.
pub fn artifact_path(input: &Path) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = match name.rsplit_once('.') {
        Some((stem, _ext)) => stem,
        None => name.as_str(),
    };

    input.with_file_name(format!("{}.json", stem))
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;

    // match subprocess conventions: killed by signal N reports -N
    status.code().or_else(|| status.signal().map(|sig| -sig))
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> Option<i32> {
    status.code()
}
