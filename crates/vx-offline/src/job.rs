//! Separation job definitions

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, SeparationError, SeparationResult};

/// Unique job identifier
pub type JobId = u64;

/// One input file to separate into voice files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeparationJob {
    pub id: JobId,
    pub input_path: PathBuf,
    /// Directory receiving `<name>_<voice>.<ext>` files
    pub output_dir: PathBuf,
    /// Output file stem (defaults to the input stem)
    pub name: String,
}

impl SeparationJob {
    pub fn builder() -> JobBuilder {
        JobBuilder::new()
    }

    /// Output path for one voice
    pub fn output_path(&self, voice: &str, extension: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{}.{}", self.name, voice, extension))
    }

    /// Extension of the input file, used as a decoder hint
    pub fn input_extension(&self) -> Option<&str> {
        self.input_path.extension().and_then(|e| e.to_str())
    }
}

/// Job builder for fluent API
#[derive(Debug, Default)]
pub struct JobBuilder {
    input_path: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    name: Option<String>,
}

static JOB_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

impl JobBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set input file
    pub fn input<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.input_path = Some(path.into());
        self
    }

    /// Set output directory
    pub fn output_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Set output file stem
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Build the job. The output directory defaults to the input's directory.
    pub fn build(self) -> SeparationResult<SeparationJob> {
        let input_path = self.input_path.ok_or_else(|| {
            SeparationError::Configuration("input path is required".to_string())
        })?;

        let id = JOB_ID_COUNTER.fetch_add(1, Ordering::Relaxed);

        let output_dir = self.output_dir.unwrap_or_else(|| {
            input_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default()
        });

        let name = self.name.unwrap_or_else(|| {
            input_path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| format!("job{}", id))
        });

        Ok(SeparationJob {
            id,
            input_path,
            output_dir,
            name,
        })
    }
}

/// Job execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Completed,
    Failed,
    Cancelled,
}

/// Job completion result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub job_id: JobId,
    pub status: JobStatus,
    /// Written voice files
    pub outputs: Vec<PathBuf>,
    pub duration: Duration,
    /// Error message (if failed)
    pub error: Option<String>,
    pub error_kind: Option<ErrorKind>,
}

impl JobResult {
    pub fn success(job_id: JobId, outputs: Vec<PathBuf>, duration: Duration) -> Self {
        Self {
            job_id,
            status: JobStatus::Completed,
            outputs,
            duration,
            error: None,
            error_kind: None,
        }
    }

    pub fn failure(job_id: JobId, error: &SeparationError, duration: Duration) -> Self {
        if matches!(error, SeparationError::Cancelled) {
            return Self::cancelled(job_id, duration);
        }
        Self {
            job_id,
            status: JobStatus::Failed,
            outputs: Vec::new(),
            duration,
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
        }
    }

    pub fn cancelled(job_id: JobId, duration: Duration) -> Self {
        Self {
            job_id,
            status: JobStatus::Cancelled,
            outputs: Vec::new(),
            duration,
            error: None,
            error_kind: Some(ErrorKind::Cancelled),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Completed
    }
}
