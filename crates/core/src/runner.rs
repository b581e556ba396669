//! Command runner and artifact store traits.
//!
//! The stability loop verifies generated artifacts (e.g. generated test
//! code) by executing them. The `CommandRunner` runs a named check and
//! reports pass/fail plus the raw output; the `ArtifactStore` holds the
//! artifact text so a regenerated version can be persisted where the runner
//! will pick it up on the next run.

use crate::error::RunnerError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The outcome of one artifact run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Whether the run passed.
    pub success: bool,

    /// Raw output text (stdout/stderr combined).
    pub output: String,

    /// Process exit code.
    pub exit_code: i32,
}

impl RunReport {
    /// A passing report.
    pub fn passed(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            exit_code: 0,
        }
    }

    /// A failing report.
    pub fn failed(output: impl Into<String>, exit_code: i32) -> Self {
        Self {
            success: false,
            output: output.into(),
            exit_code,
        }
    }
}

/// Executes a named test/check and reports the outcome.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run the artifact identified by `identifier` once.
    async fn run(&self, identifier: &str) -> std::result::Result<RunReport, RunnerError>;
}

/// Stores artifact text by identifier.
///
/// `save` must make the new content visible to the next `CommandRunner::run`
/// for the same identifier.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Load the current artifact text.
    async fn load(&self, identifier: &str) -> std::result::Result<String, RunnerError>;

    /// Persist new artifact text, replacing the old version.
    async fn save(&self, identifier: &str, content: &str)
        -> std::result::Result<(), RunnerError>;
}
