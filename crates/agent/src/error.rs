//! Agent loop errors.
//!
//! Recoverable-local conditions (parse errors, tool failures,
//! non-improving revisions, single failed runs) never show up here; the
//! loops absorb them within budget. These variants are the
//! fatal outcomes, plus provider passthrough for the reasoning loop where a
//! dead generative service leaves nothing to continue with.

use crate::stability::StabilityRecord;
use loopcraft_core::error::{ProviderError, RunnerError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    /// The generative service failed mid-loop.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The artifact store could not load or persist an artifact.
    #[error("Artifact error: {0}")]
    Runner(#[from] RunnerError),

    /// The model requested a tool that is not registered. Not retried: a
    /// hallucinated capability means the whole loop result is suspect.
    #[error("Unknown tool requested by model: {0}")]
    UnknownTool(String),

    /// The reasoning loop hit its iteration budget without a final answer.
    #[error("Maximum reasoning iterations reached ({0}) without a final answer")]
    MaxIterations(u32),

    /// The stability loop exhausted its fix budget. Carries the final
    /// record so callers can inspect the run counts.
    #[error(
        "Stability fix budget exhausted after {} fix attempts ({} of {} successful runs)",
        .record.fix_attempts,
        .record.successful_runs,
        .record.required_runs
    )]
    FixBudgetExhausted { record: StabilityRecord },
}
