//! Agent control loops.
//!
//! The loops that turn a raw model into an agent: a router that picks a
//! handling strategy, a ReAct reasoning loop that interleaves model turns
//! with tool calls, a judge that scores answers, a bounded improvement
//! loop, and a stability loop that verifies runnable artifacts by
//! repeated execution. [`pipeline::AgentPipeline`] wires the prose-answer
//! path together; [`stability::StabilityLoop`] stands alone for code
//! artifacts.
//!
//! Every loop takes its collaborators (provider, tool registry, event
//! bus) at construction. Nothing in this crate holds global state.

pub mod error;
pub mod improve;
pub mod judge;
pub mod parser;
pub mod pipeline;
pub mod prompts;
pub mod react;
pub mod router;
pub mod stability;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use error::AgentError;
pub use improve::{ImprovementAttempt, ImprovementLoop, ImprovementOutcome};
pub use judge::{QualityJudge, QualityScore, DEFAULT_QUALITY_THRESHOLD};
pub use parser::{parse_step, ParsedStep};
pub use pipeline::{AgentPipeline, PipelineResult};
pub use react::{ReactAgent, ReactResult};
pub use router::{Decision, Route, Router};
pub use stability::{StabilityLoop, StabilityRecord};
