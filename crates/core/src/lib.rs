//! # loopcraft Core
//!
//! Domain types, traits, and error definitions for the loopcraft agent
//! control loops. This crate has **zero framework dependencies** — it
//! defines the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator of the control loops is defined as a trait
//! here: the generative completion service (`Provider`), the callable tools
//! (`Tool`/`ToolRegistry`), the command runner for executable artifacts
//! (`CommandRunner`), and the knowledge store (`KnowledgeStore`).
//! Implementations live in their respective crates, so each loop can be
//! constructed with mock collaborators in tests.

pub mod error;
pub mod event;
pub mod knowledge;
pub mod message;
pub mod provider;
pub mod runner;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, KnowledgeError, ProviderError, Result, RunnerError, ToolError};
pub use event::{DomainEvent, EventBus};
pub use knowledge::{KnowledgeStore, Passage};
pub use message::{Message, Role, Transcript};
pub use provider::{CompletionRequest, Provider};
pub use runner::{ArtifactStore, CommandRunner, RunReport};
pub use tool::{Tool, ToolRegistry};
