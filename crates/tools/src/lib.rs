//! Built-in tool implementations for loopcraft.
//!
//! Tools give the reasoning loop the ability to act: do math and search
//! the knowledge store. Hosts register their own tools alongside these.

pub mod calculator;
pub mod knowledge_search;

use loopcraft_core::knowledge::KnowledgeStore;
use loopcraft_core::tool::ToolRegistry;
use std::sync::Arc;

pub use calculator::CalculatorTool;
pub use knowledge_search::KnowledgeSearchTool;

/// Create a registry with all built-in tools.
pub fn default_registry(store: Arc<dyn KnowledgeStore>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(CalculatorTool));
    registry.register(Box::new(KnowledgeSearchTool::new(store)));
    registry
}
