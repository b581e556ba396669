//! Router — one-shot classification of a request into direct or tool-use.
//!
//! One completion call, no retries. On any failure (network, timeout,
//! malformed JSON) the router falls back to a safe default of `tool-use`
//! at confidence 0.5 — routing to the capable path costs an extra tool
//! round at worst, while wrongly routing to direct-answer silently drops
//! capability.

use chrono::Utc;
use loopcraft_core::event::{DomainEvent, EventBus};
use loopcraft_core::message::Message;
use loopcraft_core::provider::{CompletionRequest, Provider};
use loopcraft_core::tool::ToolRegistry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::parser::extract_json_object;
use crate::prompts;

/// How a request should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Route {
    /// Answer from the model alone.
    #[serde(rename = "direct")]
    Direct,
    /// Run the reasoning loop with tools.
    #[serde(rename = "tool-use")]
    ToolUse,
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Route::Direct => write!(f, "direct"),
            Route::ToolUse => write!(f, "tool-use"),
        }
    }
}

/// The router's classification of one request. Immutable; produced once
/// per request and never reused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub route: Route,
    pub reasoning: String,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_tool: Option<String>,
}

/// Raw verdict shape expected from the model.
#[derive(Debug, Deserialize)]
struct RouterVerdict {
    route: Route,
    #[serde(default)]
    reasoning: String,
    confidence: f64,
    #[serde(rename = "suggestedTool")]
    suggested_tool: Option<String>,
}

/// Classifies requests against the registered tool capabilities.
pub struct Router {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    event_bus: Arc<EventBus>,
}

impl Router {
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            tools,
            event_bus,
        }
    }

    /// Classify a query. Never fails: on any error the safe default
    /// decision is returned instead.
    pub async fn decide(&self, query: &str) -> Decision {
        let decision = match self.classify(query).await {
            Ok(decision) => decision,
            Err(reason) => {
                warn!(%reason, "Router falling back to safe default");
                Decision {
                    route: Route::ToolUse,
                    reasoning: format!("Classification unavailable ({reason}); defaulting to tool-use"),
                    confidence: 0.5,
                    suggested_tool: None,
                }
            }
        };

        debug!(route = %decision.route, confidence = decision.confidence, "Route decided");
        self.event_bus.publish(DomainEvent::RouteDecided {
            route: decision.route.to_string(),
            confidence: decision.confidence,
            timestamp: Utc::now(),
        });
        decision
    }

    async fn classify(&self, query: &str) -> Result<Decision, String> {
        let prompt = prompts::router_prompt(query, &self.tools.catalogue());
        let request = CompletionRequest::new(vec![Message::user(prompt)]).with_temperature(0.0);

        let response = self
            .provider
            .complete(request)
            .await
            .map_err(|e| e.to_string())?;

        let json = extract_json_object(&response)
            .ok_or_else(|| "response contains no JSON object".to_string())?;
        let verdict: RouterVerdict =
            serde_json::from_str(&json).map_err(|e| format!("malformed verdict: {e}"))?;

        Ok(Decision {
            route: verdict.route,
            reasoning: verdict.reasoning,
            confidence: verdict.confidence.clamp(0.0, 1.0),
            suggested_tool: verdict.suggested_tool,
        })
    }
}
