//! ReAct reasoning loop — the reason → act → observe state machine.
//!
//! Each iteration renders the fixed instruction template (re-embedding the
//! original question so the model doesn't drift after several tool
//! observations), sends the full transcript to the provider, and parses the
//! response:
//!
//! - **Final answer** — the loop terminates and returns the trimmed text.
//! - **Tool call** — the named tool is looked up exactly; an unknown name
//!   is fatal (the model is hallucinating capability). A known tool is
//!   raced against a timeout; the result, truncated to the observation
//!   cap, comes back as an observation turn.
//! - **Parse error** — a corrective turn is pushed back into the
//!   transcript and the loop continues. Repair consumes the same iteration
//!   budget as a tool call.
//!
//! The iteration budget (default 20) is the only cancellation mechanism;
//! exceeding it is fatal. The timeout race cancels only the wait, not the
//! tool: an abandoned call may still be running when the loop proceeds.

use chrono::Utc;
use loopcraft_core::event::{DomainEvent, EventBus};
use loopcraft_core::message::{Message, Transcript};
use loopcraft_core::provider::{CompletionRequest, Provider};
use loopcraft_core::tool::ToolRegistry;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::AgentError;
use crate::parser::{ParsedStep, parse_step};
use crate::prompts;

/// Default reason-act-observe iteration budget.
pub const DEFAULT_MAX_ITERATIONS: u32 = 20;

/// Default single-tool-call timeout.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(300);

/// Default character cap on tool output shown to the model.
pub const DEFAULT_OBSERVATION_CAP: usize = 10_000;

/// The ReAct reasoning loop.
pub struct ReactAgent {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    event_bus: Arc<EventBus>,
    temperature: f32,
    max_tokens: Option<u32>,
    max_iterations: u32,
    tool_timeout: Duration,
    observation_cap: usize,
}

/// The result of a ReAct execution.
#[derive(Debug)]
pub struct ReactResult {
    /// The final answer text, trimmed.
    pub answer: String,
    /// Number of iterations used.
    pub iterations: u32,
    /// Total tool calls made.
    pub tool_calls_made: usize,
    /// The full transcript, for inspection. Discardable.
    pub transcript: Transcript,
}

impl ReactAgent {
    /// Create a new reasoning loop with default budgets.
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            tools,
            event_bus,
            temperature: 0.7,
            max_tokens: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            observation_cap: DEFAULT_OBSERVATION_CAP,
        }
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the default max tokens per completion.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Set the iteration budget.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// Set the single-tool-call timeout.
    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    /// Set the observation character cap.
    pub fn with_observation_cap(mut self, cap: usize) -> Self {
        self.observation_cap = cap;
        self
    }

    /// Execute the loop for one request. The transcript is created here,
    /// owned by this invocation, and returned for inspection only.
    pub async fn run(&self, question: &str) -> Result<ReactResult, AgentError> {
        let mut transcript = Transcript::new();
        let catalogue = self.tools.catalogue();
        let mut tool_calls_made = 0usize;

        info!(max_iterations = self.max_iterations, "ReAct loop starting");

        let mut iteration: u32 = 0;
        loop {
            if iteration >= self.max_iterations {
                warn!(
                    iterations = iteration,
                    "ReAct loop exhausted its iteration budget"
                );
                return Err(AgentError::MaxIterations(self.max_iterations));
            }
            iteration += 1;
            debug!(iteration, "ReAct iteration");

            // The instruction template goes in fresh each turn, original
            // question included.
            transcript.push(Message::user(prompts::react_instructions(
                question, &catalogue,
            )));

            let request = CompletionRequest::new(transcript.messages.clone())
                .with_temperature(self.temperature);
            let request = match self.max_tokens {
                Some(max) => request.with_max_tokens(max),
                None => request,
            };
            let response = self.provider.complete(request).await?;

            match parse_step(&response) {
                ParsedStep::FinalAnswer { text } => {
                    transcript.push(Message::assistant(&response));
                    info!(iterations = iteration, tool_calls_made, "ReAct loop done");
                    return Ok(ReactResult {
                        answer: text.trim().to_string(),
                        iterations: iteration,
                        tool_calls_made,
                        transcript,
                    });
                }
                ParsedStep::ParseError { message } => {
                    debug!(error = %message, "Unparsable model response, repairing");
                    transcript.push(Message::assistant(&response));
                    transcript.push(Message::user(prompts::repair_message(&message)));
                }
                ParsedStep::ToolCall { tool, input } => {
                    let Some(tool_impl) = self.tools.get(&tool) else {
                        warn!(tool = %tool, "Model requested an unregistered tool");
                        return Err(AgentError::UnknownTool(tool));
                    };

                    let start = std::time::Instant::now();
                    let outcome =
                        tokio::time::timeout(self.tool_timeout, tool_impl.execute(input)).await;
                    let duration_ms = start.elapsed().as_millis() as u64;
                    tool_calls_made += 1;

                    let (observation, success) = match outcome {
                        Ok(Ok(output)) => {
                            (truncate_observation(&output, self.observation_cap), true)
                        }
                        Ok(Err(e)) => (format!("Error: {e}"), false),
                        Err(_) => (
                            format!(
                                "Error: tool '{}' timed out after {}s; its result was abandoned",
                                tool,
                                self.tool_timeout.as_secs()
                            ),
                            false,
                        ),
                    };

                    self.event_bus.publish(DomainEvent::ToolExecuted {
                        tool_name: tool.clone(),
                        success,
                        duration_ms,
                        timestamp: Utc::now(),
                    });
                    debug!(tool = %tool, success, duration_ms, "Tool executed");

                    transcript.push(Message::assistant(&response));
                    transcript.push(Message::user(prompts::observation_message(&observation)));
                }
            }
        }
    }
}

/// Cap a tool result at `cap` characters. When truncation happens, a note
/// stating the original and truncated lengths is appended so the model
/// knows the observation is lossy.
pub(crate) fn truncate_observation(output: &str, cap: usize) -> String {
    let total_chars = output.chars().count();
    if total_chars <= cap {
        return output.to_string();
    }
    let truncated: String = output.chars().take(cap).collect();
    format!(
        "{truncated}\n[output truncated: {total_chars} characters reduced to {cap}]"
    )
}
