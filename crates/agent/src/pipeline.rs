//! End-to-end request pipeline.
//!
//! Wires the loops together for one request: the router picks a handling
//! strategy, the answer comes either from a single completion or from the
//! reasoning loop, the judge scores it, and the improvement loop gets a
//! bounded chance to raise the score. Every collaborator is injected at
//! construction so the pipeline can be assembled per test with mocks.

use loopcraft_core::event::EventBus;
use loopcraft_core::message::Message;
use loopcraft_core::provider::{CompletionRequest, Provider};
use loopcraft_core::tool::ToolRegistry;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::AgentError;
use crate::improve::ImprovementLoop;
use crate::judge::{QualityJudge, QualityScore};
use crate::react::ReactAgent;
use crate::router::{Decision, Route, Router};

/// The finished product of one request.
#[derive(Debug)]
pub struct PipelineResult {
    pub answer: String,
    /// How the request was routed.
    pub decision: Decision,
    /// The final quality score after any improvement rounds.
    pub score: QualityScore,
    /// Improvement rounds actually executed.
    pub improvement_iterations: u32,
}

/// Router → answer → judge → improve, for one request at a time.
pub struct AgentPipeline {
    provider: Arc<dyn Provider>,
    router: Router,
    react: ReactAgent,
    judge: Arc<QualityJudge>,
    improver: ImprovementLoop,
}

impl AgentPipeline {
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let judge = Arc::new(QualityJudge::new(provider.clone(), event_bus.clone()));
        Self {
            router: Router::new(provider.clone(), tools.clone(), event_bus.clone()),
            react: ReactAgent::new(provider.clone(), tools, event_bus),
            improver: ImprovementLoop::new(provider.clone(), judge.clone()),
            judge,
            provider,
        }
    }

    /// Build a pipeline with every budget and threshold taken from
    /// configuration instead of the defaults.
    pub fn from_config(
        config: &loopcraft_config::AppConfig,
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let judge = Arc::new(
            QualityJudge::new(provider.clone(), event_bus.clone())
                .with_threshold(config.quality.threshold),
        );
        let react = ReactAgent::new(provider.clone(), tools.clone(), event_bus.clone())
            .with_temperature(config.default_temperature)
            .with_max_tokens(config.default_max_tokens)
            .with_max_iterations(config.reasoning.max_iterations)
            .with_tool_timeout(std::time::Duration::from_secs(
                config.reasoning.tool_timeout_secs,
            ))
            .with_observation_cap(config.reasoning.observation_cap);
        let improver = ImprovementLoop::new(provider.clone(), judge.clone())
            .with_max_iterations(config.quality.max_improvement_iterations);

        Self {
            router: Router::new(provider.clone(), tools, event_bus),
            react,
            improver,
            judge,
            provider,
        }
    }

    /// Replace the reasoning loop, keeping the rest of the pipeline.
    pub fn with_react(mut self, react: ReactAgent) -> Self {
        self.react = react;
        self
    }

    /// Replace the improvement loop.
    pub fn with_improver(mut self, improver: ImprovementLoop) -> Self {
        self.improver = improver;
        self
    }

    /// Handle one request end to end.
    pub async fn handle(&self, question: &str) -> Result<PipelineResult, AgentError> {
        let decision = self.router.decide(question).await;
        info!(route = %decision.route, "Handling request");

        let answer = match decision.route {
            Route::Direct => self.answer_directly(question).await?,
            Route::ToolUse => self.react.run(question).await?.answer,
        };

        let score = self.judge.evaluate(question, &answer).await;
        debug!(overall = score.overall, should_improve = score.should_improve, "Answer judged");

        if !score.should_improve {
            return Ok(PipelineResult {
                answer,
                decision,
                score,
                improvement_iterations: 0,
            });
        }

        let outcome = self.improver.improve(question, &answer, score).await;
        Ok(PipelineResult {
            answer: outcome.final_answer,
            decision,
            score: outcome.final_score,
            improvement_iterations: outcome.iterations,
        })
    }

    async fn answer_directly(&self, question: &str) -> Result<String, AgentError> {
        let request = CompletionRequest::new(vec![Message::user(question)]);
        let text = self.provider.complete(request).await?;
        Ok(text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use loopcraft_knowledge::InMemoryStore;
    use loopcraft_tools::default_registry;

    fn pipeline(responses: Vec<String>) -> (AgentPipeline, Arc<SequentialMockProvider>) {
        let provider = Arc::new(SequentialMockProvider::new(responses));
        let tools = Arc::new(default_registry(Arc::new(InMemoryStore::new())));
        let bus = Arc::new(EventBus::default());
        (
            AgentPipeline::new(provider.clone(), tools, bus),
            provider,
        )
    }

    fn router_verdict(route: &str) -> String {
        format!(r#"{{"route": "{route}", "reasoning": "classified", "confidence": 0.9, "suggestedTool": null}}"#)
    }

    fn judge_verdict(value: f64) -> String {
        format!(
            r#"{{"accuracy": {value}, "relevance": {value}, "clarity": {value}, "completeness": {value}, "feedback": "judged"}}"#
        )
    }

    #[tokio::test]
    async fn direct_route_answers_with_one_completion() {
        let (pipeline, provider) = pipeline(vec![
            router_verdict("direct"),
            "Paris is the capital of France.".into(),
            judge_verdict(0.9),
        ]);

        let result = pipeline.handle("What is the capital of France?").await.unwrap();
        assert_eq!(result.answer, "Paris is the capital of France.");
        assert_eq!(result.decision.route, Route::Direct);
        assert_eq!(result.improvement_iterations, 0);
        // Router + direct answer + judge, nothing else.
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn tool_use_route_runs_reasoning_loop() {
        let (pipeline, _) = pipeline(vec![
            router_verdict("tool-use"),
            "Thought: simple arithmetic\nAction: calculator\nAction Input: {\"expression\": \"21 * 2\"}".into(),
            "Final Answer: The result is 42.".into(),
            judge_verdict(0.9),
        ]);

        let result = pipeline.handle("What is 21 * 2?").await.unwrap();
        assert_eq!(result.answer, "The result is 42.");
        assert_eq!(result.decision.route, Route::ToolUse);
    }

    #[tokio::test]
    async fn low_score_triggers_improvement() {
        let (pipeline, _) = pipeline(vec![
            router_verdict("direct"),
            "Short answer.".into(),
            judge_verdict(0.5),
            "A longer, clearer revised answer.".into(),
            judge_verdict(0.8),
        ]);

        let result = pipeline.handle("Explain ownership in Rust").await.unwrap();
        assert_eq!(result.answer, "A longer, clearer revised answer.");
        assert_eq!(result.improvement_iterations, 1);
        assert!((result.score.overall - 0.8).abs() < 1e-9);
    }

    #[tokio::test]
    async fn garbled_router_output_defaults_to_tool_use() {
        let (pipeline, _) = pipeline(vec![
            "I cannot classify this request.".into(),
            "Final Answer: done anyway".into(),
            judge_verdict(0.9),
        ]);

        let result = pipeline.handle("anything").await.unwrap();
        assert_eq!(result.decision.route, Route::ToolUse);
        assert!((result.decision.confidence - 0.5).abs() < f64::EPSILON);
        assert_eq!(result.answer, "done anyway");
    }

    #[tokio::test]
    async fn config_threshold_controls_improvement() {
        // Threshold 0.4: a 0.5 answer is already good enough, no revision.
        let mut config = loopcraft_config::AppConfig::default();
        config.quality.threshold = 0.4;

        let provider = Arc::new(SequentialMockProvider::new(vec![
            router_verdict("direct"),
            "Good enough.".into(),
            judge_verdict(0.5),
        ]));
        let tools = Arc::new(default_registry(Arc::new(InMemoryStore::new())));
        let pipeline = AgentPipeline::from_config(
            &config,
            provider.clone(),
            tools,
            Arc::new(EventBus::default()),
        );

        let result = pipeline.handle("question").await.unwrap();
        assert_eq!(result.answer, "Good enough.");
        assert_eq!(result.improvement_iterations, 0);
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn non_improving_revision_keeps_original() {
        let (pipeline, _) = pipeline(vec![
            router_verdict("direct"),
            "Original answer.".into(),
            judge_verdict(0.5),
            "Worse revision.".into(),
            judge_verdict(0.3),
        ]);

        let result = pipeline.handle("question").await.unwrap();
        assert_eq!(result.answer, "Original answer.");
        assert_eq!(result.improvement_iterations, 1);
        assert!((result.score.overall - 0.5).abs() < 1e-9);
    }
}
