//! Stability loop — execute-and-verify for runnable artifacts.
//!
//! Generated code is not judged by the quality judge; it is run. An
//! artifact is stable once it passes `required_runs` consecutive runs. A
//! failed run consumes a fix attempt: the artifact is regenerated from the
//! failure output, persisted, and the run streak starts over from zero. A
//! regenerated artifact must prove stability from scratch, never resume a
//! partial streak. When the fix budget is gone the loop aborts with the
//! final record attached.

use loopcraft_core::event::{DomainEvent, EventBus};
use loopcraft_core::message::Message;
use loopcraft_core::provider::{CompletionRequest, Provider};
use loopcraft_core::runner::{ArtifactStore, CommandRunner};
use loopcraft_core::KnowledgeStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::AgentError;
use crate::prompts;

/// Consecutive passing runs required before an artifact counts as stable.
pub const DEFAULT_REQUIRED_RUNS: u32 = 3;

/// Regenerations allowed before giving up.
pub const DEFAULT_MAX_FIX_ATTEMPTS: u32 = 3;

/// Pause between successful runs, so timing-sensitive failures are not
/// masked by back-to-back execution.
pub const DEFAULT_RUN_PAUSE: Duration = Duration::from_millis(500);

/// Counters for one verification session.
///
/// Transitions are by-value methods so the streak/budget logic can be
/// tested without a runner or timers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilityRecord {
    pub artifact_id: String,
    pub required_runs: u32,
    pub successful_runs: u32,
    pub fix_attempts: u32,
    pub is_stable: bool,
}

impl StabilityRecord {
    pub fn new(artifact_id: impl Into<String>, required_runs: u32) -> Self {
        Self {
            artifact_id: artifact_id.into(),
            required_runs,
            successful_runs: 0,
            fix_attempts: 0,
            is_stable: false,
        }
    }

    /// One passing run. Marks the record stable when the streak completes.
    pub fn record_success(mut self) -> Self {
        self.successful_runs += 1;
        self.is_stable = self.successful_runs >= self.required_runs;
        self
    }

    /// One regeneration. Consumes a fix attempt and resets the streak;
    /// the new artifact starts proving itself from zero.
    pub fn record_regeneration(mut self) -> Self {
        self.fix_attempts += 1;
        self.successful_runs = 0;
        self.is_stable = false;
        self
    }

    /// Whether another regeneration is allowed.
    pub fn can_fix(&self, max_fix_attempts: u32) -> bool {
        self.fix_attempts < max_fix_attempts
    }
}

/// Drives an artifact to stability by repeated execution and
/// regeneration-on-failure.
pub struct StabilityLoop {
    provider: Arc<dyn Provider>,
    runner: Arc<dyn CommandRunner>,
    artifacts: Arc<dyn ArtifactStore>,
    knowledge: Arc<dyn KnowledgeStore>,
    event_bus: Arc<EventBus>,
    required_runs: u32,
    max_fix_attempts: u32,
    run_pause: Duration,
}

impl StabilityLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        runner: Arc<dyn CommandRunner>,
        artifacts: Arc<dyn ArtifactStore>,
        knowledge: Arc<dyn KnowledgeStore>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            runner,
            artifacts,
            knowledge,
            event_bus,
            required_runs: DEFAULT_REQUIRED_RUNS,
            max_fix_attempts: DEFAULT_MAX_FIX_ATTEMPTS,
            run_pause: DEFAULT_RUN_PAUSE,
        }
    }

    /// Take all budgets from configuration.
    pub fn from_config(
        config: &loopcraft_config::StabilityConfig,
        provider: Arc<dyn Provider>,
        runner: Arc<dyn CommandRunner>,
        artifacts: Arc<dyn ArtifactStore>,
        knowledge: Arc<dyn KnowledgeStore>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self::new(provider, runner, artifacts, knowledge, event_bus)
            .with_required_runs(config.required_runs)
            .with_max_fix_attempts(config.max_fix_attempts)
            .with_run_pause(Duration::from_millis(config.run_pause_ms))
    }

    pub fn with_required_runs(mut self, runs: u32) -> Self {
        self.required_runs = runs;
        self
    }

    pub fn with_max_fix_attempts(mut self, attempts: u32) -> Self {
        self.max_fix_attempts = attempts;
        self
    }

    pub fn with_run_pause(mut self, pause: Duration) -> Self {
        self.run_pause = pause;
        self
    }

    /// Run the artifact until it is stable or the fix budget is spent.
    ///
    /// Returns the record with `is_stable = true` on success. Fix-budget
    /// exhaustion is fatal and carries the final record in the error.
    pub async fn verify_stable(&self, artifact_id: &str) -> Result<StabilityRecord, AgentError> {
        let mut record = StabilityRecord::new(artifact_id, self.required_runs);

        loop {
            let report = match self.runner.run(artifact_id).await {
                Ok(report) => report,
                Err(e) => {
                    // A runner that cannot execute at all is treated like a
                    // failing run: the artifact may be broken enough to not
                    // even start.
                    warn!(artifact_id, error = %e, "Runner failed to execute artifact");
                    loopcraft_core::runner::RunReport::failed(e.to_string(), -1)
                }
            };

            self.event_bus.publish(DomainEvent::StabilityRunCompleted {
                artifact_id: artifact_id.to_string(),
                success: report.success,
                successful_runs: if report.success {
                    record.successful_runs + 1
                } else {
                    record.successful_runs
                },
                timestamp: chrono::Utc::now(),
            });

            if report.success {
                record = record.record_success();
                debug!(
                    artifact_id,
                    successful_runs = record.successful_runs,
                    required = record.required_runs,
                    "Run passed"
                );
                if record.is_stable {
                    info!(
                        artifact_id,
                        fix_attempts = record.fix_attempts,
                        "Artifact verified stable"
                    );
                    self.persist_stable(artifact_id).await;
                    return Ok(record);
                }
                // Pause between successful runs only.
                tokio::time::sleep(self.run_pause).await;
                continue;
            }

            debug!(artifact_id, exit_code = report.exit_code, "Run failed");

            if !record.can_fix(self.max_fix_attempts) {
                warn!(
                    artifact_id,
                    fix_attempts = record.fix_attempts,
                    "Fix budget exhausted, artifact is not stable"
                );
                return Err(AgentError::FixBudgetExhausted { record });
            }

            record = record.record_regeneration();
            self.regenerate(artifact_id, &report.output).await?;
            self.event_bus.publish(DomainEvent::ArtifactRegenerated {
                artifact_id: artifact_id.to_string(),
                fix_attempt: record.fix_attempts,
                timestamp: chrono::Utc::now(),
            });
        }
    }

    /// Regenerate the artifact from the failing run's output and persist
    /// the replacement.
    async fn regenerate(&self, artifact_id: &str, failure_output: &str) -> Result<(), AgentError> {
        let current = self.artifacts.load(artifact_id).await?;

        let prompt = prompts::regeneration_prompt(&current, failure_output);
        let request = CompletionRequest::new(vec![Message::user(prompt)]);
        let response = self.provider.complete(request).await?;
        let fixed = strip_code_fence(&response);

        self.artifacts.save(artifact_id, &fixed).await?;

        info!(artifact_id, "Artifact regenerated and persisted");
        Ok(())
    }

    /// Best-effort submission of the stable artifact to the knowledge
    /// store. A failure here never changes the verification result.
    async fn persist_stable(&self, artifact_id: &str) {
        let content = match self.artifacts.load(artifact_id).await {
            Ok(content) => content,
            Err(e) => {
                warn!(artifact_id, error = %e, "Could not load stable artifact for submission");
                return;
            }
        };

        let mut metadata = HashMap::new();
        metadata.insert("artifact_id".to_string(), artifact_id.to_string());
        metadata.insert("kind".to_string(), "stable-artifact".to_string());

        match self.knowledge.submit(&content, metadata).await {
            Ok(source_id) => {
                debug!(artifact_id, source_id, "Stable artifact submitted to knowledge store");
            }
            Err(e) => {
                warn!(artifact_id, error = %e, "Knowledge submission failed, ignoring");
            }
        }
    }
}

/// Strip a surrounding markdown code fence, if any, from model output.
fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("```")
        && let Some(body) = rest.strip_suffix("```")
    {
        // Drop the language tag on the opening fence line.
        let body = match body.split_once('\n') {
            Some((_lang, code)) => code,
            None => body,
        };
        return body.trim().to_string();
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use async_trait::async_trait;
    use loopcraft_core::error::KnowledgeError;
    use loopcraft_core::knowledge::Passage;
    use loopcraft_core::runner::RunReport;
    use loopcraft_knowledge::InMemoryStore;

    struct FailingKnowledge;

    #[async_trait]
    impl KnowledgeStore for FailingKnowledge {
        async fn submit(
            &self,
            _text: &str,
            _metadata: HashMap<String, String>,
        ) -> Result<String, KnowledgeError> {
            Err(KnowledgeError::Storage("store offline".into()))
        }

        async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<Passage>, KnowledgeError> {
            Err(KnowledgeError::Storage("store offline".into()))
        }
    }

    fn pass() -> RunReport {
        RunReport::passed("3 tests passed")
    }

    fn fail(output: &str) -> RunReport {
        RunReport::failed(output, 1)
    }

    fn stability_loop(
        provider: Arc<SequentialMockProvider>,
        runner: Arc<ScriptedRunner>,
        artifacts: Arc<InMemoryArtifacts>,
    ) -> StabilityLoop {
        StabilityLoop::new(
            provider,
            runner,
            artifacts,
            Arc::new(InMemoryStore::new()),
            Arc::new(EventBus::default()),
        )
        .with_run_pause(Duration::from_millis(0))
    }

    #[test]
    fn record_success_completes_streak() {
        let record = StabilityRecord::new("t", 3)
            .record_success()
            .record_success();
        assert!(!record.is_stable);
        let record = record.record_success();
        assert!(record.is_stable);
        assert_eq!(record.successful_runs, 3);
    }

    #[test]
    fn regeneration_resets_streak_but_keeps_attempts() {
        let record = StabilityRecord::new("t", 3)
            .record_success()
            .record_success()
            .record_regeneration();
        assert_eq!(record.successful_runs, 0);
        assert_eq!(record.fix_attempts, 1);
        assert!(!record.is_stable);

        let record = record.record_regeneration();
        assert_eq!(record.fix_attempts, 2);
    }

    #[test]
    fn never_stable_below_required_runs() {
        let mut record = StabilityRecord::new("t", 3);
        for _ in 0..2 {
            record = record.record_success();
            assert!(!record.is_stable);
        }
    }

    #[tokio::test]
    async fn three_clean_runs_verify_stable() {
        let runner = Arc::new(ScriptedRunner::new(vec![pass(), pass(), pass()]));
        let verifier = stability_loop(
            Arc::new(SequentialMockProvider::new(vec![])),
            runner.clone(),
            Arc::new(InMemoryArtifacts::with_artifact("test-1", "fn t() {}")),
        );

        let record = verifier.verify_stable("test-1").await.unwrap();
        assert!(record.is_stable);
        assert_eq!(record.successful_runs, 3);
        assert_eq!(record.fix_attempts, 0);
        assert_eq!(runner.run_count(), 3);
    }

    #[tokio::test]
    async fn failure_mid_streak_regenerates_and_restarts() {
        // Fails on run 2, regenerates (fix attempt 1), then passes a fresh
        // streak of 3. Total runs: 2 before the fix plus 3 after.
        let runner = Arc::new(ScriptedRunner::new(vec![
            pass(),
            fail("assertion failed: left == right"),
            pass(),
            pass(),
            pass(),
        ]));
        let provider = Arc::new(SequentialMockProvider::new(vec![
            "fn t() { fixed(); }".into(),
        ]));
        let artifacts = Arc::new(InMemoryArtifacts::with_artifact("test-2", "fn t() { broken(); }"));
        let verifier = stability_loop(provider, runner.clone(), artifacts.clone());

        let record = verifier.verify_stable("test-2").await.unwrap();
        assert!(record.is_stable);
        assert_eq!(record.fix_attempts, 1);
        assert_eq!(record.successful_runs, 3);
        assert_eq!(runner.run_count(), 5);
        assert_eq!(artifacts.get("test-2").unwrap(), "fn t() { fixed(); }");
    }

    #[tokio::test]
    async fn exhausted_fix_budget_is_fatal_with_record() {
        let runner = Arc::new(ScriptedRunner::new(vec![fail("still broken")]));
        let provider = Arc::new(SequentialMockProvider::new(vec![
            "attempt 1".into(),
            "attempt 2".into(),
            "attempt 3".into(),
        ]));
        let verifier = stability_loop(
            provider,
            runner.clone(),
            Arc::new(InMemoryArtifacts::with_artifact("test-3", "broken")),
        );

        let err = verifier.verify_stable("test-3").await.unwrap_err();
        match err {
            AgentError::FixBudgetExhausted { record } => {
                assert!(!record.is_stable);
                assert_eq!(record.fix_attempts, 3);
                assert_eq!(record.successful_runs, 0);
            }
            other => panic!("expected FixBudgetExhausted, got {other:?}"),
        }
        // 1 initial failing run + 3 failing runs after each regeneration.
        assert_eq!(runner.run_count(), 4);
    }

    #[tokio::test]
    async fn regeneration_strips_code_fence_from_response() {
        let runner = Arc::new(ScriptedRunner::new(vec![
            fail("syntax error"),
            pass(),
            pass(),
            pass(),
        ]));
        let provider = Arc::new(SequentialMockProvider::new(vec![
            "```rust\nfn t() { ok(); }\n```".into(),
        ]));
        let artifacts = Arc::new(InMemoryArtifacts::with_artifact("test-4", "bad"));
        let verifier = stability_loop(provider, runner, artifacts.clone());

        verifier.verify_stable("test-4").await.unwrap();
        assert_eq!(artifacts.get("test-4").unwrap(), "fn t() { ok(); }");
    }

    #[tokio::test]
    async fn regeneration_prompt_includes_failure_output() {
        let runner = Arc::new(ScriptedRunner::new(vec![
            fail("panicked at overflow"),
            pass(),
            pass(),
            pass(),
        ]));
        let provider = Arc::new(SequentialMockProvider::new(vec!["fixed".into()]));
        let verifier = stability_loop(
            provider.clone(),
            runner,
            Arc::new(InMemoryArtifacts::with_artifact("test-5", "original code")),
        );

        verifier.verify_stable("test-5").await.unwrap();
        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        let prompt = &requests[0].messages[0].content;
        assert!(prompt.contains("panicked at overflow"));
        assert!(prompt.contains("original code"));
    }

    #[tokio::test]
    async fn stable_artifact_submitted_to_knowledge_store() {
        let store = Arc::new(InMemoryStore::new());
        let verifier = StabilityLoop::new(
            Arc::new(SequentialMockProvider::new(vec![])),
            Arc::new(ScriptedRunner::new(vec![pass()])),
            Arc::new(InMemoryArtifacts::with_artifact("test-6", "fn t() {}")),
            store.clone(),
            Arc::new(EventBus::default()),
        )
        .with_required_runs(1)
        .with_run_pause(Duration::from_millis(0));

        let record = verifier.verify_stable("test-6").await.unwrap();
        assert!(record.is_stable);
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn knowledge_failure_does_not_change_result() {
        let verifier = StabilityLoop::new(
            Arc::new(SequentialMockProvider::new(vec![])),
            Arc::new(ScriptedRunner::new(vec![pass(), pass(), pass()])),
            Arc::new(InMemoryArtifacts::with_artifact("test-7", "fn t() {}")),
            Arc::new(FailingKnowledge),
            Arc::new(EventBus::default()),
        )
        .with_run_pause(Duration::from_millis(0));

        let record = verifier.verify_stable("test-7").await.unwrap();
        assert!(record.is_stable);
    }

    #[tokio::test]
    async fn events_published_per_run_and_regeneration() {
        let bus = Arc::new(EventBus::default());
        let mut receiver = bus.subscribe();
        let verifier = StabilityLoop::new(
            Arc::new(SequentialMockProvider::new(vec!["fixed".into()])),
            Arc::new(ScriptedRunner::new(vec![fail("boom"), pass(), pass(), pass()])),
            Arc::new(InMemoryArtifacts::with_artifact("test-8", "bad")),
            Arc::new(InMemoryStore::new()),
            bus.clone(),
        )
        .with_run_pause(Duration::from_millis(0));

        verifier.verify_stable("test-8").await.unwrap();

        let mut run_events = 0;
        let mut regen_events = 0;
        while let Ok(event) = receiver.try_recv() {
            match event {
                DomainEvent::StabilityRunCompleted { .. } => run_events += 1,
                DomainEvent::ArtifactRegenerated { .. } => regen_events += 1,
                _ => {}
            }
        }
        assert_eq!(run_events, 4);
        assert_eq!(regen_events, 1);
    }
}
