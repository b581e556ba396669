//! Improvement loop — bounded regenerate-and-rejudge cycle.
//!
//! Runs while the current score asks for improvement and the round budget
//! (default 2) remains. A revision is accepted only when its overall score
//! is strictly greater than the current one; a tie or regression discards
//! the revision and stops the loop, so the best answer so far is always
//! kept. Errors during a round stop the loop with the best answer so far —
//! improvement is best-effort and never fatal to the surrounding request.

use loopcraft_core::message::Message;
use loopcraft_core::provider::{CompletionRequest, Provider};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::judge::{QualityJudge, QualityScore};
use crate::prompts;

/// Default number of improvement rounds per answer.
pub const DEFAULT_MAX_IMPROVEMENT_ITERATIONS: u32 = 2;

/// One regenerate-and-rejudge round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImprovementAttempt {
    /// 1-based round number.
    pub iteration: u32,
    pub previous_score: QualityScore,
    pub new_score: QualityScore,
    pub accepted: bool,
}

/// The outcome of an improvement run.
#[derive(Debug)]
pub struct ImprovementOutcome {
    /// The best answer found (possibly the original, unchanged).
    pub final_answer: String,
    /// The score of the final answer.
    pub final_score: QualityScore,
    /// Rounds actually executed.
    pub iterations: u32,
    /// Per-round records, accepted or not.
    pub attempts: Vec<ImprovementAttempt>,
}

/// Bounded improvement driver built on top of the judge.
pub struct ImprovementLoop {
    provider: Arc<dyn Provider>,
    judge: Arc<QualityJudge>,
    max_iterations: u32,
}

impl ImprovementLoop {
    pub fn new(provider: Arc<dyn Provider>, judge: Arc<QualityJudge>) -> Self {
        Self {
            provider,
            judge,
            max_iterations: DEFAULT_MAX_IMPROVEMENT_ITERATIONS,
        }
    }

    /// Set the round budget.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// Try to improve `answer` within budget. The returned score's overall
    /// is the maximum over the original and all accepted revisions.
    pub async fn improve(
        &self,
        question: &str,
        answer: &str,
        score: QualityScore,
    ) -> ImprovementOutcome {
        let mut current_answer = answer.to_string();
        let mut current_score = score;
        let mut attempts = Vec::new();
        let mut iteration: u32 = 0;

        while iteration < self.max_iterations && current_score.should_improve {
            iteration += 1;
            debug!(iteration, overall = current_score.overall, "Improvement round");

            let revision = match self.revise(question, &current_answer, &current_score).await {
                Ok(revision) => revision,
                Err(reason) => {
                    // Best-effort: keep what we have.
                    warn!(%reason, "Revision generation failed, keeping best answer so far");
                    break;
                }
            };

            let new_score = self.judge.evaluate(question, &revision).await;
            // Strict improvement only; a tie is a rejection.
            let accepted = new_score.overall > current_score.overall;

            attempts.push(ImprovementAttempt {
                iteration,
                previous_score: current_score.clone(),
                new_score: new_score.clone(),
                accepted,
            });

            if !accepted {
                debug!(
                    new = new_score.overall,
                    current = current_score.overall,
                    "Revision did not improve, stopping"
                );
                break;
            }

            current_answer = revision;
            current_score = new_score;
        }

        info!(
            iterations = iteration,
            final_overall = current_score.overall,
            "Improvement loop finished"
        );
        ImprovementOutcome {
            final_answer: current_answer,
            final_score: current_score,
            iterations: iteration,
            attempts,
        }
    }

    async fn revise(
        &self,
        question: &str,
        answer: &str,
        score: &QualityScore,
    ) -> Result<String, String> {
        let prompt = prompts::revision_prompt(
            question,
            answer,
            &score.feedback,
            score.suggestions.as_deref(),
        );
        let request = CompletionRequest::new(vec![Message::user(prompt)]);
        self.provider
            .complete(request)
            .await
            .map(|text| text.trim().to_string())
            .map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use loopcraft_core::event::EventBus;

    fn score(overall_dimensions: f64, should_improve: bool) -> QualityScore {
        QualityScore {
            accuracy: overall_dimensions,
            relevance: overall_dimensions,
            clarity: overall_dimensions,
            completeness: overall_dimensions,
            overall: overall_dimensions,
            feedback: "needs work".into(),
            should_improve,
            suggestions: Some("add structure".into()),
        }
    }

    fn judge_returning(verdicts: Vec<String>) -> Arc<QualityJudge> {
        Arc::new(QualityJudge::new(
            Arc::new(SequentialMockProvider::new(verdicts)),
            Arc::new(EventBus::default()),
        ))
    }

    fn verdict(value: f64) -> String {
        format!(
            r#"{{"accuracy": {value}, "relevance": {value}, "clarity": {value}, "completeness": {value}, "feedback": "judged"}}"#
        )
    }

    #[tokio::test]
    async fn accepts_strictly_better_revision() {
        let generator = Arc::new(SequentialMockProvider::new(vec!["better answer".into()]));
        // Revision judged at 0.8 > current 0.5; 0.8 clears the threshold so the loop stops.
        let judge = judge_returning(vec![verdict(0.8)]);
        let improver = ImprovementLoop::new(generator, judge);

        let outcome = improver.improve("q", "first answer", score(0.5, true)).await;
        assert_eq!(outcome.final_answer, "better answer");
        assert!((outcome.final_score.overall - 0.8).abs() < 1e-9);
        assert_eq!(outcome.iterations, 1);
        assert!(outcome.attempts[0].accepted);
    }

    #[tokio::test]
    async fn rejects_tie_and_keeps_original() {
        let generator = Arc::new(SequentialMockProvider::new(vec!["same quality".into()]));
        let judge = judge_returning(vec![verdict(0.5)]);
        let improver = ImprovementLoop::new(generator, judge);

        let outcome = improver.improve("q", "original", score(0.5, true)).await;
        assert_eq!(outcome.final_answer, "original");
        assert!(!outcome.attempts[0].accepted);
        assert_eq!(outcome.iterations, 1);
    }

    #[tokio::test]
    async fn rejects_regression_immediately() {
        let generator = Arc::new(SequentialMockProvider::new(vec!["worse answer".into()]));
        let judge = judge_returning(vec![verdict(0.3)]);
        let improver = ImprovementLoop::new(generator, judge);

        let outcome = improver.improve("q", "original", score(0.5, true)).await;
        assert_eq!(outcome.final_answer, "original");
        assert!((outcome.final_score.overall - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn good_answer_skips_improvement_entirely() {
        let generator = Arc::new(SequentialMockProvider::new(vec![]));
        let judge = judge_returning(vec![]);
        let improver = ImprovementLoop::new(generator, judge);

        let outcome = improver.improve("q", "already good", score(0.9, false)).await;
        assert_eq!(outcome.final_answer, "already good");
        assert_eq!(outcome.iterations, 0);
        assert!(outcome.attempts.is_empty());
    }

    #[tokio::test]
    async fn stops_at_round_budget() {
        // Both revisions improve but stay under the threshold, so the loop
        // runs to the budget of 2 and stops.
        let generator = Arc::new(SequentialMockProvider::new(vec![
            "revision one".into(),
            "revision two".into(),
        ]));
        let judge = judge_returning(vec![verdict(0.55), verdict(0.6)]);
        let improver = ImprovementLoop::new(generator, judge);

        let outcome = improver.improve("q", "original", score(0.5, true)).await;
        assert_eq!(outcome.iterations, 2);
        assert_eq!(outcome.final_answer, "revision two");
        assert!((outcome.final_score.overall - 0.6).abs() < 1e-9);
        assert!(outcome.attempts.iter().all(|a| a.accepted));
    }

    #[tokio::test]
    async fn generation_error_returns_original_unchanged() {
        let improver = ImprovementLoop::new(
            Arc::new(FailingProvider),
            judge_returning(vec![]),
        );

        let outcome = improver.improve("q", "original", score(0.5, true)).await;
        assert_eq!(outcome.final_answer, "original");
        assert!((outcome.final_score.overall - 0.5).abs() < f64::EPSILON);
        assert!(outcome.attempts.is_empty());
    }

    #[tokio::test]
    async fn revision_prompt_carries_feedback() {
        let generator = Arc::new(SequentialMockProvider::new(vec!["better".into()]));
        let judge = judge_returning(vec![verdict(0.9)]);
        let improver = ImprovementLoop::new(generator.clone(), judge);

        improver.improve("q", "answer", score(0.5, true)).await;

        let requests = generator.requests();
        assert_eq!(requests.len(), 1);
        let prompt = &requests[0].messages[0].content;
        assert!(prompt.contains("needs work"));
        assert!(prompt.contains("add structure"));
    }
}
