//! Quality judge — scores an answer on four independent dimensions.
//!
//! One completion call per evaluation. The upstream model's own arithmetic
//! is not trusted: `overall` is always recomputed locally as the mean of
//! the four ratings. When the judge call fails or its output can't be
//! parsed, a keyword/structure heuristic substitutes so the improvement
//! decision stays well-defined — a missing judge never fails the request.

use chrono::Utc;
use loopcraft_core::event::{DomainEvent, EventBus};
use loopcraft_core::message::Message;
use loopcraft_core::provider::{CompletionRequest, Provider};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::parser::extract_json_object;
use crate::prompts;

/// Default improvement threshold: answers scoring below this overall are
/// candidates for another round.
pub const DEFAULT_QUALITY_THRESHOLD: f64 = 0.75;

/// A fresh score for one (question, answer) pair. Never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityScore {
    pub accuracy: f64,
    pub relevance: f64,
    pub clarity: f64,
    pub completeness: f64,
    /// Arithmetic mean of the four dimensions, computed locally.
    pub overall: f64,
    pub feedback: String,
    pub should_improve: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<String>,
}

/// Raw verdict shape expected from the model. An `overall` field, if the
/// model volunteers one, is deliberately ignored.
#[derive(Debug, Deserialize)]
struct JudgeVerdict {
    accuracy: f64,
    relevance: f64,
    clarity: f64,
    completeness: f64,
    #[serde(default)]
    feedback: String,
    #[serde(default)]
    suggestions: Option<String>,
}

/// Scores candidate answers without answering the question itself.
pub struct QualityJudge {
    provider: Arc<dyn Provider>,
    event_bus: Arc<EventBus>,
    threshold: f64,
}

impl QualityJudge {
    pub fn new(provider: Arc<dyn Provider>, event_bus: Arc<EventBus>) -> Self {
        Self {
            provider,
            event_bus,
            threshold: DEFAULT_QUALITY_THRESHOLD,
        }
    }

    /// Set the improvement threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Score an answer. Never fails: falls back to the heuristic scorer
    /// when the judge model is unavailable or unparsable.
    pub async fn evaluate(&self, question: &str, answer: &str) -> QualityScore {
        let score = match self.ask_judge(question, answer).await {
            Ok(score) => score,
            Err(reason) => {
                warn!(%reason, "Judge unavailable, using heuristic score");
                self.heuristic_score(question, answer)
            }
        };

        debug!(
            overall = score.overall,
            should_improve = score.should_improve,
            "Answer judged"
        );
        self.event_bus.publish(DomainEvent::AnswerJudged {
            overall: score.overall,
            should_improve: score.should_improve,
            timestamp: Utc::now(),
        });
        score
    }

    async fn ask_judge(&self, question: &str, answer: &str) -> Result<QualityScore, String> {
        let prompt = prompts::judge_prompt(question, answer);
        let request = CompletionRequest::new(vec![Message::user(prompt)]).with_temperature(0.0);

        let response = self
            .provider
            .complete(request)
            .await
            .map_err(|e| e.to_string())?;

        let json = extract_json_object(&response)
            .ok_or_else(|| "response contains no JSON object".to_string())?;
        let verdict: JudgeVerdict =
            serde_json::from_str(&json).map_err(|e| format!("malformed verdict: {e}"))?;

        Ok(self.build_score(
            verdict.accuracy.clamp(0.0, 1.0),
            verdict.relevance.clamp(0.0, 1.0),
            verdict.clarity.clamp(0.0, 1.0),
            verdict.completeness.clamp(0.0, 1.0),
            verdict.feedback,
            verdict.suggestions,
        ))
    }

    fn build_score(
        &self,
        accuracy: f64,
        relevance: f64,
        clarity: f64,
        completeness: f64,
        feedback: String,
        suggestions: Option<String>,
    ) -> QualityScore {
        let overall = (accuracy + relevance + clarity + completeness) / 4.0;
        QualityScore {
            accuracy,
            relevance,
            clarity,
            completeness,
            overall,
            feedback,
            should_improve: overall < self.threshold,
            suggestions,
        }
    }

    /// Heuristic fallback used when the judge model is unavailable.
    ///
    /// Fixed conventions:
    /// - relevance: fraction of question words (>3 chars) appearing in the
    ///   answer, clamped to [0.4, 0.9]
    /// - clarity: 0.75 with structural markers (newlines/bullets), else 0.6
    /// - completeness: answer length against a 500-character baseline,
    ///   clamped to [0.4, 0.9]
    /// - accuracy: 0.7 (unverifiable without a judge)
    fn heuristic_score(&self, question: &str, answer: &str) -> QualityScore {
        let answer_lower = answer.to_lowercase();
        let question_words: Vec<String> = question
            .to_lowercase()
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
            .filter(|w| w.len() > 3)
            .collect();
        let overlap = if question_words.is_empty() {
            0.0
        } else {
            let matched = question_words
                .iter()
                .filter(|w| answer_lower.contains(w.as_str()))
                .count();
            matched as f64 / question_words.len() as f64
        };
        let relevance = overlap.clamp(0.4, 0.9);

        let has_structure =
            answer.contains('\n') || answer.contains("- ") || answer.contains("* ");
        let clarity = if has_structure { 0.75 } else { 0.6 };

        let completeness = (answer.chars().count() as f64 / 500.0).clamp(0.4, 0.9);

        let accuracy = 0.7;

        self.build_score(
            accuracy,
            relevance,
            clarity,
            completeness,
            "Heuristic evaluation: the judge model was unavailable, so this score is \
             derived from keyword overlap, structure, and length."
                .into(),
            None,
        )
    }
}
