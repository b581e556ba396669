//! Provider trait — the abstraction over generative completion services.
//!
//! A Provider accepts an ordered list of role-tagged messages plus sampling
//! parameters and returns generated text. It may fail or time out; the
//! caller decides whether that is fatal (reasoning loop) or degraded
//! (router, judge).

use crate::error::ProviderError;
use crate::message::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A single completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The conversation messages, in order.
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// How long the caller is willing to wait for this one request.
    #[serde(with = "duration_millis")]
    pub timeout: Duration,
}

fn default_temperature() -> f32 {
    0.7
}

impl CompletionRequest {
    /// Build a request with default sampling parameters.
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            temperature: default_temperature(),
            max_tokens: None,
            timeout: Duration::from_secs(120),
        }
    }

    /// Set the temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the max tokens.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        (d.as_millis() as u64).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

/// The generative completion service.
///
/// The control loops call `complete()` without knowing which backend is
/// serving the request — pure polymorphism. Implementations must honor the
/// request timeout internally or surface `ProviderError::Timeout`.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider.
    fn name(&self) -> &str;

    /// Send a request and get the generated text back.
    async fn complete(&self, request: CompletionRequest)
        -> std::result::Result<String, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults() {
        let req = CompletionRequest::new(vec![]);
        assert!((req.temperature - 0.7).abs() < f32::EPSILON);
        assert!(req.max_tokens.is_none());
    }

    #[test]
    fn request_builder_chain() {
        let req = CompletionRequest::new(vec![Message::user("hi")])
            .with_temperature(0.2)
            .with_max_tokens(512)
            .with_timeout(Duration::from_secs(30));
        assert!((req.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(req.max_tokens, Some(512));
        assert_eq!(req.timeout, Duration::from_secs(30));
    }

    #[test]
    fn request_serialization_roundtrip() {
        let req = CompletionRequest::new(vec![Message::user("hi")]);
        let json = serde_json::to_string(&req).unwrap();
        let back: CompletionRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.messages.len(), 1);
        assert_eq!(back.timeout, Duration::from_secs(120));
    }
}
