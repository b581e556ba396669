//! Shared test helpers for the loop tests.

use async_trait::async_trait;
use loopcraft_core::error::{ProviderError, RunnerError};
use loopcraft_core::provider::{CompletionRequest, Provider};
use loopcraft_core::runner::{ArtifactStore, CommandRunner, RunReport};
use std::collections::HashMap;
use std::sync::Mutex;

/// A mock provider that returns a sequence of scripted text responses.
///
/// Each call to `complete` returns the next response in the queue and
/// records the request for later inspection. Panics if more calls are made
/// than responses provided.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<String>>,
    requests: Mutex<Vec<CompletionRequest>>,
    call_count: Mutex<usize>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
            call_count: Mutex::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    /// All requests seen so far, in order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let mut count = self.call_count.lock().unwrap();
        let responses = self.responses.lock().unwrap();

        if *count >= responses.len() {
            panic!(
                "SequentialMockProvider: no more responses (call #{}, have {})",
                *count,
                responses.len()
            );
        }

        let response = responses[*count].clone();
        *count += 1;
        Ok(response)
    }
}

/// A provider that always fails.
pub struct FailingProvider;

#[async_trait]
impl Provider for FailingProvider {
    fn name(&self) -> &str {
        "failing_mock"
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<String, ProviderError> {
        Err(ProviderError::Network("connection refused".into()))
    }
}

/// A runner that replays a scripted sequence of reports, then keeps
/// returning the last one.
pub struct ScriptedRunner {
    reports: Mutex<Vec<RunReport>>,
    run_count: Mutex<usize>,
}

impl ScriptedRunner {
    pub fn new(reports: Vec<RunReport>) -> Self {
        Self {
            reports: Mutex::new(reports),
            run_count: Mutex::new(0),
        }
    }

    pub fn run_count(&self) -> usize {
        *self.run_count.lock().unwrap()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, _identifier: &str) -> Result<RunReport, RunnerError> {
        let mut count = self.run_count.lock().unwrap();
        let reports = self.reports.lock().unwrap();
        let index = (*count).min(reports.len().saturating_sub(1));
        let report = reports
            .get(index)
            .cloned()
            .unwrap_or_else(|| RunReport::failed("no scripted report", 1));
        *count += 1;
        Ok(report)
    }
}

/// A simple in-memory artifact store.
pub struct InMemoryArtifacts {
    artifacts: Mutex<HashMap<String, String>>,
}

impl InMemoryArtifacts {
    pub fn new() -> Self {
        Self {
            artifacts: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_artifact(identifier: &str, content: &str) -> Self {
        let store = Self::new();
        store
            .artifacts
            .lock()
            .unwrap()
            .insert(identifier.to_string(), content.to_string());
        store
    }

    pub fn get(&self, identifier: &str) -> Option<String> {
        self.artifacts.lock().unwrap().get(identifier).cloned()
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifacts {
    async fn load(&self, identifier: &str) -> Result<String, RunnerError> {
        self.artifacts
            .lock()
            .unwrap()
            .get(identifier)
            .cloned()
            .ok_or_else(|| RunnerError::ArtifactNotFound(identifier.to_string()))
    }

    async fn save(&self, identifier: &str, content: &str) -> Result<(), RunnerError> {
        self.artifacts
            .lock()
            .unwrap()
            .insert(identifier.to_string(), content.to_string());
        Ok(())
    }
}
