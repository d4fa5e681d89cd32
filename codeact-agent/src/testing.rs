//! In-memory collaborators for tests

use codeact_runtime::{CodeExecutor, CompletionRequest, CompletionResponse, LlmProvider, ProviderError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Calls seen by the mocks, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Complete,
    Execute,
}

pub type EventLog = Arc<Mutex<Vec<Event>>>;

/// Replays canned completions and records every request.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    events: EventLog,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<String, ProviderError>>) -> Self {
        Self::with_log(script, EventLog::default())
    }

    pub fn with_log(script: Vec<Result<String, ProviderError>>, events: EventLog) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
            events,
        }
    }

    /// Same reply forever
    pub fn repeating(reply: &str, times: usize) -> Self {
        Self::new((0..times).map(|_| Ok(reply.to_string())).collect())
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        "scripted-model"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        self.events.lock().unwrap().push(Event::Complete);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(text)) => Ok(CompletionResponse::text("scripted-model", text)),
            Some(Err(err)) => Err(err),
            None => Err(ProviderError::Other("script exhausted".into())),
        }
    }
}

/// Returns a fixed result and records the code it was given.
pub struct RecordingExecutor {
    result: String,
    codes: Mutex<Vec<String>>,
    events: EventLog,
}

impl RecordingExecutor {
    pub fn new(result: &str) -> Self {
        Self::with_log(result, EventLog::default())
    }

    pub fn with_log(result: &str, events: EventLog) -> Self {
        Self {
            result: result.to_string(),
            codes: Mutex::new(Vec::new()),
            events,
        }
    }

    pub fn codes(&self) -> Vec<String> {
        self.codes.lock().unwrap().clone()
    }
}

impl CodeExecutor for RecordingExecutor {
    async fn execute(&self, code: &str) -> String {
        self.codes.lock().unwrap().push(code.to_string());
        self.events.lock().unwrap().push(Event::Execute);
        self.result.clone()
    }
}
