use std::collections::VecDeque;
use std::sync::Mutex;

use sondar_core::{ChatCompletion, CompletionRequest, LlmError, Message};

/// Test double returning queued responses in order. Records every request
/// so assertions can inspect the prompts that were sent.
pub struct ScriptedClient {
    responses: Mutex<VecDeque<String>>,
    leading_failures: Mutex<usize>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedClient {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            leading_failures: Mutex::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Fails the first `n` calls with a retriable error before serving the
    /// scripted responses.
    pub fn with_leading_failures(self, n: usize) -> Self {
        *self.leading_failures.lock().unwrap() = n;
        self
    }

    pub fn recorded_requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn recorded_user_messages(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter_map(|r| {
                r.messages
                    .iter()
                    .find(|m| matches!(m.role, sondar_core::Role::User))
                    .map(|m: &Message| m.content.clone())
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl ChatCompletion for ScriptedClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(request);

        {
            let mut failures = self.leading_failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(LlmError::Unavailable("scripted failure".to_string()));
            }
        }

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::Malformed("script exhausted".to_string()))
    }
}
