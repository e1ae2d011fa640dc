use std::time::Duration;

use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use sondar_core::{ChatCompletion, CompletionRequest, LlmError, Message};

/// Client for any provider speaking the OpenAI chat-completions wire format.
#[derive(Clone)]
pub struct HttpChatClient {
    base_url: String,
    api_key: SecretString,
    model: String,
    http: Client,
    timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct HttpChatClientBuilder {
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl HttpChatClient {
    pub fn builder(base_url: impl Into<String>) -> HttpChatClientBuilder {
        HttpChatClientBuilder {
            base_url: base_url.into(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

impl HttpChatClientBuilder {
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<HttpChatClient, LlmError> {
        let http = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| LlmError::Unavailable(e.to_string()))?;
        Ok(HttpChatClient {
            base_url: self.base_url.trim_end_matches('/').to_string(),
            api_key: SecretString::new(self.api_key),
            model: self.model,
            http,
            timeout: self.timeout,
        })
    }
}

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: Vec<String>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    content: Option<String>,
}

#[async_trait::async_trait]
impl ChatCompletion for HttpChatClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let body = WireRequest {
            model: &self.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stop: request.stop.clone(),
            stream: false,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    LlmError::Timeout(self.timeout)
                } else {
                    LlmError::Unavailable(err.to_string())
                }
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::RateLimited(truncate(&body, 200)));
        }
        if status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Unavailable(format!(
                "HTTP {status}: {}",
                truncate(&body, 200)
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Malformed(format!(
                "HTTP {status}: {}",
                truncate(&body, 200)
            )));
        }

        let parsed: WireResponse = response
            .json()
            .await
            .map_err(|err| LlmError::Malformed(err.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::Malformed("response carried no choices".to_string()))?;

        tracing::debug!(bytes = content.len(), "chat completion received");
        Ok(content)
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        text.to_string()
    } else {
        let mut end = max;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text[..end].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn request() -> CompletionRequest {
        CompletionRequest::new("system", "user question")
    }

    #[tokio::test]
    async fn returns_first_choice_content() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200).json_body(json!({
                "choices": [{"message": {"role": "assistant", "content": "SELECT 1"}}]
            }));
        });

        let client = HttpChatClient::builder(server.base_url())
            .api_key("test-key")
            .build()
            .unwrap();
        let content = client.complete(request()).await.unwrap();
        assert_eq!(content, "SELECT 1");
        mock.assert();
    }

    #[tokio::test]
    async fn maps_429_to_rate_limited() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(429).body("slow down");
        });

        let client = HttpChatClient::builder(server.base_url()).build().unwrap();
        let err = client.complete(request()).await.unwrap_err();
        assert!(matches!(err, LlmError::RateLimited(_)));
        assert!(err.is_retriable());
    }

    #[tokio::test]
    async fn maps_500_to_unavailable() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(503).body("down");
        });

        let client = HttpChatClient::builder(server.base_url()).build().unwrap();
        let err = client.complete(request()).await.unwrap_err();
        assert!(matches!(err, LlmError::Unavailable(_)));
    }

    #[tokio::test]
    async fn empty_choices_is_malformed() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200).json_body(json!({"choices": []}));
        });

        let client = HttpChatClient::builder(server.base_url()).build().unwrap();
        let err = client.complete(request()).await.unwrap_err();
        assert!(matches!(err, LlmError::Malformed(_)));
        assert!(!err.is_retriable());
    }
}
