mod backoff;
mod http;
mod scripted;

pub use backoff::Backoff;
pub use http::{HttpChatClient, HttpChatClientBuilder};
pub use scripted::ScriptedClient;
pub use sondar_core::{ChatCompletion, CompletionRequest, LlmError, Message, Role};
