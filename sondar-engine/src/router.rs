use serde_json::json;

use sondar_core::{CompletionRequest, EngineError, Intent, LlmError, Session, TableDescriptor};

use crate::engine::Engine;

impl Engine {
    /// Classifies one message as `chat` or `query`. Anything other than the
    /// literal `QUERY` resolves to chat, and empty or punctuation-only input
    /// short-circuits without a model call.
    pub(crate) async fn route(
        &self,
        question: &str,
        tables: &[TableDescriptor],
        session: &mut Session,
    ) -> Result<Intent, EngineError> {
        if is_blank(question) {
            session.log.emit(
                "router",
                "route",
                json!({"raw": "", "intent": Intent::Chat, "short_circuit": true}),
            );
            return Ok(Intent::Chat);
        }

        let prompt = self.prompts.intent_prompt(question, tables);
        let request =
            CompletionRequest::new(prompt.system, prompt.user).with_max_tokens(8);
        let raw = match self.llm.complete(request).await {
            Ok(raw) => raw,
            // An unintelligible classification defaults to chat; transport
            // failures propagate.
            Err(LlmError::Malformed(reason)) => {
                tracing::debug!(%reason, "intent defaulted to chat");
                session.log.emit(
                    "router",
                    "route",
                    json!({"raw": null, "intent": Intent::Chat, "reason": reason}),
                );
                return Ok(Intent::Chat);
            }
            Err(error) => return Err(error.into()),
        };

        let intent = if raw.trim().to_uppercase() == "QUERY" {
            Intent::Query
        } else {
            Intent::Chat
        };
        session.log.emit(
            "router",
            "route",
            json!({"raw": raw, "intent": intent, "template": prompt.template_id}),
        );
        Ok(intent)
    }
}

pub(crate) fn is_blank(question: &str) -> bool {
    question
        .chars()
        .all(|c| c.is_whitespace() || c.is_ascii_punctuation())
}
