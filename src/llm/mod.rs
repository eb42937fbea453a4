//! Generative completion interface.
//!
//! [`CompletionProvider`] is the only shape the extractor and synthesizer
//! assume. [`openai::OpenAiCompatProvider`] talks to any OpenAI-compatible
//! `/chat/completions` endpoint.

pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ServiceResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
        }
    }
}

/// One completion call. `system_prompt` is sent ahead of `messages`.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub system_prompt: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f32>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_prompt: system_prompt.into(),
            messages: Vec::new(),
            temperature: 0.0,
            max_tokens: None,
            top_p: None,
        }
    }

    pub fn with_message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    /// Full message list as sent on the wire, system prompt first.
    pub fn wire_messages(&self) -> Vec<ChatMessage> {
        let mut out = Vec::with_capacity(self.messages.len() + 1);
        if !self.system_prompt.is_empty() {
            out.push(ChatMessage::system(self.system_prompt.clone()));
        }
        out.extend(self.messages.iter().cloned());
        out
    }
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Provider name for logs (e.g. `"openai-compat"`).
    fn name(&self) -> &str;

    /// Run one non-streaming completion and return the text of the first choice.
    async fn complete(&self, request: CompletionRequest) -> ServiceResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_messages_put_system_prompt_first() {
        let request = CompletionRequest::new("m", "be helpful")
            .with_message(ChatMessage::user("hi"))
            .with_message(ChatMessage::assistant("hello"));
        let wire = request.wire_messages();
        assert_eq!(wire.len(), 3);
        assert_eq!(wire[0].role, "system");
        assert_eq!(wire[0].content, "be helpful");
        assert_eq!(wire[2].role, "assistant");
    }

    #[test]
    fn empty_system_prompt_is_omitted() {
        let request = CompletionRequest::new("m", "").with_message(ChatMessage::user("hi"));
        assert_eq!(request.wire_messages().len(), 1);
    }
}
