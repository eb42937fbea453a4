//! Response synthesis: history window, evidence formatting, and template selection.
//!
//! Exactly one completion call per response. The final user message is chosen
//! by [`build_user_message`] from the [`EvidencePresence`] of the two
//! evidence categories; everything else in the request is fixed.

use std::fmt::Write as _;
use std::sync::Arc;

use serde::Serialize;

use crate::config::{GenerationConfig, RetrievalConfig};
use crate::error::ServiceResult;
use crate::llm::{ChatMessage, CompletionProvider, CompletionRequest};
use crate::memory::types::{ConversationTurn, EvidenceResult, Role};

/// System persona sent with every response request.
pub const PERSONA_PROMPT: &str = "You are a friendly assistant that helps people figure out where they left \
their belongings. You are given snippets retrieved from the user's own chat messages and photos. \
Answer conversationally and briefly, quote the relevant message when one is found, and never invent \
locations that the snippets do not support.";

/// Which evidence categories carry at least one match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidencePresence {
    Both,
    ChatOnly,
    ImageOnly,
    Neither,
}

impl EvidencePresence {
    /// Classify evidence; `None` and an empty result both count as absent.
    pub fn of(chat: Option<&EvidenceResult>, image: Option<&EvidenceResult>) -> Self {
        let has = |e: Option<&EvidenceResult>| e.is_some_and(|r| !r.is_empty());
        match (has(chat), has(image)) {
            (true, true) => Self::Both,
            (true, false) => Self::ChatOnly,
            (false, true) => Self::ImageOnly,
            (false, false) => Self::Neither,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Both => "both",
            Self::ChatOnly => "chat_only",
            Self::ImageOnly => "image_only",
            Self::Neither => "neither",
        }
    }
}

/// The generated prose plus the evidence it was grounded on.
#[derive(Debug, Clone, Serialize)]
pub struct SynthesizedResponse {
    pub text: String,
    pub presence: EvidencePresence,
    pub chat_evidence: Option<EvidenceResult>,
    pub image_evidence: Option<EvidenceResult>,
}

/// Sampling and windowing knobs for synthesis.
#[derive(Debug, Clone)]
pub struct SynthesisSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub history_turns: usize,
}

impl SynthesisSettings {
    pub fn from_config(generation: &GenerationConfig, retrieval: &RetrievalConfig) -> Self {
        Self {
            model: generation.response_model.clone(),
            temperature: generation.temperature,
            max_tokens: generation.max_tokens,
            top_p: generation.top_p,
            history_turns: retrieval.history_turns,
        }
    }
}

pub struct Synthesizer {
    provider: Arc<dyn CompletionProvider>,
    settings: SynthesisSettings,
}

impl Synthesizer {
    pub fn new(provider: Arc<dyn CompletionProvider>, settings: SynthesisSettings) -> Self {
        Self { provider, settings }
    }

    pub async fn respond(
        &self,
        prompt: &str,
        history: &[ConversationTurn],
        chat_evidence: Option<EvidenceResult>,
        image_evidence: Option<EvidenceResult>,
    ) -> ServiceResult<SynthesizedResponse> {
        let presence = EvidencePresence::of(chat_evidence.as_ref(), image_evidence.as_ref());
        let request = self.build_request(
            prompt,
            history,
            chat_evidence.as_ref(),
            image_evidence.as_ref(),
        );

        tracing::info!(
            branch = presence.as_str(),
            history = request.messages.len() - 1,
            "synthesizing response"
        );

        let text = self.provider.complete(request).await?;

        Ok(SynthesizedResponse {
            text,
            presence,
            chat_evidence,
            image_evidence,
        })
    }

    /// Assemble the full completion request without sending it.
    pub fn build_request(
        &self,
        prompt: &str,
        history: &[ConversationTurn],
        chat: Option<&EvidenceResult>,
        image: Option<&EvidenceResult>,
    ) -> CompletionRequest {
        let mut request = CompletionRequest::new(&self.settings.model, PERSONA_PROMPT);
        request.temperature = self.settings.temperature;
        request.max_tokens = Some(self.settings.max_tokens);
        request.top_p = Some(self.settings.top_p);

        request
            .messages
            .extend(recent_turns(history, self.settings.history_turns).iter().map(turn_message));

        let presence = EvidencePresence::of(chat, image);
        request
            .messages
            .push(ChatMessage::user(build_user_message(presence, prompt, chat, image)));
        request
    }
}

/// The last `n` turns, in their original order.
pub fn recent_turns(history: &[ConversationTurn], n: usize) -> &[ConversationTurn] {
    &history[history.len().saturating_sub(n)..]
}

fn turn_message(turn: &ConversationTurn) -> ChatMessage {
    match turn.role {
        Role::User => ChatMessage::user(turn.text.clone()),
        Role::Assistant => ChatMessage::assistant(turn.text.clone()),
    }
}

/// Select and fill the final user-role message for `presence`.
pub fn build_user_message(
    presence: EvidencePresence,
    prompt: &str,
    chat: Option<&EvidenceResult>,
    image: Option<&EvidenceResult>,
) -> String {
    let chat_block = chat.map(format_chat_evidence).unwrap_or_default();
    let image_block = image.map(format_image_evidence).unwrap_or_default();

    match presence {
        EvidencePresence::Both => format!(
            "Items were found in the user's photos and messages.\n\n\
             Photos:\n{image_block}\n\
             Messages:\n{chat_block}\n\
             Using both, tell the user where the item most likely is. \
             Mention which photo items and which message support the answer.\n\n\
             User: {prompt}"
        ),
        EvidencePresence::ChatOnly => format!(
            "These messages from the user's chats may mention the item:\n{chat_block}\n\
             Tell the user conversationally what was found, quoting the most relevant \
             message and where it says the item was.\n\n\
             User: {prompt}"
        ),
        EvidencePresence::ImageOnly => format!(
            "These photos from the user's library contain possibly matching items:\n{image_block}\n\
             Tell the user conversationally which photo shows the item and what else \
             was detected in it, as a hint to where it was taken.\n\n\
             User: {prompt}"
        ),
        EvidencePresence::Neither => format!(
            "No messages or images matching the request were found in the user's memory. \
             Respond helpfully to the prompt without claiming to know where the item is, \
             and suggest places people commonly leave such things.\n\n\
             User: {prompt}"
        ),
    }
}

fn format_chat_evidence(evidence: &EvidenceResult) -> String {
    let mut out = String::new();
    for (i, record) in evidence.records().enumerate() {
        let _ = writeln!(
            out,
            "{}. Item: {} | Context: {} | Message: \"{}\"",
            i + 1,
            record.item,
            record.context,
            record.source_message
        );
    }
    out
}

fn format_image_evidence(evidence: &EvidenceResult) -> String {
    let mut out = String::new();
    for (i, record) in evidence.records().enumerate() {
        let _ = writeln!(
            out,
            "{}. Photo {}: detected items: {}",
            i + 1,
            record.source_message,
            record.item
        );
    }
    out
}
