//! LLM-based extraction of lost-item facts.
//!
//! The model is instructed to answer in a fixed `*`-delimited grammar:
//!
//! ```text
//! * Item: [item]
//! * Context: [context]
//! * Message: [original message]
//! ```
//!
//! repeated once per fact. Parsing never fails: incomplete trailing groups are
//! dropped and counted, and a reply without any delimiter yields nothing.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::ServiceResult;
use crate::llm::{ChatMessage, CompletionProvider, CompletionRequest};

/// Field delimiter of the extraction grammar.
pub const DELIMITER: char = '*';

const INGEST_SYSTEM_PROMPT: &str = "You are an assistant that extracts key items, the location of the item, \
and the message (including timestamp) they come from in chat logs.";

const KEY_SYSTEM_PROMPT: &str = "You are an assistant that identifies the single item a user is trying to find, \
and any location or situation they mention for it.";

/// One aligned (item, context, message) triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedInsight {
    pub item: String,
    pub context: String,
    pub message: String,
}

/// Result of parsing one completion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Extraction {
    pub insights: Vec<ExtractedInsight>,
    /// Trailing groups discarded because they had fewer than three segments.
    pub dropped_groups: usize,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.insights.is_empty()
    }
}

/// Turns raw chat text or a user prompt into structured candidates.
pub struct Extractor {
    provider: Arc<dyn CompletionProvider>,
    model: String,
}

impl Extractor {
    pub fn new(provider: Arc<dyn CompletionProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Ingestion mode: extract every (item, context, message) fact in `raw_text`.
    pub async fn extract(&self, raw_text: &str) -> ServiceResult<Extraction> {
        let request = CompletionRequest::new(&self.model, INGEST_SYSTEM_PROMPT).with_message(
            ChatMessage::user(format!(
                "Extract key items, contexts, and messages from this chat log:\n{raw_text}\n\n\
                 Format as:\n* Item: [item]\n* Context: [context]\n* Message: [Original Message]"
            )),
        );

        let completion = self.provider.complete(request).await?;
        let extraction = parse_insights(&completion);

        if extraction.dropped_groups > 0 {
            warn!(
                dropped = extraction.dropped_groups,
                kept = extraction.insights.len(),
                "extraction reply ended with an incomplete group"
            );
        }
        info!(
            insights = extraction.insights.len(),
            input_len = raw_text.len(),
            "extracted insights"
        );
        Ok(extraction)
    }

    /// Query mode: reduce a user prompt to one compact key phrase.
    ///
    /// Returns an empty string when the model names no item.
    pub async fn extract_key(&self, prompt: &str) -> ServiceResult<String> {
        let request = CompletionRequest::new(&self.model, KEY_SYSTEM_PROMPT).with_message(
            ChatMessage::user(format!(
                "Identify the key item and its context in this request:\n{prompt}\n\n\
                 Format as:\n* Item: [item]\n* Context: [context]"
            )),
        );

        let completion = self.provider.complete(request).await?;
        let key = parse_key(&completion);
        debug!(key = %key, "extracted key item");
        Ok(key)
    }
}

/// Parse an ingestion-mode completion into aligned triples.
///
/// Segments after the first delimiter are consumed three at a time; a trailing
/// group with one or two segments is dropped.
pub fn parse_insights(completion: &str) -> Extraction {
    let segments: Vec<&str> = completion.split(DELIMITER).skip(1).collect();

    let mut groups = segments.chunks_exact(3);
    let insights = groups
        .by_ref()
        .map(|group| ExtractedInsight {
            item: clean_segment(group[0]),
            context: clean_segment(group[1]),
            message: clean_segment(group[2]),
        })
        .collect();

    let dropped_groups = usize::from(!groups.remainder().is_empty());
    Extraction {
        insights,
        dropped_groups,
    }
}

/// Parse a key-mode completion into `"{item} {context}"`.
///
/// A reply without any delimiter yields an empty key.
pub fn parse_key(completion: &str) -> String {
    let rest: Vec<String> = completion
        .split(DELIMITER)
        .skip(1)
        .map(clean_segment)
        .collect();

    if rest.is_empty() {
        return String::new();
    }

    let item = rest.first().cloned().unwrap_or_default();
    let context = rest.get(1).cloned().unwrap_or_default();
    match (item.is_empty(), context.is_empty()) {
        (true, _) => String::new(),
        (false, true) => item,
        (false, false) => format!("{item} {context}"),
    }
}

/// Strip a leading `Item:` / `Context:` / `Message:` label and one pair of
/// enclosing square brackets.
fn clean_segment(segment: &str) -> String {
    let mut s = segment.trim();
    for label in ["Item:", "Context:", "Message:"] {
        if let Some(rest) = strip_prefix_ignore_case(s, label) {
            s = rest.trim_start();
            break;
        }
    }
    if let Some(inner) = s.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
        s = inner;
    }
    s.trim().to_string()
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_complete_groups_in_order() {
        let reply = "Here are the items:\n\
            * Item: [keys]\n* Context: [table]\n* Message: [left my keys on the table]\n\
            * Item: [wallet]\n* Context: [car seat]\n* Message: [wallet is in the car]";
        let extraction = parse_insights(reply);
        assert_eq!(extraction.insights.len(), 2);
        assert_eq!(extraction.dropped_groups, 0);
        assert_eq!(extraction.insights[1].item, "wallet");
        assert_eq!(extraction.insights[1].context, "car seat");
        assert_eq!(extraction.insights[1].message, "wallet is in the car");
    }

    #[test]
    fn single_line_reply_matches_scenario() {
        let extraction = parse_insights(
            "* Item: [keys] * Context: [table] * Message: [left my keys on the table]",
        );
        assert_eq!(
            extraction.insights,
            vec![ExtractedInsight {
                item: "keys".into(),
                context: "table".into(),
                message: "left my keys on the table".into(),
            }]
        );
    }

    #[test]
    fn trailing_group_with_two_segments_is_dropped() {
        let extraction = parse_insights(
            "* Item: [keys] * Context: [table] * Message: [m1] * Item: [phone] * Context: [sofa]",
        );
        assert_eq!(extraction.insights.len(), 1);
        assert_eq!(extraction.dropped_groups, 1);
    }

    #[test]
    fn trailing_group_with_one_segment_is_dropped() {
        let extraction =
            parse_insights("* Item: [keys] * Context: [table] * Message: [m1] * Item: [phone]");
        assert_eq!(extraction.insights.len(), 1);
        assert_eq!(extraction.dropped_groups, 1);
    }

    #[test]
    fn reply_without_delimiter_is_empty() {
        let extraction = parse_insights("I could not find any items in this chat log.");
        assert!(extraction.is_empty());
        assert_eq!(extraction.dropped_groups, 0);
        assert!(parse_insights("").is_empty());
    }

    #[test]
    fn message_with_timestamp_keeps_inner_brackets() {
        let extraction = parse_insights(
            "* Item: [umbrella] * Context: [office] * Message: [2023-12-01 09:15:23] John: forgot it",
        );
        assert_eq!(
            extraction.insights[0].message,
            "[2023-12-01 09:15:23] John: forgot it"
        );
    }

    #[test]
    fn key_joins_item_and_context() {
        assert_eq!(
            parse_key("* Item: [passport]\n* Context: [travel]"),
            "passport travel"
        );
        assert_eq!(parse_key("* Item: [passport]\n* Context: []"), "passport");
    }

    #[test]
    fn key_without_delimiter_is_empty() {
        assert_eq!(parse_key("  Item: passport \n"), "");
        assert_eq!(parse_key("I'm sorry, I couldn't identify an item."), "");
        assert_eq!(parse_key("   "), "");
    }

    #[test]
    fn key_with_blank_item_is_empty() {
        assert_eq!(parse_key("* Item: [] * Context: [kitchen]"), "");
    }
}
