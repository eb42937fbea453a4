//! Core record type definitions.
//!
//! Defines [`SourceType`] (where a fact came from), [`InsightRecord`] (one
//! extracted fact ready for indexing), [`IndexEntry`] (the persisted unit),
//! [`ConversationTurn`] (chat history passed to synthesis), and the
//! [`EvidenceResult`] returned by index queries.

use serde::{Deserialize, Serialize};

/// Origin of an indexed fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Extracted from a chat transcript.
    Message,
    /// Derived from object-detection labels on a photo.
    Image,
}

impl SourceType {
    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Image => "image",
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "message" => Ok(Self::Message),
            "image" => Ok(Self::Image),
            _ => Err(format!("unknown source type: {s}")),
        }
    }
}

/// One extracted fact, scoped to an owner and tied back to its source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightRecord {
    /// Short noun phrase naming the item (e.g. `"keys"`).
    pub item: String,
    /// Location or situation phrase (e.g. `"kitchen table"`).
    pub context: String,
    /// Verbatim text the fact was extracted from.
    #[serde(rename = "message")]
    pub source_message: String,
    pub owner_id: String,
    pub source_type: SourceType,
    /// Chat id or image id supplied by the relational layer.
    pub source_ref: String,
}

impl InsightRecord {
    /// Text fed to the embedder at ingestion time: item and context joined by one space.
    pub fn embedding_text(&self) -> String {
        crate::embedding::document_text(&self.item, &self.context)
    }
}

/// The persisted unit: one record, its vector, and a stable id.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    /// `"{source_ref}_{seq}"`, see [`entry_id`].
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: InsightRecord,
}

/// Build the index id for the `seq`-th record of a batch from `source_ref`.
pub fn entry_id(source_ref: &str, seq: usize) -> String {
    format!("{source_ref}_{seq}")
}

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" | "bot" => Ok(Self::Assistant),
            _ => Err(format!("unknown role: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// A single ranked hit from an index query.
#[derive(Debug, Clone, Serialize)]
pub struct EvidenceMatch {
    pub id: String,
    /// Cosine similarity in `[-1.0, 1.0]`, higher is closer.
    pub score: f64,
    pub metadata: InsightRecord,
}

/// Ranked matches, ordered by descending score, at most `top_k` long.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EvidenceResult {
    pub matches: Vec<EvidenceMatch>,
}

impl EvidenceResult {
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    /// Iterate over the matched records, best first.
    pub fn records(&self) -> impl Iterator<Item = &InsightRecord> {
        self.matches.iter().map(|m| &m.metadata)
    }
}
