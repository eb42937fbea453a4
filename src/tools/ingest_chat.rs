//! MCP `ingest_chat` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct IngestChatParams {
    #[schemars(description = "Raw chat log text, one message per line")]
    pub content: String,

    #[schemars(description = "Account that owns this chat log")]
    pub owner_id: String,

    #[schemars(
        description = "Stable chat identifier. Re-ingesting the same id overwrites its previous records."
    )]
    pub source_ref: String,
}
