//! MCP `ask` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct TurnParam {
    #[schemars(description = "'user' or 'assistant'")]
    pub role: String,
    pub text: String,
}

/// Parameters for the `ask` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct AskParams {
    #[schemars(description = "Natural language question, e.g. 'where did I leave my passport?'")]
    pub prompt: String,

    #[schemars(description = "Account whose memory is searched")]
    pub owner_id: String,

    #[schemars(description = "Earlier conversation turns, oldest first. Only the most recent few are used.")]
    pub history: Option<Vec<TurnParam>>,

    #[schemars(description = "Search chat-derived memories. Defaults to true.")]
    pub search_chats: Option<bool>,

    #[schemars(description = "Search image-derived memories. Defaults to true.")]
    pub search_images: Option<bool>,
}
