//! MCP `ingest_image` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `ingest_image` MCP tool.
///
/// Object detection runs upstream; only its labels are indexed here.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct IngestImageParams {
    #[schemars(description = "Item labels detected in the image (e.g. ['keys', 'cup'])")]
    pub labels: Vec<String>,

    #[schemars(description = "Account that owns this image")]
    pub owner_id: String,

    #[schemars(description = "Stable image identifier")]
    pub image_ref: String,

    #[schemars(description = "Optional original filename, shown back to the user as evidence")]
    pub filename: Option<String>,
}
