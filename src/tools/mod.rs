pub mod ask;
pub mod ingest_chat;
pub mod ingest_image;

use ask::{AskParams, TurnParam};
use ingest_chat::IngestChatParams;
use ingest_image::IngestImageParams;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use std::sync::Arc;

use whereabouts::config::WhereaboutsConfig;
use whereabouts::memory::pipeline::MemoryPipeline;
use whereabouts::memory::types::{ConversationTurn, Role};

/// The whereabouts MCP tool handler. Holds the shared pipeline and config and
/// exposes the ingestion and query flows via the `#[tool_router]` macro.
#[derive(Clone)]
pub struct WhereaboutsTools {
    tool_router: ToolRouter<Self>,
    pipeline: Arc<MemoryPipeline>,
    config: Arc<WhereaboutsConfig>,
}

#[tool_router]
impl WhereaboutsTools {
    pub fn new(pipeline: Arc<MemoryPipeline>, config: Arc<WhereaboutsConfig>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            pipeline,
            config,
        }
    }

    /// Extract lost-item facts from a chat log and index them.
    #[tool(description = "Ingest a chat log. Extracts items, where they were, and the message that mentioned them, then indexes them for the owner. Re-ingesting the same source_ref replaces its earlier entries.")]
    async fn ingest_chat(
        &self,
        Parameters(params): Parameters<IngestChatParams>,
    ) -> Result<String, String> {
        if params.content.trim().is_empty() {
            return Err("content must not be empty".into());
        }
        require_non_empty("owner_id", &params.owner_id)?;
        require_non_empty("source_ref", &params.source_ref)?;

        tracing::info!(
            content_len = params.content.len(),
            owner = %params.owner_id,
            source_ref = %params.source_ref,
            "ingest_chat called"
        );

        let report = self
            .pipeline
            .ingest_chat(&params.content, &params.owner_id, &params.source_ref)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "chat ingestion failed");
                "processing failed".to_string()
            })?;

        serde_json::to_string(&report).map_err(|e| format!("serialization failed: {e}"))
    }

    /// Index the object labels detected in a photo.
    #[tool(description = "Ingest an image's detected object labels so the items can be found later.")]
    async fn ingest_image(
        &self,
        Parameters(params): Parameters<IngestImageParams>,
    ) -> Result<String, String> {
        require_non_empty("owner_id", &params.owner_id)?;
        require_non_empty("image_ref", &params.image_ref)?;

        tracing::info!(
            labels = params.labels.len(),
            owner = %params.owner_id,
            image_ref = %params.image_ref,
            "ingest_image called"
        );

        let report = self
            .pipeline
            .ingest_image(
                &params.labels,
                &params.owner_id,
                &params.image_ref,
                params.filename.as_deref(),
            )
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "image ingestion failed");
                "processing failed".to_string()
            })?;

        serde_json::to_string(&report).map_err(|e| format!("serialization failed: {e}"))
    }

    /// Answer a question about where an item is, with the evidence used.
    #[tool(description = "Ask where an item might be. Searches the owner's chat and image memories and returns an answer plus the matching evidence.")]
    async fn ask(&self, Parameters(params): Parameters<AskParams>) -> Result<String, String> {
        if params.prompt.trim().is_empty() {
            return Err("prompt must not be empty".into());
        }
        require_non_empty("owner_id", &params.owner_id)?;

        let history = params
            .history
            .unwrap_or_default()
            .into_iter()
            .map(to_turn)
            .collect::<Result<Vec<_>, String>>()?;

        tracing::info!(
            owner = %params.owner_id,
            history = history.len(),
            history_window = self.config.retrieval.history_turns,
            "ask called"
        );

        let response = self
            .pipeline
            .ask(
                &params.prompt,
                &params.owner_id,
                &history,
                params.search_chats.unwrap_or(true),
                params.search_images.unwrap_or(true),
            )
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "query failed");
                "no results".to_string()
            })?;

        serde_json::to_string(&response).map_err(|e| format!("serialization failed: {e}"))
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field} must not be empty"));
    }
    Ok(())
}

fn to_turn(param: TurnParam) -> Result<ConversationTurn, String> {
    let role: Role = param.role.parse()?;
    Ok(ConversationTurn {
        role,
        text: param.text,
    })
}

#[tool_handler]
impl ServerHandler for WhereaboutsTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "whereabouts remembers where things were left. Use ingest_chat and ingest_image \
                 to add memories, and ask to find an item."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
