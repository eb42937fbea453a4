//! Service wiring and the MCP stdio server.
//!
//! [`build_pipeline`] opens the index, loads the encoder, and creates the
//! completion client once; the resulting [`MemoryPipeline`] is shared by the
//! MCP tools and the CLI commands.

use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::ServiceExt;
use whereabouts::config::WhereaboutsConfig;
use whereabouts::db;
use whereabouts::embedding::{self, EmbeddingProvider};
use whereabouts::llm::openai::OpenAiCompatProvider;
use whereabouts::llm::CompletionProvider;
use whereabouts::memory::index::{SqliteVecIndex, VectorIndex};
use whereabouts::memory::pipeline::MemoryPipeline;

use crate::tools::WhereaboutsTools;

/// Open the index database and record/check the embedding model it was built with.
pub fn open_index(config: &WhereaboutsConfig) -> Result<SqliteVecIndex> {
    let db_path = config.resolved_db_path();
    let conn = db::open_database(&db_path)?;

    let stored_model = db::schema::record_embedding_model(&conn, &config.embedding.model)?;
    if stored_model != config.embedding.model {
        tracing::warn!(
            stored = %stored_model,
            configured = %config.embedding.model,
            "embedding model changed, existing vectors are not comparable, run `whereabouts reset` and re-ingest"
        );
    }
    tracing::info!(db = %db_path.display(), "index ready");

    Ok(SqliteVecIndex::new(conn, embedding::EMBEDDING_DIM))
}

/// Build every shared service handle and compose the pipeline.
pub fn build_pipeline(config: &WhereaboutsConfig) -> Result<Arc<MemoryPipeline>> {
    let index: Arc<dyn VectorIndex> = Arc::new(open_index(config)?);

    let provider = embedding::create_provider(&config.embedding)?;
    let embedder: Arc<dyn EmbeddingProvider> = Arc::from(provider);
    anyhow::ensure!(
        embedder.dimensions() == index.dimensions(),
        "embedding provider produces {} dimensions, index expects {}",
        embedder.dimensions(),
        index.dimensions()
    );
    tracing::info!(dimensions = embedder.dimensions(), "embedding provider ready");

    let api_key = config.api_key();
    if api_key.is_none() {
        tracing::warn!(
            env = %config.generation.api_key_env,
            "no API key set, completion requests will be sent unauthenticated"
        );
    }
    let completion: Arc<dyn CompletionProvider> = Arc::new(
        OpenAiCompatProvider::new(&config.generation, api_key)
            .context("failed to build completion client")?,
    );
    tracing::info!(
        provider = completion.name(),
        base_url = %config.generation.base_url,
        "completion client ready"
    );

    Ok(Arc::new(MemoryPipeline::new(completion, embedder, index, config)))
}

/// Start the MCP server over stdio transport.
pub async fn serve_stdio(config: WhereaboutsConfig) -> Result<()> {
    tracing::info!("starting whereabouts MCP server on stdio");

    let pipeline = build_pipeline(&config)?;
    let tools = WhereaboutsTools::new(pipeline, Arc::new(config));
    let transport = rmcp::transport::stdio();

    let server = tools.serve(transport).await?;
    tracing::info!("MCP server running, waiting for client");

    server.waiting().await?;
    tracing::info!("MCP server shut down");

    Ok(())
}
