//! Read path: key-item extraction, query embedding, and per-source index lookups.

use std::sync::Arc;

use serde::Serialize;

use crate::embedding::{self, EmbeddingProvider};
use crate::error::{ServiceError, ServiceResult};
use crate::memory::extract::Extractor;
use crate::memory::index::{IndexFilter, VectorIndex};
use crate::memory::types::{EvidenceResult, SourceType};

/// Evidence gathered for one prompt. `None` means that category was not
/// requested or retrieval short-circuited.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Retrieval {
    pub key: String,
    pub chat: Option<EvidenceResult>,
    pub image: Option<EvidenceResult>,
}

/// How many matches each source type contributes.
#[derive(Debug, Clone, Copy)]
pub struct RetrievalLimits {
    pub chat_top_k: usize,
    pub image_top_k: usize,
}

impl Default for RetrievalLimits {
    fn default() -> Self {
        Self {
            chat_top_k: 3,
            image_top_k: 2,
        }
    }
}

impl From<&crate::config::RetrievalConfig> for RetrievalLimits {
    fn from(config: &crate::config::RetrievalConfig) -> Self {
        Self {
            chat_top_k: config.chat_top_k,
            image_top_k: config.image_top_k,
        }
    }
}

pub struct Retriever {
    extractor: Arc<Extractor>,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    limits: RetrievalLimits,
}

impl Retriever {
    pub fn new(
        extractor: Arc<Extractor>,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        limits: RetrievalLimits,
    ) -> Self {
        Self {
            extractor,
            embedder,
            index,
            limits,
        }
    }

    /// Retrieve chat and/or image evidence for `prompt`, scoped to `owner_id`.
    pub async fn retrieve(
        &self,
        prompt: &str,
        owner_id: &str,
        want_chat: bool,
        want_image: bool,
    ) -> ServiceResult<Retrieval> {
        if !want_chat && !want_image {
            return Ok(Retrieval::default());
        }

        // 1. Key phrase
        let key = self.extractor.extract_key(prompt).await?;
        if key.trim().is_empty() {
            tracing::info!(owner = %owner_id, "no key item in prompt, skipping retrieval");
            return Ok(Retrieval::default());
        }

        // 2. Query embedding (CPU-heavy → spawn_blocking)
        let embedder = Arc::clone(&self.embedder);
        let text = embedding::query_text(&key);
        let vector = tokio::task::spawn_blocking(move || embedder.embed(&text))
            .await?
            .map_err(|e| ServiceError::Embedding(format!("{e:#}")))?;

        // 3. Independent per-source lookups
        let chat = if want_chat {
            Some(
                self.query(vector.clone(), self.limits.chat_top_k, owner_id, SourceType::Message)
                    .await?,
            )
        } else {
            None
        };
        let image = if want_image {
            Some(
                self.query(vector, self.limits.image_top_k, owner_id, SourceType::Image)
                    .await?,
            )
        } else {
            None
        };

        tracing::info!(
            owner = %owner_id,
            key = %key,
            chat_hits = chat.as_ref().map_or(0, EvidenceResult::len),
            image_hits = image.as_ref().map_or(0, EvidenceResult::len),
            "retrieval complete"
        );

        Ok(Retrieval { key, chat, image })
    }

    async fn query(
        &self,
        vector: Vec<f32>,
        top_k: usize,
        owner_id: &str,
        source_type: SourceType,
    ) -> ServiceResult<EvidenceResult> {
        let index = Arc::clone(&self.index);
        let filter = IndexFilter::new(owner_id, source_type);
        tokio::task::spawn_blocking(move || index.query(&vector, top_k, &filter)).await?
    }
}
