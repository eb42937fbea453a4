//! Ingestion and query flows over the five components.
//!
//! [`MemoryPipeline`] owns shared handles to the extractor, embedder, index,
//! retriever, and synthesizer. Ingestion embeds once per request and replaces
//! the source's entries in one transaction, never per record.

use std::sync::Arc;

use serde::Serialize;

use crate::config::WhereaboutsConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{ServiceError, ServiceResult};
use crate::llm::CompletionProvider;
use crate::memory::extract::{ExtractedInsight, Extractor};
use crate::memory::index::VectorIndex;
use crate::memory::retrieve::{Retrieval, RetrievalLimits, Retriever};
use crate::memory::synthesize::{SynthesisSettings, SynthesizedResponse, Synthesizer};
use crate::memory::types::{entry_id, ConversationTurn, IndexEntry, InsightRecord, SourceType};

/// Context stored for every image-derived record.
pub const IMAGE_CONTEXT: &str = "photo";

/// Outcome of one ingestion call.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub source_ref: String,
    pub ids: Vec<String>,
    pub records: Vec<InsightRecord>,
    /// Incomplete groups discarded while parsing the extraction reply.
    pub dropped_groups: usize,
}

impl IngestReport {
    pub fn stored(&self) -> usize {
        self.ids.len()
    }
}

/// Outcome of one query call: prose and the evidence behind it.
pub type AskResponse = SynthesizedResponse;

pub struct MemoryPipeline {
    extractor: Arc<Extractor>,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    retriever: Retriever,
    synthesizer: Synthesizer,
}

impl MemoryPipeline {
    /// Wire all components from shared service handles.
    pub fn new(
        completion: Arc<dyn CompletionProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        config: &WhereaboutsConfig,
    ) -> Self {
        let extractor = Arc::new(Extractor::new(
            Arc::clone(&completion),
            config.generation.extraction_model.clone(),
        ));
        let retriever = Retriever::new(
            Arc::clone(&extractor),
            Arc::clone(&embedder),
            Arc::clone(&index),
            RetrievalLimits::from(&config.retrieval),
        );
        let synthesizer = Synthesizer::new(
            completion,
            SynthesisSettings::from_config(&config.generation, &config.retrieval),
        );
        Self {
            extractor,
            embedder,
            index,
            retriever,
            synthesizer,
        }
    }

    /// Extract facts from a chat log and index them under `source_ref`.
    pub async fn ingest_chat(
        &self,
        raw_text: &str,
        owner_id: &str,
        source_ref: &str,
    ) -> ServiceResult<IngestReport> {
        let extraction = self.extractor.extract(raw_text).await?;
        let records = extraction
            .insights
            .into_iter()
            .map(|insight| to_record(insight, owner_id, SourceType::Message, source_ref))
            .collect();

        let mut report = self
            .store(records, owner_id, SourceType::Message, source_ref)
            .await?;
        report.dropped_groups = extraction.dropped_groups;
        Ok(report)
    }

    /// Index the labels an object detector found in one image.
    ///
    /// Stored as a single record: the de-duplicated labels joined by `", "`.
    /// `filename` (or the image ref) becomes the record's message.
    pub async fn ingest_image(
        &self,
        labels: &[String],
        owner_id: &str,
        image_ref: &str,
        filename: Option<&str>,
    ) -> ServiceResult<IngestReport> {
        let mut unique: Vec<&str> = Vec::new();
        for label in labels.iter().map(|l| l.trim()).filter(|l| !l.is_empty()) {
            if !unique.contains(&label) {
                unique.push(label);
            }
        }

        let records = if unique.is_empty() {
            Vec::new()
        } else {
            vec![InsightRecord {
                item: unique.join(", "),
                context: IMAGE_CONTEXT.to_string(),
                source_message: filename.unwrap_or(image_ref).to_string(),
                owner_id: owner_id.to_string(),
                source_type: SourceType::Image,
                source_ref: image_ref.to_string(),
            }]
        };
        self.store(records, owner_id, SourceType::Image, image_ref)
            .await
    }

    /// Embed a batch of records in one call and replace the source's previous
    /// entries with them in one transaction.
    async fn store(
        &self,
        records: Vec<InsightRecord>,
        owner_id: &str,
        source_type: SourceType,
        source_ref: &str,
    ) -> ServiceResult<IngestReport> {
        let vectors = if records.is_empty() {
            tracing::info!(source_ref = %source_ref, "nothing to index");
            Vec::new()
        } else {
            self.embed_records(&records).await?
        };

        let entries: Vec<IndexEntry> = records
            .iter()
            .cloned()
            .zip(vectors)
            .enumerate()
            .map(|(seq, (metadata, vector))| IndexEntry {
                id: entry_id(source_ref, seq),
                vector,
                metadata,
            })
            .collect();
        let ids: Vec<String> = entries.iter().map(|e| e.id.clone()).collect();

        let index = Arc::clone(&self.index);
        let (owner, source) = (owner_id.to_string(), source_ref.to_string());
        let replaced = tokio::task::spawn_blocking(move || {
            index.replace_source(&owner, source_type, &source, &entries)
        })
        .await??;

        tracing::info!(
            source_ref = %source_ref,
            stored = ids.len(),
            replaced,
            "indexed records"
        );
        Ok(IngestReport {
            source_ref: source_ref.to_string(),
            ids,
            records,
            dropped_groups: 0,
        })
    }

    async fn embed_records(&self, records: &[InsightRecord]) -> ServiceResult<Vec<Vec<f32>>> {
        let texts: Vec<String> = records.iter().map(InsightRecord::embedding_text).collect();
        let embedder = Arc::clone(&self.embedder);
        let vectors = tokio::task::spawn_blocking(move || {
            let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
            embedder.embed_batch(&refs)
        })
        .await?
        .map_err(|e| ServiceError::Embedding(format!("{e:#}")))?;

        if vectors.len() != records.len() {
            return Err(ServiceError::Embedding(format!(
                "encoder returned {} vectors for {} records",
                vectors.len(),
                records.len()
            )));
        }
        Ok(vectors)
    }

    /// Retrieve evidence for `prompt` and generate an answer.
    pub async fn ask(
        &self,
        prompt: &str,
        owner_id: &str,
        history: &[ConversationTurn],
        want_chat: bool,
        want_image: bool,
    ) -> ServiceResult<AskResponse> {
        let Retrieval { chat, image, .. } = self
            .retriever
            .retrieve(prompt, owner_id, want_chat, want_image)
            .await?;
        self.synthesizer.respond(prompt, history, chat, image).await
    }
}

fn to_record(
    insight: ExtractedInsight,
    owner_id: &str,
    source_type: SourceType,
    source_ref: &str,
) -> InsightRecord {
    InsightRecord {
        item: insight.item,
        context: insight.context,
        source_message: insight.message,
        owner_id: owner_id.to_string(),
        source_type,
        source_ref: source_ref.to_string(),
    }
}
