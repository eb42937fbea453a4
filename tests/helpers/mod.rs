#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use whereabouts::config::WhereaboutsConfig;
use whereabouts::db;
use whereabouts::embedding::{EmbeddingProvider, EMBEDDING_DIM};
use whereabouts::error::{ServiceError, ServiceResult};
use whereabouts::llm::{CompletionProvider, CompletionRequest};
use whereabouts::memory::index::{IndexFilter, SqliteVecIndex, VectorIndex};
use whereabouts::memory::pipeline::MemoryPipeline;
use whereabouts::memory::types::{EvidenceResult, IndexEntry, InsightRecord, SourceType};

/// Fresh in-memory index at the production dimension.
pub fn test_index() -> SqliteVecIndex {
    let conn = db::open_memory_database().unwrap();
    SqliteVecIndex::new(conn, EMBEDDING_DIM)
}

/// Deterministic unit vector with a single spike at `seed`.
pub fn spike(seed: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; EMBEDDING_DIM];
    v[seed % EMBEDDING_DIM] = 1.0;
    v
}

pub fn record(item: &str, context: &str, owner: &str, source_type: SourceType, source_ref: &str) -> InsightRecord {
    InsightRecord {
        item: item.to_string(),
        context: context.to_string(),
        source_message: format!("{item} is on the {context}"),
        owner_id: owner.to_string(),
        source_type,
        source_ref: source_ref.to_string(),
    }
}

pub fn entry(id: &str, vector: Vec<f32>, metadata: InsightRecord) -> IndexEntry {
    IndexEntry {
        id: id.to_string(),
        vector,
        metadata,
    }
}

/// Bag-of-words embedder: each lowercase token bumps one hashed dimension.
/// The `item` / `context` labels of the query format are ignored so that
/// query and document texts share a vocabulary.
pub struct HashEmbedder;

impl HashEmbedder {
    fn bucket(token: &str) -> usize {
        // FNV-1a
        let mut hash: u64 = 0xcbf29ce484222325;
        for byte in token.bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x100000001b3);
        }
        (hash % EMBEDDING_DIM as u64) as usize
    }
}

impl EmbeddingProvider for HashEmbedder {
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let mut v = vec![0.0f32; EMBEDDING_DIM];
        let lowered = text.to_lowercase();
        for token in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty() && *t != "item" && *t != "context")
        {
            v[Self::bucket(token)] += 1.0;
        }

        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm == 0.0 {
            v[0] = 1.0;
        } else {
            for x in &mut v {
                *x /= norm;
            }
        }
        Ok(v)
    }
}

/// Completion provider that replays queued replies and records every request.
#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<ServiceResult<String>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new<I, S>(replies: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let provider = Self::default();
        provider
            .replies
            .lock()
            .unwrap()
            .extend(replies.into_iter().map(|r| Ok(r.into())));
        Arc::new(provider)
    }

    pub fn push_error(&self, message: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(ServiceError::Generation(message.to_string())));
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> ServiceResult<String> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ServiceError::Generation("no scripted reply left".into())))
    }
}

/// Wraps an index and counts query calls.
pub struct CountingIndex {
    inner: SqliteVecIndex,
    queries: AtomicUsize,
}

impl CountingIndex {
    pub fn new(inner: SqliteVecIndex) -> Self {
        Self {
            inner,
            queries: AtomicUsize::new(0),
        }
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl VectorIndex for CountingIndex {
    fn upsert(&self, entries: &[IndexEntry]) -> ServiceResult<()> {
        self.inner.upsert(entries)
    }

    fn replace_source(
        &self,
        owner_id: &str,
        source_type: SourceType,
        source_ref: &str,
        entries: &[IndexEntry],
    ) -> ServiceResult<usize> {
        self.inner.replace_source(owner_id, source_type, source_ref, entries)
    }

    fn query(&self, vector: &[f32], top_k: usize, filter: &IndexFilter) -> ServiceResult<EvidenceResult> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.inner.query(vector, top_k, filter)
    }

    fn clear_all(&self) -> ServiceResult<usize> {
        self.inner.clear_all()
    }

    fn count(&self) -> ServiceResult<usize> {
        self.inner.count()
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }
}

/// Default configuration with a throwaway database path.
pub fn test_config() -> WhereaboutsConfig {
    let mut config = WhereaboutsConfig::default();
    config.storage.db_path = ":memory:".into();
    config
}

/// Pipeline over the scripted provider, the hash embedder, and `index`.
pub fn test_pipeline(provider: Arc<ScriptedProvider>, index: Arc<CountingIndex>) -> MemoryPipeline {
    MemoryPipeline::new(provider, Arc::new(HashEmbedder), index, &test_config())
}
