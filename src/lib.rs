//! Lost-item memory: where did I leave it?
//!
//! whereabouts turns chat transcripts and photo detection labels into a
//! searchable memory of items and where they were last mentioned or seen, and
//! answers natural-language questions about them with retrieved evidence and
//! generated prose.
//!
//! # Pipelines
//!
//! | Flow | Steps |
//! |------|-------|
//! | **Ingestion** | raw chat → extractor (LLM) → `item context` texts → CLIP embeddings → index upsert |
//! | **Query** | prompt → key item (LLM) → query embedding → per-owner index lookups → synthesizer (LLM) |
//!
//! # Architecture
//!
//! - **Generation**: any OpenAI-compatible `/chat/completions` endpoint
//! - **Embeddings**: local ONNX Runtime with the CLIP ViT-B/32 text tower (512 dimensions)
//! - **Index**: SQLite with [sqlite-vec](https://github.com/asg017/sqlite-vec) cosine distance,
//!   filtered by owner and source type before ranking
//! - **Transport**: MCP over stdio, plus a CLI
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from TOML files and environment variables
//! - [`db`]: SQLite database initialization, schema, and health checks
//! - [`embedding`]: Text-to-vector embedding pipeline via ONNX Runtime
//! - [`error`]: The [`error::ServiceError`] taxonomy
//! - [`llm`]: Completion provider trait and HTTP client
//! - [`memory`]: Extractor, index, retriever, synthesizer, and the pipeline that joins them

pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod llm;
pub mod memory;
