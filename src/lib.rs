//! ragline - the retrieval core of a RAG pipeline.
//!
//! ragline loads a persisted vector database (text chunks, their embeddings
//! and per-record metadata), matches a query embedding against it by cosine
//! similarity, optionally reranks the candidates with a secondary per-record
//! embedding, and returns ranked `(chunk, score, metadata)` triples with
//! provenance.
//!
//! # Quick start
//!
//! ```no_run
//! use std::path::Path;
//!
//! use ragline::{embedder, Retriever, RetrieverConfig};
//!
//! let model = embedder::create("gte-moderncolbert").unwrap();
//! let config = RetrieverConfig { top_k: 3, best_k: 1, reranking: true };
//! let retriever = Retriever::new(config, model, Path::new("database.json")).unwrap();
//!
//! let result = retriever.retrieve("how do I configure the serial console?").unwrap();
//! for ((chunk, score), meta) in result.chunks.iter().zip(&result.scores).zip(&result.metadata) {
//!     println!("[{score:.3}] {} ({})", chunk, meta.source);
//! }
//! ```

pub mod cli;
pub mod data_dir;
pub mod database;
pub mod embedder;
pub mod engine;
pub mod error;
pub mod filter;
pub mod matcher;
pub mod reranker;

pub use data_dir::DataDir;
pub use database::{Database, EmbeddingMatrix, RecordMeta, VectorIndex};
pub use embedder::Embedder;
pub use engine::{Retrieval, Retriever, RetrieverConfig};
pub use error::{Error, Result};
