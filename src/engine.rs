use std::{path::Path, sync::Arc, time::Instant};

use crate::{
    database::{Database, RecordMeta},
    embedder::Embedder,
    error::{Error, Result},
    filter, matcher, reranker,
};

/// Retrieval parameters, fixed at construction.
#[derive(Debug, Clone, Copy)]
pub struct RetrieverConfig {
    /// Size of the first-stage candidate pool.
    pub top_k: usize,
    /// Number of results returned, `best_k <= top_k`.
    pub best_k: usize,
    /// Whether to re-score candidates with the per-record reranking vector.
    pub reranking: bool,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            best_k: 1,
            reranking: true,
        }
    }
}

/// The result of one query: three index-aligned vectors of length `best_k`.
#[derive(Debug)]
pub struct Retrieval {
    pub chunks: Vec<String>,
    pub scores: Vec<f32>,
    pub metadata: Vec<Arc<RecordMeta>>,
}

/// The retrieval engine: loads a vector database once, then serves queries
/// over it.
///
/// Construction fails fast on invalid configuration, a missing or malformed
/// database, or an embedding-model mismatch; a `Retriever` never exists with
/// an inconsistent database. After construction everything except the
/// embedder's own inference state is read-only, so one instance can serve
/// queries from multiple threads.
pub struct Retriever {
    config: RetrieverConfig,
    embedder: Box<dyn Embedder>,
    database: Database,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("config", &self.config)
            .field("embedder", &self.embedder.identity())
            .finish_non_exhaustive()
    }
}

impl Retriever {
    pub fn new(
        config: RetrieverConfig,
        embedder: Box<dyn Embedder>,
        database_path: &Path,
    ) -> Result<Self> {
        if config.top_k == 0 {
            return Err(Error::Config("top_k must be at least 1".to_string()));
        }
        if config.best_k == 0 {
            return Err(Error::Config("best_k must be at least 1".to_string()));
        }
        if config.best_k > config.top_k {
            return Err(Error::Config(format!(
                "best_k ({}) must be less than or equal to top_k ({})",
                config.best_k, config.top_k
            )));
        }

        let database = Database::load(database_path)?;
        database.verify_model(embedder.identity())?;

        if config.top_k > database.index().len() {
            return Err(Error::Config(format!(
                "top_k ({}) exceeds the number of indexed chunks ({})",
                config.top_k,
                database.index().len()
            )));
        }

        if let Some(description) = database.description() {
            tracing::info!(%description, "database ready");
        }

        Ok(Self {
            config,
            embedder,
            database,
        })
    }

    /// Retrieve the `best_k` most relevant chunks for a query.
    ///
    /// Pipeline: content filter, query encoding, first-stage top-k over the
    /// whole index, then either the rerank pass or a prefix truncation of the
    /// first-stage order. Deterministic for identical inputs.
    pub fn retrieve(&self, query: &str) -> Result<Retrieval> {
        let started = Instant::now();

        if filter::is_blocked(query) {
            tracing::debug!("query blocked by content filter");
            return Ok(self.censored_placeholder());
        }

        let query_embedding = self.embedder.encode(query)?;

        let candidates =
            matcher::find_top_k(self.database.index(), &query_embedding, self.config.top_k)?;

        // With best_k == top_k there is nothing to discard, so the rerank
        // flag makes no difference to the output.
        let best = if self.config.best_k < self.config.top_k {
            if self.config.reranking {
                reranker::rerank(
                    self.database.index(),
                    &candidates,
                    &query_embedding,
                    self.config.best_k,
                )?
            } else {
                candidates[..self.config.best_k].to_vec()
            }
        } else {
            candidates
        };

        let index = self.database.index();
        let retrieval = Retrieval {
            chunks: best.iter().map(|m| index.chunk(m.index).to_string()).collect(),
            scores: best.iter().map(|m| m.score).collect(),
            metadata: best.iter().map(|m| Arc::clone(index.meta(m.index))).collect(),
        };

        tracing::debug!(
            latency_ms = started.elapsed().as_millis() as u64,
            results = retrieval.chunks.len(),
            scores = ?retrieval.scores,
            sources = ?retrieval
                .metadata
                .iter()
                .map(|m| m.source.as_str())
                .collect::<Vec<_>>(),
            "retrieval complete"
        );

        Ok(retrieval)
    }

    /// Placeholder results for content-filtered queries: empty chunks, zero
    /// scores, `source = "censored_queries"`. The embedder and matcher are
    /// never touched.
    fn censored_placeholder(&self) -> Retrieval {
        let meta = Arc::new(RecordMeta::censored());
        Retrieval {
            chunks: vec![String::new(); self.config.best_k],
            scores: vec![0.0; self.config.best_k],
            metadata: vec![meta; self.config.best_k],
        }
    }
}
