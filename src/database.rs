use std::{fs, path::Path, sync::Arc};

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Reserved top-level keys that describe the database rather than records.
const KEY_EMBEDDING_MODEL: &str = "embedding_model";
const KEY_DESCRIPTION: &str = "database_description";
const KEY_GENERATOR_FILES: &str = "database_generator_files";

/// Per-record fields consumed during flattening.
const FIELD_CHUNKS: &str = "chunks";
const FIELD_EMBEDDINGS: &str = "embeddings";
const FIELD_RERANKING: &str = "reranking_embedding";
const FIELD_SOURCE: &str = "source";

/// Metadata shared by every chunk of one record.
///
/// All chunks flattened out of a record hold `Arc` clones of a single
/// `RecordMeta`, so the reranking vector is stored once per record and
/// never copied per chunk.
#[derive(Debug, Clone)]
pub struct RecordMeta {
    pub source: String,
    /// Secondary embedding used only by the rerank pass.
    pub rerank_embedding: Option<Vec<f32>>,
    /// Remaining free-form record fields, preserved as parsed.
    pub extra: Map<String, Value>,
}

impl RecordMeta {
    /// Placeholder metadata returned for content-filtered queries.
    pub fn censored() -> Self {
        Self {
            source: "censored_queries".to_string(),
            rerank_embedding: None,
            extra: Map::new(),
        }
    }

    /// Render as a JSON object for output. The reranking vector is an
    /// internal scoring signal and is not included.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert(FIELD_SOURCE.to_string(), Value::String(self.source.clone()));
        for (k, v) in &self.extra {
            map.insert(k.clone(), v.clone());
        }
        Value::Object(map)
    }
}

/// A dense row-major matrix of embeddings.
///
/// Row i holds the embedding of chunk i: `data[i * dim .. (i + 1) * dim]`.
#[derive(Debug, Clone)]
pub struct EmbeddingMatrix {
    rows: usize,
    dim: usize,
    data: Vec<f32>,
}

impl EmbeddingMatrix {
    fn new(dim: usize) -> Self {
        Self {
            rows: 0,
            dim,
            data: Vec::new(),
        }
    }

    fn push_row(&mut self, row: &[f32]) -> Result<()> {
        if row.len() != self.dim {
            return Err(Error::DimensionMismatch {
                expected: self.dim,
                found: row.len(),
            });
        }
        self.data.extend_from_slice(row);
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Get the embedding vector for a specific row.
    pub fn row(&self, i: usize) -> &[f32] {
        let start = i * self.dim;
        &self.data[start..start + self.dim]
    }
}

/// The flattened, index-aligned view the retrieval engine operates on.
///
/// Invariant: `chunks.len() == embeddings.rows() == metadata.len()`.
/// Built once at load time and read-only afterwards.
#[derive(Debug)]
pub struct VectorIndex {
    chunks: Vec<String>,
    embeddings: EmbeddingMatrix,
    metadata: Vec<Arc<RecordMeta>>,
}

impl VectorIndex {
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.embeddings.dim()
    }

    pub fn chunk(&self, i: usize) -> &str {
        &self.chunks[i]
    }

    pub fn meta(&self, i: usize) -> &Arc<RecordMeta> {
        &self.metadata[i]
    }

    pub fn embeddings(&self) -> &EmbeddingMatrix {
        &self.embeddings
    }
}

/// A loaded vector database: descriptive header fields plus the flattened
/// chunk index.
#[derive(Debug)]
pub struct Database {
    embedding_model: Option<String>,
    description: Option<String>,
    generator_files: Vec<String>,
    index: VectorIndex,
}

impl Database {
    /// Load and flatten a vector database from a JSON file.
    ///
    /// Reserved top-level keys (`embedding_model`, `database_description`,
    /// `database_generator_files`) are split off first; every remaining key
    /// is treated as a record. A corrupted database never partially loads.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::NotFound {
                path: path.to_path_buf(),
            });
        }

        let raw = fs::read_to_string(path)?;
        let mut root: Map<String, Value> = serde_json::from_str(&raw)?;

        let embedding_model = take_string(&mut root, KEY_EMBEDDING_MODEL);
        let description = take_string(&mut root, KEY_DESCRIPTION);
        let generator_files = match root.shift_remove(KEY_GENERATOR_FILES) {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };

        let index = flatten_records(root)?;

        tracing::debug!(
            chunks = index.len(),
            dim = index.dim(),
            "vector database loaded"
        );

        Ok(Self {
            embedding_model,
            description,
            generator_files,
            index,
        })
    }

    /// Check the stored embedding-model identity against the active one.
    ///
    /// A mismatch is fatal: similarities computed across two vector spaces
    /// are meaningless. A database with no stored identity is accepted with
    /// a warning.
    pub fn verify_model(&self, active: &str) -> Result<()> {
        match self.embedding_model.as_deref() {
            Some(stored) if stored != active => Err(Error::IncompatibleModel {
                stored: stored.to_string(),
                active: active.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                tracing::warn!(
                    "database does not record which embedding model generated it; \
                     compatibility cannot be verified"
                );
                Ok(())
            }
        }
    }

    pub fn embedding_model(&self) -> Option<&str> {
        self.embedding_model.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn generator_files(&self) -> &[String] {
        &self.generator_files
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }
}

// shift_remove, not remove: with `preserve_order` a plain remove is a
// swap-remove, which would scramble record order.
fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    match map.shift_remove(key) {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

/// Flatten records into the parallel chunk/embedding/metadata containers,
/// preserving stored record order and within-record chunk order.
fn flatten_records(records: Map<String, Value>) -> Result<VectorIndex> {
    let mut chunks = Vec::new();
    let mut metadata: Vec<Arc<RecordMeta>> = Vec::new();
    let mut embeddings: Option<EmbeddingMatrix> = None;

    for (id, value) in records {
        let Value::Object(mut record) = value else {
            return Err(Error::malformed(&id, "record is not an object"));
        };

        let record_chunks = match record.shift_remove(FIELD_CHUNKS) {
            Some(Value::Array(items)) => {
                let mut texts = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(s) => texts.push(s),
                        _ => {
                            return Err(Error::malformed(&id, "`chunks` entry is not a string"));
                        }
                    }
                }
                texts
            }
            Some(_) => return Err(Error::malformed(&id, "`chunks` is not an array")),
            None => return Err(Error::malformed(&id, "missing `chunks` field")),
        };

        let record_embeddings = match record.shift_remove(FIELD_EMBEDDINGS) {
            Some(Value::Array(rows)) => {
                let mut parsed = Vec::with_capacity(rows.len());
                for row in &rows {
                    parsed.push(parse_vector(row).ok_or_else(|| {
                        Error::malformed(&id, "`embeddings` entry is not a numeric array")
                    })?);
                }
                parsed
            }
            Some(_) => return Err(Error::malformed(&id, "`embeddings` is not an array")),
            None => return Err(Error::malformed(&id, "missing `embeddings` field")),
        };

        if record_chunks.len() != record_embeddings.len() {
            return Err(Error::malformed(
                &id,
                format!(
                    "{} chunks but {} embeddings",
                    record_chunks.len(),
                    record_embeddings.len()
                ),
            ));
        }

        let rerank_embedding = match record.shift_remove(FIELD_RERANKING) {
            Some(row) => Some(
                parse_vector(&row)
                    .ok_or_else(|| Error::malformed(&id, "`reranking_embedding` is not a numeric array"))?,
            ),
            None => None,
        };

        let source = take_string(&mut record, FIELD_SOURCE).unwrap_or_else(|| "unknown".to_string());

        let meta = Arc::new(RecordMeta {
            source,
            rerank_embedding,
            extra: record,
        });

        for (chunk, embedding) in record_chunks.into_iter().zip(record_embeddings) {
            // Dimension is fixed by the first row seen; any drift is rejected.
            let matrix = embeddings.get_or_insert_with(|| EmbeddingMatrix::new(embedding.len()));
            matrix.push_row(&embedding)?;
            chunks.push(chunk);
            metadata.push(Arc::clone(&meta));
        }
    }

    Ok(VectorIndex {
        embeddings: embeddings.unwrap_or_else(|| EmbeddingMatrix::new(0)),
        chunks,
        metadata,
    })
}

fn parse_vector(value: &Value) -> Option<Vec<f32>> {
    let Value::Array(items) = value else {
        return None;
    };
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        out.push(item.as_f64()? as f32);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use serde_json::json;

    use super::*;

    fn write_db(value: &Value) -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("database.json");
        fs::write(&path, serde_json::to_string(value).unwrap()).unwrap();
        (tmp, path)
    }

    fn sample_db() -> Value {
        json!({
            "embedding_model": "test-model/v1",
            "database_description": "unit test fixture",
            "database_generator_files": ["a.md", "b.md"],
            "rec-a": {
                "chunks": ["cats are mammals", "cats purr"],
                "embeddings": [[1.0, 0.0], [0.8, 0.6]],
                "reranking_embedding": [1.0, 0.0],
                "source": "cats.md",
                "section": "intro"
            },
            "rec-b": {
                "chunks": ["dogs are mammals"],
                "embeddings": [[0.0, 1.0]]
            }
        })
    }

    #[test]
    fn load_flattens_records_in_order() {
        let (_tmp, path) = write_db(&sample_db());
        let db = Database::load(&path).unwrap();
        let index = db.index();

        assert_eq!(index.len(), 3);
        assert_eq!(index.embeddings().rows(), 3);
        assert_eq!(index.dim(), 2);
        assert_eq!(index.chunk(0), "cats are mammals");
        assert_eq!(index.chunk(1), "cats purr");
        assert_eq!(index.chunk(2), "dogs are mammals");
        assert_eq!(index.embeddings().row(2), &[0.0, 1.0]);
    }

    #[test]
    fn record_order_survives_reserved_keys_anywhere() {
        // Reserved keys interleaved with records must not disturb the
        // stored record order when they are split off.
        let raw = r#"{
            "rec-1": { "chunks": ["one"], "embeddings": [[1.0, 0.0]] },
            "database_description": "interleaved",
            "rec-2": { "chunks": ["two"], "embeddings": [[0.0, 1.0]] },
            "rec-3": { "chunks": ["three"], "embeddings": [[0.5, 0.5]] },
            "embedding_model": "test-model/v1"
        }"#;
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("database.json");
        fs::write(&path, raw).unwrap();

        let db = Database::load(&path).unwrap();
        assert_eq!(db.index().chunk(0), "one");
        assert_eq!(db.index().chunk(1), "two");
        assert_eq!(db.index().chunk(2), "three");
        assert_eq!(db.description(), Some("interleaved"));
    }

    #[test]
    fn reserved_keys_are_split_off() {
        let (_tmp, path) = write_db(&sample_db());
        let db = Database::load(&path).unwrap();

        assert_eq!(db.embedding_model(), Some("test-model/v1"));
        assert_eq!(db.description(), Some("unit test fixture"));
        assert_eq!(db.generator_files(), &["a.md", "b.md"]);
    }

    #[test]
    fn chunks_of_one_record_share_metadata() {
        let (_tmp, path) = write_db(&sample_db());
        let db = Database::load(&path).unwrap();
        let index = db.index();

        assert!(Arc::ptr_eq(index.meta(0), index.meta(1)));
        assert!(!Arc::ptr_eq(index.meta(0), index.meta(2)));
        assert_eq!(index.meta(0).source, "cats.md");
        assert_eq!(index.meta(0).extra["section"], "intro");
        assert_eq!(
            index.meta(0).rerank_embedding.as_deref(),
            Some([1.0, 0.0].as_slice())
        );
    }

    #[test]
    fn source_defaults_when_absent() {
        let (_tmp, path) = write_db(&sample_db());
        let db = Database::load(&path).unwrap();
        assert_eq!(db.index().meta(2).source, "unknown");
    }

    #[test]
    fn missing_file_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let err = Database::load(&tmp.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn missing_chunks_field_is_malformed() {
        let (_tmp, path) = write_db(&json!({
            "rec": { "embeddings": [[1.0, 0.0]] }
        }));
        let err = Database::load(&path).unwrap_err();
        assert!(matches!(err, Error::MalformedRecord { .. }));
    }

    #[test]
    fn chunk_embedding_count_mismatch_is_malformed() {
        let (_tmp, path) = write_db(&json!({
            "rec": { "chunks": ["a", "b"], "embeddings": [[1.0, 0.0]] }
        }));
        let err = Database::load(&path).unwrap_err();
        assert!(matches!(err, Error::MalformedRecord { .. }));
    }

    #[test]
    fn dimension_drift_is_rejected() {
        let (_tmp, path) = write_db(&json!({
            "rec-a": { "chunks": ["a"], "embeddings": [[1.0, 0.0]] },
            "rec-b": { "chunks": ["b"], "embeddings": [[1.0, 0.0, 0.0]] }
        }));
        let err = Database::load(&path).unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 2,
                found: 3
            }
        ));
    }

    #[test]
    fn verify_model_matches() {
        let (_tmp, path) = write_db(&sample_db());
        let db = Database::load(&path).unwrap();

        assert!(db.verify_model("test-model/v1").is_ok());
        let err = db.verify_model("other-model/v2").unwrap_err();
        assert!(matches!(err, Error::IncompatibleModel { .. }));
    }

    #[test]
    fn verify_model_tolerates_missing_identity() {
        let (_tmp, path) = write_db(&json!({
            "rec": { "chunks": ["a"], "embeddings": [[1.0, 0.0]] }
        }));
        let db = Database::load(&path).unwrap();
        assert!(db.verify_model("anything").is_ok());
    }

    #[test]
    fn censored_meta_to_json() {
        let meta = RecordMeta::censored();
        assert_eq!(meta.to_json(), json!({ "source": "censored_queries" }));
    }
}
