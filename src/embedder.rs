use std::sync::Mutex;

use candle_core::{Device, Tensor};
use pylate_rs::ColBERT;

use crate::error::{Error, Result};

pub const DEFAULT_MODEL_NAME: &str = "gte-moderncolbert";
pub const MODEL_ENV_VAR: &str = "RAGLINE_MODEL";

/// Converts text into a fixed-dimension, L2-normalized embedding vector.
///
/// `identity` names the model and format version; it is compared against the
/// `embedding_model` recorded in a vector database to reject databases built
/// in a different vector space.
pub trait Embedder: Send + Sync {
    fn identity(&self) -> &str;

    fn encode(&self, text: &str) -> Result<Vec<f32>>;
}

impl std::fmt::Debug for dyn Embedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Embedder")
            .field("identity", &self.identity())
            .finish()
    }
}

/// Resolve the model name from, in order of priority:
/// 1. An explicit name (from --model)
/// 2. The RAGLINE_MODEL environment variable
/// 3. The built-in default
pub fn resolve_model_name(explicit: Option<&str>) -> String {
    explicit
        .map(str::to_string)
        .or_else(|| std::env::var(MODEL_ENV_VAR).ok())
        .unwrap_or_else(|| DEFAULT_MODEL_NAME.to_string())
}

/// Known model aliases and the pinned HuggingFace model ids they resolve to.
pub const KNOWN_MODELS: &[(&str, &str)] = &[
    ("gte-moderncolbert", "lightonai/GTE-ModernColBERT-v1"),
    ("colbert", "lightonai/GTE-ModernColBERT-v1"),
];

/// Registry mapping a model name to an embedder factory.
///
/// Known aliases map to pinned HuggingFace model ids; a name containing a
/// `/` is taken as an explicit hub id. Anything else is rejected.
pub fn create(name: &str) -> Result<Box<dyn Embedder>> {
    if let Some((_, model_id)) = KNOWN_MODELS.iter().find(|(alias, _)| *alias == name) {
        return Ok(Box::new(ColbertEmbedder::new(model_id)));
    }
    if name.contains('/') {
        return Ok(Box::new(ColbertEmbedder::new(name)));
    }
    Err(Error::Config(format!(
        "unknown embedding model `{name}` (expected `gte-moderncolbert` or a HuggingFace model id)"
    )))
}

/// Select the best available compute device.
///
/// Uses CUDA when compiled with the `cuda` feature, Metal when compiled with
/// the `metal` feature, and falls back to CPU otherwise.
fn default_device() -> Device {
    #[cfg(feature = "cuda")]
    {
        if let Ok(device) = Device::new_cuda(0) {
            return device;
        }
    }

    #[cfg(feature = "metal")]
    {
        if let Ok(device) = Device::new_metal(0) {
            return device;
        }
    }

    Device::Cpu
}

/// ColBERT-backed embedder, mean-pooling token embeddings into a single
/// normalized passage vector.
///
/// The model is loaded lazily on the first `encode` call; the mutex makes
/// lazy loading and inference safe behind `&self`.
pub struct ColbertEmbedder {
    model_id: String,
    model: Mutex<Option<ColBERT>>,
}

impl ColbertEmbedder {
    pub fn new(model_id: &str) -> Self {
        Self {
            model_id: model_id.to_string(),
            model: Mutex::new(None),
        }
    }

    /// Returns `true` if the model has already been loaded into memory.
    pub fn is_loaded(&self) -> bool {
        self.model.lock().map(|m| m.is_some()).unwrap_or(false)
    }
}

impl Embedder for ColbertEmbedder {
    fn identity(&self) -> &str {
        &self.model_id
    }

    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let mut guard = self
            .model
            .lock()
            .map_err(|_| Error::Model("embedding model mutex poisoned".to_string()))?;

        if guard.is_none() {
            let model: ColBERT = ColBERT::from(self.model_id.as_str())
                .with_device(default_device())
                .try_into()
                .map_err(|e| Error::Model(format!("failed to load `{}`: {e}", self.model_id)))?;
            *guard = Some(model);
        }

        let model = guard.as_mut().ok_or_else(|| {
            Error::Model("embedding model unavailable after load".to_string())
        })?;

        // Token-level embeddings, shape [1, Q, D].
        let embeddings = model
            .encode(&[text.to_string()], true)
            .map_err(|e| Error::Model(format!("query encoding failed: {e}")))?;

        let pooled = mean_pool(&embeddings)?;
        Ok(normalize(pooled))
    }
}

/// Collapse a [1, Q, D] token-embedding tensor into a single D-vector by
/// averaging over the token dimension.
fn mean_pool(embeddings: &Tensor) -> Result<Vec<f32>> {
    let pooled = embeddings
        .squeeze(0)
        .and_then(|t| t.mean(0))
        .and_then(|t| t.to_vec1::<f32>())
        .map_err(|e| Error::Model(format!("tensor computation error: {e}")))?;
    Ok(pooled)
}

fn normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}
