mod centroid;
mod fallback;

use std::env;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use cardwise_core::SemanticScorer;
use tracing::info;

pub use centroid::CentroidSemanticScorer;
pub use fallback::HashEmbeddingModel;

pub const DEFAULT_DIMS: usize = 192;

pub trait EmbeddingModel: Send + Sync {
    fn model_name(&self) -> &'static str;
    fn embed(&self, text: &str) -> Vec<f32>;
}

#[derive(Clone)]
pub struct CardMlStack {
    pub scorer: Option<Arc<dyn SemanticScorer>>,
}

impl CardMlStack {
    pub fn disabled() -> Self {
        Self { scorer: None }
    }

    pub fn from_dataset(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let embedder: Arc<dyn EmbeddingModel> = Arc::new(HashEmbeddingModel::new(DEFAULT_DIMS));
        let scorer = CentroidSemanticScorer::from_jsonl(path, embedder, "hash-centroid-template")?;
        info!(
            dataset = %path.display(),
            templates = scorer.templates().count(),
            "semantic anchors loaded"
        );

        Ok(Self {
            scorer: Some(Arc::new(scorer)),
        })
    }

    /// Reads `CARDWISE_UTTERANCE_DATASET`. A configured dataset that cannot be
    /// loaded is an error, not a silent downgrade.
    pub fn load_default() -> Result<Self> {
        Self::from_setting(env::var("CARDWISE_UTTERANCE_DATASET").ok().as_deref())
    }

    pub fn from_setting(dataset: Option<&str>) -> Result<Self> {
        match dataset.map(str::trim).filter(|path| !path.is_empty()) {
            Some(path) => Self::from_dataset(path)
                .with_context(|| format!("CARDWISE_UTTERANCE_DATASET={path} could not be loaded")),
            None => Ok(Self::disabled()),
        }
    }

    pub fn semantic_enabled(&self) -> bool {
        self.scorer.is_some()
    }
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0;
    let mut a_norm = 0.0;
    let mut b_norm = 0.0;
    for (lhs, rhs) in a.iter().zip(b.iter()) {
        dot += lhs * rhs;
        a_norm += lhs * lhs;
        b_norm += rhs * rhs;
    }

    if a_norm == 0.0 || b_norm == 0.0 {
        0.0
    } else {
        dot / (a_norm.sqrt() * b_norm.sqrt())
    }
}

pub(crate) fn normalize(values: &mut [f32]) {
    let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in values.iter_mut() {
            *value /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn unset_dataset_disables_semantic_anchors() {
        let stack = CardMlStack::from_setting(None).unwrap();
        assert!(!stack.semantic_enabled());
        assert!(!CardMlStack::from_setting(Some("  ")).unwrap().semantic_enabled());
    }

    #[test]
    fn malformed_dataset_is_reported() {
        let path = std::env::temp_dir().join(format!("cardwise-bad-{}.jsonl", std::process::id()));
        fs::write(&path, "not json\n").unwrap();

        let err = CardMlStack::from_setting(path.to_str()).err().expect("load fails");
        fs::remove_file(&path).ok();

        let chain = format!("{err:#}");
        assert!(chain.contains("CARDWISE_UTTERANCE_DATASET"), "{chain}");
        assert!(chain.contains("invalid jsonl utterance on line 1"), "{chain}");
    }

    #[test]
    fn missing_dataset_file_is_reported() {
        let result = CardMlStack::from_setting(Some("/nonexistent/cardwise/utterances.jsonl"));
        assert!(result.is_err());
    }

    #[test]
    fn bundled_dataset_enables_semantic_anchors() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../data/training/utterances.jsonl");
        assert!(CardMlStack::from_setting(Some(path)).unwrap().semantic_enabled());
    }
}
