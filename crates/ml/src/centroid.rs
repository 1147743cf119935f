use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use cardwise_core::{SemanticScorer, TemplateId};
use serde::Deserialize;

use crate::{cosine_similarity, normalize, EmbeddingModel};

#[derive(Debug, Deserialize)]
struct LabeledUtterance {
    text: String,
    template: String,
}

#[derive(Clone)]
pub struct CentroidSemanticScorer {
    model_name: &'static str,
    centroids: Vec<(TemplateId, Vec<f32>)>,
    embedder: Arc<dyn EmbeddingModel>,
}

impl CentroidSemanticScorer {
    pub fn from_jsonl(
        path: impl AsRef<Path>,
        embedder: Arc<dyn EmbeddingModel>,
        model_name: &'static str,
    ) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref()).with_context(|| {
            format!(
                "failed reading utterance dataset at {}",
                path.as_ref().display()
            )
        })?;

        let mut examples = Vec::new();
        for (line_no, line) in raw
            .lines()
            .enumerate()
            .map(|(idx, line)| (idx + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty())
        {
            let example: LabeledUtterance = serde_json::from_str(line)
                .with_context(|| format!("invalid jsonl utterance on line {line_no}"))?;
            if let Some(template) = TemplateId::parse(&example.template) {
                examples.push((template, example.text));
            }
        }

        Self::from_examples(examples, embedder, model_name)
    }

    pub fn from_examples(
        examples: impl IntoIterator<Item = (TemplateId, String)>,
        embedder: Arc<dyn EmbeddingModel>,
        model_name: &'static str,
    ) -> Result<Self> {
        // BTreeMap keeps centroid order independent of dataset order.
        let mut by_template: BTreeMap<TemplateId, Vec<Vec<f32>>> = BTreeMap::new();
        for (template, text) in examples {
            if template == TemplateId::Unrecognized {
                continue;
            }
            by_template
                .entry(template)
                .or_default()
                .push(embedder.embed(&text));
        }

        let centroids = by_template
            .into_iter()
            .filter(|(_, vectors)| !vectors.is_empty())
            .map(|(template, vectors)| (template, centroid(&vectors)))
            .collect::<Vec<_>>();

        if centroids.is_empty() {
            anyhow::bail!("utterance dataset produced zero template centroids");
        }

        Ok(Self {
            model_name,
            centroids,
            embedder,
        })
    }

    pub fn templates(&self) -> impl Iterator<Item = TemplateId> + '_ {
        self.centroids.iter().map(|(template, _)| *template)
    }
}

impl SemanticScorer for CentroidSemanticScorer {
    fn model_name(&self) -> &'static str {
        self.model_name
    }

    fn similarities(&self, text: &str) -> Vec<(TemplateId, f32)> {
        let query = self.embedder.embed(text);
        self.centroids
            .iter()
            .map(|(template, center)| {
                (*template, cosine_similarity(&query, center).clamp(0.0, 1.0))
            })
            .collect()
    }
}

fn centroid(vectors: &[Vec<f32>]) -> Vec<f32> {
    let dims = vectors.first().map(Vec::len).unwrap_or(0);
    let mut acc = vec![0.0_f32; dims];

    for vector in vectors {
        for (idx, value) in vector.iter().enumerate() {
            acc[idx] += value;
        }
    }

    for value in &mut acc {
        *value /= vectors.len() as f32;
    }
    normalize(&mut acc);
    acc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HashEmbeddingModel;

    fn scorer() -> CentroidSemanticScorer {
        let examples = [
            (TemplateId::Weather, "will it rain in paris tomorrow"),
            (TemplateId::Weather, "how hot is it outside"),
            (TemplateId::StockUpdate, "how are my shares doing"),
            (TemplateId::StockUpdate, "price of tesla shares today"),
        ]
        .map(|(template, text)| (template, text.to_string()));

        CentroidSemanticScorer::from_examples(
            examples,
            Arc::new(HashEmbeddingModel::new(192)),
            "test-centroid",
        )
        .unwrap()
    }

    #[test]
    fn nearest_centroid_wins() {
        let scores = scorer().similarities("is it going to rain in paris");
        let weather = scores.iter().find(|(t, _)| *t == TemplateId::Weather).unwrap().1;
        let stock = scores.iter().find(|(t, _)| *t == TemplateId::StockUpdate).unwrap().1;
        assert!(weather > stock);
    }

    #[test]
    fn empty_dataset_is_rejected() {
        let result = CentroidSemanticScorer::from_examples(
            Vec::new(),
            Arc::new(HashEmbeddingModel::new(64)),
            "empty",
        );
        assert!(result.is_err());
    }

    #[test]
    fn loads_labeled_jsonl() {
        let path = std::env::temp_dir().join(format!("cardwise-ml-{}.jsonl", std::process::id()));
        fs::write(
            &path,
            "{\"text\": \"open the settings\", \"template\": \"popup_action\"}\n\n{\"text\": \"hi\", \"template\": \"nonsense\"}\n",
        )
        .unwrap();

        let scorer = CentroidSemanticScorer::from_jsonl(
            &path,
            Arc::new(HashEmbeddingModel::new(64)),
            "jsonl",
        )
        .unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(scorer.templates().collect::<Vec<_>>(), vec![TemplateId::PopupAction]);
    }
}
