use std::sync::Arc;

use crate::intent::{contains_phrase, is_follow_up, normalize_text, tokenize};
use crate::models::{Candidate, Evidence, TemplateId, Utterance};
use crate::registry::{TemplateDefinition, TemplateRegistry, TriggerDescriptor};

pub const FOLLOW_UP_CONFIDENCE: f32 = 0.7;
pub const SEMANTIC_THRESHOLD: f32 = 0.35;

const LOW_BAND_FLOOR: f32 = 0.2;
const LOW_BAND_SPAN: f32 = 0.29;
const TOPIC_SATURATION: f32 = 3.0;

pub trait SemanticScorer: Send + Sync {
    fn model_name(&self) -> &'static str;
    fn similarities(&self, text: &str) -> Vec<(TemplateId, f32)>;
}

#[derive(Clone)]
pub struct TemplateClassifier {
    registry: Arc<TemplateRegistry>,
    semantic: Option<Arc<dyn SemanticScorer>>,
    context_carry: bool,
}

struct Scored {
    confidence: f32,
    evidence: Vec<Evidence>,
}

impl Scored {
    fn new() -> Self {
        Self {
            confidence: 0.0,
            evidence: Vec::new(),
        }
    }

    fn record(&mut self, confidence: f32, evidence: Evidence) {
        self.confidence = self.confidence.max(confidence);
        self.evidence.push(evidence);
    }
}

impl TemplateClassifier {
    pub fn new(registry: Arc<TemplateRegistry>) -> Self {
        Self {
            registry,
            semantic: None,
            context_carry: true,
        }
    }

    pub fn with_semantic(mut self, scorer: Arc<dyn SemanticScorer>) -> Self {
        self.semantic = Some(scorer);
        self
    }

    pub fn with_context_carry(mut self, enabled: bool) -> Self {
        self.context_carry = enabled;
        self
    }

    pub fn registry(&self) -> &Arc<TemplateRegistry> {
        &self.registry
    }

    pub fn semantic_model(&self) -> Option<&'static str> {
        self.semantic.as_ref().map(|scorer| scorer.model_name())
    }

    /// Every template with a non-zero score, best first.
    ///
    /// Templates are scored independently. Equal confidences keep registry order,
    /// which is the only role registration order plays.
    pub fn classify(&self, utterance: &Utterance) -> Vec<Candidate> {
        let text = normalize_text(&utterance.text);
        let tokens = tokenize(&text);

        let follow_up = match &utterance.context {
            Some(context) if self.context_carry && is_follow_up(&tokens) => {
                Some(context.previous_template_id)
            }
            _ => None,
        };

        let similarities = match &self.semantic {
            Some(scorer) if !tokens.is_empty() => scorer.similarities(&text),
            _ => Vec::new(),
        };

        let mut candidates = Vec::new();
        for definition in self.registry.all() {
            let mut scored = score_triggers(definition, &text, &tokens);

            if follow_up == Some(definition.id) {
                scored.record(FOLLOW_UP_CONFIDENCE, Evidence::FollowUp);
            }

            if let (Some(scorer), Some(similarity)) = (
                &self.semantic,
                similarities
                    .iter()
                    .find(|(id, _)| *id == definition.id)
                    .map(|(_, similarity)| *similarity),
            ) {
                if similarity >= SEMANTIC_THRESHOLD {
                    scored.record(
                        low_band(similarity.min(1.0)),
                        Evidence::Semantic {
                            model: scorer.model_name(),
                            similarity,
                        },
                    );
                }
            }

            if scored.confidence > 0.0 {
                candidates.push(Candidate {
                    template_id: definition.id,
                    confidence: scored.confidence,
                    evidence: scored.evidence,
                });
            }
        }

        // stable: ties stay in registry order
        candidates.sort_by(|lhs, rhs| rhs.confidence.total_cmp(&lhs.confidence));
        candidates
    }
}

fn score_triggers(definition: &TemplateDefinition, text: &str, tokens: &[String]) -> Scored {
    let mut scored = Scored::new();

    for trigger in &definition.triggers {
        match trigger {
            TriggerDescriptor::Phrases { phrases, weight } => {
                if let Some(phrase) = phrases
                    .iter()
                    .find(|phrase| contains_phrase(tokens, phrase))
                {
                    scored.record(*weight, Evidence::Phrase { phrase: *phrase });
                }
            }
            TriggerDescriptor::Shape {
                name,
                pattern,
                context,
                weight,
            } => {
                let anchored =
                    context.is_empty() || context.iter().any(|word| contains_phrase(tokens, word));
                if !anchored {
                    continue;
                }
                if let Some(found) = pattern.find(text) {
                    scored.record(
                        *weight,
                        Evidence::Shape {
                            name: *name,
                            matched: found.as_str().to_string(),
                        },
                    );
                }
            }
            TriggerDescriptor::Topic { vocabulary } => {
                let hits = vocabulary
                    .iter()
                    .copied()
                    .filter(|word| contains_phrase(tokens, word))
                    .collect::<Vec<_>>();
                if !hits.is_empty() {
                    let saturation = (hits.len() as f32 / TOPIC_SATURATION).min(1.0);
                    scored.record(low_band(saturation), Evidence::Topic { hits });
                }
            }
        }
    }

    scored
}

fn low_band(strength: f32) -> f32 {
    LOW_BAND_FLOOR + LOW_BAND_SPAN * strength
}
