use thiserror::Error;

use crate::models::TemplateId;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CardError {
    #[error("template {0} is not registered")]
    UnknownTemplate(TemplateId),
    #[error("template {0} is registered more than once")]
    DuplicateTemplate(TemplateId),
    #[error("template {template} is invalid: {reason}")]
    InvalidTemplate { template: TemplateId, reason: String },
    #[error("no template matched the utterance")]
    NoCandidate,
    #[error("template {template} is missing required slots: {}", .missing.join(", "))]
    IncompleteSlots {
        template: TemplateId,
        missing: Vec<String>,
    },
}

impl CardError {
    pub fn invalid(template: TemplateId, reason: impl Into<String>) -> Self {
        Self::InvalidTemplate {
            template,
            reason: reason.into(),
        }
    }
}
