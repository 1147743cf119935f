use std::env;
use std::time::Duration;

use crate::error::CardError;
use crate::models::{Candidate, CardPayload, CardStatus, SlotMap, SlotValue, TemplateId};

pub const DEFAULT_PROVIDER_TIMEOUT_MS: u64 = 1500;

const NO_MATCH_MESSAGE: &str = "Sorry, I couldn't tell which card you need. Try asking about flights, weather, stocks, restaurants, reports, tasks or forms.";

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchPolicy {
    pub provider_timeout: Duration,
    pub min_confidence: f32,
    pub context_carry: bool,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_millis(DEFAULT_PROVIDER_TIMEOUT_MS),
            min_confidence: 0.0,
            context_carry: true,
        }
    }
}

impl DispatchPolicy {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let provider_timeout = lookup("CARDWISE_PROVIDER_TIMEOUT_MS")
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .filter(|millis| *millis > 0)
            .map(Duration::from_millis)
            .unwrap_or(defaults.provider_timeout);

        let min_confidence = lookup("CARDWISE_MIN_CONFIDENCE")
            .and_then(|raw| raw.trim().parse::<f32>().ok())
            .filter(|value| (0.0..1.0).contains(value))
            .unwrap_or(defaults.min_confidence);

        let context_carry = lookup("CARDWISE_CONTEXT_CARRY")
            .and_then(|raw| parse_flag(&raw))
            .unwrap_or(defaults.context_carry);

        Self {
            provider_timeout,
            min_confidence,
            context_carry,
        }
    }

    pub fn admits(&self, candidate: &Candidate) -> bool {
        candidate.confidence > self.min_confidence
    }

    /// Terminal payload for a data-availability failure. Registry errors have
    /// none and must reach the caller.
    pub fn fallback_payload(&self, err: &CardError) -> Option<CardPayload> {
        match err {
            CardError::IncompleteSlots { template, missing } => Some(incomplete(*template, missing)),
            CardError::NoCandidate => Some(no_candidate()),
            CardError::UnknownTemplate(_)
            | CardError::DuplicateTemplate(_)
            | CardError::InvalidTemplate { .. } => None,
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn no_candidate() -> CardPayload {
    fallback(
        NO_MATCH_MESSAGE.to_string(),
        None,
        CardError::NoCandidate.to_string(),
    )
}

pub fn incomplete(template: TemplateId, missing: &[String]) -> CardPayload {
    let message = format!(
        "I need a bit more detail to build the {} card.",
        template.display_name()
    );
    let notice = CardError::IncompleteSlots {
        template,
        missing: missing.to_vec(),
    }
    .to_string();
    fallback(message, Some(template), notice)
}

fn fallback(message: String, requested: Option<TemplateId>, notice: String) -> CardPayload {
    let mut slots = SlotMap::new();
    slots.insert("message".to_string(), SlotValue::Text(message));
    if let Some(template) = requested {
        slots.insert(
            "requestedTemplate".to_string(),
            SlotValue::Text(template.as_str().to_string()),
        );
    }

    CardPayload {
        template_id: TemplateId::Unrecognized,
        status: CardStatus::Fallback,
        slots,
        notice: Some(notice),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn env_values_override_defaults() {
        let vars = HashMap::from([
            ("CARDWISE_PROVIDER_TIMEOUT_MS", "250"),
            ("CARDWISE_MIN_CONFIDENCE", "0.3"),
            ("CARDWISE_CONTEXT_CARRY", "off"),
        ]);
        let policy = DispatchPolicy::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(policy.provider_timeout, Duration::from_millis(250));
        assert_eq!(policy.min_confidence, 0.3);
        assert!(!policy.context_carry);
    }

    #[test]
    fn invalid_values_keep_defaults() {
        let vars = HashMap::from([
            ("CARDWISE_PROVIDER_TIMEOUT_MS", "soon"),
            ("CARDWISE_MIN_CONFIDENCE", "7"),
            ("CARDWISE_CONTEXT_CARRY", "maybe"),
        ]);
        let policy = DispatchPolicy::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(policy, DispatchPolicy::default());
    }

    #[test]
    fn incomplete_fallback_names_missing_slots_in_notice_only() {
        let payload = DispatchPolicy::default()
            .fallback_payload(&CardError::IncompleteSlots {
                template: TemplateId::FlightUpdate,
                missing: vec!["flightNumber".to_string(), "status".to_string()],
            })
            .unwrap();

        assert_eq!(payload.template_id, TemplateId::Unrecognized);
        assert_eq!(payload.status, CardStatus::Fallback);
        assert_eq!(payload.text("requestedTemplate"), Some("FlightUpdate"));
        assert!(!payload.text("message").unwrap().contains("flightNumber"));
        assert!(payload.notice.as_deref().unwrap().contains("flightNumber, status"));
    }

    #[test]
    fn registry_errors_have_no_fallback_card() {
        let policy = DispatchPolicy::default();
        assert!(policy
            .fallback_payload(&CardError::UnknownTemplate(TemplateId::Weather))
            .is_none());
        assert!(policy
            .fallback_payload(&CardError::invalid(TemplateId::List, "no trigger descriptors"))
            .is_none());
        assert!(policy.fallback_payload(&CardError::NoCandidate).is_some());
    }
}
