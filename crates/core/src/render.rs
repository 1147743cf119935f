use chrono::NaiveDate;

use crate::error::CardError;
use crate::models::{CardPayload, CardStatus, ExtractedSlots, SlotMap, SlotType, SlotValue};
use crate::registry::TemplateDefinition;

/// Binds extracted slots into the template schema.
///
/// Values that fail type coercion count as absent. Absent optional slots take the
/// template default or are omitted; absent required slots fail the render with
/// [`CardError::IncompleteSlots`]. Slots the schema does not declare are dropped.
pub fn render_card(
    definition: &TemplateDefinition,
    slots: &ExtractedSlots,
) -> Result<CardPayload, CardError> {
    let mut bound = SlotMap::new();
    let mut missing = Vec::new();

    for spec in &definition.slots {
        match slots.get(spec.name).and_then(|value| coerce(value, spec.ty)) {
            Some(value) => {
                bound.insert(spec.name.to_string(), value);
            }
            None => {
                if let Some(default) = &spec.default {
                    bound.insert(spec.name.to_string(), default.clone());
                } else if spec.required {
                    missing.push(spec.name.to_string());
                }
            }
        }
    }

    if !missing.is_empty() {
        return Err(CardError::IncompleteSlots {
            template: definition.id,
            missing,
        });
    }

    (definition.render)(&mut bound);

    Ok(CardPayload {
        template_id: definition.id,
        status: CardStatus::Complete,
        slots: bound,
        notice: None,
    })
}

pub fn coerce(value: &SlotValue, ty: SlotType) -> Option<SlotValue> {
    match (ty, value) {
        (SlotType::Text, SlotValue::Text(text)) => non_empty(text).map(SlotValue::from),
        (SlotType::Text, SlotValue::Number(_)) | (SlotType::Text, SlotValue::Date(_)) => {
            Some(SlotValue::Text(value.display()))
        }
        (SlotType::Number, SlotValue::Number(number)) => {
            number.is_finite().then_some(SlotValue::Number(*number))
        }
        (SlotType::Number, SlotValue::Text(text)) => parse_number(text).map(SlotValue::Number),
        (SlotType::Date, SlotValue::Date(date)) => Some(SlotValue::Date(*date)),
        (SlotType::Date, SlotValue::Text(text)) => NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
            .ok()
            .map(SlotValue::Date),
        (SlotType::Identifier, SlotValue::Text(text)) => {
            let compact = text
                .chars()
                .filter(|ch| !ch.is_whitespace())
                .collect::<String>()
                .to_uppercase();
            (!compact.is_empty() && compact.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '.'))
                .then_some(SlotValue::Text(compact))
        }
        (SlotType::Enum(allowed), SlotValue::Text(text)) => {
            let lowered = text.trim().to_lowercase();
            allowed
                .iter()
                .any(|option| *option == lowered)
                .then_some(SlotValue::Text(lowered))
        }
        (SlotType::List, SlotValue::List(values)) => {
            let cleaned = values
                .iter()
                .filter_map(|value| non_empty(value))
                .map(ToString::to_string)
                .collect::<Vec<_>>();
            (!cleaned.is_empty()).then_some(SlotValue::List(cleaned))
        }
        (SlotType::List, SlotValue::Text(text)) => non_empty(text).map(|text| SlotValue::List(vec![text.to_string()])),
        _ => None,
    }
}

fn non_empty(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn parse_number(text: &str) -> Option<f64> {
    let cleaned = text
        .trim()
        .trim_start_matches('$')
        .trim_end_matches('%')
        .replace(',', "");
    cleaned.parse::<f64>().ok().filter(|number| number.is_finite())
}
