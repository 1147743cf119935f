use crate::intent::title_case;
use crate::models::{
    CardPayload, FormDefinition, FormField, FormFieldKind, FormSubmission, SlotValue, TemplateId,
};

const OPTIONAL_FIELDS: &[&str] = &["comment", "comments", "note", "notes", "remarks"];
const DATE_HINTS: &[&str] = &["date", "day", "birthday", "deadline", "dob"];
const NUMBER_HINTS: &[&str] = &["age", "amount", "count", "guests", "number", "quantity", "rating"];
const CHECKBOX_HINTS: &[&str] = &["agree", "consent", "newsletter", "subscribe", "terms"];

pub fn form_id(title: &str, fields: &[String]) -> String {
    let mut hash: u64 = 0xcbf29ce484222325;
    let parts = std::iter::once(title).chain(fields.iter().map(String::as_str));
    for part in parts {
        for byte in part.as_bytes().iter().chain(std::iter::once(&0x1f)) {
            hash ^= *byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
    }
    format!("form-{hash:016x}")
}

pub fn infer_field_kind(name: &str) -> FormFieldKind {
    let words = field_id(name)
        .split('_')
        .map(str::to_string)
        .collect::<Vec<_>>();
    let has = |hints: &[&str]| words.iter().any(|word| hints.contains(&word.as_str()));

    if has(DATE_HINTS) {
        FormFieldKind::Date
    } else if has(CHECKBOX_HINTS) {
        FormFieldKind::Checkbox
    } else if has(NUMBER_HINTS) {
        FormFieldKind::Number
    } else {
        FormFieldKind::Text
    }
}

pub fn field_id(name: &str) -> String {
    name.split(|ch: char| !ch.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

pub fn field_from_name(name: &str) -> FormField {
    let id = field_id(name);
    FormField {
        label: title_case(&id.replace('_', " ")),
        kind: infer_field_kind(&id),
        required: !OPTIONAL_FIELDS.contains(&id.as_str()),
        id,
    }
}

pub fn definition_from_payload(payload: &CardPayload) -> Option<FormDefinition> {
    if payload.template_id != TemplateId::Form || !payload.is_complete() {
        return None;
    }

    let form_id = payload.text("formId")?.to_string();
    let title = payload.text("title").unwrap_or("Form").to_string();
    let fields = payload
        .slot("fields")
        .and_then(SlotValue::as_list)
        .unwrap_or_default()
        .iter()
        .map(|name| field_from_name(name))
        .filter(|field| !field.id.is_empty())
        .collect();

    Some(FormDefinition {
        form_id,
        title,
        fields,
    })
}

pub fn missing_fields(definition: &FormDefinition, submission: &FormSubmission) -> Vec<String> {
    definition
        .fields
        .iter()
        .filter(|field| field.required)
        .filter(|field| {
            submission
                .values
                .get(&field.id)
                .map_or(true, |value| value.trim().is_empty())
        })
        .map(|field| field.label.clone())
        .collect()
}

pub fn success_message(definition: &FormDefinition) -> String {
    format!(
        "Success! Your submission for '{}' has been validated.",
        definition.title
    )
}

pub fn validation_failed_message(missing: &[String]) -> String {
    let lines = missing
        .iter()
        .map(|label| format!("- {label} is required."))
        .collect::<Vec<_>>()
        .join("\n");
    format!("Validation Failed:\n{lines}")
}

pub fn not_found_message(form_id: &str) -> String {
    format!("Error: Form session '{form_id}' not found or expired.")
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn form_ids_are_stable_and_layout_sensitive() {
        let a = form_id("Feedback Form", &fields(&["name", "date"]));
        assert_eq!(a, form_id("Feedback Form", &fields(&["name", "date"])));
        assert_ne!(a, form_id("Feedback Form", &fields(&["date", "name"])));
        assert!(a.starts_with("form-"));
        assert_eq!(a.len(), "form-".len() + 16);
    }

    #[test]
    fn infers_kinds_from_field_names() {
        assert_eq!(infer_field_kind("Start Date"), FormFieldKind::Date);
        assert_eq!(infer_field_kind("number of guests"), FormFieldKind::Number);
        assert_eq!(infer_field_kind("subscribe"), FormFieldKind::Checkbox);
        assert_eq!(infer_field_kind("email"), FormFieldKind::Text);
    }

    #[test]
    fn comment_fields_are_optional() {
        assert!(!field_from_name("comments").required);
        let email = field_from_name("Email Address");
        assert!(email.required);
        assert_eq!(email.id, "email_address");
        assert_eq!(email.label, "Email Address");
    }

    #[test]
    fn reports_blank_required_fields() {
        let definition = FormDefinition {
            form_id: "form-1".to_string(),
            title: "Signup".to_string(),
            fields: vec![field_from_name("name"), field_from_name("email"), field_from_name("notes")],
        };
        let submission = FormSubmission {
            form_id: "form-1".to_string(),
            values: BTreeMap::from([
                ("name".to_string(), "Ada".to_string()),
                ("email".to_string(), "  ".to_string()),
            ]),
        };

        let missing = missing_fields(&definition, &submission);
        assert_eq!(missing, vec!["Email".to_string()]);
        assert_eq!(
            validation_failed_message(&missing),
            "Validation Failed:\n- Email is required."
        );
    }
}
