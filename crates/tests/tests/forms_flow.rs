use std::collections::BTreeMap;
use std::sync::Arc;

use cardwise_agents::{CardAgent, DispatchError};
use cardwise_core::{CardStatus, DispatchPolicy, FormSubmission, TemplateId, Utterance};
use cardwise_ml::CardMlStack;
use cardwise_observability::AppMetrics;
use cardwise_providers::StaticProvider;
use cardwise_storage::FormRepository;
use cardwise_tests::{standard_registry, static_agent, ReadOnlyFormStore};

fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

#[tokio::test]
async fn named_fields_shape_the_form_and_its_validation() {
    let agent = static_agent();

    let form = agent
        .dispatch(Utterance::new("Create a signup form with name, email and notes fields"))
        .await
        .unwrap();
    assert_eq!(form.template_id, TemplateId::Form);
    assert_eq!(form.status, CardStatus::Complete);
    let form_id = form.text("formId").unwrap().to_string();

    let rejected = agent
        .submit_form(FormSubmission {
            form_id: form_id.clone(),
            values: values(&[("name", "Ada")]),
        })
        .await
        .unwrap();
    assert_eq!(
        rejected.text("message"),
        Some("Validation Failed:\n- Email is required.")
    );

    let accepted = agent
        .submit_form(FormSubmission {
            form_id,
            values: values(&[("name", "Ada"), ("email", "ada@example.com")]),
        })
        .await
        .unwrap();
    assert_eq!(accepted.template_id, TemplateId::Simple);
    assert!(accepted.text("message").unwrap().starts_with("Success!"));

    let snapshot = agent.metrics().snapshot();
    assert_eq!(snapshot.forms_submitted_total, 2);
}

#[tokio::test]
async fn identical_requests_reuse_one_form_id() {
    let agent = static_agent();

    let first = agent
        .dispatch(Utterance::new("I want to give feedback"))
        .await
        .unwrap();
    let second = agent
        .dispatch(Utterance::new("I want to give feedback"))
        .await
        .unwrap();
    assert_eq!(first.text("formId"), second.text("formId"));
}

#[tokio::test]
async fn unknown_form_ids_get_a_polite_answer() {
    let reply = static_agent()
        .submit_form(FormSubmission {
            form_id: "form-doesnotexist".to_string(),
            values: BTreeMap::new(),
        })
        .await
        .unwrap();

    assert_eq!(reply.status, CardStatus::Complete);
    assert_eq!(
        reply.text("message"),
        Some("Error: Form session 'form-doesnotexist' not found or expired.")
    );
}

#[tokio::test]
async fn rendered_forms_are_persisted() {
    let store = cardwise_storage::MemoryStore::new();
    let agent = cardwise_agents::CardAgent::new(
        cardwise_tests::standard_registry(),
        cardwise_ml::CardMlStack::disabled(),
        cardwise_core::DispatchPolicy::default(),
        std::sync::Arc::new(cardwise_providers::StaticProvider::new()),
        std::sync::Arc::new(store.clone()),
        cardwise_observability::AppMetrics::shared(),
    );

    let form = agent
        .dispatch(Utterance::new("I want to give feedback"))
        .await
        .unwrap();
    let stored = store
        .load_form(form.text("formId").unwrap())
        .await
        .unwrap()
        .expect("definition stored");

    let ids = stored.fields.iter().map(|field| field.id.as_str()).collect::<Vec<_>>();
    assert_eq!(ids, vec!["name", "date", "comment"]);
    assert!(!stored.fields[2].required);
}

#[tokio::test]
async fn storage_failures_surface_instead_of_falling_back() {
    let agent = CardAgent::new(
        standard_registry(),
        CardMlStack::disabled(),
        DispatchPolicy::default(),
        Arc::new(StaticProvider::new()),
        Arc::new(ReadOnlyFormStore),
        AppMetrics::shared(),
    );

    let err = agent
        .dispatch(Utterance::new("I want to give feedback"))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Storage(_)));
    assert!(err.to_string().contains("database is locked"));
    assert_eq!(agent.metrics().snapshot().fallback_total, 0);

    let other = agent
        .dispatch(Utterance::new("System is overheating!"))
        .await
        .unwrap();
    assert_eq!(other.status, CardStatus::Complete);
}
