use std::sync::Arc;
use std::time::Duration;

use cardwise_agents::{CancelToken, CardAgent, DispatchError};
use cardwise_core::{
    CardStatus, ConversationContext, DispatchPolicy, TemplateDefinition, TemplateId,
    TemplateRegistry, TriggerDescriptor, Utterance,
};
use cardwise_ml::CardMlStack;
use cardwise_observability::AppMetrics;
use cardwise_providers::StaticProvider;
use cardwise_storage::MemoryStore;
use cardwise_tests::{agent_with, short_timeout, static_agent, BrokenProvider, StalledProvider};
use futures::future::join_all;

const CATALOGUE_EXAMPLES: &[(&str, TemplateId)] = &[
    ("Hi there! Who are you?", TemplateId::Hero),
    ("System is overheating!", TemplateId::Alert),
    ("Show me the sales report for Q1.", TemplateId::DataSummary),
    ("I want to give feedback", TemplateId::Form),
    ("Show my tasks for today", TemplateId::List),
    ("Is flight UA123 on time?", TemplateId::FlightUpdate),
    ("What is the weather like in Seattle?", TemplateId::Weather),
    ("Show me the stock price for GOOGL.", TemplateId::StockUpdate),
    ("Recommend a good sushi restaurant nearby.", TemplateId::RestaurantDetails),
    ("Open the calendar for me.", TemplateId::PopupAction),
];

#[tokio::test]
async fn catalogue_examples_render_complete_cards() {
    let agent = static_agent();

    for (text, expected) in CATALOGUE_EXAMPLES {
        let payload = agent.dispatch(Utterance::new(*text)).await.unwrap();
        assert_eq!(payload.template_id, *expected, "{text}");
        assert_eq!(payload.status, CardStatus::Complete, "{text}: {:?}", payload.notice);
    }

    let snapshot = agent.metrics().snapshot();
    assert_eq!(snapshot.dispatches_total, CATALOGUE_EXAMPLES.len() as u64);
    assert_eq!(snapshot.fallback_total, 0);
}

#[tokio::test]
async fn greeting_prefixes_do_not_hide_the_request() {
    let agent = static_agent();

    for (text, expected) in [
        ("Hi, is flight UA123 on time?", TemplateId::FlightUpdate),
        ("Hello! What is the weather like in Seattle?", TemplateId::Weather),
        ("Hey, show me the stock price for GOOGL.", TemplateId::StockUpdate),
    ] {
        let payload = agent.dispatch(Utterance::new(text)).await.unwrap();
        assert_eq!(payload.template_id, expected, "{text}");
        assert_eq!(payload.status, CardStatus::Complete, "{text}: {:?}", payload.notice);
    }
}

#[tokio::test]
async fn complete_cards_carry_every_required_slot() {
    let agent = static_agent();

    for (text, _) in CATALOGUE_EXAMPLES {
        let payload = agent.dispatch(Utterance::new(*text)).await.unwrap();
        let definition = agent.registry().lookup(payload.template_id).unwrap();
        for spec in definition.required_slots() {
            assert!(payload.slot(spec.name).is_some(), "{text} lacks {}", spec.name);
        }
    }
}

#[tokio::test]
async fn unmatched_input_always_falls_back() {
    let agent = static_agent();

    for text in ["", "   ", "?!...", "zzqx vlorp"] {
        let payload = agent.dispatch(Utterance::new(text)).await.unwrap();
        assert_eq!(payload.status, CardStatus::Fallback, "{text:?}");
        assert_eq!(payload.template_id, TemplateId::Unrecognized);
        assert!(payload.text("message").is_some());
        assert!(payload.notice.is_some());
    }
}

#[tokio::test]
async fn missing_required_entity_is_never_a_complete_card() {
    let payload = static_agent()
        .dispatch(Utterance::new("Check flight status"))
        .await
        .unwrap();

    assert_eq!(payload.status, CardStatus::Fallback);
    assert_eq!(payload.text("requestedTemplate"), Some("FlightUpdate"));
    assert!(payload.notice.as_deref().unwrap().contains("flightNumber"));
    assert!(!payload.text("message").unwrap().contains("flightNumber"));
}

#[tokio::test]
async fn equal_scores_resolve_to_earlier_registration() {
    let registry = TemplateRegistry::builder()
        .register(TemplateDefinition::new(TemplateId::Simple).trigger(TriggerDescriptor::phrases(&["ping"], 0.9)))
        .unwrap()
        .register(TemplateDefinition::new(TemplateId::Hero).trigger(TriggerDescriptor::phrases(&["ping"], 0.9)))
        .unwrap()
        .build();
    let agent = CardAgent::new(
        Arc::new(registry),
        CardMlStack::disabled(),
        DispatchPolicy::default(),
        Arc::new(StaticProvider::new()),
        Arc::new(MemoryStore::new()),
        AppMetrics::shared(),
    );

    for _ in 0..20 {
        let payload = agent.dispatch(Utterance::new("ping")).await.unwrap();
        assert_eq!(payload.template_id, TemplateId::Simple);
    }
}

#[tokio::test]
async fn repeated_dispatches_are_byte_identical() {
    let agent = static_agent();

    for (text, _) in CATALOGUE_EXAMPLES {
        let first = serde_json::to_vec(&agent.dispatch(Utterance::new(*text)).await.unwrap()).unwrap();
        let second = serde_json::to_vec(&agent.dispatch(Utterance::new(*text)).await.unwrap()).unwrap();
        assert_eq!(first, second, "{text}");
    }
}

#[tokio::test]
async fn provider_timeout_becomes_fallback() {
    let agent = agent_with(StalledProvider::default(), short_timeout());

    let payload = agent
        .dispatch(Utterance::new("What is the weather like in Seattle?"))
        .await
        .unwrap();

    assert_eq!(payload.status, CardStatus::Fallback);
    assert_eq!(payload.text("requestedTemplate"), Some("Weather"));
    assert_eq!(agent.metrics().snapshot().provider_timeouts_total, 1);
}

#[tokio::test]
async fn provider_errors_and_not_found_become_fallback() {
    let broken = agent_with(BrokenProvider, DispatchPolicy::default());
    let payload = broken
        .dispatch(Utterance::new("Show me the stock price for GOOGL."))
        .await
        .unwrap();
    assert_eq!(payload.status, CardStatus::Fallback);
    assert_eq!(broken.metrics().snapshot().provider_errors_total, 1);

    let missing = agent_with(StaticProvider::new().with_missing("ZZ999"), DispatchPolicy::default());
    let payload = missing
        .dispatch(Utterance::new("Is flight ZZ999 on time?"))
        .await
        .unwrap();
    assert_eq!(payload.status, CardStatus::Fallback);
    assert_eq!(payload.text("requestedTemplate"), Some("FlightUpdate"));
}

#[tokio::test]
async fn templates_without_live_data_skip_the_provider() {
    let provider = Arc::new(StalledProvider::default());
    let agent = CardAgent::new(
        cardwise_tests::standard_registry(),
        CardMlStack::disabled(),
        short_timeout(),
        provider.clone(),
        Arc::new(MemoryStore::new()),
        AppMetrics::shared(),
    );

    let payload = agent
        .dispatch(Utterance::new("System is overheating!"))
        .await
        .unwrap();
    assert_eq!(payload.status, CardStatus::Complete);
    assert_eq!(provider.started(), 0);
}

#[tokio::test]
async fn cancellation_during_fetch_yields_no_payload() {
    let agent = agent_with(
        StalledProvider::default(),
        DispatchPolicy {
            provider_timeout: Duration::from_secs(30),
            ..DispatchPolicy::default()
        },
    );
    let token = CancelToken::new();
    let trigger = token.clone();

    let canceller = async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    };
    let dispatch = agent.dispatch_with_cancel(Utterance::new("Is flight UA123 on time?"), &token);

    let (result, ()) = tokio::time::timeout(Duration::from_secs(5), async { tokio::join!(dispatch, canceller) })
        .await
        .expect("cancellation is observed promptly");

    assert!(matches!(result, Err(DispatchError::Cancelled)));
    assert_eq!(agent.metrics().snapshot().cancelled_total, 1);
}

#[tokio::test]
async fn concurrent_dispatches_are_independent() {
    let agent = static_agent();

    let utterances = CATALOGUE_EXAMPLES
        .iter()
        .cycle()
        .take(50)
        .map(|(text, expected)| {
            let agent = agent.clone();
            async move { (agent.dispatch(Utterance::new(*text)).await.unwrap(), *expected) }
        })
        .collect::<Vec<_>>();

    for (payload, expected) in join_all(utterances).await {
        assert_eq!(payload.template_id, expected);
        assert_eq!(payload.status, CardStatus::Complete);
    }
    assert_eq!(agent.metrics().snapshot().dispatches_total, 50);
}

#[tokio::test]
async fn follow_ups_reuse_the_previous_card() {
    let agent = static_agent();

    let first = agent
        .dispatch(Utterance::new("What is the weather like in Seattle?"))
        .await
        .unwrap();
    let context = ConversationContext::from_payload(&first).unwrap();

    let tomorrow = agent
        .dispatch(Utterance::new("and tomorrow?").with_context(context.clone()))
        .await
        .unwrap();
    assert_eq!(tomorrow.template_id, TemplateId::Weather);
    assert_eq!(tomorrow.text("city"), Some("Seattle"));
    assert_eq!(tomorrow.text("when"), Some("tomorrow"));

    let boston = agent
        .dispatch(Utterance::new("What about Boston?").with_context(context))
        .await
        .unwrap();
    assert_eq!(boston.text("city"), Some("Boston"));
}

#[tokio::test]
async fn fallback_cards_are_not_carried_forward() {
    let fallback = static_agent()
        .dispatch(Utterance::new("?!..."))
        .await
        .unwrap();
    assert!(ConversationContext::from_payload(&fallback).is_none());
}
