mod cancel;

use std::sync::Arc;
use std::time::Instant;

use cardwise_core::forms::{
    definition_from_payload, missing_fields, not_found_message, success_message,
    validation_failed_message,
};
use cardwise_core::{
    render_card, CardError, CardPayload, DispatchPolicy, ExtractedSlots, FormSubmission,
    SlotExtractor, TemplateClassifier, TemplateId, TemplateRegistry, Utterance,
};
use cardwise_ml::CardMlStack;
use cardwise_observability::AppMetrics;
use cardwise_providers::{DataProvider, LiveRequest};
use cardwise_storage::FormRepository;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

pub use cancel::{CancelToken, DispatchStage};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("dispatch was cancelled")]
    Cancelled,
    #[error(transparent)]
    Registry(#[from] CardError),
    #[error("form storage failed: {0:#}")]
    Storage(anyhow::Error),
}

pub struct CardAgent<P, S>
where
    P: DataProvider,
    S: FormRepository,
{
    classifier: TemplateClassifier,
    extractor: SlotExtractor,
    policy: DispatchPolicy,
    provider: Arc<P>,
    store: Arc<S>,
    metrics: Arc<AppMetrics>,
}

impl<P, S> Clone for CardAgent<P, S>
where
    P: DataProvider,
    S: FormRepository,
{
    fn clone(&self) -> Self {
        Self {
            classifier: self.classifier.clone(),
            extractor: self.extractor.clone(),
            policy: self.policy.clone(),
            provider: self.provider.clone(),
            store: self.store.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

impl<P, S> CardAgent<P, S>
where
    P: DataProvider,
    S: FormRepository,
{
    pub fn new(
        registry: Arc<TemplateRegistry>,
        ml_stack: CardMlStack,
        policy: DispatchPolicy,
        provider: Arc<P>,
        store: Arc<S>,
        metrics: Arc<AppMetrics>,
    ) -> Self {
        info!(
            templates = registry.len(),
            semantic = ml_stack.semantic_enabled(),
            context_carry = policy.context_carry,
            provider_timeout_ms = policy.provider_timeout.as_millis() as u64,
            "card agent ready"
        );

        let mut classifier =
            TemplateClassifier::new(registry).with_context_carry(policy.context_carry);
        if let Some(scorer) = ml_stack.scorer {
            classifier = classifier.with_semantic(scorer);
        }

        Self {
            classifier,
            extractor: SlotExtractor::new().with_context_carry(policy.context_carry),
            policy,
            provider,
            store,
            metrics,
        }
    }

    pub fn registry(&self) -> &Arc<TemplateRegistry> {
        self.classifier.registry()
    }

    pub fn policy(&self) -> &DispatchPolicy {
        &self.policy
    }

    pub fn metrics(&self) -> &Arc<AppMetrics> {
        &self.metrics
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub async fn dispatch(&self, utterance: Utterance) -> Result<CardPayload, DispatchError> {
        self.dispatch_with_cancel(utterance, &CancelToken::new()).await
    }

    /// Runs one dispatch. Cancellation is observed before classification, while a
    /// live-data fetch is pending and before a form definition is persisted; a
    /// cancelled dispatch never yields a payload.
    #[instrument(skip(self, utterance, cancel), fields(dispatch_id = %Uuid::new_v4()))]
    pub async fn dispatch_with_cancel(
        &self,
        utterance: Utterance,
        cancel: &CancelToken,
    ) -> Result<CardPayload, DispatchError> {
        let started = Instant::now();
        self.metrics.inc_dispatch();

        let result = self.run(&utterance, cancel, started).await;
        if matches!(result, Err(DispatchError::Cancelled)) {
            self.metrics.inc_cancelled();
            info!(stage = DispatchStage::Done.as_str(), "dispatch cancelled");
        }
        result
    }

    async fn run(
        &self,
        utterance: &Utterance,
        cancel: &CancelToken,
        started: Instant,
    ) -> Result<CardPayload, DispatchError> {
        debug!(stage = DispatchStage::Idle.as_str(), chars = utterance.text.len(), "dispatch received");
        if cancel.is_cancelled() {
            return Err(DispatchError::Cancelled);
        }

        let candidates = self.classifier.classify(utterance);
        if self.classifier.semantic_model().is_some() {
            self.metrics.inc_semantic_inference();
        }
        debug!(
            stage = DispatchStage::Classified.as_str(),
            candidates = ?candidates
                .iter()
                .map(|candidate| (candidate.template_id.as_str(), candidate.confidence))
                .collect::<Vec<_>>(),
            "classified utterance"
        );

        let Some(top) = candidates
            .first()
            .filter(|candidate| self.policy.admits(candidate))
        else {
            return self.fall_back(CardError::NoCandidate, started);
        };
        let confidence = top.confidence;

        let definition = self.classifier.registry().lookup(top.template_id)?;
        let mut slots = self.extractor.extract(utterance, definition);

        if let Some(request) = LiveRequest::for_template(definition.id, &slots) {
            if let Some(live) = self.fetch_live(&request, cancel).await? {
                slots.extend(live);
            }
        }
        debug!(
            stage = DispatchStage::Extracted.as_str(),
            template = definition.id.as_str(),
            slots = slots.len(),
            "extracted slots"
        );

        let payload = match render_card(definition, &slots) {
            Ok(payload) => payload,
            Err(err) => return self.fall_back(err, started),
        };
        debug!(
            stage = DispatchStage::Rendered.as_str(),
            template = payload.template_id.as_str(),
            "rendered card"
        );

        if let Some(form) = definition_from_payload(&payload) {
            if cancel.is_cancelled() {
                return Err(DispatchError::Cancelled);
            }
            self.store
                .save_form(&form)
                .await
                .map_err(DispatchError::Storage)?;
            debug!(form_id = %form.form_id, fields = form.fields.len(), "stored form definition");
        }

        Ok(self.finish(payload, Some(confidence), started))
    }

    /// Live data for the selected template. Any provider failure or timeout
    /// leaves the live slots absent; only cancellation aborts the dispatch.
    async fn fetch_live(
        &self,
        request: &LiveRequest,
        cancel: &CancelToken,
    ) -> Result<Option<ExtractedSlots>, DispatchError> {
        let bound = self.policy.provider_timeout;
        let fetch = tokio::time::timeout(bound, request.execute(self.provider.as_ref()));

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DispatchError::Cancelled),
            outcome = fetch => outcome,
        };

        match outcome {
            Ok(Ok(slots)) => Ok(Some(slots)),
            Ok(Err(err)) => {
                if err.is_timeout() {
                    self.metrics.inc_provider_timeout(request.kind());
                } else {
                    self.metrics.inc_provider_error(request.kind());
                }
                warn!(
                    provider = self.provider.name(),
                    kind = request.kind(),
                    key = request.key(),
                    error = %err,
                    "live data unavailable"
                );
                Ok(None)
            }
            Err(_) => {
                self.metrics.inc_provider_timeout(request.kind());
                warn!(
                    provider = self.provider.name(),
                    kind = request.kind(),
                    key = request.key(),
                    timeout_ms = bound.as_millis() as u64,
                    "live data timed out"
                );
                Ok(None)
            }
        }
    }

    fn fall_back(&self, err: CardError, started: Instant) -> Result<CardPayload, DispatchError> {
        let Some(payload) = self.policy.fallback_payload(&err) else {
            return Err(err.into());
        };

        match &err {
            CardError::IncompleteSlots { template, missing } => warn!(
                stage = DispatchStage::Fallback.as_str(),
                template = template.as_str(),
                missing = %missing.join(","),
                "required slots missing"
            ),
            other => debug!(stage = DispatchStage::Fallback.as_str(), reason = %other, "no card selected"),
        }
        self.metrics.inc_fallback();
        Ok(self.finish(payload, None, started))
    }

    fn finish(&self, payload: CardPayload, confidence: Option<f32>, started: Instant) -> CardPayload {
        let elapsed = started.elapsed();
        self.metrics.observe_latency(elapsed);
        self.metrics
            .record_card(payload.template_id.as_str(), payload.status.as_str());

        info!(
            stage = DispatchStage::Done.as_str(),
            template = payload.template_id.as_str(),
            status = payload.status.as_str(),
            confidence = confidence.unwrap_or(0.0),
            latency_ms = elapsed.as_millis() as u64,
            "dispatch complete"
        );
        payload
    }

    #[instrument(skip(self, submission), fields(form_id = %submission.form_id))]
    pub async fn submit_form(&self, submission: FormSubmission) -> Result<CardPayload, DispatchError> {
        let stored = self
            .store
            .load_form(&submission.form_id)
            .await
            .map_err(DispatchError::Storage)?;

        let (message, accepted) = match stored {
            None => (not_found_message(&submission.form_id), false),
            Some(definition) => {
                let missing = missing_fields(&definition, &submission);
                if missing.is_empty() {
                    (success_message(&definition), true)
                } else {
                    (validation_failed_message(&missing), false)
                }
            }
        };
        self.metrics.inc_form_submitted(accepted);
        info!(accepted, "form submission handled");

        let mut slots = ExtractedSlots::new();
        slots.insert("message", message);
        let definition = self.classifier.registry().lookup(TemplateId::Simple)?;
        Ok(render_card(definition, &slots)?)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use cardwise_core::{CardStatus, ConversationContext};
    use cardwise_providers::StaticProvider;
    use cardwise_storage::MemoryStore;

    use super::*;

    fn agent_with(provider: StaticProvider, policy: DispatchPolicy) -> CardAgent<StaticProvider, MemoryStore> {
        CardAgent::new(
            Arc::new(TemplateRegistry::standard().unwrap()),
            CardMlStack::disabled(),
            policy,
            Arc::new(provider),
            Arc::new(MemoryStore::new()),
            AppMetrics::shared(),
        )
    }

    fn agent() -> CardAgent<StaticProvider, MemoryStore> {
        agent_with(StaticProvider::new(), DispatchPolicy::default())
    }

    #[tokio::test]
    async fn flight_update_folds_in_live_slots() {
        let payload = agent()
            .dispatch(Utterance::new("Is flight UA123 on time?"))
            .await
            .unwrap();

        assert_eq!(payload.template_id, TemplateId::FlightUpdate);
        assert_eq!(payload.status, CardStatus::Complete);
        assert_eq!(payload.text("flightNumber"), Some("UA123"));
        assert_eq!(payload.text("status"), Some("On Time"));
        assert_eq!(payload.text("gate"), Some("G12"));
    }

    #[tokio::test]
    async fn missing_flight_number_falls_back() {
        let agent = agent();
        let payload = agent
            .dispatch(Utterance::new("Check flight status"))
            .await
            .unwrap();

        assert_eq!(payload.status, CardStatus::Fallback);
        assert_eq!(payload.template_id, TemplateId::Unrecognized);
        assert_eq!(agent.metrics().snapshot().fallback_total, 1);
    }

    #[tokio::test]
    async fn slow_provider_is_treated_as_absent() {
        let policy = DispatchPolicy {
            provider_timeout: Duration::from_millis(20),
            ..DispatchPolicy::default()
        };
        let agent = agent_with(StaticProvider::new().with_delay(Duration::from_millis(500)), policy);

        let payload = agent
            .dispatch(Utterance::new("Show me the stock price for GOOGL."))
            .await
            .unwrap();

        assert_eq!(payload.status, CardStatus::Fallback);
        assert_eq!(payload.text("requestedTemplate"), Some("StockUpdate"));
        assert_eq!(agent.metrics().snapshot().provider_timeouts_total, 1);
    }

    #[tokio::test]
    async fn confidence_floor_rejects_topic_only_matches() {
        let utterance = "cpu and disk look odd";
        let open = agent().dispatch(Utterance::new(utterance)).await.unwrap();
        assert_eq!(open.template_id, TemplateId::Alert);
        assert_eq!(open.status, CardStatus::Complete);

        let strict = agent_with(
            StaticProvider::new(),
            DispatchPolicy {
                min_confidence: 0.95,
                ..DispatchPolicy::default()
            },
        );
        let payload = strict.dispatch(Utterance::new(utterance)).await.unwrap();
        assert_eq!(payload.status, CardStatus::Fallback);
        assert_eq!(payload.text("requestedTemplate"), None);
        assert_eq!(
            payload.notice.as_deref(),
            Some(CardError::NoCandidate.to_string().as_str())
        );
    }

    #[tokio::test]
    async fn cancelled_before_start_returns_error() {
        let agent = agent();
        let token = CancelToken::new();
        token.cancel();

        let err = agent
            .dispatch_with_cancel(Utterance::new("Hi there! Who are you?"), &token)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Cancelled));
        assert_eq!(agent.metrics().snapshot().cancelled_total, 1);
    }

    #[tokio::test]
    async fn follow_up_reuses_previous_template() {
        let agent = agent();
        let first = agent
            .dispatch(Utterance::new("What is the weather like in Seattle?"))
            .await
            .unwrap();
        let context = ConversationContext::from_payload(&first).unwrap();

        let second = agent
            .dispatch(Utterance::new("What about Boston?").with_context(context))
            .await
            .unwrap();
        assert_eq!(second.template_id, TemplateId::Weather);
        assert_eq!(second.text("city"), Some("Boston"));
    }

    #[tokio::test]
    async fn rendered_forms_accept_valid_submissions() {
        let agent = agent();
        let form = agent
            .dispatch(Utterance::new("I want to give feedback"))
            .await
            .unwrap();
        assert_eq!(form.template_id, TemplateId::Form);
        let form_id = form.text("formId").unwrap().to_string();

        let reply = agent
            .submit_form(FormSubmission {
                form_id: form_id.clone(),
                values: BTreeMap::from([
                    ("name".to_string(), "Ada".to_string()),
                    ("date".to_string(), "2026-03-01".to_string()),
                ]),
            })
            .await
            .unwrap();
        assert_eq!(reply.template_id, TemplateId::Simple);
        assert!(reply.text("message").unwrap().starts_with("Success!"));

        let rejected = agent
            .submit_form(FormSubmission {
                form_id,
                values: BTreeMap::new(),
            })
            .await
            .unwrap();
        assert!(rejected.text("message").unwrap().starts_with("Validation Failed:"));
    }
}
