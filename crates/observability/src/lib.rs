use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

#[derive(Debug, Default)]
pub struct AppMetrics {
    dispatches_total: AtomicU64,
    fallback_total: AtomicU64,
    provider_timeouts_total: AtomicU64,
    provider_errors_total: AtomicU64,
    cancelled_total: AtomicU64,
    semantic_inference_total: AtomicU64,
    forms_submitted_total: AtomicU64,
    total_latency_millis: AtomicU64,
    cards_by_template: Mutex<BTreeMap<&'static str, u64>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub dispatches_total: u64,
    pub fallback_total: u64,
    pub provider_timeouts_total: u64,
    pub provider_errors_total: u64,
    pub cancelled_total: u64,
    pub semantic_inference_total: u64,
    pub forms_submitted_total: u64,
    pub avg_latency_millis: f64,
    pub cards_by_template: BTreeMap<String, u64>,
}

impl AppMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_dispatch(&self) {
        self.dispatches_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("cardwise_dispatches_total").increment(1);
    }

    pub fn inc_fallback(&self) {
        self.fallback_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("cardwise_fallbacks_total").increment(1);
    }

    pub fn inc_provider_timeout(&self, kind: &'static str) {
        self.provider_timeouts_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("cardwise_provider_timeouts_total", "kind" => kind).increment(1);
    }

    pub fn inc_provider_error(&self, kind: &'static str) {
        self.provider_errors_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("cardwise_provider_errors_total", "kind" => kind).increment(1);
    }

    pub fn inc_cancelled(&self) {
        self.cancelled_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("cardwise_cancellations_total").increment(1);
    }

    pub fn inc_semantic_inference(&self) {
        self.semantic_inference_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("cardwise_semantic_inferences_total").increment(1);
    }

    pub fn inc_form_submitted(&self, accepted: bool) {
        self.forms_submitted_total.fetch_add(1, Ordering::Relaxed);
        let outcome = if accepted { "accepted" } else { "rejected" };
        metrics::counter!("cardwise_forms_submitted_total", "outcome" => outcome).increment(1);
    }

    pub fn record_card(&self, template: &'static str, status: &'static str) {
        *self.cards_by_template.lock().entry(template).or_default() += 1;
        metrics::counter!("cardwise_cards_total", "template" => template, "status" => status)
            .increment(1);
    }

    pub fn observe_latency(&self, duration: Duration) {
        self.total_latency_millis
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
        metrics::histogram!("cardwise_dispatch_latency_seconds").record(duration.as_secs_f64());
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let dispatches = self.dispatches_total.load(Ordering::Relaxed);
        let latency = self.total_latency_millis.load(Ordering::Relaxed);

        MetricsSnapshot {
            dispatches_total: dispatches,
            fallback_total: self.fallback_total.load(Ordering::Relaxed),
            provider_timeouts_total: self.provider_timeouts_total.load(Ordering::Relaxed),
            provider_errors_total: self.provider_errors_total.load(Ordering::Relaxed),
            cancelled_total: self.cancelled_total.load(Ordering::Relaxed),
            semantic_inference_total: self.semantic_inference_total.load(Ordering::Relaxed),
            forms_submitted_total: self.forms_submitted_total.load(Ordering::Relaxed),
            avg_latency_millis: if dispatches == 0 {
                0.0
            } else {
                latency as f64 / dispatches as f64
            },
            cards_by_template: self
                .cards_by_template
                .lock()
                .iter()
                .map(|(template, count)| (template.to_string(), *count))
                .collect(),
        }
    }
}

pub fn init_tracing(service_name: &str) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}=info,cardwise_agents=info,cardwise_providers=info",
                service_name
            ))
        });

        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(std::io::stderr)
            .init();
    });
}
