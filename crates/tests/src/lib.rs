use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cardwise_agents::CardAgent;
use cardwise_core::{DispatchPolicy, FormDefinition, TemplateRegistry};
use cardwise_ml::CardMlStack;
use cardwise_observability::AppMetrics;
use cardwise_providers::{
    DataProvider, FlightStatus, ProviderError, Quote, RestaurantDetails, StaticProvider,
    WeatherReport,
};
use cardwise_storage::{FormRepository, MemoryStore, StoredForm};

pub fn standard_registry() -> Arc<TemplateRegistry> {
    Arc::new(TemplateRegistry::standard().expect("catalogue is valid"))
}

pub fn agent_with<P: DataProvider>(provider: P, policy: DispatchPolicy) -> CardAgent<P, MemoryStore> {
    CardAgent::new(
        standard_registry(),
        CardMlStack::disabled(),
        policy,
        Arc::new(provider),
        Arc::new(MemoryStore::new()),
        AppMetrics::shared(),
    )
}

pub fn static_agent() -> CardAgent<StaticProvider, MemoryStore> {
    agent_with(StaticProvider::new(), DispatchPolicy::default())
}

pub fn short_timeout() -> DispatchPolicy {
    DispatchPolicy {
        provider_timeout: Duration::from_millis(25),
        ..DispatchPolicy::default()
    }
}

/// Never answers. Counts how many lookups were started.
#[derive(Debug, Default)]
pub struct StalledProvider {
    started: AtomicUsize,
}

impl StalledProvider {
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    async fn stall<T>(&self) -> Result<T, ProviderError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

impl DataProvider for StalledProvider {
    fn name(&self) -> &'static str {
        "stalled"
    }

    async fn fetch_flight_status(&self, _: &str) -> Result<FlightStatus, ProviderError> {
        self.stall().await
    }

    async fn fetch_weather(&self, _: &str) -> Result<WeatherReport, ProviderError> {
        self.stall().await
    }

    async fn fetch_quote(&self, _: &str) -> Result<Quote, ProviderError> {
        self.stall().await
    }

    async fn fetch_restaurant(&self, _: &str) -> Result<RestaurantDetails, ProviderError> {
        self.stall().await
    }
}

/// Fails every lookup with an upstream error.
#[derive(Debug, Default)]
pub struct BrokenProvider;

impl DataProvider for BrokenProvider {
    fn name(&self) -> &'static str {
        "broken"
    }

    async fn fetch_flight_status(&self, _: &str) -> Result<FlightStatus, ProviderError> {
        Err(ProviderError::Upstream("503 service unavailable".to_string()))
    }

    async fn fetch_weather(&self, _: &str) -> Result<WeatherReport, ProviderError> {
        Err(ProviderError::Upstream("503 service unavailable".to_string()))
    }

    async fn fetch_quote(&self, _: &str) -> Result<Quote, ProviderError> {
        Err(ProviderError::Decode("expected value at line 1".to_string()))
    }

    async fn fetch_restaurant(&self, _: &str) -> Result<RestaurantDetails, ProviderError> {
        Err(ProviderError::Upstream("503 service unavailable".to_string()))
    }
}

/// Rejects every write, as a full disk or a locked database would.
#[derive(Debug, Default)]
pub struct ReadOnlyFormStore;

impl FormRepository for ReadOnlyFormStore {
    async fn save_form(&self, definition: &FormDefinition) -> anyhow::Result<()> {
        anyhow::bail!("database is locked while saving {}", definition.form_id)
    }

    async fn load_form(&self, _: &str) -> anyhow::Result<Option<FormDefinition>> {
        Ok(None)
    }

    async fn list_forms(&self) -> anyhow::Result<Vec<StoredForm>> {
        Ok(Vec::new())
    }
}
