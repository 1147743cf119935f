mod http;
mod static_data;

use std::time::Duration;

use cardwise_core::{ExtractedSlots, TemplateId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use http::HttpProvider;
pub use static_data::StaticProvider;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    #[error("{kind} {key} not found")]
    NotFound { kind: &'static str, key: String },
    #[error("provider timed out after {0:?}")]
    Timeout(Duration),
    #[error("upstream failure: {0}")]
    Upstream(String),
    #[error("could not decode provider response: {0}")]
    Decode(String),
}

impl ProviderError {
    pub fn not_found(kind: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            key: key.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightStatus {
    pub flight_number: String,
    pub status: String,
    #[serde(default)]
    pub gate: Option<String>,
    #[serde(default)]
    pub passenger: Option<String>,
    #[serde(default)]
    pub boarding_time: Option<String>,
    #[serde(default)]
    pub route: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherReport {
    pub city: String,
    pub temperature: f64,
    pub condition: String,
    #[serde(default)]
    pub high: Option<f64>,
    #[serde(default)]
    pub low: Option<f64>,
    #[serde(default)]
    pub wind: Option<String>,
    #[serde(default)]
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    #[serde(default)]
    pub change: Option<f64>,
    #[serde(default)]
    pub change_points: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestaurantDetails {
    pub name: String,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub reviews: Option<u32>,
    #[serde(default)]
    pub cuisine: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub menu_url: Option<String>,
}

fn put_text(slots: &mut ExtractedSlots, name: &str, value: Option<String>) {
    if let Some(value) = value.filter(|value| !value.trim().is_empty()) {
        slots.insert(name, value);
    }
}

fn put_number(slots: &mut ExtractedSlots, name: &str, value: Option<f64>) {
    if let Some(value) = value.filter(|value| value.is_finite()) {
        slots.insert(name, value);
    }
}

impl FlightStatus {
    // The requested flight number stays authoritative, so it is not copied back.
    pub fn into_slots(self) -> ExtractedSlots {
        let mut slots = ExtractedSlots::new();
        put_text(&mut slots, "status", Some(self.status));
        put_text(&mut slots, "gate", self.gate);
        put_text(&mut slots, "passenger", self.passenger);
        put_text(&mut slots, "boardingTime", self.boarding_time);
        put_text(&mut slots, "route", self.route);
        slots
    }
}

impl WeatherReport {
    pub fn into_slots(self) -> ExtractedSlots {
        let mut slots = ExtractedSlots::new();
        put_number(&mut slots, "temperature", Some(self.temperature));
        put_text(&mut slots, "condition", Some(self.condition));
        put_number(&mut slots, "high", self.high);
        put_number(&mut slots, "low", self.low);
        put_text(&mut slots, "wind", self.wind);
        put_text(&mut slots, "iconUrl", self.icon_url);
        slots
    }
}

impl Quote {
    pub fn into_slots(self) -> ExtractedSlots {
        let mut slots = ExtractedSlots::new();
        put_number(&mut slots, "price", Some(self.price));
        put_number(&mut slots, "change", self.change);
        put_number(&mut slots, "changePoints", self.change_points);
        slots
    }
}

impl RestaurantDetails {
    pub fn into_slots(self) -> ExtractedSlots {
        let mut slots = ExtractedSlots::new();
        put_text(&mut slots, "name", Some(self.name));
        put_number(&mut slots, "rating", self.rating);
        put_number(&mut slots, "reviews", self.reviews.map(f64::from));
        put_text(&mut slots, "cuisine", self.cuisine);
        put_text(&mut slots, "price", self.price);
        put_text(&mut slots, "address", self.address);
        put_text(&mut slots, "imageUrl", self.image_url);
        put_text(&mut slots, "url", self.url);
        put_text(&mut slots, "menuUrl", self.menu_url);
        slots
    }
}

pub trait DataProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn fetch_flight_status(&self, flight_number: &str) -> Result<FlightStatus, ProviderError>;
    async fn fetch_weather(&self, place: &str) -> Result<WeatherReport, ProviderError>;
    async fn fetch_quote(&self, ticker: &str) -> Result<Quote, ProviderError>;
    async fn fetch_restaurant(&self, query: &str) -> Result<RestaurantDetails, ProviderError>;
}

#[derive(Debug, Clone)]
pub enum Provider {
    Static(StaticProvider),
    Http(HttpProvider),
}

impl Provider {
    pub fn from_url(base_url: Option<&str>, timeout: Duration) -> anyhow::Result<Self> {
        match base_url.map(str::trim).filter(|url| !url.is_empty()) {
            Some(url) => Ok(Self::Http(HttpProvider::new(url, timeout)?)),
            None => Ok(Self::Static(StaticProvider::new())),
        }
    }
}

impl DataProvider for Provider {
    fn name(&self) -> &'static str {
        match self {
            Provider::Static(provider) => provider.name(),
            Provider::Http(provider) => provider.name(),
        }
    }

    async fn fetch_flight_status(&self, flight_number: &str) -> Result<FlightStatus, ProviderError> {
        match self {
            Provider::Static(provider) => provider.fetch_flight_status(flight_number).await,
            Provider::Http(provider) => provider.fetch_flight_status(flight_number).await,
        }
    }

    async fn fetch_weather(&self, place: &str) -> Result<WeatherReport, ProviderError> {
        match self {
            Provider::Static(provider) => provider.fetch_weather(place).await,
            Provider::Http(provider) => provider.fetch_weather(place).await,
        }
    }

    async fn fetch_quote(&self, ticker: &str) -> Result<Quote, ProviderError> {
        match self {
            Provider::Static(provider) => provider.fetch_quote(ticker).await,
            Provider::Http(provider) => provider.fetch_quote(ticker).await,
        }
    }

    async fn fetch_restaurant(&self, query: &str) -> Result<RestaurantDetails, ProviderError> {
        match self {
            Provider::Static(provider) => provider.fetch_restaurant(query).await,
            Provider::Http(provider) => provider.fetch_restaurant(query).await,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveRequest {
    Flight(String),
    Weather(String),
    Quote(String),
    Restaurant(String),
}

impl LiveRequest {
    pub fn for_template(template: TemplateId, slots: &ExtractedSlots) -> Option<Self> {
        let key = |name: &str| slots.text(name).map(str::to_string);
        match template {
            TemplateId::FlightUpdate => key("flightNumber").map(Self::Flight),
            TemplateId::Weather => key("city").map(Self::Weather),
            TemplateId::StockUpdate => key("symbol").map(Self::Quote),
            TemplateId::RestaurantDetails => key("query").map(Self::Restaurant),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Flight(_) => "flight",
            Self::Weather(_) => "weather",
            Self::Quote(_) => "quote",
            Self::Restaurant(_) => "restaurant",
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Self::Flight(key) | Self::Weather(key) | Self::Quote(key) | Self::Restaurant(key) => key,
        }
    }

    pub async fn execute<P: DataProvider>(&self, provider: &P) -> Result<ExtractedSlots, ProviderError> {
        match self {
            Self::Flight(number) => provider
                .fetch_flight_status(number)
                .await
                .map(FlightStatus::into_slots),
            Self::Weather(place) => provider
                .fetch_weather(place)
                .await
                .map(WeatherReport::into_slots),
            Self::Quote(ticker) => provider.fetch_quote(ticker).await.map(Quote::into_slots),
            Self::Restaurant(query) => provider
                .fetch_restaurant(query)
                .await
                .map(RestaurantDetails::into_slots),
        }
    }
}
