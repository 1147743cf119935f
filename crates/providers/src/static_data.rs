use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::{DataProvider, FlightStatus, ProviderError, Quote, RestaurantDetails, WeatherReport};

#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    missing: Arc<RwLock<HashSet<String>>>,
    delay: Option<Duration>,
    calls: Arc<AtomicU64>,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_missing(self, key: &str) -> Self {
        self.mark_missing(key);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn mark_missing(&self, key: &str) {
        self.missing.write().insert(key.trim().to_lowercase());
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    async fn lookup(&self, kind: &'static str, key: &str) -> Result<(), ProviderError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.missing.read().contains(&key.trim().to_lowercase()) {
            return Err(ProviderError::not_found(kind, key));
        }
        Ok(())
    }
}

impl DataProvider for StaticProvider {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn fetch_flight_status(&self, flight_number: &str) -> Result<FlightStatus, ProviderError> {
        self.lookup("flight", flight_number).await?;
        Ok(FlightStatus {
            flight_number: flight_number.to_string(),
            status: "On Time".to_string(),
            gate: Some("G12".to_string()),
            passenger: Some("Jane Doe".to_string()),
            boarding_time: Some("14:30".to_string()),
            route: Some("SFO > LHR".to_string()),
        })
    }

    async fn fetch_weather(&self, place: &str) -> Result<WeatherReport, ProviderError> {
        self.lookup("weather", place).await?;
        Ok(WeatherReport {
            city: place.to_string(),
            temperature: 72.0,
            condition: "Sunny".to_string(),
            high: Some(78.0),
            low: Some(62.0),
            wind: Some("10 mph".to_string()),
            icon_url: Some("https://openweathermap.org/img/wn/01d@2x.png".to_string()),
        })
    }

    async fn fetch_quote(&self, ticker: &str) -> Result<Quote, ProviderError> {
        self.lookup("quote", ticker).await?;
        Ok(Quote {
            symbol: ticker.to_uppercase(),
            price: 350.25,
            change: Some(1.25),
            change_points: Some(4.30),
        })
    }

    async fn fetch_restaurant(&self, query: &str) -> Result<RestaurantDetails, ProviderError> {
        self.lookup("restaurant", query).await?;
        let cuisine = cuisine_of(query);
        Ok(RestaurantDetails {
            name: format!("The Best {cuisine} Place"),
            rating: Some(4.8),
            reviews: Some(342),
            cuisine: Some(cuisine),
            price: Some("$$$".to_string()),
            address: Some("123 Flavor St, Food City".to_string()),
            image_url: Some("https://adaptivecards.io/content/cats/2.png".to_string()),
            url: Some("https://opentable.com".to_string()),
            menu_url: Some("https://opentable.com/menu".to_string()),
        })
    }
}

// The word right before "restaurant" in queries like "sushi restaurant in Paris".
fn cuisine_of(query: &str) -> String {
    let words = query.split_whitespace().collect::<Vec<_>>();
    words
        .iter()
        .position(|word| word.eq_ignore_ascii_case("restaurant"))
        .and_then(|idx| idx.checked_sub(1))
        .and_then(|idx| words.get(idx))
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .filter(|word: &String| word.chars().all(char::is_alphabetic) && !word.is_empty())
        .unwrap_or_else(|| "Local".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LiveRequest;

    #[tokio::test]
    async fn returns_sample_flight() {
        let provider = StaticProvider::new();
        let flight = provider.fetch_flight_status("UA123").await.unwrap();
        assert_eq!(flight.status, "On Time");
        assert_eq!(flight.gate.as_deref(), Some("G12"));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn missing_keys_are_not_found() {
        let provider = StaticProvider::new().with_missing("zz999");
        let err = provider.fetch_flight_status("ZZ999").await.unwrap_err();
        assert_eq!(err, ProviderError::not_found("flight", "ZZ999"));
    }

    #[tokio::test]
    async fn restaurant_name_uses_cuisine() {
        let slots = LiveRequest::Restaurant("sushi restaurant".to_string())
            .execute(&StaticProvider::new())
            .await
            .unwrap();
        assert_eq!(slots.text("name"), Some("The Best Sushi Place"));

        let generic = StaticProvider::new()
            .fetch_restaurant("somewhere to eat")
            .await
            .unwrap();
        assert_eq!(generic.name, "The Best Local Place");
    }

    #[tokio::test]
    async fn quote_slots_carry_change() {
        let slots = LiveRequest::Quote("GOOGL".to_string())
            .execute(&StaticProvider::new())
            .await
            .unwrap();
        assert_eq!(slots.get("price").and_then(|v| v.as_number()), Some(350.25));
        assert_eq!(slots.get("change").and_then(|v| v.as_number()), Some(1.25));
    }
}
