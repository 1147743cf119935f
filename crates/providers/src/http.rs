use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{DataProvider, FlightStatus, ProviderError, Quote, RestaurantDetails, WeatherReport};

#[derive(Debug, Clone)]
pub struct HttpProvider {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpProvider {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .context("failed to build provider http client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        kind: &'static str,
        key: &str,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        let url = self.endpoint(path);
        debug!(provider = "http", kind, key, url = %url, "fetching live data");

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|err| self.transport_error(err))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ProviderError::not_found(kind, key));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Upstream(format!("{kind} lookup returned {status}: {body}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| self.transport_error(err))?;
        serde_json::from_slice(&bytes).map_err(|err| ProviderError::Decode(err.to_string()))
    }

    fn transport_error(&self, err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout(self.timeout)
        } else {
            ProviderError::Upstream(err.to_string())
        }
    }
}

impl DataProvider for HttpProvider {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch_flight_status(&self, flight_number: &str) -> Result<FlightStatus, ProviderError> {
        self.get_json("flight", flight_number, &format!("flights/{flight_number}"), &[])
            .await
    }

    async fn fetch_weather(&self, place: &str) -> Result<WeatherReport, ProviderError> {
        self.get_json("weather", place, "weather", &[("place", place)]).await
    }

    async fn fetch_quote(&self, ticker: &str) -> Result<Quote, ProviderError> {
        self.get_json("quote", ticker, &format!("quotes/{ticker}"), &[])
            .await
    }

    async fn fetch_restaurant(&self, query: &str) -> Result<RestaurantDetails, ProviderError> {
        self.get_json("restaurant", query, "restaurants", &[("query", query)])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_join_without_double_slashes() {
        let provider = HttpProvider::new("http://localhost:9000/", Duration::from_millis(500)).unwrap();
        assert_eq!(provider.base_url(), "http://localhost:9000");
        assert_eq!(provider.endpoint("/flights/UA123"), "http://localhost:9000/flights/UA123");
        assert_eq!(provider.endpoint("weather"), "http://localhost:9000/weather");
    }

    #[tokio::test]
    async fn unreachable_service_is_an_error() {
        let provider = HttpProvider::new("http://127.0.0.1:9", Duration::from_millis(300)).unwrap();
        let err = provider.fetch_quote("MSFT").await.unwrap_err();
        assert!(matches!(err, ProviderError::Upstream(_) | ProviderError::Timeout(_)));
    }
}
