// ABOUTME: WeatherAPI forecast client
// ABOUTME: Looks up the forecast condition text for one location and day

use super::ensure_success;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;

pub const WEATHER_API_URL: &str = "http://api.weatherapi.com/v1";

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    forecast: Forecast,
}

#[derive(Debug, Deserialize)]
struct Forecast {
    #[serde(default)]
    forecastday: Vec<ForecastDay>,
}

#[derive(Debug, Deserialize)]
struct ForecastDay {
    day: Day,
}

#[derive(Debug, Deserialize)]
struct Day {
    condition: Condition,
}

#[derive(Debug, Deserialize)]
struct Condition {
    text: String,
}

#[derive(Clone)]
pub struct WeatherClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl WeatherClient {
    pub fn new(api_key: &str) -> Self {
        Self::with_base_url(WEATHER_API_URL, api_key)
    }

    pub fn with_base_url(base_url: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Forecast condition (e.g. "Sunny") at `location` on `date`; `None` when
    /// the API has no forecast for that day
    pub async fn condition(&self, location: &str, date: NaiveDate) -> Result<Option<String>> {
        let dt = date.format("%Y-%m-%d").to_string();
        let response = self
            .client
            .get(format!("{}/forecast.json", self.base_url))
            .query(&[
                ("key", self.api_key.as_str()),
                ("q", location),
                ("dt", dt.as_str()),
            ])
            .send()
            .await
            .context("Weather forecast request failed")?;

        let response = ensure_success("weather", response)?;
        let body: ForecastResponse = response
            .json()
            .await
            .context("Failed to decode weather forecast response")?;
        Ok(body
            .forecast
            .forecastday
            .into_iter()
            .next()
            .map(|d| d.day.condition.text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_condition_for_day() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast.json"))
            .and(query_param("q", "Aix-en-Provence"))
            .and(query_param("dt", "2024-07-20"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "location": {"name": "Aix-en-Provence"},
                "forecast": {"forecastday": [
                    {"date": "2024-07-20", "day": {"condition": {"text": "Sunny", "code": 1000}}}
                ]}
            })))
            .mount(&server)
            .await;

        let client = WeatherClient::with_base_url(&server.uri(), "k");
        let date = NaiveDate::from_ymd_opt(2024, 7, 20).unwrap();
        let condition = client.condition("Aix-en-Provence", date).await.unwrap();
        assert_eq!(condition.as_deref(), Some("Sunny"));
    }

    #[tokio::test]
    async fn test_missing_forecast_day() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"forecast": {"forecastday": []}})),
            )
            .mount(&server)
            .await;

        let client = WeatherClient::with_base_url(&server.uri(), "k");
        let date = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
        assert_eq!(client.condition("Nowhere", date).await.unwrap(), None);
    }
}
