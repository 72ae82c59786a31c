// ABOUTME: Thin adapters over the REST services and calendar files the feature modules consume
// ABOUTME: Each HTTP client takes an overridable base URL so tests can point it at a mock server

pub mod calendar;
pub mod giphy;
pub mod news;
pub mod twitch;
pub mod weather;

pub use calendar::{load_availability, Availability};
pub use giphy::GiphyClient;
pub use news::{Article, NewsClient};
pub use twitch::TwitchClient;
pub use weather::WeatherClient;

use salon_core::ExternalCallError;

/// Turn a non-success status into an `ExternalCallError` for `service`
pub(crate) fn ensure_success(
    service: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ExternalCallError> {
    let status = response.status();
    if !status.is_success() {
        tracing::warn!(service, status = %status, "External call failed");
        return Err(ExternalCallError {
            service,
            status: status.as_u16(),
        });
    }
    Ok(response)
}
