//! HTTP client construction shared by the Drive and Gemini integrations.

use crate::config::get_http_timeout_secs;
use reqwest::redirect::Policy;
use reqwest::Client as HttpClient;
use std::time::Duration;
use tracing::warn;

/// Browser-like user agent; Drive serves the confirmation page to it
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Creates an HTTP client configured with the standard timeout.
///
/// Uses `HTTP_TIMEOUT_SECS` environment variable or 60s default.
#[must_use]
pub fn create_http_client() -> HttpClient {
    let timeout = Duration::from_secs(get_http_timeout_secs());
    HttpClient::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "HTTP client builder failed, using defaults");
            HttpClient::new()
        })
}

/// Creates a client that never follows redirects on its own.
///
/// The Drive downloader walks redirects itself so it can bound the hop
/// count and intercept the virus-scan confirmation page. There is no
/// default-client fallback: a client that follows redirects would skip both.
///
/// # Errors
///
/// Returns the builder error if the TLS backend cannot be initialized.
pub fn create_download_client() -> Result<HttpClient, reqwest::Error> {
    let timeout = Duration::from_secs(get_http_timeout_secs());
    HttpClient::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .redirect(Policy::none())
        .build()
}

/// Returns true if the body looks like an HTML document
#[must_use]
pub fn looks_like_html(body: &str) -> bool {
    let trimmed = body.trim_start();
    ["<!DOCTYPE", "<!doctype", "<html", "<HTML"]
        .iter()
        .any(|prefix| trimmed.starts_with(prefix))
}
