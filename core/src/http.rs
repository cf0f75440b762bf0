//! HTTP client helpers shared by the control and stream clients

use std::time::Duration;

use reqwest::Client;

/// Client for short request/response calls.
pub fn create_client(request_timeout: Duration, connect_timeout: Duration) -> Client {
  Client::builder()
    .timeout(request_timeout)
    .connect_timeout(connect_timeout)
    .build()
    .unwrap_or_else(|_| Client::new())
}

/// Client for the long-lived event stream. No timeout at all: a request
/// timeout would cut the feed, and liveness is the watchdog's job.
pub fn create_stream_client() -> Client {
  Client::builder()
    .build()
    .unwrap_or_else(|_| Client::new())
}

/// Joins a backend base URL and an `api/...` path.
pub fn endpoint(base_url: &str, path: &str) -> String {
  format!(
    "{}/{}",
    base_url.trim_end_matches('/'),
    path.trim_start_matches('/')
  )
}
