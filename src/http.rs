use reqwest::Client;
use std::time::Duration;

/// Shared HTTP client for backend calls. The PDF fetch step can take a
/// while (the backend downloads the whole file before answering), so the
/// request timeout defaults generously high.
pub fn build_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(env_secs("HTTP_TIMEOUT_SECS", 120)))
        .connect_timeout(Duration::from_secs(env_secs("HTTP_CONNECT_TIMEOUT_SECS", 5)))
        .build()
        .unwrap_or_else(|_| Client::new())
}

fn env_secs(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}
