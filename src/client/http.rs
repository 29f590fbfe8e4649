//! HTTP client construction shared by web-API backends.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use reqwest::cookie::Jar;

use super::ClientError;

/// User-Agent sent by every backend.
#[must_use]
pub fn user_agent() -> String {
    format!("curator/{}", env!("CARGO_PKG_VERSION"))
}

/// Timeouts for one backend connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub connect: Duration,
    pub request: Duration,
}

impl HttpTimeouts {
    #[must_use]
    pub fn from_secs(connect_secs: u64, request_secs: u64) -> Self {
        Self {
            connect: Duration::from_secs(connect_secs),
            request: Duration::from_secs(request_secs),
        }
    }
}

/// Builds a client with a private cookie store for the session cookie.
///
/// # Errors
///
/// Returns [`ClientError::Http`] when the TLS backend cannot be initialised.
pub fn build_http_client(
    endpoint: &str,
    timeouts: HttpTimeouts,
    cookie_jar: Arc<Jar>,
) -> Result<Client, ClientError> {
    Client::builder()
        .connect_timeout(timeouts.connect)
        .timeout(timeouts.request)
        .user_agent(user_agent())
        .gzip(true)
        .cookie_provider(cookie_jar)
        .build()
        .map_err(|error| ClientError::http(endpoint, error))
}
