//! A mocked qBittorrent Web API on a local wiremock server.
//!
//! Tests that need the server call [`MockApi::start_or_skip`] and return early
//! on `None`, which happens when localhost sockets cannot be bound (sandboxed
//! CI). Set `CURATOR_REQUIRE_SOCKET_TESTS=1` to turn that skip into a failure.

use std::net::TcpListener;
use std::panic::Location;
use std::path::Path;

use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REQUIRE_SOCKETS_ENV: &str = "CURATOR_REQUIRE_SOCKET_TESTS";

pub struct MockApi {
    pub server: MockServer,
}

impl MockApi {
    #[track_caller]
    pub fn start_or_skip() -> impl std::future::Future<Output = Option<Self>> {
        let available = sockets_available(Location::caller());
        async move {
            if available {
                Some(Self {
                    server: MockServer::start().await,
                })
            } else {
                None
            }
        }
    }

    #[must_use]
    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Mounts what `connect` needs without credentials: version, preferences and categories.
    pub async fn mount_session(&self, version: &str, save_path: &Path, categories: Value) {
        Mock::given(method("GET"))
            .and(path("/api/v2/app/webapiVersion"))
            .respond_with(ResponseTemplate::new(200).set_body_string(version))
            .mount(&self.server)
            .await;
        self.mount_json("app/preferences", json!({ "save_path": save_path }))
            .await;
        self.mount_json("torrents/categories", categories).await;
    }

    /// Answers GETs to `endpoint` with `body`.
    pub async fn mount_json(&self, endpoint: &str, body: Value) {
        Mock::given(method("GET"))
            .and(path(format!("/api/v2/{endpoint}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Accepts POSTs to `endpoint` with an empty 200.
    pub async fn mount_ok(&self, endpoint: &str) {
        Mock::given(method("POST"))
            .and(path(format!("/api/v2/{endpoint}")))
            .respond_with(ResponseTemplate::new(200))
            .mount(&self.server)
            .await;
    }

    /// Endpoints of every POST received, in order, without the `/api/v2/` prefix.
    pub async fn posted(&self) -> Vec<String> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|request| request.method.as_str() == "POST")
            .map(|request| request.url.path().trim_start_matches("/api/v2/").to_string())
            .collect()
    }
}

fn sockets_available(caller: &Location<'_>) -> bool {
    if TcpListener::bind("127.0.0.1:0").is_ok() {
        return true;
    }

    let message = format!(
        "[socket-bound-test] {}:{} needs a localhost socket for the mocked Web API",
        caller.file(),
        caller.line()
    );
    let required = std::env::var(REQUIRE_SOCKETS_ENV)
        .is_ok_and(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"));
    assert!(!required, "{message}; {REQUIRE_SOCKETS_ENV} is set");

    eprintln!("{message}; skipping. Set {REQUIRE_SOCKETS_ENV}=1 to fail instead.");
    false
}
