//! Mock JWKS endpoint backed by wiremock.

use crate::crypto_fixtures::{jwks_document, TestKeypair};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path the mock serves the key set on.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// Mock identity provider publishing a JWKS document.
///
/// The published keys and failure mode can be swapped while a gateway is
/// pointed at it, to exercise rotation and outages.
pub struct MockJwksServer {
    server: MockServer,
}

impl MockJwksServer {
    /// Start a server publishing `keypairs`.
    pub async fn start(keypairs: &[&TestKeypair]) -> Self {
        let mock = Self {
            server: MockServer::start().await,
        };
        mock.set_keys(keypairs).await;
        mock
    }

    /// Full JWKS URL.
    pub fn url(&self) -> String {
        format!("{}{}", self.server.uri(), JWKS_PATH)
    }

    /// Replace whatever is mounted with a document publishing `keypairs`.
    pub async fn set_keys(&self, keypairs: &[&TestKeypair]) {
        self.respond_with(ResponseTemplate::new(200).set_body_json(jwks_document(keypairs)))
            .await;
    }

    /// Publish `keypairs` after `delay`, to hold concurrent callers in flight.
    pub async fn set_keys_with_delay(&self, keypairs: &[&TestKeypair], delay: Duration) {
        self.respond_with(
            ResponseTemplate::new(200)
                .set_body_json(jwks_document(keypairs))
                .set_delay(delay),
        )
        .await;
    }

    /// Answer every request with `status` and an empty body.
    pub async fn fail_with(&self, status: u16) {
        self.respond_with(ResponseTemplate::new(status)).await;
    }

    /// Answer every request with a body that is not a JWKS document.
    pub async fn serve_malformed(&self) {
        self.respond_with(ResponseTemplate::new(200).set_body_string("{\"keys\": 42"))
            .await;
    }

    /// Number of JWKS requests received so far.
    pub async fn request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or(0)
    }

    /// Underlying wiremock server, for custom expectations.
    pub fn server(&self) -> &MockServer {
        &self.server
    }

    /// Resets recorded requests along with the mounted mocks.
    async fn respond_with(&self, response: ResponseTemplate) {
        self.server.reset().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }
}
