//! Test server harness for E2E testing
//!
//! Provides `TestGatewayServer` for spawning real gateway instances in tests.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use rpc_gateway::auth::{KeySetProvider, KeySetProviderOptions, RequestGuard, TokenAuthenticator};
use rpc_gateway::config::Config;
use rpc_gateway::observability::metrics::init_metrics_recorder;
use rpc_gateway::repositories::CategoryRepository;
use rpc_gateway::routes::{self, AppState};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Global metrics handle shared by every test server in the process.
static TEST_METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics handle for test servers.
///
/// Installs the global recorder once; if something else already installed
/// one, falls back to a standalone recorder.
pub fn test_metrics_handle() -> PrometheusHandle {
    TEST_METRICS_HANDLE
        .get_or_init(|| {
            init_metrics_recorder()
                .unwrap_or_else(|_| PrometheusBuilder::new().build_recorder().handle())
        })
        .clone()
}

/// Key set tuning for tests: no failure backoff so outages and recoveries
/// are observed on the next request.
pub fn test_key_set_options() -> KeySetProviderOptions {
    KeySetProviderOptions {
        failure_backoff: Duration::ZERO,
        fetch_timeout: Duration::from_secs(2),
        ..KeySetProviderOptions::default()
    }
}

/// Test harness for spawning the RPC gateway in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health_flow_e2e() -> Result<()> {
///     let server = TestGatewayServer::spawn("http://127.0.0.1:1/jwks").await?;
///
///     let response = reqwest::get(format!("{}/health", server.url())).await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestGatewayServer {
    addr: SocketAddr,
    config: Config,
    key_sets: Arc<KeySetProvider>,
    _handle: JoinHandle<()>,
}

impl TestGatewayServer {
    /// Spawn a gateway verifying tokens against `jwks_url`.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Start the HTTP server in the background
    /// - Fetch keys lazily on the first protected request
    pub async fn spawn(jwks_url: &str) -> Result<Self, anyhow::Error> {
        Self::spawn_with_options(jwks_url, test_key_set_options()).await
    }

    /// Spawn with explicit key set tuning.
    pub async fn spawn_with_options(
        jwks_url: &str,
        options: KeySetProviderOptions,
    ) -> Result<Self, anyhow::Error> {
        let vars = HashMap::from([
            ("GATEWAY_JWKS_URL".to_string(), jwks_url.to_string()),
            ("GATEWAY_SERVER_HOSTNAME".to_string(), "127.0.0.1".to_string()),
            ("GATEWAY_REQUEST_TIMEOUT_SECONDS".to_string(), "10".to_string()),
        ]);

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let key_sets = Arc::new(
            KeySetProvider::new(&config.jwks_url, options)
                .map_err(|e| anyhow::anyhow!("Failed to create key set provider: {}", e))?,
        );

        let guard = Arc::new(RequestGuard::new(
            key_sets.clone(),
            TokenAuthenticator::new(config.jwt_clock_skew),
            config.key_set_wait_timeout(),
        ));

        let state = Arc::new(AppState {
            config: config.clone(),
            guard,
            key_sets: key_sets.clone(),
            categories: Arc::new(CategoryRepository::new()),
        });

        // Build routes using the gateway's real route builder
        let app = routes::build_routes(state, test_metrics_handle());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            key_sets,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The provider behind the server, for fetch-count assertions.
    pub fn key_sets(&self) -> &Arc<KeySetProvider> {
        &self.key_sets
    }
}

impl Drop for TestGatewayServer {
    fn drop(&mut self) {
        // Abort the HTTP server task so the port is released when the test ends
        self._handle.abort();
    }
}
