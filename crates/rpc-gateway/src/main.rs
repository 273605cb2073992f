//! RPC Gateway
//!
//! Entry point for the RPC gateway. Loads configuration, warms and keeps
//! refreshing the JWKS cache, and serves the HTTP routes until SIGINT or
//! SIGTERM.

use rpc_gateway::auth::{KeySetProvider, RequestGuard, TokenAuthenticator};
use rpc_gateway::config::{Config, LogFormat};
use rpc_gateway::observability::metrics::init_metrics_recorder;
use rpc_gateway::repositories::CategoryRepository;
use rpc_gateway::routes::{self, AppState};
use rpc_gateway::tasks::start_key_refresh;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration first so the log format is known; a config error is
    // still logged, in the default format.
    let config = Config::from_env();
    init_tracing(
        config
            .as_ref()
            .map(|c| c.log_format)
            .unwrap_or(LogFormat::Pretty),
    );

    info!("Starting RPC Gateway");

    let config = config.map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        jwks_url = %config.jwks_url,
        bind_address = %config.bind_address(),
        jwks_cache_ttl_seconds = config.jwks_cache_ttl.as_secs(),
        jwks_max_stale_seconds = config.jwks_max_stale.as_secs(),
        jwt_clock_skew_seconds = config.jwt_clock_skew.as_secs(),
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to initialize metrics recorder");
        e
    })?;

    let key_sets = Arc::new(
        KeySetProvider::new(&config.jwks_url, config.key_set_options()).map_err(|e| {
            error!(error = %e, "Failed to initialize key set provider");
            e
        })?,
    );

    let guard = Arc::new(RequestGuard::new(
        key_sets.clone(),
        TokenAuthenticator::new(config.jwt_clock_skew),
        config.key_set_wait_timeout(),
    ));

    let shutdown_token = CancellationToken::new();

    // First tick warms the cache
    let refresh_handle = tokio::spawn(start_key_refresh(
        key_sets.clone(),
        config.jwks_refresh_interval,
        shutdown_token.child_token(),
    ));

    let bind_address = config.bind_address();
    let shutdown_timeout = config.shutdown_timeout;

    let state = Arc::new(AppState {
        config,
        guard,
        key_sets,
        categories: Arc::new(CategoryRepository::new()),
    });

    let app = routes::build_routes(state, metrics_handle);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .map_err(|e| {
            error!(error = %e, addr = %bind_address, "Failed to bind listener");
            e
        })?;

    info!("RPC Gateway listening on {}", listener.local_addr()?);

    let server_token = shutdown_token.child_token();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        server_token.cancelled().await;
    });
    let mut server_handle = tokio::spawn(async move { server.await });

    tokio::select! {
        result = &mut server_handle => {
            shutdown_token.cancel();
            match result {
                Ok(Ok(())) => warn!("Server exited before a shutdown signal"),
                Ok(Err(e)) => {
                    error!(error = %e, "Server failed");
                    return Err(e.into());
                }
                Err(e) => {
                    error!(error = %e, "Server task failed");
                    return Err(e.into());
                }
            }
        }
        _ = shutdown_signal() => {
            shutdown_token.cancel();
            match tokio::time::timeout(shutdown_timeout, &mut server_handle).await {
                Ok(Ok(Ok(()))) => info!("In-flight requests drained"),
                Ok(Ok(Err(e))) => error!(error = %e, "Server failed during shutdown"),
                Ok(Err(e)) => error!(error = %e, "Server task failed during shutdown"),
                Err(_) => {
                    warn!(
                        timeout_seconds = shutdown_timeout.as_secs(),
                        "Shutdown timeout elapsed, aborting in-flight requests"
                    );
                    server_handle.abort();
                }
            }
        }
    }

    if let Err(e) = refresh_handle.await {
        error!(error = %e, "Key refresh task failed");
    }

    info!("RPC Gateway shutdown complete");

    Ok(())
}

fn init_tracing(log_format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "rpc_gateway=debug,tower_http=debug".into());

    match log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
