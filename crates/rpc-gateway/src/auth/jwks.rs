//! JWKS fetching and caching.
//!
//! [`KeySetProvider`] fetches the identity provider's JWKS document and caches
//! the resulting [`KeySet`] for a configurable TTL.
//!
//! # Behavior
//!
//! - A fresh cached set is returned without network I/O
//! - Refreshes are single-flight: concurrent callers on a stale or empty cache
//!   share one fetch instead of each issuing their own
//! - A failed refresh is not retried by callers that were waiting on it, nor
//!   by later callers within the failure backoff window
//! - While a refresh is failing, the last good set is served until it is older
//!   than `max_stale` (zero disables stale serving)
//!
//! # Security
//!
//! - HTTPS should be used in production (enforced by deployment config)
//! - Fetch errors never panic; they are returned to the caller

use crate::auth::keys::KeySet;
use crate::config::ConfigError;
use crate::observability::metrics;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

/// Default cache TTL in seconds (5 minutes).
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 300;

/// Default maximum age of a stale key set served during an outage (1 hour).
pub const DEFAULT_MAX_STALE_SECONDS: u64 = 3600;

/// Default JWKS request timeout in seconds.
pub const DEFAULT_FETCH_TIMEOUT_SECONDS: u64 = 10;

/// Default window after a failed fetch during which callers do not retry.
pub const DEFAULT_FAILURE_BACKOFF: Duration = Duration::from_secs(5);

/// Errors fetching or decoding the JWKS document.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeySetError {
    #[error("JWKS request failed: {0}")]
    Fetch(String),

    #[error("JWKS endpoint returned HTTP {0}")]
    Status(u16),

    #[error("JWKS document is invalid: {0}")]
    Decode(String),

    #[error("JWKS request timed out")]
    Timeout,
}

/// Something that can hand out the current key set.
#[async_trait]
pub trait KeySetSource: Send + Sync {
    /// Return the current key set, fetching it if needed.
    async fn key_set(&self) -> Result<Arc<KeySet>, KeySetError>;
}

/// Tuning for [`KeySetProvider`].
#[derive(Debug, Clone)]
pub struct KeySetProviderOptions {
    pub cache_ttl: Duration,
    pub max_stale: Duration,
    pub fetch_timeout: Duration,
    pub failure_backoff: Duration,
}

impl Default for KeySetProviderOptions {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECONDS),
            max_stale: Duration::from_secs(DEFAULT_MAX_STALE_SECONDS),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECONDS),
            failure_backoff: DEFAULT_FAILURE_BACKOFF,
        }
    }
}

struct CachedKeySet {
    key_set: Arc<KeySet>,
    fetched_at: Instant,
}

#[derive(Default)]
struct CacheState {
    current: Option<CachedKeySet>,
    last_failure: Option<(Instant, KeySetError)>,
}

impl CacheState {
    fn fresh(&self, ttl: Duration) -> Option<Arc<KeySet>> {
        self.current
            .as_ref()
            .filter(|cached| cached.fetched_at.elapsed() < ttl)
            .map(|cached| Arc::clone(&cached.key_set))
    }

    fn stale(&self, max_stale: Duration) -> Option<Arc<KeySet>> {
        self.current
            .as_ref()
            .filter(|cached| cached.fetched_at.elapsed() < max_stale)
            .map(|cached| Arc::clone(&cached.key_set))
    }
}

/// Fetches and caches the JWKS document.
///
/// Construct once at startup and share behind an `Arc`.
pub struct KeySetProvider {
    jwks_url: reqwest::Url,
    http_client: reqwest::Client,
    state: RwLock<CacheState>,
    /// Held for the duration of a network fetch.
    refresh_lock: Mutex<()>,
    fetch_count: AtomicU64,
    options: KeySetProviderOptions,
}

impl KeySetProvider {
    /// Create the provider. No network I/O happens here.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidJwksUrl` for an empty, unparseable or
    /// non-HTTP URL, and `ConfigError::HttpClient` if the HTTP client cannot
    /// be built. Both are fatal startup errors.
    pub fn new(jwks_url: &str, options: KeySetProviderOptions) -> Result<Self, ConfigError> {
        if jwks_url.trim().is_empty() {
            return Err(ConfigError::InvalidJwksUrl(
                "JWKS URL must not be empty".to_string(),
            ));
        }

        let parsed = reqwest::Url::parse(jwks_url).map_err(|e| {
            ConfigError::InvalidJwksUrl(format!("'{}' is not a valid URL: {}", jwks_url, e))
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidJwksUrl(format!(
                "'{}' must use http or https",
                jwks_url
            )));
        }

        let http_client = reqwest::Client::builder()
            .timeout(options.fetch_timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            jwks_url: parsed,
            http_client,
            state: RwLock::new(CacheState::default()),
            refresh_lock: Mutex::new(()),
            fetch_count: AtomicU64::new(0),
            options,
        })
    }

    pub fn jwks_url(&self) -> &str {
        self.jwks_url.as_str()
    }

    /// Number of network fetches performed so far.
    pub fn fetch_count(&self) -> u64 {
        self.fetch_count.load(Ordering::Relaxed)
    }

    /// Whether a key set younger than the cache TTL is cached.
    pub async fn is_fresh(&self) -> bool {
        self.state.read().await.fresh(self.options.cache_ttl).is_some()
    }

    /// Return the current key set, refreshing it if stale or missing.
    ///
    /// # Errors
    ///
    /// Returns the fetch error when no usable stale set is available.
    #[instrument(skip_all, name = "gateway.auth.jwks.key_set")]
    pub async fn get_key_set(&self) -> Result<Arc<KeySet>, KeySetError> {
        let requested_at = Instant::now();

        if let Some(fresh) = self.state.read().await.fresh(self.options.cache_ttl) {
            tracing::trace!(target: "gateway.auth.jwks", "JWKS cache hit");
            return Ok(fresh);
        }

        let _refresh = self.refresh_lock.lock().await;

        {
            let state = self.state.read().await;
            if let Some(fresh) = state.fresh(self.options.cache_ttl) {
                // Refreshed by the caller we waited on
                return Ok(fresh);
            }
            if let Some((failed_at, error)) = &state.last_failure {
                if *failed_at >= requested_at
                    || failed_at.elapsed() < self.options.failure_backoff
                {
                    return self.stale_or(&state, error.clone());
                }
            }
        }

        match self.refresh_locked().await {
            Ok(key_set) => Ok(key_set),
            Err(error) => {
                let state = self.state.read().await;
                self.stale_or(&state, error)
            }
        }
    }

    /// Fetch the document now, regardless of cache age.
    ///
    /// A cached set stays in place when the fetch fails, but is not returned.
    ///
    /// # Errors
    ///
    /// Returns the fetch error even when a stale set is still usable.
    #[instrument(skip_all, name = "gateway.auth.jwks.refresh")]
    pub async fn refresh(&self) -> Result<Arc<KeySet>, KeySetError> {
        let _refresh = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    /// Fetch and swap the cached set, or record the failure. Caller holds
    /// `refresh_lock`.
    async fn refresh_locked(&self) -> Result<Arc<KeySet>, KeySetError> {
        match self.fetch().await {
            Ok(key_set) => {
                let key_set = Arc::new(key_set);
                let mut state = self.state.write().await;
                state.current = Some(CachedKeySet {
                    key_set: Arc::clone(&key_set),
                    fetched_at: Instant::now(),
                });
                state.last_failure = None;
                Ok(key_set)
            }
            Err(error) => {
                self.state.write().await.last_failure = Some((Instant::now(), error.clone()));
                Err(error)
            }
        }
    }

    fn stale_or(&self, state: &CacheState, error: KeySetError) -> Result<Arc<KeySet>, KeySetError> {
        match state.stale(self.options.max_stale) {
            Some(stale) => {
                tracing::warn!(
                    target: "gateway.auth.jwks",
                    error = %error,
                    "JWKS refresh failed, serving stale key set"
                );
                metrics::record_stale_key_set_served();
                Ok(stale)
            }
            None => Err(error),
        }
    }

    async fn fetch(&self) -> Result<KeySet, KeySetError> {
        tracing::debug!(target: "gateway.auth.jwks", url = %self.jwks_url, "Fetching JWKS");

        let started = Instant::now();
        self.fetch_count.fetch_add(1, Ordering::Relaxed);
        let result = self.fetch_document().await;
        let status = if result.is_ok() { "success" } else { "error" };
        metrics::record_jwks_fetch(status, started.elapsed());

        match &result {
            Ok(key_set) => tracing::info!(
                target: "gateway.auth.jwks",
                key_count = key_set.len(),
                "JWKS cache refreshed"
            ),
            Err(e) => tracing::error!(target: "gateway.auth.jwks", error = %e, "Failed to fetch JWKS"),
        }

        result
    }

    async fn fetch_document(&self) -> Result<KeySet, KeySetError> {
        let response = self
            .http_client
            .get(self.jwks_url.clone())
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(KeySetError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(request_error)?;
        let key_set =
            KeySet::from_jwks_bytes(&body).map_err(|e| KeySetError::Decode(e.to_string()))?;

        if key_set.is_empty() {
            return Err(KeySetError::Decode("no usable signing keys".to_string()));
        }

        Ok(key_set)
    }
}

#[async_trait]
impl KeySetSource for KeySetProvider {
    async fn key_set(&self) -> Result<Arc<KeySet>, KeySetError> {
        self.get_key_set().await
    }
}

fn request_error(e: reqwest::Error) -> KeySetError {
    if e.is_timeout() {
        KeySetError::Timeout
    } else {
        KeySetError::Fetch(e.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    // Network behavior is covered in tests/key_set_provider_tests.rs against
    // a mock JWKS server.

    #[test]
    fn test_new_accepts_http_and_https() {
        let options = KeySetProviderOptions::default();
        assert!(KeySetProvider::new("http://localhost:3001/api/auth/jwks", options.clone()).is_ok());
        assert!(KeySetProvider::new("https://idp.example.com/jwks.json", options).is_ok());
    }

    #[test]
    fn test_new_rejects_empty_url() {
        let result = KeySetProvider::new("  ", KeySetProviderOptions::default());
        assert!(matches!(result, Err(ConfigError::InvalidJwksUrl(msg)) if msg.contains("empty")));
    }

    #[test]
    fn test_new_rejects_unparseable_url() {
        let result = KeySetProvider::new("not a url", KeySetProviderOptions::default());
        assert!(matches!(result, Err(ConfigError::InvalidJwksUrl(_))));
    }

    #[test]
    fn test_new_rejects_non_http_scheme() {
        let result = KeySetProvider::new("file:///etc/jwks.json", KeySetProviderOptions::default());
        assert!(
            matches!(result, Err(ConfigError::InvalidJwksUrl(msg)) if msg.contains("http or https"))
        );
    }

    #[tokio::test]
    async fn test_new_provider_starts_empty() {
        let provider =
            KeySetProvider::new("http://localhost:3001/jwks", KeySetProviderOptions::default())
                .unwrap();

        assert!(!provider.is_fresh().await);
        assert_eq!(provider.fetch_count(), 0);
        assert_eq!(provider.jwks_url(), "http://localhost:3001/jwks");
    }

    #[test]
    fn test_default_options() {
        let options = KeySetProviderOptions::default();
        assert_eq!(options.cache_ttl, Duration::from_secs(300));
        assert_eq!(options.max_stale, Duration::from_secs(3600));
        assert_eq!(options.fetch_timeout, Duration::from_secs(10));
        assert!(options.failure_backoff < options.cache_ttl);
    }

    #[test]
    fn test_cache_state_freshness() {
        let state = CacheState {
            current: Some(CachedKeySet {
                key_set: Arc::new(KeySet::default()),
                fetched_at: Instant::now(),
            }),
            last_failure: None,
        };

        assert!(state.fresh(Duration::from_secs(60)).is_some());
        assert!(state.fresh(Duration::ZERO).is_none());
        assert!(state.stale(Duration::from_secs(60)).is_some());
        assert!(state.stale(Duration::ZERO).is_none());
    }
}
