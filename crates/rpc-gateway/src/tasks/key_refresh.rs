//! Background key refresh task.
//!
//! Re-fetches the JWKS document on a fixed interval so rotated keys are
//! picked up before the request path notices an expired cache. The first
//! tick fires immediately and warms the cache at startup.
//!
//! # Graceful Shutdown
//!
//! The task exits when its cancellation token is cancelled. A fetch already
//! in progress is abandoned.

use crate::auth::KeySetProvider;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Run the key refresh loop until `cancel_token` is cancelled.
///
/// Failures are logged and the previous key set stays cached.
#[instrument(skip_all, name = "gateway.task.key_refresh")]
pub async fn start_key_refresh(
    provider: Arc<KeySetProvider>,
    refresh_interval: Duration,
    cancel_token: CancellationToken,
) {
    info!(
        target: "gateway.task.key_refresh",
        interval_seconds = refresh_interval.as_secs(),
        "Starting key refresh task"
    );

    let mut interval = tokio::time::interval(refresh_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                tokio::select! {
                    result = provider.refresh() => match result {
                        Ok(key_set) => tracing::debug!(
                            target: "gateway.task.key_refresh",
                            key_count = key_set.len(),
                            "Key set refreshed"
                        ),
                        Err(e) => warn!(
                            target: "gateway.task.key_refresh",
                            error = %e,
                            "Key refresh failed, keeping previous key set"
                        ),
                    },
                    _ = cancel_token.cancelled() => break,
                }
            }
            _ = cancel_token.cancelled() => break,
        }
    }

    info!(
        target: "gateway.task.key_refresh",
        "Key refresh task received shutdown signal, exiting"
    );
}
