use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{prediction_store::PredictionStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Keep the prediction store connected, flipping the shared degraded flag
/// whenever it drops.
///
/// `connect` is invoked for the initial connection and again from scratch
/// once in-place reconnection is exhausted.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn PredictionStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.install_prediction_store(store.clone()).await;
                info!("prediction store connected; leaving degraded mode");
                delay = INITIAL_DELAY;
                watch_store(&state, store).await;
            }
            Err(err) => {
                warn!(error = %err, "prediction store connection failed");
            }
        }

        sleep(delay).await;
        delay = (delay * 2).min(MAX_DELAY);
    }
}

/// Poll the store until it dies and cannot be revived in place.
async fn watch_store(state: &SharedState, store: Arc<dyn PredictionStore>) {
    loop {
        match store.health_check().await {
            Ok(()) => {
                if state.is_degraded() {
                    info!("prediction store healthy again; leaving degraded mode");
                    state.update_degraded(false);
                }
            }
            Err(_) => {
                if !revive(state, &store).await {
                    warn!("prediction store reconnects exhausted; reconnecting from scratch");
                    return;
                }
                state.update_degraded(false);
            }
        }

        sleep(HEALTH_POLL_INTERVAL).await;
    }
}

/// Try a bounded number of in-place reconnects, entering degraded mode on
/// the first failed attempt.
async fn revive(state: &SharedState, store: &Arc<dyn PredictionStore>) -> bool {
    let mut delay = INITIAL_DELAY;

    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!("prediction store reconnected after a failed health check");
                return true;
            }
            Err(err) => {
                if attempt == 0 {
                    warn!(attempt, error = %err, "prediction store reconnect failed; entering degraded mode");
                    state.update_degraded(true);
                } else {
                    warn!(attempt, error = %err, "prediction store reconnect failed");
                }
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }

    false
}
