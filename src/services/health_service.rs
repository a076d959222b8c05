use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Probe the prediction store and report `ok` or `degraded`.
///
/// The supervisor owns the degraded flag; this endpoint only reads it, but
/// still pokes the store so connectivity problems show up in the logs
/// between two supervisor polls.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.prediction_store().await {
        Some(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "prediction store failed the health probe");
            }
        }
        None => warn!("no prediction store installed; reporting degraded"),
    }

    if state.is_degraded() {
        HealthResponse::degraded()
    } else {
        HealthResponse::ok()
    }
}
