use serde::Serialize;
use utoipa::ToSchema;

/// Aliveness and storage status returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// "ok" while the prediction store answers, "degraded" while it is down.
    pub status: String,
}

impl HealthResponse {
    /// The prediction store is connected and answering.
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }

    /// The prediction store is unreachable; saves are refused until it
    /// reconnects.
    pub fn degraded() -> Self {
        Self {
            status: "degraded".to_string(),
        }
    }
}
