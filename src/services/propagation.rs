//! Extension point for recalculating downstream playoff guesses.

use futures::future::BoxFuture;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Failure reported by a propagator run. Saves never fail because of it.
#[derive(Debug, Error)]
#[error("playoff propagation failed: {0}")]
pub struct PropagationError(pub String);

/// Recalculates playoff-round guesses that depend on group predictions.
///
/// Invoked after every committed batch. Implementations must tolerate being
/// called repeatedly for the same user and tournament.
pub trait PlayoffPropagator: Send + Sync {
    fn propagate(
        &self,
        user_id: String,
        tournament_id: Uuid,
    ) -> BoxFuture<'static, Result<(), PropagationError>>;
}

/// Default propagator that only records the trigger.
pub struct LoggingPropagator;

impl PlayoffPropagator for LoggingPropagator {
    fn propagate(
        &self,
        user_id: String,
        tournament_id: Uuid,
    ) -> BoxFuture<'static, Result<(), PropagationError>> {
        Box::pin(async move {
            debug!(
                user_id = %user_id,
                tournament_id = %tournament_id,
                "group prediction changed, playoff recalculation triggered"
            );
            Ok(())
        })
    }
}
