use axum::{
    Json, Router,
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::scoring::{RecomputeResponse, UserScoreResponse},
    error::AppError,
    routes::require_user,
    services::scoring_service,
    state::SharedState,
};

/// Routes exposing the scoring engine.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route(
            "/tournaments/{tournament_id}/scores/qualified-teams",
            get(qualified_teams_score),
        )
        .route(
            "/tournaments/{tournament_id}/scores/qualified-teams/recompute",
            post(recompute_scores),
        )
}

/// Score the caller's predictions against the current results.
#[utoipa::path(
    get,
    path = "/tournaments/{tournament_id}/scores/qualified-teams",
    tag = "scoring",
    params(
        ("tournament_id" = Uuid, Path, description = "Tournament identifier"),
        ("X-User-Id" = Option<String>, Header, description = "Identity of the scored user"),
    ),
    responses(
        (status = 200, description = "Per-team breakdown and total", body = UserScoreResponse),
        (status = 401, description = "Missing user identity"),
        (status = 404, description = "Unknown tournament")
    )
)]
pub async fn qualified_teams_score(
    State(state): State<SharedState>,
    Path(tournament_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<UserScoreResponse>, AppError> {
    let user_id = require_user(&headers)?;
    let score = scoring_service::score_qualified_teams(&state, &user_id, tournament_id).await?;
    Ok(Json(score))
}

/// Recompute and persist every predicting user's aggregate score.
#[utoipa::path(
    post,
    path = "/tournaments/{tournament_id}/scores/qualified-teams/recompute",
    tag = "scoring",
    params(
        ("tournament_id" = Uuid, Path, description = "Tournament identifier"),
    ),
    responses(
        (status = 200, description = "Batch outcome with per-user failures", body = RecomputeResponse),
        (status = 404, description = "Unknown tournament")
    )
)]
pub async fn recompute_scores(
    State(state): State<SharedState>,
    Path(tournament_id): Path<Uuid>,
) -> Result<Json<RecomputeResponse>, AppError> {
    let response = scoring_service::recompute_tournament_scores(&state, tournament_id).await?;
    Ok(Json(response))
}
