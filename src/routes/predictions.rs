use axum::{
    Json, Router,
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, put},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        predictions::{GroupPredictionResponse, SaveOutcome, SavePredictionsRequest},
        qualification::QualificationConfigResponse,
    },
    error::AppError,
    routes::{require_user, user_from_headers},
    services::prediction_service,
    state::SharedState,
};

/// Routes handling prediction reads and saves.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route(
            "/tournaments/{tournament_id}/groups/{group_id}/predictions",
            put(save_group_predictions).get(get_group_predictions),
        )
        .route(
            "/tournaments/{tournament_id}/qualification-config",
            get(qualification_config),
        )
}

/// Replace the caller's prediction for one group with the submitted batch.
///
/// Rule outcomes are carried in the envelope so clients branch on the error
/// code instead of the HTTP status.
#[utoipa::path(
    put,
    path = "/tournaments/{tournament_id}/groups/{group_id}/predictions",
    tag = "predictions",
    params(
        ("tournament_id" = Uuid, Path, description = "Tournament the group belongs to"),
        ("group_id" = Uuid, Path, description = "Group being predicted"),
        ("X-User-Id" = Option<String>, Header, description = "Identity of the predicting user"),
    ),
    request_body = SavePredictionsRequest,
    responses(
        (status = 200, description = "Save outcome envelope", body = SaveOutcome)
    )
)]
pub async fn save_group_predictions(
    State(state): State<SharedState>,
    Path((tournament_id, group_id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
    Json(request): Json<SavePredictionsRequest>,
) -> Result<Json<SaveOutcome>, AppError> {
    request.validate()?;

    // An absent identity flows through as an empty id so the pipeline can
    // answer with its own `unauthorized` envelope code.
    let user_id = user_from_headers(&headers).unwrap_or_default();
    let outcome = prediction_service::save_group_predictions(
        &state,
        &user_id,
        tournament_id,
        group_id,
        request,
    )
    .await;

    Ok(Json(outcome))
}

/// Return the caller's prediction for a group, seeding a default on first
/// visit.
#[utoipa::path(
    get,
    path = "/tournaments/{tournament_id}/groups/{group_id}/predictions",
    tag = "predictions",
    params(
        ("tournament_id" = Uuid, Path, description = "Tournament the group belongs to"),
        ("group_id" = Uuid, Path, description = "Group being predicted"),
        ("X-User-Id" = Option<String>, Header, description = "Identity of the predicting user"),
    ),
    responses(
        (status = 200, description = "Stored or freshly seeded prediction", body = GroupPredictionResponse),
        (status = 401, description = "Missing user identity"),
        (status = 404, description = "Unknown tournament or group")
    )
)]
pub async fn get_group_predictions(
    State(state): State<SharedState>,
    Path((tournament_id, group_id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
) -> Result<Json<GroupPredictionResponse>, AppError> {
    let user_id = require_user(&headers)?;
    let prediction =
        prediction_service::get_group_predictions(&state, &user_id, tournament_id, group_id)
            .await?;
    Ok(Json(prediction))
}

/// Qualification rules and lock status for the prediction UI.
#[utoipa::path(
    get,
    path = "/tournaments/{tournament_id}/qualification-config",
    tag = "predictions",
    params(
        ("tournament_id" = Uuid, Path, description = "Tournament identifier"),
    ),
    responses(
        (status = 200, description = "Third-place policy and lock status", body = QualificationConfigResponse),
        (status = 404, description = "Unknown tournament")
    )
)]
pub async fn qualification_config(
    State(state): State<SharedState>,
    Path(tournament_id): Path<Uuid>,
) -> Result<Json<QualificationConfigResponse>, AppError> {
    let config = prediction_service::qualification_config(&state, tournament_id).await?;
    Ok(Json(config))
}
