use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Groupcast Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::predictions::save_group_predictions,
        crate::routes::predictions::get_group_predictions,
        crate::routes::predictions::qualification_config,
        crate::routes::scoring::qualified_teams_score,
        crate::routes::scoring::recompute_scores,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::predictions::SavePredictionsRequest,
            crate::dto::predictions::PositionUpdateInput,
            crate::dto::predictions::SaveOutcome,
            crate::dto::predictions::SaveErrorDto,
            crate::dto::predictions::GroupPredictionResponse,
            crate::dto::predictions::TeamPositionDto,
            crate::dto::qualification::QualificationConfigResponse,
            crate::dto::scoring::UserScoreResponse,
            crate::dto::scoring::GroupScoreBreakdown,
            crate::dto::scoring::TeamScoreDto,
            crate::dto::scoring::ScoreReason,
            crate::dto::scoring::RecomputeResponse,
            crate::dto::scoring::RecomputeUserError,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "predictions", description = "Group prediction reads and saves"),
        (name = "scoring", description = "Prediction scoring and recomputation"),
    )
)]
pub struct ApiDoc;
