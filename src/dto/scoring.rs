use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// Why a team earned (or did not earn) points. Serialized as a stable tag,
/// never as free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScoreReason {
    /// The team's group has no recorded positions yet.
    GroupNotComplete,
    /// The group finished and the team did not qualify.
    NotQualified,
    /// The team qualified but its final position is missing.
    QualifiedNoPositionData,
    /// The team qualified as third but the user did not pick it.
    QualifiedButNotPredicted,
    /// Qualified and placed exactly as predicted.
    ExactMatch,
    /// Qualified, but at a different position than predicted.
    WrongPosition,
}

/// Scoring outcome for a single predicted team.
#[derive(Debug, Serialize, ToSchema)]
pub struct TeamScoreDto {
    pub team_id: Uuid,
    pub predicted_position: u8,
    pub actual_position: Option<u8>,
    pub predicted_to_qualify: bool,
    pub actually_qualified: bool,
    pub points_awarded: i64,
    pub reason: ScoreReason,
}

/// Per-group slice of a user's scoring breakdown.
#[derive(Debug, Serialize, ToSchema)]
pub struct GroupScoreBreakdown {
    pub group_id: Uuid,
    /// Human-readable group label.
    pub group_name: String,
    /// One entry per predicted team, in stored order.
    pub teams: Vec<TeamScoreDto>,
}

/// Full scoring result for one user in one tournament.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserScoreResponse {
    pub user_id: String,
    pub tournament_id: Uuid,
    pub total_score: i64,
    pub breakdown: Vec<GroupScoreBreakdown>,
}

/// Failure recorded for one user during a batch recompute.
#[derive(Debug, Serialize, ToSchema)]
pub struct RecomputeUserError {
    pub user_id: String,
    pub message: String,
}

/// Summary of a tournament-wide score recompute.
#[derive(Debug, Serialize, ToSchema)]
pub struct RecomputeResponse {
    /// Whether the batch orchestration ran to completion. Individual user
    /// failures land in `errors` without flipping this flag.
    pub success: bool,
    pub users_processed: u32,
    pub total_score_sum: i64,
    pub errors: Vec<RecomputeUserError>,
}
