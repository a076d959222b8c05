use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{GroupPredictionEntity, TeamPositionEntity},
    dto::format_system_time,
    services::validation::{PositionUpdate, ValidationFailure},
};

/// One placement inside a batch update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PositionUpdateInput {
    pub team_id: Uuid,
    /// Requested final position, 1-based.
    pub position: u8,
    /// Whether the team is predicted to reach the playoffs.
    pub qualifies: bool,
}

impl From<PositionUpdateInput> for PositionUpdate {
    fn from(value: PositionUpdateInput) -> Self {
        Self {
            team_id: value.team_id,
            position: value.position,
            qualifies: value.qualifies,
        }
    }
}

/// Payload replacing the caller's prediction for one group.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct SavePredictionsRequest {
    /// The entire new state of the group. An empty list is a no-op.
    #[validate(length(max = 64))]
    pub updates: Vec<PositionUpdateInput>,
    /// Explicit request to edit a staging tournament.
    #[serde(default)]
    pub edit_mode: bool,
}

/// Machine-readable rejection carried inside the save envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SaveErrorDto {
    /// Stable failure code clients branch on.
    pub code: String,
    /// Human-readable description of the failure.
    pub message: String,
}

/// Envelope returned by the save endpoint. Rule violations are data here,
/// not HTTP errors, so autosaving clients can branch without status-code
/// handling.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SaveOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<SaveErrorDto>,
}

impl SaveOutcome {
    /// The batch was validated and persisted.
    pub fn saved() -> Self {
        Self {
            success: true,
            message: Some("predictions saved".to_string()),
            error: None,
        }
    }

    /// An empty batch was accepted without touching storage.
    pub fn noop() -> Self {
        Self {
            success: true,
            message: Some("nothing to save".to_string()),
            error: None,
        }
    }

    /// A rule rejected the batch; nothing was persisted.
    pub fn rejected(failure: &ValidationFailure) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(SaveErrorDto {
                code: failure.code().to_string(),
                message: failure.to_string(),
            }),
        }
    }

    /// The batch was valid but storage failed below the validation layer.
    pub fn save_failed() -> Self {
        Self {
            success: false,
            message: None,
            error: Some(SaveErrorDto {
                code: "save_failed".to_string(),
                message: "failed to save predictions, please retry".to_string(),
            }),
        }
    }
}

/// Stored placement of one team, as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TeamPositionDto {
    pub team_id: Uuid,
    pub predicted_position: u8,
    pub predicted_to_qualify: bool,
}

impl From<TeamPositionEntity> for TeamPositionDto {
    fn from(value: TeamPositionEntity) -> Self {
        Self {
            team_id: value.team_id,
            predicted_position: value.predicted_position,
            predicted_to_qualify: value.predicted_to_qualify,
        }
    }
}

/// A user's stored prediction for one group.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GroupPredictionResponse {
    pub user_id: String,
    pub tournament_id: Uuid,
    pub group_id: Uuid,
    /// Placements in the order the user arranged them.
    pub team_positions: Vec<TeamPositionDto>,
    pub updated_at: String,
}

impl From<GroupPredictionEntity> for GroupPredictionResponse {
    fn from(value: GroupPredictionEntity) -> Self {
        Self {
            user_id: value.user_id,
            tournament_id: value.tournament_id,
            group_id: value.group_id,
            team_positions: value.team_positions.into_iter().map(Into::into).collect(),
            updated_at: format_system_time(value.updated_at),
        }
    }
}
