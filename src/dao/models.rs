use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

/// Predicted placement of a single team inside its group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamPositionEntity {
    /// Stable identifier of the team being placed.
    pub team_id: Uuid,
    /// Predicted final position within the group (1-based).
    pub predicted_position: u8,
    /// Whether the user believes this team reaches the playoff stage.
    pub predicted_to_qualify: bool,
}

/// One user's prediction for one group, persisted as a whole record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupPredictionEntity {
    /// Opaque identifier of the predicting user (never empty).
    pub user_id: String,
    /// Tournament the group belongs to.
    pub tournament_id: Uuid,
    /// Group being predicted.
    pub group_id: Uuid,
    /// Placement for every team, in the order the user arranged them.
    pub team_positions: Vec<TeamPositionEntity>,
    /// Creation timestamp for auditing/debugging.
    pub created_at: SystemTime,
    /// Last time this prediction was replaced.
    pub updated_at: SystemTime,
}

/// Tournament record as authored by the content tooling. Read-only here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TournamentEntity {
    /// Primary key of the tournament.
    pub id: Uuid,
    /// Display name of the tournament.
    pub name: String,
    /// Scheduled start of the first match.
    pub starts_at: SystemTime,
    /// Whether predictions are currently accepted.
    pub is_active: bool,
    /// Marks staging tournaments that only exist for content preparation.
    pub dev_only: bool,
    /// Whether third-placed teams may qualify at all.
    pub allows_third_place: bool,
    /// Tournament-wide cap on third-placed qualifiers.
    pub max_third_place_qualifiers: u32,
    /// Points for predicting a qualifier; falls back to 1 when unset.
    pub base_points: Option<i64>,
    /// Extra points for the exact position; falls back to 1 when unset.
    pub exact_bonus: Option<i64>,
}

/// Group roster as authored by the content tooling. Read-only here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupEntity {
    /// Primary key of the group.
    pub id: Uuid,
    /// Tournament the group belongs to.
    pub tournament_id: Uuid,
    /// Human readable label ("Group A").
    pub name: String,
    /// Teams drawn into the group, in roster order.
    pub team_ids: Vec<Uuid>,
}

/// Progressive actual outcome for one team. Absence means undetermined.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamResultEntity {
    /// Team the outcome belongs to.
    pub team_id: Uuid,
    /// Group the team played in.
    pub group_id: Uuid,
    /// Final group position, present once the group is mathematically settled.
    pub final_position: Option<u8>,
    /// Whether the team currently counts as qualified for the playoffs.
    pub qualified: bool,
}

/// Aggregated score for one user in one tournament, written by recomputes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserScoreEntity {
    /// User the aggregate belongs to.
    pub user_id: String,
    /// Tournament the aggregate was computed for.
    pub tournament_id: Uuid,
    /// Sum of all points awarded across the user's group predictions.
    pub total_score: i64,
    /// Number of teams that earned any credit.
    pub correct_count: u32,
    /// Number of exact position matches.
    pub exact_count: u32,
    /// When the recompute produced this row.
    pub computed_at: SystemTime,
}

impl GroupPredictionEntity {
    /// Composite identity used for upserts and lookups.
    pub fn key(&self) -> (String, Uuid, Uuid) {
        (self.user_id.clone(), self.tournament_id, self.group_id)
    }
}
