use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::dao::{
    models::{
        GroupEntity, GroupPredictionEntity, TeamPositionEntity, TeamResultEntity,
        TournamentEntity, UserScoreEntity,
    },
    prediction_store::couchdb::error::CouchDaoError,
};

pub const PREDICTION_PREFIX: &str = "prediction::";
pub const TOURNAMENT_PREFIX: &str = "tournament::";
pub const GROUP_PREFIX: &str = "group::";
pub const RESULT_PREFIX: &str = "result::";
pub const SCORE_PREFIX: &str = "score::";
pub const END_SUFFIX: &str = "\u{ffff}";

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    pub id: String,
    #[serde(default)]
    pub doc: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchPredictionDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub prediction: PredictionBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionBody {
    pub user_id: String,
    pub tournament_id: Uuid,
    pub group_id: Uuid,
    pub team_positions: Vec<TeamPositionEntity>,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

impl From<(GroupPredictionEntity, Option<String>)> for CouchPredictionDocument {
    fn from((prediction, rev): (GroupPredictionEntity, Option<String>)) -> Self {
        Self {
            id: prediction_doc_id(
                &prediction.user_id,
                prediction.tournament_id,
                prediction.group_id,
            ),
            rev,
            prediction: PredictionBody {
                user_id: prediction.user_id,
                tournament_id: prediction.tournament_id,
                group_id: prediction.group_id,
                team_positions: prediction.team_positions,
                created_at: prediction.created_at,
                updated_at: prediction.updated_at,
            },
        }
    }
}

impl From<CouchPredictionDocument> for GroupPredictionEntity {
    fn from(doc: CouchPredictionDocument) -> Self {
        Self {
            user_id: doc.prediction.user_id,
            tournament_id: doc.prediction.tournament_id,
            group_id: doc.prediction.group_id,
            team_positions: doc.prediction.team_positions,
            created_at: doc.prediction.created_at,
            updated_at: doc.prediction.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchTournamentDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub tournament: TournamentBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentBody {
    pub name: String,
    pub starts_at: SystemTime,
    pub is_active: bool,
    #[serde(default)]
    pub dev_only: bool,
    pub allows_third_place: bool,
    pub max_third_place_qualifiers: u32,
    pub base_points: Option<i64>,
    pub exact_bonus: Option<i64>,
}

impl TryFrom<CouchTournamentDocument> for TournamentEntity {
    type Error = CouchDaoError;

    fn try_from(doc: CouchTournamentDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: extract_uuid(&doc.id)?,
            name: doc.tournament.name,
            starts_at: doc.tournament.starts_at,
            is_active: doc.tournament.is_active,
            dev_only: doc.tournament.dev_only,
            allows_third_place: doc.tournament.allows_third_place,
            max_third_place_qualifiers: doc.tournament.max_third_place_qualifiers,
            base_points: doc.tournament.base_points,
            exact_bonus: doc.tournament.exact_bonus,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchGroupDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub group: GroupBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupBody {
    pub tournament_id: Uuid,
    pub name: String,
    pub team_ids: Vec<Uuid>,
}

impl TryFrom<CouchGroupDocument> for GroupEntity {
    type Error = CouchDaoError;

    fn try_from(doc: CouchGroupDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: extract_uuid(&doc.id)?,
            tournament_id: doc.group.tournament_id,
            name: doc.group.name,
            team_ids: doc.group.team_ids,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchTeamResultDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub result: TeamResultBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamResultBody {
    pub team_id: Uuid,
    pub group_id: Uuid,
    pub final_position: Option<u8>,
    #[serde(default)]
    pub qualified: bool,
}

impl From<CouchTeamResultDocument> for TeamResultEntity {
    fn from(doc: CouchTeamResultDocument) -> Self {
        Self {
            team_id: doc.result.team_id,
            group_id: doc.result.group_id,
            final_position: doc.result.final_position,
            qualified: doc.result.qualified,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchUserScoreDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub score: UserScoreBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserScoreBody {
    pub user_id: String,
    pub tournament_id: Uuid,
    pub total_score: i64,
    pub correct_count: u32,
    pub exact_count: u32,
    pub computed_at: SystemTime,
}

impl From<(UserScoreEntity, Option<String>)> for CouchUserScoreDocument {
    fn from((score, rev): (UserScoreEntity, Option<String>)) -> Self {
        Self {
            id: user_score_doc_id(&score.user_id, score.tournament_id),
            rev,
            score: UserScoreBody {
                user_id: score.user_id,
                tournament_id: score.tournament_id,
                total_score: score.total_score,
                correct_count: score.correct_count,
                exact_count: score.exact_count,
                computed_at: score.computed_at,
            },
        }
    }
}

pub fn prediction_doc_id(user_id: &str, tournament_id: Uuid, group_id: Uuid) -> String {
    format!("{}{}:{}:{}", PREDICTION_PREFIX, user_id, tournament_id, group_id)
}

/// Range prefix covering every prediction of one user.
pub fn user_prediction_prefix(user_id: &str) -> String {
    format!("{}{}:", PREDICTION_PREFIX, user_id)
}

pub fn tournament_doc_id(id: Uuid) -> String {
    format!("{}{}", TOURNAMENT_PREFIX, id)
}

pub fn group_doc_id(id: Uuid) -> String {
    format!("{}{}", GROUP_PREFIX, id)
}

pub fn user_score_doc_id(user_id: &str, tournament_id: Uuid) -> String {
    format!("{}{}:{}", SCORE_PREFIX, user_id, tournament_id)
}

pub fn extract_uuid(doc_id: &str) -> Result<Uuid, CouchDaoError> {
    let (_, id) = doc_id
        .split_once("::")
        .ok_or_else(|| CouchDaoError::InvalidDocId {
            doc_id: doc_id.to_string(),
            kind: "missing separator",
        })?;

    Uuid::parse_str(id).map_err(|_| CouchDaoError::InvalidDocId {
        doc_id: doc_id.to_string(),
        kind: "invalid UUID",
    })
}
