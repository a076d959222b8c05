use mongodb::bson::{Binary, DateTime, Document, doc, spec::BinarySubtype};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{
    GroupEntity, GroupPredictionEntity, TeamPositionEntity, TeamResultEntity, TournamentEntity,
    UserScoreEntity,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPredictionDocument {
    pub user_id: String,
    pub tournament_id: Uuid,
    pub group_id: Uuid,
    team_positions: Vec<TeamPositionEntity>,
    created_at: DateTime,
    updated_at: DateTime,
}

impl From<GroupPredictionEntity> for MongoPredictionDocument {
    fn from(value: GroupPredictionEntity) -> Self {
        Self {
            user_id: value.user_id,
            tournament_id: value.tournament_id,
            group_id: value.group_id,
            team_positions: value.team_positions,
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl From<MongoPredictionDocument> for GroupPredictionEntity {
    fn from(value: MongoPredictionDocument) -> Self {
        Self {
            user_id: value.user_id,
            tournament_id: value.tournament_id,
            group_id: value.group_id,
            team_positions: value.team_positions,
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoTournamentDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    name: String,
    starts_at: DateTime,
    is_active: bool,
    #[serde(default)]
    dev_only: bool,
    allows_third_place: bool,
    max_third_place_qualifiers: u32,
    base_points: Option<i64>,
    exact_bonus: Option<i64>,
}

impl From<MongoTournamentDocument> for TournamentEntity {
    fn from(value: MongoTournamentDocument) -> Self {
        Self {
            id: value.id,
            name: value.name,
            starts_at: value.starts_at.to_system_time(),
            is_active: value.is_active,
            dev_only: value.dev_only,
            allows_third_place: value.allows_third_place,
            max_third_place_qualifiers: value.max_third_place_qualifiers,
            base_points: value.base_points,
            exact_bonus: value.exact_bonus,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoGroupDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    tournament_id: Uuid,
    name: String,
    team_ids: Vec<Uuid>,
}

impl From<MongoGroupDocument> for GroupEntity {
    fn from(value: MongoGroupDocument) -> Self {
        Self {
            id: value.id,
            tournament_id: value.tournament_id,
            name: value.name,
            team_ids: value.team_ids,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoTeamResultDocument {
    team_id: Uuid,
    group_id: Uuid,
    final_position: Option<u8>,
    #[serde(default)]
    qualified: bool,
}

impl From<MongoTeamResultDocument> for TeamResultEntity {
    fn from(value: MongoTeamResultDocument) -> Self {
        Self {
            team_id: value.team_id,
            group_id: value.group_id,
            final_position: value.final_position,
            qualified: value.qualified,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoUserScoreDocument {
    pub user_id: String,
    pub tournament_id: Uuid,
    total_score: i64,
    correct_count: u32,
    exact_count: u32,
    computed_at: DateTime,
}

impl From<UserScoreEntity> for MongoUserScoreDocument {
    fn from(value: UserScoreEntity) -> Self {
        Self {
            user_id: value.user_id,
            tournament_id: value.tournament_id,
            total_score: value.total_score,
            correct_count: value.correct_count,
            exact_count: value.exact_count,
            computed_at: DateTime::from_system_time(value.computed_at),
        }
    }
}

pub fn uuid_as_binary(id: Uuid) -> Binary {
    Binary {
        subtype: BinarySubtype::Uuid,
        bytes: id.into_bytes().to_vec(),
    }
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": uuid_as_binary(id)}
}

/// Filter matching the composite identity of a prediction record.
pub fn prediction_filter(user_id: &str, tournament_id: Uuid, group_id: Uuid) -> Document {
    doc! {
        "user_id": user_id,
        "tournament_id": uuid_as_binary(tournament_id),
        "group_id": uuid_as_binary(group_id),
    }
}
