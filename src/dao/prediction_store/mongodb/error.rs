use mongodb::error::Error as MongoError;
use thiserror::Error;
use uuid::Uuid;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("missing environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to save prediction for user `{user_id}` in group `{group_id}`")]
    SavePrediction {
        user_id: String,
        group_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to load prediction for group `{group_id}`")]
    LoadPrediction {
        group_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to list predictions for tournament `{tournament_id}`")]
    ListPredictions {
        tournament_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to load tournament `{id}`")]
    LoadTournament {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to load group `{id}`")]
    LoadGroup {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to list groups for tournament `{tournament_id}`")]
    ListGroups {
        tournament_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to list team results for tournament `{tournament_id}`")]
    ListTeamResults {
        tournament_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to clear user scores for tournament `{tournament_id}`")]
    ClearScores {
        tournament_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to save score aggregate for user `{user_id}`")]
    SaveScore {
        user_id: String,
        #[source]
        source: MongoError,
    },
}
