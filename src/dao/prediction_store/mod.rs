#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{
    GroupEntity, GroupPredictionEntity, TeamResultEntity, TournamentEntity, UserScoreEntity,
};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use uuid::Uuid;

/// Abstraction over the persistence layer for predictions, tournament
/// reference data and score aggregates.
pub trait PredictionStore: Send + Sync {
    fn save_prediction(
        &self,
        prediction: GroupPredictionEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    fn find_prediction(
        &self,
        user_id: String,
        tournament_id: Uuid,
        group_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<GroupPredictionEntity>>>;
    fn list_user_predictions(
        &self,
        user_id: String,
        tournament_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<GroupPredictionEntity>>>;
    fn list_tournament_predictions(
        &self,
        tournament_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<GroupPredictionEntity>>>;
    fn find_tournament(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<TournamentEntity>>>;
    fn find_group(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GroupEntity>>>;
    fn list_groups(
        &self,
        tournament_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<GroupEntity>>>;
    fn list_team_results(
        &self,
        tournament_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<TeamResultEntity>>>;
    fn clear_user_scores(&self, tournament_id: Uuid) -> BoxFuture<'static, StorageResult<()>>;
    fn save_user_score(&self, score: UserScoreEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
