use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::models::{
    GroupEntity, GroupPredictionEntity, TeamResultEntity, TournamentEntity, UserScoreEntity,
};
use crate::dao::prediction_store::PredictionStore;
use crate::dao::storage::StorageResult;

/// Process-local store used when no database is configured and by tests.
#[derive(Clone, Default)]
pub struct MemoryPredictionStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    predictions: DashMap<(String, Uuid, Uuid), GroupPredictionEntity>,
    tournaments: DashMap<Uuid, TournamentEntity>,
    groups: DashMap<Uuid, GroupEntity>,
    team_results: DashMap<Uuid, TeamResultEntity>,
    user_scores: DashMap<(String, Uuid), UserScoreEntity>,
}

impl MemoryPredictionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a tournament record, replacing any previous one with the same id.
    pub fn seed_tournament(&self, tournament: TournamentEntity) {
        self.inner.tournaments.insert(tournament.id, tournament);
    }

    /// Install a group record, replacing any previous one with the same id.
    pub fn seed_group(&self, group: GroupEntity) {
        self.inner.groups.insert(group.id, group);
    }

    /// Install a progressive team outcome, replacing any previous row for the team.
    pub fn seed_team_result(&self, result: TeamResultEntity) {
        self.inner.team_results.insert(result.team_id, result);
    }

    /// Stored score aggregates for a tournament, unordered.
    pub fn user_scores(&self, tournament_id: Uuid) -> Vec<UserScoreEntity> {
        self.inner
            .user_scores
            .iter()
            .filter(|entry| entry.value().tournament_id == tournament_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    fn group_ids_of(&self, tournament_id: Uuid) -> HashSet<Uuid> {
        self.inner
            .groups
            .iter()
            .filter(|entry| entry.value().tournament_id == tournament_id)
            .map(|entry| *entry.key())
            .collect()
    }
}

impl PredictionStore for MemoryPredictionStore {
    fn save_prediction(
        &self,
        prediction: GroupPredictionEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.predictions.insert(prediction.key(), prediction);
            Ok(())
        })
    }

    fn find_prediction(
        &self,
        user_id: String,
        tournament_id: Uuid,
        group_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<GroupPredictionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .predictions
                .get(&(user_id, tournament_id, group_id))
                .map(|entry| entry.value().clone()))
        })
    }

    fn list_user_predictions(
        &self,
        user_id: String,
        tournament_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<GroupPredictionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .predictions
                .iter()
                .filter(|entry| {
                    let value = entry.value();
                    value.user_id == user_id && value.tournament_id == tournament_id
                })
                .map(|entry| entry.value().clone())
                .collect())
        })
    }

    fn list_tournament_predictions(
        &self,
        tournament_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<GroupPredictionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .predictions
                .iter()
                .filter(|entry| entry.value().tournament_id == tournament_id)
                .map(|entry| entry.value().clone())
                .collect())
        })
    }

    fn find_tournament(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<TournamentEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .tournaments
                .get(&id)
                .map(|entry| entry.value().clone()))
        })
    }

    fn find_group(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GroupEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store.inner.groups.get(&id).map(|entry| entry.value().clone()))
        })
    }

    fn list_groups(
        &self,
        tournament_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<GroupEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut groups: Vec<GroupEntity> = store
                .inner
                .groups
                .iter()
                .filter(|entry| entry.value().tournament_id == tournament_id)
                .map(|entry| entry.value().clone())
                .collect();
            groups.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(groups)
        })
    }

    fn list_team_results(
        &self,
        tournament_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<TeamResultEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let group_ids = store.group_ids_of(tournament_id);
            Ok(store
                .inner
                .team_results
                .iter()
                .filter(|entry| group_ids.contains(&entry.value().group_id))
                .map(|entry| entry.value().clone())
                .collect())
        })
    }

    fn clear_user_scores(&self, tournament_id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .inner
                .user_scores
                .retain(|_, score| score.tournament_id != tournament_id);
            Ok(())
        })
    }

    fn save_user_score(&self, score: UserScoreEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .inner
                .user_scores
                .insert((score.user_id.clone(), score.tournament_id), score);
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::TeamPositionEntity;
    use std::time::SystemTime;

    fn prediction(user: &str, tournament: Uuid, group: Uuid) -> GroupPredictionEntity {
        GroupPredictionEntity {
            user_id: user.to_string(),
            tournament_id: tournament,
            group_id: group,
            team_positions: Vec::new(),
            created_at: SystemTime::UNIX_EPOCH,
            updated_at: SystemTime::UNIX_EPOCH,
        }
    }

    #[tokio::test]
    async fn save_prediction_replaces_existing_record() {
        let store = MemoryPredictionStore::new();
        let tournament = Uuid::new_v4();
        let group = Uuid::new_v4();

        let mut first = prediction("user-1", tournament, group);
        first.team_positions.push(TeamPositionEntity {
            team_id: Uuid::new_v4(),
            predicted_position: 1,
            predicted_to_qualify: true,
        });
        store.save_prediction(first).await.unwrap();

        let second = prediction("user-1", tournament, group);
        store.save_prediction(second.clone()).await.unwrap();

        let listed = store
            .list_user_predictions("user-1".into(), tournament)
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0], second);
    }

    #[tokio::test]
    async fn listings_are_scoped_to_user_and_tournament() {
        let store = MemoryPredictionStore::new();
        let tournament = Uuid::new_v4();
        let other_tournament = Uuid::new_v4();
        let group = Uuid::new_v4();

        store
            .save_prediction(prediction("user-1", tournament, group))
            .await
            .unwrap();
        store
            .save_prediction(prediction("user-2", tournament, group))
            .await
            .unwrap();
        store
            .save_prediction(prediction("user-1", other_tournament, group))
            .await
            .unwrap();

        let mine = store
            .list_user_predictions("user-1".into(), tournament)
            .await
            .unwrap();
        assert_eq!(mine.len(), 1);

        let all = store.list_tournament_predictions(tournament).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn clear_user_scores_only_touches_the_tournament() {
        let store = MemoryPredictionStore::new();
        let tournament = Uuid::new_v4();
        let other_tournament = Uuid::new_v4();

        for (user, id) in [("a", tournament), ("b", tournament), ("a", other_tournament)] {
            store
                .save_user_score(UserScoreEntity {
                    user_id: user.to_string(),
                    tournament_id: id,
                    total_score: 3,
                    correct_count: 2,
                    exact_count: 1,
                    computed_at: SystemTime::UNIX_EPOCH,
                })
                .await
                .unwrap();
        }

        store.clear_user_scores(tournament).await.unwrap();
        assert!(store.user_scores(tournament).is_empty());
        assert_eq!(store.user_scores(other_tournament).len(), 1);
    }
}
