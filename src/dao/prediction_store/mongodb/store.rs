use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database,
    bson::{Bson, doc},
    options::IndexOptions,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        MongoGroupDocument, MongoPredictionDocument, MongoTeamResultDocument,
        MongoTournamentDocument, MongoUserScoreDocument, doc_id, prediction_filter,
        uuid_as_binary,
    },
};
use crate::dao::{
    models::{
        GroupEntity, GroupPredictionEntity, TeamResultEntity, TournamentEntity, UserScoreEntity,
    },
    prediction_store::PredictionStore,
    storage::StorageResult,
};

const PREDICTION_COLLECTION_NAME: &str = "group_predictions";
const TOURNAMENT_COLLECTION_NAME: &str = "tournaments";
const GROUP_COLLECTION_NAME: &str = "groups";
const TEAM_RESULT_COLLECTION_NAME: &str = "team_results";
const USER_SCORE_COLLECTION_NAME: &str = "user_scores";

#[derive(Clone)]
pub struct MongoPredictionStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoPredictionStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        // One record per (user, tournament, group); upserts key on this triple.
        let predictions =
            database.collection::<MongoPredictionDocument>(PREDICTION_COLLECTION_NAME);
        let identity_index = mongodb::IndexModel::builder()
            .keys(doc! {"user_id": 1, "tournament_id": 1, "group_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("prediction_identity_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        predictions
            .create_index(identity_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: PREDICTION_COLLECTION_NAME,
                index: "user_id,tournament_id,group_id",
                source,
            })?;

        let tournament_index = mongodb::IndexModel::builder()
            .keys(doc! {"tournament_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("prediction_tournament_idx".to_owned()))
                    .build(),
            )
            .build();
        predictions
            .create_index(tournament_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: PREDICTION_COLLECTION_NAME,
                index: "tournament_id",
                source,
            })?;

        let scores = database.collection::<MongoUserScoreDocument>(USER_SCORE_COLLECTION_NAME);
        let score_index = mongodb::IndexModel::builder()
            .keys(doc! {"user_id": 1, "tournament_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("score_identity_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        scores
            .create_index(score_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: USER_SCORE_COLLECTION_NAME,
                index: "user_id,tournament_id",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn prediction_collection(&self) -> Collection<MongoPredictionDocument> {
        self.database()
            .await
            .collection::<MongoPredictionDocument>(PREDICTION_COLLECTION_NAME)
    }

    async fn tournament_collection(&self) -> Collection<MongoTournamentDocument> {
        self.database()
            .await
            .collection::<MongoTournamentDocument>(TOURNAMENT_COLLECTION_NAME)
    }

    async fn group_collection(&self) -> Collection<MongoGroupDocument> {
        self.database()
            .await
            .collection::<MongoGroupDocument>(GROUP_COLLECTION_NAME)
    }

    async fn team_result_collection(&self) -> Collection<MongoTeamResultDocument> {
        self.database()
            .await
            .collection::<MongoTeamResultDocument>(TEAM_RESULT_COLLECTION_NAME)
    }

    async fn user_score_collection(&self) -> Collection<MongoUserScoreDocument> {
        self.database()
            .await
            .collection::<MongoUserScoreDocument>(USER_SCORE_COLLECTION_NAME)
    }

    async fn save_prediction(&self, prediction: GroupPredictionEntity) -> MongoResult<()> {
        let filter = prediction_filter(
            &prediction.user_id,
            prediction.tournament_id,
            prediction.group_id,
        );
        let user_id = prediction.user_id.clone();
        let group_id = prediction.group_id;
        let document: MongoPredictionDocument = prediction.into();

        let collection = self.prediction_collection().await;
        collection
            .replace_one(filter, &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SavePrediction {
                user_id,
                group_id,
                source,
            })?;

        Ok(())
    }

    async fn find_prediction(
        &self,
        user_id: String,
        tournament_id: Uuid,
        group_id: Uuid,
    ) -> MongoResult<Option<GroupPredictionEntity>> {
        let collection = self.prediction_collection().await;
        let document = collection
            .find_one(prediction_filter(&user_id, tournament_id, group_id))
            .await
            .map_err(|source| MongoDaoError::LoadPrediction { group_id, source })?;

        Ok(document.map(Into::into))
    }

    async fn list_user_predictions(
        &self,
        user_id: String,
        tournament_id: Uuid,
    ) -> MongoResult<Vec<GroupPredictionEntity>> {
        let collection = self.prediction_collection().await;
        let documents: Vec<MongoPredictionDocument> = collection
            .find(doc! {
                "user_id": &user_id,
                "tournament_id": uuid_as_binary(tournament_id),
            })
            .await
            .map_err(|source| MongoDaoError::ListPredictions {
                tournament_id,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListPredictions {
                tournament_id,
                source,
            })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn list_tournament_predictions(
        &self,
        tournament_id: Uuid,
    ) -> MongoResult<Vec<GroupPredictionEntity>> {
        let collection = self.prediction_collection().await;
        let documents: Vec<MongoPredictionDocument> = collection
            .find(doc! {"tournament_id": uuid_as_binary(tournament_id)})
            .await
            .map_err(|source| MongoDaoError::ListPredictions {
                tournament_id,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListPredictions {
                tournament_id,
                source,
            })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn find_tournament(&self, id: Uuid) -> MongoResult<Option<TournamentEntity>> {
        let collection = self.tournament_collection().await;
        let document = collection
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadTournament { id, source })?;

        Ok(document.map(Into::into))
    }

    async fn find_group(&self, id: Uuid) -> MongoResult<Option<GroupEntity>> {
        let collection = self.group_collection().await;
        let document = collection
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadGroup { id, source })?;

        Ok(document.map(Into::into))
    }

    async fn list_groups(&self, tournament_id: Uuid) -> MongoResult<Vec<GroupEntity>> {
        let collection = self.group_collection().await;
        let documents: Vec<MongoGroupDocument> = collection
            .find(doc! {"tournament_id": uuid_as_binary(tournament_id)})
            .await
            .map_err(|source| MongoDaoError::ListGroups {
                tournament_id,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListGroups {
                tournament_id,
                source,
            })?;

        let mut groups: Vec<GroupEntity> = documents.into_iter().map(Into::into).collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(groups)
    }

    async fn list_team_results(&self, tournament_id: Uuid) -> MongoResult<Vec<TeamResultEntity>> {
        let groups = self.list_groups(tournament_id).await?;
        let group_ids: Vec<Bson> = groups
            .iter()
            .map(|group| uuid_as_binary(group.id).into())
            .collect();

        let collection = self.team_result_collection().await;
        let documents: Vec<MongoTeamResultDocument> = collection
            .find(doc! {"group_id": {"$in": group_ids}})
            .await
            .map_err(|source| MongoDaoError::ListTeamResults {
                tournament_id,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListTeamResults {
                tournament_id,
                source,
            })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn clear_user_scores(&self, tournament_id: Uuid) -> MongoResult<()> {
        let collection = self.user_score_collection().await;
        collection
            .delete_many(doc! {"tournament_id": uuid_as_binary(tournament_id)})
            .await
            .map_err(|source| MongoDaoError::ClearScores {
                tournament_id,
                source,
            })?;

        Ok(())
    }

    async fn save_user_score(&self, score: UserScoreEntity) -> MongoResult<()> {
        let filter = doc! {
            "user_id": &score.user_id,
            "tournament_id": uuid_as_binary(score.tournament_id),
        };
        let user_id = score.user_id.clone();
        let document: MongoUserScoreDocument = score.into();

        let collection = self.user_score_collection().await;
        collection
            .replace_one(filter, &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveScore { user_id, source })?;

        Ok(())
    }
}

impl PredictionStore for MongoPredictionStore {
    fn save_prediction(
        &self,
        prediction: GroupPredictionEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_prediction(prediction).await.map_err(Into::into) })
    }

    fn find_prediction(
        &self,
        user_id: String,
        tournament_id: Uuid,
        group_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<GroupPredictionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_prediction(user_id, tournament_id, group_id)
                .await
                .map_err(Into::into)
        })
    }

    fn list_user_predictions(
        &self,
        user_id: String,
        tournament_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<GroupPredictionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .list_user_predictions(user_id, tournament_id)
                .await
                .map_err(Into::into)
        })
    }

    fn list_tournament_predictions(
        &self,
        tournament_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<GroupPredictionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .list_tournament_predictions(tournament_id)
                .await
                .map_err(Into::into)
        })
    }

    fn find_tournament(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<TournamentEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_tournament(id).await.map_err(Into::into) })
    }

    fn find_group(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GroupEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_group(id).await.map_err(Into::into) })
    }

    fn list_groups(
        &self,
        tournament_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<GroupEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_groups(tournament_id).await.map_err(Into::into) })
    }

    fn list_team_results(
        &self,
        tournament_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<TeamResultEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .list_team_results(tournament_id)
                .await
                .map_err(Into::into)
        })
    }

    fn clear_user_scores(&self, tournament_id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .clear_user_scores(tournament_id)
                .await
                .map_err(Into::into)
        })
    }

    fn save_user_score(&self, score: UserScoreEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_user_score(score).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
