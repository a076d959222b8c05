use std::collections::HashSet;
use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::from_value;
use uuid::Uuid;

use crate::dao::{
    models::{
        GroupEntity, GroupPredictionEntity, TeamResultEntity, TournamentEntity, UserScoreEntity,
    },
    prediction_store::PredictionStore,
    storage::StorageResult,
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{
        AllDocsResponse, CouchGroupDocument, CouchPredictionDocument, CouchTeamResultDocument,
        CouchTournamentDocument, CouchUserScoreDocument, END_SUFFIX, GROUP_PREFIX,
        PREDICTION_PREFIX, RESULT_PREFIX, SCORE_PREFIX, group_doc_id, prediction_doc_id,
        tournament_doc_id, user_prediction_prefix, user_score_doc_id,
    },
};

#[derive(Clone)]
pub struct CouchPredictionStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl CouchPredictionStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let base_url = Arc::<str>::from(config.base_url.trim_end_matches('/'));
        let database = Arc::<str>::from(config.database);
        let auth = config
            .username
            .zip(config.password)
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let store = Self {
            client,
            base_url,
            database,
            auth,
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}/{}", self.base_url, self.database, path);
        let builder = self.client.request(method, url);
        if let Some((ref user, ref pass)) = self.auth {
            builder.basic_auth(user.as_ref(), Some(pass.as_ref()))
        } else {
            builder
        }
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = format!("{}/{}", self.base_url, self.database);
        let mut builder = self.client.get(&url);
        if let Some((ref user, ref pass)) = self.auth {
            builder = builder.basic_auth(user.as_ref(), Some(pass.as_ref()));
        }

        let response = builder
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let mut builder = self.client.put(&url);
                if let Some((ref user, ref pass)) = self.auth {
                    builder = builder.basic_auth(user.as_ref(), Some(pass.as_ref()));
                }
                let create =
                    builder
                        .send()
                        .await
                        .map_err(|source| CouchDaoError::DatabaseCreate {
                            database: database.clone(),
                            source,
                        })?;
                if create.status().is_success() {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn get_document<T>(&self, doc_id: &str) -> CouchResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::GET, doc_id)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                response.json::<T>().await.map(Some).map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: doc_id.to_string(),
                        source,
                    }
                })
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn put_document<T>(&self, doc_id: &str, document: &T) -> CouchResult<()>
    where
        T: ?Sized + Serialize,
    {
        let response = self
            .request(Method::PUT, doc_id)
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: response.status(),
            })
        }
    }

    async fn delete_document(&self, doc_id: &str, rev: &str) -> CouchResult<()> {
        let response = self
            .request(Method::DELETE, doc_id)
            .query(&[("rev", rev)])
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        // A 404 means another writer already removed the document.
        if response.status().is_success() || response.status() == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: response.status(),
            })
        }
    }

    async fn list_documents<T>(&self, prefix: &str) -> CouchResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        const ALL_DOCS: &str = "_all_docs";
        let query = [
            ("include_docs", "true".to_string()),
            ("startkey", format!("\"{}\"", prefix)),
            ("endkey", format!("\"{}{}\"", prefix, END_SUFFIX)),
        ];

        let response = self
            .request(Method::GET, ALL_DOCS)
            .query(&query)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: ALL_DOCS.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: ALL_DOCS.to_string(),
                status: response.status(),
            });
        }

        let payload = response.json::<AllDocsResponse>().await.map_err(|source| {
            CouchDaoError::DecodeResponse {
                path: ALL_DOCS.to_string(),
                source,
            }
        })?;

        let mut documents = Vec::new();
        for row in payload.rows {
            if let Some(doc) = row.doc {
                let parsed = from_value(doc).map_err(|source| CouchDaoError::DeserializeValue {
                    path: ALL_DOCS.to_string(),
                    source,
                })?;
                documents.push(parsed);
            }
        }

        Ok(documents)
    }

    async fn groups_of(&self, tournament_id: Uuid) -> CouchResult<Vec<GroupEntity>> {
        let docs = self
            .list_documents::<CouchGroupDocument>(GROUP_PREFIX)
            .await?;

        let mut groups = Vec::new();
        for doc in docs {
            let group: GroupEntity = doc.try_into()?;
            if group.tournament_id == tournament_id {
                groups.push(group);
            }
        }
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(groups)
    }
}

impl PredictionStore for CouchPredictionStore {
    fn save_prediction(
        &self,
        prediction: GroupPredictionEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = prediction_doc_id(
                &prediction.user_id,
                prediction.tournament_id,
                prediction.group_id,
            );
            let rev = store
                .get_document::<CouchPredictionDocument>(&doc_id)
                .await?
                .and_then(|existing| existing.rev);
            let doc = CouchPredictionDocument::from((prediction, rev));
            store.put_document(&doc_id, &doc).await.map_err(Into::into)
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
            let doc_id = prediction_doc_id(&user_id, tournament_id, group_id);
            let maybe_doc = store.get_document::<CouchPredictionDocument>(&doc_id).await?;
            Ok(maybe_doc.map(Into::into))
        })
    }

    fn list_user_predictions(
        &self,
        user_id: String,
        tournament_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<GroupPredictionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let docs = store
                .list_documents::<CouchPredictionDocument>(&user_prediction_prefix(&user_id))
                .await?;
            Ok(docs
                .into_iter()
                .map(GroupPredictionEntity::from)
                .filter(|prediction| prediction.tournament_id == tournament_id)
                .collect())
        })
    }

    fn list_tournament_predictions(
        &self,
        tournament_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<GroupPredictionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let docs = store
                .list_documents::<CouchPredictionDocument>(PREDICTION_PREFIX)
                .await?;
            Ok(docs
                .into_iter()
                .map(GroupPredictionEntity::from)
                .filter(|prediction| prediction.tournament_id == tournament_id)
                .collect())
        })
    }

    fn find_tournament(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<TournamentEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = tournament_doc_id(id);
            let maybe_doc = store
                .get_document::<CouchTournamentDocument>(&doc_id)
                .await?;
            match maybe_doc {
                Some(doc) => {
                    let tournament: TournamentEntity = doc.try_into()?;
                    Ok(Some(tournament))
                }
                None => Ok(None),
            }
        })
    }

    fn find_group(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GroupEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = group_doc_id(id);
            let maybe_doc = store.get_document::<CouchGroupDocument>(&doc_id).await?;
            match maybe_doc {
                Some(doc) => {
                    let group: GroupEntity = doc.try_into()?;
                    Ok(Some(group))
                }
                None => Ok(None),
            }
        })
    }

    fn list_groups(
        &self,
        tournament_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<GroupEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.groups_of(tournament_id).await.map_err(Into::into) })
    }

    fn list_team_results(
        &self,
        tournament_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<TeamResultEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let group_ids: HashSet<Uuid> = store
                .groups_of(tournament_id)
                .await?
                .into_iter()
                .map(|group| group.id)
                .collect();

            let docs = store
                .list_documents::<CouchTeamResultDocument>(RESULT_PREFIX)
                .await?;
            Ok(docs
                .into_iter()
                .map(TeamResultEntity::from)
                .filter(|result| group_ids.contains(&result.group_id))
                .collect())
        })
    }

    fn clear_user_scores(&self, tournament_id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let docs = store
                .list_documents::<CouchUserScoreDocument>(SCORE_PREFIX)
                .await?;

            for doc in docs {
                if doc.score.tournament_id != tournament_id {
                    continue;
                }
                if let Some(rev) = doc.rev.as_deref() {
                    store.delete_document(&doc.id, rev).await?;
                }
            }

            Ok(())
        })
    }

    fn save_user_score(&self, score: UserScoreEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = user_score_doc_id(&score.user_id, score.tournament_id);
            let rev = store
                .get_document::<CouchUserScoreDocument>(&doc_id)
                .await?
                .and_then(|existing| existing.rev);
            let doc = CouchUserScoreDocument::from((score, rev));
            store.put_document(&doc_id, &doc).await.map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let url = format!("{}/{}", store.base_url, store.database);
            let mut builder = store.client.get(&url);
            if let Some((ref user, ref pass)) = store.auth {
                builder = builder.basic_auth(user.as_ref(), Some(pass.as_ref()));
            }

            let response = builder
                .send()
                .await
                .map_err(|source| CouchDaoError::RequestSend {
                    path: url.clone(),
                    source,
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::RequestStatus {
                    path: url,
                    status: response.status(),
                }
                .into())
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
