//! Groupcast Back binary entrypoint wiring the REST API and storage layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use futures::future::BoxFuture;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use groupcast_back::{
    config::AppConfig,
    dao::{
        prediction_store::{PredictionStore, memory::MemoryPredictionStore},
        storage::StorageError,
    },
    routes,
    services::storage_supervisor,
    state::{AppState, SharedState},
};

/// Environment variable selecting the storage backend.
const STORE_BACKEND_ENV: &str = "STORE_BACKEND";

#[cfg(feature = "mongo-store")]
const DEFAULT_BACKEND: &str = "mongodb";
#[cfg(not(feature = "mongo-store"))]
const DEFAULT_BACKEND: &str = "memory";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let app_state = AppState::new(config);

    let backend = env::var(STORE_BACKEND_ENV).unwrap_or_else(|_| DEFAULT_BACKEND.to_string());
    info!(%backend, "selected storage backend");
    tokio::spawn(storage_supervisor::run(app_state.clone(), move || {
        connect_backend(backend.clone())
    }));

    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Connect to the configured storage backend. Unknown names fall back to the
/// in-memory store so the server still comes up in local setups.
fn connect_backend(
    backend: String,
) -> BoxFuture<'static, Result<Arc<dyn PredictionStore>, StorageError>> {
    Box::pin(async move {
        match backend.as_str() {
            #[cfg(feature = "mongo-store")]
            "mongodb" => {
                use groupcast_back::dao::prediction_store::mongodb::{
                    MongoConfig, MongoPredictionStore,
                };

                let config = MongoConfig::from_env().await?;
                let store = MongoPredictionStore::connect(config).await?;
                Ok(Arc::new(store) as Arc<dyn PredictionStore>)
            }
            #[cfg(feature = "couch-store")]
            "couchdb" => {
                use groupcast_back::dao::prediction_store::couchdb::{
                    CouchConfig, CouchPredictionStore,
                };

                let config = CouchConfig::from_env()?;
                let store = CouchPredictionStore::connect(config).await?;
                Ok(Arc::new(store) as Arc<dyn PredictionStore>)
            }
            "memory" => Ok(Arc::new(MemoryPredictionStore::new()) as Arc<dyn PredictionStore>),
            other => {
                warn!(backend = %other, "unknown storage backend; using the in-memory store");
                Ok(Arc::new(MemoryPredictionStore::new()) as Arc<dyn PredictionStore>)
            }
        }
    })
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
