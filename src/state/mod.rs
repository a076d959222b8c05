use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{
    config::AppConfig,
    dao::prediction_store::PredictionStore,
    error::ServiceError,
    services::propagation::{LoggingPropagator, PlayoffPropagator},
};

pub type SharedState = Arc<AppState>;

/// Central application state storing the storage handle and runtime
/// configuration.
pub struct AppState {
    prediction_store: RwLock<Option<Arc<dyn PredictionStore>>>,
    propagator: Arc<dyn PlayoffPropagator>,
    config: AppConfig,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        Self::with_propagator(config, Arc::new(LoggingPropagator))
    }

    /// Construct the state with a specific playoff propagator implementation.
    pub fn with_propagator(config: AppConfig, propagator: Arc<dyn PlayoffPropagator>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            prediction_store: RwLock::new(None),
            propagator,
            config,
            degraded: degraded_tx,
        })
    }

    /// Obtain a handle to the current prediction store, if one is installed.
    pub async fn prediction_store(&self) -> Option<Arc<dyn PredictionStore>> {
        let guard = self.prediction_store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the prediction store or fail with a degraded-mode error.
    pub async fn require_prediction_store(
        &self,
    ) -> Result<Arc<dyn PredictionStore>, ServiceError> {
        self.prediction_store()
            .await
            .ok_or(ServiceError::Degraded)
    }

    /// Install a new prediction store implementation and leave degraded mode.
    pub async fn install_prediction_store(&self, store: Arc<dyn PredictionStore>) {
        {
            let mut guard = self.prediction_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current prediction store and enter degraded mode.
    pub async fn clear_prediction_store(&self) {
        {
            let mut guard = self.prediction_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Runtime configuration resolved at startup.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Hook invoked after a prediction batch commits.
    pub fn propagator(&self) -> Arc<dyn PlayoffPropagator> {
        self.propagator.clone()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        if *self.degraded.borrow() == value {
            return;
        }

        let _ = self.degraded.send(value);
    }
}
