/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Prediction save pipeline and default seeding.
pub mod prediction_service;
/// Playoff recalculation trigger invoked after committed saves.
pub mod propagation;
/// Scoring engine and the administrative recompute.
pub mod scoring_service;
/// Storage connection supervisor with reconnect backoff.
pub mod storage_supervisor;
/// Ordered batch validation rules.
pub mod validation;
