/// Database model definitions.
pub mod models;
/// Prediction and tournament data storage operations.
pub mod prediction_store;
/// Storage abstraction layer for database operations.
pub mod storage;
