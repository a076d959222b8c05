//! Typed failures for the CouchDB prediction store.

use reqwest::StatusCode;
use thiserror::Error;

/// Result alias used across the CouchDB store.
pub type CouchResult<T> = Result<T, CouchDaoError>;

/// Everything that can go wrong talking to CouchDB.
#[derive(Debug, Error)]
pub enum CouchDaoError {
    /// A required environment variable was not set.
    #[error("environment variable `{var}` is not set")]
    MissingEnvVar { var: &'static str },
    /// The underlying HTTP client could not be constructed.
    #[error("could not build the CouchDB HTTP client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// Probing the database failed at the transport level.
    #[error("could not reach CouchDB database `{database}`")]
    DatabaseQuery {
        database: String,
        #[source]
        source: reqwest::Error,
    },
    /// Creating the missing database failed.
    #[error("could not create CouchDB database `{database}`")]
    DatabaseCreate {
        database: String,
        #[source]
        source: reqwest::Error,
    },
    /// A database-level call answered with a status we do not handle.
    #[error("CouchDB answered {status} for database `{database}`")]
    DatabaseStatus {
        database: String,
        status: StatusCode,
    },
    /// A document request never reached the server.
    #[error("could not send CouchDB request to `{path}`")]
    RequestSend {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// A document request answered with a status we do not handle.
    #[error("CouchDB answered {status} for `{path}`")]
    RequestStatus { path: String, status: StatusCode },
    /// The response body was not valid JSON.
    #[error("could not decode the CouchDB response for `{path}`")]
    DecodeResponse {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// The JSON payload did not match the expected document model.
    #[error("could not deserialize the CouchDB document for `{path}`")]
    DeserializeValue {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    /// A document id did not carry the expected prefix or UUID.
    #[error("malformed document id `{doc_id}`: {kind}")]
    InvalidDocId { doc_id: String, kind: &'static str },
}
