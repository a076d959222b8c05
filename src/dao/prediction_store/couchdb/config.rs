use super::error::{CouchDaoError, CouchResult};

/// Database holding the prediction documents when none is configured.
const DEFAULT_DATABASE: &str = "groupcast";

/// Connection settings for the CouchDB prediction store.
#[derive(Debug, Clone)]
pub struct CouchConfig {
    /// Server base URL, e.g. `http://localhost:5984`.
    pub base_url: String,
    /// Database every document type is stored in.
    pub database: String,
    /// Basic-auth username when the server requires one.
    pub username: Option<String>,
    /// Basic-auth password paired with `username`.
    pub password: Option<String>,
}

impl CouchConfig {
    /// Configuration pointing at `base_url` with the default database and no
    /// credentials.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            database: DEFAULT_DATABASE.to_string(),
            username: None,
            password: None,
        }
    }

    /// Override the database name.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Attach basic-auth credentials.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Read the connection settings from the environment. `COUCH_BASE_URL` is
    /// required; `COUCH_DB`, `COUCH_USERNAME` and `COUCH_PASSWORD` are
    /// optional.
    pub fn from_env() -> CouchResult<Self> {
        let base_url =
            std::env::var("COUCH_BASE_URL").map_err(|_| CouchDaoError::MissingEnvVar {
                var: "COUCH_BASE_URL",
            })?;

        let mut config = Self::new(base_url);

        if let Ok(database) = std::env::var("COUCH_DB") {
            config = config.with_database(database);
        }

        if let (Some(username), Some(password)) = (
            std::env::var("COUCH_USERNAME").ok(),
            std::env::var("COUCH_PASSWORD").ok(),
        ) {
            config = config.with_credentials(username, password);
        }

        Ok(config)
    }
}
