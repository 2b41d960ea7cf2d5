//! Error types for the event orchestrator.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Action dispatch errors.
///
/// These never abort a batch: the dispatcher folds them into a per-rule
/// result. They exist so the outbound helpers can use `?` internally.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Invalid action config: {0}")]
    InvalidConfig(String),

    #[error("Transport call failed: {0}")]
    Transport(String),

    #[error("HTTP error: {0}")]
    Http(String),
}

impl From<reqwest::Error> for DispatchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DispatchError::Transport(format!("request timed out: {e}"))
        } else {
            DispatchError::Http(e.to_string())
        }
    }
}

/// Pipeline-level errors for a single inbound webhook.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Integration not found for {0}")]
    IntegrationNotFound(String),

    #[error("Integration {id} is not connected (status: {status})")]
    IntegrationNotConnected { id: String, status: String },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl PipelineError {
    /// Whether this error is the caller's fault (maps to a 400 response).
    pub fn is_client_error(&self) -> bool {
        !matches!(self, PipelineError::Database(_))
    }
}

/// Result type alias for the orchestrator.
pub type Result<T> = std::result::Result<T, Error>;
