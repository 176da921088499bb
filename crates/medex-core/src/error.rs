use thiserror::Error;

#[derive(Error, Debug)]
pub enum MedexError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{service} returned status {status}: {message}")]
    Api {
        service: String,
        status: u16,
        message: String,
    },

    #[error("Invalid credentials: {0}")]
    CredentialsInvalid(String),

    #[error("Could not parse output location: {0}")]
    OutputLocationUnparseable(String),

    #[error("Unsupported artifact {name} with content type {content_type}")]
    UnsupportedArtifactType { name: String, content_type: String },

    #[error("Transient error while waiting for job: {0}")]
    JobWaitTransient(String),

    #[error("Batch Process Failed: {0}")]
    BatchProcessingFailed(String),

    #[error("Transform service error: {0}")]
    TransformService(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MedexError {
    /// Whether the failure is worth tolerating or retrying: server-side
    /// errors, throttling, and connection/timeout failures.
    pub fn is_transient(&self) -> bool {
        match self {
            MedexError::JobWaitTransient(_) => true,
            MedexError::Api { status, .. } => *status >= 500 || *status == 429,
            MedexError::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| s.is_server_error())
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, MedexError>;
