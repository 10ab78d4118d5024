use thiserror::Error;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("not initialized: no lifecycle.yaml under the data root")]
    NotInitialized,

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("post not found: {0}")]
    PostNotFound(String),

    #[error("invalid id '{0}': must be lowercase alphanumeric with hyphens or underscores")]
    InvalidId(String),

    #[error("invalid lifecycle state: {0}")]
    InvalidState(String),

    #[error("invalid transition reason: {0}")]
    InvalidReason(String),

    #[error("invalid content type: {0}")]
    InvalidContentType(String),

    #[error("store write failed for {record}: {reason}")]
    StoreWrite { record: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LifecycleError>;
