use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("File not found or could not be read: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse operator configuration JSON: {0}")]
    DeserializationError(#[from] serde_json::Error),

    #[error("Invalid operator configuration: {0}")]
    ConfigError(String),

    #[error("Object {0} not found")]
    ObjectNotFound(String),

    #[error("Failed to define {kind} resource for {owner}: {reason}")]
    ResourceDefinitionError { kind: &'static str, owner: String, reason: String },

    #[error("Cluster store request failed: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Cluster store request failed: {0}")]
    StoreError(String),

    #[error("Request to node API failed: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Node API rejected the session request with status {0}")]
    AuthenticationError(u16),

    #[error("Node API returned an unexpected response: {0}")]
    RemoteApiError(String),

    #[error("Job {job_id} was created on the node but its status could not be recorded: {reason}")]
    UnrecordedJobError { job_id: String, reason: String },

    #[error("Invocation was cancelled")]
    Cancelled,

    #[error("Invocation exceeded its deadline")]
    DeadlineExceeded,
}

impl Error {
    /// Whether the dispatcher should retry soon rather than back off for long.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::KubeError(_)
            | Error::StoreError(_)
            | Error::NetworkError(_)
            | Error::RemoteApiError(_)
            | Error::Cancelled
            | Error::DeadlineExceeded => true,
            Error::AuthenticationError(status) => *status >= 500,
            Error::IoError(_)
            | Error::DeserializationError(_)
            | Error::ConfigError(_)
            | Error::ObjectNotFound(_)
            | Error::ResourceDefinitionError { .. }
            | Error::UnrecordedJobError { .. } => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
