//! Error types for ketch-kube

use thiserror::Error;

/// Result type for ketch-kube operations
pub type Result<T> = std::result::Result<T, KubeError>;

/// Errors that can occur during Kubernetes operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    #[error("release '{name}' not found in namespace '{namespace}'")]
    ReleaseNotFound { name: String, namespace: String },

    #[error("release '{name}' already exists in namespace '{namespace}'")]
    ReleaseAlreadyExists { name: String, namespace: String },

    #[error("pool \"{name}\" is not found")]
    FrameworkNotFound { name: String },

    #[error("framework \"{framework}\" is not linked to a kubernetes namespace")]
    NamespaceNotLinked { framework: String },

    #[error("you have reached the limit of apps")]
    QuotaExceeded,

    /// Optimistic update lost the race too many times
    #[error("{kind} \"{name}\" kept changing, gave up after {attempts} attempts")]
    ConflictRetriesExhausted {
        kind: String,
        name: String,
        attempts: u32,
    },

    /// At least one resource of a manifest failed to apply
    #[error("failed to apply {resource}: {message} ({failed} resource(s) failed)")]
    ApplyFailed {
        resource: String,
        message: String,
        failed: usize,
    },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("release data too large ({size} bytes, max {max} bytes)")]
    ReleaseTooLarge { size: usize, max: usize },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("compression error: {0}")]
    Compression(String),

    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] ketch_core::CoreError),

    #[error(transparent)]
    Chart(#[from] ketch_engine::EngineError),
}

impl From<serde_json::Error> for KubeError {
    fn from(e: serde_json::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for KubeError {
    fn from(e: serde_yaml::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl KubeError {
    /// Check if this is a Kubernetes 404 Not Found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, KubeError::Api(kube::Error::Api(resp)) if resp.code == 404)
    }

    /// Check if this is a conflict error (409)
    pub fn is_conflict(&self) -> bool {
        matches!(self, KubeError::Api(kube::Error::Api(resp)) if resp.code == 409)
    }
}
