//! CLI error types with exit code handling
//!
//! Every command returns [`CliError`], which carries the process exit code
//! and renders through miette.

use ketch_core::CoreError;
use ketch_engine::EngineError;
use ketch_kube::KubeError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Invalid input (name, value, file content)
    #[error("{message}")]
    #[diagnostic(code(ketch::cli::validation))]
    Validation {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Application chart could not be rendered
    #[error("{message}")]
    #[diagnostic(code(ketch::cli::render))]
    Render {
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("{kind} \"{name}\" not found")]
    #[diagnostic(code(ketch::cli::not_found))]
    NotFound { kind: &'static str, name: String },

    /// Conflicting or missing arguments
    #[error("{message}")]
    #[diagnostic(code(ketch::cli::usage))]
    Usage {
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("IO error: {message}")]
    #[diagnostic(code(ketch::cli::io))]
    Io { message: String },

    #[error("Kubernetes error: {message}")]
    #[diagnostic(
        code(ketch::cli::cluster),
        help("check that your kubeconfig points at a cluster with the Ketch CRDs installed")
    )]
    Cluster { message: String },

    /// Wrapped error for passthrough (stores the formatted message)
    #[error("{message}")]
    #[diagnostic(code(ketch::cli::error))]
    Other { message: String },
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Validation { .. } => exit_codes::VALIDATION_ERROR,
            CliError::Render { .. } => exit_codes::RENDER_ERROR,
            CliError::NotFound { .. } => exit_codes::NOT_FOUND,
            CliError::Usage { .. } => exit_codes::USAGE_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Cluster { .. } => exit_codes::CLUSTER_ERROR,
            CliError::Other { .. } => exit_codes::ERROR,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            help: None,
        }
    }

    pub fn validation_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
            help: None,
        }
    }

    pub fn usage_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Io(e) => e.into(),
            other => CliError::validation(other.to_string()),
        }
    }
}

impl From<EngineError> for CliError {
    fn from(err: EngineError) -> Self {
        let help = err.help().map(|h| h.to_string());
        let message = match err.link() {
            Some(link) => format!("component link {}: {}", link, err),
            None => err.to_string(),
        };
        CliError::Render { message, help }
    }
}

impl From<KubeError> for CliError {
    fn from(err: KubeError) -> Self {
        match err {
            KubeError::Api(e) => e.into(),
            KubeError::Io(e) => e.into(),
            other => CliError::Other {
                message: other.to_string(),
            },
        }
    }
}

impl From<kube::Error> for CliError {
    fn from(err: kube::Error) -> Self {
        CliError::Cluster {
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for CliError {
    fn from(err: serde_yaml::Error) -> Self {
        CliError::validation(format!("invalid YAML: {}", err))
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::Other {
            message: err.to_string(),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
