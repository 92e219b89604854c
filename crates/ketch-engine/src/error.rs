//! Engine error types

use ketch_core::CoreError;
use miette::Diagnostic;
use thiserror::Error;

/// Errors raised while rendering components or assembling a chart
///
/// The display text of each variant is what ends up in
/// `Application.status.message`.
#[derive(Error, Debug, Diagnostic)]
pub enum EngineError {
    #[error("component type {component_type} is not defined")]
    #[diagnostic(code(ketch::engine::unknown_component))]
    UnknownComponentType {
        component_type: String,
        link: String,
        #[help]
        suggestion: Option<String>,
    },

    #[error("required parameter not found: {parameter}")]
    #[diagnostic(code(ketch::engine::required_parameter))]
    RequiredParameterMissing {
        parameter: String,
        link: String,
        #[help]
        suggestion: Option<String>,
    },

    #[error("template {name} is rendered by more than one component link")]
    #[diagnostic(
        code(ketch::engine::duplicate_template),
        help("component link names must be unique within an application")
    )]
    DuplicateTemplate { name: String },

    #[error("{0}")]
    #[diagnostic(code(ketch::engine::injection))]
    Core(#[from] CoreError),

    #[error("YAML error: {0}")]
    #[diagnostic(code(ketch::engine::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl EngineError {
    /// Component link the error was raised for, when known
    pub fn link(&self) -> Option<&str> {
        match self {
            Self::UnknownComponentType { link, .. } | Self::RequiredParameterMissing { link, .. } => {
                Some(link)
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
