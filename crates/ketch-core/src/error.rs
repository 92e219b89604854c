//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("invalid field path {path:?}: {message}")]
    InvalidFieldPath { path: String, message: String },

    #[error("path not found: {path}")]
    PathNotFound { path: String },

    #[error("malformed number {raw:?} for parameter {parameter}")]
    MalformedNumber { parameter: String, raw: String },

    #[error("malformed bool {raw:?} for parameter {parameter}")]
    MalformedBool { parameter: String, raw: String },

    #[error("parameter {parameter} expects a {expected} value, got {raw}")]
    StructuredProperty {
        parameter: String,
        expected: crate::value::ParameterType,
        raw: String,
    },

    #[error("invalid name {name:?}: {message}")]
    InvalidName { name: String, message: String },

    #[error("invalid environment variable {0:?}, expected NAME=VALUE")]
    InvalidEnv(String),

    #[error("deployment version {version} not found")]
    DeploymentNotFound { version: u32 },

    #[error("process {process} not found")]
    ProcessNotFound { process: String },

    #[error("missing required field {field}")]
    MissingField { field: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Failed to parse config: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid version: {0}")]
    InvalidVersion(#[from] semver::Error),

    #[error("could not determine the home directory, set KETCH_HOME")]
    NoHomeDir,
}

pub type Result<T> = std::result::Result<T, CoreError>;
