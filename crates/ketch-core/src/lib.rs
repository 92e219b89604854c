//! Ketch Core - Core types for the Ketch platform
//!
//! This crate provides the foundational types used throughout Ketch:
//! - `api`: The `Application`, `Component`, `Framework` and `App` custom resources
//! - `value`: Raw component properties and their typed decoding
//! - `fieldpath`: Field-path parsing and value injection into manifest skeletons
//! - `chart`: Chart metadata derived from an Application
//! - `config`, `builder`, `descriptor`: CLI configuration, builder catalogue and app files

pub mod api;
pub mod builder;
pub mod chart;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod fieldpath;
pub mod value;

pub use api::{
    App, Application, ApplicationPhase, ApplicationStatus, Component, ComponentLink,
    ComponentSpec, Framework, validate_name,
};
pub use builder::{Builder, DEFAULT_BUILDER, builders};
pub use chart::ChartConfig;
pub use config::{AdditionalBuilder, KetchConfig};
pub use descriptor::AppDescriptor;
pub use error::{CoreError, Result};
pub use fieldpath::{FieldPath, Segment, inject, set_value, set_values};
pub use value::{ParameterType, ParameterValue, RawProperty};
