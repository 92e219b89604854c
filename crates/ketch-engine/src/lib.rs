//! Ketch Engine - Component rendering and chart assembly
//!
//! This crate turns an `Application` into the set of manifests deployed for it:
//! - Component templates with typed parameters injected at field paths
//! - Application charts assembled from every component link, all or nothing
//! - Diagnostics with "did you mean" suggestions for unknown names

pub mod chart;
pub mod error;
pub mod renderer;
pub mod suggestions;

pub use chart::{ApplicationChart, ComponentRegistry, registry_from_components};
pub use error::{EngineError, Result};
pub use renderer::{render_component_templates, template_key};
