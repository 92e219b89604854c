//! Custom resources served under `theketch.io/v1beta1`
//!
//! All Ketch resources are cluster-scoped. The Rust types are plain data; the
//! controller receives an explicit client and never relies on a process-wide
//! type registry.

mod app;
mod application;
mod component;
mod framework;

pub use app::{
    App, AppDeploymentSpec, AppSpec, DockerRegistrySpec, Env, IngressSpec, ProcessSpec,
    RoutingSettings, UnitSelector, DEFAULT_PROCESS,
};
pub use application::{
    Application, ApplicationPhase, ApplicationSpec, ApplicationStatus, ComponentLink,
};
pub use component::{Component, ComponentSpec, KubeSchematic, KubeTemplate, Parameter, Schematic};
pub use framework::{
    Framework, FrameworkSpec, FrameworkStatus, IngressControllerSpec, IngressControllerType,
    NamespaceRef, UNLIMITED_QUOTA,
};

use once_cell::sync::Lazy;
use regex::Regex;
use schemars::r#gen::SchemaGenerator;
use schemars::schema::{Schema, SchemaObject};

use crate::error::{CoreError, Result};

/// API group of every Ketch resource
pub const GROUP: &str = "theketch.io";

/// Served version
pub const VERSION: &str = "v1beta1";

/// Field manager used for server-side apply and status patches
pub const FIELD_MANAGER: &str = "ketch";

static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("valid regex"));

/// Check that `name` is a valid DNS-1123 label
pub fn validate_name(name: &str) -> Result<()> {
    if name.len() > 63 {
        return Err(CoreError::InvalidName {
            name: name.to_string(),
            message: "must be no more than 63 characters".to_string(),
        });
    }
    if !NAME_RE.is_match(name) {
        return Err(CoreError::InvalidName {
            name: name.to_string(),
            message: "must consist of lower case alphanumeric characters or '-', and must start and end with an alphanumeric character".to_string(),
        });
    }
    Ok(())
}

/// Schema for fields holding arbitrary documents or scalars
pub fn preserve_unknown_fields(_: &mut SchemaGenerator) -> Schema {
    let mut schema = SchemaObject::default();
    schema.extensions.insert(
        "x-kubernetes-preserve-unknown-fields".to_string(),
        serde_json::Value::Bool(true),
    );
    Schema::Object(schema)
}
