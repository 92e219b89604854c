//! Application: an ordered list of component links deployed into a framework

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::value::RawProperty;

/// Application groups component instantiations under one chart.
///
/// Example:
/// ```yaml
/// apiVersion: theketch.io/v1beta1
/// kind: Application
/// metadata:
///   name: app-running
/// spec:
///   framework: working-pool
///   components:
///     - name: frontend
///       type: webserver
///       properties:
///         image: me/my-frontend:1.2.3
/// ```
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "theketch.io",
    version = "v1beta1",
    kind = "Application",
    status = "ApplicationStatus",
    printcolumn = r#"{"name":"Framework","type":"string","jsonPath":".spec.framework"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Message","type":"string","jsonPath":".status.message"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSpec {
    /// Framework (pool) the application is deployed into
    pub framework: String,

    /// Explicit app version, defaults to `v<generation>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Component instantiations, rendered in order
    #[serde(default)]
    pub components: Vec<ComponentLink>,
}

/// Named instantiation of a registered component
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct ComponentLink {
    /// Identity of the rendered manifest inside the chart
    pub name: String,

    /// Name of the Component resource to instantiate
    #[serde(rename = "type")]
    pub component_type: String,

    /// Parameter values, decoded against the component's declared types
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, RawProperty>,
}

impl ComponentLink {
    pub fn new(name: impl Into<String>, component_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            component_type: component_type.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, raw: impl Into<RawProperty>) -> Self {
        self.properties.insert(name.into(), raw.into());
        self
    }
}

/// Outcome of the last reconciliation
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ApplicationPhase {
    Succeeded,
    /// Retryable, the chart could not be applied yet
    #[default]
    Pending,
    /// Terminal until the Application or its framework changes
    Failed,
}

impl fmt::Display for ApplicationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "Succeeded"),
            Self::Pending => write!(f, "Pending"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationStatus {
    pub phase: ApplicationPhase,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl ApplicationStatus {
    pub fn succeeded() -> Self {
        Self {
            phase: ApplicationPhase::Succeeded,
            message: None,
            observed_generation: None,
        }
    }

    pub fn pending(message: impl Into<String>) -> Self {
        Self {
            phase: ApplicationPhase::Pending,
            message: Some(message.into()),
            observed_generation: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            phase: ApplicationPhase::Failed,
            message: Some(message.into()),
            observed_generation: None,
        }
    }

    pub fn with_generation(mut self, generation: Option<i64>) -> Self {
        self.observed_generation = generation;
        self
    }

    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_application_from_yaml() {
        let app: Application = serde_yaml::from_str(
            r#"
apiVersion: theketch.io/v1beta1
kind: Application
metadata:
  name: app-running
  generation: 3
spec:
  framework: working-pool
  version: v9
  components:
    - name: frontend
      type: webserver
      properties:
        image: me/my-frontend:1.2.3
        port: 9999
"#,
        )
        .unwrap();

        assert_eq!(app.metadata.name.as_deref(), Some("app-running"));
        assert_eq!(app.spec.framework, "working-pool");
        assert_eq!(app.spec.version.as_deref(), Some("v9"));
        let link = &app.spec.components[0];
        assert_eq!(link.component_type, "webserver");
        assert_eq!(link.properties["port"].as_str(), "9999");
    }

    #[test]
    fn test_status_constructors() {
        let failed = ApplicationStatus::failed("you have reached the limit of apps");
        assert_eq!(failed.phase, ApplicationPhase::Failed);
        assert_eq!(failed.message(), "you have reached the limit of apps");
        assert_eq!(ApplicationStatus::succeeded().message(), "");
    }

    #[test]
    fn test_crd_is_cluster_scoped() {
        use kube::CustomResourceExt;
        let crd = Application::crd();
        assert_eq!(crd.spec.scope, "Cluster");
        assert_eq!(crd.spec.group, "theketch.io");
    }
}
