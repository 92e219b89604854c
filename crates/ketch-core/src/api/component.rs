//! Component: a reusable manifest skeleton with typed parameters

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::value::ParameterType;

/// Component registered cluster-wide and referenced by `ComponentLink.type`.
///
/// Example:
/// ```yaml
/// apiVersion: theketch.io/v1beta1
/// kind: Component
/// metadata:
///   name: webserver
/// spec:
///   schematic:
///     kube:
///       templates:
///         - template:
///             apiVersion: apps/v1
///             kind: Deployment
///             ...
///           parameters:
///             - name: image
///               type: string
///               required: true
///               fieldPaths: ["spec.template.spec.containers[0].image"]
/// ```
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(group = "theketch.io", version = "v1beta1", kind = "Component")]
#[serde(rename_all = "camelCase")]
pub struct ComponentSpec {
    pub schematic: Schematic,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Schematic {
    pub kube: KubeSchematic,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct KubeSchematic {
    #[serde(default)]
    pub templates: Vec<KubeTemplate>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct KubeTemplate {
    /// Manifest skeleton
    #[schemars(schema_with = "crate::api::preserve_unknown_fields")]
    pub template: JsonValue,

    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub name: String,

    #[serde(rename = "type")]
    pub parameter_type: ParameterType,

    #[serde(default)]
    pub required: bool,

    /// Every location the value is written to
    pub field_paths: Vec<String>,
}

impl ComponentSpec {
    pub fn templates(&self) -> &[KubeTemplate] {
        &self.schematic.kube.templates
    }

    pub fn from_templates(templates: Vec<KubeTemplate>) -> Self {
        Self {
            schematic: Schematic {
                kube: KubeSchematic { templates },
            },
        }
    }
}
