//! Framework (pool): a namespace binding with an app quota

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Quota value meaning "no limit"
pub const UNLIMITED_QUOTA: i32 = -1;

fn unlimited_quota() -> i32 {
    UNLIMITED_QUOTA
}

#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "theketch.io",
    version = "v1beta1",
    kind = "Framework",
    status = "FrameworkStatus",
    printcolumn = r#"{"name":"Namespace","type":"string","jsonPath":".spec.namespace"}"#,
    printcolumn = r#"{"name":"Quota","type":"integer","jsonPath":".spec.appQuotaLimit"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct FrameworkSpec {
    /// Set by `framework add` from a YAML file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Namespace the framework's applications are deployed into
    #[serde(rename = "namespace", default)]
    pub namespace_name: String,

    /// Maximum number of linked apps, `-1` for unlimited
    #[serde(default = "unlimited_quota")]
    pub app_quota_limit: i32,

    #[serde(default)]
    pub ingress_controller: IngressControllerSpec,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IngressControllerSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_endpoint: Option<String>,

    #[serde(rename = "type", default)]
    pub ingress_type: IngressControllerType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_issuer: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IngressControllerType {
    #[default]
    Traefik,
    Istio,
    Nginx,
}

impl fmt::Display for IngressControllerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Traefik => write!(f, "traefik"),
            Self::Istio => write!(f, "istio"),
            Self::Nginx => write!(f, "nginx"),
        }
    }
}

impl FromStr for IngressControllerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "traefik" => Ok(Self::Traefik),
            "istio" => Ok(Self::Istio),
            "nginx" => Ok(Self::Nginx),
            other => Err(format!(
                "unsupported ingress controller type {:?}, expected traefik, istio or nginx",
                other
            )),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FrameworkStatus {
    /// Set once the namespace exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<NamespaceRef>,

    /// Apps currently deployed through this framework
    #[serde(default)]
    pub apps: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct NamespaceRef {
    pub name: String,
}

impl Framework {
    /// Namespace the framework has been linked to, if any
    pub fn bound_namespace(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.namespace.as_ref())
            .map(|ns| ns.name.as_str())
    }

    pub fn apps(&self) -> &[String] {
        self.status
            .as_ref()
            .map(|s| s.apps.as_slice())
            .unwrap_or_default()
    }

    pub fn has_app(&self, name: &str) -> bool {
        self.apps().iter().any(|a| a == name)
    }

    /// Whether linking `app` would exceed the quota
    ///
    /// Apps already listed never count against the quota.
    pub fn quota_exhausted_for(&self, app: &str) -> bool {
        let limit = self.spec.app_quota_limit;
        !self.has_app(app) && limit != UNLIMITED_QUOTA && self.apps().len() as i64 >= limit as i64
    }

    /// Add `app` to the status list, returns false if it was already there
    pub fn link_app(&mut self, app: &str) -> bool {
        if self.has_app(app) {
            return false;
        }
        self.status
            .get_or_insert_with(FrameworkStatus::default)
            .apps
            .push(app.to_string());
        true
    }

    /// Remove `app` from the status list, returns false if it was absent
    pub fn unlink_app(&mut self, app: &str) -> bool {
        match self.status.as_mut() {
            Some(status) => {
                let before = status.apps.len();
                status.apps.retain(|a| a != app);
                status.apps.len() != before
            }
            None => false,
        }
    }
}
