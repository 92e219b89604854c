//! Kubernetes resource operations for applying and deleting manifests
//!
//! Works like `kubectl apply -f` / `kubectl delete -f` on multi-document YAML:
//! - Server-Side Apply under the `ketch` field manager
//! - Dynamic resource handling through API discovery
//! - Creation ordered by kind (namespaces and config first), deletion reversed
//! - `helm.sh/resource-policy: keep` resources survive deletion

use async_trait::async_trait;
use kube::{
    Client,
    api::{Api, DeleteParams, DynamicObject, Patch, PatchParams},
    core::{GroupVersionKind, TypeMeta},
    discovery::{ApiCapabilities, ApiResource, Discovery, Scope},
};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{KubeError, Result};

/// Field manager name for Server-Side Apply
pub const FIELD_MANAGER: &str = ketch_core::api::FIELD_MANAGER;

/// Annotation to keep resource on uninstall (Helm-compatible)
const RESOURCE_POLICY_ANNOTATION: &str = "helm.sh/resource-policy";
const RESOURCE_POLICY_KEEP: &str = "keep";

/// Applies and deletes rendered manifests
#[async_trait]
pub trait ManifestApplier: Send + Sync {
    /// Apply every document of `manifest`, defaulting namespaced resources to `namespace`
    async fn apply_manifest(
        &self,
        namespace: &str,
        manifest: &str,
        dry_run: bool,
    ) -> Result<OperationSummary>;

    /// Delete every document of `manifest`, in reverse creation order
    async fn delete_manifest(
        &self,
        namespace: &str,
        manifest: &str,
        dry_run: bool,
    ) -> Result<OperationSummary>;
}

/// Summary of apply/delete operations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationSummary {
    pub succeeded: Vec<String>,
    /// Failed resources with errors
    pub failed: Vec<(String, String)>,
    /// Skipped resources with the reason (policy, already gone)
    pub skipped: Vec<(String, String)>,
}

impl OperationSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len() + self.skipped.len()
    }

    /// Format as human-readable summary
    pub fn summary(&self) -> String {
        let mut parts = Vec::with_capacity(3);
        if !self.succeeded.is_empty() {
            parts.push(format!("{} succeeded", self.succeeded.len()));
        }
        if !self.failed.is_empty() {
            parts.push(format!("{} failed", self.failed.len()));
        }
        if !self.skipped.is_empty() {
            parts.push(format!("{} skipped", self.skipped.len()));
        }
        if parts.is_empty() {
            "No resources processed".to_string()
        } else {
            parts.join(", ")
        }
    }

    /// First failure as an error
    pub fn into_result(self) -> Result<Self> {
        match self.failed.first() {
            Some((resource, message)) => Err(KubeError::ApplyFailed {
                resource: resource.clone(),
                message: message.clone(),
                failed: self.failed.len(),
            }),
            None => Ok(self),
        }
    }
}

/// Creation order of resource kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ResourceCategory {
    Namespace = 0,
    Rbac = 10,
    Config = 20,
    Storage = 21,
    Network = 30,
    Workload = 40,
    Batch = 50,
    Autoscaling = 60,
    Other = 100,
}

impl ResourceCategory {
    pub fn from_kind(kind: &str) -> Self {
        match kind {
            "Namespace" => Self::Namespace,
            "ServiceAccount" | "Role" | "RoleBinding" | "ClusterRole" | "ClusterRoleBinding" => {
                Self::Rbac
            }
            "ConfigMap" | "Secret" => Self::Config,
            "PersistentVolume" | "PersistentVolumeClaim" | "StorageClass" => Self::Storage,
            "NetworkPolicy" | "Service" | "Endpoints" | "Ingress" | "IngressClass" => Self::Network,
            "Deployment" | "StatefulSet" | "DaemonSet" | "ReplicaSet" | "Pod" => Self::Workload,
            "Job" | "CronJob" => Self::Batch,
            "HorizontalPodAutoscaler" | "PodDisruptionBudget" => Self::Autoscaling,
            _ => Self::Other,
        }
    }
}

/// Identity of a manifest document, independent of its content
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ResourceKey {
    pub api_version: String,
    pub kind: String,
    pub namespace: Option<String>,
    pub name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentHeader {
    #[serde(default)]
    api_version: String,
    #[serde(default)]
    kind: String,
    #[serde(default)]
    metadata: HeaderMetadata,
}

#[derive(Deserialize, Default)]
struct HeaderMetadata {
    #[serde(default)]
    name: String,
    #[serde(default)]
    namespace: Option<String>,
}

/// Non-empty documents of a multi-document YAML stream
pub fn split_documents(manifest: &str) -> Vec<&str> {
    manifest
        .split("\n---")
        .map(|doc| doc.strip_prefix("---").unwrap_or(doc))
        .map(str::trim)
        .filter(|doc| {
            !doc.lines()
                .all(|l| l.trim().is_empty() || l.trim().starts_with('#'))
        })
        .collect()
}

fn document_key(doc: &str) -> Result<ResourceKey> {
    let header: DocumentHeader = serde_yaml::from_str(doc)?;
    Ok(ResourceKey {
        api_version: header.api_version,
        kind: header.kind,
        namespace: header.metadata.namespace,
        name: header.metadata.name,
    })
}

/// Documents of the `previous` manifests whose resource no longer appears in `current`
///
/// Each resource is listed once, from the first manifest naming it.
/// Returned as a manifest ready for [`ManifestApplier::delete_manifest`].
pub fn removed_resources<'a, I>(previous: I, current: &str) -> Result<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen: BTreeSet<ResourceKey> = split_documents(current)
        .into_iter()
        .map(document_key)
        .collect::<Result<_>>()?;

    let mut removed = Vec::new();
    for manifest in previous {
        for doc in split_documents(manifest) {
            if seen.insert(document_key(doc)?) {
                removed.push(format!("---\n{}\n", doc));
            }
        }
    }
    Ok(removed.concat())
}

/// Parsed resource ready for Kubernetes operations
#[derive(Debug, Clone)]
struct ParsedResource {
    obj: DynamicObject,
    gvk: GroupVersionKind,
    api_resource: ApiResource,
    capabilities: ApiCapabilities,
}

impl ParsedResource {
    fn display_name(&self) -> String {
        let name = self.obj.metadata.name.as_deref().unwrap_or("unnamed");
        match &self.obj.metadata.namespace {
            Some(ns) => format!("{}/{}/{}", ns, self.gvk.kind, name),
            None => format!("{}/{}", self.gvk.kind, name),
        }
    }

    fn has_keep_policy(&self) -> bool {
        self.obj
            .metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(RESOURCE_POLICY_ANNOTATION))
            .is_some_and(|policy| policy == RESOURCE_POLICY_KEEP)
    }

    fn category(&self) -> ResourceCategory {
        ResourceCategory::from_kind(&self.gvk.kind)
    }
}

/// Resource manager backed by a live cluster
pub struct ResourceManager {
    client: Client,
    /// Cached discovery information
    discovery: Arc<Discovery>,
}

impl ResourceManager {
    pub async fn new(client: Client) -> Result<Self> {
        let discovery = Discovery::new(client.clone()).run().await?;
        Ok(Self {
            client,
            discovery: Arc::new(discovery),
        })
    }

    /// Reuse an existing discovery cache
    pub fn with_discovery(client: Client, discovery: Arc<Discovery>) -> Self {
        Self { client, discovery }
    }

    fn parse_manifest(&self, manifest: &str, default_namespace: &str) -> Result<Vec<ParsedResource>> {
        split_documents(manifest)
            .into_iter()
            .enumerate()
            .map(|(index, doc)| {
                self.parse_single_document(doc, default_namespace)
                    .map_err(|e| {
                        KubeError::InvalidManifest(format!("document {}: {}", index, e))
                    })
            })
            .collect()
    }

    fn parse_single_document(&self, doc: &str, default_namespace: &str) -> Result<ParsedResource> {
        let mut obj: DynamicObject = serde_yaml::from_str(doc)?;

        let type_meta = obj.types.as_ref().ok_or_else(|| {
            KubeError::InvalidManifest("resource missing apiVersion or kind".to_string())
        })?;
        let gvk = gvk_from_type_meta(type_meta);

        let (api_resource, capabilities) = self.discovery.resolve_gvk(&gvk).ok_or_else(|| {
            KubeError::InvalidManifest(format!(
                "unknown resource type: {}/{}",
                type_meta.api_version, type_meta.kind
            ))
        })?;

        if capabilities.scope == Scope::Namespaced && obj.metadata.namespace.is_none() {
            obj.metadata.namespace = Some(default_namespace.to_string());
        }

        Ok(ParsedResource {
            obj,
            gvk,
            api_resource,
            capabilities,
        })
    }

    fn api_for_resource(&self, resource: &ParsedResource) -> Api<DynamicObject> {
        match (&resource.capabilities.scope, resource.obj.metadata.namespace.as_deref()) {
            (Scope::Namespaced, Some(ns)) => {
                Api::namespaced_with(self.client.clone(), ns, &resource.api_resource)
            }
            (Scope::Namespaced, None) => {
                Api::default_namespaced_with(self.client.clone(), &resource.api_resource)
            }
            (Scope::Cluster, _) => Api::all_with(self.client.clone(), &resource.api_resource),
        }
    }

    async fn apply_single_resource(&self, resource: &ParsedResource, dry_run: bool) -> Result<bool> {
        let name = resource.obj.metadata.name.as_deref().ok_or_else(|| {
            KubeError::InvalidManifest("resource missing metadata.name".to_string())
        })?;
        let api = self.api_for_resource(resource);

        let exists = api.get_opt(name).await?.is_some();

        let mut params = PatchParams::apply(FIELD_MANAGER).force();
        params.dry_run = dry_run;
        api.patch(name, &params, &Patch::Apply(&resource.obj)).await?;

        Ok(!exists)
    }

    async fn delete_single_resource(&self, resource: &ParsedResource, dry_run: bool) -> Result<bool> {
        let name = resource.obj.metadata.name.as_deref().ok_or_else(|| {
            KubeError::InvalidManifest("resource missing metadata.name".to_string())
        })?;
        let params = DeleteParams {
            propagation_policy: Some(kube::api::PropagationPolicy::Background),
            dry_run,
            ..Default::default()
        };

        match self.api_for_resource(resource).delete(name, &params).await {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(resp)) if resp.code == 404 => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ManifestApplier for ResourceManager {
    async fn apply_manifest(
        &self,
        namespace: &str,
        manifest: &str,
        dry_run: bool,
    ) -> Result<OperationSummary> {
        let mut resources = self.parse_manifest(manifest, namespace)?;
        resources.sort_by_key(ParsedResource::category);

        let mut summary = OperationSummary::default();
        for resource in &resources {
            let name = resource.display_name();
            match self.apply_single_resource(resource, dry_run).await {
                Ok(created) => {
                    let action = if created { "created" } else { "configured" };
                    debug!(resource = %name, action, "applied");
                    summary.succeeded.push(format!("{} ({})", name, action));
                }
                Err(e) => {
                    warn!(resource = %name, error = %e, "apply failed");
                    summary.failed.push((name, e.to_string()));
                }
            }
        }
        Ok(summary)
    }

    async fn delete_manifest(
        &self,
        namespace: &str,
        manifest: &str,
        dry_run: bool,
    ) -> Result<OperationSummary> {
        let mut resources = self.parse_manifest(manifest, namespace)?;
        resources.sort_by_key(|r| std::cmp::Reverse(r.category()));

        let mut summary = OperationSummary::default();
        for resource in &resources {
            let name = resource.display_name();
            if resource.has_keep_policy() {
                summary.skipped.push((name, "resource-policy: keep".to_string()));
                continue;
            }
            match self.delete_single_resource(resource, dry_run).await {
                Ok(true) => summary.succeeded.push(format!("{} (deleted)", name)),
                Ok(false) => summary.skipped.push((name, "not found".to_string())),
                Err(e) => summary.failed.push((name, e.to_string())),
            }
        }
        Ok(summary)
    }
}

/// Convert TypeMeta to GroupVersionKind
///
/// - "apps/v1" -> group="apps", version="v1"
/// - "v1" -> group="", version="v1" (core API)
fn gvk_from_type_meta(tm: &TypeMeta) -> GroupVersionKind {
    let (group, version) = match tm.api_version.rsplit_once('/') {
        Some((g, v)) => (g.to_string(), v.to_string()),
        None => (String::new(), tm.api_version.clone()),
    };

    GroupVersionKind {
        group,
        version,
        kind: tm.kind.clone(),
    }
}
