//! Object store backed by the Kubernetes API

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use ketch_core::api::FIELD_MANAGER;
use ketch_core::{Application, ApplicationStatus, Component, Framework};
use kube::api::{Api, ListParams, Patch, PatchParams, PostParams};
use kube::{Client, ResourceExt};
use std::collections::BTreeMap;

use super::{APPLICATION_FINALIZER, ObjectStore};
use crate::error::{KubeError, Result};
use crate::storage::MANAGED_BY_LABEL;

/// Object store talking to the API server
#[derive(Clone)]
pub struct KubeObjectStore {
    client: Client,
}

impl KubeObjectStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn frameworks(&self) -> Api<Framework> {
        Api::all(self.client.clone())
    }

    fn applications(&self) -> Api<Application> {
        Api::all(self.client.clone())
    }

    async fn patch_application_finalizers(&self, name: &str, finalizers: Vec<String>) -> Result<()> {
        let patch = serde_json::json!({
            "metadata": {
                "finalizers": finalizers
            }
        });
        self.applications()
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for KubeObjectStore {
    async fn list_components(&self) -> Result<Vec<Component>> {
        let api: Api<Component> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn get_framework(&self, name: &str) -> Result<Option<Framework>> {
        Ok(self.frameworks().get_opt(name).await?)
    }

    async fn list_frameworks(&self) -> Result<Vec<Framework>> {
        Ok(self.frameworks().list(&ListParams::default()).await?.items)
    }

    async fn replace_framework_status(&self, framework: &Framework) -> Result<Framework> {
        let name = framework.metadata.name.as_deref().ok_or_else(|| {
            KubeError::InvalidConfig("framework has no metadata.name".to_string())
        })?;
        let data = serde_json::to_vec(framework)?;
        Ok(self
            .frameworks()
            .replace_status(name, &PostParams::default(), data)
            .await?)
    }

    async fn patch_framework_namespace(&self, framework: &str, namespace: &str) -> Result<()> {
        let patch = serde_json::json!({
            "status": {
                "namespace": { "name": namespace }
            }
        });
        self.frameworks()
            .patch_status(framework, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn patch_application_status(&self, name: &str, status: &ApplicationStatus) -> Result<()> {
        let patch = serde_json::json!({ "status": status });
        self.applications()
            .patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn add_application_finalizer(&self, name: &str) -> Result<()> {
        let application = self.applications().get(name).await?;
        let mut finalizers = application.finalizers().to_vec();
        if finalizers.iter().any(|f| f == APPLICATION_FINALIZER) {
            return Ok(());
        }
        finalizers.push(APPLICATION_FINALIZER.to_string());
        self.patch_application_finalizers(name, finalizers).await
    }

    async fn remove_application_finalizer(&self, name: &str) -> Result<()> {
        let application = match self.applications().get_opt(name).await? {
            Some(application) => application,
            None => return Ok(()),
        };
        let finalizers: Vec<String> = application
            .finalizers()
            .iter()
            .filter(|f| *f != APPLICATION_FINALIZER)
            .cloned()
            .collect();
        self.patch_application_finalizers(name, finalizers).await
    }

    async fn apply_namespace(&self, name: &str) -> Result<()> {
        let namespace = Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                labels: Some(BTreeMap::from([(
                    MANAGED_BY_LABEL.to_string(),
                    "ketch".to_string(),
                )])),
                ..Default::default()
            },
            ..Default::default()
        };
        let api: Api<Namespace> = Api::all(self.client.clone());
        api.patch(
            name,
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(&namespace),
        )
        .await?;
        Ok(())
    }
}
