//! Kubernetes Secrets storage driver
//!
//! Each revision is one Secret named after [`StoredRelease::storage_key`] in
//! the release namespace. The payload lives under the `release` data key.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Client;
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use std::collections::BTreeMap;
use tracing::warn;

use super::{
    CompressionMethod, MANAGED_BY_LABEL, StorageConfig, StorageDriver, decode_from_storage,
    encode_for_storage, storage_labels,
};
use crate::error::{KubeError, Result};
use crate::release::StoredRelease;

const COMPRESSION_LABEL: &str = "theketch.io/compression";
const RELEASE_NAME_LABEL: &str = "theketch.io/release-name";
const SECRET_TYPE: &str = "theketch.io/release.v1";

fn secret_name(name: &str, version: u32) -> String {
    format!("sh.ketch.release.v1.{}.v{}", name, version)
}

/// Kubernetes Secrets storage driver
pub struct SecretsDriver {
    client: Client,
    config: StorageConfig,
}

impl SecretsDriver {
    pub fn new(client: Client, config: StorageConfig) -> Self {
        Self { client, config }
    }

    fn secrets_api(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn build_secret(&self, release: &StoredRelease, encoded: &str) -> Secret {
        let mut labels = storage_labels(release);
        labels.insert(
            COMPRESSION_LABEL.to_string(),
            self.config.compression.label().to_string(),
        );

        let mut data = BTreeMap::new();
        data.insert(
            "release".to_string(),
            k8s_openapi::ByteString(encoded.as_bytes().to_vec()),
        );

        Secret {
            metadata: ObjectMeta {
                name: Some(release.storage_key()),
                namespace: Some(release.namespace.clone()),
                labels: Some(labels),
                ..Default::default()
            },
            type_: Some(SECRET_TYPE.to_string()),
            data: Some(data),
            ..Default::default()
        }
    }

    fn parse_secret(&self, secret: &Secret) -> Result<StoredRelease> {
        let data = secret
            .data
            .as_ref()
            .and_then(|d| d.get("release"))
            .ok_or_else(|| KubeError::Storage("Secret missing 'release' data".to_string()))?;

        let encoded = String::from_utf8(data.0.clone())
            .map_err(|e| KubeError::Storage(format!("Invalid UTF-8 in secret: {}", e)))?;

        let compression = secret
            .metadata
            .labels
            .as_ref()
            .and_then(|l| l.get(COMPRESSION_LABEL))
            .map(|c| CompressionMethod::from_label(c))
            .unwrap_or(self.config.compression);

        decode_from_storage(&encoded, compression)
    }

    async fn list_secrets(&self, namespace: &str, name: Option<&str>) -> Result<Vec<StoredRelease>> {
        let mut selector = format!("{}=ketch", MANAGED_BY_LABEL);
        if let Some(name) = name {
            selector.push_str(&format!(",{}={}", RELEASE_NAME_LABEL, name));
        }
        let lp = ListParams::default().labels(&selector);
        let secrets = self.secrets_api(namespace).list(&lp).await?;

        let mut releases = Vec::with_capacity(secrets.items.len());
        for secret in &secrets.items {
            match self.parse_secret(secret) {
                Ok(release) => releases.push(release),
                Err(e) => warn!(
                    secret = secret.metadata.name.as_deref().unwrap_or_default(),
                    error = %e,
                    "skipping unreadable release secret"
                ),
            }
        }

        // Newest first
        releases.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(releases)
    }
}

#[async_trait]
impl StorageDriver for SecretsDriver {
    async fn get(&self, namespace: &str, name: &str, version: u32) -> Result<StoredRelease> {
        match self.secrets_api(namespace).get(&secret_name(name, version)).await {
            Ok(secret) => self.parse_secret(&secret),
            Err(kube::Error::Api(e)) if e.code == 404 => Err(KubeError::ReleaseNotFound {
                name: name.to_string(),
                namespace: namespace.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_latest(&self, namespace: &str, name: &str) -> Result<StoredRelease> {
        let history = self.history(namespace, name).await?;
        history
            .into_iter()
            .next()
            .ok_or_else(|| KubeError::ReleaseNotFound {
                name: name.to_string(),
                namespace: namespace.to_string(),
            })
    }

    async fn list(&self, namespace: &str, name: Option<&str>) -> Result<Vec<StoredRelease>> {
        self.list_secrets(namespace, name).await
    }

    async fn history(&self, namespace: &str, name: &str) -> Result<Vec<StoredRelease>> {
        let releases = self.list_secrets(namespace, Some(name)).await?;
        if releases.is_empty() {
            return Err(KubeError::ReleaseNotFound {
                name: name.to_string(),
                namespace: namespace.to_string(),
            });
        }
        Ok(releases)
    }

    async fn create(&self, release: &StoredRelease) -> Result<()> {
        let encoded = encode_for_storage(release, &self.config)?;
        let secret = self.build_secret(release, &encoded);
        match self
            .secrets_api(&release.namespace)
            .create(&PostParams::default(), &secret)
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(e)) if e.code == 409 => Err(KubeError::ReleaseAlreadyExists {
                name: release.name.clone(),
                namespace: release.namespace.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn update(&self, release: &StoredRelease) -> Result<()> {
        let encoded = encode_for_storage(release, &self.config)?;
        let secret = self.build_secret(release, &encoded);
        self.secrets_api(&release.namespace)
            .replace(&release.storage_key(), &PostParams::default(), &secret)
            .await?;
        Ok(())
    }

    async fn delete(&self, namespace: &str, name: &str, version: u32) -> Result<StoredRelease> {
        let release = self.get(namespace, name, version).await?;
        match self
            .secrets_api(namespace)
            .delete(&secret_name(name, version), &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(release),
            // Already deleted
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(release),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_all(&self, namespace: &str, name: &str) -> Result<Vec<StoredRelease>> {
        let releases = self.history(namespace, name).await?;
        let api = self.secrets_api(namespace);
        for release in &releases {
            match api
                .delete(&release.storage_key(), &DeleteParams::default())
                .await
            {
                Ok(_) => {}
                Err(kube::Error::Api(e)) if e.code == 404 => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(releases)
    }
}
