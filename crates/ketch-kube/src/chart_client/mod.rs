//! Chart client: install-or-upgrade and delete of application charts
//!
//! A [`ChartClient`] is bound to one namespace. Every revision it applies is
//! recorded through a [`StorageDriver`], which is how a later pass tells an
//! install from an upgrade.

mod mock;

pub use mock::{MockChartFactory, RecordedManifest, RecordingApplier};

use async_trait::async_trait;
use ketch_core::ChartConfig;
use ketch_engine::ApplicationChart;
use kube::Client;
use kube::discovery::Discovery;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{KubeError, Result};
use crate::release::StoredRelease;
use crate::resources::{ManifestApplier, ResourceManager, removed_resources};
use crate::storage::{SecretsDriver, StorageConfig, StorageDriver};

/// Options for [`ChartApplier::update_application_chart`]
#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    /// Build the release without touching storage or the cluster
    pub dry_run: bool,
}

impl ApplyOptions {
    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }
}

/// Chart-apply engine bound to a namespace
#[async_trait]
pub trait ChartApplier: Send + Sync {
    /// Install the chart, or upgrade it when a release already exists
    async fn update_application_chart(
        &self,
        chart: &ApplicationChart,
        config: &ChartConfig,
        options: &ApplyOptions,
    ) -> Result<StoredRelease>;

    /// Remove every resource any stored revision of the app created, then its history
    ///
    /// A missing release is not an error.
    async fn delete_chart(&self, app_name: &str) -> Result<()>;
}

/// Builds chart appliers for a target namespace
#[async_trait]
pub trait ChartClientFactory: Send + Sync {
    async fn for_namespace(&self, namespace: &str) -> Result<Arc<dyn ChartApplier>>;
}

/// Chart client over a storage driver and a manifest applier
pub struct ChartClient<S: StorageDriver, M: ManifestApplier> {
    namespace: String,
    storage: S,
    applier: M,
    /// Maximum number of revisions kept per release
    max_history: u32,
}

impl<S: StorageDriver, M: ManifestApplier> ChartClient<S, M> {
    pub fn new(namespace: impl Into<String>, storage: S, applier: M) -> Self {
        Self {
            namespace: namespace.into(),
            storage,
            applier,
            max_history: StorageConfig::default().max_history,
        }
    }

    pub fn with_max_history(mut self, max_history: u32) -> Self {
        self.max_history = max_history.max(1);
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Stored revisions of `name`, newest first, empty when never installed
    async fn release_history(&self, name: &str) -> Result<Vec<StoredRelease>> {
        match self.storage.history(&self.namespace, name).await {
            Ok(history) => Ok(history),
            Err(KubeError::ReleaseNotFound { .. }) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    async fn apply(&self, manifest: &str) -> Result<()> {
        let summary = self
            .applier
            .apply_manifest(&self.namespace, manifest, false)
            .await?
            .into_result()?;
        debug!(namespace = %self.namespace, summary = %summary.summary(), "manifest applied");
        Ok(())
    }

    /// Record a failed apply and hand the error back
    async fn fail(&self, mut release: StoredRelease, error: KubeError) -> Result<StoredRelease> {
        warn!(
            app = %release.name,
            namespace = %self.namespace,
            revision = release.version,
            error = %error,
            "chart apply failed"
        );
        release.mark_failed(error.to_string());
        self.storage.update(&release).await?;
        Err(error)
    }

    async fn install(
        &self,
        config: &ChartConfig,
        manifest: String,
        options: &ApplyOptions,
    ) -> Result<StoredRelease> {
        let mut release = StoredRelease::for_install(&self.namespace, config.clone(), manifest);
        if options.dry_run {
            return Ok(release);
        }

        self.storage.create(&release).await?;
        if let Err(e) = self.apply(&release.manifest).await {
            return self.fail(release, e).await;
        }

        release.mark_deployed();
        self.storage.update(&release).await?;
        info!(app = %release.name, namespace = %self.namespace, "chart installed");
        Ok(release)
    }

    async fn upgrade(
        &self,
        history: Vec<StoredRelease>,
        config: &ChartConfig,
        manifest: String,
        options: &ApplyOptions,
    ) -> Result<StoredRelease> {
        let Some(latest) = history.first() else {
            return self.install(config, manifest, options).await;
        };
        let mut release = StoredRelease::for_upgrade(latest, config.clone(), manifest);
        if options.dry_run {
            return Ok(release);
        }

        self.storage.create(&release).await?;
        if let Err(e) = self.apply(&release.manifest).await {
            return self.fail(release, e).await;
        }

        let live = live_revisions(&history);
        let removed = removed_resources(live.iter().map(|r| r.manifest.as_str()), &release.manifest)?;
        if !removed.is_empty() {
            let summary = self
                .applier
                .delete_manifest(&self.namespace, &removed, false)
                .await?;
            if !summary.is_success() {
                warn!(
                    app = %release.name,
                    summary = %summary.summary(),
                    "could not delete resources dropped from the chart"
                );
            }
        }

        if let Some(deployed) = live.iter().find(|r| r.is_deployed()) {
            let mut deployed = deployed.clone();
            deployed.mark_superseded();
            self.storage.update(&deployed).await?;
        }

        release.mark_deployed();
        self.storage.update(&release).await?;
        info!(
            app = %release.name,
            namespace = %self.namespace,
            revision = release.version,
            "chart upgraded"
        );

        self.cleanup_history(&release.name).await?;
        Ok(release)
    }

    async fn cleanup_history(&self, name: &str) -> Result<()> {
        let history = self.storage.history(&self.namespace, name).await?;
        if history.len() as u32 <= self.max_history {
            return Ok(());
        }

        // History is newest first
        for release in history.iter().skip(self.max_history as usize) {
            self.storage
                .delete(&self.namespace, name, release.version)
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<S, M> ChartApplier for ChartClient<S, M>
where
    S: StorageDriver,
    M: ManifestApplier,
{
    async fn update_application_chart(
        &self,
        chart: &ApplicationChart,
        config: &ChartConfig,
        options: &ApplyOptions,
    ) -> Result<StoredRelease> {
        let manifest = chart.manifest();
        let history = self.release_history(chart.name()).await?;
        let Some(revision) = history.first().map(|r| r.version) else {
            debug!(app = %chart.name(), namespace = %self.namespace, "no release found, installing");
            return self.install(config, manifest, options).await;
        };
        debug!(
            app = %chart.name(),
            namespace = %self.namespace,
            revision,
            "release found, upgrading"
        );
        self.upgrade(history, config, manifest, options).await
    }

    async fn delete_chart(&self, app_name: &str) -> Result<()> {
        let history = self.release_history(app_name).await?;
        let Some(latest) = history.first() else {
            debug!(app = %app_name, namespace = %self.namespace, "no release to delete");
            return Ok(());
        };
        let revision = latest.version;

        let resources = removed_resources(history.iter().map(|r| r.manifest.as_str()), "")?;
        self.applier
            .delete_manifest(&self.namespace, &resources, false)
            .await?
            .into_result()?;

        match self.storage.delete_all(&self.namespace, app_name).await {
            Ok(_) | Err(KubeError::ReleaseNotFound { .. }) => {}
            Err(e) => return Err(e),
        }
        info!(app = %app_name, namespace = %self.namespace, revision, "chart deleted");
        Ok(())
    }
}

/// Revisions whose resources may still exist: back to the last deployed one
///
/// Failed revisions newer than it may have been partially applied.
fn live_revisions(history: &[StoredRelease]) -> &[StoredRelease] {
    match history.iter().position(StoredRelease::is_deployed) {
        Some(last_deployed) => &history[..=last_deployed],
        None => history,
    }
}

/// Chart clients against the live cluster, storing releases in Secrets
pub struct KubeChartClientFactory {
    client: Client,
    discovery: Arc<Discovery>,
    config: StorageConfig,
}

impl KubeChartClientFactory {
    /// Run API discovery once and share it between chart clients
    pub async fn new(client: Client, config: StorageConfig) -> Result<Self> {
        let discovery = Discovery::new(client.clone()).run().await?;
        Ok(Self {
            client,
            discovery: Arc::new(discovery),
            config,
        })
    }
}

#[async_trait]
impl ChartClientFactory for KubeChartClientFactory {
    async fn for_namespace(&self, namespace: &str) -> Result<Arc<dyn ChartApplier>> {
        if namespace.is_empty() {
            return Err(KubeError::InvalidConfig(
                "chart client needs a target namespace".to_string(),
            ));
        }
        let storage = SecretsDriver::new(self.client.clone(), self.config.clone());
        let applier = ResourceManager::with_discovery(self.client.clone(), self.discovery.clone());
        let client = ChartClient::new(namespace, storage, applier)
            .with_max_history(self.config.max_history);
        Ok(Arc::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::ReleaseState;
    use crate::storage::MockStorageDriver;
    use ketch_core::api::{ApplicationSpec, ComponentLink, KubeTemplate, Parameter};
    use ketch_core::{Application, ComponentSpec, ParameterType};
    use ketch_engine::ComponentRegistry;

    const NAMESPACE: &str = "ketch-pool";

    fn registry() -> ComponentRegistry {
        let template = KubeTemplate {
            template: serde_json::json!({
                "apiVersion": "v1",
                "kind": "ConfigMap",
                "metadata": {"name": "placeholder"},
            }),
            parameters: vec![Parameter {
                name: "name".to_string(),
                parameter_type: ParameterType::String,
                required: true,
                field_paths: vec!["metadata.name".to_string()],
            }],
        };
        let mut registry = ComponentRegistry::new();
        registry.insert("config".to_string(), ComponentSpec::from_templates(vec![template]));
        registry
    }

    fn application(configs: &[&str]) -> Application {
        let mut app = Application::new(
            "dashboard",
            ApplicationSpec {
                framework: "pool".to_string(),
                version: None,
                description: None,
                components: configs
                    .iter()
                    .map(|c| ComponentLink::new(*c, "config").with_property("name", *c))
                    .collect(),
            },
        );
        app.metadata.generation = Some(1);
        app
    }

    async fn apply(
        client: &ChartClient<MockStorageDriver, RecordingApplier>,
        configs: &[&str],
    ) -> Result<StoredRelease> {
        let app = application(configs);
        let chart = ApplicationChart::new(&app, &registry()).unwrap();
        let config = ChartConfig::for_application(&app);
        client
            .update_application_chart(&chart, &config, &ApplyOptions::default())
            .await
    }

    fn client() -> ChartClient<MockStorageDriver, RecordingApplier> {
        ChartClient::new(NAMESPACE, MockStorageDriver::new(), RecordingApplier::new())
    }

    #[tokio::test]
    async fn test_first_apply_installs() {
        let client = client();
        let release = apply(&client, &["settings"]).await.unwrap();

        assert_eq!(release.version, 1);
        assert!(release.is_deployed());
        assert_eq!(client.applier.applied().len(), 1);
        assert_eq!(client.applier.applied()[0].namespace, NAMESPACE);
        assert!(client.applier.applied()[0].manifest.contains("name: settings"));
    }

    #[tokio::test]
    async fn test_second_apply_upgrades_and_prunes() {
        let client = client();
        apply(&client, &["settings", "flags"]).await.unwrap();
        let release = apply(&client, &["settings"]).await.unwrap();

        assert_eq!(release.version, 2);
        let previous = client.storage.get(NAMESPACE, "dashboard", 1).await.unwrap();
        assert_eq!(previous.state, ReleaseState::Superseded);

        let deleted = client.applier.deleted();
        assert_eq!(deleted.len(), 1);
        assert!(deleted[0].manifest.contains("name: flags"));
        assert!(!deleted[0].manifest.contains("name: settings"));
    }

    #[tokio::test]
    async fn test_failed_apply_records_failed_release() {
        let client = client();
        client.applier.fail_with("admission webhook denied the request");

        let err = apply(&client, &["settings"]).await.unwrap_err();
        assert!(err.to_string().contains("admission webhook denied the request"));

        let stored = client.storage.get_latest(NAMESPACE, "dashboard").await.unwrap();
        assert!(matches!(stored.state, ReleaseState::Failed { .. }));
    }

    #[tokio::test]
    async fn test_recovered_upgrade_prunes_against_last_deployed() {
        let client = client();
        apply(&client, &["settings", "flags"]).await.unwrap();

        client.applier.fail_with("quota exceeded");
        apply(&client, &["settings"]).await.unwrap_err();
        let deployed = client.storage.get(NAMESPACE, "dashboard", 1).await.unwrap();
        assert!(deployed.is_deployed());

        client.applier.succeed();
        let release = apply(&client, &["settings"]).await.unwrap();
        assert_eq!(release.version, 3);

        let deleted = client.applier.deleted();
        assert_eq!(deleted.len(), 1);
        assert!(deleted[0].manifest.contains("name: flags"));
        assert!(!deleted[0].manifest.contains("name: settings"));

        let superseded = client.storage.get(NAMESPACE, "dashboard", 1).await.unwrap();
        assert_eq!(superseded.state, ReleaseState::Superseded);
        let failed = client.storage.get(NAMESPACE, "dashboard", 2).await.unwrap();
        assert!(matches!(failed.state, ReleaseState::Failed { .. }));
    }

    #[tokio::test]
    async fn test_dry_run_touches_nothing() {
        let client = client();
        let app = application(&["settings"]);
        let chart = ApplicationChart::new(&app, &registry()).unwrap();
        let release = client
            .update_application_chart(
                &chart,
                &ChartConfig::for_application(&app),
                &ApplyOptions::default().dry_run(),
            )
            .await
            .unwrap();

        assert_eq!(release.version, 1);
        assert_eq!(client.storage.release_count(), 0);
        assert!(client.applier.applied().is_empty());
    }

    #[tokio::test]
    async fn test_history_is_pruned() {
        let client = client().with_max_history(2);
        for _ in 0..4 {
            apply(&client, &["settings"]).await.unwrap();
        }
        let versions: Vec<u32> = client
            .storage
            .history(NAMESPACE, "dashboard")
            .await
            .unwrap()
            .iter()
            .map(|r| r.version)
            .collect();
        assert_eq!(versions, vec![4, 3]);
    }

    #[tokio::test]
    async fn test_delete_chart() {
        let client = client();
        apply(&client, &["settings"]).await.unwrap();

        client.delete_chart("dashboard").await.unwrap();
        assert_eq!(client.storage.release_count(), 0);
        assert_eq!(client.applier.deleted().len(), 1);

        // Nothing left to delete
        client.delete_chart("dashboard").await.unwrap();
        assert_eq!(client.applier.deleted().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_chart_covers_failed_revisions() {
        let client = client();
        apply(&client, &["settings"]).await.unwrap();
        client.applier.fail_with("timeout");
        apply(&client, &["settings", "flags"]).await.unwrap_err();

        client.delete_chart("dashboard").await.unwrap();

        let deleted = client.applier.deleted();
        assert_eq!(deleted.len(), 1);
        assert!(deleted[0].manifest.contains("name: settings"));
        assert!(deleted[0].manifest.contains("name: flags"));
        assert_eq!(client.storage.release_count(), 0);
    }
}
