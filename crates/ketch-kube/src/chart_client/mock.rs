//! In-memory chart plumbing for tests
//!
//! [`RecordingApplier`] stands in for the cluster and remembers every
//! manifest it was handed. [`MockChartFactory`] builds real
//! [`ChartClient`]s over a shared [`MockStorageDriver`] and applier.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{ChartApplier, ChartClient, ChartClientFactory};
use crate::error::{KubeError, Result};
use crate::resources::{ManifestApplier, OperationSummary, split_documents};
use crate::storage::MockStorageDriver;

/// Manifest handed to the applier
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedManifest {
    pub namespace: String,
    pub manifest: String,
    pub dry_run: bool,
}

#[derive(Default)]
struct Recording {
    applied: Vec<RecordedManifest>,
    deleted: Vec<RecordedManifest>,
    failure: Option<String>,
}

/// Manifest applier that records calls instead of talking to a cluster
#[derive(Clone, Default)]
pub struct RecordingApplier {
    inner: Arc<Mutex<Recording>>,
}

impl RecordingApplier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every resource of later applies with `message`
    pub fn fail_with(&self, message: &str) {
        self.lock().failure = Some(message.to_string());
    }

    pub fn succeed(&self) {
        self.lock().failure = None;
    }

    pub fn applied(&self) -> Vec<RecordedManifest> {
        self.lock().applied.clone()
    }

    pub fn deleted(&self) -> Vec<RecordedManifest> {
        self.lock().deleted.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Recording> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn record(namespace: &str, manifest: &str, dry_run: bool) -> RecordedManifest {
    RecordedManifest {
        namespace: namespace.to_string(),
        manifest: manifest.to_string(),
        dry_run,
    }
}

#[async_trait]
impl ManifestApplier for RecordingApplier {
    async fn apply_manifest(
        &self,
        namespace: &str,
        manifest: &str,
        dry_run: bool,
    ) -> Result<OperationSummary> {
        let mut recording = self.lock();
        recording.applied.push(record(namespace, manifest, dry_run));

        let mut summary = OperationSummary::default();
        for (index, _) in split_documents(manifest).iter().enumerate() {
            let name = format!("document/{}", index);
            match &recording.failure {
                Some(message) => summary.failed.push((name, message.clone())),
                None => summary.succeeded.push(name),
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
        let mut recording = self.lock();
        recording.deleted.push(record(namespace, manifest, dry_run));
        Ok(OperationSummary {
            succeeded: (0..split_documents(manifest).len())
                .map(|i| format!("document/{}", i))
                .collect(),
            ..Default::default()
        })
    }
}

/// Chart client factory over shared in-memory collaborators
#[derive(Clone, Default)]
pub struct MockChartFactory {
    storage: MockStorageDriver,
    applier: RecordingApplier,
    failure: Arc<Mutex<Option<String>>>,
    namespaces: Arc<Mutex<Vec<String>>>,
}

impl MockChartFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn storage(&self) -> &MockStorageDriver {
        &self.storage
    }

    pub fn applier(&self) -> &RecordingApplier {
        &self.applier
    }

    /// Make [`ChartClientFactory::for_namespace`] fail with `message`
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = Some(message.to_string());
    }

    /// Namespaces chart clients were requested for, in order
    pub fn namespaces(&self) -> Vec<String> {
        self.namespaces
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl ChartClientFactory for MockChartFactory {
    async fn for_namespace(&self, namespace: &str) -> Result<Arc<dyn ChartApplier>> {
        self.namespaces
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(namespace.to_string());

        if let Some(message) = self.failure.lock().unwrap_or_else(|e| e.into_inner()).clone() {
            return Err(KubeError::InvalidConfig(message));
        }
        Ok(Arc::new(ChartClient::new(
            namespace,
            self.storage.clone(),
            self.applier.clone(),
        )))
    }
}
