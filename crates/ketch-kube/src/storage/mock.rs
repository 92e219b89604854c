//! Mock storage driver for testing
//!
//! This driver stores releases in memory, useful for unit tests
//! without requiring a Kubernetes cluster.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::StorageDriver;
use crate::error::{KubeError, Result};
use crate::release::StoredRelease;

/// namespace -> name -> version -> release
type Store = HashMap<String, HashMap<String, HashMap<u32, StoredRelease>>>;

/// In-memory storage driver for testing
#[derive(Clone, Default)]
pub struct MockStorageDriver {
    store: Arc<RwLock<Store>>,
    operations: Arc<RwLock<OperationCounts>>,
}

/// Counts of operations performed for testing assertions
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OperationCounts {
    pub gets: usize,
    pub lists: usize,
    pub creates: usize,
    pub updates: usize,
    pub deletes: usize,
}

fn not_found(namespace: &str, name: &str) -> KubeError {
    KubeError::ReleaseNotFound {
        name: name.to_string(),
        namespace: namespace.to_string(),
    }
}

impl MockStorageDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with pre-populated releases
    pub fn with_releases(releases: Vec<StoredRelease>) -> Self {
        let driver = Self::new();
        {
            let mut store = driver.write_store();
            for release in releases {
                store
                    .entry(release.namespace.clone())
                    .or_default()
                    .entry(release.name.clone())
                    .or_default()
                    .insert(release.version, release);
            }
        }
        driver
    }

    pub fn operation_counts(&self) -> OperationCounts {
        self.operations
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn reset_counts(&self) {
        *self.operations.write().unwrap_or_else(|e| e.into_inner()) = OperationCounts::default();
    }

    /// Every stored revision, in no particular order
    pub fn all_releases(&self) -> Vec<StoredRelease> {
        self.read_store()
            .values()
            .flat_map(|ns| ns.values())
            .flat_map(|name| name.values())
            .cloned()
            .collect()
    }

    pub fn release_count(&self) -> usize {
        self.read_store()
            .values()
            .flat_map(|ns| ns.values())
            .map(|name| name.len())
            .sum()
    }

    fn read_store(&self) -> RwLockReadGuard<'_, Store> {
        self.store.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_store(&self) -> RwLockWriteGuard<'_, Store> {
        self.store.write().unwrap_or_else(|e| e.into_inner())
    }

    fn count(&self, f: impl FnOnce(&mut OperationCounts)) {
        let mut ops = self.operations.write().unwrap_or_else(|e| e.into_inner());
        f(&mut *ops);
    }

    fn sorted_history(&self, namespace: &str, name: &str) -> Vec<StoredRelease> {
        let mut releases: Vec<StoredRelease> = self
            .read_store()
            .get(namespace)
            .and_then(|ns| ns.get(name))
            .map(|versions| versions.values().cloned().collect())
            .unwrap_or_default();
        releases.sort_by(|a, b| b.version.cmp(&a.version));
        releases
    }
}

#[async_trait]
impl StorageDriver for MockStorageDriver {
    async fn get(&self, namespace: &str, name: &str, version: u32) -> Result<StoredRelease> {
        self.count(|ops| ops.gets += 1);
        self.read_store()
            .get(namespace)
            .and_then(|ns| ns.get(name))
            .and_then(|versions| versions.get(&version))
            .cloned()
            .ok_or_else(|| not_found(namespace, name))
    }

    async fn get_latest(&self, namespace: &str, name: &str) -> Result<StoredRelease> {
        self.count(|ops| ops.gets += 1);
        self.sorted_history(namespace, name)
            .into_iter()
            .next()
            .ok_or_else(|| not_found(namespace, name))
    }

    async fn list(&self, namespace: &str, name: Option<&str>) -> Result<Vec<StoredRelease>> {
        self.count(|ops| ops.lists += 1);
        let mut releases: Vec<StoredRelease> = self
            .read_store()
            .get(namespace)
            .into_iter()
            .flat_map(|names| names.iter())
            .filter(|(n, _)| name.is_none_or(|filter| filter == n.as_str()))
            .flat_map(|(_, versions)| versions.values())
            .cloned()
            .collect();
        releases.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(releases)
    }

    async fn history(&self, namespace: &str, name: &str) -> Result<Vec<StoredRelease>> {
        self.count(|ops| ops.lists += 1);
        let releases = self.sorted_history(namespace, name);
        if releases.is_empty() {
            return Err(not_found(namespace, name));
        }
        Ok(releases)
    }

    async fn create(&self, release: &StoredRelease) -> Result<()> {
        self.count(|ops| ops.creates += 1);
        let mut store = self.write_store();
        let versions = store
            .entry(release.namespace.clone())
            .or_default()
            .entry(release.name.clone())
            .or_default();

        if versions.contains_key(&release.version) {
            return Err(KubeError::ReleaseAlreadyExists {
                name: release.name.clone(),
                namespace: release.namespace.clone(),
            });
        }
        versions.insert(release.version, release.clone());
        Ok(())
    }

    async fn update(&self, release: &StoredRelease) -> Result<()> {
        self.count(|ops| ops.updates += 1);
        self.write_store()
            .entry(release.namespace.clone())
            .or_default()
            .entry(release.name.clone())
            .or_default()
            .insert(release.version, release.clone());
        Ok(())
    }

    async fn delete(&self, namespace: &str, name: &str, version: u32) -> Result<StoredRelease> {
        self.count(|ops| ops.deletes += 1);
        self.write_store()
            .get_mut(namespace)
            .and_then(|ns| ns.get_mut(name))
            .and_then(|versions| versions.remove(&version))
            .ok_or_else(|| not_found(namespace, name))
    }

    async fn delete_all(&self, namespace: &str, name: &str) -> Result<Vec<StoredRelease>> {
        self.count(|ops| ops.deletes += 1);
        let releases: Vec<StoredRelease> = self
            .write_store()
            .get_mut(namespace)
            .and_then(|ns| ns.remove(name))
            .map(|versions| versions.into_values().collect())
            .unwrap_or_default();

        if releases.is_empty() {
            return Err(not_found(namespace, name));
        }
        Ok(releases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::ReleaseState;
    use ketch_core::ChartConfig;

    fn release(name: &str, namespace: &str, version: u32) -> StoredRelease {
        let mut release = StoredRelease::for_install(
            namespace,
            ChartConfig {
                version: semver::Version::new(0, 0, version as u64),
                app_name: name.to_string(),
                description: None,
                app_version: format!("v{}", version),
            },
            "apiVersion: v1\nkind: ConfigMap".to_string(),
        );
        release.version = version;
        release.state = ReleaseState::Deployed;
        release
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let driver = MockStorageDriver::new();
        driver.create(&release("myapp", "ketch-pool", 1)).await.unwrap();

        let retrieved = driver.get("ketch-pool", "myapp", 1).await.unwrap();
        assert_eq!(retrieved.name, "myapp");

        let counts = driver.operation_counts();
        assert_eq!(counts.creates, 1);
        assert_eq!(counts.gets, 1);
    }

    #[tokio::test]
    async fn test_create_duplicate_fails() {
        let driver = MockStorageDriver::new();
        driver.create(&release("myapp", "ketch-pool", 1)).await.unwrap();

        let result = driver.create(&release("myapp", "ketch-pool", 1)).await;
        assert!(matches!(result, Err(KubeError::ReleaseAlreadyExists { .. })));
    }

    #[tokio::test]
    async fn test_latest_and_history() {
        let driver = MockStorageDriver::new();
        for version in 1..=3 {
            driver.create(&release("myapp", "ketch-pool", version)).await.unwrap();
        }

        assert_eq!(driver.get_latest("ketch-pool", "myapp").await.unwrap().version, 3);
        let versions: Vec<u32> = driver
            .history("ketch-pool", "myapp")
            .await
            .unwrap()
            .iter()
            .map(|r| r.version)
            .collect();
        assert_eq!(versions, vec![3, 2, 1]);
        assert!(!driver.exists("other", "myapp").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_is_scoped_to_namespace() {
        let driver = MockStorageDriver::with_releases(vec![
            release("app1", "ketch-a", 1),
            release("app2", "ketch-a", 1),
            release("app1", "ketch-b", 1),
        ]);

        assert_eq!(driver.list("ketch-a", None).await.unwrap().len(), 2);
        assert_eq!(driver.list("ketch-a", Some("app2")).await.unwrap().len(), 1);
        assert_eq!(driver.release_count(), 3);
    }

    #[tokio::test]
    async fn test_delete_all() {
        let driver = MockStorageDriver::new();
        driver.create(&release("myapp", "ketch-pool", 1)).await.unwrap();
        driver.create(&release("myapp", "ketch-pool", 2)).await.unwrap();

        assert_eq!(driver.delete("ketch-pool", "myapp", 1).await.unwrap().version, 1);
        assert_eq!(driver.delete_all("ketch-pool", "myapp").await.unwrap().len(), 1);
        assert!(matches!(
            driver.history("ketch-pool", "myapp").await,
            Err(KubeError::ReleaseNotFound { .. })
        ));

        driver.reset_counts();
        assert_eq!(driver.operation_counts(), OperationCounts::default());
    }
}
