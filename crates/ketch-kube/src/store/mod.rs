//! Access to Ketch custom resources
//!
//! The reconcilers only see the [`ObjectStore`] trait. [`KubeObjectStore`]
//! talks to the API server; [`MockObjectStore`] keeps everything in memory.

mod kube_store;
mod mock;

pub use kube_store::KubeObjectStore;
pub use mock::{MockObjectStore, StoreCall};

use async_trait::async_trait;
use ketch_core::{ApplicationStatus, Component, Framework};

use crate::error::Result;

/// Finalizer holding an Application until its chart is removed
pub const APPLICATION_FINALIZER: &str = "theketch.io/application-cleanup";

/// Cluster-scoped resources read and written by the reconcilers
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Every registered Component
    async fn list_components(&self) -> Result<Vec<Component>>;

    /// Framework by name, `None` when it does not exist
    async fn get_framework(&self, name: &str) -> Result<Option<Framework>>;

    async fn list_frameworks(&self) -> Result<Vec<Framework>>;

    /// Replace the framework status
    ///
    /// Guarded by `metadata.resourceVersion`: a stale copy fails with a
    /// conflict (see [`crate::KubeError::is_conflict`]).
    async fn replace_framework_status(&self, framework: &Framework) -> Result<Framework>;

    /// Record the framework's bound namespace
    async fn patch_framework_namespace(&self, framework: &str, namespace: &str) -> Result<()>;

    async fn patch_application_status(&self, name: &str, status: &ApplicationStatus) -> Result<()>;

    async fn add_application_finalizer(&self, name: &str) -> Result<()>;

    async fn remove_application_finalizer(&self, name: &str) -> Result<()>;

    /// Create or update a namespace owned by Ketch
    async fn apply_namespace(&self, name: &str) -> Result<()>;
}
