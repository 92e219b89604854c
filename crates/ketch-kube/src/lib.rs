//! Ketch Kube - Kubernetes integration for Ketch
//!
//! This crate provides:
//! - **Reconciler**: the Application state machine with namespace and quota gates
//! - **Controllers**: kube-runtime loops for Applications and Frameworks
//! - **Chart Client**: install-or-upgrade and delete of application charts
//! - **Storage Drivers**: release history kept in Secrets, or in memory for tests
//! - **Resources**: server-side apply of multi-document manifests
//! - **Object Store**: typed access to Ketch custom resources

pub mod chart_client;
pub mod controller;
pub mod error;
pub mod reconciler;
pub mod release;
pub mod resources;
pub mod storage;
pub mod store;

pub use chart_client::{
    ApplyOptions, ChartApplier, ChartClient, ChartClientFactory, KubeChartClientFactory,
    MockChartFactory, RecordedManifest, RecordingApplier,
};
pub use controller::{crds, crds_yaml, install_crds, requeue_for, run};
pub use error::{KubeError, Result};
pub use reconciler::{Context, cleanup_application, reconcile_application};
pub use release::{ReleaseState, StoredRelease};
pub use resources::{ManifestApplier, OperationSummary, ResourceCategory, ResourceManager};
pub use storage::{
    CompressionMethod, MockStorageDriver, OperationCounts, SecretsDriver, StorageConfig,
    StorageDriver,
};
pub use store::{APPLICATION_FINALIZER, KubeObjectStore, MockObjectStore, ObjectStore, StoreCall};
