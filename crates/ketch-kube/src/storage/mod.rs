//! Storage drivers for persisting chart releases
//!
//! - **Secrets** (default): one Secret per revision in the release namespace
//! - **Mock**: in-memory storage with operation counters, for tests
//!
//! Release payloads are JSON, compressed with zstd (or gzip) and base64
//! encoded.

mod mock;
mod secrets;

pub use mock::{MockStorageDriver, OperationCounts};
pub use secrets::SecretsDriver;

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::{KubeError, Result};
use crate::release::StoredRelease;

/// Maximum size for a single Kubernetes Secret (1MB - some overhead)
pub const MAX_RESOURCE_SIZE: usize = 1_000_000;

/// Label marking resources owned by Ketch
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Storage driver trait for release persistence
///
/// Implementations must be Send + Sync for use across async tasks.
#[async_trait]
pub trait StorageDriver: Send + Sync {
    /// Get a specific release by name and version
    async fn get(&self, namespace: &str, name: &str, version: u32) -> Result<StoredRelease>;

    /// Get the latest release for a name
    async fn get_latest(&self, namespace: &str, name: &str) -> Result<StoredRelease>;

    /// List releases in a namespace, optionally filtered by name
    async fn list(&self, namespace: &str, name: Option<&str>) -> Result<Vec<StoredRelease>>;

    /// All revisions of a release, newest first
    async fn history(&self, namespace: &str, name: &str) -> Result<Vec<StoredRelease>>;

    async fn create(&self, release: &StoredRelease) -> Result<()>;

    async fn update(&self, release: &StoredRelease) -> Result<()>;

    /// Delete a specific release version
    async fn delete(&self, namespace: &str, name: &str, version: u32) -> Result<StoredRelease>;

    /// Delete all versions of a release
    async fn delete_all(&self, namespace: &str, name: &str) -> Result<Vec<StoredRelease>>;

    /// Check if a release exists
    async fn exists(&self, namespace: &str, name: &str) -> Result<bool> {
        match self.get_latest(namespace, name).await {
            Ok(_) => Ok(true),
            Err(KubeError::ReleaseNotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub compression: CompressionMethod,

    /// Maximum number of revisions to keep per release
    pub max_history: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            compression: CompressionMethod::default(),
            max_history: 10,
        }
    }
}

/// Compression method for release data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    None,

    /// Gzip compression (Helm-compatible)
    Gzip { level: u32 },

    Zstd { level: i32 },
}

impl Default for CompressionMethod {
    fn default() -> Self {
        Self::Zstd { level: 3 }
    }
}

impl CompressionMethod {
    /// Value of the `compression` label on stored Secrets
    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip { .. } => "gzip",
            Self::Zstd { .. } => "zstd",
        }
    }

    /// Inverse of [`CompressionMethod::label`], unknown labels read as zstd
    pub fn from_label(label: &str) -> Self {
        match label {
            "none" => Self::None,
            "gzip" => Self::Gzip { level: 6 },
            _ => Self::default(),
        }
    }
}

/// Compress data using the configured method
#[must_use = "compression result should be used"]
pub fn compress(data: &[u8], method: CompressionMethod) -> Result<Vec<u8>> {
    match method {
        CompressionMethod::None => Ok(data.to_vec()),
        CompressionMethod::Gzip { level } => {
            use std::io::Write;
            let mut encoder =
                flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::new(level));
            encoder
                .write_all(data)
                .map_err(|e| KubeError::Compression(e.to_string()))?;
            encoder
                .finish()
                .map_err(|e| KubeError::Compression(e.to_string()))
        }
        CompressionMethod::Zstd { level } => zstd::encode_all(std::io::Cursor::new(data), level)
            .map_err(|e| KubeError::Compression(e.to_string())),
    }
}

/// Decompress data
#[must_use = "decompression result should be used"]
pub fn decompress(data: &[u8], method: CompressionMethod) -> Result<Vec<u8>> {
    match method {
        CompressionMethod::None => Ok(data.to_vec()),
        CompressionMethod::Gzip { .. } => {
            use std::io::Read;
            let mut decoder = flate2::read::GzDecoder::new(data);
            let mut decompressed = Vec::new();
            decoder
                .read_to_end(&mut decompressed)
                .map_err(|e| KubeError::Compression(e.to_string()))?;
            Ok(decompressed)
        }
        CompressionMethod::Zstd { .. } => zstd::decode_all(std::io::Cursor::new(data))
            .map_err(|e| KubeError::Compression(e.to_string())),
    }
}

/// Encode a release for storage (serialize + compress + base64)
#[must_use = "encoded data should be used for storage"]
pub fn encode_for_storage(release: &StoredRelease, config: &StorageConfig) -> Result<String> {
    let json = serde_json::to_vec(release)?;
    let compressed = compress(&json, config.compression)?;
    let encoded =
        base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &compressed);
    if encoded.len() > MAX_RESOURCE_SIZE {
        return Err(KubeError::ReleaseTooLarge {
            size: encoded.len(),
            max: MAX_RESOURCE_SIZE,
        });
    }
    Ok(encoded)
}

/// Decode a release from storage (base64 + decompress + deserialize)
#[must_use = "decoded release should be used"]
pub fn decode_from_storage(data: &str, compression: CompressionMethod) -> Result<StoredRelease> {
    let decoded = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, data)
        .map_err(|e| KubeError::Serialization(format!("base64 decode error: {}", e)))?;
    let decompressed = decompress(&decoded, compression)?;
    Ok(serde_json::from_slice(&decompressed)?)
}

/// Labels applied to all storage resources
#[must_use = "labels should be applied to resources"]
pub fn storage_labels(release: &StoredRelease) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(MANAGED_BY_LABEL.to_string(), "ketch".to_string());
    labels.insert("theketch.io/release-name".to_string(), release.name.clone());
    labels.insert(
        "theketch.io/release-version".to_string(),
        release.version.to_string(),
    );
    labels
}
