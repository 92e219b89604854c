//! Chart releases recorded by the chart client

use chrono::{DateTime, Utc};
use ketch_core::ChartConfig;
use serde::{Deserialize, Serialize};

/// One revision of an application chart applied to a namespace
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredRelease {
    /// Release name, identical to the Application name
    pub name: String,

    /// Namespace the chart was applied to
    pub namespace: String,

    /// Revision number (1-indexed, increments with each upgrade)
    pub version: u32,

    /// Current state
    pub state: ReleaseState,

    /// Chart metadata at apply time
    pub chart: ChartConfig,

    /// Rendered manifest (all Kubernetes resources)
    pub manifest: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredRelease {
    /// First revision of a release
    pub fn for_install(namespace: &str, chart: ChartConfig, manifest: String) -> Self {
        let now = Utc::now();
        Self {
            name: chart.app_name.clone(),
            namespace: namespace.to_string(),
            version: 1,
            state: ReleaseState::PendingInstall { started_at: now },
            chart,
            manifest,
            created_at: now,
            updated_at: now,
        }
    }

    /// Next revision after `previous`
    pub fn for_upgrade(previous: &StoredRelease, chart: ChartConfig, manifest: String) -> Self {
        let now = Utc::now();
        Self {
            name: previous.name.clone(),
            namespace: previous.namespace.clone(),
            version: previous.version + 1,
            state: ReleaseState::PendingUpgrade {
                started_at: now,
                previous_version: previous.version,
            },
            chart,
            manifest,
            created_at: now,
            updated_at: now,
        }
    }

    /// Storage key for this release
    pub fn storage_key(&self) -> String {
        format!("sh.ketch.release.v1.{}.v{}", self.name, self.version)
    }

    pub fn is_deployed(&self) -> bool {
        self.state == ReleaseState::Deployed
    }

    pub fn mark_deployed(&mut self) {
        self.state = ReleaseState::Deployed;
        self.updated_at = Utc::now();
    }

    pub fn mark_failed(&mut self, reason: String) {
        self.state = ReleaseState::Failed {
            reason,
            failed_at: Utc::now(),
        };
        self.updated_at = Utc::now();
    }

    /// Replaced by a newer revision
    pub fn mark_superseded(&mut self) {
        self.state = ReleaseState::Superseded;
        self.updated_at = Utc::now();
    }
}

/// Release state
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum ReleaseState {
    #[default]
    Deployed,

    Failed {
        reason: String,
        failed_at: DateTime<Utc>,
    },

    Superseded,

    PendingInstall {
        started_at: DateTime<Utc>,
    },

    PendingUpgrade {
        started_at: DateTime<Utc>,
        previous_version: u32,
    },
}

impl ReleaseState {
    /// Check if this is a pending (transitional) state
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::PendingInstall { .. } | Self::PendingUpgrade { .. })
    }

    /// Human-readable status name
    pub fn status_name(&self) -> &'static str {
        match self {
            Self::Deployed => "deployed",
            Self::Failed { .. } => "failed",
            Self::Superseded => "superseded",
            Self::PendingInstall { .. } => "pending-install",
            Self::PendingUpgrade { .. } => "pending-upgrade",
        }
    }
}

impl std::fmt::Display for ReleaseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Failed { reason, .. } => write!(f, "failed: {}", reason),
            other => write!(f, "{}", other.status_name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chart(generation: u64) -> ChartConfig {
        ChartConfig {
            version: semver::Version::new(0, 0, generation),
            app_name: "myapp".to_string(),
            description: None,
            app_version: format!("v{}", generation),
        }
    }

    #[test]
    fn test_storage_key() {
        let release = StoredRelease::for_install("ketch-pool", chart(1), "apiVersion: v1".to_string());
        assert_eq!(release.storage_key(), "sh.ketch.release.v1.myapp.v1");
        assert!(release.state.is_pending());
    }

    #[test]
    fn test_upgrade_bumps_revision() {
        let mut first = StoredRelease::for_install("ketch-pool", chart(1), String::new());
        first.mark_deployed();
        let second = StoredRelease::for_upgrade(&first, chart(2), String::new());
        assert_eq!(second.version, 2);
        assert_eq!(second.namespace, "ketch-pool");
        assert!(matches!(
            second.state,
            ReleaseState::PendingUpgrade { previous_version: 1, .. }
        ));
    }

    #[test]
    fn test_state_serialization() {
        let mut release = StoredRelease::for_install("ns", chart(1), String::new());
        release.mark_failed("boom".to_string());
        let json = serde_json::to_value(&release).unwrap();
        assert_eq!(json["state"]["status"], "failed");
        assert_eq!(json["state"]["reason"], "boom");
        assert_eq!(release.state.to_string(), "failed: boom");
    }
}
