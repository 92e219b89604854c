//! Chart metadata derived from an Application

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::api::Application;
use crate::error::Result;

/// Metadata written to `Chart.yaml` and recorded with each release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartConfig {
    /// Chart version, `0.0.<generation>`
    pub version: Version,

    /// Release name, identical to the Application name
    pub app_name: String,

    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// `spec.version` when set, else `v<generation>`
    pub app_version: String,
}

/// Serialized form of `Chart.yaml`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChartYaml<'a> {
    api_version: &'static str,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(rename = "type")]
    chart_type: &'static str,
    version: String,
    app_version: &'a str,
}

impl ChartConfig {
    /// Compute the chart metadata for one reconciliation pass
    pub fn for_application(application: &Application) -> Self {
        let generation = application.metadata.generation.unwrap_or_default().max(0) as u64;
        Self {
            version: Version::new(0, 0, generation),
            app_name: application.metadata.name.clone().unwrap_or_default(),
            description: application.spec.description.clone(),
            app_version: application
                .spec
                .version
                .clone()
                .unwrap_or_else(|| format!("v{}", generation)),
        }
    }

    /// Chart version as displayed and written to `Chart.yaml` (`v0.0.N`)
    pub fn chart_version(&self) -> String {
        format!("v{}", self.version)
    }

    /// Render `Chart.yaml`
    pub fn render_chart_yaml(&self) -> Result<String> {
        let chart = ChartYaml {
            api_version: "v2",
            name: &self.app_name,
            description: self.description.as_deref(),
            chart_type: "application",
            version: self.chart_version(),
            app_version: &self.app_version,
        };
        Ok(serde_yaml::to_string(&chart)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApplicationSpec;

    fn application(generation: i64, version: Option<&str>) -> Application {
        let mut app = Application::new(
            "app-running",
            ApplicationSpec {
                framework: "working-pool".to_string(),
                version: version.map(str::to_string),
                description: Some("a test app".to_string()),
                components: vec![],
            },
        );
        app.metadata.generation = Some(generation);
        app
    }

    #[test]
    fn test_versions_follow_generation() {
        let config = ChartConfig::for_application(&application(7, None));
        assert_eq!(config.chart_version(), "v0.0.7");
        assert_eq!(config.app_version, "v7");
        assert_eq!(config.app_name, "app-running");
    }

    #[test]
    fn test_explicit_app_version_wins() {
        let config = ChartConfig::for_application(&application(7, Some("2.4.1")));
        assert_eq!(config.chart_version(), "v0.0.7");
        assert_eq!(config.app_version, "2.4.1");
    }

    #[test]
    fn test_render_chart_yaml() {
        let config = ChartConfig::for_application(&application(3, None));
        insta::assert_snapshot!(config.render_chart_yaml().unwrap(), @r"
        apiVersion: v2
        name: app-running
        description: a test app
        type: application
        version: v0.0.3
        appVersion: v3
        ");
    }
}
