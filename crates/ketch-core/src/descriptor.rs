//! Application descriptor file accepted by `ketch app deploy --file`

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::api::{Env, ProcessSpec};
use crate::error::{CoreError, Result};

fn default_version() -> String {
    "v1".to_string()
}

fn default_type() -> String {
    "Application".to_string()
}

fn default_app_unit() -> i32 {
    1
}

/// Application descriptor
///
/// ```yaml
/// name: test
/// image: gcr.io/kubernetes-312803/sample-go-app:latest
/// framework: myframework
/// environment:
///   - PORT=6666
/// processes:
///   - name: web
///     cmd: python app.py
///     units: 1
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppDescriptor {
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(rename = "type", default = "default_type")]
    pub app_type: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub image: Option<String>,

    #[serde(default)]
    pub framework: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// `NAME=VALUE` entries
    #[serde(default)]
    pub environment: Vec<String>,

    #[serde(default)]
    pub registry_secret: Option<String>,

    #[serde(default)]
    pub builder: Option<String>,

    #[serde(default)]
    pub build_packs: Vec<String>,

    #[serde(default)]
    pub processes: Vec<ProcessDescriptor>,

    /// Units for processes that do not set their own
    #[serde(default = "default_app_unit")]
    pub app_unit: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessDescriptor {
    pub name: String,

    /// Command line, split on spaces
    #[serde(default)]
    pub cmd: String,

    #[serde(default)]
    pub units: Option<i32>,

    #[serde(default)]
    pub ports: Vec<PortDescriptor>,

    #[serde(default)]
    pub hooks: Vec<HookDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortDescriptor {
    #[serde(default)]
    pub protocol: Option<String>,
    pub port: u16,
    #[serde(default)]
    pub target_port: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HookDescriptor {
    #[serde(default)]
    pub restart: RestartHook,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RestartHook {
    #[serde(default)]
    pub before: Option<String>,
    #[serde(default)]
    pub after: Option<String>,
}

impl AppDescriptor {
    pub fn from_yaml(content: &str) -> Result<Self> {
        let descriptor: Self = serde_yaml::from_str(content)?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        Self::from_yaml(&std::fs::read_to_string(path)?)
    }

    fn validate(&self) -> Result<()> {
        let missing = |field: &str| CoreError::MissingField {
            field: field.to_string(),
        };
        if self.framework.as_deref().is_none_or(str::is_empty) {
            return Err(missing("framework"));
        }
        if self.image.as_deref().is_none_or(str::is_empty) {
            return Err(missing("image"));
        }
        if self.name.is_empty() {
            return Err(missing("name"));
        }
        Ok(())
    }

    /// Parsed `environment` entries
    pub fn environment(&self) -> Result<Vec<Env>> {
        self.environment.iter().map(|e| Env::parse(e)).collect()
    }

    /// Processes as stored on the App, each carrying the descriptor environment
    pub fn processes(&self) -> Result<Vec<ProcessSpec>> {
        let env = self.environment()?;
        Ok(self
            .processes
            .iter()
            .map(|p| ProcessSpec {
                name: p.name.clone(),
                units: Some(p.units.unwrap_or(self.app_unit)),
                cmd: p.cmd.split_whitespace().map(str::to_string).collect(),
                env: env.clone(),
            })
            .collect())
    }
}
