//! CLI configuration file (`config.toml`)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};

/// Environment variable overriding the Ketch home directory
pub const KETCH_HOME_ENV: &str = "KETCH_HOME";

/// Contents of `config.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct KetchConfig {
    /// Builders listed after the built-in ones
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_builders: Vec<AdditionalBuilder>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdditionalBuilder {
    pub vendor: String,
    pub image: String,
    #[serde(default)]
    pub description: String,
}

impl KetchConfig {
    /// Load a config file, a missing file yields the default configuration
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load from [`default_config_path`]
    pub fn load_default() -> Result<Self> {
        Self::load(&default_config_path()?)
    }
}

/// `$KETCH_HOME`, else `~/.ketch`
pub fn ketch_home() -> Result<PathBuf> {
    if let Some(home) = std::env::var_os(KETCH_HOME_ENV).filter(|h| !h.is_empty()) {
        return Ok(PathBuf::from(home));
    }
    dirs::home_dir()
        .map(|home| home.join(".ketch"))
        .ok_or(CoreError::NoHomeDir)
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(ketch_home()?.join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_additional_builders() {
        let config = KetchConfig::from_toml(
            r#"
[[additional-builders]]
vendor = "test vendor"
image = "test image"
description = "test description"
"#,
        )
        .unwrap();
        assert_eq!(
            config.additional_builders,
            vec![AdditionalBuilder {
                vendor: "test vendor".to_string(),
                image: "test image".to_string(),
                description: "test description".to_string(),
            }]
        );
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let config = KetchConfig::load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, KetchConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[[additional-builders]]\nvendor = \"acme\"\nimage = \"acme/builder:1\"\n",
        )
        .unwrap();
        let config = KetchConfig::load(&path).unwrap();
        assert_eq!(config.additional_builders[0].vendor, "acme");
        assert_eq!(config.additional_builders[0].description, "");
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(matches!(
            KetchConfig::from_toml("additional-builders = 3"),
            Err(CoreError::TomlParse(_))
        ));
    }
}
