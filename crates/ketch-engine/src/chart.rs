//! Application chart assembly

use indexmap::IndexMap;
use ketch_core::api::{Application, Component, ComponentSpec};
use ketch_core::ChartConfig;
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::renderer::render_component_templates;
use crate::suggestions::suggest_component_type;

/// Component specs by component type name
pub type ComponentRegistry = BTreeMap<String, ComponentSpec>;

/// Build a registry from listed Component resources
pub fn registry_from_components(components: impl IntoIterator<Item = Component>) -> ComponentRegistry {
    components
        .into_iter()
        .filter_map(|c| c.metadata.name.clone().map(|name| (name, c.spec)))
        .collect()
}

/// Rendered templates of one Application, keyed by template name
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationChart {
    name: String,
    templates: IndexMap<String, String>,
}

impl ApplicationChart {
    /// Render every component link of `application`
    ///
    /// Any failure discards the whole chart.
    pub fn new(application: &Application, registry: &ComponentRegistry) -> Result<Self> {
        let mut templates = IndexMap::new();

        for link in &application.spec.components {
            let spec = registry.get(&link.component_type).ok_or_else(|| {
                EngineError::UnknownComponentType {
                    component_type: link.component_type.clone(),
                    link: link.name.clone(),
                    suggestion: Some(suggest_component_type(
                        &link.component_type,
                        registry.keys().map(String::as_str),
                    )),
                }
            })?;

            for (key, manifest) in render_component_templates(spec, link)? {
                if templates.contains_key(&key) {
                    return Err(EngineError::DuplicateTemplate { name: key });
                }
                templates.insert(key, manifest);
            }
        }

        let name = application.metadata.name.clone().unwrap_or_default();
        debug!(app = %name, templates = templates.len(), "assembled application chart");
        Ok(Self { name, templates })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn templates(&self) -> &IndexMap<String, String> {
        &self.templates
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Chart bundle: `Chart.yaml` followed by `templates/<name>.yaml`
    pub fn files(&self, config: &ChartConfig) -> Result<IndexMap<String, String>> {
        let chart_yaml = config.render_chart_yaml()?;
        let mut files = IndexMap::with_capacity(self.templates.len() + 1);
        files.insert("Chart.yaml".to_string(), chart_yaml);
        for (name, manifest) in &self.templates {
            files.insert(format!("templates/{}.yaml", name), manifest.clone());
        }
        Ok(files)
    }

    /// All templates as one multi-document YAML stream, in link order
    pub fn manifest(&self) -> String {
        self.templates
            .iter()
            .map(|(name, manifest)| format!("---\n# Source: templates/{}.yaml\n{}", name, manifest))
            .collect::<Vec<_>>()
            .join("")
    }
}
