//! Component template rendering
//!
//! A component link supplies raw property values; every template of the
//! linked component is cloned, the values are injected at the parameter field
//! paths and the result is serialized to YAML.

use indexmap::IndexMap;
use ketch_core::api::{ComponentLink, ComponentSpec};
use ketch_core::fieldpath;
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::suggestions::suggest_property;

/// Key of the `index`-th template rendered for `link`
///
/// The first template is keyed by the link name, the following ones get a
/// `-<n>` suffix.
pub fn template_key(link: &str, index: usize) -> String {
    if index == 0 {
        link.to_string()
    } else {
        format!("{}-{}", link, index)
    }
}

/// Render every template of `spec` with the properties of `link`
///
/// Optional parameters the link leaves unset keep the skeleton's own value.
pub fn render_component_templates(
    spec: &ComponentSpec,
    link: &ComponentLink,
) -> Result<IndexMap<String, String>> {
    let mut rendered = IndexMap::new();

    for (index, template) in spec.templates().iter().enumerate() {
        let mut document = template.template.clone();

        for parameter in &template.parameters {
            match link.properties.get(&parameter.name) {
                Some(raw) => fieldpath::inject(
                    &mut document,
                    &parameter.name,
                    parameter.parameter_type,
                    raw,
                    &parameter.field_paths,
                )?,
                None if parameter.required => {
                    return Err(EngineError::RequiredParameterMissing {
                        parameter: parameter.name.clone(),
                        link: link.name.clone(),
                        suggestion: suggest_property(
                            &parameter.name,
                            link.properties.keys().map(String::as_str),
                        ),
                    });
                }
                None => {
                    debug!(link = %link.name, parameter = %parameter.name, "optional parameter not set");
                }
            }
        }

        rendered.insert(template_key(&link.name, index), serde_yaml::to_string(&document)?);
    }

    Ok(rendered)
}
