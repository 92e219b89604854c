//! Application commands - render an application chart locally or apply
//! Application and Component resources to the cluster

use console::style;
use indexmap::IndexMap;
use ketch_core::api::FIELD_MANAGER;
use ketch_core::{Application, ChartConfig, Component};
use ketch_engine::{ApplicationChart, registry_from_components};
use kube::api::{Api, Patch, PatchParams};
use kube::ResourceExt;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::cluster;
use crate::error::{CliError, Result};
use crate::output::{OutputFormat, print_structured};

/// Resources read from manifest files
#[derive(Debug, Default)]
pub struct Manifests {
    pub applications: Vec<Application>,
    pub components: Vec<Component>,
}

impl Manifests {
    /// Read every YAML document of every file
    pub fn load(paths: &[PathBuf]) -> Result<Self> {
        let mut manifests = Self::default();
        for path in paths {
            let content = std::fs::read_to_string(path).map_err(|e| CliError::Io {
                message: format!("{}: {}", path.display(), e),
            })?;
            manifests.parse(&content, path)?;
        }
        Ok(manifests)
    }

    fn parse(&mut self, content: &str, path: &Path) -> Result<()> {
        for document in serde_yaml::Deserializer::from_str(content) {
            let value = serde_yaml::Value::deserialize(document)?;
            if value.is_null() {
                continue;
            }
            match value.get("kind").and_then(|k| k.as_str()) {
                Some("Application") => self.applications.push(serde_yaml::from_value(value)?),
                Some("Component") => self.components.push(serde_yaml::from_value(value)?),
                other => {
                    return Err(CliError::validation_with_help(
                        format!(
                            "{}: unsupported kind {}",
                            path.display(),
                            other.unwrap_or("<missing>")
                        ),
                        "only Application and Component resources are accepted",
                    ));
                }
            }
        }
        Ok(())
    }

    /// The one Application to render
    fn single_application(&self) -> Result<&Application> {
        match self.applications.as_slice() {
            [application] => Ok(application),
            [] => Err(CliError::usage("no Application found in the given files")),
            _ => Err(CliError::usage_with_help(
                "more than one Application found",
                "pass the files of a single application",
            )),
        }
    }
}

/// Chart files of the single Application in `manifests`
///
/// `Chart.yaml` comes first, followed by `templates/<name>.yaml` in link order.
pub fn render_chart(manifests: &Manifests) -> Result<IndexMap<String, String>> {
    let application = manifests.single_application()?;
    let registry = registry_from_components(manifests.components.iter().cloned());
    let chart = ApplicationChart::new(application, &registry)?;
    debug!(
        application = %chart.name(),
        templates = chart.templates().len(),
        "chart rendered"
    );
    Ok(chart.files(&ChartConfig::for_application(application))?)
}

pub fn template(files: &[PathBuf], output: Option<OutputFormat>) -> Result<()> {
    let manifests = Manifests::load(files)?;
    let chart = render_chart(&manifests)?;

    if let Some(format) = output {
        return print_structured(format, &chart);
    }
    for (name, content) in chart {
        println!("---");
        println!("# Source: {}", name);
        print!("{}", content);
    }
    Ok(())
}

/// Server-side apply Components first, then Applications
pub async fn apply(files: &[PathBuf]) -> Result<()> {
    let manifests = Manifests::load(files)?;
    if manifests.applications.is_empty() && manifests.components.is_empty() {
        return Err(CliError::usage("no resources found in the given files"));
    }

    let client = cluster::connect().await?;
    let params = PatchParams::apply(FIELD_MANAGER).force();

    let components: Api<Component> = Api::all(client.clone());
    for component in &manifests.components {
        let name = component.name_any();
        components.patch(&name, &params, &Patch::Apply(component)).await?;
        println!("component.theketch.io/{} applied", style(&name).cyan());
    }

    let applications: Api<Application> = Api::all(client);
    for application in &manifests.applications {
        let name = application.name_any();
        applications
            .patch(&name, &params, &Patch::Apply(application))
            .await?;
        println!("application.theketch.io/{} applied", style(&name).cyan());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPONENTS: &str = r#"
apiVersion: theketch.io/v1beta1
kind: Component
metadata:
  name: webserver
spec:
  schematic:
    kube:
      templates:
        - template:
            apiVersion: apps/v1
            kind: Deployment
            metadata:
              name: web
            spec:
              replicas: 1
              template:
                spec:
                  containers:
                    - name: web
          parameters:
            - name: image
              type: string
              required: true
              fieldPaths:
                - spec.template.spec.containers[0].image
            - name: replicas
              type: number
              fieldPaths:
                - spec.replicas
"#;

    const APPLICATION: &str = r#"
apiVersion: theketch.io/v1beta1
kind: Application
metadata:
  name: dashboard
spec:
  framework: working-pool
  components:
    - name: frontend
      type: webserver
      properties:
        image: me/my-frontend:1.2.3
        replicas: "3"
"#;

    fn manifests(documents: &[&str]) -> Manifests {
        let mut manifests = Manifests::default();
        manifests
            .parse(&documents.join("\n---\n"), Path::new("test.yaml"))
            .unwrap();
        manifests
    }

    #[test]
    fn test_parse_multi_document_files() {
        let manifests = manifests(&[COMPONENTS, APPLICATION]);
        assert_eq!(manifests.components.len(), 1);
        assert_eq!(manifests.applications.len(), 1);
    }

    #[test]
    fn test_rejects_unknown_kind() {
        let mut manifests = Manifests::default();
        let err = manifests
            .parse("apiVersion: v1\nkind: ConfigMap\n", Path::new("cm.yaml"))
            .unwrap_err();
        assert_eq!(err.to_string(), "cm.yaml: unsupported kind ConfigMap");
    }

    #[test]
    fn test_render_chart() {
        let chart = render_chart(&manifests(&[COMPONENTS, APPLICATION])).unwrap();
        let names: Vec<&str> = chart.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["Chart.yaml", "templates/frontend.yaml"]);

        let deployment = &chart["templates/frontend.yaml"];
        assert!(deployment.contains("image: me/my-frontend:1.2.3"));
        assert!(deployment.contains("replicas: 3"));
        assert!(chart["Chart.yaml"].contains("name: dashboard"));
    }

    #[test]
    fn test_render_requires_one_application() {
        let err = render_chart(&manifests(&[COMPONENTS])).unwrap_err();
        assert_eq!(err.to_string(), "no Application found in the given files");
    }

    #[test]
    fn test_render_unknown_component() {
        let err = render_chart(&manifests(&[APPLICATION])).unwrap_err();
        assert_eq!(err.exit_code(), crate::exit_codes::RENDER_ERROR);
    }
}
