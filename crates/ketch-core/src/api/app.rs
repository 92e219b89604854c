//! App: the CLI-facing deployment record
//!
//! `ketch app`, `ketch unit`, `ketch env` and `ketch cname` edit these records.
//! Turning them into workloads is the job of a separate App controller.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::framework::Framework;
use crate::error::{CoreError, Result};

/// Process name used when a deployment does not declare any
pub const DEFAULT_PROCESS: &str = "web";

#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "theketch.io",
    version = "v1beta1",
    kind = "App",
    printcolumn = r#"{"name":"Framework","type":"string","jsonPath":".spec.framework"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AppSpec {
    pub framework: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default)]
    pub deployments: Vec<AppDeploymentSpec>,

    /// Total number of deployments ever made, used to number the next one
    #[serde(default)]
    pub deployments_count: u32,

    #[serde(default)]
    pub env: Vec<Env>,

    #[serde(default)]
    pub ingress: IngressSpec,

    #[serde(default)]
    pub docker_registry: DockerRegistrySpec,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builder: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub build_packs: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppDeploymentSpec {
    pub image: String,
    pub version: u32,

    #[serde(default)]
    pub processes: Vec<ProcessSpec>,

    #[serde(default)]
    pub routing_settings: RoutingSettings,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<i32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cmd: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<Env>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct RoutingSettings {
    /// Percentage of traffic routed to the deployment
    pub weight: u8,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct Env {
    pub name: String,
    pub value: String,
}

impl Env {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Parse a `NAME=VALUE` pair
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.split_once('=') {
            Some((name, value)) if !name.is_empty() => Ok(Self::new(name, value)),
            _ => Err(CoreError::InvalidEnv(raw.to_string())),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IngressSpec {
    #[serde(default)]
    pub generate_default_cname: bool,

    #[serde(default)]
    pub cnames: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DockerRegistrySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
}

/// Narrows a units operation to one process and/or one deployment version
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UnitSelector {
    pub process: Option<String>,
    pub version: Option<u32>,
}

impl UnitSelector {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn process(mut self, process: impl Into<String>) -> Self {
        self.process = Some(process.into());
        self
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }
}

impl App {
    /// Environment variables by name, every variable when `names` is empty
    pub fn envs(&self, names: &[String]) -> BTreeMap<String, String> {
        self.spec
            .env
            .iter()
            .filter(|e| names.is_empty() || names.contains(&e.name))
            .map(|e| (e.name.clone(), e.value.clone()))
            .collect()
    }

    /// Insert or overwrite variables, keeping the existing order
    pub fn set_envs(&mut self, envs: Vec<Env>) {
        for env in envs {
            match self.spec.env.iter_mut().find(|e| e.name == env.name) {
                Some(existing) => existing.value = env.value,
                None => self.spec.env.push(env),
            }
        }
    }

    pub fn unset_envs(&mut self, names: &[String]) {
        self.spec.env.retain(|e| !names.contains(&e.name));
    }

    /// Addresses the app is reachable at
    ///
    /// The default cname is only known once the framework exposes an ingress
    /// service endpoint.
    pub fn cnames(&self, framework: Option<&Framework>) -> Vec<String> {
        let mut cnames = Vec::new();
        if self.spec.ingress.generate_default_cname {
            let endpoint = framework.and_then(|f| f.spec.ingress_controller.service_endpoint.as_deref());
            if let Some(endpoint) = endpoint.filter(|e| !e.is_empty()) {
                cnames.push(format!("http://{}.{}.shipa.cloud", self.app_name(), endpoint));
            }
        }
        cnames.extend(self.spec.ingress.cnames.iter().map(|c| format!("http://{}", c)));
        cnames
    }

    /// Returns false if the cname was already present
    pub fn add_cname(&mut self, cname: &str) -> bool {
        if self.spec.ingress.cnames.iter().any(|c| c == cname) {
            return false;
        }
        self.spec.ingress.cnames.push(cname.to_string());
        true
    }

    /// Returns false if the cname was absent
    pub fn remove_cname(&mut self, cname: &str) -> bool {
        let before = self.spec.ingress.cnames.len();
        self.spec.ingress.cnames.retain(|c| c != cname);
        before != self.spec.ingress.cnames.len()
    }

    /// Replace the deployments with a single new one running `image`
    ///
    /// Without `processes` the latest deployment's processes and units carry
    /// over, and a first deployment gets one unit of the default process.
    pub fn deploy_image(&mut self, image: &str, processes: Vec<ProcessSpec>) -> u32 {
        let previous = self
            .spec
            .deployments
            .iter()
            .max_by_key(|d| d.version)
            .map(|d| d.processes.clone())
            .filter(|p| !p.is_empty());
        let processes = match (processes.is_empty(), previous) {
            (false, _) => processes,
            (true, Some(previous)) => previous,
            (true, None) => vec![ProcessSpec {
                name: DEFAULT_PROCESS.to_string(),
                units: Some(1),
                ..Default::default()
            }],
        };
        self.spec.deployments_count += 1;
        let version = self.spec.deployments_count;
        self.spec.deployments = vec![AppDeploymentSpec {
            image: image.to_string(),
            version,
            processes,
            routing_settings: RoutingSettings { weight: 100 },
        }];
        version
    }

    pub fn set_units(&mut self, selector: &UnitSelector, units: i32) -> Result<()> {
        self.update_units(selector, |_| units)
    }

    /// Add `delta` units, never going below zero
    pub fn add_units(&mut self, selector: &UnitSelector, delta: i32) -> Result<()> {
        self.update_units(selector, |current| current.unwrap_or(0).saturating_add(delta).max(0))
    }

    pub fn stop(&mut self, selector: &UnitSelector) -> Result<()> {
        self.update_units(selector, |_| 0)
    }

    /// Processes with no units are brought back to a single unit
    pub fn start(&mut self, selector: &UnitSelector) -> Result<()> {
        self.update_units(selector, |current| match current {
            None | Some(0) => 1,
            Some(units) => units,
        })
    }

    fn update_units<F>(&mut self, selector: &UnitSelector, f: F) -> Result<()>
    where
        F: Fn(Option<i32>) -> i32,
    {
        let mut deployment_found = false;
        let mut process_found = false;
        for deployment in self
            .spec
            .deployments
            .iter_mut()
            .filter(|d| selector.version.is_none_or(|v| v == d.version))
        {
            deployment_found = true;
            for process in deployment
                .processes
                .iter_mut()
                .filter(|p| selector.process.as_deref().is_none_or(|name| name == p.name))
            {
                process_found = true;
                process.units = Some(f(process.units));
            }
        }
        if let Some(version) = selector.version.filter(|_| !deployment_found) {
            return Err(CoreError::DeploymentNotFound { version });
        }
        if let Some(process) = selector.process.as_ref().filter(|_| !process_found) {
            return Err(CoreError::ProcessNotFound {
                process: process.clone(),
            });
        }
        Ok(())
    }

    fn app_name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{FrameworkSpec, IngressControllerSpec};

    fn app() -> App {
        let mut app = App::new(
            "dashboard",
            AppSpec {
                framework: "myframework".to_string(),
                ..Default::default()
            },
        );
        app.deploy_image(
            "shipasoftware/go-app:v1",
            vec![
                ProcessSpec {
                    name: "web".to_string(),
                    units: Some(2),
                    cmd: vec!["./app".to_string()],
                    env: vec![],
                },
                ProcessSpec {
                    name: "worker".to_string(),
                    units: None,
                    cmd: vec![],
                    env: vec![],
                },
            ],
        );
        app
    }

    #[test]
    fn test_env_parse() {
        assert_eq!(Env::parse("A=1").unwrap(), Env::new("A", "1"));
        assert_eq!(Env::parse("A=b=c").unwrap(), Env::new("A", "b=c"));
        assert!(Env::parse("noequals").is_err());
        assert!(Env::parse("=1").is_err());
    }

    #[test]
    fn test_set_get_unset_envs() {
        let mut app = app();
        app.set_envs(vec![Env::new("A", "1"), Env::new("B", "2")]);
        app.set_envs(vec![Env::new("A", "3")]);
        assert_eq!(app.spec.env, vec![Env::new("A", "3"), Env::new("B", "2")]);

        let only_b = app.envs(&["B".to_string()]);
        assert_eq!(only_b.len(), 1);
        assert_eq!(only_b["B"], "2");
        assert_eq!(app.envs(&[]).len(), 2);

        app.unset_envs(&["A".to_string()]);
        assert_eq!(app.spec.env, vec![Env::new("B", "2")]);
    }

    #[test]
    fn test_deploy_image_numbers_deployments() {
        let mut app = app();
        assert_eq!(app.spec.deployments[0].version, 1);
        let version = app.deploy_image("shipasoftware/go-app:v2", vec![]);
        assert_eq!(version, 2);
        assert_eq!(app.spec.deployments.len(), 1);
        assert_eq!(app.spec.deployments[0].routing_settings.weight, 100);

        let mut fresh = App::new("fresh", AppSpec::default());
        fresh.deploy_image("nginx", vec![]);
        let processes = &fresh.spec.deployments[0].processes;
        assert_eq!(processes.len(), 1);
        assert_eq!(processes[0].name, DEFAULT_PROCESS);
        assert_eq!(processes[0].units, Some(1));
    }

    #[test]
    fn test_redeploy_keeps_scaled_processes() {
        let mut app = app();
        app.set_units(&UnitSelector::all().process("worker"), 7).unwrap();

        app.deploy_image("shipasoftware/go-app:v2", vec![]);

        let processes = &app.spec.deployments[0].processes;
        assert_eq!(app.spec.deployments[0].image, "shipasoftware/go-app:v2");
        assert_eq!(processes.len(), 2);
        assert_eq!(processes[0].units, Some(2));
        assert_eq!(processes[1].name, "worker");
        assert_eq!(processes[1].units, Some(7));
    }

    #[test]
    fn test_add_units_saturates() {
        let mut app = app();
        app.add_units(&UnitSelector::all().process("web"), i32::MAX).unwrap();
        assert_eq!(app.spec.deployments[0].processes[0].units, Some(i32::MAX));
    }

    #[test]
    fn test_units() {
        let mut app = app();
        app.add_units(&UnitSelector::all().process("web"), 3).unwrap();
        assert_eq!(app.spec.deployments[0].processes[0].units, Some(5));

        app.add_units(&UnitSelector::all().process("web"), -10).unwrap();
        assert_eq!(app.spec.deployments[0].processes[0].units, Some(0));

        app.set_units(&UnitSelector::all().version(1), 4).unwrap();
        assert_eq!(app.spec.deployments[0].processes[1].units, Some(4));
    }

    #[test]
    fn test_stop_start() {
        let mut app = app();
        app.stop(&UnitSelector::all()).unwrap();
        assert!(app.spec.deployments[0].processes.iter().all(|p| p.units == Some(0)));
        app.start(&UnitSelector::all()).unwrap();
        assert!(app.spec.deployments[0].processes.iter().all(|p| p.units == Some(1)));
    }

    #[test]
    fn test_unknown_selector() {
        let mut app = app();
        assert!(matches!(
            app.stop(&UnitSelector::all().version(9)),
            Err(CoreError::DeploymentNotFound { version: 9 })
        ));
        assert!(matches!(
            app.stop(&UnitSelector::all().process("cron")),
            Err(CoreError::ProcessNotFound { .. })
        ));
    }

    #[test]
    fn test_cnames() {
        let mut app = app();
        app.spec.ingress.generate_default_cname = true;
        assert!(app.add_cname("theketch.io"));
        assert!(!app.add_cname("theketch.io"));

        let framework = Framework::new(
            "myframework",
            FrameworkSpec {
                name: None,
                namespace_name: "ketch-myframework".to_string(),
                app_quota_limit: -1,
                ingress_controller: IngressControllerSpec {
                    service_endpoint: Some("10.10.20.30".to_string()),
                    ..Default::default()
                },
            },
        );
        assert_eq!(
            app.cnames(Some(&framework)),
            vec![
                "http://dashboard.10.10.20.30.shipa.cloud".to_string(),
                "http://theketch.io".to_string(),
            ]
        );
        assert_eq!(app.cnames(None), vec!["http://theketch.io".to_string()]);

        assert!(app.remove_cname("theketch.io"));
        assert!(!app.remove_cname("theketch.io"));
    }
}
