//! Framework commands - add, list, update, export and remove frameworks

use clap::Args;
use console::style;
use ketch_core::api::{FrameworkSpec, IngressControllerType, UNLIMITED_QUOTA};
use ketch_core::{Framework, validate_name};
use kube::ResourceExt;
use kube::api::{ListParams, PostParams};
use serde::Serialize;
use std::path::Path;

use crate::cluster;
use crate::error::{CliError, Result};
use crate::output::{OutputFormat, Table, print_structured};

/// Framework settings accepted on the command line
#[derive(Args, Debug, Default, Clone)]
pub struct FrameworkFlags {
    /// Namespace the framework deploys into (default: ketch-<name>)
    #[arg(long)]
    pub namespace: Option<String>,

    /// Maximum number of apps, -1 for unlimited
    #[arg(long, allow_negative_numbers = true)]
    pub app_quota_limit: Option<i32>,

    /// Ingress controller service endpoint
    #[arg(long)]
    pub ingress_service_endpoint: Option<String>,

    /// Ingress controller type: traefik, istio or nginx
    #[arg(long)]
    pub ingress_type: Option<IngressControllerType>,

    /// Ingress class name (default: the ingress type)
    #[arg(long)]
    pub ingress_class_name: Option<String>,

    /// cert-manager ClusterIssuer used for TLS certificates
    #[arg(long)]
    pub cluster_issuer: Option<String>,
}

impl FrameworkFlags {
    pub fn is_empty(&self) -> bool {
        self.namespace.is_none()
            && self.app_quota_limit.is_none()
            && self.ingress_service_endpoint.is_none()
            && self.ingress_type.is_none()
            && self.ingress_class_name.is_none()
            && self.cluster_issuer.is_none()
    }

    /// Overwrite the fields that were given
    pub fn apply(&self, spec: &mut FrameworkSpec) {
        if let Some(namespace) = &self.namespace {
            spec.namespace_name = namespace.clone();
        }
        if let Some(limit) = self.app_quota_limit {
            spec.app_quota_limit = limit;
        }
        let ingress = &mut spec.ingress_controller;
        if let Some(endpoint) = &self.ingress_service_endpoint {
            ingress.service_endpoint = Some(endpoint.clone());
        }
        if let Some(ingress_type) = self.ingress_type {
            ingress.ingress_type = ingress_type;
        }
        if let Some(class_name) = &self.ingress_class_name {
            ingress.class_name = Some(class_name.clone());
        }
        if let Some(issuer) = &self.cluster_issuer {
            ingress.cluster_issuer = Some(issuer.clone());
        }
    }
}

fn is_yaml_file(arg: &str) -> bool {
    let path = Path::new(arg);
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

fn fill_defaults(name: &str, spec: &mut FrameworkSpec) {
    if spec.namespace_name.is_empty() {
        spec.namespace_name = format!("ketch-{}", name);
    }
    let ingress = &mut spec.ingress_controller;
    if ingress.class_name.as_deref().is_none_or(str::is_empty) {
        ingress.class_name = Some(ingress.ingress_type.to_string());
    }
}

/// Framework described by `name_or_file` and the flags
///
/// A `.yaml`/`.yml` argument is read as a framework spec and must carry its
/// own name; flags are rejected in that case.
pub fn framework_from_args(name_or_file: &str, flags: &FrameworkFlags) -> Result<Framework> {
    let (name, mut spec) = if is_yaml_file(name_or_file) {
        if !flags.is_empty() {
            return Err(CliError::usage(
                "command line flags are not permitted when passing a framework yaml file",
            ));
        }
        let content = std::fs::read_to_string(name_or_file)?;
        let spec: FrameworkSpec = serde_yaml::from_str(&content)?;
        let name = spec
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| CliError::validation("a framework name is required"))?;
        (name, spec)
    } else {
        let mut spec = FrameworkSpec {
            name: None,
            namespace_name: String::new(),
            app_quota_limit: UNLIMITED_QUOTA,
            ingress_controller: Default::default(),
        };
        flags.apply(&mut spec);
        (name_or_file.to_string(), spec)
    };

    validate_name(&name)?;
    fill_defaults(&name, &mut spec);
    Ok(Framework::new(&name, spec))
}

pub async fn add(name_or_file: &str, flags: &FrameworkFlags) -> Result<()> {
    let framework = framework_from_args(name_or_file, flags)?;
    let client = cluster::connect().await?;
    cluster::frameworks(&client)
        .create(&PostParams::default(), &framework)
        .await?;
    println!("Successfully added!");
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FrameworkRow {
    name: String,
    status: &'static str,
    namespace: String,
    ingress_type: String,
    ingress_class_name: String,
    cluster_issuer: String,
    apps: String,
}

impl FrameworkRow {
    fn new(framework: &Framework) -> Self {
        let ingress = &framework.spec.ingress_controller;
        let limit = match framework.spec.app_quota_limit {
            UNLIMITED_QUOTA => "unlimited".to_string(),
            limit => limit.to_string(),
        };
        Self {
            name: framework.name_any(),
            status: if framework.bound_namespace().is_some() {
                "Created"
            } else {
                "Pending"
            },
            namespace: framework.spec.namespace_name.clone(),
            ingress_type: ingress.ingress_type.to_string(),
            ingress_class_name: ingress.class_name.clone().unwrap_or_default(),
            cluster_issuer: ingress.cluster_issuer.clone().unwrap_or_default(),
            apps: format!("{}/{}", framework.apps().len(), limit),
        }
    }
}

pub async fn list(output: Option<OutputFormat>) -> Result<()> {
    let client = cluster::connect().await?;
    let frameworks = cluster::frameworks(&client).list(&ListParams::default()).await?;
    let rows: Vec<FrameworkRow> = frameworks.items.iter().map(FrameworkRow::new).collect();

    if let Some(format) = output {
        return print_structured(format, &rows);
    }
    if rows.is_empty() {
        println!("No frameworks found");
        return Ok(());
    }

    let mut table = Table::new([
        "NAME",
        "STATUS",
        "NAMESPACE",
        "INGRESS TYPE",
        "INGRESS CLASS NAME",
        "CLUSTER ISSUER",
        "APPS",
    ]);
    for row in rows {
        table.row([
            row.name,
            row.status.to_string(),
            row.namespace,
            row.ingress_type,
            row.ingress_class_name,
            row.cluster_issuer,
            row.apps,
        ]);
    }
    table.print();
    Ok(())
}

pub async fn update(name: &str, flags: &FrameworkFlags) -> Result<()> {
    if flags.is_empty() {
        return Err(CliError::usage_with_help(
            "nothing to update",
            "pass at least one of --namespace, --app-quota-limit or an ingress flag",
        ));
    }
    let client = cluster::connect().await?;
    let mut framework = cluster::get_framework(&client, name).await?;
    flags.apply(&mut framework.spec);
    fill_defaults(name, &mut framework.spec);
    cluster::replace_framework(&client, &framework).await?;
    println!(
        "{} Successfully updated framework {}",
        style("✓").green().bold(),
        style(name).cyan()
    );
    Ok(())
}

/// Spec as accepted back by `framework add <file>`
pub fn export_yaml(framework: &Framework) -> Result<String> {
    let mut spec = framework.spec.clone();
    spec.name = Some(framework.name_any());
    Ok(serde_yaml::to_string(&spec)?)
}

pub async fn export(name: &str, file: Option<&Path>) -> Result<()> {
    let client = cluster::connect().await?;
    let framework = cluster::get_framework(&client, name).await?;
    let yaml = export_yaml(&framework)?;
    match file {
        Some(path) => {
            std::fs::write(path, yaml)?;
            println!(
                "{} Framework {} exported to {}",
                style("✓").green().bold(),
                style(name).cyan(),
                path.display()
            );
        }
        None => print!("{}", yaml),
    }
    Ok(())
}

pub async fn remove(name: &str) -> Result<()> {
    let client = cluster::connect().await?;
    let framework = cluster::get_framework(&client, name).await?;
    if !framework.apps().is_empty() {
        return Err(CliError::validation_with_help(
            format!("framework \"{}\" still has apps", name),
            format!("remove these apps first: {}", framework.apps().join(", ")),
        ));
    }
    cluster::delete_framework(&client, name).await?;
    println!("Framework successfully removed!");
    Ok(())
}
