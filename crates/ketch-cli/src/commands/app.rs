//! App commands - deploy, inspect, list, stop, start and remove apps

use clap::Args;
use console::style;
use ketch_core::api::{AppSpec, Env, ProcessSpec, UnitSelector};
use ketch_core::{App, AppDescriptor, Framework, validate_name};
use kube::ResourceExt;
use kube::api::{ListParams, PostParams};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::debug;

use crate::cluster;
use crate::error::{CliError, Result};
use crate::output::{OutputFormat, Table, print_structured};

/// Flags of `ketch app deploy`
#[derive(Args, Debug, Default, Clone)]
pub struct DeployArgs {
    /// App name (optional with --file)
    pub name: Option<String>,

    /// Image to deploy
    #[arg(short, long)]
    pub image: Option<String>,

    /// Application descriptor file
    #[arg(long = "file")]
    pub file: Option<PathBuf>,

    /// Framework to deploy the app into
    #[arg(short = 'k', long)]
    pub framework: Option<String>,

    /// App description
    #[arg(short, long)]
    pub description: Option<String>,

    /// Environment variables (NAME=VALUE)
    #[arg(short, long = "env")]
    pub envs: Vec<String>,

    /// Secret with docker credentials, in the framework namespace
    #[arg(long)]
    pub registry_secret: Option<String>,

    /// Builder recorded on the app for source builds
    #[arg(long)]
    pub builder: Option<String>,

    /// Buildpacks recorded on the app for source builds
    #[arg(long, value_delimiter = ',')]
    pub build_packs: Vec<String>,
}

/// Everything `app deploy` changes, merged from the descriptor and flags
///
/// Flags take precedence over the descriptor file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeployRequest {
    pub name: String,
    pub image: String,
    pub framework: Option<String>,
    pub description: Option<String>,
    pub envs: Vec<Env>,
    pub registry_secret: Option<String>,
    pub builder: Option<String>,
    pub build_packs: Vec<String>,
    pub processes: Vec<ProcessSpec>,
}

impl DeployRequest {
    pub fn from_args(args: &DeployArgs) -> Result<Self> {
        let descriptor = args.file.as_deref().map(AppDescriptor::from_file).transpose()?;

        let mut request = match &descriptor {
            Some(descriptor) => Self {
                name: descriptor.name.clone(),
                image: descriptor.image.clone().unwrap_or_default(),
                framework: descriptor.framework.clone(),
                description: descriptor.description.clone(),
                envs: descriptor.environment()?,
                registry_secret: descriptor.registry_secret.clone(),
                builder: descriptor.builder.clone(),
                build_packs: descriptor.build_packs.clone(),
                processes: descriptor.processes()?,
            },
            None => Self::default(),
        };

        if let Some(name) = &args.name {
            request.name = name.clone();
        }
        if let Some(image) = &args.image {
            request.image = image.clone();
        }
        if args.framework.is_some() {
            request.framework = args.framework.clone();
        }
        if args.description.is_some() {
            request.description = args.description.clone();
        }
        if args.registry_secret.is_some() {
            request.registry_secret = args.registry_secret.clone();
        }
        if args.builder.is_some() {
            request.builder = args.builder.clone();
        }
        if !args.build_packs.is_empty() {
            request.build_packs = args.build_packs.clone();
        }
        for raw in &args.envs {
            request.envs.push(Env::parse(raw)?);
        }

        if request.name.is_empty() {
            return Err(CliError::usage("an app name is required"));
        }
        validate_name(&request.name)?;
        if request.image.is_empty() {
            return Err(CliError::usage_with_help(
                "an image is required",
                "pass --image or set `image` in the app file",
            ));
        }
        Ok(request)
    }

    /// New App for a first deployment
    pub fn new_app(&self) -> Result<App> {
        let framework = self.framework.clone().ok_or_else(|| {
            CliError::usage_with_help(
                format!("app \"{}\" does not exist yet, a framework is required", self.name),
                "pass --framework",
            )
        })?;
        let mut app = App::new(
            &self.name,
            AppSpec {
                framework,
                ..Default::default()
            },
        );
        app.spec.ingress.generate_default_cname = true;
        self.apply(&mut app);
        Ok(app)
    }

    /// Update an App and roll out the image, returns the new deployment version
    pub fn apply(&self, app: &mut App) -> u32 {
        if let Some(framework) = &self.framework {
            app.spec.framework = framework.clone();
        }
        if self.description.is_some() {
            app.spec.description = self.description.clone();
        }
        if self.registry_secret.is_some() {
            app.spec.docker_registry.secret_name = self.registry_secret.clone();
        }
        if self.builder.is_some() {
            app.spec.builder = self.builder.clone();
        }
        if !self.build_packs.is_empty() {
            app.spec.build_packs = self.build_packs.clone();
        }
        app.set_envs(self.envs.clone());
        app.deploy_image(&self.image, self.processes.clone())
    }
}

pub async fn deploy(args: &DeployArgs) -> Result<()> {
    let request = DeployRequest::from_args(args)?;
    let client = cluster::connect().await?;

    let existing = cluster::apps(&client).get_opt(&request.name).await?;
    let framework_name = request
        .framework
        .clone()
        .or_else(|| existing.as_ref().map(|app| app.spec.framework.clone()));
    if let Some(framework) = &framework_name {
        cluster::get_framework(&client, framework).await?;
    }

    let version = match existing {
        Some(mut app) => {
            let version = request.apply(&mut app);
            debug!(app = %request.name, version, "updating existing app");
            cluster::replace_app(&client, &app).await?;
            version
        }
        None => {
            let app = request.new_app()?;
            debug!(app = %request.name, "creating app");
            cluster::apps(&client).create(&PostParams::default(), &app).await?;
            app.spec.deployments_count
        }
    };

    println!(
        "{} Successfully deployed {} (version {})",
        style("✓").green().bold(),
        style(&request.name).cyan(),
        version
    );
    Ok(())
}

/// One process of one deployment, as shown by `app info`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRow {
    pub deployment_version: String,
    pub image: String,
    pub process_name: String,
    pub weight: String,
    pub state: String,
    pub cmd: String,
}

fn process_state(units: Option<i32>) -> String {
    match units.unwrap_or(0) {
        0 => "stopped".to_string(),
        1 => "1 unit".to_string(),
        n => format!("{} units", n),
    }
}

fn deployment_rows(app: &App) -> Vec<DeploymentRow> {
    app.spec
        .deployments
        .iter()
        .flat_map(|deployment| {
            deployment.processes.iter().map(move |process| DeploymentRow {
                deployment_version: deployment.version.to_string(),
                image: deployment.image.clone(),
                process_name: process.name.clone(),
                weight: format!("{}%", deployment.routing_settings.weight),
                state: process_state(process.units),
                cmd: process.cmd.join(" "),
            })
        })
        .collect()
}

/// Structured form of `app info`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AppInfo<'a> {
    name: String,
    spec: &'a AppSpec,
    cnames: Vec<String>,
    deployments: Vec<DeploymentRow>,
}

/// Human-readable `app info` text
pub fn render_info(app: &App, framework: Option<&Framework>) -> String {
    let mut out = String::new();
    let mut line = |text: String| {
        out.push_str(&text);
        out.push('\n');
    };

    line(format!("Application: {}", app.name_any()));
    line(format!("Framework: {}", app.spec.framework));
    if let Some(builder) = app.spec.builder.as_deref().filter(|b| !b.is_empty()) {
        line(format!("Builder: {}", builder));
    }
    if let Some(description) = app.spec.description.as_deref().filter(|d| !d.is_empty()) {
        line(format!("Description: {}", description));
    }

    let cnames = app.cnames(framework);
    if cnames.is_empty() {
        line(format!(
            "The default cname hasn't assigned yet because \"{}\" framework doesn't have ingress service endpoint.",
            app.spec.framework
        ));
    }
    for cname in cnames {
        line(format!("Address: {}", cname));
    }

    if let Some(secret) = app.spec.docker_registry.secret_name.as_deref().filter(|s| !s.is_empty()) {
        line(format!("Secret name to pull application's images: {}", secret));
    }

    line(String::new());
    if app.spec.env.is_empty() {
        line("No environment variables.".to_string());
    } else {
        line("Environment variables:".to_string());
        for env in &app.spec.env {
            line(format!("{}={}", env.name, env.value));
        }
    }

    line(String::new());
    let rows = deployment_rows(app);
    if rows.is_empty() {
        line("No processes.".to_string());
    } else {
        let mut table = Table::new([
            "DEPLOYMENT VERSION",
            "IMAGE",
            "PROCESS NAME",
            "WEIGHT",
            "STATE",
            "CMD",
        ]);
        for row in rows {
            table.row([
                row.deployment_version,
                row.image,
                row.process_name,
                row.weight,
                row.state,
                row.cmd,
            ]);
        }
        out.push_str(&table.render());
    }
    out
}

pub async fn info(name: &str, output: Option<OutputFormat>) -> Result<()> {
    let client = cluster::connect().await?;
    let app = cluster::get_app(&client, name).await?;
    let framework = cluster::frameworks(&client).get_opt(&app.spec.framework).await?;

    match output {
        Some(format) => print_structured(
            format,
            &AppInfo {
                name: app.name_any(),
                spec: &app.spec,
                cnames: app.cnames(framework.as_ref()),
                deployments: deployment_rows(&app),
            },
        ),
        None => {
            print!("{}", render_info(&app, framework.as_ref()));
            Ok(())
        }
    }
}

/// Summary state of an app across its processes
fn app_state(app: &App) -> &'static str {
    let mut processes = app.spec.deployments.iter().flat_map(|d| d.processes.iter()).peekable();
    if processes.peek().is_none() {
        return "created";
    }
    if processes.any(|p| p.units.unwrap_or(0) > 0) {
        "running"
    } else {
        "stopped"
    }
}

#[derive(Debug, Serialize)]
struct AppRow {
    name: String,
    framework: String,
    state: &'static str,
    addresses: Vec<String>,
    description: String,
}

pub async fn list(output: Option<OutputFormat>) -> Result<()> {
    let client = cluster::connect().await?;
    let apps = cluster::apps(&client).list(&ListParams::default()).await?;
    let frameworks: BTreeMap<String, Framework> = cluster::frameworks(&client)
        .list(&ListParams::default())
        .await?
        .items
        .into_iter()
        .map(|f| (f.name_any(), f))
        .collect();

    let rows: Vec<AppRow> = apps
        .items
        .iter()
        .map(|app| AppRow {
            name: app.name_any(),
            framework: app.spec.framework.clone(),
            state: app_state(app),
            addresses: app.cnames(frameworks.get(&app.spec.framework)),
            description: app.spec.description.clone().unwrap_or_default(),
        })
        .collect();

    if let Some(format) = output {
        return print_structured(format, &rows);
    }
    if rows.is_empty() {
        println!("No apps found");
        return Ok(());
    }

    let mut table = Table::new(["NAME", "FRAMEWORK", "STATE", "ADDRESSES", "DESCRIPTION"]);
    for row in rows {
        table.row([
            row.name,
            row.framework,
            row.state.to_string(),
            row.addresses.join(" "),
            row.description,
        ]);
    }
    table.print();
    Ok(())
}

/// Restrict a units operation to one process and/or deployment version
#[derive(Args, Debug, Default, Clone)]
pub struct SelectorArgs {
    /// Process name
    #[arg(short, long)]
    pub process: Option<String>,

    /// Deployment version
    #[arg(short = 'v', long = "deployment-version")]
    pub version: Option<u32>,
}

impl SelectorArgs {
    pub fn selector(&self) -> UnitSelector {
        UnitSelector {
            process: self.process.clone(),
            version: self.version,
        }
    }
}

pub async fn stop(name: &str, selector: &SelectorArgs) -> Result<()> {
    let client = cluster::connect().await?;
    let mut app = cluster::get_app(&client, name).await?;
    app.stop(&selector.selector())?;
    cluster::replace_app(&client, &app).await?;
    println!("{} Successfully stopped!", style("✓").green().bold());
    Ok(())
}

pub async fn start(name: &str, selector: &SelectorArgs) -> Result<()> {
    let client = cluster::connect().await?;
    let mut app = cluster::get_app(&client, name).await?;
    app.start(&selector.selector())?;
    cluster::replace_app(&client, &app).await?;
    println!("{} Successfully started!", style("✓").green().bold());
    Ok(())
}

pub async fn remove(name: &str) -> Result<()> {
    let client = cluster::connect().await?;
    cluster::delete_app(&client, name).await?;
    println!(
        "{} Successfully removed app {}",
        style("✓").green().bold(),
        style(name).cyan()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ketch_core::api::{FrameworkSpec, IngressControllerSpec};
    use std::io::Write;

    fn deploy_args(name: &str, image: &str) -> DeployArgs {
        DeployArgs {
            name: Some(name.to_string()),
            image: Some(image.to_string()),
            framework: Some("working-pool".to_string()),
            ..Default::default()
        }
    }

    fn framework_with_endpoint(endpoint: Option<&str>) -> Framework {
        Framework::new(
            "working-pool",
            FrameworkSpec {
                name: None,
                namespace_name: "ketch-working-pool".to_string(),
                app_quota_limit: -1,
                ingress_controller: IngressControllerSpec {
                    service_endpoint: endpoint.map(str::to_string),
                    ..Default::default()
                },
            },
        )
    }

    #[test]
    fn test_deploy_request_requires_image() {
        let args = DeployArgs {
            name: Some("dashboard".to_string()),
            ..Default::default()
        };
        let err = DeployRequest::from_args(&args).unwrap_err();
        assert_eq!(err.to_string(), "an image is required");
    }

    #[test]
    fn test_deploy_request_requires_name() {
        let err = DeployRequest::from_args(&DeployArgs::default()).unwrap_err();
        assert_eq!(err.to_string(), "an app name is required");
    }

    #[test]
    fn test_new_app_gets_single_web_process() {
        let request = DeployRequest::from_args(&deploy_args("dashboard", "shipasoftware/go-app:v1")).unwrap();
        let app = request.new_app().unwrap();

        assert_eq!(app.spec.framework, "working-pool");
        assert!(app.spec.ingress.generate_default_cname);
        assert_eq!(app.spec.deployments.len(), 1);
        let deployment = &app.spec.deployments[0];
        assert_eq!(deployment.version, 1);
        assert_eq!(deployment.routing_settings.weight, 100);
        assert_eq!(deployment.processes[0].name, "web");
        assert_eq!(deployment.processes[0].units, Some(1));
    }

    #[test]
    fn test_new_app_requires_framework() {
        let mut args = deploy_args("dashboard", "img");
        args.framework = None;
        let request = DeployRequest::from_args(&args).unwrap();
        assert!(request.new_app().is_err());
    }

    #[test]
    fn test_redeploy_bumps_version_and_merges_env() {
        let mut args = deploy_args("dashboard", "img:v1");
        args.envs = vec!["PORT=8080".to_string()];
        let mut app = DeployRequest::from_args(&args).unwrap().new_app().unwrap();

        let mut args = deploy_args("dashboard", "img:v2");
        args.framework = None;
        args.envs = vec!["PORT=9090".to_string(), "DEBUG=1".to_string()];
        let version = DeployRequest::from_args(&args).unwrap().apply(&mut app);

        assert_eq!(version, 2);
        assert_eq!(app.spec.framework, "working-pool");
        assert_eq!(app.spec.deployments[0].image, "img:v2");
        assert_eq!(app.envs(&[])["PORT"], "9090");
        assert_eq!(app.envs(&[])["DEBUG"], "1");
    }

    #[test]
    fn test_deploy_from_descriptor_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(
            b"name: test\nimage: gcr.io/sample-go-app:latest\nframework: myframework\nenvironment:\n  - PORT=6666\nprocesses:\n  - name: web\n    cmd: python app.py\n    units: 2\n",
        )
        .unwrap();
        let args = DeployArgs {
            file: Some(file.path().to_path_buf()),
            description: Some("from flags".to_string()),
            ..Default::default()
        };

        let request = DeployRequest::from_args(&args).unwrap();
        assert_eq!(request.name, "test");
        assert_eq!(request.framework.as_deref(), Some("myframework"));
        assert_eq!(request.description.as_deref(), Some("from flags"));

        let app = request.new_app().unwrap();
        let process = &app.spec.deployments[0].processes[0];
        assert_eq!(process.cmd, vec!["python".to_string(), "app.py".to_string()]);
        assert_eq!(process.units, Some(2));
        assert_eq!(app.envs(&[])["PORT"], "6666");
    }

    #[test]
    fn test_flags_override_descriptor() {
        let args = DeployArgs {
            file: Some(PathBuf::from(concat!(
                env!("CARGO_MANIFEST_DIR"),
                "/../../fixtures/app.yaml"
            ))),
            image: Some("gcr.io/sample-go-app:v2".to_string()),
            framework: Some("other-pool".to_string()),
            ..Default::default()
        };

        let request = DeployRequest::from_args(&args).unwrap();
        assert_eq!(request.name, "sample");
        assert_eq!(request.image, "gcr.io/sample-go-app:v2");
        assert_eq!(request.framework.as_deref(), Some("other-pool"));
        assert_eq!(request.description.as_deref(), Some("sample go app"));
        assert_eq!(request.processes[0].cmd, vec!["/app/server".to_string()]);
    }

    #[test]
    fn test_info_without_endpoint_or_processes() {
        let app = App::new(
            "dashboard",
            AppSpec {
                framework: "working-pool".to_string(),
                ingress: ketch_core::api::IngressSpec {
                    generate_default_cname: true,
                    cnames: vec![],
                },
                ..Default::default()
            },
        );
        let framework = framework_with_endpoint(None);

        assert_eq!(
            render_info(&app, Some(&framework)),
            "Application: dashboard\n\
             Framework: working-pool\n\
             The default cname hasn't assigned yet because \"working-pool\" framework doesn't have ingress service endpoint.\n\
             \n\
             No environment variables.\n\
             \n\
             No processes.\n"
        );
    }

    #[test]
    fn test_info_with_deployment() {
        let mut app = App::new(
            "dashboard",
            AppSpec {
                framework: "working-pool".to_string(),
                description: Some("main dashboard".to_string()),
                ..Default::default()
            },
        );
        app.spec.ingress.generate_default_cname = true;
        app.spec.docker_registry.secret_name = Some("registry-creds".to_string());
        app.set_envs(vec![Env::new("PORT", "8080")]);
        app.add_cname("dashboard.example.com");
        app.deploy_image("shipasoftware/go-app:v1", vec![]);

        let info = render_info(&app, Some(&framework_with_endpoint(Some("10.10.10.10"))));

        assert!(info.contains("Description: main dashboard\n"));
        assert!(info.contains("Address: http://dashboard.10.10.10.10.shipa.cloud\n"));
        assert!(info.contains("Address: http://dashboard.example.com\n"));
        assert!(info.contains("Secret name to pull application's images: registry-creds\n"));
        assert!(info.contains("Environment variables:\nPORT=8080\n"));
        assert!(info.contains("DEPLOYMENT VERSION"));
        assert!(info.contains("shipasoftware/go-app:v1"));
        assert!(info.contains("100%"));
        assert!(info.contains("1 unit"));
    }

    #[test]
    fn test_app_state() {
        let mut app = App::new("dashboard", AppSpec::default());
        assert_eq!(app_state(&app), "created");
        app.deploy_image("img", vec![]);
        assert_eq!(app_state(&app), "running");
        app.stop(&UnitSelector::all()).unwrap();
        assert_eq!(app_state(&app), "stopped");
    }

    #[test]
    fn test_selector_args() {
        let args = SelectorArgs {
            process: Some("worker".to_string()),
            version: Some(2),
        };
        assert_eq!(args.selector(), UnitSelector::all().process("worker").version(2));
    }
}
