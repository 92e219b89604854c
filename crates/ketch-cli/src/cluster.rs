//! Access to Ketch resources from the CLI
//!
//! All resources are cluster-scoped; each mutating command issues a single
//! create, replace or delete call.

use ketch_core::{App, Framework};
use kube::api::{Api, DeleteParams, PostParams};
use kube::{Client, ResourceExt};
use tracing::debug;

use crate::error::{CliError, Result};

/// Client from the ambient kubeconfig or in-cluster configuration
pub async fn connect() -> Result<Client> {
    let client = Client::try_default().await?;
    debug!("connected to the API server");
    Ok(client)
}

pub fn apps(client: &Client) -> Api<App> {
    Api::all(client.clone())
}

pub fn frameworks(client: &Client) -> Api<Framework> {
    Api::all(client.clone())
}

pub async fn get_app(client: &Client, name: &str) -> Result<App> {
    apps(client)
        .get_opt(name)
        .await?
        .ok_or_else(|| CliError::not_found("app", name))
}

pub async fn get_framework(client: &Client, name: &str) -> Result<Framework> {
    frameworks(client)
        .get_opt(name)
        .await?
        .ok_or_else(|| CliError::not_found("framework", name))
}

/// Write back an App read earlier, guarded by its resourceVersion
pub async fn replace_app(client: &Client, app: &App) -> Result<App> {
    let name = app.name_any();
    debug!(app = %name, "replacing app");
    Ok(apps(client).replace(&name, &PostParams::default(), app).await?)
}

pub async fn replace_framework(client: &Client, framework: &Framework) -> Result<Framework> {
    let name = framework.name_any();
    debug!(framework = %name, "replacing framework");
    Ok(frameworks(client)
        .replace(&name, &PostParams::default(), framework)
        .await?)
}

pub async fn delete_app(client: &Client, name: &str) -> Result<()> {
    apps(client)
        .delete(name, &DeleteParams::default())
        .await
        .map_err(|e| match e {
            kube::Error::Api(resp) if resp.code == 404 => CliError::not_found("app", name),
            other => other.into(),
        })?;
    Ok(())
}

pub async fn delete_framework(client: &Client, name: &str) -> Result<()> {
    frameworks(client)
        .delete(name, &DeleteParams::default())
        .await
        .map_err(|e| match e {
            kube::Error::Api(resp) if resp.code == 404 => CliError::not_found("framework", name),
            other => other.into(),
        })?;
    Ok(())
}
