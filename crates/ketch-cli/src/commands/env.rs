//! Env commands - manage the environment variables of an app

use console::style;
use ketch_core::api::Env;

use crate::cluster;
use crate::error::{CliError, Result};
use crate::output::{OutputFormat, print_structured};

/// Parse `NAME=VALUE` arguments
pub fn parse_envs(raw: &[String]) -> Result<Vec<Env>> {
    if raw.is_empty() {
        return Err(CliError::usage("at least one NAME=VALUE pair is required"));
    }
    raw.iter()
        .map(|r| Env::parse(r).map_err(CliError::from))
        .collect()
}

pub async fn set(app_name: &str, raw: &[String]) -> Result<()> {
    let envs = parse_envs(raw)?;
    let client = cluster::connect().await?;
    let mut app = cluster::get_app(&client, app_name).await?;
    app.set_envs(envs);
    cluster::replace_app(&client, &app).await?;
    println!("{} Successfully set environment variables", style("✓").green().bold());
    Ok(())
}

/// Print the requested variables, every variable when `names` is empty
pub async fn get(app_name: &str, names: &[String], output: Option<OutputFormat>) -> Result<()> {
    let client = cluster::connect().await?;
    let app = cluster::get_app(&client, app_name).await?;
    let envs = app.envs(names);

    match output {
        Some(format) => print_structured(format, &envs),
        None => {
            for (name, value) in envs {
                println!("{}={}", name, value);
            }
            Ok(())
        }
    }
}

pub async fn unset(app_name: &str, names: &[String]) -> Result<()> {
    if names.is_empty() {
        return Err(CliError::usage("at least one variable name is required"));
    }
    let client = cluster::connect().await?;
    let mut app = cluster::get_app(&client, app_name).await?;
    app.unset_envs(names);
    cluster::replace_app(&client, &app).await?;
    println!("{} Successfully unset environment variables", style("✓").green().bold());
    Ok(())
}
