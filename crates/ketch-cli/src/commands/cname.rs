//! Cname commands - add or remove custom app addresses

use console::style;

use crate::cluster;
use crate::error::{CliError, Result};

pub async fn add(app_name: &str, cname: &str) -> Result<()> {
    let client = cluster::connect().await?;
    let mut app = cluster::get_app(&client, app_name).await?;
    if !app.add_cname(cname) {
        return Err(CliError::validation(format!(
            "cname {} is already assigned to app {}",
            cname, app_name
        )));
    }
    cluster::replace_app(&client, &app).await?;
    println!(
        "{} Successfully added cname {}",
        style("✓").green().bold(),
        style(cname).cyan()
    );
    Ok(())
}

pub async fn remove(app_name: &str, cname: &str) -> Result<()> {
    let client = cluster::connect().await?;
    let mut app = cluster::get_app(&client, app_name).await?;
    if !app.remove_cname(cname) {
        return Err(CliError::not_found("cname", cname));
    }
    cluster::replace_app(&client, &app).await?;
    println!(
        "{} Successfully removed cname {}",
        style("✓").green().bold(),
        style(cname).cyan()
    );
    Ok(())
}
