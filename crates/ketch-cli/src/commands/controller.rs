//! Controller command - run the Application and Framework controllers

use ketch_kube::{StorageConfig, crds_yaml, install_crds};
use tracing::info;

use crate::cluster;
use crate::error::Result;

pub async fn run(print_crds: bool, install: bool, max_history: u32) -> Result<()> {
    if print_crds {
        print!("{}", crds_yaml()?);
        return Ok(());
    }

    let client = cluster::connect().await?;
    if install {
        install_crds(&client).await?;
    }

    let storage = StorageConfig {
        max_history,
        ..Default::default()
    };
    info!(max_history, "starting controller");
    ketch_kube::run(client, storage).await?;
    Ok(())
}
