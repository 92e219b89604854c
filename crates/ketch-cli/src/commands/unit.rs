//! Unit commands - scale the processes of an app

use console::style;
use ketch_core::App;

use crate::cluster;
use crate::commands::app::SelectorArgs;
use crate::error::{CliError, Result};

/// How a units command changes the selected processes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitChange {
    Add(i32),
    Remove(i32),
    Set(i32),
}

impl UnitChange {
    pub fn apply(self, app: &mut App, selector: &SelectorArgs) -> Result<()> {
        let selector = selector.selector();
        match self {
            UnitChange::Add(n) => app.add_units(&selector, n)?,
            UnitChange::Remove(n) => app.add_units(&selector, -n)?,
            UnitChange::Set(n) => app.set_units(&selector, n)?,
        }
        Ok(())
    }

    fn units(self) -> i32 {
        match self {
            UnitChange::Add(n) | UnitChange::Remove(n) | UnitChange::Set(n) => n,
        }
    }
}

pub async fn run(app_name: &str, change: UnitChange, selector: &SelectorArgs) -> Result<()> {
    if change.units() < 0 {
        return Err(CliError::validation("units must be a non-negative number"));
    }
    let client = cluster::connect().await?;
    let mut app = cluster::get_app(&client, app_name).await?;
    change.apply(&mut app, selector)?;
    cluster::replace_app(&client, &app).await?;
    println!(
        "{} Successfully updated units of {}",
        style("✓").green().bold(),
        style(app_name).cyan()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ketch_core::api::{AppSpec, ProcessSpec};

    fn app() -> App {
        let mut app = App::new("dashboard", AppSpec::default());
        app.deploy_image(
            "img",
            vec![
                ProcessSpec {
                    name: "web".to_string(),
                    units: Some(2),
                    ..Default::default()
                },
                ProcessSpec {
                    name: "worker".to_string(),
                    units: Some(1),
                    ..Default::default()
                },
            ],
        );
        app
    }

    fn units(app: &App) -> Vec<Option<i32>> {
        app.spec.deployments[0].processes.iter().map(|p| p.units).collect()
    }

    #[test]
    fn test_add_and_remove_units() {
        let mut app = app();
        let web = SelectorArgs {
            process: Some("web".to_string()),
            version: None,
        };
        UnitChange::Add(3).apply(&mut app, &web).unwrap();
        assert_eq!(units(&app), vec![Some(5), Some(1)]);

        UnitChange::Remove(10).apply(&mut app, &SelectorArgs::default()).unwrap();
        assert_eq!(units(&app), vec![Some(0), Some(0)]);
    }

    #[test]
    fn test_set_units_for_version() {
        let mut app = app();
        let selector = SelectorArgs {
            process: None,
            version: Some(1),
        };
        UnitChange::Set(4).apply(&mut app, &selector).unwrap();
        assert_eq!(units(&app), vec![Some(4), Some(4)]);
    }

    #[test]
    fn test_unknown_process() {
        let mut app = app();
        let selector = SelectorArgs {
            process: Some("cron".to_string()),
            version: None,
        };
        assert!(UnitChange::Set(1).apply(&mut app, &selector).is_err());
    }
}
