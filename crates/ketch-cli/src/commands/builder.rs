//! Builder command - list buildpack builders

use ketch_core::{Builder, KetchConfig, builders};

use crate::error::Result;
use crate::output::{OutputFormat, Table, print_structured};

fn builder_table(builders: &[Builder]) -> Table {
    let mut table = Table::new(["VENDOR", "IMAGE", "DESCRIPTION"]);
    for builder in builders {
        table.row([
            format!("{}:", builder.vendor),
            builder.image.clone(),
            builder.description.clone(),
        ]);
    }
    table
}

/// List the built-in builders followed by the ones from `config.toml`
pub fn list(output: Option<OutputFormat>) -> Result<()> {
    let config = KetchConfig::load_default()?;
    let builders = builders(&config);

    match output {
        Some(format) => print_structured(format, &builders),
        None => {
            builder_table(&builders).print();
            Ok(())
        }
    }
}
