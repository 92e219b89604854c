//! Ketch CLI - manage your applications and your cloud resources

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod cluster;
mod commands;
mod error;
mod exit_codes;
mod output;

use commands::app::{DeployArgs, SelectorArgs};
use commands::framework::FrameworkFlags;
use commands::unit::UnitChange;
use error::Result;
use output::OutputFormat;

#[derive(Parser)]
#[command(name = "ketch")]
#[command(author = "Ketch Contributors")]
#[command(version)]
#[command(about = "Manage your applications and your cloud resources", long_about = "For details see https://theketch.io")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Print read commands as json or yaml
    #[arg(long, global = true, value_enum)]
    output: Option<OutputFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage applications
    App {
        #[command(subcommand)]
        command: AppCommands,
    },

    /// Manage frameworks
    #[command(alias = "pool")]
    Framework {
        #[command(subcommand)]
        command: FrameworkCommands,
    },

    /// Manage an app's units
    Unit {
        #[command(subcommand)]
        command: UnitCommands,
    },

    /// Manage an app's environment variables
    Env {
        #[command(subcommand)]
        command: EnvCommands,
    },

    /// Manage cnames of an app
    Cname {
        #[command(subcommand)]
        command: CnameCommands,
    },

    /// Manage buildpack builders
    Builder {
        #[command(subcommand)]
        command: BuilderCommands,
    },

    /// Render or apply Application and Component resources
    Application {
        #[command(subcommand)]
        command: ApplicationCommands,
    },

    /// Run the Application and Framework controllers
    Controller {
        /// Print the CustomResourceDefinitions and exit
        #[arg(long)]
        print_crds: bool,

        /// Apply the CustomResourceDefinitions before starting
        #[arg(long, env = "KETCH_INSTALL_CRDS")]
        install_crds: bool,

        /// Revisions kept per application release
        #[arg(long, env = "KETCH_MAX_HISTORY", default_value_t = 10)]
        max_history: u32,
    },
}

#[derive(Subcommand)]
enum AppCommands {
    /// Deploy an app from an image
    Deploy(DeployArgs),

    /// Show information about a specific app
    Info {
        /// App name
        name: String,
    },

    /// List all apps
    List,

    /// Stop an app, or one of its processes
    Stop {
        name: String,
        #[command(flatten)]
        selector: SelectorArgs,
    },

    /// Start an app, or one of its processes
    Start {
        name: String,
        #[command(flatten)]
        selector: SelectorArgs,
    },

    /// Remove an app
    Remove { name: String },
}

#[derive(Subcommand)]
enum FrameworkCommands {
    /// Add a framework from flags or from a YAML file
    Add {
        /// Framework name, or path to a framework YAML file
        name: String,
        #[command(flatten)]
        flags: FrameworkFlags,
    },

    /// List all frameworks
    List,

    /// Update a framework
    Update {
        name: String,
        #[command(flatten)]
        flags: FrameworkFlags,
    },

    /// Export a framework as YAML
    Export {
        name: String,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Remove a framework without apps
    Remove { name: String },
}

#[derive(Subcommand)]
enum UnitCommands {
    /// Add units to an app's processes
    Add {
        units: i32,
        #[arg(short, long)]
        app: String,
        #[command(flatten)]
        selector: SelectorArgs,
    },

    /// Remove units from an app's processes
    Remove {
        units: i32,
        #[arg(short, long)]
        app: String,
        #[command(flatten)]
        selector: SelectorArgs,
    },

    /// Set the units of an app's processes
    Set {
        units: i32,
        #[arg(short, long)]
        app: String,
        #[command(flatten)]
        selector: SelectorArgs,
    },
}

#[derive(Subcommand)]
enum EnvCommands {
    /// Set environment variables (NAME=VALUE)
    Set {
        envs: Vec<String>,
        #[arg(short, long)]
        app: String,
    },

    /// Retrieve environment variables, all of them when no name is given
    Get {
        names: Vec<String>,
        #[arg(short, long)]
        app: String,
    },

    /// Unset environment variables
    Unset {
        names: Vec<String>,
        #[arg(short, long)]
        app: String,
    },
}

#[derive(Subcommand)]
enum CnameCommands {
    /// Add a cname to an app
    Add {
        cname: String,
        #[arg(short, long)]
        app: String,
    },

    /// Remove a cname from an app
    Remove {
        cname: String,
        #[arg(short, long)]
        app: String,
    },
}

#[derive(Subcommand)]
enum BuilderCommands {
    /// List the builders available to `app deploy`
    List,
}

#[derive(Subcommand)]
enum ApplicationCommands {
    /// Render the chart of an Application without a cluster
    Template {
        /// Files holding the Application and its Components
        #[arg(short = 'f', long = "file", required = true)]
        files: Vec<PathBuf>,
    },

    /// Server-side apply Applications and Components
    Apply {
        #[arg(short = 'f', long = "file", required = true)]
        files: Vec<PathBuf>,
    },
}

fn init_tracing(debug: bool, controller: bool) {
    let default = match (debug, controller) {
        (true, _) => "debug",
        (false, true) => "info",
        (false, false) => "warn",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let output = cli.output;
    match cli.command {
        Commands::App { command } => match command {
            AppCommands::Deploy(args) => commands::app::deploy(&args).await,
            AppCommands::Info { name } => commands::app::info(&name, output).await,
            AppCommands::List => commands::app::list(output).await,
            AppCommands::Stop { name, selector } => commands::app::stop(&name, &selector).await,
            AppCommands::Start { name, selector } => commands::app::start(&name, &selector).await,
            AppCommands::Remove { name } => commands::app::remove(&name).await,
        },

        Commands::Framework { command } => match command {
            FrameworkCommands::Add { name, flags } => commands::framework::add(&name, &flags).await,
            FrameworkCommands::List => commands::framework::list(output).await,
            FrameworkCommands::Update { name, flags } => {
                commands::framework::update(&name, &flags).await
            }
            FrameworkCommands::Export { name, file } => {
                commands::framework::export(&name, file.as_deref()).await
            }
            FrameworkCommands::Remove { name } => commands::framework::remove(&name).await,
        },

        Commands::Unit { command } => {
            let (app, change, selector) = match command {
                UnitCommands::Add { units, app, selector } => (app, UnitChange::Add(units), selector),
                UnitCommands::Remove { units, app, selector } => {
                    (app, UnitChange::Remove(units), selector)
                }
                UnitCommands::Set { units, app, selector } => (app, UnitChange::Set(units), selector),
            };
            commands::unit::run(&app, change, &selector).await
        }

        Commands::Env { command } => match command {
            EnvCommands::Set { envs, app } => commands::env::set(&app, &envs).await,
            EnvCommands::Get { names, app } => commands::env::get(&app, &names, output).await,
            EnvCommands::Unset { names, app } => commands::env::unset(&app, &names).await,
        },

        Commands::Cname { command } => match command {
            CnameCommands::Add { cname, app } => commands::cname::add(&app, &cname).await,
            CnameCommands::Remove { cname, app } => commands::cname::remove(&app, &cname).await,
        },

        Commands::Builder { command } => match command {
            BuilderCommands::List => commands::builder::list(output),
        },

        Commands::Application { command } => match command {
            ApplicationCommands::Template { files } => {
                commands::application::template(&files, output)
            }
            ApplicationCommands::Apply { files } => commands::application::apply(&files).await,
        },

        Commands::Controller {
            print_crds,
            install_crds,
            max_history,
        } => commands::controller::run(print_crds, install_crds, max_history).await,
    }
}

#[tokio::main]
async fn main() {
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(cli.debug, matches!(cli.command, Commands::Controller { .. }));

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}
