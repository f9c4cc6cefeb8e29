use anyhow::Result;
use clap::{Parser, Subcommand};
use reqwest::Client;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod cli;
mod config;
mod connect;
mod gcp;
mod kubeconfig;

use api::ApiClient;
use cli::config_cmd::{handle_config_command, ConfigCommands};
use connect::prompt::TerminalPrompter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Control-plane host URL (overrides the configured host)
    #[arg(long, global = true)]
    host: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Connect clusters to the selected project
    #[command(subcommand)]
    Connect(ConnectCommands),
    /// Project management commands
    #[command(subcommand)]
    #[command(visible_alias = "p")]
    Project(ProjectCommands),
    /// Local configuration commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
enum ConnectCommands {
    /// Connect the clusters of a local kubeconfig
    Kubeconfig {
        /// Path to the kubeconfig (defaults to $KUBECONFIG or ~/.kube/config)
        #[arg(long)]
        kubeconfig: Option<PathBuf>,
        /// Context to connect (can be specified multiple times, defaults to the current context)
        #[arg(long = "context")]
        contexts: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
enum ProjectCommands {
    /// Create a new project and select it
    #[command(visible_alias = "c")]
    #[command(visible_alias = "new")]
    Create {
        /// Project name
        name: String,
    },
    /// Delete a project
    #[command(visible_alias = "del")]
    #[command(visible_alias = "rm")]
    Delete {
        /// Project ID
        id: u64,
    },
    /// List the projects of the logged in user
    #[command(visible_alias = "ls")]
    #[command(visible_alias = "l")]
    List {},
    /// Select the project used by other commands
    Set {
        /// Project ID
        id: u64,
    },
    /// List the clusters connected to the selected project
    Clusters {},
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let http_client = Client::new();
    let mut config = config::Config::load()?;
    let host = cli.host.clone().unwrap_or_else(|| config.get_host());

    match &cli.command {
        Commands::Connect(ConnectCommands::Kubeconfig {
            kubeconfig,
            contexts,
        }) => {
            cli::connect::connect_kubeconfig(
                &http_client,
                &host,
                &config,
                kubeconfig.clone(),
                contexts.clone(),
            )
            .await?;
        }
        Commands::Project(project_cmd) => {
            let api = ApiClient::new(http_client.clone(), &host, config.token.clone());
            match project_cmd {
                ProjectCommands::Create { name } => {
                    cli::project::create_project(&api, &mut config, name).await?;
                }
                ProjectCommands::Delete { id } => {
                    cli::project::delete_project(&api, &TerminalPrompter, *id).await?;
                }
                ProjectCommands::List {} => {
                    cli::project::list_projects(&api, &config).await?;
                }
                ProjectCommands::Set { id } => {
                    cli::project::set_project(&mut config, *id)?;
                }
                ProjectCommands::Clusters {} => {
                    cli::project::list_project_clusters(&api, &config).await?;
                }
            }
        }
        Commands::Config(config_cmd) => {
            handle_config_command(&mut config, config_cmd)?;
        }
    }

    Ok(())
}
