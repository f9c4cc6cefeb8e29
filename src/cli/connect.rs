use anyhow::Result;
use reqwest::Client;
use std::path::PathBuf;

use crate::api::ApiClient;
use crate::config::Config;
use crate::connect::prompt::TerminalPrompter;
use crate::connect::resolver::ActionResolver;
use crate::connect::{Connector, KubeconfigSource};
use crate::gcp::GcloudAgent;

/// Connect the clusters of a local kubeconfig to the selected project
pub async fn connect_kubeconfig(
    http_client: &Client,
    host: &str,
    config: &Config,
    kubeconfig: Option<PathBuf>,
    contexts: Vec<String>,
) -> Result<()> {
    let api = ApiClient::new(http_client.clone(), host, config.token.clone());
    let agent = GcloudAgent::new(http_client.clone());
    let prompter = TerminalPrompter;

    let connector = Connector::new(&api, ActionResolver::new(&prompter, &agent));
    let source = KubeconfigSource {
        path: kubeconfig,
        contexts,
    };

    let accounts = connector.run(config.project, &source).await?;

    if accounts.is_empty() {
        println!("No clusters to connect were found in the kubeconfig.");
    }

    Ok(())
}
