use anyhow::Result;

use crate::config::Config;

#[derive(Debug, Clone, clap::Subcommand)]
pub enum ConfigCommands {
    /// Set the control-plane host
    SetHost {
        /// Host URL (e.g., https://dashboard.example.com)
        host: String,
    },
    /// Set the API token sent with every request
    SetToken {
        token: String,
    },
    /// Print the current configuration
    Show,
}

pub fn handle_config_command(config: &mut Config, cmd: &ConfigCommands) -> Result<()> {
    match cmd {
        ConfigCommands::SetHost { host } => {
            config.host = Some(host.trim_end_matches('/').to_string());
            config.save()?;
            println!("Host set to {}", config.get_host());
        }
        ConfigCommands::SetToken { token } => {
            config.token = Some(token.clone());
            config.save()?;
            println!("Token saved");
        }
        ConfigCommands::Show => {
            println!("Host:    {}", config.get_host());
            if config.project == 0 {
                println!("Project: (none)");
            } else {
                println!("Project: {}", config.project);
            }
            println!(
                "Token:   {}",
                if config.get_token().is_some() { "set" } else { "(none)" }
            );
        }
    }

    Ok(())
}
