use anyhow::{Context, Result};
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Attribute, Cell, Color, Table};
use tracing::info;

use crate::api::models::{Cluster, Project};
use crate::api::ApiClient;
use crate::config::Config;
use crate::connect::prompt::{is_affirmative, Prompter};

/// Create a project and make it the selected one
pub async fn create_project(api: &ApiClient, config: &mut Config, name: &str) -> Result<()> {
    let project = api.create_project(name).await?;

    println!(
        "Created project with name {} and id {}",
        project.name, project.id
    );

    set_project(config, project.id)
}

/// Delete a project after confirmation
pub async fn delete_project(
    api: &ApiClient,
    prompter: &dyn Prompter,
    project_id: u64,
) -> Result<()> {
    let answer = prompter
        .prompt(&format!(
            "Are you sure you'd like to delete the project with id {}? [y/n] ",
            project_id
        ))
        .context("Failed to read confirmation")?;

    if !is_affirmative(&answer) {
        info!(project_id, "Project deletion cancelled");
        return Ok(());
    }

    let project = api.delete_project(project_id).await?;
    println!(
        "Deleted project with name {} and id {}",
        project.name, project.id
    );

    Ok(())
}

/// List the projects of the current user, marking the selected one
pub async fn list_projects(api: &ApiClient, config: &Config) -> Result<()> {
    let user = api.auth_check().await?;
    let projects = api.list_user_projects(user.id).await?;

    if projects.is_empty() {
        println!("No projects found.");
        return Ok(());
    }

    println!("{}", projects_table(&projects, config.project));
    Ok(())
}

fn projects_table(projects: &[Project], current: u64) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("ID").add_attribute(Attribute::Bold),
            Cell::new("NAME").add_attribute(Attribute::Bold),
        ]);

    for project in projects {
        if project.id == current {
            table.add_row(vec![
                Cell::new(project.id).fg(Color::Green),
                Cell::new(format!("{} (current project)", project.name)).fg(Color::Green),
            ]);
        } else {
            table.add_row(vec![Cell::new(project.id), Cell::new(&project.name)]);
        }
    }

    table
}

/// Select the project used by subsequent commands
pub fn set_project(config: &mut Config, project_id: u64) -> Result<()> {
    if project_id == 0 {
        anyhow::bail!("Project id must be a positive number");
    }

    config.project = project_id;
    config.save()?;

    println!("Selected project {}", project_id);
    Ok(())
}

/// List the clusters connected to the selected project
pub async fn list_project_clusters(api: &ApiClient, config: &Config) -> Result<()> {
    if config.project == 0 {
        anyhow::bail!("no project set, please run `kubeconnect project set [id]`");
    }

    let clusters = api.list_project_clusters(config.project).await?;

    if clusters.is_empty() {
        println!("No clusters connected to project {}.", config.project);
        return Ok(());
    }

    println!("{}", clusters_table(&clusters));
    Ok(())
}

fn clusters_table(clusters: &[Cluster]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("ID").add_attribute(Attribute::Bold),
            Cell::new("NAME").add_attribute(Attribute::Bold),
            Cell::new("SERVER").add_attribute(Attribute::Bold),
            Cell::new("SERVICE ACCOUNT").add_attribute(Attribute::Bold),
        ]);

    for cluster in clusters {
        table.add_row(vec![
            Cell::new(cluster.id),
            Cell::new(&cluster.name),
            Cell::new(&cluster.server),
            Cell::new(cluster.service_account_id),
        ]);
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connect::prompt::fake::ScriptedPrompter;
    use reqwest::Client;

    #[test]
    fn test_projects_table_marks_current() {
        let projects = vec![
            Project {
                id: 1,
                name: "staging".to_string(),
            },
            Project {
                id: 2,
                name: "prod".to_string(),
            },
        ];

        let rendered = projects_table(&projects, 2).to_string();
        assert!(rendered.contains("prod (current project)"));
        assert!(!rendered.contains("staging (current project)"));
    }

    #[test]
    fn test_clusters_table_lists_servers() {
        let clusters = vec![Cluster {
            id: 9,
            name: "kind-dev".to_string(),
            server: "https://127.0.0.1:6443".to_string(),
            service_account_id: 4,
        }];

        let rendered = clusters_table(&clusters).to_string();
        assert!(rendered.contains("SERVER"));
        assert!(rendered.contains("https://127.0.0.1:6443"));
    }

    #[test]
    fn test_zero_is_not_a_project() {
        let mut config = Config::default();
        assert!(set_project(&mut config, 0).is_err());
        assert_eq!(config.project, 0);
    }

    #[tokio::test]
    async fn test_declined_delete_sends_nothing() {
        // Unroutable host: any request would fail the test
        let api = ApiClient::new(Client::new(), "http://127.0.0.1:1", None);
        let prompter = ScriptedPrompter::new(["n"]);

        delete_project(&api, &prompter, 3).await.unwrap();
        assert!(prompter.asked()[0].contains("project with id 3"));
    }

    #[tokio::test]
    async fn test_clusters_require_selected_project() {
        let api = ApiClient::new(Client::new(), "http://127.0.0.1:1", None);
        let err = list_project_clusters(&api, &Config::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no project set"));
    }
}
