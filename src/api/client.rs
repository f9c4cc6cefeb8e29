use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use super::models::{
    AuthCheckResponse, CandidateResponse, Cluster, CreateCandidatesRequest, CreateProjectRequest,
    CreatedServiceAccount, Project,
};
use super::ControlPlane;
use crate::connect::action::ResolvedActionSet;

/// HTTP client for the control-plane API rooted at `{host}/api`
pub struct ApiClient {
    http_client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(http_client: Client, host: &str, token: Option<String>) -> Self {
        Self {
            http_client,
            base_url: format!("{}/api", host.trim_end_matches('/')),
            token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header("Authorization", format!("Bearer {}", token)),
            None => request,
        }
    }

    /// Create a project owned by the current user
    pub async fn create_project(&self, name: &str) -> Result<Project> {
        let response = self
            .authorize(self.http_client.post(self.url("/projects")))
            .json(&CreateProjectRequest { name })
            .send()
            .await
            .context("Failed to send create project request")?;

        parse_response(response, "create project").await
    }

    pub async fn delete_project(&self, project_id: u64) -> Result<Project> {
        let response = self
            .authorize(
                self.http_client
                    .delete(self.url(&format!("/projects/{}", project_id))),
            )
            .send()
            .await
            .context("Failed to send delete project request")?;

        parse_response(response, "delete project").await
    }

    pub async fn auth_check(&self) -> Result<AuthCheckResponse> {
        let response = self
            .authorize(self.http_client.get(self.url("/auth/check")))
            .send()
            .await
            .context("Failed to send auth check request")?;

        parse_response(response, "check authentication").await
    }

    pub async fn list_user_projects(&self, user_id: u64) -> Result<Vec<Project>> {
        let response = self
            .authorize(
                self.http_client
                    .get(self.url(&format!("/users/{}/projects", user_id))),
            )
            .send()
            .await
            .context("Failed to send list projects request")?;

        parse_response(response, "list projects").await
    }

    pub async fn list_project_clusters(&self, project_id: u64) -> Result<Vec<Cluster>> {
        let response = self
            .authorize(
                self.http_client
                    .get(self.url(&format!("/projects/{}/clusters", project_id))),
            )
            .send()
            .await
            .context("Failed to send list clusters request")?;

        parse_response(response, "list clusters").await
    }
}

#[async_trait]
impl ControlPlane for ApiClient {
    async fn create_candidates(
        &self,
        project_id: u64,
        kubeconfig: &str,
    ) -> Result<Vec<CandidateResponse>> {
        let response = self
            .authorize(
                self.http_client
                    .post(self.url(&format!("/projects/{}/candidates", project_id))),
            )
            .json(&CreateCandidatesRequest { kubeconfig })
            .send()
            .await
            .context("Failed to send create candidates request")?;

        parse_response(response, "analyze kubeconfig").await
    }

    async fn finalize_candidate(
        &self,
        project_id: u64,
        candidate_id: u64,
        actions: &ResolvedActionSet,
    ) -> Result<CreatedServiceAccount> {
        let url = self.url(&format!(
            "/projects/{}/candidates/{}/resolve",
            project_id, candidate_id
        ));

        let response = self
            .authorize(self.http_client.post(&url))
            .json(actions)
            .send()
            .await
            .context("Failed to send create service account request")?;

        parse_response(response, "create service account").await
    }
}

async fn parse_response<T: DeserializeOwned>(response: Response, operation: &str) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        anyhow::bail!(
            "Failed to {} (status {}): {}",
            operation,
            status,
            error_text
        );
    }

    response
        .json()
        .await
        .with_context(|| format!("Failed to parse {} response", operation))
}
