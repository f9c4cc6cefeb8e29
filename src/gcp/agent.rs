use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::{CloudAgent, GcpServiceAccount};

const RESOURCE_MANAGER_URL: &str = "https://cloudresourcemanager.googleapis.com/v1";
const CONTAINER_URL: &str = "https://container.googleapis.com/v1";
const IAM_URL: &str = "https://iam.googleapis.com/v1";

/// Role granted to provisioned accounts so they can talk to the cluster API
const CLUSTER_ROLE: &str = "roles/container.developer";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectList {
    #[serde(default)]
    projects: Vec<ProjectEntry>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectEntry {
    project_id: String,
}

#[derive(Debug, Deserialize)]
struct ClusterList {
    #[serde(default)]
    clusters: Vec<ClusterEntry>,
}

#[derive(Debug, Deserialize)]
struct ClusterEntry {
    name: String,
    #[serde(default)]
    endpoint: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateAccountRequest<'a> {
    account_id: &'a str,
    service_account: AccountFields<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AccountFields<'a> {
    display_name: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    email: String,
    project_id: String,
}

/// Project IAM policy; fields we do not touch are carried through unchanged
#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
struct Policy {
    #[serde(default)]
    bindings: Vec<Binding>,
    #[serde(flatten)]
    rest: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Binding {
    role: String,
    #[serde(default)]
    members: Vec<String>,
    #[serde(flatten)]
    rest: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct SetPolicyRequest<'a> {
    policy: &'a Policy,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateKeyRequest {
    private_key_type: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyResponse {
    private_key_data: String,
}

/// Talks to the GCP REST APIs using the caller's gcloud credentials
pub struct GcloudAgent {
    http_client: Client,
    token: OnceCell<String>,
}

impl GcloudAgent {
    pub fn new(http_client: Client) -> Self {
        Self {
            http_client,
            token: OnceCell::new(),
        }
    }

    async fn access_token(&self) -> Result<&str> {
        let token = self
            .token
            .get_or_try_init(|| async {
                let output = Command::new("gcloud")
                    .args(["auth", "print-access-token"])
                    .output()
                    .await
                    .context("Failed to run gcloud. Is the Google Cloud SDK installed?")?;

                if !output.status.success() {
                    bail!(
                        "gcloud auth print-access-token failed: {}",
                        String::from_utf8_lossy(&output.stderr).trim()
                    );
                }

                let token = String::from_utf8(output.stdout)
                    .context("gcloud returned a non UTF-8 access token")?
                    .trim()
                    .to_string();
                if token.is_empty() {
                    bail!("gcloud returned an empty access token");
                }
                Ok::<_, anyhow::Error>(token)
            })
            .await?;

        Ok(token.as_str())
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let token = self.access_token().await?;
        let response = self
            .http_client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;

        parse_response(response, url).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, url: &str, body: &B) -> Result<T> {
        let token = self.access_token().await?;
        let response = self
            .http_client
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;

        parse_response(response, url).await
    }

    async fn list_projects(&self) -> Result<Vec<String>> {
        let mut projects = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = format!("{}/projects?filter=lifecycleState:ACTIVE", RESOURCE_MANAGER_URL);
            if let Some(token) = &page_token {
                url.push_str(&format!("&pageToken={}", urlencode(token)));
            }

            let page: ProjectList = self.get(&url).await?;
            projects.extend(page.projects.into_iter().map(|p| p.project_id));

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(projects)
    }
}

#[async_trait]
impl CloudAgent for GcloudAgent {
    async fn project_for_endpoint(&self, endpoint: &str) -> Result<String> {
        let host = endpoint_host(endpoint);

        for project_id in self.list_projects().await? {
            let url = format!(
                "{}/projects/{}/locations/-/clusters",
                CONTAINER_URL, project_id
            );

            // Projects without the container API enabled reject this call
            let clusters: ClusterList = match self.get(&url).await {
                Ok(clusters) => clusters,
                Err(e) => {
                    debug!(project_id = %project_id, "Skipping project: {:#}", e);
                    continue;
                }
            };

            if let Some(cluster) = clusters.clusters.iter().find(|c| c.endpoint == host) {
                info!(
                    project_id = %project_id,
                    cluster = %cluster.name,
                    "Found GKE cluster for endpoint"
                );
                return Ok(project_id);
            }
        }

        bail!("No GKE cluster with endpoint {} found in any accessible project", endpoint)
    }

    async fn create_service_account(&self, project_id: &str, name: &str) -> Result<GcpServiceAccount> {
        let url = format!("{}/projects/{}/serviceAccounts", IAM_URL, project_id);
        let request = CreateAccountRequest {
            account_id: name,
            service_account: AccountFields { display_name: name },
        };

        let account: AccountResponse = self.post(&url, &request).await?;
        info!(email = %account.email, "Created GCP service account");

        Ok(GcpServiceAccount {
            project_id: account.project_id,
            email: account.email,
        })
    }

    async fn set_iam_policy(&self, account: &GcpServiceAccount) -> Result<()> {
        let get_url = format!(
            "{}/projects/{}:getIamPolicy",
            RESOURCE_MANAGER_URL, account.project_id
        );
        let mut policy: Policy = self.post(&get_url, &serde_json::json!({})).await?;

        add_binding(&mut policy, CLUSTER_ROLE, &format!("serviceAccount:{}", account.email));

        let set_url = format!(
            "{}/projects/{}:setIamPolicy",
            RESOURCE_MANAGER_URL, account.project_id
        );
        let _: Policy = self
            .post(&set_url, &SetPolicyRequest { policy: &policy })
            .await?;

        info!(email = %account.email, role = CLUSTER_ROLE, "Granted cluster role");
        Ok(())
    }

    async fn create_key(&self, account: &GcpServiceAccount) -> Result<Vec<u8>> {
        let url = format!(
            "{}/projects/{}/serviceAccounts/{}/keys",
            IAM_URL, account.project_id, account.email
        );
        let key: KeyResponse = self
            .post(
                &url,
                &CreateKeyRequest {
                    private_key_type: "TYPE_GOOGLE_CREDENTIALS_FILE",
                },
            )
            .await?;

        decode_key(&key.private_key_data)
    }
}

async fn parse_response<T: DeserializeOwned>(response: reqwest::Response, url: &str) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        bail!("Request to {} failed (status {}): {}", url, status, error_text);
    }

    response
        .json()
        .await
        .with_context(|| format!("Failed to parse response from {}", url))
}

/// GKE reports cluster endpoints as bare hosts, kubeconfig stores them as URLs
fn endpoint_host(endpoint: &str) -> String {
    url::Url::parse(endpoint)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| endpoint.trim().trim_end_matches('/').to_string())
}

fn add_binding(policy: &mut Policy, role: &str, member: &str) {
    match policy.bindings.iter_mut().find(|b| b.role == role) {
        Some(binding) => {
            if !binding.members.iter().any(|m| m == member) {
                binding.members.push(member.to_string());
            }
        }
        None => policy.bindings.push(Binding {
            role: role.to_string(),
            members: vec![member.to_string()],
            rest: serde_json::Map::new(),
        }),
    }
}

fn decode_key(private_key_data: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(private_key_data)
        .context("Service account key returned by GCP is not valid base64")
}

fn urlencode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_host() {
        assert_eq!(endpoint_host("https://34.12.0.7"), "34.12.0.7");
        assert_eq!(endpoint_host("https://34.12.0.7:443/"), "34.12.0.7");
        assert_eq!(endpoint_host("34.12.0.7"), "34.12.0.7");
    }

    #[test]
    fn test_add_binding_appends_to_existing_role() {
        let mut policy: Policy = serde_json::from_value(serde_json::json!({
            "version": 1,
            "etag": "BwXhqDmIjP8=",
            "bindings": [
                { "role": "roles/container.developer", "members": ["user:alice@example.com"] }
            ]
        }))
        .unwrap();

        add_binding(&mut policy, CLUSTER_ROLE, "serviceAccount:sa@p.iam.gserviceaccount.com");
        add_binding(&mut policy, CLUSTER_ROLE, "serviceAccount:sa@p.iam.gserviceaccount.com");

        assert_eq!(policy.bindings.len(), 1);
        assert_eq!(
            policy.bindings[0].members,
            vec![
                "user:alice@example.com".to_string(),
                "serviceAccount:sa@p.iam.gserviceaccount.com".to_string()
            ]
        );

        // etag must survive so the write is conditional on the read
        let value = serde_json::to_value(&policy).unwrap();
        assert_eq!(value["etag"], "BwXhqDmIjP8=");
        assert_eq!(value["version"], 1);
    }

    #[test]
    fn test_add_binding_creates_missing_role() {
        let mut policy = Policy::default();
        add_binding(&mut policy, CLUSTER_ROLE, "serviceAccount:sa@p.iam.gserviceaccount.com");

        assert_eq!(policy.bindings.len(), 1);
        assert_eq!(policy.bindings[0].role, CLUSTER_ROLE);
    }

    #[test]
    fn test_decode_key() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(br#"{"type":"service_account"}"#);
        assert_eq!(decode_key(&encoded).unwrap(), br#"{"type":"service_account"}"#.to_vec());
        assert!(decode_key("not base64!").is_err());
    }
}
