//! Google Cloud service-account provisioning.
//!
//! The [`CloudAgent`] trait is the seam used by the connect flow; [`GcloudAgent`] is the real
//! implementation, authenticating with the local gcloud application default credentials.

mod agent;

pub use agent::GcloudAgent;

use anyhow::Result;
use async_trait::async_trait;

/// A service account created in a GCP project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcpServiceAccount {
    pub project_id: String,
    pub email: String,
}

/// Operations needed to provision a key for a GKE cluster
#[async_trait]
pub trait CloudAgent: Send + Sync {
    /// Find the project owning the GKE cluster served at `endpoint`
    async fn project_for_endpoint(&self, endpoint: &str) -> Result<String>;

    /// Create a service account with the given account id
    async fn create_service_account(&self, project_id: &str, name: &str) -> Result<GcpServiceAccount>;

    /// Grant the account access to the project's GKE clusters
    async fn set_iam_policy(&self, account: &GcpServiceAccount) -> Result<()>;

    /// Mint a JSON key for the account, returning the raw key file contents
    async fn create_key(&self, account: &GcpServiceAccount) -> Result<Vec<u8>>;
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::sync::Mutex;

    /// Which agent call should fail
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum FailAt {
        Nothing,
        ProjectLookup,
        CreateAccount,
        SetIamPolicy,
        CreateKey,
    }

    /// In-memory agent recording the calls it receives
    pub struct FakeAgent {
        fail_at: FailAt,
        key: Vec<u8>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeAgent {
        pub fn new(fail_at: FailAt, key: &[u8]) -> Self {
            Self {
                fail_at,
                key: key.to_vec(),
                calls: Mutex::default(),
            }
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String, step: FailAt) -> Result<()> {
            self.calls.lock().unwrap().push(call);
            if self.fail_at == step {
                anyhow::bail!("simulated {:?} failure", step);
            }
            Ok(())
        }
    }

    #[async_trait]
    impl CloudAgent for FakeAgent {
        async fn project_for_endpoint(&self, endpoint: &str) -> Result<String> {
            self.record(format!("project_for_endpoint {endpoint}"), FailAt::ProjectLookup)?;
            Ok("my-project".to_string())
        }

        async fn create_service_account(
            &self,
            project_id: &str,
            name: &str,
        ) -> Result<GcpServiceAccount> {
            self.record(
                format!("create_service_account {project_id} {name}"),
                FailAt::CreateAccount,
            )?;
            Ok(GcpServiceAccount {
                project_id: project_id.to_string(),
                email: format!("{name}@{project_id}.iam.gserviceaccount.com"),
            })
        }

        async fn set_iam_policy(&self, account: &GcpServiceAccount) -> Result<()> {
            self.record(format!("set_iam_policy {}", account.email), FailAt::SetIamPolicy)
        }

        async fn create_key(&self, account: &GcpServiceAccount) -> Result<Vec<u8>> {
            self.record(format!("create_key {}", account.email), FailAt::CreateKey)?;
            Ok(self.key.clone())
        }
    }
}
