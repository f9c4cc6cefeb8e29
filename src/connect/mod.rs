//! Connecting kubeconfig clusters to a project.
//!
//! The control plane analyzes the submitted kubeconfig and answers with one candidate per
//! cluster, each listing the credential actions it still needs. [`Connector`] resolves the
//! actions of each candidate in order and submits the result to create its service account.
//! Candidates are processed one at a time; the first failure ends the pass. Candidates finalized
//! before the failure stay connected.

pub mod action;
pub mod error;
pub mod gcp;
pub mod prompt;
pub mod resolver;

use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::api::models::{CandidateResponse, CreatedServiceAccount};
use crate::api::ControlPlane;
use crate::kubeconfig::load_kubeconfig;
use action::{Action, CandidateCluster, ResolvedActionSet};
use error::ConnectError;
use resolver::ActionResolver;

/// Where to read the kubeconfig from and which of its contexts to submit
#[derive(Debug, Clone, Default)]
pub struct KubeconfigSource {
    pub path: Option<PathBuf>,
    pub contexts: Vec<String>,
}

impl TryFrom<CandidateResponse> for CandidateCluster {
    type Error = ConnectError;

    fn try_from(candidate: CandidateResponse) -> Result<Self, Self::Error> {
        let actions = candidate
            .actions
            .into_iter()
            .map(Action::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CandidateCluster {
            id: candidate.id,
            cluster_name: candidate.cluster_name,
            cluster_endpoint: candidate.cluster_endpoint,
            actions,
        })
    }
}

pub struct Connector<'a> {
    api: &'a dyn ControlPlane,
    resolver: ActionResolver<'a>,
}

impl<'a> Connector<'a> {
    pub fn new(api: &'a dyn ControlPlane, resolver: ActionResolver<'a>) -> Self {
        Self { api, resolver }
    }

    /// Connect every cluster of the kubeconfig to `project_id`.
    ///
    /// Returns the service accounts created, in candidate order.
    pub async fn run(
        &self,
        project_id: u64,
        source: &KubeconfigSource,
    ) -> Result<Vec<CreatedServiceAccount>, ConnectError> {
        if project_id == 0 {
            return Err(ConnectError::NoProjectSelected);
        }

        let kubeconfig = load_kubeconfig(source.path.as_deref(), &source.contexts)?;

        let candidates = self
            .api
            .create_candidates(project_id, &kubeconfig)
            .await
            .map_err(ConnectError::Remote)?
            .into_iter()
            .map(CandidateCluster::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        info!(project_id, candidates = candidates.len(), "Received cluster candidates");

        let mut accounts = Vec::with_capacity(candidates.len());
        for candidate in &candidates {
            match self.connect_candidate(project_id, candidate).await {
                Ok(account) => accounts.push(account),
                Err(e) => {
                    if !accounts.is_empty() {
                        warn!(
                            finalized = accounts.len(),
                            failed_cluster = %candidate.cluster_name,
                            "Stopping after failure; clusters connected so far remain connected"
                        );
                    }
                    return Err(e);
                }
            }
        }

        Ok(accounts)
    }

    async fn connect_candidate(
        &self,
        project_id: u64,
        candidate: &CandidateCluster,
    ) -> Result<CreatedServiceAccount, ConnectError> {
        let resolved = self.resolve_candidate(candidate).await?;
        if resolved.is_empty() {
            warn!(cluster = %candidate.cluster_name, "No credentials resolved for cluster");
        }
        info!(
            cluster = %candidate.cluster_name,
            actions = resolved.len(),
            "Creating service account for cluster"
        );
        debug!(
            cluster = %candidate.cluster_name,
            kinds = ?resolved.iter().map(|a| a.kind().as_str()).collect::<Vec<_>>(),
            "Submitting resolved actions"
        );

        let account = self
            .api
            .finalize_candidate(project_id, candidate.id, &resolved)
            .await
            .map_err(ConnectError::Remote)?;

        for cluster in &account.clusters {
            println!(
                "created service account for cluster {} with id {}",
                cluster.name, account.id
            );
        }

        Ok(account)
    }

    /// Resolve all actions of one candidate, stopping at the first failure
    pub async fn resolve_candidate(
        &self,
        candidate: &CandidateCluster,
    ) -> Result<ResolvedActionSet, ConnectError> {
        let mut resolved = ResolvedActionSet::new();

        for action in &candidate.actions {
            if let Some(r) = self.resolver.resolve(candidate, action).await? {
                resolved.push(r);
            }
        }

        Ok(resolved)
    }
}
