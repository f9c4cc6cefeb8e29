//! Client-side interface to the control plane.
//!
//! [`ControlPlane`] covers the two calls the connect flow depends on; [`ApiClient`] implements it
//! over HTTP and also carries the project management endpoints used by the CLI.

mod client;
pub mod models;

pub use client::ApiClient;

use anyhow::Result;
use async_trait::async_trait;

use crate::connect::action::ResolvedActionSet;
use models::{CandidateResponse, CreatedServiceAccount};

#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Submit a kubeconfig for analysis and get back the clusters it contains, with the actions
    /// still required for each
    async fn create_candidates(
        &self,
        project_id: u64,
        kubeconfig: &str,
    ) -> Result<Vec<CandidateResponse>>;

    /// Submit the resolved actions for one candidate, creating its service account
    async fn finalize_candidate(
        &self,
        project_id: u64,
        candidate_id: u64,
        actions: &ResolvedActionSet,
    ) -> Result<CreatedServiceAccount>;
}
