//! Request/response types of the control-plane API

use serde::{Deserialize, Serialize};

use crate::connect::action::ActionDescriptor;

#[derive(Debug, Serialize)]
pub struct CreateCandidatesRequest<'a> {
    pub kubeconfig: &'a str,
}

/// A cluster found in a submitted kubeconfig, with the actions still needed to connect it
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CandidateResponse {
    pub id: u64,
    #[serde(default)]
    pub actions: Vec<ActionDescriptor>,
    pub cluster_name: String,
    pub cluster_endpoint: String,
}

/// Cluster linked to a project
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Cluster {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub server: String,
    #[serde(default)]
    pub service_account_id: u64,
}

/// Service account created from a resolved candidate
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CreatedServiceAccount {
    pub id: u64,
    #[serde(default)]
    pub clusters: Vec<Cluster>,
}

#[derive(Debug, Serialize)]
pub struct CreateProjectRequest<'a> {
    pub name: &'a str,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Project {
    pub id: u64,
    pub name: String,
}

/// Currently authenticated user
#[derive(Debug, Deserialize)]
pub struct AuthCheckResponse {
    pub id: u64,
}
