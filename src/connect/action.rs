//! Actions requested by the control plane and their resolved credential payloads.

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use super::error::ConnectError;

/// The fixed set of action kinds the control plane may request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    ClusterCaData,
    ClientCertData,
    ClientKeyData,
    OidcIssuerData,
    TokenData,
    GcpKeyData,
    AwsKeyData,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::ClusterCaData => "upload-cluster-ca-data",
            ActionKind::ClientCertData => "upload-client-cert-data",
            ActionKind::ClientKeyData => "upload-client-key-data",
            ActionKind::OidcIssuerData => "upload-oidc-idp-issuer-ca-data",
            ActionKind::TokenData => "upload-token-data",
            ActionKind::GcpKeyData => "upload-gcp-key-data",
            ActionKind::AwsKeyData => "upload-aws-key-data",
        }
    }

    /// Whether the action is satisfied by reading a file named by the control plane
    pub fn is_file_backed(&self) -> bool {
        !matches!(self, ActionKind::GcpKeyData | ActionKind::AwsKeyData)
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = ConnectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upload-cluster-ca-data" => Ok(ActionKind::ClusterCaData),
            "upload-client-cert-data" => Ok(ActionKind::ClientCertData),
            "upload-client-key-data" => Ok(ActionKind::ClientKeyData),
            "upload-oidc-idp-issuer-ca-data" => Ok(ActionKind::OidcIssuerData),
            "upload-token-data" => Ok(ActionKind::TokenData),
            "upload-gcp-key-data" => Ok(ActionKind::GcpKeyData),
            "upload-aws-key-data" => Ok(ActionKind::AwsKeyData),
            other => Err(ConnectError::UnrecognizedAction(other.to_string())),
        }
    }
}

/// An action as it appears in the candidate response
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ActionDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// A unit of credential work requested for one candidate cluster
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    ClusterCaData { filename: PathBuf },
    ClientCertData { filename: PathBuf },
    ClientKeyData { filename: PathBuf },
    OidcIssuerData { filename: PathBuf },
    TokenData { filename: PathBuf },
    GcpKeyData,
    AwsKeyData,
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::ClusterCaData { .. } => ActionKind::ClusterCaData,
            Action::ClientCertData { .. } => ActionKind::ClientCertData,
            Action::ClientKeyData { .. } => ActionKind::ClientKeyData,
            Action::OidcIssuerData { .. } => ActionKind::OidcIssuerData,
            Action::TokenData { .. } => ActionKind::TokenData,
            Action::GcpKeyData => ActionKind::GcpKeyData,
            Action::AwsKeyData => ActionKind::AwsKeyData,
        }
    }
}

impl TryFrom<ActionDescriptor> for Action {
    type Error = ConnectError;

    fn try_from(descriptor: ActionDescriptor) -> Result<Self, Self::Error> {
        let kind: ActionKind = descriptor.name.parse()?;

        let filename = match descriptor.filename.filter(|f| !f.is_empty()) {
            Some(f) => Some(PathBuf::from(f)),
            None if kind.is_file_backed() => return Err(ConnectError::MissingFilename(kind)),
            None => None,
        };

        Ok(match (kind, filename) {
            (ActionKind::ClusterCaData, Some(filename)) => Action::ClusterCaData { filename },
            (ActionKind::ClientCertData, Some(filename)) => Action::ClientCertData { filename },
            (ActionKind::ClientKeyData, Some(filename)) => Action::ClientKeyData { filename },
            (ActionKind::OidcIssuerData, Some(filename)) => Action::OidcIssuerData { filename },
            (ActionKind::TokenData, Some(filename)) => Action::TokenData { filename },
            (ActionKind::GcpKeyData, _) => Action::GcpKeyData,
            (ActionKind::AwsKeyData, _) => Action::AwsKeyData,
            (kind, None) => return Err(ConnectError::MissingFilename(kind)),
        })
    }
}

/// Credential material produced for one action. Exactly one payload per kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedAction {
    /// Base64-encoded cluster CA certificate
    ClusterCaData(String),
    /// Base64-encoded client certificate
    ClientCertData(String),
    /// Base64-encoded client key
    ClientKeyData(String),
    /// Base64-encoded OIDC issuer CA certificate
    OidcIssuerData(String),
    /// Raw bearer token
    TokenData(String),
    /// Raw service-account key JSON
    GcpKeyData(String),
}

impl ResolvedAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            ResolvedAction::ClusterCaData(_) => ActionKind::ClusterCaData,
            ResolvedAction::ClientCertData(_) => ActionKind::ClientCertData,
            ResolvedAction::ClientKeyData(_) => ActionKind::ClientKeyData,
            ResolvedAction::OidcIssuerData(_) => ActionKind::OidcIssuerData,
            ResolvedAction::TokenData(_) => ActionKind::TokenData,
            ResolvedAction::GcpKeyData(_) => ActionKind::GcpKeyData,
        }
    }

    pub fn payload(&self) -> &str {
        match self {
            ResolvedAction::ClusterCaData(data)
            | ResolvedAction::ClientCertData(data)
            | ResolvedAction::ClientKeyData(data)
            | ResolvedAction::OidcIssuerData(data)
            | ResolvedAction::TokenData(data)
            | ResolvedAction::GcpKeyData(data) => data,
        }
    }

    fn payload_field(&self) -> &'static str {
        match self {
            ResolvedAction::ClusterCaData(_) => "cluster_ca_data",
            ResolvedAction::ClientCertData(_) => "client_cert_data",
            ResolvedAction::ClientKeyData(_) => "client_key_data",
            ResolvedAction::OidcIssuerData(_) => "oidc_idp_issuer_ca_data",
            ResolvedAction::TokenData(_) => "token_data",
            ResolvedAction::GcpKeyData(_) => "gcp_key_data",
        }
    }
}

impl Serialize for ResolvedAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("name", self.kind().as_str())?;
        map.serialize_entry(self.payload_field(), self.payload())?;
        map.end()
    }
}

/// Resolved actions for one candidate cluster, in resolution order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResolvedActionSet(Vec<ResolvedAction>);

impl ResolvedActionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: ResolvedAction) {
        self.0.push(action);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedAction> {
        self.0.iter()
    }
}

/// A cluster the control plane found in the submitted kubeconfig
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateCluster {
    pub id: u64,
    pub cluster_name: String,
    pub cluster_endpoint: String,
    pub actions: Vec<Action>,
}
