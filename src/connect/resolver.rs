use base64::Engine;
use std::path::Path;
use tracing::{debug, warn};

use super::action::{Action, CandidateCluster, ResolvedAction};
use super::error::ConnectError;
use super::gcp::resolve_gcp_key;
use super::prompt::Prompter;
use crate::gcp::CloudAgent;

/// Turns the actions of a candidate cluster into credential payloads
pub struct ActionResolver<'a> {
    prompter: &'a dyn Prompter,
    agent: &'a dyn CloudAgent,
}

impl<'a> ActionResolver<'a> {
    pub fn new(prompter: &'a dyn Prompter, agent: &'a dyn CloudAgent) -> Self {
        Self { prompter, agent }
    }

    /// Resolve one action.
    ///
    /// Returns `Ok(None)` for actions that are recognized but not supported yet (AWS keys).
    pub async fn resolve(
        &self,
        candidate: &CandidateCluster,
        action: &Action,
    ) -> Result<Option<ResolvedAction>, ConnectError> {
        debug!(kind = %action.kind(), cluster = %candidate.cluster_name, "Resolving action");

        let resolved = match action {
            Action::ClusterCaData { filename } => {
                ResolvedAction::ClusterCaData(read_base64(filename)?)
            }
            Action::ClientCertData { filename } => {
                ResolvedAction::ClientCertData(read_base64(filename)?)
            }
            Action::ClientKeyData { filename } => {
                ResolvedAction::ClientKeyData(read_base64(filename)?)
            }
            Action::OidcIssuerData { filename } => {
                ResolvedAction::OidcIssuerData(read_base64(filename)?)
            }
            Action::TokenData { filename } => ResolvedAction::TokenData(read_text(filename)?),
            Action::GcpKeyData => resolve_gcp_key(self.prompter, self.agent, candidate).await?,
            Action::AwsKeyData => {
                warn!(
                    cluster = %candidate.cluster_name,
                    "AWS key resolution is not supported yet, skipping action"
                );
                return Ok(None);
            }
        };

        Ok(Some(resolved))
    }
}

/// Certificate and key material is sent base64 encoded
fn read_base64(path: &Path) -> Result<String, ConnectError> {
    let bytes = std::fs::read(path).map_err(|e| ConnectError::file_access(path, e))?;
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}

/// Tokens are sent as text and must be UTF-8
fn read_text(path: &Path) -> Result<String, ConnectError> {
    let bytes = std::fs::read(path).map_err(|e| ConnectError::file_access(path, e))?;
    String::from_utf8(bytes).map_err(|source| ConnectError::InvalidToken {
        path: path.to_path_buf(),
        source,
    })
}
