use std::path::PathBuf;
use thiserror::Error;

use super::action::ActionKind;
use crate::kubeconfig::KubeconfigError;

/// Terminal failures of a connect pass
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("no project set, please run `kubeconnect project set [id]`")]
    NoProjectSelected,

    #[error("failed to read {}", path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("token file {} is not valid UTF-8", path.display())]
    InvalidToken {
        path: PathBuf,
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error("key file not found: {}", .0.display())]
    KeyFileNotFound(PathBuf),

    #[error("unrecognized action '{0}', the control plane may be newer than this CLI")]
    UnrecognizedAction(String),

    #[error("action '{0}' requires a filename but none was provided")]
    MissingFilename(ActionKind),

    #[error("failed to read prompt response")]
    Prompt(#[source] std::io::Error),

    #[error("automatic provisioning failed while trying to {step}")]
    Provisioning {
        step: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("control plane request failed")]
    Remote(#[source] anyhow::Error),

    #[error(transparent)]
    Kubeconfig(#[from] KubeconfigError),
}

impl ConnectError {
    pub(crate) fn file_access(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConnectError::FileAccess {
            path: path.into(),
            source,
        }
    }
}
