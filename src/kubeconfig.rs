//! Extracts the selected contexts of a local kubeconfig into a standalone document.

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum KubeconfigError {
    #[error("could not determine the kubeconfig location, pass --kubeconfig or set KUBECONFIG")]
    NoDefaultPath,

    #[error("failed to read kubeconfig {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse kubeconfig")]
    Parse(#[source] serde_yaml::Error),

    #[error("failed to serialize kubeconfig")]
    Serialize(#[source] serde_yaml::Error),

    #[error("no context selected and the kubeconfig has no current-context")]
    NoContextSelected,

    #[error("contexts not found in kubeconfig: {}", .0.join(", "))]
    UnknownContexts(Vec<String>),
}

#[derive(Debug, Serialize, Deserialize)]
struct Kubeconfig {
    #[serde(default)]
    clusters: Vec<NamedEntry>,
    #[serde(default)]
    users: Vec<NamedEntry>,
    #[serde(default)]
    contexts: Vec<NamedContext>,
    #[serde(
        rename = "current-context",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    current_context: Option<String>,
    #[serde(flatten)]
    rest: Mapping,
}

/// A cluster or user entry, kept opaque apart from its name
#[derive(Debug, Serialize, Deserialize)]
struct NamedEntry {
    name: String,
    #[serde(flatten)]
    rest: Mapping,
}

#[derive(Debug, Serialize, Deserialize)]
struct NamedContext {
    name: String,
    context: ContextRef,
    #[serde(flatten)]
    rest: Mapping,
}

#[derive(Debug, Serialize, Deserialize)]
struct ContextRef {
    #[serde(default)]
    cluster: String,
    #[serde(default)]
    user: String,
    #[serde(flatten)]
    rest: Mapping,
}

/// Relative file references kubectl resolves against the kubeconfig's directory
const CLUSTER_PATH_FIELDS: &[&str] = &["certificate-authority"];
const USER_PATH_FIELDS: &[&str] = &["client-certificate", "client-key", "tokenFile"];

/// `$KUBECONFIG` (first entry) or `~/.kube/config`
pub fn default_kubeconfig_path() -> Result<PathBuf, KubeconfigError> {
    if let Some(paths) = std::env::var_os("KUBECONFIG") {
        if let Some(first) = std::env::split_paths(&paths).find(|p| !p.as_os_str().is_empty()) {
            return Ok(first);
        }
    }

    dirs::home_dir()
        .map(|home| home.join(".kube").join("config"))
        .ok_or(KubeconfigError::NoDefaultPath)
}

/// Read the kubeconfig at `path` (or the default location) and keep only `contexts`.
///
/// When `contexts` is empty the current context is used. Relative certificate, key and token
/// file references are made absolute against the kubeconfig's directory.
pub fn load_kubeconfig(path: Option<&Path>, contexts: &[String]) -> Result<String, KubeconfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => default_kubeconfig_path()?,
    };
    debug!(path = %path.display(), "Reading kubeconfig");

    let raw = std::fs::read_to_string(&path).map_err(|source| KubeconfigError::Read {
        path: path.clone(),
        source,
    })?;

    select_contexts(&raw, contexts, Some(&base_dir(&path)))
}

fn base_dir(path: &Path) -> PathBuf {
    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    if dir.is_absolute() {
        return dir.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(dir),
        Err(_) => dir.to_path_buf(),
    }
}

fn resolve_paths(entries: &mut [NamedEntry], section: &str, fields: &[&str], base: &Path) {
    for entry in entries {
        let Some(Value::Mapping(inner)) = entry.rest.get_mut(section) else {
            continue;
        };
        for field in fields {
            if let Some(Value::String(file)) = inner.get_mut(*field) {
                if !file.is_empty() && Path::new(file.as_str()).is_relative() {
                    *file = base.join(file.as_str()).to_string_lossy().into_owned();
                }
            }
        }
    }
}

/// Reduce a kubeconfig document to the given contexts and the clusters and users they reference
pub fn select_contexts(
    raw: &str,
    contexts: &[String],
    base_dir: Option<&Path>,
) -> Result<String, KubeconfigError> {
    let mut config: Kubeconfig = serde_yaml::from_str(raw).map_err(KubeconfigError::Parse)?;

    let wanted: Vec<String> = if contexts.is_empty() {
        vec![config
            .current_context
            .clone()
            .filter(|c| !c.is_empty())
            .ok_or(KubeconfigError::NoContextSelected)?]
    } else {
        contexts.to_vec()
    };

    let known: HashSet<&str> = config.contexts.iter().map(|c| c.name.as_str()).collect();
    let unknown: Vec<String> = wanted
        .iter()
        .filter(|name| !known.contains(name.as_str()))
        .cloned()
        .collect();
    if !unknown.is_empty() {
        return Err(KubeconfigError::UnknownContexts(unknown));
    }

    config.contexts.retain(|c| wanted.contains(&c.name));

    let clusters: HashSet<String> = config.contexts.iter().map(|c| c.context.cluster.clone()).collect();
    let users: HashSet<String> = config.contexts.iter().map(|c| c.context.user.clone()).collect();
    config.clusters.retain(|c| clusters.contains(&c.name));
    config.users.retain(|u| users.contains(&u.name));

    if let Some(base) = base_dir {
        resolve_paths(&mut config.clusters, "cluster", CLUSTER_PATH_FIELDS, base);
        resolve_paths(&mut config.users, "user", USER_PATH_FIELDS, base);
    }

    let current_kept = config
        .current_context
        .as_ref()
        .is_some_and(|current| wanted.contains(current));
    if !current_kept {
        config.current_context = Some(wanted[0].clone());
    }

    debug!(
        contexts = config.contexts.len(),
        clusters = config.clusters.len(),
        users = config.users.len(),
        "Selected kubeconfig contexts"
    );

    serde_yaml::to_string(&config).map_err(KubeconfigError::Serialize)
}
