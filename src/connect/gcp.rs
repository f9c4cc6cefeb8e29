//! Resolution of `upload-gcp-key-data` actions.
//!
//! The user is first offered automatic provisioning of a fresh GCP service account in the project
//! owning the cluster. If they decline, or the account cannot be created, they are asked for an
//! existing key file instead. Failures once the account exists are returned to the caller.

use rand::Rng;
use std::path::PathBuf;
use tracing::{info, warn};

use super::action::{CandidateCluster, ResolvedAction};
use super::error::ConnectError;
use super::prompt::{is_affirmative, Prompter};
use crate::gcp::CloudAgent;

pub const SERVICE_ACCOUNT_PREFIX: &str = "kubeconnect-";
const SUFFIX_LEN: usize = 6;
const SUFFIX_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Generate a service account id unlikely to collide with earlier runs
pub fn generate_account_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..SUFFIX_CHARSET.len());
            SUFFIX_CHARSET[idx] as char
        })
        .collect();

    format!("{}{}", SERVICE_ACCOUNT_PREFIX, suffix)
}

pub(crate) async fn resolve_gcp_key(
    prompter: &dyn Prompter,
    agent: &dyn CloudAgent,
    candidate: &CandidateCluster,
) -> Result<ResolvedAction, ConnectError> {
    let question = format!(
        "Detected GKE cluster in kubeconfig for the endpoint {} ({}).\n\
         A service account can be set up in your GCP project to connect to this cluster automatically.\n\
         Would you like to proceed? [y/n] ",
        candidate.cluster_endpoint, candidate.cluster_name
    );

    let proceed = match prompter.prompt(&question) {
        Ok(answer) => is_affirmative(&answer),
        Err(e) => {
            warn!("Could not read answer, continuing with a manual key file: {}", e);
            false
        }
    };

    if !proceed {
        return resolve_manually(prompter);
    }

    match provision(agent, candidate).await? {
        Some(key) => Ok(key),
        None => {
            println!("Automatic creation failed.");
            resolve_manually(prompter)
        }
    }
}

/// Runs the automatic path. `Ok(None)` means the account could not be created and the caller
/// should fall back to a manual key file.
async fn provision(
    agent: &dyn CloudAgent,
    candidate: &CandidateCluster,
) -> Result<Option<ResolvedAction>, ConnectError> {
    let project_id = agent
        .project_for_endpoint(&candidate.cluster_endpoint)
        .await
        .map_err(|source| ConnectError::Provisioning {
            step: "find the GCP project for the cluster",
            source,
        })?;

    let name = generate_account_name(&mut rand::thread_rng());
    info!(project_id = %project_id, name = %name, "Creating GCP service account");

    let account = match agent.create_service_account(&project_id, &name).await {
        Ok(account) => account,
        Err(e) => {
            info!("Automatic service account creation failed: {:#}", e);
            return Ok(None);
        }
    };

    agent
        .set_iam_policy(&account)
        .await
        .map_err(|source| ConnectError::Provisioning {
            step: "grant the service account access to the cluster",
            source,
        })?;

    let key = agent
        .create_key(&account)
        .await
        .map_err(|source| ConnectError::Provisioning {
            step: "create a key for the service account",
            source,
        })?;

    let key = String::from_utf8(key).map_err(|e| ConnectError::Provisioning {
        step: "read the service account key",
        source: e.into(),
    })?;

    Ok(Some(ResolvedAction::GcpKeyData(key)))
}

fn resolve_manually(prompter: &dyn Prompter) -> Result<ResolvedAction, ConnectError> {
    let location = prompter
        .prompt(
            "Please provide the full path to a service account key file.\n\
             Key file location: ",
        )
        .map_err(ConnectError::Prompt)?;

    let path = PathBuf::from(location.trim());

    match std::fs::metadata(&path) {
        Ok(meta) if meta.is_dir() => Err(ConnectError::KeyFileNotFound(path)),
        Ok(_) => {
            let contents =
                std::fs::read_to_string(&path).map_err(|e| ConnectError::file_access(&path, e))?;
            Ok(ResolvedAction::GcpKeyData(contents))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ConnectError::KeyFileNotFound(path))
        }
        Err(e) => Err(ConnectError::file_access(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connect::prompt::fake::ScriptedPrompter;
    use crate::gcp::fake::{FailAt, FakeAgent};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const KEY_JSON: &str = r#"{"type":"service_account","project_id":"my-project"}"#;

    fn gke_candidate() -> CandidateCluster {
        CandidateCluster {
            id: 3,
            cluster_name: "gke_my-project_us-central1_prod".to_string(),
            cluster_endpoint: "https://34.12.0.7".to_string(),
            actions: vec![crate::connect::action::Action::GcpKeyData],
        }
    }

    fn key_file(dir: &tempfile::TempDir) -> String {
        let path = dir.path().join("key.json");
        std::fs::write(&path, "manual-key").unwrap();
        path.to_str().unwrap().to_string()
    }

    #[test]
    fn test_generated_name_contract() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..100 {
            let name = generate_account_name(&mut rng);
            let suffix = name.strip_prefix(SERVICE_ACCOUNT_PREFIX).unwrap();
            assert_eq!(suffix.len(), 6);
            assert!(suffix
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_generated_names_differ() {
        let mut rng = StdRng::seed_from_u64(7);
        let first = generate_account_name(&mut rng);
        let second = generate_account_name(&mut rng);
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_declined_prompt_skips_agent_and_reads_key_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = key_file(&dir);

        for answer in ["n", "no", "N", "maybe later", ""] {
            let prompter = ScriptedPrompter::new([answer.to_string(), path.clone()]);
            let agent = FakeAgent::new(FailAt::Nothing, KEY_JSON.as_bytes());

            let resolved = resolve_gcp_key(&prompter, &agent, &gke_candidate())
                .await
                .unwrap();

            assert_eq!(resolved, ResolvedAction::GcpKeyData("manual-key".to_string()));
            assert!(agent.calls().is_empty(), "agent called after {answer:?}");
            assert_eq!(prompter.asked().len(), 2);
            assert!(prompter.asked()[1].contains("Key file location"));
        }
    }

    #[tokio::test]
    async fn test_prompt_read_error_routes_to_manual() {
        let dir = tempfile::tempdir().unwrap();
        let path = key_file(&dir);
        let prompter = ScriptedPrompter::default()
            .with_answer(Err(std::io::Error::other("stdin closed")))
            .with_answer(Ok(path));
        let agent = FakeAgent::new(FailAt::Nothing, KEY_JSON.as_bytes());

        let resolved = resolve_gcp_key(&prompter, &agent, &gke_candidate())
            .await
            .unwrap();

        assert_eq!(resolved, ResolvedAction::GcpKeyData("manual-key".to_string()));
        assert!(agent.calls().is_empty());
    }

    #[tokio::test]
    async fn test_automatic_provisioning_returns_minted_key() {
        let prompter = ScriptedPrompter::new(["Yes"]);
        let agent = FakeAgent::new(FailAt::Nothing, KEY_JSON.as_bytes());

        let resolved = resolve_gcp_key(&prompter, &agent, &gke_candidate())
            .await
            .unwrap();

        assert_eq!(resolved, ResolvedAction::GcpKeyData(KEY_JSON.to_string()));
        assert_eq!(prompter.asked().len(), 1, "no manual prompt expected");
        assert!(prompter.asked()[0].contains("https://34.12.0.7"));
        assert!(prompter.asked()[0].contains("gke_my-project_us-central1_prod"));

        let calls = agent.calls();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[0], "project_for_endpoint https://34.12.0.7");
        assert!(calls[1].starts_with(&format!("create_service_account my-project {}", SERVICE_ACCOUNT_PREFIX)));
        assert!(calls[2].starts_with("set_iam_policy "));
        assert!(calls[3].starts_with("create_key "));
    }

    #[tokio::test]
    async fn test_create_account_failure_falls_back_to_manual() {
        let dir = tempfile::tempdir().unwrap();
        let path = key_file(&dir);
        let prompter = ScriptedPrompter::new(["y".to_string(), path]);
        let agent = FakeAgent::new(FailAt::CreateAccount, KEY_JSON.as_bytes());

        let resolved = resolve_gcp_key(&prompter, &agent, &gke_candidate())
            .await
            .unwrap();

        assert_eq!(resolved, ResolvedAction::GcpKeyData("manual-key".to_string()));
        let calls = agent.calls();
        assert_eq!(calls.len(), 2);
        assert!(!calls.iter().any(|c| c.starts_with("set_iam_policy")));
        assert!(!calls.iter().any(|c| c.starts_with("create_key")));
    }

    #[tokio::test]
    async fn test_project_lookup_failure_is_terminal() {
        let prompter = ScriptedPrompter::new(["y"]);
        let agent = FakeAgent::new(FailAt::ProjectLookup, KEY_JSON.as_bytes());

        let err = resolve_gcp_key(&prompter, &agent, &gke_candidate())
            .await
            .unwrap_err();

        assert!(matches!(err, ConnectError::Provisioning { .. }));
        assert_eq!(agent.calls().len(), 1);
        assert_eq!(prompter.asked().len(), 1);
    }

    #[tokio::test]
    async fn test_failures_after_account_creation_do_not_fall_back() {
        for (fail_at, expected_calls) in [(FailAt::SetIamPolicy, 3), (FailAt::CreateKey, 4)] {
            let prompter = ScriptedPrompter::new(["y", "/should/not/be/asked"]);
            let agent = FakeAgent::new(fail_at, KEY_JSON.as_bytes());

            let err = resolve_gcp_key(&prompter, &agent, &gke_candidate())
                .await
                .unwrap_err();

            assert!(matches!(err, ConnectError::Provisioning { .. }), "{fail_at:?}");
            assert_eq!(agent.calls().len(), expected_calls);
            assert_eq!(prompter.asked().len(), 1, "manual prompt issued after {fail_at:?}");
        }
    }

    #[tokio::test]
    async fn test_manual_path_rejects_missing_file_and_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json").to_str().unwrap().to_string();
        let directory = dir.path().to_str().unwrap().to_string();

        for path in [missing, directory] {
            let prompter = ScriptedPrompter::new(["n".to_string(), path.clone()]);
            let agent = FakeAgent::new(FailAt::Nothing, KEY_JSON.as_bytes());

            let err = resolve_gcp_key(&prompter, &agent, &gke_candidate())
                .await
                .unwrap_err();

            assert!(
                matches!(err, ConnectError::KeyFileNotFound(ref p) if p.to_str() == Some(path.as_str())),
                "unexpected error for {path}: {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_manual_prompt_error_is_surfaced() {
        let prompter = ScriptedPrompter::new(["n"]);
        let agent = FakeAgent::new(FailAt::Nothing, KEY_JSON.as_bytes());

        let err = resolve_gcp_key(&prompter, &agent, &gke_candidate())
            .await
            .unwrap_err();

        assert!(matches!(err, ConnectError::Prompt(_)));
    }
}
