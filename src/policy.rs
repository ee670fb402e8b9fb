use crate::error::PolicyError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Maximum policy file size (1 MB).
const MAX_POLICY_BYTES: u64 = 1024 * 1024;

/// Default policy location used by the CLI.
pub const DEFAULT_POLICY_PATH: &str = "policy.yml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationPolicy {
    pub require_signature: bool,
    pub require_attestation: bool,
    #[serde(rename = "signature_file_suffix")]
    pub signature_suffix: String,
    pub attestation_bundle_suffix: String,
}

/// The `terraform` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningPolicy {
    pub init_before_plan: bool,
    pub allow_apply: bool,
}

/// The `git` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionControlPolicy {
    pub require_clean_worktree: bool,
}

/// Immutable policy, loaded once per invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Policy {
    pub artifact_path: String,
    pub verification: VerificationPolicy,
    pub provisioning: ProvisioningPolicy,
    pub version_control: VersionControlPolicy,
}

#[derive(Deserialize)]
struct ArtifactSection {
    path: String,
}

#[derive(Deserialize)]
struct PolicyDocument {
    artifact: ArtifactSection,
    verification: VerificationPolicy,
    terraform: ProvisioningPolicy,
    git: VersionControlPolicy,
}

impl Policy {
    /// Loads and validates a YAML policy.
    ///
    /// Every key is required and typed: `yes`/`1` are not booleans here, and
    /// numbers are not strings. Unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// [`PolicyError::Read`] if the file is missing, a symlink, or larger than
    /// 1 MB; [`PolicyError::Parse`] if it is not YAML or a key is missing or
    /// mistyped; [`PolicyError::Invalid`] if a value is unusable.
    pub fn load(path: &Path) -> Result<Self, PolicyError> {
        let bytes = crate::fs_guard::read_validated(path, MAX_POLICY_BYTES).map_err(|source| {
            PolicyError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;
        let doc: PolicyDocument =
            serde_yaml::from_slice(&bytes).map_err(|source| PolicyError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let policy = Self {
            artifact_path: doc.artifact.path,
            verification: doc.verification,
            provisioning: doc.terraform,
            version_control: doc.git,
        };
        policy.validate()?;
        tracing::debug!(path = %path.display(), ?policy, "policy loaded");
        Ok(policy)
    }

    fn validate(&self) -> Result<(), PolicyError> {
        if self.artifact_path.is_empty() {
            return Err(PolicyError::Invalid {
                field: "artifact.path",
                reason: "must not be empty".to_string(),
            });
        }
        // An empty suffix would point the bundle at the artifact itself.
        if self.verification.attestation_bundle_suffix.is_empty() {
            return Err(PolicyError::Invalid {
                field: "verification.attestation_bundle_suffix",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// The artifact named on the command line, else the policy default.
    pub fn resolve_artifact(&self, explicit: Option<&str>) -> String {
        explicit.map_or_else(|| self.artifact_path.clone(), ToString::to_string)
    }

    /// Where the attestation bundle for `artifact` lives.
    pub fn bundle_path(&self, artifact: &str) -> String {
        format!("{artifact}{}", self.verification.attestation_bundle_suffix)
    }
}
