//! The three user-facing operations: attest, verify and apply.
//!
//! Each operation loads the policy fresh and runs a short linear sequence of
//! external commands, stopping at the first failure. `apply` runs the full
//! verify sequence first and never touches terraform unless it passed.

use crate::{
    error::Result,
    policy::{Policy, DEFAULT_POLICY_PATH},
    provenance::{self, Predicate, DEFAULT_ATTESTATION_TYPE, DEFAULT_PREDICATE_PATH},
    runner::Executor,
    tools::Toolchain,
};
use std::path::{Path, PathBuf};

pub const DEFAULT_KEY_PATH: &str = "cosign.key";
pub const DEFAULT_PUBKEY_PATH: &str = "cosign.pub";

#[derive(Debug, Clone)]
pub struct AttestRequest {
    pub policy: PathBuf,
    pub artifact: Option<String>,
    pub key: String,
    /// Caller-supplied predicate, used verbatim. `None` generates one.
    pub predicate: Option<String>,
    pub attestation_type: String,
}

impl Default for AttestRequest {
    fn default() -> Self {
        Self {
            policy: PathBuf::from(DEFAULT_POLICY_PATH),
            artifact: None,
            key: DEFAULT_KEY_PATH.to_string(),
            predicate: None,
            attestation_type: DEFAULT_ATTESTATION_TYPE.to_string(),
        }
    }
}

/// Shared by `verify` and `apply`.
#[derive(Debug, Clone)]
pub struct VerifyRequest {
    pub policy: PathBuf,
    pub artifact: Option<String>,
    pub pubkey: String,
}

impl Default for VerifyRequest {
    fn default() -> Self {
        Self {
            policy: PathBuf::from(DEFAULT_POLICY_PATH),
            artifact: None,
            pubkey: DEFAULT_PUBKEY_PATH.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestReport {
    pub artifact: String,
    pub predicate: String,
    pub bundle: String,
    /// The predicate securetf generated, if the caller did not supply one.
    pub generated: Option<Predicate>,
}

/// Result of the verification gate. Command failures are errors instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Verified,
    /// `git.require_clean_worktree` is set and `git status` reported changes.
    WorktreeDirty,
}

impl Outcome {
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Verified => 0,
            Self::WorktreeDirty => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyReport {
    pub outcome: Outcome,
    pub initialized: bool,
    pub planned: bool,
    pub applied: bool,
}

impl ApplyReport {
    fn blocked(outcome: Outcome) -> Self {
        Self {
            outcome,
            initialized: false,
            planned: false,
            applied: false,
        }
    }
}

pub struct Pipeline<E> {
    executor: E,
    tools: Toolchain,
    workdir: PathBuf,
}

impl<E: Executor> Pipeline<E> {
    /// `workdir` is where `.git` is looked for, where relative paths resolve,
    /// and the working directory of every external command.
    pub fn new(executor: E, tools: Toolchain, workdir: impl Into<PathBuf>) -> Self {
        Self {
            executor,
            tools,
            workdir: workdir.into(),
        }
    }

    fn run(&self, argv: &[String]) -> Result<String> {
        self.executor.run(argv, Some(&self.workdir))
    }

    fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        self.workdir.join(path)
    }

    fn load_policy(&self, path: &Path) -> Result<Policy> {
        Ok(Policy::load(&self.resolve(path))?)
    }

    fn has_vcs_dir(&self) -> bool {
        self.resolve(".git").exists()
    }

    fn worktree_is_clean(&self) -> Result<bool> {
        Ok(self.run(&self.tools.git_status())?.trim().is_empty())
    }

    /// Current revision, or `None` outside a git checkout.
    fn head_commit(&self) -> Result<Option<String>> {
        if !self.has_vcs_dir() {
            return Ok(None);
        }
        let out = self.run(&self.tools.git_rev_parse_head())?;
        Ok(Some(out.trim().to_string()))
    }

    /// Generates a predicate when none is supplied, then signs the artifact.
    ///
    /// # Errors
    ///
    /// Policy, I/O and command failures, in that order of occurrence.
    pub fn attest(&self, req: &AttestRequest) -> Result<AttestReport> {
        let policy = self.load_policy(&req.policy)?;
        let artifact = policy.resolve_artifact(req.artifact.as_deref());

        let (predicate, generated) = match &req.predicate {
            Some(p) => (p.clone(), None),
            None => {
                let commit = self.head_commit()?;
                let pred = provenance::write_default_predicate(
                    &artifact,
                    &self.workdir,
                    &self.resolve(DEFAULT_PREDICATE_PATH),
                    commit.as_deref(),
                )?;
                tracing::info!(
                    artifact = %artifact,
                    sha256 = %pred.artifact.sha256,
                    "wrote default predicate"
                );
                (DEFAULT_PREDICATE_PATH.to_string(), Some(pred))
            }
        };

        let bundle = policy.bundle_path(&artifact);
        self.run(&self.tools.cosign_attest_blob(
            &artifact,
            &req.key,
            &predicate,
            &req.attestation_type,
            &bundle,
        ))?;
        tracing::info!(artifact = %artifact, bundle = %bundle, "attestation created");

        Ok(AttestReport {
            artifact,
            predicate,
            bundle,
            generated,
        })
    }

    /// Checks the worktree gate, then verifies the attestation bundle.
    ///
    /// # Errors
    ///
    /// Policy failures, or a non-zero exit from `git` or `cosign`.
    pub fn verify(&self, req: &VerifyRequest) -> Result<Outcome> {
        let policy = self.load_policy(&req.policy)?;
        let artifact = policy.resolve_artifact(req.artifact.as_deref());
        self.verify_with(&policy, &artifact, &req.pubkey)
    }

    fn verify_with(&self, policy: &Policy, artifact: &str, pubkey: &str) -> Result<Outcome> {
        // No .git at all means there is no worktree to be dirty.
        if policy.version_control.require_clean_worktree
            && self.has_vcs_dir()
            && !self.worktree_is_clean()?
        {
            tracing::warn!("git worktree is not clean; refusing to verify");
            return Ok(Outcome::WorktreeDirty);
        }

        let bundle = policy.bundle_path(artifact);
        self.run(
            &self
                .tools
                .cosign_verify_blob_attestation(artifact, pubkey, &bundle),
        )?;
        tracing::info!(artifact = %artifact, bundle = %bundle, "verification ok");
        Ok(Outcome::Verified)
    }

    /// Verifies, then runs terraform init/plan/apply as the policy allows.
    ///
    /// Terraform is never invoked unless verification in this same call
    /// returned [`Outcome::Verified`]. A failure after `plan` is not rolled
    /// back.
    ///
    /// # Errors
    ///
    /// Anything [`Pipeline::verify`] returns, or a failing terraform step.
    pub fn apply(&self, req: &VerifyRequest) -> Result<ApplyReport> {
        let policy = self.load_policy(&req.policy)?;
        let artifact = policy.resolve_artifact(req.artifact.as_deref());

        let outcome = self.verify_with(&policy, &artifact, &req.pubkey)?;
        if outcome != Outcome::Verified {
            return Ok(ApplyReport::blocked(outcome));
        }

        let mut report = ApplyReport::blocked(outcome);
        if policy.provisioning.init_before_plan {
            self.run(&self.tools.terraform_init())?;
            report.initialized = true;
        }

        self.run(&self.tools.terraform_plan())?;
        report.planned = true;
        tracing::info!("terraform plan complete");

        if policy.provisioning.allow_apply {
            self.run(&self.tools.terraform_apply())?;
            report.applied = true;
            tracing::info!("terraform apply complete");
        }
        Ok(report)
    }
}
