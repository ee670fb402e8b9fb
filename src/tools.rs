//! Command lines for the three external tools securetf sequences.
//!
//! Nothing here spawns a process. Each builder returns the argv the
//! [`crate::runner::Executor`] should run, so the exact flags are testable
//! without `git`, `cosign` or `terraform` installed.

/// Names (or paths) of the external binaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub git: String,
    pub cosign: String,
    pub terraform: String,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            git: "git".to_string(),
            cosign: "cosign".to_string(),
            terraform: "terraform".to_string(),
        }
    }
}

fn argv(program: &str, args: &[&str]) -> Vec<String> {
    std::iter::once(program)
        .chain(args.iter().copied())
        .map(ToString::to_string)
        .collect()
}

impl Toolchain {
    pub fn git_status(&self) -> Vec<String> {
        argv(&self.git, &["status", "--porcelain"])
    }

    pub fn git_rev_parse_head(&self) -> Vec<String> {
        argv(&self.git, &["rev-parse", "HEAD"])
    }

    pub fn cosign_attest_blob(
        &self,
        artifact: &str,
        key: &str,
        predicate: &str,
        attestation_type: &str,
        bundle_out: &str,
    ) -> Vec<String> {
        argv(
            &self.cosign,
            &[
                "attest-blob",
                "--key",
                key,
                "--predicate",
                predicate,
                "--type",
                attestation_type,
                "--bundle",
                bundle_out,
                artifact,
            ],
        )
    }

    pub fn cosign_verify_blob_attestation(
        &self,
        artifact: &str,
        pubkey: &str,
        bundle: &str,
    ) -> Vec<String> {
        argv(
            &self.cosign,
            &[
                "verify-blob-attestation",
                "--key",
                pubkey,
                "--bundle",
                bundle,
                artifact,
            ],
        )
    }

    pub fn terraform_init(&self) -> Vec<String> {
        argv(&self.terraform, &["init", "-input=false"])
    }

    pub fn terraform_plan(&self) -> Vec<String> {
        argv(&self.terraform, &["plan"])
    }

    pub fn terraform_apply(&self) -> Vec<String> {
        argv(&self.terraform, &["apply", "-auto-approve"])
    }
}
