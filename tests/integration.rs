//! Integration tests for the securetf binary.
//!
//! These tests invoke the compiled `securetf` binary end-to-end with fake
//! `git`, `cosign` and `terraform` shell scripts standing in for the real
//! tools. Each fake appends its argv to a log file, so the tests can assert
//! exactly which external commands ran, in which order, and which never ran.

#![cfg(unix)]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const POLICY: &str = r#"artifact:
  path: main.tf
verification:
  require_signature: true
  require_attestation: true
  signature_file_suffix: ".sig"
  attestation_bundle_suffix: ".bundle"
terraform:
  init_before_plan: true
  allow_apply: false
git:
  require_clean_worktree: true
"#;

/// Logs its argv, fails when `FAKE_FAIL` names it, and answers the two git
/// queries securetf makes.
const FAKE_TOOL: &str = r#"#!/bin/sh
name=$(basename "$0")
printf '%s %s\n' "$name" "$*" >> "$FAKE_LOG"
if [ "$FAKE_FAIL" = "$name" ]; then
  echo "fake $name failure" >&2
  exit 1
fi
if [ "$name" = git ]; then
  case "$1" in
    status) printf '%s' "$FAKE_GIT_STATUS" ;;
    rev-parse) echo cafebabe ;;
  esac
fi
exit 0
"#;

fn securetf_bin() -> PathBuf {
    if let Some(p) = std::env::var_os("CARGO_BIN_EXE_securetf") {
        PathBuf::from(p)
    } else {
        let mut path = std::env::current_exe()
            .expect("cannot determine test binary path")
            .parent()
            .expect("no parent directory")
            .parent()
            .expect("no grandparent directory")
            .to_path_buf();
        path.push("securetf");
        path
    }
}

struct Workspace {
    dir: TempDir,
    bin: TempDir,
}

impl Workspace {
    /// A work directory holding `policy.yml` and `main.tf`, plus a separate
    /// directory of fake tools.
    fn new(policy: &str) -> Self {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("policy.yml"), policy).unwrap();
        fs::write(dir.path().join("main.tf"), "terraform {}\n").unwrap();

        let bin = TempDir::new().unwrap();
        for name in ["git", "cosign", "terraform"] {
            let p = bin.path().join(name);
            fs::write(&p, FAKE_TOOL).unwrap();
            fs::set_permissions(&p, fs::Permissions::from_mode(0o755)).unwrap();
        }
        Self { dir, bin }
    }

    fn with_git_dir(self) -> Self {
        fs::create_dir(self.dir.path().join(".git")).unwrap();
        self
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn log_path(&self) -> PathBuf {
        self.bin.path().join("calls.log")
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(securetf_bin());
        cmd.args(args)
            .current_dir(self.path())
            .env("SECURETF_GIT", self.bin.path().join("git"))
            .env("SECURETF_COSIGN", self.bin.path().join("cosign"))
            .env("SECURETF_TERRAFORM", self.bin.path().join("terraform"))
            .env("FAKE_LOG", self.log_path())
            .env("FAKE_GIT_STATUS", "")
            .env_remove("FAKE_FAIL")
            .env_remove("RUST_LOG");
        cmd
    }

    fn run(&self, args: &[&str]) -> Output {
        self.command(args).output().expect("failed to execute securetf")
    }

    /// Every external call, one `tool args...` line each.
    fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.log_path())
            .unwrap_or_default()
            .lines()
            .map(ToString::to_string)
            .collect()
    }

    fn called(&self, tool: &str) -> bool {
        self.calls().iter().any(|c| c.starts_with(&format!("{tool} ")))
    }
}

fn stdout(o: &Output) -> String {
    String::from_utf8_lossy(&o.stdout).into_owned()
}

fn stderr(o: &Output) -> String {
    String::from_utf8_lossy(&o.stderr).into_owned()
}

// -------------------------------------------------------------------------
// attest
// -------------------------------------------------------------------------

#[test]
fn test_attest_generates_predicate_and_bundle_path() {
    let ws = Workspace::new(POLICY);
    let output = ws.run(&["attest"]);

    assert!(
        output.status.success(),
        "attest should succeed.\nstdout: {}\nstderr: {}",
        stdout(&output),
        stderr(&output),
    );
    let out = stdout(&output);
    assert!(out.contains("Attestation created for: main.tf"), "{out}");
    assert!(out.contains("Predicate file: provenance.generated.json"), "{out}");
    assert!(out.contains("Bundle file: main.tf.bundle"), "{out}");

    assert_eq!(
        ws.calls(),
        ["cosign attest-blob --key cosign.key --predicate provenance.generated.json \
          --type application/vnd.terrasign.provenance+json --bundle main.tf.bundle main.tf"]
    );

    let text = fs::read_to_string(ws.path().join("provenance.generated.json")).unwrap();
    assert!(text.ends_with("}\n"));
    let predicate: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(predicate["artifact"]["path"], "main.tf");
    assert_eq!(
        predicate["artifact"]["sha256"].as_str().unwrap().len(),
        64,
        "sha256 should be a 64-char hex string"
    );
    assert_eq!(predicate["build"]["builder_id"], "securetf-local");
    assert_eq!(predicate["vcs"]["git_commit"], "");
}

#[test]
fn test_attest_records_git_revision() {
    let ws = Workspace::new(POLICY).with_git_dir();
    let output = ws.run(&["attest"]);
    assert!(output.status.success(), "{}", stderr(&output));

    let calls = ws.calls();
    assert_eq!(calls[0], "git rev-parse HEAD");
    assert!(calls[1].starts_with("cosign attest-blob"));

    let predicate: serde_json::Value = serde_json::from_slice(
        &fs::read(ws.path().join("provenance.generated.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(predicate["vcs"]["git_commit"], "cafebabe");
}

#[test]
fn test_attest_with_custom_predicate_key_and_type() {
    let ws = Workspace::new(POLICY);
    let output = ws.run(&[
        "attest",
        "other.tf",
        "--key",
        "team.key",
        "--predicate",
        "mine.json",
        "--type",
        "application/x-test",
    ]);
    assert!(output.status.success(), "{}", stderr(&output));

    assert_eq!(
        ws.calls(),
        ["cosign attest-blob --key team.key --predicate mine.json \
          --type application/x-test --bundle other.tf.bundle other.tf"]
    );
    assert!(!ws.path().join("provenance.generated.json").exists());
}

#[test]
fn test_attest_signer_failure_exits_1_with_full_message() {
    let ws = Workspace::new(POLICY);
    let output = ws.command(&["attest"]).env("FAKE_FAIL", "cosign").output().unwrap();

    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.contains("Command failed:"), "{err}");
    assert!(err.contains("Exit code: 1"), "{err}");
    assert!(err.contains("STDERR:\nfake cosign failure"), "{err}");
}

// -------------------------------------------------------------------------
// verify
// -------------------------------------------------------------------------

#[test]
fn test_verify_uses_same_bundle_path_as_attest() {
    let ws = Workspace::new(POLICY).with_git_dir();
    let output = ws.run(&["verify", "--pubkey", "team.pub"]);

    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("Verification OK."));
    assert_eq!(
        ws.calls(),
        [
            "git status --porcelain",
            "cosign verify-blob-attestation --key team.pub --bundle main.tf.bundle main.tf",
        ]
    );
}

#[test]
fn test_verify_dirty_worktree_exits_2_without_verifying() {
    let ws = Workspace::new(POLICY).with_git_dir();
    let output = ws
        .command(&["verify"])
        .env("FAKE_GIT_STATUS", " M main.tf\n")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("git worktree is not clean"));
    assert!(!ws.called("cosign"));
}

#[test]
fn test_verify_without_git_dir_is_not_blocked() {
    let ws = Workspace::new(POLICY);
    let output = ws
        .command(&["verify"])
        .env("FAKE_GIT_STATUS", " M main.tf\n")
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", stderr(&output));
    assert!(!ws.called("git"));
    assert!(ws.called("cosign"));
}

#[test]
fn test_verify_failure_exits_1() {
    let ws = Workspace::new(POLICY);
    let output = ws.command(&["verify"]).env("FAKE_FAIL", "cosign").output().unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("verify-blob-attestation"));
}

// -------------------------------------------------------------------------
// apply
// -------------------------------------------------------------------------

#[test]
fn test_apply_plans_but_does_not_apply_by_default() {
    let ws = Workspace::new(POLICY);
    let output = ws.run(&["apply"]);

    assert!(output.status.success(), "{}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("Verification OK."));
    assert!(out.contains("Terraform plan complete."));
    assert!(!out.contains("Terraform apply complete."));

    let calls = ws.calls();
    assert_eq!(calls.len(), 3, "{calls:?}");
    assert!(calls[0].starts_with("cosign verify-blob-attestation"));
    assert_eq!(calls[1], "terraform init -input=false");
    assert_eq!(calls[2], "terraform plan");
}

#[test]
fn test_apply_runs_auto_approved_apply_when_allowed() {
    let ws = Workspace::new(&POLICY.replace("allow_apply: false", "allow_apply: true"));
    let output = ws.run(&["apply"]);

    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("Terraform apply complete."));
    assert_eq!(ws.calls().last().unwrap(), "terraform apply -auto-approve");
}

#[test]
fn test_apply_never_reaches_terraform_when_verification_fails() {
    let ws = Workspace::new(&POLICY.replace("allow_apply: false", "allow_apply: true"));
    let output = ws.command(&["apply"]).env("FAKE_FAIL", "cosign").output().unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(!ws.called("terraform"));
}

#[test]
fn test_apply_dirty_worktree_exits_2_without_terraform() {
    let ws = Workspace::new(&POLICY.replace("allow_apply: false", "allow_apply: true"))
        .with_git_dir();
    let output = ws
        .command(&["apply"])
        .env("FAKE_GIT_STATUS", "?? new.tf\n")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert!(!ws.called("cosign"));
    assert!(!ws.called("terraform"));
}

#[test]
fn test_apply_stops_at_first_failing_terraform_step() {
    let ws = Workspace::new(&POLICY.replace("allow_apply: false", "allow_apply: true"));
    let output = ws
        .command(&["apply"])
        .env("FAKE_FAIL", "terraform")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert_eq!(
        ws.calls().last().unwrap(),
        "terraform init -input=false",
        "the first failing terraform step must end the run"
    );
}

// -------------------------------------------------------------------------
// policy and CLI handling
// -------------------------------------------------------------------------

#[test]
fn test_missing_policy_exits_1() {
    let ws = Workspace::new(POLICY);
    let output = ws.run(&["--policy", "absent.yml", "verify"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("absent.yml"));
    assert!(ws.calls().is_empty());
}

#[test]
fn test_incomplete_policy_exits_1_naming_field() {
    let ws = Workspace::new(&POLICY.replace("  allow_apply: false\n", ""));
    let output = ws.run(&["apply"]);

    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.contains("missing field"), "{err}");
    assert!(err.contains("allow_apply"), "{err}");
    assert!(ws.calls().is_empty());
}

#[test]
fn test_policy_flag_after_subcommand() {
    let ws = Workspace::new("not: a policy\n");
    fs::write(ws.path().join("alt.yml"), POLICY).unwrap();
    let output = ws.run(&["verify", "--policy", "alt.yml"]);
    assert!(output.status.success(), "{}", stderr(&output));
}

#[test]
fn test_doctor_reports_missing_tools() {
    let ws = Workspace::new(POLICY);
    let output = ws
        .command(&["doctor"])
        .env("SECURETF_COSIGN", "securetf-nonexistent-cosign")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("cosign: not found"));
}

#[test]
fn test_version_flag() {
    let output = Command::new(securetf_bin())
        .arg("--version")
        .output()
        .expect("failed to execute securetf");

    assert!(output.status.success());
    assert!(
        stdout(&output).contains("securetf"),
        "version output should contain 'securetf'"
    );
}
