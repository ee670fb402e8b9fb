//! External tool availability detection.
//!
//! securetf delegates everything interesting to `git`, `cosign` and
//! `terraform`. `securetf doctor` checks each one up front so a missing
//! binary shows up as an install hint instead of an opaque spawn error
//! halfway through an apply.
//!
//! Each tool runs its version command, and what matters is whether
//! the subprocess launches. A non-zero exit code is acceptable; only a
//! launch failure counts as "unavailable".

use crate::tools::Toolchain;
use std::process::{Command, Stdio};

/// Summary of which external tools are available.
#[derive(Debug, Clone)]
pub struct ToolAvailability {
    pub git: bool,
    pub cosign: bool,
    pub terraform: bool,
}

impl ToolAvailability {
    pub fn all_available(&self) -> bool {
        self.git && self.cosign && self.terraform
    }

    /// Returns a human-readable summary of missing tools with install hints.
    pub fn missing_tools_report(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if !self.git {
            missing.push("git: not found. Install: https://git-scm.com/downloads".to_string());
        }
        if !self.cosign {
            missing.push(
                "cosign: not found. Install: https://docs.sigstore.dev/cosign/system_config/installation/"
                    .to_string(),
            );
        }
        if !self.terraform {
            missing.push(
                "terraform: not found. Install: https://developer.hashicorp.com/terraform/install"
                    .to_string(),
            );
        }
        missing
    }
}

/// Checks the configured binaries. Never fails: a missing tool is `false`.
pub fn detect_tools(tools: &Toolchain) -> ToolAvailability {
    ToolAvailability {
        git: launches(&tools.git, &["--version"]),
        cosign: launches(&tools.cosign, &["version"]),
        terraform: launches(&tools.terraform, &["version"]),
    }
}

fn launches(cmd: &str, args: &[&str]) -> bool {
    let launched = Command::new(cmd)
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok();
    tracing::debug!(tool = cmd, launched, "checked tool");
    launched
}
