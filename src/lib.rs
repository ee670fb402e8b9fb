//! # securetf
//!
//! Policy-gated Terraform enforcement using Sigstore attestations.
//!
//! securetf is a thin sequencing layer over three external tools: `git`,
//! `cosign` and `terraform`. It signs a provenance predicate for a Terraform
//! artifact, verifies the resulting attestation bundle, and refuses to run
//! `terraform plan`/`apply` unless that verification passed in the same
//! invocation.
//!
//! ## Security Properties
//!
//! - **`#![forbid(unsafe_code)]`**: No `unsafe` blocks anywhere.
//! - **Delegated crypto**: Signing and verification are performed by
//!   `cosign`, not by securetf. The only cryptographic operation here is
//!   SHA-256 hashing of the artifact via the `sha2` crate.
//! - **Fail-closed policy**: every policy key is required and strictly typed.
//! - **Bounded policy reads**: the policy file is symlink-checked and
//!   size-bounded via [`fs_guard::read_validated`].
//!
//! ## Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`error`] | Error taxonomy |
//! | [`runner`] | Synchronous subprocess execution |
//! | [`fs_guard`] | Symlink-safe, size-bounded file reads |
//! | [`policy`] | YAML policy loading and validation |
//! | [`provenance`] | Artifact hashing and default predicate |
//! | [`tools`] | External tool names and command lines |
//! | [`toolcheck`] | External tool availability check |
//! | [`pipeline`] | attest / verify / apply sequencing |

#![forbid(unsafe_code)]

pub mod error;

/// Runs external processes and turns non-zero exits into
/// [`error::CommandFailure`].
pub mod runner;

/// Symlink-safe, size-bounded file reads.
pub mod fs_guard;

/// Policy model: loads `policy.yml` into an immutable, validated [`policy::Policy`].
pub mod policy;

/// SHA-256 artifact hashing and the default provenance predicate.
pub mod provenance;

pub mod tools;

pub mod toolcheck;

/// The attest, verify and apply operations.
pub mod pipeline;

pub use error::{CommandFailure, Error, PolicyError, Result};
pub use pipeline::{
    ApplyReport, AttestReport, AttestRequest, Outcome, Pipeline, VerifyRequest,
};
pub use policy::Policy;
pub use runner::{Executor, SystemExecutor};
pub use tools::Toolchain;
