//! Default provenance predicate generation.
//!
//! The predicate is the unsigned payload that `cosign attest-blob` wraps into
//! a DSSE envelope. It binds the artifact's SHA-256 to a build timestamp and,
//! when available, the git revision the artifact was taken from.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{fs, io::Read, path::Path};
use time::{macros::format_description, OffsetDateTime};

pub const BUILDER_ID: &str = "securetf-local";
pub const BUILD_TOOL: &str = "terraform";
pub const DEFAULT_PREDICATE_PATH: &str = "provenance.generated.json";
pub const DEFAULT_ATTESTATION_TYPE: &str = "application/vnd.terrasign.provenance+json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predicate {
    pub artifact: ArtifactInfo,
    pub build: BuildInfo,
    pub vcs: VcsInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactInfo {
    pub path: String,
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    pub timestamp_utc: String,
    pub builder_id: String,
    pub tool: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VcsInfo {
    /// Empty when no revision was available.
    pub git_commit: String,
}

/// Streams `path` through SHA-256 in 64 KiB chunks.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut f = fs::File::open(path).map_err(|e| Error::io("open", path, e))?;
    let mut h = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = f.read(&mut buf).map_err(|e| Error::io("read", path, e))?;
        if n == 0 {
            break;
        }
        h.update(&buf[..n]);
    }
    Ok(hex::encode(h.finalize()))
}

/// Current UTC time as `YYYY-MM-DDTHH:MM:SSZ`.
pub fn utc_timestamp() -> Result<String> {
    Ok(OffsetDateTime::now_utc().format(format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second]Z"
    ))?)
}

pub fn default_predicate(
    recorded_path: &str,
    sha256: String,
    git_commit: Option<&str>,
) -> Result<Predicate> {
    Ok(Predicate {
        artifact: ArtifactInfo {
            path: recorded_path.to_string(),
            sha256,
        },
        build: BuildInfo {
            timestamp_utc: utc_timestamp()?,
            builder_id: BUILDER_ID.to_string(),
            tool: BUILD_TOOL.to_string(),
        },
        vcs: VcsInfo {
            git_commit: git_commit.unwrap_or_default().to_string(),
        },
    })
}

/// Writes `predicate` as 2-space indented JSON with one trailing newline.
///
/// The file is overwritten in place, not replaced atomically.
pub fn write_predicate(predicate: &Predicate, out: &Path) -> Result<()> {
    let mut body = serde_json::to_string_pretty(predicate)?;
    body.push('\n');
    fs::write(out, body).map_err(|e| Error::io("write", out, e))
}

/// Hashes `base/artifact` and writes the default predicate to `out`.
///
/// `artifact` is recorded exactly as given, not as resolved against `base`.
/// An absolute `artifact` ignores `base`.
pub fn write_default_predicate(
    artifact: &str,
    base: &Path,
    out: &Path,
    git_commit: Option<&str>,
) -> Result<Predicate> {
    let predicate = default_predicate(artifact, sha256_file(&base.join(artifact))?, git_commit)?;
    write_predicate(&predicate, out)?;
    Ok(predicate)
}
