//! Error types for securetf.
//!
//! Every failure the pipeline can hit is represented by [`Error`]. The
//! binary maps all of them to exit code 1; the worktree gate is not an
//! error at all and travels as [`crate::pipeline::Outcome`] instead.

use std::{fmt, io, path::PathBuf};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// An external process ran to completion but exited non-zero.
///
/// `Display` reproduces the full command line and both captured streams
/// verbatim. Nothing is truncated or redacted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFailure {
    pub argv: Vec<String>,
    /// `None` when the child was killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Command failed: {}", self.argv.join(" "))?;
        match self.status {
            Some(code) => writeln!(f, "Exit code: {code}")?,
            None => writeln!(f, "Exit code: terminated by signal")?,
        }
        writeln!(f, "STDOUT:\n{}", self.stdout)?;
        writeln!(f, "STDERR:\n{}", self.stderr)
    }
}

impl std::error::Error for CommandFailure {}

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("cannot read policy {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("invalid policy {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("invalid policy field `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Command(#[from] CommandFailure),

    #[error("failed to launch `{program}`: {source}")]
    Spawn { program: String, source: io::Error },

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error("{action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        source: io::Error,
    },

    #[error("formatting build timestamp: {0}")]
    Timestamp(#[from] time::error::Format),

    #[error("serializing predicate: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}
