use crate::error::{CommandFailure, Error, Result};
use std::{io, path::Path, process::Command};

/// Runs external processes on behalf of the pipeline.
///
/// Implementations block until the child exits. There is no retry and no
/// timeout: a hung child hangs the caller.
pub trait Executor {
    /// Runs `argv[0]` with the remaining arguments and returns its stdout.
    ///
    /// # Errors
    ///
    /// [`Error::Command`] when the process exits non-zero, [`Error::Spawn`]
    /// when it cannot be launched at all.
    fn run(&self, argv: &[String], cwd: Option<&Path>) -> Result<String>;
}

impl<E: Executor + ?Sized> Executor for &E {
    fn run(&self, argv: &[String], cwd: Option<&Path>) -> Result<String> {
        (**self).run(argv, cwd)
    }
}

/// Spawns real child processes, inheriting the environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

impl Executor for SystemExecutor {
    fn run(&self, argv: &[String], cwd: Option<&Path>) -> Result<String> {
        let Some((program, args)) = argv.split_first() else {
            return Err(Error::Spawn {
                program: String::new(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "empty command line"),
            });
        };

        tracing::debug!(argv = %argv.join(" "), cwd = ?cwd, "running command");

        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        let out = cmd.output().map_err(|source| Error::Spawn {
            program: program.clone(),
            source,
        })?;

        let stdout = String::from_utf8_lossy(&out.stdout).into_owned();
        if out.status.success() {
            return Ok(stdout);
        }

        tracing::warn!(
            argv = %argv.join(" "),
            status = ?out.status.code(),
            "command exited non-zero"
        );
        Err(CommandFailure {
            argv: argv.to_vec(),
            status: out.status.code(),
            stdout,
            stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
        }
        .into())
    }
}
