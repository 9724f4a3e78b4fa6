// hybridiso/src/command.rs
use crate::error::{IsoError, Result};
use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
    process::Command,
};

/// Captured output of a successful external command.
#[derive(Clone, Debug, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs an external command and captures its output.
///
/// A non-zero exit status is turned into [`IsoError::Command`].
pub fn run_command<S: AsRef<OsStr>>(command: &Path, args: &[S]) -> Result<CommandOutput> {
    let command_line = format_command_line(command, args);
    log::debug!("EXEC: [{}]", command_line);

    let output = Command::new(command).args(args).output().map_err(|e| {
        IsoError::Tool(format!("Failed to execute {}: {}", command.display(), e))
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    if output.status.success() {
        Ok(CommandOutput { stdout, stderr })
    } else {
        Err(IsoError::Command {
            command: command_line,
            status: output.status.code(),
            stderr,
        })
    }
}

/// Returns the first candidate that exists, either as a path or as an
/// executable in `$PATH`.
pub fn find_tool(candidates: &[&str]) -> Option<PathBuf> {
    candidates.iter().find_map(|candidate| {
        let path = Path::new(candidate);
        if path.is_absolute() {
            path.is_file().then(|| path.to_path_buf())
        } else {
            which::which(candidate).ok()
        }
    })
}

fn format_command_line<S: AsRef<OsStr>>(command: &Path, args: &[S]) -> String {
    let mut line = command.display().to_string();
    for arg in args {
        line.push(' ');
        line.push_str(&arg.as_ref().to_string_lossy());
    }
    line
}
