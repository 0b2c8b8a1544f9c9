//! Runner that spawns the real toolkit executables

use super::{CommandOutput, Invocation, RunError, ToolRunner};
use crate::config::ToolSearch;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;

/// Spawns toolkit commands as child processes
pub struct ProcessRunner {
    search: ToolSearch,
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(search: ToolSearch, timeout: Duration) -> Self {
        Self { search, timeout }
    }

    fn resolve(&self, tool: &str) -> Result<PathBuf, which::Error> {
        match &self.search {
            ToolSearch::Path => which::which(tool),
            ToolSearch::Only(dir) => which_in_dir(tool, dir),
            ToolSearch::Preferred(dir) => which_in_dir(tool, dir).or_else(|_| which::which(tool)),
        }
    }
}

fn which_in_dir(tool: &str, dir: &Path) -> Result<PathBuf, which::Error> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| dir.to_path_buf());
    which::which_in(tool, Some(dir), cwd)
}

impl ToolRunner for ProcessRunner {
    fn is_available(&self, tool: &str) -> bool {
        self.resolve(tool).is_ok()
    }

    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, RunError> {
        let tool = invocation.tool.clone();
        let program = self.resolve(&tool).map_err(|e| RunError::Unavailable {
            tool: tool.clone(),
            reason: e.to_string(),
        })?;

        let start = Instant::now();
        let child = Command::new(&program)
            .args(invocation.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => RunError::Unavailable {
                    tool: tool.clone(),
                    reason: e.to_string(),
                },
                _ => RunError::Io {
                    tool: tool.clone(),
                    source: e,
                },
            })?;

        // Dropping the future on timeout drops the child, which kills it
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| RunError::Io {
                tool: tool.clone(),
                source: e,
            })?,
            Err(_) => {
                return Err(RunError::TimedOut {
                    tool,
                    timeout: self.timeout,
                })
            }
        };

        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            elapsed: start.elapsed(),
        })
    }
}
