//! Invocation of ISIS toolkit commands
//!
//! The pipeline talks to the toolkit only through the `ToolRunner` trait, so
//! tests can substitute a scripted runner for the real executables.

pub mod process;

pub use process::ProcessRunner;

use std::future::Future;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// A single toolkit command with ISIS-style `key=value` parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub tool: String,
    pub params: Vec<(String, String)>,
}

impl Invocation {
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            params: Vec::new(),
        }
    }

    /// Append a `key=value` parameter
    pub fn param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.push((key.to_string(), value.into()));
        self
    }

    /// Append a path-valued parameter
    pub fn path_param(self, key: &str, path: &Path) -> Self {
        self.param(key, path.to_string_lossy().into_owned())
    }

    /// Value of a parameter, if present
    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Arguments as passed to the executable
    pub fn args(&self) -> Vec<String> {
        self.params
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect()
    }

    /// Command line for the log
    pub fn command_line(&self) -> String {
        std::iter::once(self.tool.clone())
            .chain(self.args())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Human-readable reason for a failed command
    pub fn failure_reason(&self) -> String {
        let status = match self.exit_code {
            Some(code) => format!("exit status {}", code),
            None => "terminated by signal".to_string(),
        };
        match last_line(&self.stderr) {
            Some(line) => format!("{}: {}", status, line),
            None => status,
        }
    }
}

fn last_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).filter(|l| !l.is_empty()).last()
}

#[derive(Error, Debug)]
pub enum RunError {
    #[error("{tool}: {reason}")]
    Unavailable { tool: String, reason: String },

    #[error("{tool} did not finish within {}s", timeout.as_secs())]
    TimedOut { tool: String, timeout: Duration },

    #[error("{tool}: {source}")]
    Io {
        tool: String,
        #[source]
        source: std::io::Error,
    },
}

/// Executes toolkit commands
///
/// `run` waits for the command to finish; callers never have more than one
/// command in flight.
pub trait ToolRunner {
    /// Whether `tool` can be resolved to an executable
    fn is_available(&self, tool: &str) -> bool;

    fn run(
        &self,
        invocation: &Invocation,
    ) -> impl Future<Output = Result<CommandOutput, RunError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_renders_keyword_params() {
        let invocation = Invocation::new("cam2map")
            .path_param("from", Path::new("/w/A.band0001.cub"))
            .param("map", "/w/t.map")
            .path_param("to", Path::new("/w/A.band0001.lev2.cub"));

        assert_eq!(
            invocation.command_line(),
            "cam2map from=/w/A.band0001.cub map=/w/t.map to=/w/A.band0001.lev2.cub"
        );
        assert_eq!(invocation.get("map"), Some("/w/t.map"));
        assert_eq!(invocation.get("web"), None);
    }

    #[test]
    fn test_failure_reason_uses_last_stderr_line() {
        let output = CommandOutput {
            exit_code: Some(1),
            stderr: "**ERROR** Unable to initialize camera model\n\n".to_string(),
            ..Default::default()
        };
        assert!(!output.success());
        assert_eq!(
            output.failure_reason(),
            "exit status 1: **ERROR** Unable to initialize camera model"
        );

        let killed = CommandOutput::default();
        assert_eq!(killed.failure_reason(), "terminated by signal");
    }
}
