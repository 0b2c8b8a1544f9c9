//! Scripted stand-in for the ISIS toolkit

use crate::runner::{CommandOutput, Invocation, RunError, ToolRunner};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

/// How a matching invocation misbehaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Exit status 1
    Fail,
    /// Exit status 0 without writing anything
    Hollow,
}

struct Rule {
    tool: &'static str,
    /// Substring of the `from` parameter
    needle: &'static str,
    /// Only when `web=true` is present (`Some(true)`) or absent (`Some(false)`)
    web: Option<bool>,
    /// Remaining triggers, `None` for unlimited
    remaining: Option<usize>,
    fault: Fault,
}

/// Simulates each tool by writing the files the real one would
pub struct ScriptedRunner {
    calls: Mutex<Vec<Invocation>>,
    rules: Mutex<Vec<Rule>>,
    missing: Vec<&'static str>,
    bands: usize,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            rules: Mutex::new(Vec::new()),
            missing: Vec::new(),
            bands: 2,
        }
    }

    /// Pretend `tool` is not installed
    pub fn without(mut self, tool: &'static str) -> Self {
        self.missing.push(tool);
        self
    }

    pub fn fail(self, tool: &'static str, needle: &'static str, times: Option<usize>) -> Self {
        self.rule(tool, needle, None, times, Fault::Fail)
    }

    pub fn rule(
        self,
        tool: &'static str,
        needle: &'static str,
        web: Option<bool>,
        times: Option<usize>,
        fault: Fault,
    ) -> Self {
        self.rules
            .lock()
            .unwrap()
            .push(Rule {
                tool,
                needle,
                web,
                remaining: times,
                fault,
            });
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    /// Command lines of every call to `tool`
    pub fn lines(&self, tool: &str) -> Vec<String> {
        self.calls()
            .iter()
            .filter(|c| c.tool == tool)
            .map(|c| c.command_line())
            .collect()
    }

    fn fault_for(&self, invocation: &Invocation) -> Option<Fault> {
        let from = invocation.get("from").unwrap_or_default();
        let web = invocation.get("web") == Some("true");
        let mut rules = self.rules.lock().unwrap();

        let rule = rules.iter_mut().find(|r| {
            r.tool == invocation.tool
                && from.contains(r.needle)
                && r.web.map_or(true, |w| w == web)
                && r.remaining != Some(0)
        })?;
        if let Some(n) = rule.remaining.as_mut() {
            *n -= 1;
        }
        Some(rule.fault)
    }

    fn simulate(&self, invocation: &Invocation) -> std::io::Result<()> {
        let from = invocation.get("from").unwrap_or_default();
        let to = invocation.get("to").map(PathBuf::from);

        match (invocation.tool.as_str(), to) {
            ("marci2isis" | "marcical" | "cam2map", Some(to)) => {
                write_stamped(&to, &format!("{} <- {}\n", invocation.tool, from))
            }
            ("explode", Some(to)) => {
                for band in 1..=self.bands {
                    let path = PathBuf::from(format!("{}.band{:04}.cub", to.display(), band));
                    write_stamped(&path, &format!("band {} <- {}\n", band, from))?;
                }
                Ok(())
            }
            ("isis2std", Some(to)) => write_stamped(
                Path::new(&format!("{}.png", to.display())),
                &format!("png <- {}\n", from),
            ),
            _ => Ok(()),
        }
    }
}

/// Write `content` and set the mtime from the precise clock, so a rewrite
/// right after an earlier write still shows up as modified
fn write_stamped(path: &Path, content: &str) -> std::io::Result<()> {
    std::fs::write(path, content)?;
    std::fs::File::options()
        .write(true)
        .open(path)?
        .set_modified(SystemTime::now())
}

impl ToolRunner for ScriptedRunner {
    fn is_available(&self, tool: &str) -> bool {
        !self.missing.contains(&tool)
    }

    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, RunError> {
        self.calls.lock().unwrap().push(invocation.clone());

        if !self.is_available(&invocation.tool) {
            return Err(RunError::Unavailable {
                tool: invocation.tool.clone(),
                reason: "No such file or directory".to_string(),
            });
        }

        let fault = self.fault_for(invocation);
        if fault == Some(Fault::Fail) {
            return Ok(CommandOutput {
                exit_code: Some(1),
                stderr: format!("**ERROR** simulated {} failure\n", invocation.tool),
                ..Default::default()
            });
        }

        if fault.is_none() {
            self.simulate(invocation).map_err(|e| RunError::Io {
                tool: invocation.tool.clone(),
                source: e,
            })?;
        }

        Ok(CommandOutput {
            exit_code: Some(0),
            ..Default::default()
        })
    }
}
