//! Scoped invocation of GDAL command-line tools.
use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::ffi::{OsStr, OsString};
use std::process::{Command, ExitStatus, Stdio};
use tracing::{debug, warn};

/// Names of the command-line tools the converter stages invoke.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Tools {
    pub translate: String,
    pub merge: String,
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            translate: "gdal_translate".to_string(),
            merge: "gdal_merge.py".to_string(),
        }
    }
}

#[derive(Debug)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone)]
pub struct ExternalTool {
    program: String,
    args: Vec<OsString>,
}

impl ExternalTool {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: vec![],
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_owned()));
        self
    }

    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }

    /// Runs the tool to completion. A non-zero exit is an error carrying the
    /// captured stderr.
    pub fn run(&self) -> Result<ToolOutput> {
        debug!("Running: {}", self.command_line());
        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| PipelineError::ToolLaunch {
                program: self.program.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !stdout.is_empty() {
            debug!("{}: {}", self.program, stdout);
        }
        if !stderr.is_empty() {
            warn!("{}: {}", self.program, stderr);
        }

        if !output.status.success() {
            let code = output
                .status
                .code()
                .map(|c| format!("exit code {c}"))
                .unwrap_or_else(|| "a signal".to_string());
            return Err(PipelineError::Tool {
                program: self.program.clone(),
                code,
                stderr,
            });
        }

        Ok(ToolOutput {
            status: output.status,
            stdout,
            stderr,
        })
    }
}

/// True when `program --version` can be launched and exits cleanly.
pub fn is_available(program: &str) -> bool {
    Command::new(program)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}
