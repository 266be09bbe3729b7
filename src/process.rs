//! External tool invocation.
//!
//! Every archive, index, compression and signing step goes through the
//! [`ToolRunner`] capability so pipelines never spawn processes directly.
//! [`HostTools`] runs real binaries; tests plug in a fake.
//!
//! # Example
//!
//! ```rust,ignore
//! use ankor_release::process::{Cmd, HostTools};
//!
//! let out = Cmd::new("xz")
//!     .args(["-9", "-c"])
//!     .arg_path(Path::new("Packages"))
//!     .error_msg("xz failed. Install xz-utils.")
//!     .run(&HostTools)?;
//! ```

use anyhow::{Context, Result};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

use crate::error::PipelineError;

/// Captured result of one tool invocation.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    /// Exit code; `None` when the process was killed by a signal.
    pub status: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

/// Capability to locate and run external tools.
pub trait ToolRunner {
    /// Whether `tool` can be found on the search path.
    fn is_available(&self, tool: &str) -> bool;

    /// Run `cmd` to completion and capture its output.
    ///
    /// A non-zero exit is reported through [`ToolOutput::status`], not as an
    /// error; only failures to launch the process are errors.
    fn run(&self, cmd: &Cmd) -> Result<ToolOutput>;
}

/// Runs tools found on the host `PATH`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostTools;

impl ToolRunner for HostTools {
    fn is_available(&self, tool: &str) -> bool {
        which::which(tool).is_ok()
    }

    fn run(&self, cmd: &Cmd) -> Result<ToolOutput> {
        let mut command = Command::new(cmd.program());
        command.args(cmd.arguments());
        if let Some(dir) = cmd.working_dir() {
            command.current_dir(dir);
        }

        let output = command
            .output()
            .with_context(|| format!("launching {}", cmd.program()))?;

        Ok(ToolOutput {
            status: output.status.code(),
            stdout: output.stdout,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Builder for a single tool invocation.
#[derive(Debug, Clone)]
pub struct Cmd {
    program: String,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    error_msg: Option<String>,
}

impl Cmd {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            error_msg: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn arg_path(self, path: &Path) -> Self {
        self.arg(path.as_os_str())
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    /// Message reported ahead of the tool's stderr when it fails.
    pub fn error_msg(mut self, msg: impl Into<String>) -> Self {
        self.error_msg = Some(msg.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[OsString] {
        &self.args
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    /// Arguments as lossy UTF-8, for logs and fakes.
    pub fn argv(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    /// Run through `tools`, turning a non-zero exit into
    /// [`PipelineError::ExternalTool`].
    pub fn run(&self, tools: &dyn ToolRunner) -> Result<ToolOutput> {
        debug!(
            program = %self.program,
            args = ?self.argv(),
            cwd = ?self.cwd,
            "running external tool"
        );

        let output = tools.run(self)?;
        if output.success() {
            return Ok(output);
        }

        let status = match output.status {
            Some(code) => format!("exit code {code}"),
            None => "terminated by signal".to_string(),
        };
        let stderr = output.stderr.trim();
        let message = match (&self.error_msg, stderr.is_empty()) {
            (Some(msg), true) => msg.clone(),
            (Some(msg), false) => format!("{msg}\n{stderr}"),
            (None, false) => stderr.to_string(),
            (None, true) => "no diagnostic output".to_string(),
        };

        Err(PipelineError::ExternalTool {
            tool: self.program.clone(),
            status,
            message,
        }
        .into())
    }
}
