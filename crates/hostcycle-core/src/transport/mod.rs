//! Remote-management transports.
//!
//! A transport knows how to run three things against a host: the cheap
//! identity query used by the management probe, the reboot command, and an
//! arbitrary command used by the post-restart handoff. Everything is a local
//! subprocess (`ssh`, `pwsh`) spawned fresh per call.
//!
//! Secrets travel through the child's environment, never through argv.

pub mod ssh;
pub mod winrm;

use crate::error::{HostcycleError, Result};
use crate::probe::ProbeFault;
use crate::target::Target;
use serde::{Deserialize, Serialize};
use std::process::{Command, Stdio};

pub use ssh::SshExec;
pub use winrm::WinRmExec;

/// Command-execution contract used by the orchestrator, the management probe,
/// and the handoff.
pub trait RemoteExec: Send + Sync {
    fn name(&self) -> &str;

    /// Check that the local tooling this transport needs is present.
    /// Called once per restart before anything disruptive happens.
    fn preflight(&self, target: &Target) -> std::result::Result<(), ProbeFault>;

    /// Run the identity query. `Ok(true)` on exit code 0, `Ok(false)` on any
    /// other exit code, `Err` when the query could not be run.
    fn identity(&self, target: &Target) -> std::result::Result<bool, ProbeFault>;

    /// Schedule a reboot `delay_secs` seconds from now.
    fn reboot(&self, target: &Target, delay_secs: u32) -> Result<()>;

    /// Run `command` on the host and require a zero exit code.
    fn execute(&self, target: &Target, command: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// TransportConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum TransportConfig {
    Ssh {
        #[serde(default = "default_ssh_port")]
        port: u16,
        #[serde(default = "default_connect_timeout")]
        connect_timeout_secs: u32,
    },
    #[serde(rename = "winrm")]
    WinRm {
        /// PowerShell executable: `pwsh` or `powershell`.
        #[serde(default = "default_shell")]
        shell: String,
    },
}

fn default_ssh_port() -> u16 {
    22
}

fn default_connect_timeout() -> u32 {
    5
}

fn default_shell() -> String {
    "pwsh".to_string()
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig::Ssh {
            port: default_ssh_port(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl TransportConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            TransportConfig::Ssh { .. } => "ssh",
            TransportConfig::WinRm { .. } => "winrm",
        }
    }

    pub fn build(&self) -> Box<dyn RemoteExec> {
        match self {
            TransportConfig::Ssh {
                port,
                connect_timeout_secs,
            } => Box::new(SshExec::new(*port, *connect_timeout_secs)),
            TransportConfig::WinRm { shell } => Box::new(WinRmExec::new(shell.clone())),
        }
    }
}

// ---------------------------------------------------------------------------
// Process helpers
// ---------------------------------------------------------------------------

/// Fail with a configuration fault if `program` is not on PATH.
pub(crate) fn require_tool(program: &str) -> std::result::Result<(), ProbeFault> {
    which::which(program)
        .map(|_| ())
        .map_err(|e| ProbeFault::configuration(format!("'{program}' not found on PATH: {e}")))
}

/// Run a command for its exit status only. Output is discarded.
pub(crate) fn run_status(mut cmd: Command) -> std::result::Result<bool, ProbeFault> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    let status = cmd
        .status()
        .map_err(|e| ProbeFault::from_spawn_error(&program, &e))?;
    Ok(status.success())
}

/// Run a command and map a spawn failure or non-zero exit to
/// [`HostcycleError::Remote`], including the head of stderr.
pub(crate) fn run_checked(mut cmd: Command, target: &Target) -> Result<()> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let output = cmd.output().map_err(|e| HostcycleError::Remote {
        host: target.name.clone(),
        message: format!("failed to spawn '{program}': {e}"),
    })?;

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let hint = stderr.trim().chars().take(500).collect::<String>();
    let code = output
        .status
        .code()
        .map(|c| c.to_string())
        .unwrap_or_else(|| "signal".to_string());
    Err(HostcycleError::Remote {
        host: target.name.clone(),
        message: if hint.is_empty() {
            format!("'{program}' exited with {code}")
        } else {
            format!("'{program}' exited with {code}: {hint}")
        },
    })
}
