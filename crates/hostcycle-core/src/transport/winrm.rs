use super::{require_tool, run_checked, run_status, RemoteExec};
use crate::error::Result;
use crate::probe::ProbeFault;
use crate::target::Target;
use std::process::Command;

const HOST_ENV: &str = "HOSTCYCLE_HOST";
const USER_ENV: &str = "HOSTCYCLE_USER";
const SECRET_ENV: &str = "HOSTCYCLE_SECRET";
const DELAY_ENV: &str = "HOSTCYCLE_DELAY";
const COMMAND_ENV: &str = "HOSTCYCLE_COMMAND";

/// Builds `$hc` (a splat table of connection parameters) from the
/// environment. The secret becomes a `SecureString` inside the script.
const CONNECTION_PRELUDE: &str = r#"$ErrorActionPreference = 'Stop'
$hc = @{ ComputerName = $env:HOSTCYCLE_HOST }
if ($env:HOSTCYCLE_USER -and $env:HOSTCYCLE_SECRET) {
  $pw = ConvertTo-SecureString $env:HOSTCYCLE_SECRET -AsPlainText -Force
  $hc.Credential = New-Object System.Management.Automation.PSCredential($env:HOSTCYCLE_USER, $pw)
  $hc.Authentication = 'Negotiate'
}
"#;

const IDENTITY_SCRIPT: &str = r#"try { Test-WSMan @hc | Out-Null; exit 0 } catch { exit 1 }"#;

const REBOOT_SCRIPT: &str = r#"$hc.Remove('Authentication')
Invoke-Command @hc -ArgumentList $env:HOSTCYCLE_DELAY -ScriptBlock { param($d) shutdown /r /t $d }"#;

const EXECUTE_SCRIPT: &str = r#"$hc.Remove('Authentication')
Invoke-Command @hc -ScriptBlock ([scriptblock]::Create($env:HOSTCYCLE_COMMAND))
if (-not $?) { exit 1 }"#;

/// WinRM transport driven through PowerShell remoting.
///
/// Host, user, secret, and any command text are handed to the script via
/// environment variables so none of them need quoting or appear in argv.
#[derive(Debug, Clone)]
pub struct WinRmExec {
    shell: String,
}

impl WinRmExec {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    pub(crate) fn build_command(&self, target: &Target, body: &str) -> Command {
        let mut cmd = Command::new(&self.shell);
        cmd.args(["-NoProfile", "-NonInteractive", "-Command"])
            .arg(format!("{CONNECTION_PRELUDE}{body}"))
            .env(HOST_ENV, &target.address)
            .env_remove(USER_ENV)
            .env_remove(SECRET_ENV);

        if let Some(creds) = &target.credentials {
            cmd.env(USER_ENV, &creds.username);
            if let Some(secret) = creds.secret() {
                cmd.env(SECRET_ENV, secret);
            }
        }
        cmd
    }
}

impl RemoteExec for WinRmExec {
    fn name(&self) -> &str {
        "winrm"
    }

    fn preflight(&self, _target: &Target) -> std::result::Result<(), ProbeFault> {
        require_tool(&self.shell)
    }

    fn identity(&self, target: &Target) -> std::result::Result<bool, ProbeFault> {
        run_status(self.build_command(target, IDENTITY_SCRIPT))
    }

    fn reboot(&self, target: &Target, delay_secs: u32) -> Result<()> {
        let mut cmd = self.build_command(target, REBOOT_SCRIPT);
        cmd.env(DELAY_ENV, delay_secs.to_string());
        run_checked(cmd, target)
    }

    fn execute(&self, target: &Target, command: &str) -> Result<()> {
        let mut cmd = self.build_command(target, EXECUTE_SCRIPT);
        cmd.env(COMMAND_ENV, command);
        run_checked(cmd, target)
    }
}
