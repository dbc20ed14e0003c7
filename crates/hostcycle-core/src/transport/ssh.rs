use super::{require_tool, run_checked, run_status, RemoteExec};
use crate::error::Result;
use crate::probe::ProbeFault;
use crate::target::Target;
use std::process::Command;

/// Environment variable `sshpass -e` reads the password from.
const SSHPASS_ENV: &str = "SSHPASS";

/// OpenSSH client transport. Key-based auth runs `ssh` in batch mode; a
/// configured secret switches to `sshpass -e` with the password in `SSHPASS`.
#[derive(Debug, Clone)]
pub struct SshExec {
    port: u16,
    connect_timeout_secs: u32,
}

impl SshExec {
    pub fn new(port: u16, connect_timeout_secs: u32) -> Self {
        Self {
            port,
            connect_timeout_secs,
        }
    }

    fn destination(target: &Target) -> String {
        match &target.credentials {
            Some(c) => format!("{}@{}", c.username, target.address),
            None => target.address.clone(),
        }
    }

    pub(crate) fn build_command(&self, target: &Target, remote: &str) -> Command {
        let secret = target.credentials.as_ref().and_then(|c| c.secret());

        let mut cmd = match secret {
            Some(secret) => {
                let mut cmd = Command::new("sshpass");
                cmd.arg("-e").arg("ssh").env(SSHPASS_ENV, secret);
                cmd.args(["-o", "BatchMode=no"]);
                cmd.args(["-o", "PreferredAuthentications=password,keyboard-interactive"]);
                cmd
            }
            None => {
                let mut cmd = Command::new("ssh");
                cmd.args(["-o", "BatchMode=yes"]);
                cmd
            }
        };

        cmd.args(["-o", "StrictHostKeyChecking=accept-new"])
            .arg("-o")
            .arg(format!("ConnectTimeout={}", self.connect_timeout_secs))
            .arg("-p")
            .arg(self.port.to_string())
            .arg(Self::destination(target))
            .arg(remote);
        cmd
    }
}

const PRIVILEGE_CHECK: &str = "sudo -n true";
const REBOOT_COMMAND: &str = "sudo -n shutdown -r now";

fn reboot_script(delay_secs: u32) -> String {
    detached_script(PRIVILEGE_CHECK, REBOOT_COMMAND, delay_secs)
}

/// Run `check` in the foreground, then detach `command` so the ssh session
/// returns before the host goes down. A failing check makes the session exit
/// non-zero. `&` binds to a whole and-or list in sh, so the check must be its
/// own statement.
fn detached_script(check: &str, command: &str, delay_secs: u32) -> String {
    format!("{check} || exit 1; nohup sh -c 'sleep {delay_secs}; {command}' >/dev/null 2>&1 &")
}

impl RemoteExec for SshExec {
    fn name(&self) -> &str {
        "ssh"
    }

    fn preflight(&self, target: &Target) -> std::result::Result<(), ProbeFault> {
        require_tool("ssh")?;
        if target
            .credentials
            .as_ref()
            .and_then(|c| c.secret())
            .is_some()
        {
            require_tool("sshpass")?;
        }
        Ok(())
    }

    fn identity(&self, target: &Target) -> std::result::Result<bool, ProbeFault> {
        run_status(self.build_command(target, "true"))
    }

    fn reboot(&self, target: &Target, delay_secs: u32) -> Result<()> {
        run_checked(self.build_command(target, &reboot_script(delay_secs)), target)
    }

    fn execute(&self, target: &Target, command: &str) -> Result<()> {
        run_checked(self.build_command(target, command), target)
    }
}
