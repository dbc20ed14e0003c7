//! Network-layer reachability through the system `ping` binary.
//!
//! Raw ICMP sockets need privileges the deploy user rarely has, so a single
//! echo request is delegated to `ping`. Exit codes differ between the iputils,
//! BSD, and Windows implementations; [`PingFlavor`] captures the differences.

use crate::probe::{Probe, ProbeFault, ProbeOutcome};
use std::process::{Command, Stdio};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingFlavor {
    /// Linux iputils: 0 reply, 1 no reply, 2 other error.
    Iputils,
    /// macOS / BSD: 0 reply, 2 no reply, 68 unknown host.
    Bsd,
    /// Windows: 0 reply, 1 anything else.
    Windows,
}

impl PingFlavor {
    pub fn current() -> Self {
        if cfg!(windows) {
            PingFlavor::Windows
        } else if cfg!(any(
            target_os = "macos",
            target_os = "freebsd",
            target_os = "openbsd",
            target_os = "netbsd"
        )) {
            PingFlavor::Bsd
        } else {
            PingFlavor::Iputils
        }
    }

    fn args(self, address: &str, timeout: Duration) -> Vec<String> {
        let secs = timeout.as_secs().max(1).to_string();
        match self {
            PingFlavor::Iputils => vec!["-c".into(), "1".into(), "-W".into(), secs, address.into()],
            PingFlavor::Bsd => vec!["-c".into(), "1".into(), "-t".into(), secs, address.into()],
            PingFlavor::Windows => vec![
                "-n".into(),
                "1".into(),
                "-w".into(),
                timeout.as_millis().max(1).to_string(),
                address.into(),
            ],
        }
    }

    /// Map a `ping` exit code to an outcome. `None` means killed by a signal.
    pub fn classify(self, code: Option<i32>) -> ProbeOutcome {
        let down_code = match self {
            PingFlavor::Iputils | PingFlavor::Windows => 1,
            PingFlavor::Bsd => 2,
        };
        match code {
            Some(0) => ProbeOutcome::Up,
            Some(c) if c == down_code => ProbeOutcome::Down,
            Some(c) => ProbeOutcome::Indeterminate(ProbeFault::connectivity(format!(
                "ping exited with {c}"
            ))),
            None => ProbeOutcome::Indeterminate(ProbeFault::connectivity(
                "ping terminated by signal",
            )),
        }
    }
}

/// Reachability probe: one echo request per attempt.
#[derive(Debug, Clone)]
pub struct PingProbe {
    address: String,
    timeout: Duration,
    flavor: PingFlavor,
    program: String,
}

impl PingProbe {
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
            flavor: PingFlavor::current(),
            program: "ping".to_string(),
        }
    }

    /// Override the executable. Mostly useful for tests and unusual PATHs.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.flavor.args(&self.address, self.timeout))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        cmd
    }
}

impl Probe for PingProbe {
    fn name(&self) -> &str {
        "ping"
    }

    fn attempt(&self) -> ProbeOutcome {
        match self.command().status() {
            Ok(status) => self.flavor.classify(status.code()),
            Err(e) => ProbeOutcome::Indeterminate(ProbeFault::from_spawn_error(&self.program, &e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::FaultKind;

    #[test]
    fn iputils_exit_codes() {
        let f = PingFlavor::Iputils;
        assert_eq!(f.classify(Some(0)), ProbeOutcome::Up);
        assert_eq!(f.classify(Some(1)), ProbeOutcome::Down);
        // Name resolution failure.
        assert!(matches!(
            f.classify(Some(2)),
            ProbeOutcome::Indeterminate(ProbeFault {
                kind: FaultKind::Connectivity,
                ..
            })
        ));
    }

    #[test]
    fn bsd_no_reply_is_exit_two() {
        let f = PingFlavor::Bsd;
        assert_eq!(f.classify(Some(2)), ProbeOutcome::Down);
        assert!(matches!(f.classify(Some(68)), ProbeOutcome::Indeterminate(_)));
    }

    #[test]
    fn signal_is_indeterminate() {
        assert!(matches!(
            PingFlavor::Windows.classify(None),
            ProbeOutcome::Indeterminate(_)
        ));
    }

    #[test]
    fn args_send_a_single_request() {
        let args = PingFlavor::Iputils.args("web-1", Duration::from_secs(2));
        assert_eq!(args, vec!["-c", "1", "-W", "2", "web-1"]);

        let args = PingFlavor::Windows.args("web-1", Duration::from_millis(1500));
        assert_eq!(args, vec!["-n", "1", "-w", "1500", "web-1"]);
    }

    #[test]
    fn missing_ping_binary_is_configuration_fault() {
        let probe = PingProbe::new("127.0.0.1", Duration::from_secs(1))
            .with_program("hostcycle-no-such-ping");
        let ProbeOutcome::Indeterminate(fault) = probe.attempt() else {
            panic!("expected Indeterminate")
        };
        assert_eq!(fault.kind, FaultKind::Configuration);
    }
}
