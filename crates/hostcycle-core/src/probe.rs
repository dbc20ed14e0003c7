//! The probe capability shared by the reachability and management channels.
//!
//! A probe performs one attempt and reports a tri-state [`ProbeOutcome`].
//! Faults carry a [`FaultKind`] so the waiter can tell "the host is not
//! answering" apart from "this probe can never work as configured".

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// Transport or protocol failure. Interpreted as a state signal.
    Connectivity,
    /// The probe cannot run at all (tool missing, bad arguments). Never retried.
    Configuration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeFault {
    pub kind: FaultKind,
    pub message: String,
}

impl ProbeFault {
    pub fn connectivity(message: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::Connectivity,
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::Configuration,
            message: message.into(),
        }
    }

    /// Classify a process spawn failure. A missing executable or a permission
    /// error on the executable is a configuration problem; anything else is
    /// treated as transient.
    pub fn from_spawn_error(program: &str, err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                Self::configuration(format!("cannot run '{program}': {err}"))
            }
            _ => Self::connectivity(format!("'{program}' failed: {err}")),
        }
    }
}

impl fmt::Display for ProbeFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FaultKind::Connectivity => write!(f, "connectivity fault: {}", self.message),
            FaultKind::Configuration => write!(f, "configuration fault: {}", self.message),
        }
    }
}

/// Result of a single probe attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProbeOutcome {
    Up,
    Down,
    /// The probe itself failed to execute.
    Indeterminate(ProbeFault),
}

impl ProbeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeOutcome::Up => "up",
            ProbeOutcome::Down => "down",
            ProbeOutcome::Indeterminate(_) => "indeterminate",
        }
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeOutcome::Indeterminate(fault) => write!(f, "indeterminate ({fault})"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// One probe channel against one host.
///
/// Implementations must acquire any transport handle inside `attempt` and
/// release it before returning.
pub trait Probe {
    /// Short channel name used in logs and errors (`ping`, `management`).
    fn name(&self) -> &str;

    fn attempt(&self) -> ProbeOutcome;
}

impl<P: Probe + ?Sized> Probe for &P {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn attempt(&self) -> ProbeOutcome {
        (**self).attempt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_binary_is_configuration_fault() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let fault = ProbeFault::from_spawn_error("ping", &err);
        assert_eq!(fault.kind, FaultKind::Configuration);
        assert!(fault.message.contains("ping"));
    }

    #[test]
    fn other_spawn_errors_are_connectivity_faults() {
        let err = std::io::Error::new(std::io::ErrorKind::Interrupted, "interrupted");
        let fault = ProbeFault::from_spawn_error("ssh", &err);
        assert_eq!(fault.kind, FaultKind::Connectivity);
    }

    #[test]
    fn outcome_json_is_tagged() {
        let json = serde_json::to_string(&ProbeOutcome::Up).unwrap();
        assert_eq!(json, r#"{"state":"up"}"#);

        let json =
            serde_json::to_string(&ProbeOutcome::Indeterminate(ProbeFault::connectivity("x")))
                .unwrap();
        assert!(json.contains(r#""state":"indeterminate""#));
        assert!(json.contains(r#""kind":"connectivity""#));
    }
}
