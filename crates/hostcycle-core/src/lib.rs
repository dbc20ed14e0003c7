//! `hostcycle-core`: reboot a remote host and block until it is manageable
//! again.
//!
//! # Architecture
//!
//! ```text
//! RestartOrchestrator
//!     │  detect ─► issue ─► await down ─► await up (ping) ─► await up (management) ─► handoff
//!     ▼
//! ConvergenceWaiter   ← polls one Probe until the goal state, with cancel + budget
//!     │
//!     ├── PingProbe        (system `ping`, one echo request)
//!     └── ManagementProbe  (identity query through a RemoteExec transport)
//!                              ├── SshExec    (ssh / sshpass -e)
//!                              └── WinRmExec  (PowerShell remoting)
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod handoff;
pub mod management;
pub mod orchestrator;
pub mod probe;
pub mod reachability;
pub mod target;
pub mod transport;
pub mod waiter;

#[cfg(test)]
mod testing;

pub use clock::{CancelFlag, Clock, SystemClock};
pub use error::{HostcycleError, Result};
pub use handoff::{Handoff, HandoffContext, StartAgentHandoff};
pub use management::ManagementProbe;
pub use orchestrator::{
    PollIntervals, RestartOrchestrator, RestartOutcome, RestartPhase, RestartReport,
    RestartRequest, StepRecord,
};
pub use probe::{FaultKind, Probe, ProbeFault, ProbeOutcome};
pub use reachability::PingProbe;
pub use target::{Credentials, Target};
pub use transport::{RemoteExec, TransportConfig};
pub use waiter::{ConvergenceWaiter, WaitGoal, WaitOptions, WaitOutcome};
