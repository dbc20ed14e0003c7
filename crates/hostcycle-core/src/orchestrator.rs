//! Restart sequencing for a single host.
//!
//! ```text
//! Detect ──► Issue ──► AwaitDown ──► AwaitUpPrimary ──► AwaitUpManagement ──► Converged
//!   │                    │               (ping only)          (always)            │
//!   └─ one ping attempt  └─ ping if usable, else management                      └─ handoff
//! ```
//!
//! Reachability recovers before the management stack does, so ping is only
//! a cheap early signal. The management wait is what certifies the host.

use crate::clock::{CancelFlag, Clock, SystemClock};
use crate::error::{HostcycleError, Result};
use crate::handoff::{Handoff, HandoffContext};
use crate::management::ManagementProbe;
use crate::probe::{FaultKind, Probe, ProbeOutcome};
use crate::reachability::PingProbe;
use crate::target::Target;
use crate::transport::RemoteExec;
use crate::waiter::{ConvergenceWaiter, WaitGoal, WaitOptions, WaitOutcome};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Request / intervals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartRequest {
    /// Passed unchanged to the remote reboot command.
    pub delay_secs: u32,
    /// Budget for each individual wait. `None` waits indefinitely.
    pub max_wait: Option<Duration>,
}

impl RestartRequest {
    pub fn new(delay_secs: u32) -> Self {
        Self {
            delay_secs,
            max_wait: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollIntervals {
    pub ping: Duration,
    pub management: Duration,
}

impl Default for PollIntervals {
    fn default() -> Self {
        let ping = Duration::from_secs(1);
        Self {
            ping,
            management: ping * 5,
        }
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartPhase {
    Detect,
    Issue,
    AwaitDown,
    AwaitUpPrimary,
    AwaitUpManagement,
    Converged,
}

impl RestartPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RestartPhase::Detect => "detect",
            RestartPhase::Issue => "issue",
            RestartPhase::AwaitDown => "await_down",
            RestartPhase::AwaitUpPrimary => "await_up_primary",
            RestartPhase::AwaitUpManagement => "await_up_management",
            RestartPhase::Converged => "converged",
        }
    }
}

impl fmt::Display for RestartPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RestartOutcome {
    Converged,
    Cancelled { phase: RestartPhase },
    TimedOut { phase: RestartPhase },
}

impl RestartOutcome {
    pub fn is_converged(&self) -> bool {
        matches!(self, RestartOutcome::Converged)
    }
}

/// One completed wait.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub phase: RestartPhase,
    pub probe: String,
    pub wait: WaitOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct RestartReport {
    pub run_id: String,
    pub host: String,
    pub can_ping: bool,
    pub delay_secs: u32,
    pub outcome: RestartOutcome,
    pub steps: Vec<StepRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// RestartOrchestrator
// ---------------------------------------------------------------------------

pub struct RestartOrchestrator<'a> {
    target: &'a Target,
    exec: &'a dyn RemoteExec,
    handoff: &'a dyn Handoff,
    reachability: Box<dyn Probe + Send + 'a>,
    clock: Arc<dyn Clock>,
    cancel: CancelFlag,
    intervals: PollIntervals,
}

impl<'a> RestartOrchestrator<'a> {
    pub fn new(target: &'a Target, exec: &'a dyn RemoteExec, handoff: &'a dyn Handoff) -> Self {
        Self {
            target,
            exec,
            handoff,
            reachability: Box::new(PingProbe::new(
                target.address.clone(),
                Duration::from_secs(2),
            )),
            clock: Arc::new(SystemClock),
            cancel: CancelFlag::new(),
            intervals: PollIntervals::default(),
        }
    }

    pub fn with_reachability(mut self, probe: impl Probe + Send + 'a) -> Self {
        self.reachability = Box::new(probe);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_intervals(mut self, intervals: PollIntervals) -> Self {
        self.intervals = intervals;
        self
    }

    /// Reboot the target and block until it is manageable again, then run
    /// the handoff once.
    ///
    /// Returns `Err` for a misconfigured management transport (checked before
    /// anything disruptive happens), a failed reboot dispatch, or a failed
    /// handoff. Cancellation and exhausted wait budgets are reported through
    /// [`RestartOutcome`].
    pub fn restart(&self, request: &RestartRequest) -> Result<RestartReport> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("restart", host = %self.target.name, run_id = %run_id);
        let _guard = span.enter();

        let started_at = Utc::now();
        let mut steps = Vec::new();

        self.exec
            .preflight(self.target)
            .map_err(|fault| HostcycleError::ProbeMisconfigured {
                probe: format!("management ({})", self.exec.name()),
                message: fault.message,
            })?;

        let can_ping = self.detect();

        let outcome = self.sequence(&run_id, request, can_ping, &mut steps)?;

        Ok(RestartReport {
            run_id,
            host: self.target.name.clone(),
            can_ping,
            delay_secs: request.delay_secs,
            outcome,
            steps,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// One reachability attempt; ping is usable only if it answers now.
    fn detect(&self) -> bool {
        let can_ping = match self.reachability.attempt() {
            ProbeOutcome::Up => true,
            ProbeOutcome::Down => false,
            ProbeOutcome::Indeterminate(fault) => {
                if fault.kind == FaultKind::Configuration {
                    tracing::warn!(%fault, "ping unavailable on this machine");
                }
                false
            }
        };
        tracing::debug!(
            "can {}use ping for validation",
            if can_ping { "" } else { "NOT " }
        );
        can_ping
    }

    fn sequence(
        &self,
        run_id: &str,
        request: &RestartRequest,
        can_ping: bool,
        steps: &mut Vec<StepRecord>,
    ) -> Result<RestartOutcome> {
        if self.cancel.is_cancelled() {
            return Ok(RestartOutcome::Cancelled {
                phase: RestartPhase::Issue,
            });
        }

        tracing::info!(
            host = %self.target,
            delay_secs = request.delay_secs,
            "executing restart command"
        );
        self.exec.reboot(self.target, request.delay_secs)?;

        let waiter = ConvergenceWaiter::new(self.clock.clone(), self.cancel.clone());
        let management = ManagementProbe::new(self.exec, self.target);
        let ping_every = WaitOptions::every(self.intervals.ping).with_max_wait(request.max_wait);
        let mgmt_every =
            WaitOptions::every(self.intervals.management).with_max_wait(request.max_wait);

        tracing::info!("waiting for server to stop responding");
        let (down_probe, down_every) = if can_ping {
            (&*self.reachability as &dyn Probe, ping_every)
        } else {
            (&management as &dyn Probe, mgmt_every)
        };
        if let Some(outcome) = self.await_phase(
            &waiter,
            RestartPhase::AwaitDown,
            down_probe,
            WaitGoal::AwaitingDown,
            down_every,
            steps,
        )? {
            return Ok(outcome);
        }
        tracing::info!("server stopped responding");

        if can_ping {
            tracing::info!("waiting for server to respond to ping again");
            if let Some(outcome) = self.await_phase(
                &waiter,
                RestartPhase::AwaitUpPrimary,
                &*self.reachability,
                WaitGoal::AwaitingUp,
                ping_every,
                steps,
            )? {
                return Ok(outcome);
            }
            tracing::info!("server started to respond");
        }

        tracing::info!("waiting for server to respond to management commands");
        if let Some(outcome) = self.await_phase(
            &waiter,
            RestartPhase::AwaitUpManagement,
            &management,
            WaitGoal::AwaitingUp,
            mgmt_every,
            steps,
        )? {
            return Ok(outcome);
        }
        tracing::info!("server responds to management commands; restart complete");

        let ctx = HandoffContext {
            run_id,
            cancel: &self.cancel,
        };
        self.handoff.hand_off(self.target, &ctx)?;

        Ok(RestartOutcome::Converged)
    }

    /// Run one wait and record it. `Some` means the sequence must stop.
    fn await_phase(
        &self,
        waiter: &ConvergenceWaiter,
        phase: RestartPhase,
        probe: &dyn Probe,
        goal: WaitGoal,
        options: WaitOptions,
        steps: &mut Vec<StepRecord>,
    ) -> Result<Option<RestartOutcome>> {
        let wait = waiter.wait(probe, goal, options)?;
        steps.push(StepRecord {
            phase,
            probe: probe.name().to_string(),
            wait,
        });
        Ok(match wait {
            WaitOutcome::Reached { .. } => None,
            WaitOutcome::Cancelled { .. } => Some(RestartOutcome::Cancelled { phase }),
            WaitOutcome::TimedOut { .. } => Some(RestartOutcome::TimedOut { phase }),
        })
    }
}
