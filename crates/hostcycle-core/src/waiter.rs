//! Polling engine that blocks until a probe reports the awaited state.
//!
//! Classification of one attempt:
//!
//! | outcome                        | AwaitingDown | AwaitingUp |
//! |--------------------------------|--------------|------------|
//! | `Up`                           | retry        | done       |
//! | `Down`                         | done         | retry      |
//! | connectivity fault             | done         | retry      |
//! | configuration fault            | error        | error      |
//!
//! Before every sleep the cancel flag and the optional wait budget are
//! checked. Without a budget the loop never gives up.

use crate::clock::{CancelFlag, Clock};
use crate::error::{HostcycleError, Result};
use crate::probe::{FaultKind, Probe, ProbeOutcome};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitGoal {
    AwaitingDown,
    AwaitingUp,
}

impl fmt::Display for WaitGoal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitGoal::AwaitingDown => f.write_str("down"),
            WaitGoal::AwaitingUp => f.write_str("up"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Sleep between attempts.
    pub interval: Duration,
    /// Give up once the next sleep would exceed this budget. `None` waits forever.
    pub max_wait: Option<Duration>,
}

impl WaitOptions {
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            max_wait: None,
        }
    }

    pub fn with_max_wait(mut self, max_wait: Option<Duration>) -> Self {
        self.max_wait = max_wait;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WaitOutcome {
    Reached { attempts: u32, elapsed_ms: u64 },
    Cancelled { attempts: u32 },
    TimedOut { attempts: u32 },
}

impl WaitOutcome {
    pub fn is_reached(&self) -> bool {
        matches!(self, WaitOutcome::Reached { .. })
    }
}

pub struct ConvergenceWaiter {
    clock: Arc<dyn Clock>,
    cancel: CancelFlag,
}

impl ConvergenceWaiter {
    pub fn new(clock: Arc<dyn Clock>, cancel: CancelFlag) -> Self {
        Self { clock, cancel }
    }

    /// Poll `probe` until it reports `goal`.
    ///
    /// Returns `Err` only for configuration faults; connectivity faults are
    /// folded into the goal decision.
    pub fn wait(&self, probe: &dyn Probe, goal: WaitGoal, options: WaitOptions) -> Result<WaitOutcome> {
        let start = self.clock.now();
        let mut attempts: u32 = 0;

        loop {
            attempts = attempts.saturating_add(1);
            let outcome = probe.attempt();
            tracing::debug!(
                probe = probe.name(),
                attempt = attempts,
                %goal,
                %outcome,
                "probe attempt"
            );

            if reached(probe.name(), &outcome, goal)? {
                let elapsed = self.clock.now().saturating_duration_since(start);
                return Ok(WaitOutcome::Reached {
                    attempts,
                    elapsed_ms: elapsed.as_millis() as u64,
                });
            }

            if self.cancel.is_cancelled() {
                tracing::info!(probe = probe.name(), %goal, attempts, "wait cancelled");
                return Ok(WaitOutcome::Cancelled { attempts });
            }

            if let Some(budget) = options.max_wait {
                let elapsed = self.clock.now().saturating_duration_since(start);
                if elapsed + options.interval > budget {
                    tracing::warn!(
                        probe = probe.name(),
                        %goal,
                        attempts,
                        budget_secs = budget.as_secs(),
                        "wait budget exhausted"
                    );
                    return Ok(WaitOutcome::TimedOut { attempts });
                }
            }

            self.clock.sleep(options.interval);
        }
    }
}

fn reached(probe: &str, outcome: &ProbeOutcome, goal: WaitGoal) -> Result<bool> {
    match (outcome, goal) {
        (ProbeOutcome::Indeterminate(fault), _) if fault.kind == FaultKind::Configuration => {
            Err(HostcycleError::ProbeMisconfigured {
                probe: probe.to_string(),
                message: fault.message.clone(),
            })
        }
        // A fault while waiting for the host to disappear counts as "gone".
        // This also hides a broken probe behind a seemingly completed reboot.
        (ProbeOutcome::Indeterminate(fault), WaitGoal::AwaitingDown) => {
            tracing::warn!(probe, %fault, "probe fault while awaiting down; treating host as down");
            Ok(true)
        }
        (ProbeOutcome::Indeterminate(_), WaitGoal::AwaitingUp) => Ok(false),
        (ProbeOutcome::Up, WaitGoal::AwaitingUp) | (ProbeOutcome::Down, WaitGoal::AwaitingDown) => {
            Ok(true)
        }
        _ => Ok(false),
    }
}
