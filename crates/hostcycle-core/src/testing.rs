//! Test doubles shared by the unit tests in this crate.

use crate::clock::Clock;
use crate::error::{HostcycleError, Result};
use crate::handoff::{Handoff, HandoffContext};
use crate::probe::{Probe, ProbeFault, ProbeOutcome};
use crate::target::Target;
use crate::transport::RemoteExec;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// ─── Journal ──────────────────────────────────────────────────────────────

/// Ordered record of everything the doubles observed, shared between them.
#[derive(Debug, Clone, Default)]
pub(crate) struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub(crate) fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub(crate) fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

// ─── ManualClock ──────────────────────────────────────────────────────────

/// Clock whose `sleep` advances virtual time instantly and records the
/// requested duration.
pub(crate) struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub(crate) fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock().unwrap()
    }

    fn sleep(&self, duration: Duration) {
        *self.offset.lock().unwrap() += duration;
        self.sleeps.lock().unwrap().push(duration);
    }
}

// ─── ScriptedProbe ────────────────────────────────────────────────────────

/// Probe that replays a fixed list of outcomes, repeating the last one once
/// the list is exhausted.
pub(crate) struct ScriptedProbe {
    name: String,
    script: Mutex<VecDeque<ProbeOutcome>>,
    last: Mutex<ProbeOutcome>,
    calls: AtomicU32,
    journal: Option<Journal>,
}

impl ScriptedProbe {
    pub(crate) fn new(name: &str, script: Vec<ProbeOutcome>) -> Self {
        Self {
            name: name.to_string(),
            script: Mutex::new(script.into()),
            last: Mutex::new(ProbeOutcome::Down),
            calls: AtomicU32::new(0),
            journal: None,
        }
    }

    pub(crate) fn with_journal(mut self, journal: &Journal) -> Self {
        self.journal = Some(journal.clone());
        self
    }

    pub(crate) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Probe for ScriptedProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn attempt(&self) -> ProbeOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.script.lock().unwrap().pop_front() {
            *last = next;
        }
        if let Some(journal) = &self.journal {
            journal.push(format!("{}:{}", self.name, last.as_str()));
        }
        last.clone()
    }
}

// ─── RecordingExec ────────────────────────────────────────────────────────

/// Transport double. `identity` replays a script (repeating the last entry);
/// `reboot` and `execute` record their arguments.
pub(crate) struct RecordingExec {
    identity: Mutex<VecDeque<std::result::Result<bool, ProbeFault>>>,
    last_identity: Mutex<std::result::Result<bool, ProbeFault>>,
    identity_calls: AtomicU32,
    preflight: Option<ProbeFault>,
    fail_reboot: bool,
    reboots: Mutex<Vec<u32>>,
    executed: Mutex<Vec<String>>,
    journal: Option<Journal>,
}

impl RecordingExec {
    pub(crate) fn new(identity: Vec<std::result::Result<bool, ProbeFault>>) -> Self {
        Self {
            identity: Mutex::new(identity.into()),
            last_identity: Mutex::new(Ok(true)),
            identity_calls: AtomicU32::new(0),
            preflight: None,
            fail_reboot: false,
            reboots: Mutex::new(Vec::new()),
            executed: Mutex::new(Vec::new()),
            journal: None,
        }
    }

    pub(crate) fn with_journal(mut self, journal: &Journal) -> Self {
        self.journal = Some(journal.clone());
        self
    }

    pub(crate) fn with_preflight_fault(mut self, fault: ProbeFault) -> Self {
        self.preflight = Some(fault);
        self
    }

    pub(crate) fn failing_reboot(mut self) -> Self {
        self.fail_reboot = true;
        self
    }

    pub(crate) fn identity_calls(&self) -> u32 {
        self.identity_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn reboots(&self) -> Vec<u32> {
        self.reboots.lock().unwrap().clone()
    }

    pub(crate) fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    fn record(&self, entry: String) {
        if let Some(journal) = &self.journal {
            journal.push(entry);
        }
    }
}

impl RemoteExec for RecordingExec {
    fn name(&self) -> &str {
        "recording"
    }

    fn preflight(&self, _target: &Target) -> std::result::Result<(), ProbeFault> {
        match &self.preflight {
            Some(fault) => Err(fault.clone()),
            None => Ok(()),
        }
    }

    fn identity(&self, _target: &Target) -> std::result::Result<bool, ProbeFault> {
        self.identity_calls.fetch_add(1, Ordering::SeqCst);
        let mut last = self.last_identity.lock().unwrap();
        if let Some(next) = self.identity.lock().unwrap().pop_front() {
            *last = next;
        }
        let state = match &*last {
            Ok(true) => "up",
            Ok(false) => "down",
            Err(_) => "indeterminate",
        };
        self.record(format!("management:{state}"));
        last.clone()
    }

    fn reboot(&self, target: &Target, delay_secs: u32) -> Result<()> {
        self.record(format!("reboot:{delay_secs}"));
        if self.fail_reboot {
            return Err(HostcycleError::Remote {
                host: target.name.clone(),
                message: "access denied".into(),
            });
        }
        self.reboots.lock().unwrap().push(delay_secs);
        Ok(())
    }

    fn execute(&self, _target: &Target, command: &str) -> Result<()> {
        self.record(format!("execute:{command}"));
        self.executed.lock().unwrap().push(command.to_string());
        Ok(())
    }
}

// ─── RecordingHandoff ─────────────────────────────────────────────────────

#[derive(Default)]
pub(crate) struct RecordingHandoff {
    targets: Mutex<Vec<String>>,
    journal: Option<Journal>,
}

impl RecordingHandoff {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_journal(mut self, journal: &Journal) -> Self {
        self.journal = Some(journal.clone());
        self
    }

    pub(crate) fn targets(&self) -> Vec<String> {
        self.targets.lock().unwrap().clone()
    }
}

impl Handoff for RecordingHandoff {
    fn hand_off(&self, target: &Target, _ctx: &HandoffContext<'_>) -> Result<()> {
        if let Some(journal) = &self.journal {
            journal.push(format!("handoff:{}", target.name));
        }
        self.targets.lock().unwrap().push(target.name.clone());
        Ok(())
    }
}
