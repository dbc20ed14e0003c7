use crate::probe::{Probe, ProbeOutcome};
use crate::target::Target;
use crate::transport::RemoteExec;

/// Management-protocol probe: one identity round trip through the transport.
///
/// Only this probe certifies that the host can run further remote
/// operations; reachability alone recovers well before that.
pub struct ManagementProbe<'a> {
    exec: &'a dyn RemoteExec,
    target: &'a Target,
}

impl<'a> ManagementProbe<'a> {
    pub fn new(exec: &'a dyn RemoteExec, target: &'a Target) -> Self {
        Self { exec, target }
    }
}

impl Probe for ManagementProbe<'_> {
    fn name(&self) -> &str {
        "management"
    }

    fn attempt(&self) -> ProbeOutcome {
        match self.exec.identity(self.target) {
            Ok(true) => ProbeOutcome::Up,
            Ok(false) => ProbeOutcome::Down,
            Err(fault) => ProbeOutcome::Indeterminate(fault),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbeFault;
    use crate::testing::RecordingExec;

    #[test]
    fn maps_identity_results() {
        let target = Target::new("app-1");
        let exec = RecordingExec::new(vec![
            Ok(true),
            Ok(false),
            Err(ProbeFault::connectivity("connection reset")),
        ]);
        let probe = ManagementProbe::new(&exec, &target);

        assert_eq!(probe.attempt(), ProbeOutcome::Up);
        assert_eq!(probe.attempt(), ProbeOutcome::Down);
        assert!(matches!(probe.attempt(), ProbeOutcome::Indeterminate(_)));
        assert_eq!(exec.identity_calls(), 3);
    }
}
