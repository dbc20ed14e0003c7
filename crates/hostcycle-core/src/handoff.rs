use crate::clock::CancelFlag;
use crate::error::Result;
use crate::target::Target;
use crate::transport::RemoteExec;

/// Caller context passed through to the next pipeline stage.
#[derive(Debug, Clone, Copy)]
pub struct HandoffContext<'a> {
    pub run_id: &'a str,
    pub cancel: &'a CancelFlag,
}

/// The stage that runs once a restarted host is manageable again.
pub trait Handoff: Send + Sync {
    fn hand_off(&self, target: &Target, ctx: &HandoffContext<'_>) -> Result<()>;
}

/// Starts the deployment agent on the host by running a configured command
/// through the same transport used for the restart. With no command
/// configured it only logs.
pub struct StartAgentHandoff<'a> {
    exec: &'a dyn RemoteExec,
    command: Option<String>,
}

impl<'a> StartAgentHandoff<'a> {
    pub fn new(exec: &'a dyn RemoteExec, command: Option<String>) -> Self {
        Self { exec, command }
    }
}

impl Handoff for StartAgentHandoff<'_> {
    fn hand_off(&self, target: &Target, ctx: &HandoffContext<'_>) -> Result<()> {
        let Some(command) = self.command.as_deref() else {
            tracing::info!(host = %target.name, "no start_agent command configured; skipping handoff");
            return Ok(());
        };
        if ctx.cancel.is_cancelled() {
            tracing::info!(host = %target.name, "cancelled before starting agent");
            return Ok(());
        }
        tracing::info!(host = %target.name, run_id = ctx.run_id, "starting deployment agent");
        self.exec.execute(target, command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingExec;

    fn ctx(cancel: &CancelFlag) -> HandoffContext<'_> {
        HandoffContext {
            run_id: "run-1",
            cancel,
        }
    }

    #[test]
    fn runs_configured_command() {
        let exec = RecordingExec::new(vec![]);
        let cancel = CancelFlag::new();
        let handoff = StartAgentHandoff::new(&exec, Some("systemctl start agent".into()));

        handoff.hand_off(&Target::new("web-1"), &ctx(&cancel)).unwrap();
        assert_eq!(exec.executed(), vec!["systemctl start agent".to_string()]);
    }

    #[test]
    fn without_command_does_nothing() {
        let exec = RecordingExec::new(vec![]);
        let cancel = CancelFlag::new();
        StartAgentHandoff::new(&exec, None)
            .hand_off(&Target::new("web-1"), &ctx(&cancel))
            .unwrap();
        assert!(exec.executed().is_empty());
    }

    #[test]
    fn respects_cancellation() {
        let exec = RecordingExec::new(vec![]);
        let cancel = CancelFlag::new();
        cancel.cancel();
        StartAgentHandoff::new(&exec, Some("start".into()))
            .hand_off(&Target::new("web-1"), &ctx(&cancel))
            .unwrap();
        assert!(exec.executed().is_empty());
    }
}
