use crate::output::{human_duration, print_json, print_table};
use anyhow::Context;
use clap::Args;
use hostcycle_core::config::{Config, HostConfig, WarnLevel};
use hostcycle_core::{
    CancelFlag, PingProbe, RestartOrchestrator, RestartOutcome, RestartReport, RestartRequest,
    StartAgentHandoff, Target, WaitOutcome,
};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

const EXIT_TIMED_OUT: i32 = 2;
const EXIT_CANCELLED: i32 = 130;

#[derive(Args)]
pub struct RestartArgs {
    /// Host names from the inventory
    #[arg(required_unless_present = "all")]
    pub hosts: Vec<String>,

    /// Restart every host in the inventory
    #[arg(long, conflicts_with = "hosts")]
    pub all: bool,

    /// Seconds the remote reboot command waits before restarting
    #[arg(long)]
    pub delay: Option<u32>,

    /// Give up on any single wait after this many seconds
    #[arg(long)]
    pub max_wait_secs: Option<u64>,

    /// Restart the selected hosts concurrently instead of one after another
    #[arg(long)]
    pub parallel: bool,
}

/// A host resolved from the inventory, ready to restart.
struct Plan {
    host: HostConfig,
    target: Target,
}

#[derive(Serialize)]
struct HostResult {
    host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<RestartReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn run(config_path: Option<&Path>, args: RestartArgs, json: bool) -> anyhow::Result<i32> {
    let config = super::load_config(config_path)?;
    reject_invalid(&config)?;

    let selected: Vec<&HostConfig> = if args.all {
        config.hosts.iter().collect()
    } else {
        args.hosts
            .iter()
            .map(|name| config.host(name))
            .collect::<Result<_, _>>()?
    };
    if selected.is_empty() {
        anyhow::bail!("no hosts selected; the inventory is empty");
    }

    // Resolve every secret before anything disruptive happens.
    let plans = selected
        .into_iter()
        .map(|host| {
            let target = host
                .target()
                .with_context(|| format!("cannot prepare host '{}'", host.name))?;
            Ok(Plan {
                host: host.clone(),
                target,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let request = RestartRequest {
        delay_secs: args.delay.unwrap_or(config.defaults.delay_secs),
        max_wait: args.max_wait_secs.map(Duration::from_secs).or(config.max_wait()),
    };

    let cancel = CancelFlag::new();
    let results = run_until_interrupted(config, plans, request, args.parallel, cancel)?;

    if json {
        print_json(&results)?;
    } else {
        print_summary(&results);
    }

    Ok(exit_code(&results))
}

/// Refuse to reboot anything with an inventory `config validate` rejects.
/// Warnings are left to `config validate`.
fn reject_invalid(config: &Config) -> anyhow::Result<()> {
    let errors: Vec<_> = config
        .validate()
        .into_iter()
        .filter(|w| w.level == WarnLevel::Error)
        .collect();
    if errors.is_empty() {
        return Ok(());
    }
    for w in &errors {
        eprintln!("[error] {}", w.message);
    }
    anyhow::bail!("config validation found errors; no host was restarted")
}

/// Run the restarts on a blocking worker while watching for Ctrl-C. An
/// interrupt raises the cancel flag, which every wait loop checks before
/// sleeping.
fn run_until_interrupted(
    config: Config,
    plans: Vec<Plan>,
    request: RestartRequest,
    parallel: bool,
    cancel: CancelFlag,
) -> anyhow::Result<Vec<HostResult>> {
    let rt = tokio::runtime::Runtime::new()?;
    let worker_cancel = cancel.clone();

    rt.block_on(async move {
        let mut worker = tokio::task::spawn_blocking(move || {
            restart_all(&config, &plans, &request, parallel, &worker_cancel)
        });

        let results = tokio::select! {
            res = &mut worker => res,
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("interrupt received; cancelling after the current probe attempt");
                cancel.cancel();
                worker.await
            }
        };
        results.context("restart worker panicked")
    })
}

fn restart_all(
    config: &Config,
    plans: &[Plan],
    request: &RestartRequest,
    parallel: bool,
    cancel: &CancelFlag,
) -> Vec<HostResult> {
    if !parallel {
        let mut results = Vec::with_capacity(plans.len());
        for plan in plans {
            if cancel.is_cancelled() {
                break;
            }
            results.push(restart_one(config, plan, request, cancel));
        }
        return results;
    }

    std::thread::scope(|scope| {
        let handles: Vec<_> = plans
            .iter()
            .map(|plan| scope.spawn(move || restart_one(config, plan, request, cancel)))
            .collect();
        handles
            .into_iter()
            .zip(plans)
            .map(|(handle, plan)| {
                handle.join().unwrap_or_else(|_| HostResult {
                    host: plan.host.name.clone(),
                    report: None,
                    error: Some("restart thread panicked".to_string()),
                })
            })
            .collect()
    })
}

fn restart_one(
    config: &Config,
    plan: &Plan,
    request: &RestartRequest,
    cancel: &CancelFlag,
) -> HostResult {
    let exec = config.transport_for(&plan.host).build();
    let handoff = StartAgentHandoff::new(exec.as_ref(), config.handoff.start_agent.clone());
    let ping = PingProbe::new(plan.target.address.clone(), config.ping_timeout());

    let result = RestartOrchestrator::new(&plan.target, exec.as_ref(), &handoff)
        .with_reachability(ping)
        .with_intervals(config.intervals())
        .with_cancel(cancel.clone())
        .restart(request);

    match result {
        Ok(report) => HostResult {
            host: plan.host.name.clone(),
            report: Some(report),
            error: None,
        },
        Err(e) => {
            tracing::error!(host = %plan.host.name, error = %e, "restart failed");
            HostResult {
                host: plan.host.name.clone(),
                report: None,
                error: Some(e.to_string()),
            }
        }
    }
}

fn print_summary(results: &[HostResult]) {
    let rows: Vec<Vec<String>> = results
        .iter()
        .map(|r| match (&r.report, &r.error) {
            (Some(report), _) => vec![
                r.host.clone(),
                outcome_label(&report.outcome),
                (if report.can_ping { "yes" } else { "no" }).to_string(),
                human_duration(waited_ms(report)),
            ],
            (None, error) => vec![
                r.host.clone(),
                format!("failed: {}", error.as_deref().unwrap_or("unknown error")),
                "-".to_string(),
                "-".to_string(),
            ],
        })
        .collect();
    print_table(&["HOST", "OUTCOME", "PING", "WAITED"], &rows);
}

fn outcome_label(outcome: &RestartOutcome) -> String {
    match outcome {
        RestartOutcome::Converged => "converged".to_string(),
        RestartOutcome::Cancelled { phase } => format!("cancelled during {phase}"),
        RestartOutcome::TimedOut { phase } => format!("timed out during {phase}"),
    }
}

fn waited_ms(report: &RestartReport) -> u64 {
    report
        .steps
        .iter()
        .filter_map(|s| match s.wait {
            WaitOutcome::Reached { elapsed_ms, .. } => Some(elapsed_ms),
            _ => None,
        })
        .sum()
}

fn exit_code(results: &[HostResult]) -> i32 {
    let outcomes = || results.iter().filter_map(|r| r.report.as_ref().map(|rep| rep.outcome));
    if results.iter().any(|r| r.error.is_some()) {
        1
    } else if outcomes().any(|o| matches!(o, RestartOutcome::Cancelled { .. })) {
        EXIT_CANCELLED
    } else if outcomes().any(|o| matches!(o, RestartOutcome::TimedOut { .. })) {
        EXIT_TIMED_OUT
    } else {
        0
    }
}
