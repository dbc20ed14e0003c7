use crate::output::print_json;
use anyhow::Context;
use clap::ValueEnum;
use hostcycle_core::{ManagementProbe, PingProbe, Probe, ProbeOutcome};
use serde::Serialize;
use std::path::Path;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Channel {
    Ping,
    Management,
    Both,
}

impl Channel {
    fn ping(self) -> bool {
        matches!(self, Channel::Ping | Channel::Both)
    }

    fn management(self) -> bool {
        matches!(self, Channel::Management | Channel::Both)
    }
}

#[derive(Serialize)]
struct ProbeReport {
    host: String,
    address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    ping: Option<ProbeOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    management: Option<ProbeOutcome>,
}

/// One attempt per requested channel. Nothing is retried and the host is
/// never disturbed.
pub fn run(config_path: Option<&Path>, host: &str, channel: Channel, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let host_cfg = config.host(host)?;
    let target = host_cfg
        .target()
        .with_context(|| format!("cannot prepare host '{}'", host_cfg.name))?;

    let ping = channel
        .ping()
        .then(|| PingProbe::new(target.address.clone(), config.ping_timeout()).attempt());

    let management = channel.management().then(|| {
        let exec = config.transport_for(host_cfg).build();
        match exec.preflight(&target) {
            Err(fault) => ProbeOutcome::Indeterminate(fault),
            Ok(()) => ManagementProbe::new(exec.as_ref(), &target).attempt(),
        }
    });

    let report = ProbeReport {
        host: host_cfg.name.clone(),
        address: target.address.clone(),
        ping,
        management,
    };

    if json {
        return print_json(&report);
    }

    println!("{target}");
    if let Some(outcome) = &report.ping {
        println!("  ping:        {outcome}");
    }
    if let Some(outcome) = &report.management {
        println!("  management:  {outcome}");
    }
    Ok(())
}
