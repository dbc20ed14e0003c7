use crate::output::{print_json, print_table};
use clap::Subcommand;
use hostcycle_core::config::{Config, WarnLevel};
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show the resolved inventory and defaults
    Show,

    /// Validate the inventory for common mistakes
    Validate,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(config_path: Option<&Path>, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    match subcmd {
        ConfigSubcommand::Show => show(&config, json),
        ConfigSubcommand::Validate => validate(&config, json),
    }
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(config: &Config, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(config);
    }

    let d = &config.defaults;
    println!("Transport:     {}", d.transport.kind());
    println!(
        "Intervals:     ping {}ms, management {}ms",
        d.ping_interval_ms, d.management_interval_ms
    );
    println!(
        "Max wait:      {}",
        d.max_wait_secs
            .map(|s| format!("{s}s"))
            .unwrap_or_else(|| "unbounded".to_string())
    );
    println!("Reboot delay:  {}s", d.delay_secs);
    if let Some(cmd) = &config.handoff.start_agent {
        println!("Start agent:   {cmd}");
    }
    println!();

    let rows: Vec<Vec<String>> = config
        .hosts
        .iter()
        .map(|h| {
            vec![
                h.name.clone(),
                h.address().to_string(),
                config.transport_for(h).kind().to_string(),
                h.username.clone().unwrap_or_else(|| "-".to_string()),
                h.secret_env.clone().unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();
    print_table(&["NAME", "ADDRESS", "TRANSPORT", "USER", "SECRET_ENV"], &rows);
    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(config: &Config, json: bool) -> anyhow::Result<()> {
    let warnings = config.validate();

    if json {
        let value = serde_json::json!({
            "warnings": warnings,
        });
        print_json(&value)?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }

    Ok(())
}
