use crate::error::{HostcycleError, Result};
use crate::orchestrator::PollIntervals;
use crate::target::{Credentials, Target};
use crate::transport::TransportConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = "hostcycle.yaml";
pub const HOME_CONFIG_DIR: &str = ".hostcycle";
pub const HOME_CONFIG_FILE: &str = "config.yaml";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Defaults {
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default = "default_ping_interval")]
    pub ping_interval_ms: u64,
    #[serde(default = "default_management_interval")]
    pub management_interval_ms: u64,
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout_secs: u64,
    /// Budget per wait. Absent means wait forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_wait_secs: Option<u64>,
    #[serde(default)]
    pub delay_secs: u32,
}

fn default_ping_interval() -> u64 {
    1000
}

fn default_management_interval() -> u64 {
    5000
}

fn default_ping_timeout() -> u64 {
    2
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            ping_interval_ms: default_ping_interval(),
            management_interval_ms: default_management_interval(),
            ping_timeout_secs: default_ping_timeout(),
            max_wait_secs: None,
            delay_secs: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// HostConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Name of the environment variable holding the secret. Secrets are
    /// never stored in the config file itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<TransportConfig>,
}

impl HostConfig {
    pub fn address(&self) -> &str {
        self.address.as_deref().unwrap_or(&self.name)
    }

    /// Build a [`Target`], reading the secret from the process environment.
    pub fn target(&self) -> Result<Target> {
        self.target_with(|var| std::env::var(var).ok())
    }

    /// Build a [`Target`] with an explicit environment lookup.
    pub fn target_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Result<Target> {
        let target = Target::new(&self.name).with_address(self.address());

        let Some(username) = &self.username else {
            return Ok(target);
        };

        let credentials = match &self.secret_env {
            Some(var) => {
                let secret = lookup(var)
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| HostcycleError::MissingSecret {
                        host: self.name.clone(),
                        var: var.clone(),
                    })?;
                Credentials::new(username, secret)
            }
            None => Credentials::username_only(username),
        };
        Ok(target.with_credentials(credentials))
    }
}

// ---------------------------------------------------------------------------
// HandoffConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct HandoffConfig {
    /// Command run on the host after it converges.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_agent: Option<String>,
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default)]
    pub hosts: Vec<HostConfig>,
    #[serde(default)]
    pub handoff: HandoffConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            defaults: Defaults::default(),
            hosts: Vec::new(),
            handoff: HandoffConfig::default(),
        }
    }
}

impl Config {
    /// Locate the config file.
    ///
    /// Priority:
    /// 1. `explicit` (`--config` flag / `HOSTCYCLE_CONFIG` env var)
    /// 2. `./hostcycle.yaml`
    /// 3. `~/.hostcycle/config.yaml`
    pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(p) = explicit {
            return if p.is_file() {
                Ok(p.to_path_buf())
            } else {
                Err(HostcycleError::ConfigNotFound)
            };
        }

        let local = PathBuf::from(CONFIG_FILE);
        if local.is_file() {
            return Ok(local);
        }

        let home = home::home_dir().ok_or(HostcycleError::HomeNotFound)?;
        let global = home.join(HOME_CONFIG_DIR).join(HOME_CONFIG_FILE);
        if global.is_file() {
            return Ok(global);
        }

        Err(HostcycleError::ConfigNotFound)
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(HostcycleError::ConfigNotFound);
        }
        let data = std::fs::read_to_string(path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn host(&self, name: &str) -> Result<&HostConfig> {
        self.hosts
            .iter()
            .find(|h| h.name == name)
            .ok_or_else(|| HostcycleError::HostNotFound(name.to_string()))
    }

    pub fn transport_for<'a>(&'a self, host: &'a HostConfig) -> &'a TransportConfig {
        host.transport.as_ref().unwrap_or(&self.defaults.transport)
    }

    pub fn intervals(&self) -> PollIntervals {
        PollIntervals {
            ping: Duration::from_millis(self.defaults.ping_interval_ms),
            management: Duration::from_millis(self.defaults.management_interval_ms),
        }
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_secs(self.defaults.ping_timeout_secs)
    }

    pub fn max_wait(&self) -> Option<Duration> {
        self.defaults.max_wait_secs.map(Duration::from_secs)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        self.validate_with(|var| std::env::var(var).ok())
    }

    pub fn validate_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut push = |level: WarnLevel, message: String| {
            warnings.push(ConfigWarning { level, message })
        };

        if self.version != 1 {
            push(
                WarnLevel::Error,
                format!("unsupported config version {}", self.version),
            );
        }

        if self.hosts.is_empty() {
            push(WarnLevel::Warning, "no hosts configured".to_string());
        }

        // 1. Intervals must be positive; management polling is the expensive one.
        let d = &self.defaults;
        if d.ping_interval_ms == 0 || d.management_interval_ms == 0 {
            push(
                WarnLevel::Error,
                "poll intervals must be greater than zero".to_string(),
            );
        } else if d.management_interval_ms < d.ping_interval_ms {
            push(
                WarnLevel::Warning,
                format!(
                    "management_interval_ms ({}) is shorter than ping_interval_ms ({})",
                    d.management_interval_ms, d.ping_interval_ms
                ),
            );
        }

        if d.max_wait_secs == Some(0) {
            push(
                WarnLevel::Error,
                "max_wait_secs of 0 would time out every wait".to_string(),
            );
        }

        // 2. Per-host checks
        let mut seen = HashSet::new();
        for host in &self.hosts {
            if host.name.trim().is_empty() {
                push(WarnLevel::Error, "host with an empty name".to_string());
                continue;
            }
            if !seen.insert(host.name.as_str()) {
                push(
                    WarnLevel::Error,
                    format!("duplicate host '{}'", host.name),
                );
            }
            match (&host.username, &host.secret_env) {
                (None, Some(var)) => push(
                    WarnLevel::Warning,
                    format!(
                        "host '{}' sets secret_env '{}' without a username; it is ignored",
                        host.name, var
                    ),
                ),
                (Some(_), Some(var)) if lookup(var).map_or(true, |s| s.is_empty()) => push(
                    WarnLevel::Warning,
                    format!(
                        "host '{}': environment variable '{}' is not set",
                        host.name, var
                    ),
                ),
                _ => {}
            }
        }

        // 3. Handoff command
        if let Some(cmd) = &self.handoff.start_agent {
            if cmd.trim().is_empty() {
                push(
                    WarnLevel::Warning,
                    "handoff.start_agent is empty".to_string(),
                );
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
version: 1
defaults:
  transport: { type: ssh, port: 2222 }
  max_wait_secs: 1800
hosts:
  - name: web-1
    address: 10.0.0.11
    username: deploy
    secret_env: WEB1_SECRET
  - name: app-1
    transport: { type: winrm, shell: powershell }
handoff:
  start_agent: systemctl start deploy-agent
"#;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn parses_sample_with_defaults() {
        let cfg: Config = serde_yaml::from_str(SAMPLE).unwrap();
        assert_eq!(cfg.hosts.len(), 2);
        assert_eq!(cfg.defaults.ping_interval_ms, 1000);
        assert_eq!(cfg.defaults.management_interval_ms, 5000);
        assert_eq!(cfg.max_wait(), Some(Duration::from_secs(1800)));
        assert_eq!(
            cfg.handoff.start_agent.as_deref(),
            Some("systemctl start deploy-agent")
        );

        let app = cfg.host("app-1").unwrap();
        assert_eq!(cfg.transport_for(app).kind(), "winrm");
        let web = cfg.host("web-1").unwrap();
        assert_eq!(
            cfg.transport_for(web),
            &TransportConfig::Ssh {
                port: 2222,
                connect_timeout_secs: 5
            }
        );
    }

    #[test]
    fn default_intervals_keep_five_to_one_ratio() {
        let cfg = Config::default();
        let intervals = cfg.intervals();
        assert_eq!(intervals, PollIntervals::default());
        assert_eq!(intervals.management, intervals.ping * 5);
    }

    #[test]
    fn unknown_host_is_an_error() {
        let cfg: Config = serde_yaml::from_str(SAMPLE).unwrap();
        assert!(matches!(
            cfg.host("db-9"),
            Err(HostcycleError::HostNotFound(name)) if name == "db-9"
        ));
    }

    #[test]
    fn target_reads_secret_from_environment() {
        let cfg: Config = serde_yaml::from_str(SAMPLE).unwrap();
        let web = cfg.host("web-1").unwrap();

        let target = web
            .target_with(|var| (var == "WEB1_SECRET").then(|| "hunter2".to_string()))
            .unwrap();
        assert_eq!(target.address, "10.0.0.11");
        let creds = target.credentials.unwrap();
        assert_eq!(creds.username, "deploy");
        assert_eq!(creds.secret(), Some("hunter2"));
    }

    #[test]
    fn missing_secret_is_an_error() {
        let cfg: Config = serde_yaml::from_str(SAMPLE).unwrap();
        let err = cfg.host("web-1").unwrap().target_with(no_env).unwrap_err();
        assert!(err.to_string().contains("WEB1_SECRET"));
    }

    #[test]
    fn host_without_username_has_no_credentials() {
        let cfg: Config = serde_yaml::from_str(SAMPLE).unwrap();
        let target = cfg.host("app-1").unwrap().target_with(no_env).unwrap();
        assert_eq!(target.address, "app-1");
        assert!(target.credentials.is_none());
    }

    #[test]
    fn rejects_unknown_host_fields() {
        let yaml = "hosts:\n  - name: web-1\n    pasword: oops\n";
        let result = serde_yaml::from_str::<Config>(yaml);
        assert!(result.is_err(), "typo in field name should be rejected");
    }

    #[test]
    fn validate_flags_problems() {
        let yaml = r#"
defaults:
  ping_interval_ms: 2000
  management_interval_ms: 1000
hosts:
  - name: web-1
    secret_env: WEB1_SECRET
  - name: web-1
    username: deploy
    secret_env: MISSING_SECRET
"#;
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        let warnings = cfg.validate_with(no_env);
        let messages: Vec<&str> = warnings.iter().map(|w| w.message.as_str()).collect();

        assert!(messages.iter().any(|m| m.contains("shorter than ping_interval_ms")));
        assert!(messages.iter().any(|m| m.contains("without a username")));
        assert!(messages.iter().any(|m| m.contains("duplicate host 'web-1'")));
        assert!(messages.iter().any(|m| m.contains("'MISSING_SECRET' is not set")));
        assert!(warnings.iter().any(|w| w.level == WarnLevel::Error));
    }

    #[test]
    fn validate_clean_config() {
        let cfg: Config = serde_yaml::from_str(SAMPLE).unwrap();
        let warnings = cfg.validate_with(|_| Some("x".to_string()));
        assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
    }

    #[test]
    fn load_and_resolve_explicit_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("inventory.yaml");
        std::fs::write(&path, SAMPLE).unwrap();

        let resolved = Config::resolve_path(Some(&path)).unwrap();
        assert_eq!(resolved, path);
        let cfg = Config::load(&resolved).unwrap();
        assert_eq!(cfg.hosts[0].name, "web-1");
    }

    #[test]
    fn explicit_missing_path_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = Config::resolve_path(Some(&dir.path().join("nope.yaml"))).unwrap_err();
        assert!(matches!(err, HostcycleError::ConfigNotFound));
    }
}
