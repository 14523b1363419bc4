//! Configuration types for the hostwatch service

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::HostwatchError;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub reporter: ReporterConfig,
    #[serde(default)]
    pub stats: StatsConfig,
}

/// Notification channels and payload options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Channel for error reports (required unless disabled)
    #[serde(default)]
    pub errors: ChannelConfig,
    /// Channel for periodic stats reports
    #[serde(default)]
    pub stats: Option<ChannelConfig>,
    /// Keep at most this many attachments per message
    #[serde(default)]
    pub max_attachments: Option<usize>,
    /// Channel override passed along with every payload
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

/// A single webhook destination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    #[serde(default)]
    pub webhook: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            webhook: String::new(),
            enabled: true,
        }
    }
}

/// Whether error reports are printed or delivered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportMode {
    #[default]
    Local,
    Deliver,
}

/// Error reporter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReporterConfig {
    #[serde(default)]
    pub mode: ReportMode,
    /// Color locally printed reports
    #[serde(default = "default_true")]
    pub color: bool,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            mode: ReportMode::Local,
            color: true,
        }
    }
}

/// Stats sampler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
    /// Alert when unused memory drops below this many megabytes
    #[serde(default = "default_memory_floor_mb")]
    pub memory_floor_mb: f64,
    /// Alert when user CPU exceeds this percentage
    #[serde(default = "default_cpu_ceiling_percent")]
    pub cpu_ceiling_percent: f64,
    /// Only send a report when at least one threshold is breached
    #[serde(default)]
    pub only_when_exceeded: bool,
    #[serde(default = "default_proc_root")]
    pub proc_root: PathBuf,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            interval_minutes: default_interval_minutes(),
            memory_floor_mb: default_memory_floor_mb(),
            cpu_ceiling_percent: default_cpu_ceiling_percent(),
            only_when_exceeded: false,
            proc_root: default_proc_root(),
        }
    }
}

impl StatsConfig {
    /// Time between sampling cycles; zero or overflowing minute counts are rejected
    pub fn interval(&self) -> crate::Result<Duration> {
        if self.interval_minutes == 0 {
            return Err(HostwatchError::Config(
                "stats.interval_minutes must be at least 1".to_string(),
            ));
        }
        self.interval_minutes
            .checked_mul(60)
            .map(Duration::from_secs)
            .ok_or_else(|| {
                HostwatchError::Config(format!(
                    "stats.interval_minutes {} is too large",
                    self.interval_minutes
                ))
            })
    }
}

fn default_true() -> bool {
    true
}

fn default_app_name() -> String {
    "Default".to_string()
}

fn default_interval_minutes() -> u64 {
    30
}

fn default_memory_floor_mb() -> f64 {
    1024.0
}

fn default_cpu_ceiling_percent() -> f64 {
    80.0
}

fn default_proc_root() -> PathBuf {
    PathBuf::from("/proc")
}

impl Config {
    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> crate::Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> crate::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(webhook) = lookup("SLACK_WEBHOOK") {
            self.notifier.errors.webhook = webhook;
        }
        if let Some(webhook) = lookup("SLACK_WEBHOOK_STATS") {
            self.notifier
                .stats
                .get_or_insert_with(ChannelConfig::default)
                .webhook = webhook;
        }
        if let Some(live) = lookup("LIVE") {
            self.reporter.mode = if live.trim().eq_ignore_ascii_case("true") {
                ReportMode::Deliver
            } else {
                ReportMode::Local
            };
        }
        if let Some(minutes) = lookup("REPORT_STATS_MINUTES") {
            self.stats.interval_minutes = parse_var("REPORT_STATS_MINUTES", &minutes)?;
        }
        if let Some(memory) = lookup("THRESHOLD_MEMORY") {
            self.stats.memory_floor_mb = parse_var("THRESHOLD_MEMORY", &memory)?;
        }
        if let Some(cpu) = lookup("THRESHOLD_CPU") {
            self.stats.cpu_ceiling_percent = parse_var("THRESHOLD_CPU", &cpu)?;
        }
        if let Some(only) = lookup("ONLY_OVER_THRESHOLD") {
            self.stats.only_when_exceeded = parse_var("ONLY_OVER_THRESHOLD", &only)?;
        }
        if let Some(max) = lookup("MAX_ATTACHMENTS") {
            self.notifier.max_attachments = Some(parse_var("MAX_ATTACHMENTS", &max)?);
        }
        if let Some(name) = lookup("APP_NAME") {
            self.stats.app_name = name;
        }
        Ok(())
    }

    /// Reject values the sampler cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        self.stats.interval()?;
        for (name, value) in [
            ("stats.memory_floor_mb", self.stats.memory_floor_mb),
            ("stats.cpu_ceiling_percent", self.stats.cpu_ceiling_percent),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(HostwatchError::Config(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

fn parse_var<T>(key: &str, value: &str) -> crate::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| HostwatchError::Config(format!("Invalid {} '{}': {}", key, value, e)))
}

/// Load configuration from a JSON file
pub fn load_config(path: &Path) -> crate::Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        HostwatchError::Config(format!("Failed to read config file {:?}: {}", path, e))
    })?;
    let config: Config = serde_json::from_str(&content)?;
    Ok(config)
}
