//! Stats sampler: periodically samples the host and delivers a stats report

use std::sync::{Arc, Mutex, Once, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::StatsConfig;
use crate::notifier::{Attachment, Notifier};
use crate::reporter::ErrorReporter;
use crate::system::{CpuUsage, MemorySnapshot, SystemSource, GB, MB};
use crate::trace::Traced;
use crate::HostwatchError;

/// Time between the two CPU snapshots of a cycle
pub const CPU_WINDOW: Duration = Duration::from_secs(1);

/// Alert thresholds for a stats report
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub memory_floor_mb: f64,
    pub cpu_ceiling_percent: f64,
    pub only_when_exceeded: bool,
}

impl Thresholds {
    pub fn memory_exceeded(&self, memory: &MemorySnapshot) -> bool {
        (memory.unused() as f64 / MB) < self.memory_floor_mb
    }

    pub fn cpu_exceeded(&self, cpu: &CpuUsage) -> bool {
        cpu.user > self.cpu_ceiling_percent
    }
}

impl From<&StatsConfig> for Thresholds {
    fn from(config: &StatsConfig) -> Self {
        Self {
            memory_floor_mb: config.memory_floor_mb,
            cpu_ceiling_percent: config.cpu_ceiling_percent,
            only_when_exceeded: config.only_when_exceeded,
        }
    }
}

/// One evaluated sample
#[derive(Debug, Clone, PartialEq)]
pub struct StatsReport {
    pub memory: MemorySnapshot,
    pub cpu: CpuUsage,
    pub memory_alert: bool,
    pub cpu_alert: bool,
}

impl StatsReport {
    pub fn evaluate(memory: MemorySnapshot, cpu: CpuUsage, thresholds: &Thresholds) -> Self {
        Self {
            memory_alert: thresholds.memory_exceeded(&memory),
            cpu_alert: thresholds.cpu_exceeded(&cpu),
            memory,
            cpu,
        }
    }

    pub fn any_alert(&self) -> bool {
        self.memory_alert || self.cpu_alert
    }

    /// The seven report lines, used memory and user CPU marked when alerted
    pub fn lines(&self) -> Vec<Attachment> {
        let gb = |bytes: u64| bytes as f64 / GB;
        vec![
            Attachment::plain(format!("Memory Total: {:.3} GB", gb(self.memory.total))),
            Attachment::marked(
                format!("Memory Used: {:.3} GB", gb(self.memory.used)),
                self.memory_alert,
            ),
            Attachment::plain(format!("Memory Cached: {:.3} GB", gb(self.memory.cached))),
            Attachment::plain(format!("Memory Free: {:.3} GB", gb(self.memory.free))),
            Attachment::marked(format!("CPU user: {:.2} %", self.cpu.user), self.cpu_alert),
            Attachment::plain(format!("CPU system: {:.2} %", self.cpu.system)),
            Attachment::plain(format!("CPU idle: {:.2} %", self.cpu.idle)),
        ]
    }
}

/// Result of a single sampling cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Delivered,
    /// Nothing was over threshold and only alerts are reported
    Suppressed,
}

struct Shared {
    label: String,
    thresholds: Thresholds,
    notifier: Arc<Notifier>,
    reporter: Arc<ErrorReporter>,
    source: Arc<dyn SystemSource>,
}

impl Shared {
    async fn sample(&self) -> Result<StatsReport, Traced> {
        let memory = self.source.memory().await?;
        let before = self.source.cpu().await?;
        tokio::time::sleep(CPU_WINDOW).await;
        let after = self.source.cpu().await?;
        let cpu = CpuUsage::between(&before, &after)?;
        Ok(StatsReport::evaluate(memory, cpu, &self.thresholds))
    }

    async fn run_cycle(&self) -> Result<CycleOutcome, Traced> {
        let report = self.sample().await?;

        if self.thresholds.only_when_exceeded && !report.any_alert() {
            tracing::debug!("All stats for '{}' within thresholds, skipping", self.label);
            return Ok(CycleOutcome::Suppressed);
        }

        self.notifier
            .deliver_stats(&self.label, report.lines())
            .await?;
        Ok(CycleOutcome::Delivered)
    }
}

/// Periodic host stats sampler.
///
/// `start` spawns the sampling loop at most once. `stop` is observed when the
/// loop next wakes from its interval sleep.
pub struct StatsSampler {
    shared: Arc<Shared>,
    interval: Duration,
    started: Once,
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for StatsSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsSampler")
            .field("label", &self.shared.label)
            .field("interval", &self.interval)
            .field("thresholds", &self.shared.thresholds)
            .field("started", &self.started.is_completed())
            .finish()
    }
}

impl StatsSampler {
    pub fn new(
        config: &StatsConfig,
        notifier: Arc<Notifier>,
        reporter: Arc<ErrorReporter>,
        source: Arc<dyn SystemSource>,
    ) -> crate::Result<Self> {
        let interval = config.interval()?;
        let label = host_label(&config.app_name);
        tracing::debug!(
            "Created StatsSampler '{}' every {} minute(s)",
            label,
            config.interval_minutes
        );

        Ok(Self::from_parts(
            Arc::new(Shared {
                label,
                thresholds: Thresholds::from(config),
                notifier,
                reporter,
                source,
            }),
            interval,
        ))
    }

    fn from_parts(shared: Arc<Shared>, interval: Duration) -> Self {
        Self {
            shared,
            interval,
            started: Once::new(),
            cancel: CancellationToken::new(),
            handle: Mutex::new(None),
        }
    }

    /// Headline of every stats report
    pub fn label(&self) -> &str {
        &self.shared.label
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_started(&self) -> bool {
        self.started.is_completed()
    }

    /// Spawn the sampling loop. Calls after the first are ignored.
    pub fn start(&self) {
        self.started.call_once(|| {
            tracing::info!(
                "Starting stats sampler '{}' every {:?}",
                self.shared.label,
                self.interval
            );
            let handle = tokio::spawn(sample_loop(
                Arc::clone(&self.shared),
                self.interval,
                self.cancel.clone(),
            ));
            *self.handle.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        });
    }

    /// Ask the loop to exit after its current sleep. No-op before `start`.
    pub fn stop(&self) {
        if !self.started.is_completed() {
            tracing::debug!("Stats sampler '{}' was never started", self.shared.label);
            return;
        }
        tracing::debug!("Stopping stats sampler '{}'", self.shared.label);
        self.cancel.cancel();
    }

    /// Wait for the loop to exit. Returns immediately if it never ran.
    pub async fn wait(&self) {
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!("Stats sampler '{}' task failed: {}", self.shared.label, e);
            }
        }
    }

    /// Run one sampling cycle on the caller's task.
    ///
    /// Failures are traced at the step that failed.
    pub async fn run_cycle(&self) -> Result<CycleOutcome, Traced> {
        self.shared.run_cycle().await
    }

    /// An unstarted sampler with the same configuration and collaborators
    pub fn fresh_copy(&self) -> Self {
        Self::from_parts(Arc::clone(&self.shared), self.interval)
    }
}

async fn sample_loop(shared: Arc<Shared>, interval: Duration, cancel: CancellationToken) {
    loop {
        tokio::time::sleep(interval).await;
        if cancel.is_cancelled() {
            break;
        }

        match shared.run_cycle().await {
            Ok(outcome) => tracing::debug!("Stats cycle for '{}': {:?}", shared.label, outcome),
            Err(e) => {
                tracing::warn!("Stats cycle for '{}' failed: {}", shared.label, e);
                if let Err(report_err) = shared.reporter.report(e).await {
                    tracing::warn!("Failed to report stats failure: {}", report_err);
                }
            }
        }
    }
    tracing::info!("Stats sampler '{}' stopped", shared.label);
}

fn host_label(app_name: &str) -> String {
    let app_name = match app_name.trim() {
        "" => "Default",
        name => name,
    };
    match hostname::get() {
        Ok(host) if !host.is_empty() => format!("{}@{}", app_name, host.to_string_lossy()),
        _ => app_name.to_string(),
    }
}
