use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use time::OffsetDateTime;

/// Les trois sources externes du refresher
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LiveSource {
    Servers,
    NetworkMetrics,
    SystemMetrics,
}

impl LiveSource {
    pub const ALL: [LiveSource; 3] = [LiveSource::Servers, LiveSource::NetworkMetrics, LiveSource::SystemMetrics];

    pub fn name(self) -> &'static str {
        match self {
            LiveSource::Servers => "servers",
            LiveSource::NetworkMetrics => "network_metrics",
            LiveSource::SystemMetrics => "system_metrics",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceStatus {
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_success: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_failure: Option<OffsetDateTime>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    pub records: usize,
}

#[derive(Debug, Serialize)]
pub struct RefreshStatus {
    pub cycles_completed: u64,
    pub sources: BTreeMap<LiveSource, SourceStatus>,
}

#[derive(Debug, Serialize)]
pub struct CacheSizes {
    pub servers: usize,
    pub network_metrics: usize,
    pub system_metric: bool,
}

#[derive(Debug, Serialize)]
pub struct KernelHealth {
    pub uptime_seconds: u64,
    pub memory_usage_mb: f32,
    pub cache: CacheSizes,
    pub refresh: RefreshStatus,
}

/// Suivi du refresher : dernier succès/échec par source, cycles terminés
#[derive(Clone)]
pub struct RefreshTracker {
    start_time: Instant,
    cycles: Arc<AtomicU64>,
    sources: Arc<Mutex<BTreeMap<LiveSource, SourceStatus>>>,
}

impl RefreshTracker {
    pub fn new() -> Self {
        let sources = LiveSource::ALL.into_iter().map(|s| (s, SourceStatus::default())).collect();
        Self {
            start_time: Instant::now(),
            cycles: Arc::new(AtomicU64::new(0)),
            sources: Arc::new(Mutex::new(sources)),
        }
    }

    pub fn record_success(&self, source: LiveSource, records: usize) {
        let mut sources = self.sources.lock();
        let status = sources.entry(source).or_default();
        status.last_success = Some(OffsetDateTime::now_utc());
        status.consecutive_failures = 0;
        status.records = records;
    }

    pub fn record_failure(&self, source: LiveSource, error: &str) {
        let mut sources = self.sources.lock();
        let status = sources.entry(source).or_default();
        status.last_failure = Some(OffsetDateTime::now_utc());
        status.last_error = Some(error.to_string());
        status.consecutive_failures += 1;
    }

    pub fn complete_cycle(&self) -> u64 {
        self.cycles.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    #[cfg(test)]
    pub fn source(&self, source: LiveSource) -> SourceStatus {
        self.sources.lock().get(&source).cloned().unwrap_or_default()
    }

    pub fn status(&self) -> RefreshStatus {
        RefreshStatus {
            cycles_completed: self.cycles_completed(),
            sources: self.sources.lock().clone(),
        }
    }

    pub fn health(&self, cache: CacheSizes) -> KernelHealth {
        KernelHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            memory_usage_mb: get_memory_usage_mb(),
            cache,
            refresh: self.status(),
        }
    }
}

impl Default for RefreshTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn get_memory_usage_mb() -> f32 {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            for line in status.lines() {
                if let Some(rest) = line.strip_prefix("VmRSS:") {
                    if let Some(Ok(kb)) = rest.split_whitespace().next().map(str::parse::<u64>) {
                        return kb as f32 / 1024.0; // KB -> MB
                    }
                }
            }
        }
    }

    0.0
}
