//! Memory Leak Detector
//!
//! Periodically samples process memory, keeps a bounded rolling window, and
//! fits an ordinary least-squares line to the used-bytes series. A
//! persistently positive slope raises a leak-suspected signal. This is a
//! heuristic for operator attention, not a proof: sustained allocation
//! during legitimate bulk work will trigger it too.

use std::collections::VecDeque;
use std::fs;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::current_timestamp_ms;

/// Rolling window capacity; oldest samples are dropped past this.
const WINDOW_CAPACITY: usize = 100;

/// Slope above which the trend is flagged, in bytes per sample step.
const LEAK_SLOPE_THRESHOLD: f64 = 1024.0 * 1024.0;

/// Minimum samples before the trend is considered meaningful.
const MIN_SAMPLES_FOR_TREND: usize = 5;

/// Default sampling cadence.
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(10);

// == Memory Sample ==
/// One point-in-time memory reading.
#[derive(Debug, Clone, Serialize)]
pub struct MemorySample {
    /// Resident set size in bytes
    pub used_bytes: u64,
    /// Virtual size of the process in bytes
    pub total_bytes: u64,
    /// System memory ceiling in bytes
    pub limit_bytes: u64,
    /// used_bytes / limit_bytes, 0.0 when the limit is unknown
    pub used_fraction: f64,
    /// When the sample was taken (Unix milliseconds)
    pub taken_at: u64,
}

impl MemorySample {
    pub fn new(used_bytes: u64, total_bytes: u64, limit_bytes: u64) -> Self {
        let used_fraction = if limit_bytes == 0 {
            0.0
        } else {
            used_bytes as f64 / limit_bytes as f64
        };
        Self {
            used_bytes,
            total_bytes,
            limit_bytes,
            used_fraction,
            taken_at: current_timestamp_ms(),
        }
    }
}

// == Memory Probe ==
/// Source of memory readings, injectable so tests can feed synthetic
/// series.
pub trait MemoryProbe: Send + Sync {
    fn sample(&self) -> MemorySample;
}

/// Probe reading the current process's usage from `/proc`.
#[derive(Debug, Default)]
pub struct ProcessMemoryProbe;

impl MemoryProbe for ProcessMemoryProbe {
    fn sample(&self) -> MemorySample {
        let status = fs::read_to_string("/proc/self/status").unwrap_or_default();
        let used = proc_field_kb(&status, "VmRSS:") * 1024;
        let total = proc_field_kb(&status, "VmSize:") * 1024;

        let meminfo = fs::read_to_string("/proc/meminfo").unwrap_or_default();
        let limit = proc_field_kb(&meminfo, "MemTotal:") * 1024;

        MemorySample::new(used, total, limit)
    }
}

/// Parses a `Field:  12345 kB` line out of a /proc table, 0 when absent.
fn proc_field_kb(table: &str, field: &str) -> u64 {
    table
        .lines()
        .find(|line| line.starts_with(field))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

// == Leak Report ==
/// Read-only view of the detector state.
#[derive(Debug, Clone, Serialize)]
pub struct LeakReport {
    /// The rolling sample window, oldest first
    pub measurements: Vec<MemorySample>,
    /// OLS slope of used bytes per sample step
    pub trend: f64,
    /// Whether the trend currently exceeds the leak threshold
    pub is_leaking: bool,
}

#[derive(Debug, Default)]
struct DetectorState {
    window: VecDeque<MemorySample>,
    trend: f64,
    is_leaking: bool,
}

// == Leak Detector ==
/// Idle/monitoring sampler with idempotent start/stop.
pub struct LeakDetector {
    state: Arc<Mutex<DetectorState>>,
    probe: Arc<dyn MemoryProbe>,
    sample_interval: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl LeakDetector {
    /// Detector over the real process probe at the default cadence.
    pub fn new() -> Self {
        Self::with_probe(Arc::new(ProcessMemoryProbe), DEFAULT_SAMPLE_INTERVAL)
    }

    /// Detector over a custom probe, used by tests and embedders.
    pub fn with_probe(probe: Arc<dyn MemoryProbe>, sample_interval: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(DetectorState::default())),
            probe,
            sample_interval,
            task: Mutex::new(None),
        }
    }

    // == Start ==
    /// Begins periodic sampling. Starting an already-monitoring detector is
    /// a no-op.
    pub fn start(&self) {
        let mut task = self.task.lock().expect("task lock poisoned");
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        info!(interval_secs = self.sample_interval.as_secs(), "memory leak monitoring started");
        let state = Arc::clone(&self.state);
        let probe = Arc::clone(&self.probe);
        let interval = self.sample_interval;

        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // interval fires immediately; skip the zeroth tick so samples
            // are evenly spaced from start.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let sample = probe.sample();
                record_into(&state, sample);
            }
        }));
    }

    // == Stop ==
    /// Stops sampling. Stopping an idle detector is a no-op. The window and
    /// trend survive so `report` stays meaningful after shutdown.
    pub fn stop(&self) {
        let mut task = self.task.lock().expect("task lock poisoned");
        if let Some(handle) = task.take() {
            handle.abort();
            info!("memory leak monitoring stopped");
        }
    }

    /// Whether the sampling task is currently running.
    pub fn is_monitoring(&self) -> bool {
        self.task
            .lock()
            .expect("task lock poisoned")
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    // == Record ==
    /// Feeds one sample directly, outside the timer path.
    pub fn record_sample(&self, sample: MemorySample) {
        record_into(&self.state, sample);
    }

    // == Report ==
    /// Pure read of the current window and trend; never mutates monitoring
    /// state.
    pub fn report(&self) -> LeakReport {
        let state = self.state.lock().expect("detector lock poisoned");
        LeakReport {
            measurements: state.window.iter().cloned().collect(),
            trend: state.trend,
            is_leaking: state.is_leaking,
        }
    }
}

impl Default for LeakDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LeakDetector {
    fn drop(&mut self) {
        if let Ok(mut task) = self.task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
            }
        }
    }
}

fn record_into(state: &Arc<Mutex<DetectorState>>, sample: MemorySample) {
    let mut state = state.lock().expect("detector lock poisoned");

    state.window.push_back(sample);
    while state.window.len() > WINDOW_CAPACITY {
        state.window.pop_front();
    }

    let trend = ols_slope(&state.window);
    state.trend = trend;
    let was_leaking = state.is_leaking;
    state.is_leaking =
        state.window.len() >= MIN_SAMPLES_FOR_TREND && state.trend > LEAK_SLOPE_THRESHOLD;

    if state.is_leaking && !was_leaking {
        warn!(
            slope_bytes_per_step = state.trend as u64,
            samples = state.window.len(),
            "memory usage trending upward, possible leak"
        );
    } else {
        debug!(slope_bytes_per_step = state.trend, "memory sample recorded");
    }
}

/// Ordinary least-squares slope of used bytes against sample index.
fn ols_slope(window: &VecDeque<MemorySample>) -> f64 {
    let n = window.len();
    if n < 2 {
        return 0.0;
    }

    let n_f = n as f64;
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xy = 0.0;
    let mut sum_x2 = 0.0;
    for (i, sample) in window.iter().enumerate() {
        let x = i as f64;
        let y = sample.used_bytes as f64;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_x2 += x * x;
    }

    let denominator = n_f * sum_x2 - sum_x * sum_x;
    if denominator == 0.0 {
        return 0.0;
    }
    (n_f * sum_xy - sum_x * sum_y) / denominator
}
