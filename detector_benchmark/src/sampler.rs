//! Periodic CPU and memory sampling of the current process.
//!
//! A [`ResourceSampler`] runs a repeating Tokio task while a measurement
//! window is open. Each tick reads the process probe, appends a memory
//! reading in megabytes and, once a wall-clock/processor-time baseline
//! exists, a CPU utilisation reading normalised by the number of logical
//! processors. Tick failures are dropped; the measured work never sees them.

use crate::detection::ResourceStats;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use sysinfo::{Pid, ProcessesToUpdate, System};
use thiserror::Error;
use tokio::time::{interval_at, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(100);

const MIN_SAMPLE_INTERVAL: Duration = Duration::from_millis(1);

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Error, Debug)]
pub enum SamplerError {
    #[error("Failed to resolve current process: {0}")]
    CurrentProcess(String),
    #[error("Process {0} is not visible to the sampler")]
    ProcessNotFound(u32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessReading {
    pub memory_bytes: u64,
    /// Cumulative processor time consumed by the process.
    pub cpu_time: Duration,
}

pub trait ProcessProbe: Send + 'static {
    fn read(&mut self) -> Result<ProcessReading, SamplerError>;
}

/// Reads resident memory and accumulated CPU time of this process via `sysinfo`.
pub struct SysinfoProbe {
    system: System,
    pid: Pid,
}

impl SysinfoProbe {
    pub fn new() -> Result<Self, SamplerError> {
        let pid = sysinfo::get_current_pid()
            .map_err(|e| SamplerError::CurrentProcess(e.to_string()))?;
        let mut probe = Self {
            system: System::new(),
            pid,
        };
        probe.read()?;
        Ok(probe)
    }
}

impl ProcessProbe for SysinfoProbe {
    fn read(&mut self) -> Result<ProcessReading, SamplerError> {
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[self.pid]), true);
        let process = self
            .system
            .process(self.pid)
            .ok_or(SamplerError::ProcessNotFound(self.pid.as_u32()))?;

        Ok(ProcessReading {
            memory_bytes: process.memory(),
            cpu_time: Duration::from_millis(process.accumulated_cpu_time()),
        })
    }
}

impl<P: ProcessProbe + ?Sized> ProcessProbe for Box<P> {
    fn read(&mut self) -> Result<ProcessReading, SamplerError> {
        (**self).read()
    }
}

/// Reading buffers and tick baseline of one sampler.
#[derive(Debug, Default)]
pub struct SamplerState {
    memory_readings: Vec<f64>,
    cpu_readings: Vec<f64>,
    baseline: Option<(Instant, Duration)>,
    active: bool,
    window: u64,
}

impl SamplerState {
    /// Opens a window. Without a processor-time baseline the first tick
    /// only establishes one and records no CPU reading.
    pub fn begin(&mut self, now: Instant, cpu_time: Option<Duration>) {
        self.clear();
        self.baseline = cpu_time.map(|cpu_time| (now, cpu_time));
        self.active = true;
        self.window = self.window.wrapping_add(1);
    }

    pub fn clear(&mut self) {
        self.memory_readings.clear();
        self.cpu_readings.clear();
    }

    pub fn record(&mut self, now: Instant, reading: ProcessReading, logical_cpus: usize) {
        self.memory_readings
            .push(reading.memory_bytes as f64 / BYTES_PER_MB);

        if let Some((last_wall, last_cpu)) = self.baseline {
            let wall_secs = now.saturating_duration_since(last_wall).as_secs_f64();
            if wall_secs > 0.0 {
                let cpu_secs = reading.cpu_time.saturating_sub(last_cpu).as_secs_f64();
                let percent = cpu_secs / wall_secs * 100.0 / logical_cpus.max(1) as f64;
                self.cpu_readings.push(percent.clamp(0.0, 100.0));
            }
        }

        self.baseline = Some((now, reading.cpu_time));
    }

    pub fn memory_stats(&self) -> (f64, f64) {
        peak_and_average(&self.memory_readings)
    }

    pub fn cpu_stats(&self) -> (f64, f64) {
        peak_and_average(&self.cpu_readings)
    }
}

fn peak_and_average(readings: &[f64]) -> (f64, f64) {
    if readings.is_empty() {
        return (0.0, 0.0);
    }
    let peak = readings.iter().copied().fold(f64::MIN, f64::max);
    let average = readings.iter().sum::<f64>() / readings.len() as f64;
    (peak, average)
}

/// Probe and readings are locked separately so a slow probe read never
/// blocks `stop` or the stats getters.
struct Shared<P> {
    probe: Mutex<P>,
    state: Mutex<SamplerState>,
}

/// Samples process resources on a fixed period while started.
///
/// `start` spawns onto the current Tokio runtime and must be called from
/// within one.
pub struct ResourceSampler<P: ProcessProbe = SysinfoProbe> {
    shared: Arc<Shared<P>>,
    interval: Duration,
    logical_cpus: usize,
    cancel: Option<CancellationToken>,
    disposed: bool,
}

impl ResourceSampler<SysinfoProbe> {
    pub fn new(interval: Duration) -> Result<Self, SamplerError> {
        Ok(Self::with_probe(SysinfoProbe::new()?, interval))
    }
}

impl<P: ProcessProbe> ResourceSampler<P> {
    /// A zero `interval` is raised to one millisecond.
    pub fn with_probe(probe: P, interval: Duration) -> Self {
        let logical_cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        Self {
            shared: Arc::new(Shared {
                probe: Mutex::new(probe),
                state: Mutex::new(SamplerState::default()),
            }),
            interval: interval.max(MIN_SAMPLE_INTERVAL),
            logical_cpus,
            cancel: None,
            disposed: false,
        }
    }

    /// Opens a new window and starts ticking.
    ///
    /// A processor-time baseline is read here, so the first tick already
    /// yields a CPU reading unless that read fails.
    pub fn start(&mut self) {
        if self.disposed {
            return;
        }
        self.halt();

        let cpu_time = self
            .shared
            .probe
            .lock()
            .read()
            .ok()
            .map(|reading| reading.cpu_time);
        self.shared.state.lock().begin(Instant::now(), cpu_time);

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let shared = Arc::clone(&self.shared);
        let period = self.interval;
        let logical_cpus = self.logical_cpus;

        tokio::spawn(async move {
            let mut ticker = interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => sample_tick(&shared, logical_cpus),
                }
            }
            tracing::trace!("resource sampling task finished");
        });

        self.cancel = Some(token);
    }

    /// Halts sampling; collected readings stay queryable.
    pub fn stop(&mut self) {
        if self.disposed {
            return;
        }
        self.halt();
    }

    /// Clears all readings without touching the running state.
    pub fn reset(&mut self) {
        self.shared.state.lock().clear();
    }

    pub fn memory_stats(&self) -> (f64, f64) {
        self.shared.state.lock().memory_stats()
    }

    pub fn cpu_stats(&self) -> (f64, f64) {
        self.shared.state.lock().cpu_stats()
    }

    pub fn stats(&self) -> ResourceStats {
        let state = self.shared.state.lock();
        let (peak_memory_mb, average_memory_mb) = state.memory_stats();
        let (peak_cpu_percent, average_cpu_percent) = state.cpu_stats();
        ResourceStats {
            peak_memory_mb,
            average_memory_mb,
            peak_cpu_percent,
            average_cpu_percent,
        }
    }

    pub fn is_running(&self) -> bool {
        self.cancel.is_some()
    }

    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.halt();
        self.disposed = true;
    }

    fn halt(&mut self) {
        // Cleared under the lock so no tick can append after this returns.
        self.shared.state.lock().active = false;
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
    }
}

impl<P: ProcessProbe> Drop for ResourceSampler<P> {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn sample_tick<P: ProcessProbe>(shared: &Shared<P>, logical_cpus: usize) {
    let window = {
        let state = shared.state.lock();
        if !state.active {
            return;
        }
        state.window
    };

    let reading = shared.probe.lock().read();
    let now = Instant::now();

    let mut state = shared.state.lock();
    // The window may have been stopped or restarted during the read.
    if !state.active || state.window != window {
        return;
    }
    match reading {
        Ok(reading) => state.record(now, reading, logical_cpus),
        Err(e) => tracing::trace!("Skipping resource sample: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: u64 = 1024 * 1024;

    struct FixedProbe {
        reading: ProcessReading,
    }

    impl ProcessProbe for FixedProbe {
        fn read(&mut self) -> Result<ProcessReading, SamplerError> {
            Ok(self.reading)
        }
    }

    struct FailingProbe;

    impl ProcessProbe for FailingProbe {
        fn read(&mut self) -> Result<ProcessReading, SamplerError> {
            Err(SamplerError::ProcessNotFound(0))
        }
    }

    fn reading(memory_mb: u64, cpu_ms: u64) -> ProcessReading {
        ProcessReading {
            memory_bytes: memory_mb * MB,
            cpu_time: Duration::from_millis(cpu_ms),
        }
    }

    #[test]
    fn test_stats_are_zero_when_empty() {
        let state = SamplerState::default();
        assert_eq!(state.memory_stats(), (0.0, 0.0));
        assert_eq!(state.cpu_stats(), (0.0, 0.0));
    }

    #[test]
    fn test_memory_stats_peak_and_mean() {
        let t0 = Instant::now();
        let mut state = SamplerState::default();
        state.begin(t0, Some(Duration::ZERO));

        state.record(t0 + Duration::from_millis(100), reading(100, 0), 1);
        state.record(t0 + Duration::from_millis(200), reading(102, 0), 1);
        state.record(t0 + Duration::from_millis(300), reading(98, 0), 1);

        assert_eq!(state.memory_stats(), (102.0, 100.0));
    }

    #[test]
    fn test_cpu_percent_normalised_by_logical_cpus() {
        let t0 = Instant::now();
        let mut state = SamplerState::default();
        state.begin(t0, Some(Duration::from_millis(1000)));

        state.record(t0 + Duration::from_secs(1), reading(10, 1500), 2);

        assert_eq!(state.cpu_stats(), (25.0, 25.0));
    }

    #[test]
    fn test_cpu_percent_is_clamped() {
        let t0 = Instant::now();
        let mut state = SamplerState::default();
        state.begin(t0, Some(Duration::ZERO));

        state.record(t0 + Duration::from_millis(100), reading(10, 60_000), 1);
        // Processor time going backwards saturates to zero.
        state.record(t0 + Duration::from_millis(200), reading(10, 0), 1);

        let (peak, average) = state.cpu_stats();
        assert_eq!(peak, 100.0);
        assert_eq!(average, 50.0);
    }

    #[test]
    fn test_first_tick_without_baseline_records_memory_only() {
        let t0 = Instant::now();
        let mut state = SamplerState::default();
        state.begin(t0, None);

        state.record(t0 + Duration::from_millis(100), reading(50, 100), 1);
        assert_eq!(state.cpu_stats(), (0.0, 0.0));
        assert_eq!(state.memory_stats(), (50.0, 50.0));

        state.record(t0 + Duration::from_millis(200), reading(50, 150), 1);
        assert_eq!(state.cpu_stats(), (50.0, 50.0));
    }

    #[test]
    fn test_no_cpu_reading_when_wall_clock_did_not_advance() {
        let t0 = Instant::now();
        let mut state = SamplerState::default();
        state.begin(t0, Some(Duration::ZERO));

        state.record(t0, reading(10, 10), 1);

        assert_eq!(state.cpu_stats(), (0.0, 0.0));
        assert_eq!(state.memory_stats(), (10.0, 10.0));
    }

    #[tokio::test]
    async fn test_sampler_collects_until_stopped() {
        let probe = FixedProbe {
            reading: reading(64, 0),
        };
        let mut sampler = ResourceSampler::with_probe(probe, Duration::from_millis(10));

        sampler.start();
        assert!(sampler.is_running());
        tokio::time::sleep(Duration::from_millis(80)).await;
        sampler.stop();
        assert!(!sampler.is_running());

        assert_eq!(sampler.memory_stats(), (64.0, 64.0));
        let collected = sampler.shared.state.lock().memory_readings.len();
        assert!(collected >= 1);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(sampler.shared.state.lock().memory_readings.len(), collected);
    }

    #[tokio::test]
    async fn test_reset_clears_readings() {
        let probe = FixedProbe {
            reading: reading(64, 0),
        };
        let mut sampler = ResourceSampler::with_probe(probe, Duration::from_millis(5));

        sampler.start();
        tokio::time::sleep(Duration::from_millis(40)).await;
        sampler.stop();
        sampler.reset();

        assert_eq!(sampler.memory_stats(), (0.0, 0.0));
        assert_eq!(sampler.cpu_stats(), (0.0, 0.0));
        assert_eq!(sampler.stats(), ResourceStats::default());
    }

    #[tokio::test]
    async fn test_tick_failures_are_swallowed() {
        let mut sampler = ResourceSampler::with_probe(FailingProbe, Duration::from_millis(5));

        sampler.start();
        tokio::time::sleep(Duration::from_millis(30)).await;
        sampler.stop();

        assert_eq!(sampler.memory_stats(), (0.0, 0.0));
    }

    #[tokio::test]
    async fn test_start_after_dispose_is_noop() {
        let probe = FixedProbe {
            reading: reading(64, 0),
        };
        let mut sampler = ResourceSampler::with_probe(probe, Duration::from_millis(5));

        sampler.dispose();
        sampler.start();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(!sampler.is_running());
        assert_eq!(sampler.memory_stats(), (0.0, 0.0));
    }

    #[tokio::test]
    async fn test_zero_interval_is_raised() {
        let reader = FixedProbe {
            reading: reading(32, 0),
        };
        let mut sampler = ResourceSampler::with_probe(reader, Duration::ZERO);
        assert_eq!(sampler.interval, MIN_SAMPLE_INTERVAL);

        sampler.start();
        tokio::time::sleep(Duration::from_millis(20)).await;
        sampler.stop();

        assert_eq!(sampler.memory_stats(), (32.0, 32.0));
    }

    struct SlowReader {
        reads: usize,
        delay: Duration,
    }

    impl ProcessProbe for SlowReader {
        fn read(&mut self) -> Result<ProcessReading, SamplerError> {
            self.reads += 1;
            // The baseline read in `start` stays fast.
            if self.reads > 1 {
                std::thread::sleep(self.delay);
            }
            Ok(reading(16, 0))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_slow_read_does_not_block_stats_or_stop() {
        let reader = SlowReader {
            reads: 0,
            delay: Duration::from_millis(400),
        };
        let mut sampler = ResourceSampler::with_probe(reader, Duration::from_millis(5));

        sampler.start();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let started = Instant::now();
        let stats = sampler.stats();
        sampler.stop();
        assert!(started.elapsed() < Duration::from_millis(200));
        assert_eq!(stats, ResourceStats::default());

        // The in-flight read finishes after stop and must not be recorded.
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(sampler.memory_stats(), (0.0, 0.0));
    }

    #[test]
    fn test_sysinfo_probe_reads_current_process() {
        let mut probe = SysinfoProbe::new().unwrap();
        let reading = probe.read().unwrap();
        assert!(reading.memory_bytes > 0);
    }
}
