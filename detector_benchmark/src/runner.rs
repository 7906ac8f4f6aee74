use crate::detection::{BenchmarkResult, Detection};
use crate::detector::{Detector, DetectorError};
use crate::sampler::{ProcessProbe, ResourceSampler, SamplerError, SysinfoProbe};
use crate::visualize::DetectionVisualizer;
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Number of timed predictions averaged per backend.
pub const RUN_COUNT: usize = 5;

#[derive(Error, Debug)]
pub enum BenchmarkError {
    #[error("Resource sampler unavailable: {0}")]
    Sampler(#[from] SamplerError),
}

/// Where a backend is in the measurement protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Pending,
    Initializing,
    WarmingUp,
    MeasuringSingle,
    MeasuringAverage,
    Finalizing,
    Succeeded,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Pending => "pending",
            Phase::Initializing => "initializing",
            Phase::WarmingUp => "warming up",
            Phase::MeasuringSingle => "measuring single prediction",
            Phase::MeasuringAverage => "measuring average prediction",
            Phase::Finalizing => "finalizing",
            Phase::Succeeded => "succeeded",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BenchmarkOptions {
    pub sample_interval: Duration,
    pub pause_between_backends: Duration,
}

impl Default for BenchmarkOptions {
    fn default() -> Self {
        Self {
            sample_interval: crate::sampler::DEFAULT_SAMPLE_INTERVAL,
            pause_between_backends: Duration::from_secs(1),
        }
    }
}

type ProbeFactory = Box<dyn Fn() -> Result<Box<dyn ProcessProbe>, SamplerError> + Send + Sync>;

fn sysinfo_probe() -> Result<Box<dyn ProcessProbe>, SamplerError> {
    Ok(Box::new(SysinfoProbe::new()?))
}

/// Benchmarks detectors one at a time against a single model and image.
pub struct BenchmarkRunner {
    model_path: PathBuf,
    image_path: PathBuf,
    options: BenchmarkOptions,
    new_probe: ProbeFactory,
    visualizer: Option<Box<dyn DetectionVisualizer>>,
}

impl BenchmarkRunner {
    pub fn new(model_path: impl Into<PathBuf>, image_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            image_path: image_path.into(),
            options: BenchmarkOptions::default(),
            new_probe: Box::new(sysinfo_probe),
            visualizer: None,
        }
    }

    pub fn with_options(mut self, options: BenchmarkOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_visualizer(mut self, visualizer: Box<dyn DetectionVisualizer>) -> Self {
        self.visualizer = Some(visualizer);
        self
    }

    /// Replaces the process probe each backend's sampler reads from.
    pub fn with_probe_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Result<Box<dyn ProcessProbe>, SamplerError> + Send + Sync + 'static,
    {
        self.new_probe = Box::new(factory);
        self
    }

    /// Runs every detector in order and returns one result per detector.
    ///
    /// Detector failures are recorded in the results. Only a sampler that
    /// cannot be constructed aborts the run.
    pub async fn run_benchmarks(
        &self,
        detectors: Vec<Box<dyn Detector>>,
    ) -> Result<Vec<BenchmarkResult>, BenchmarkError> {
        let total = detectors.len();
        let mut results = Vec::with_capacity(total);

        for (index, mut detector) in detectors.into_iter().enumerate() {
            tracing::info!("Benchmarking {} ({}/{})", detector.name(), index + 1, total);

            let probe = (self.new_probe)()?;
            let mut sampler = ResourceSampler::with_probe(probe, self.options.sample_interval);
            let (result, _) = self.benchmark_one(detector.as_mut(), &mut sampler).await;
            sampler.dispose();
            detector.dispose();

            if result.success {
                tracing::info!(
                    "{} finished: avg {:.2} ms, {} detections",
                    result.backend_name,
                    crate::detection::as_millis_f64(result.average_prediction_time),
                    result.total_detections
                );
            }
            results.push(result);

            if index + 1 < total && !self.options.pause_between_backends.is_zero() {
                tokio::time::sleep(self.options.pause_between_backends).await;
            }
        }

        self.visualize(&results).await;

        Ok(results)
    }

    /// Runs the protocol for one detector and returns its result with the
    /// terminal phase reached.
    async fn benchmark_one<P: ProcessProbe>(
        &self,
        detector: &mut dyn Detector,
        sampler: &mut ResourceSampler<P>,
    ) -> (BenchmarkResult, Phase) {
        let name = detector.name().to_string();
        let mut phase = Phase::Pending;

        match self.measure(detector, sampler, &mut phase).await {
            Ok(result) => {
                advance(&mut phase, Phase::Succeeded, &name);
                (result, phase)
            }
            Err(e) => {
                sampler.stop();
                tracing::warn!("{} failed while {}: {}", name, phase, e);
                advance(&mut phase, Phase::Failed, &name);
                (BenchmarkResult::failed(name, e.to_string()), phase)
            }
        }
    }

    async fn measure<P: ProcessProbe>(
        &self,
        detector: &mut dyn Detector,
        sampler: &mut ResourceSampler<P>,
        phase: &mut Phase,
    ) -> Result<BenchmarkResult, DetectorError> {
        let mut result = BenchmarkResult::new(detector.name());
        let image_path = self.image_path.as_path();

        advance(phase, Phase::Initializing, &result.backend_name);
        sampler.start();
        let start = Instant::now();
        detector.initialize(&self.model_path).await?;
        result.model_load_time = start.elapsed();
        sampler.stop();
        let load_stats = sampler.stats();

        advance(phase, Phase::WarmingUp, &result.backend_name);
        detector.detect(image_path).await?;

        sampler.reset();
        sampler.start();

        advance(phase, Phase::MeasuringSingle, &result.backend_name);
        let start = Instant::now();
        let detections = detector.detect(image_path).await?;
        result.single_prediction_time = start.elapsed();
        result.total_detections = detections.len();

        advance(phase, Phase::MeasuringAverage, &result.backend_name);
        let mut durations = Vec::with_capacity(RUN_COUNT);
        for run in 0..RUN_COUNT {
            let start = Instant::now();
            detector.detect(image_path).await?;
            let elapsed = start.elapsed();
            tracing::debug!(
                "{} run {}: {:.2} ms",
                result.backend_name,
                run + 1,
                crate::detection::as_millis_f64(elapsed)
            );
            durations.push(elapsed);
        }
        result.average_prediction_time = mean_duration(&durations);

        advance(phase, Phase::Finalizing, &result.backend_name);
        sampler.stop();
        result.resources = load_stats.max(sampler.stats());
        result.detection_results = Some(detections);
        result.success = true;

        Ok(result)
    }

    async fn visualize(&self, results: &[BenchmarkResult]) {
        let Some(visualizer) = &self.visualizer else {
            return;
        };

        let detections = detections_to_visualize(results);
        if detections.is_empty() {
            tracing::info!("No detections to visualize");
            return;
        }

        if let Err(e) = visualizer.visualize(&self.image_path, &detections).await {
            tracing::error!("Visualization failed: {}", e);
        }
    }
}

fn advance(phase: &mut Phase, next: Phase, backend: &str) {
    tracing::debug!("{}: {} -> {}", backend, phase, next);
    *phase = next;
}

/// Successful backends that found at least one object, in benchmark order.
pub fn detections_to_visualize(results: &[BenchmarkResult]) -> Vec<(String, Vec<Detection>)> {
    results
        .iter()
        .filter(|result| result.success)
        .filter_map(|result| match &result.detection_results {
            Some(detections) if !detections.is_empty() => {
                Some((result.backend_name.clone(), detections.clone()))
            }
            _ => None,
        })
        .collect()
}

pub fn mean_duration(durations: &[Duration]) -> Duration {
    if durations.is_empty() {
        return Duration::ZERO;
    }
    durations.iter().sum::<Duration>() / durations.len() as u32
}
