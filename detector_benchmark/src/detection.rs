use std::time::Duration;

/// One recognized object instance, in pixel coordinates of the original image.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Detection {
    pub fn new(
        label: impl Into<String>,
        confidence: f32,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) -> Self {
        Self {
            label: label.into(),
            confidence,
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn intersection(&self, other: &Detection) -> f32 {
        let w = (self.x + self.width).min(other.x + other.width) - self.x.max(other.x);
        let h = (self.y + self.height).min(other.y + other.height) - self.y.max(other.y);
        w.max(0.0) * h.max(0.0)
    }

    pub fn intersection_over_union(&self, other: &Detection) -> f32 {
        let intersection = self.intersection(other);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }
}

/// Peak and average process usage observed during a monitoring window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResourceStats {
    pub peak_memory_mb: f64,
    pub average_memory_mb: f64,
    pub peak_cpu_percent: f64,
    pub average_cpu_percent: f64,
}

impl ResourceStats {
    /// Metric-wise maximum of two windows.
    pub fn max(self, other: ResourceStats) -> ResourceStats {
        ResourceStats {
            peak_memory_mb: self.peak_memory_mb.max(other.peak_memory_mb),
            average_memory_mb: self.average_memory_mb.max(other.average_memory_mb),
            peak_cpu_percent: self.peak_cpu_percent.max(other.peak_cpu_percent),
            average_cpu_percent: self.average_cpu_percent.max(other.average_cpu_percent),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BenchmarkResult {
    pub backend_name: String,
    pub model_load_time: Duration,
    pub single_prediction_time: Duration,
    pub average_prediction_time: Duration,
    pub total_detections: usize,
    pub success: bool,
    pub error_message: Option<String>,
    pub resources: ResourceStats,
    /// Detections from the single-prediction run, kept for visualization.
    pub detection_results: Option<Vec<Detection>>,
}

impl BenchmarkResult {
    pub fn new(backend_name: impl Into<String>) -> Self {
        Self {
            backend_name: backend_name.into(),
            ..Default::default()
        }
    }

    pub fn failed(backend_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            backend_name: backend_name.into(),
            success: false,
            error_message: Some(message.into()),
            ..Default::default()
        }
    }
}

pub fn as_millis_f64(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
