use crate::detection::{as_millis_f64, BenchmarkResult};
use crate::runner::RUN_COUNT;
use std::fmt::Write;

const WIDE_RULE: usize = 120;
const SECTION_RULE: usize = 60;

/// Backends picked out by the analysis sections. Ties go to the backend
/// benchmarked first.
#[derive(Debug)]
pub struct Highlights<'a> {
    pub fastest_load: &'a BenchmarkResult,
    pub fastest_single: &'a BenchmarkResult,
    pub fastest_average: &'a BenchmarkResult,
    pub most_detections: &'a BenchmarkResult,
    pub lowest_peak_memory: &'a BenchmarkResult,
    pub highest_peak_memory: &'a BenchmarkResult,
    pub lowest_peak_cpu: &'a BenchmarkResult,
    pub highest_peak_cpu: &'a BenchmarkResult,
}

impl<'a> Highlights<'a> {
    /// `None` when no backend succeeded.
    pub fn from_results(results: &'a [BenchmarkResult]) -> Option<Self> {
        let successful: Vec<&BenchmarkResult> = results.iter().filter(|r| r.success).collect();
        if successful.is_empty() {
            return None;
        }

        Some(Self {
            fastest_load: lowest(&successful, |r| as_millis_f64(r.model_load_time))?,
            fastest_single: lowest(&successful, |r| as_millis_f64(r.single_prediction_time))?,
            fastest_average: lowest(&successful, |r| as_millis_f64(r.average_prediction_time))?,
            most_detections: highest(&successful, |r| r.total_detections as f64)?,
            lowest_peak_memory: lowest(&successful, |r| r.resources.peak_memory_mb)?,
            highest_peak_memory: highest(&successful, |r| r.resources.peak_memory_mb)?,
            lowest_peak_cpu: lowest(&successful, |r| r.resources.peak_cpu_percent)?,
            highest_peak_cpu: highest(&successful, |r| r.resources.peak_cpu_percent)?,
        })
    }
}

fn lowest<'a>(
    results: &[&'a BenchmarkResult],
    key: impl Fn(&BenchmarkResult) -> f64,
) -> Option<&'a BenchmarkResult> {
    results.iter().copied().fold(None, |best, candidate| match best {
        Some(best) if key(best) <= key(candidate) => Some(best),
        _ => Some(candidate),
    })
}

fn highest<'a>(
    results: &[&'a BenchmarkResult],
    key: impl Fn(&BenchmarkResult) -> f64,
) -> Option<&'a BenchmarkResult> {
    results.iter().copied().fold(None, |best, candidate| match best {
        Some(best) if key(best) >= key(candidate) => Some(best),
        _ => Some(candidate),
    })
}

fn ms_or_na(result: &BenchmarkResult, value: std::time::Duration) -> String {
    if result.success {
        format!("{:.1}", as_millis_f64(value))
    } else {
        "N/A".to_string()
    }
}

/// Renders the full comparison report.
pub fn render_report(results: &[BenchmarkResult]) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = write_report(&mut out, results);
    out
}

pub fn display_results(results: &[BenchmarkResult]) {
    println!("{}", render_report(results));
}

fn write_report(out: &mut String, results: &[BenchmarkResult]) -> std::fmt::Result {
    writeln!(out, "\n{}", "=".repeat(WIDE_RULE))?;
    writeln!(out, "OBJECT DETECTION BENCHMARK RESULTS")?;
    writeln!(out, "{}", "=".repeat(WIDE_RULE))?;

    let avg_header = format!("Avg {} Runs", RUN_COUNT);
    writeln!(out, "\nPERFORMANCE METRICS:")?;
    writeln!(
        out,
        "{:<15} {:<10} {:<11} {:<11} {:<10} {:<10}",
        "Library", "Load Time", "Single Pred", avg_header, "Detections", "Status"
    )?;
    writeln!(
        out,
        "{:<15} {:<10} {:<11} {:<11} {:<10} {:<10}",
        "Name", "(ms)", "(ms)", "(ms)", "Count", ""
    )?;
    writeln!(out, "{}", "-".repeat(85))?;

    for result in results {
        let detections = if result.success {
            result.total_detections.to_string()
        } else {
            "N/A".to_string()
        };
        let status = if result.success { "✓ Success" } else { "✗ Failed" };
        writeln!(
            out,
            "{:<15} {:<10} {:<11} {:<11} {:<10} {:<10}",
            result.backend_name,
            ms_or_na(result, result.model_load_time),
            ms_or_na(result, result.single_prediction_time),
            ms_or_na(result, result.average_prediction_time),
            detections,
            status
        )?;
    }

    writeln!(out, "\nRESOURCE USAGE:")?;
    writeln!(
        out,
        "{:<15} {:<10} {:<10} {:<10} {:<10}",
        "Library", "Peak RAM", "Avg RAM", "Peak CPU", "Avg CPU"
    )?;
    writeln!(
        out,
        "{:<15} {:<10} {:<10} {:<10} {:<10}",
        "Name", "(MB)", "(MB)", "(%)", "(%)"
    )?;
    writeln!(out, "{}", "-".repeat(70))?;

    for result in results {
        if result.success {
            let stats = &result.resources;
            writeln!(
                out,
                "{:<15} {:<10.1} {:<10.1} {:<10.1} {:<10.1}",
                result.backend_name,
                stats.peak_memory_mb,
                stats.average_memory_mb,
                stats.peak_cpu_percent,
                stats.average_cpu_percent
            )?;
        } else {
            writeln!(
                out,
                "{:<15} {:<10} {:<10} {:<10} {:<10}",
                result.backend_name, "N/A", "N/A", "N/A", "N/A"
            )?;
        }
    }

    writeln!(out, "{}", "-".repeat(WIDE_RULE))?;

    if let Some(best) = Highlights::from_results(results) {
        write_analysis(out, &best)?;
    }

    let failed: Vec<&BenchmarkResult> = results.iter().filter(|r| !r.success).collect();
    if !failed.is_empty() {
        writeln!(out, "\nERRORS:")?;
        writeln!(out, "{}", "-".repeat(SECTION_RULE))?;
        for result in failed {
            writeln!(
                out,
                "❌ {}: {}",
                result.backend_name,
                result.error_message.as_deref().unwrap_or("unknown error")
            )?;
        }
    }

    write!(out, "{}", "=".repeat(WIDE_RULE))
}

fn write_analysis(out: &mut String, best: &Highlights<'_>) -> std::fmt::Result {
    writeln!(out, "\nPERFORMANCE ANALYSIS:")?;
    writeln!(out, "{}", "-".repeat(SECTION_RULE))?;
    writeln!(
        out,
        "🚀 Fastest Model Loading: {} ({:.1} ms)",
        best.fastest_load.backend_name,
        as_millis_f64(best.fastest_load.model_load_time)
    )?;
    writeln!(
        out,
        "⚡ Fastest Single Prediction: {} ({:.1} ms)",
        best.fastest_single.backend_name,
        as_millis_f64(best.fastest_single.single_prediction_time)
    )?;
    writeln!(
        out,
        "🏎️  Fastest Average Prediction: {} ({:.1} ms)",
        best.fastest_average.backend_name,
        as_millis_f64(best.fastest_average.average_prediction_time)
    )?;
    writeln!(
        out,
        "🎯 Most Detections Found: {} ({} objects)",
        best.most_detections.backend_name, best.most_detections.total_detections
    )?;

    writeln!(out, "\nRESOURCE USAGE ANALYSIS:")?;
    writeln!(out, "{}", "-".repeat(SECTION_RULE))?;
    writeln!(
        out,
        "💚 Lowest Peak RAM: {} ({:.1} MB)",
        best.lowest_peak_memory.backend_name, best.lowest_peak_memory.resources.peak_memory_mb
    )?;
    writeln!(
        out,
        "💛 Highest Peak RAM: {} ({:.1} MB)",
        best.highest_peak_memory.backend_name, best.highest_peak_memory.resources.peak_memory_mb
    )?;
    writeln!(
        out,
        "🔋 Lowest Peak CPU: {} ({:.1}%)",
        best.lowest_peak_cpu.backend_name, best.lowest_peak_cpu.resources.peak_cpu_percent
    )?;
    writeln!(
        out,
        "🔥 Highest Peak CPU: {} ({:.1}%)",
        best.highest_peak_cpu.backend_name, best.highest_peak_cpu.resources.peak_cpu_percent
    )?;

    writeln!(out, "\nRECOMMENDATIONS:")?;
    writeln!(out, "🏆 Best Overall Performance: {}", best.fastest_average.backend_name)?;
    writeln!(
        out,
        "🔧 Best for Resource-Constrained Environments: {}",
        best.lowest_peak_memory.backend_name
    )?;
    writeln!(out, "⚙️  Best for Quick Startup: {}", best.fastest_load.backend_name)?;
    writeln!(out, "🎪 Best for Detection Coverage: {}", best.most_detections.backend_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::ResourceStats;
    use std::time::Duration;

    fn success(
        name: &str,
        load_ms: u64,
        avg_ms: u64,
        detections: usize,
        peak_mb: f64,
    ) -> BenchmarkResult {
        BenchmarkResult {
            model_load_time: Duration::from_millis(load_ms),
            single_prediction_time: Duration::from_millis(avg_ms + 5),
            average_prediction_time: Duration::from_millis(avg_ms),
            total_detections: detections,
            success: true,
            resources: ResourceStats {
                peak_memory_mb: peak_mb,
                average_memory_mb: peak_mb - 10.0,
                peak_cpu_percent: 50.0,
                average_cpu_percent: 25.0,
            },
            ..BenchmarkResult::new(name)
        }
    }

    #[test]
    fn test_highlights_pick_extremes() {
        let results = vec![
            success("OnnxRuntime", 120, 40, 5, 210.0),
            success("OrtPipeline", 150, 30, 4, 260.0),
            BenchmarkResult::failed("Tract", "bad model"),
        ];

        let best = Highlights::from_results(&results).unwrap();

        assert_eq!(best.fastest_load.backend_name, "OnnxRuntime");
        assert_eq!(best.fastest_average.backend_name, "OrtPipeline");
        assert_eq!(best.most_detections.backend_name, "OnnxRuntime");
        assert_eq!(best.lowest_peak_memory.backend_name, "OnnxRuntime");
        assert_eq!(best.highest_peak_memory.backend_name, "OrtPipeline");
    }

    #[test]
    fn test_highlights_ties_go_to_first_backend() {
        let results = vec![
            success("OnnxRuntime", 100, 30, 4, 200.0),
            success("OrtPipeline", 100, 30, 4, 200.0),
        ];

        let best = Highlights::from_results(&results).unwrap();

        assert_eq!(best.fastest_load.backend_name, "OnnxRuntime");
        assert_eq!(best.most_detections.backend_name, "OnnxRuntime");
        assert_eq!(best.highest_peak_cpu.backend_name, "OnnxRuntime");
        assert_eq!(best.lowest_peak_cpu.backend_name, "OnnxRuntime");
    }

    #[test]
    fn test_no_highlights_when_everything_failed() {
        let results = vec![BenchmarkResult::failed("Tract", "bad model")];
        assert!(Highlights::from_results(&results).is_none());

        let report = render_report(&results);
        assert!(!report.contains("PERFORMANCE ANALYSIS"));
        assert!(report.contains("❌ Tract: bad model"));
    }

    #[test]
    fn test_report_rows() {
        let results = vec![
            success("OnnxRuntime", 120, 40, 5, 210.0),
            BenchmarkResult::failed("Tract", "Model file not found: assets/yolo11n.onnx"),
        ];

        let report = render_report(&results);

        assert!(report.contains("Avg 5 Runs"));
        assert!(report.contains(
            "OnnxRuntime     120.0      45.0        40.0        5          ✓ Success"
        ));
        assert!(report.contains("Tract           N/A        N/A         N/A         N/A        ✗ Failed"));
        assert!(report.contains("OnnxRuntime     210.0      200.0      50.0       25.0"));
        assert!(report.contains("Tract           N/A        N/A        N/A        N/A"));
        assert!(report.contains("🏆 Best Overall Performance: OnnxRuntime"));
        assert!(report.contains("❌ Tract: Model file not found: assets/yolo11n.onnx"));
    }
}
