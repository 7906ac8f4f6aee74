use crate::{
    config::{AssetSettings, MissingAsset, Settings},
    detection::BenchmarkResult,
    detector::{all_backends, BackendKind},
    report,
    runner::{BenchmarkOptions, BenchmarkRunner},
    visualize::ResultVisualizer,
};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

const MODEL_DOWNLOAD_URL: &str = "https://github.com/ultralytics/assets/releases";
const IMAGE_DOWNLOAD_URL: &str = "https://www.ultralytics.com/images/bus.jpg";

#[derive(Error)]
pub enum AppError {
    #[error("{kind} not found: {}", .path.display())]
    MissingInput {
        kind: &'static str,
        path: PathBuf,
        instructions: String,
    },
}

// `main` returns this through `Box<dyn Error>`, which prints `Debug`; the
// instructions were already shown by `start_app`.
impl fmt::Debug for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl AppError {
    fn missing_input(missing: MissingAsset, assets: &AssetSettings) -> Self {
        match missing {
            MissingAsset::Model(path) => {
                let instructions = format!(
                    "Please download a YOLO model and place it in the {} folder:\n\
                     1. Download {} from: {}\n\
                     2. Place the file in: {}",
                    assets.dir.display(),
                    assets.model_file,
                    MODEL_DOWNLOAD_URL,
                    path.display()
                );
                AppError::MissingInput {
                    kind: "Model file",
                    path,
                    instructions,
                }
            }
            MissingAsset::Image(path) => {
                let instructions = format!(
                    "Please place a test image (for example {}) in the {} folder:\n\
                     - Supported formats: JPG, PNG, BMP\n\
                     - File name: {}\n\
                     - Location: {}",
                    IMAGE_DOWNLOAD_URL,
                    assets.dir.display(),
                    assets.image_file,
                    path.display()
                );
                AppError::MissingInput {
                    kind: "Test image",
                    path,
                    instructions,
                }
            }
        }
    }
}

/// `WxH` from the image header, or `Unknown` when it cannot be read.
pub fn image_size_label(image_path: &Path) -> String {
    match image::image_dimensions(image_path) {
        Ok((width, height)) => format!("{}x{}", width, height),
        Err(_) => "Unknown".to_string(),
    }
}

pub struct App {
    runner: BenchmarkRunner,
    settings: Settings,
}

impl App {
    /// Checks inputs and wires the runner.
    pub fn new(settings: Settings) -> Result<Self, AppError> {
        settings
            .assets
            .validate()
            .map_err(|missing| AppError::missing_input(missing, &settings.assets))?;

        let options = BenchmarkOptions {
            sample_interval: settings.benchmark.get_sample_interval(),
            pause_between_backends: settings.benchmark.get_pause_between_backends(),
        };
        let runner = BenchmarkRunner::new(
            settings.assets.get_model_path(),
            settings.assets.get_image_path(),
        )
        .with_options(options)
        .with_visualizer(Box::new(build_visualizer(&settings)));

        Ok(Self { runner, settings })
    }

    pub async fn run(&self) -> Result<Vec<BenchmarkResult>, Box<dyn std::error::Error>> {
        let detectors = all_backends(&self.settings.model);

        println!("Starting benchmark tests...");
        println!("This may take a few minutes to complete.\n");

        let results = self.runner.run_benchmarks(detectors).await?;
        report::display_results(&results);

        Ok(results)
    }
}

fn build_visualizer(settings: &Settings) -> ResultVisualizer {
    let visualizer = ResultVisualizer::new(&settings.output.dir);
    let Some(font_file) = &settings.output.font_file else {
        return visualizer;
    };

    match visualizer.with_font_file(font_file) {
        Ok(visualizer) => visualizer,
        Err(e) => {
            tracing::warn!("{}; labels will not be drawn", e);
            ResultVisualizer::new(&settings.output.dir)
        }
    }
}

fn print_banner() {
    let names: Vec<&str> = BackendKind::ALL.iter().map(|kind| kind.as_str()).collect();
    println!("Object Detection Benchmark");
    println!("Comparing {}", names.join(", "));
    println!("{}", "=".repeat(60));
}

pub async fn start_app(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    print_banner();

    let app = match App::new(settings) {
        Ok(app) => app,
        Err(e) => {
            let AppError::MissingInput { instructions, .. } = &e;
            println!("❌ {}", e);
            println!("\n{}", instructions);
            return Err(e.into());
        }
    };

    let model_path = app.settings.assets.get_model_path();
    let image_path = app.settings.assets.get_image_path();
    println!("✅ Model file: {}", model_path.display());
    println!("✅ Test image: {}", image_path.display());
    println!("Image size: {}", image_size_label(&image_path));
    println!();

    tracing::info!(
        "benchmarking {} backends against {}",
        BackendKind::ALL.len(),
        model_path.display()
    );
    app.run().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn settings_in(dir: &Path) -> Settings {
        let mut settings = Settings::default();
        settings.assets.dir = dir.to_path_buf();
        settings.output.dir = dir.join("results");
        settings
    }

    #[test]
    fn test_missing_model_reports_download_instructions() {
        let dir = tempfile::tempdir().unwrap();

        let Err(AppError::MissingInput {
            kind,
            path,
            instructions,
        }) = App::new(settings_in(dir.path()))
        else {
            panic!("expected a missing model");
        };

        assert_eq!(kind, "Model file");
        assert_eq!(path, dir.path().join("yolo11n.onnx"));
        assert!(instructions.contains(MODEL_DOWNLOAD_URL));
    }

    #[test]
    fn test_missing_image_reports_download_instructions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("yolo11n.onnx"), b"onnx").unwrap();

        let err = App::new(settings_in(dir.path())).err().unwrap();

        assert!(err.to_string().starts_with("Test image not found:"));
        let AppError::MissingInput { instructions, .. } = err;
        assert!(instructions.contains(IMAGE_DOWNLOAD_URL));
        assert!(instructions.contains("File name: test_image.jpg"));
    }

    #[test]
    fn test_missing_input_debug_omits_instructions() {
        let dir = tempfile::tempdir().unwrap();

        let err = App::new(settings_in(dir.path())).err().unwrap();
        let debug = format!("{:?}", err);

        assert_eq!(debug, err.to_string());
        assert!(!debug.contains(MODEL_DOWNLOAD_URL));
    }

    #[test]
    fn test_image_size_label() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bus.png");
        RgbImage::from_pixel(81, 27, Rgb([0, 0, 0])).save(&path).unwrap();

        assert_eq!(image_size_label(&path), "81x27");
        assert_eq!(image_size_label(&dir.path().join("missing.jpg")), "Unknown");
    }

    #[test]
    fn test_unreadable_font_falls_back_to_plain_visualizer() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = settings_in(dir.path());
        settings.output.font_file = Some(dir.path().join("missing.ttf"));

        assert!(!build_visualizer(&settings).has_font());
    }
}
