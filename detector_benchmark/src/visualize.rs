//! Annotated images, per-backend detail files and the cross-backend
//! comparison image written after a benchmark run.

use crate::detection::Detection;
use crate::labels::color_for;
use ab_glyph::{FontVec, PxScale};
use async_trait::async_trait;
use image::{Pixel, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

const BOX_THICKNESS: i32 = 3;
const LABEL_SCALE: f32 = 16.0;
const TITLE_SCALE: f32 = 20.0;
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Failed to load font: {0}")]
    Font(String),
    #[error("Visualization task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Receives the detections of every backend worth drawing, keyed by
/// backend name in benchmark order.
#[async_trait]
pub trait DetectionVisualizer: Send + Sync {
    async fn visualize(
        &self,
        image_path: &Path,
        results: &[(String, Vec<Detection>)],
    ) -> Result<(), VisualizationError>;
}

/// Writes results under `output_dir`. Without a font, boxes are drawn but
/// labels and titles are not.
#[derive(Clone)]
pub struct ResultVisualizer {
    output_dir: PathBuf,
    font: Option<Arc<FontVec>>,
}

impl ResultVisualizer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            font: None,
        }
    }

    pub fn with_font_file(mut self, font_file: &Path) -> Result<Self, VisualizationError> {
        let bytes = fs::read(font_file)
            .map_err(|e| VisualizationError::Font(format!("{}: {}", font_file.display(), e)))?;
        let font = FontVec::try_from_vec(bytes)
            .map_err(|e| VisualizationError::Font(format!("{}: {}", font_file.display(), e)))?;
        self.font = Some(Arc::new(font));
        Ok(self)
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Writes `<backend>/<stem>_detections.jpg` and `<backend>/<stem>_details.txt`.
    pub fn save_detection_results(
        &self,
        image: &RgbImage,
        file_stem: &str,
        backend_name: &str,
        detections: &[Detection],
    ) -> Result<PathBuf, VisualizationError> {
        let backend_dir = self.output_dir.join(backend_name);
        fs::create_dir_all(&backend_dir)?;

        let mut annotated = image.clone();
        draw_detections(&mut annotated, detections, self.font.as_deref());

        let image_path = backend_dir.join(format!("{}_detections.jpg", file_stem));
        annotated.save(&image_path)?;

        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let details_path = backend_dir.join(format!("{}_details.txt", file_stem));
        fs::write(&details_path, detection_details(detections, &timestamp))?;

        Ok(image_path)
    }

    /// Writes `<stem>_comparison.jpg`: the original first, then one
    /// annotated copy per backend.
    pub fn create_comparison_image(
        &self,
        image: &RgbImage,
        file_stem: &str,
        results: &[(String, Vec<Detection>)],
    ) -> Result<PathBuf, VisualizationError> {
        fs::create_dir_all(&self.output_dir)?;

        let (width, height) = image.dimensions();
        let (cols, rows) = comparison_grid(results.len());
        let mut canvas = RgbImage::new(width * cols, height * rows);
        let font = self.font.as_deref();

        image::imageops::replace(&mut canvas, image, 0, 0);
        if let Some(font) = font {
            let scale = PxScale::from(TITLE_SCALE);
            draw_text_mut(&mut canvas, TEXT_COLOR, 10, 10, scale, font, "Original");
        }

        for (index, (backend_name, detections)) in results.iter().enumerate() {
            let cell = index as u32 + 1;
            let x = (cell % cols) * width;
            let y = (cell / cols) * height;

            let mut annotated = image.clone();
            draw_detections(&mut annotated, detections, font);
            image::imageops::replace(&mut canvas, &annotated, x as i64, y as i64);

            if let Some(font) = font {
                let title = format!("{} ({} objects)", backend_name, detections.len());
                draw_text_mut(
                    &mut canvas,
                    TEXT_COLOR,
                    x as i32 + 10,
                    y as i32 + 10,
                    PxScale::from(TITLE_SCALE),
                    font,
                    &title,
                );
            }
        }

        let comparison_path = self
            .output_dir
            .join(format!("{}_comparison.jpg", file_stem));
        canvas.save(&comparison_path)?;

        Ok(comparison_path)
    }

    fn render(
        &self,
        image_path: &Path,
        results: &[(String, Vec<Detection>)],
    ) -> Result<(), VisualizationError> {
        let image = image::open(image_path)?.to_rgb8();
        let file_stem = image_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());

        for (backend_name, detections) in results {
            match self.save_detection_results(&image, &file_stem, backend_name, detections) {
                Ok(path) => tracing::info!("Results saved for {}: {}", backend_name, path.display()),
                Err(e) => tracing::error!("Error saving results for {}: {}", backend_name, e),
            }
        }

        let comparison_path = self.create_comparison_image(&image, &file_stem, results)?;
        tracing::info!("Comparison image saved: {}", comparison_path.display());

        Ok(())
    }
}

#[async_trait]
impl DetectionVisualizer for ResultVisualizer {
    async fn visualize(
        &self,
        image_path: &Path,
        results: &[(String, Vec<Detection>)],
    ) -> Result<(), VisualizationError> {
        let visualizer = self.clone();
        let image_path = image_path.to_path_buf();
        let results = results.to_vec();

        tokio::task::spawn_blocking(move || visualizer.render(&image_path, &results)).await?
    }
}

/// Columns and rows of the comparison grid for `backends` annotated cells
/// plus the original.
pub fn comparison_grid(backends: usize) -> (u32, u32) {
    let cols = backends.clamp(1, 2);
    let rows = (backends + 1).div_ceil(cols);
    (cols as u32, rows as u32)
}

pub fn draw_detections(image: &mut RgbImage, detections: &[Detection], font: Option<&FontVec>) {
    for detection in detections {
        let color = color_for(&detection.label).to_rgb();
        let x = detection.x.round() as i32;
        let y = detection.y.round() as i32;
        let width = detection.width.round().max(1.0) as u32;
        let height = detection.height.round().max(1.0) as u32;

        for offset in 0..BOX_THICKNESS {
            let rect = Rect::at(x - offset, y - offset)
                .of_size(width + 2 * offset as u32, height + 2 * offset as u32);
            draw_hollow_rect_mut(image, rect, color);
        }

        let Some(font) = font else {
            continue;
        };

        let label = format!("{} ({:.1}%)", detection.label, detection.confidence * 100.0);
        let scale = PxScale::from(LABEL_SCALE);
        let (text_width, text_height) = text_size(scale, font, &label);
        let tag_y = y - text_height as i32 - 4;

        draw_filled_rect_mut(
            image,
            Rect::at(x, tag_y).of_size(text_width + 8, text_height + 4),
            color,
        );
        draw_text_mut(image, TEXT_COLOR, x + 4, tag_y + 2, scale, font, &label);
    }
}

/// Label counts, most frequent first; equal counts keep first-seen order.
pub fn object_summary(detections: &[Detection]) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for detection in detections {
        match counts.iter_mut().find(|(label, _)| *label == detection.label) {
            Some((_, count)) => *count += 1,
            None => counts.push((detection.label.clone(), 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

pub fn detection_details(detections: &[Detection], timestamp: &str) -> String {
    let mut lines = vec![
        format!("Detection Results - {}", timestamp),
        format!("Total Detections: {}", detections.len()),
        String::new(),
        "Detected Objects:".to_string(),
        "================".to_string(),
    ];

    for (index, detection) in detections.iter().enumerate() {
        lines.push(format!("{:02}. {}", index + 1, detection.label));
        lines.push(format!("    Confidence: {:.1}%", detection.confidence * 100.0));
        lines.push(format!(
            "    Bounding Box: X={:.1}, Y={:.1}, W={:.1}, H={:.1}",
            detection.x, detection.y, detection.width, detection.height
        ));
        lines.push(String::new());
    }

    lines.push("Object Summary:".to_string());
    lines.push("===============".to_string());
    for (label, count) in object_summary(detections) {
        lines.push(format!("{}: {} object(s)", label, count));
    }

    let mut details = lines.join("\n");
    details.push('\n');
    details
}
