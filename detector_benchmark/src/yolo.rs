//! YOLO pre- and post-processing shared by every backend.
//!
//! Models take a `1x3xHxW` tensor of RGB values scaled to `[0, 1]` and
//! produce `1x(4+C)xN`: for each of the N candidates a centre box
//! `(cx, cy, w, h)` in model pixels followed by C class scores.

use crate::config::ModelSettings;
use crate::detection::Detection;
use crate::detector::DetectorError;
use crate::labels::class_label;
use image::{imageops::FilterType, DynamicImage, GenericImageView};
use ndarray::{Array, ArrayViewD, Axis, Ix3, Ix4};

/// Resizes to the model input and lays pixels out as NCHW floats.
pub fn image_to_tensor(image: &DynamicImage, width: u32, height: u32) -> Array<f32, Ix4> {
    let img = image.resize_exact(width, height, FilterType::CatmullRom);

    let mut input = Array::zeros((1, 3, height as usize, width as usize));
    for pixel in img.pixels() {
        let x = pixel.0 as usize;
        let y = pixel.1 as usize;
        let [r, g, b, _] = pixel.2 .0;
        input[[0, 0, y, x]] = (r as f32) / 255.;
        input[[0, 1, y, x]] = (g as f32) / 255.;
        input[[0, 2, y, x]] = (b as f32) / 255.;
    }

    input
}

/// Turns raw model output into detections in original-image coordinates.
///
/// Candidates whose best class score is below `min_probability` are dropped.
pub fn decode_output(
    output: ArrayViewD<f32>,
    settings: &ModelSettings,
    image_width: u32,
    image_height: u32,
) -> Result<Vec<Detection>, DetectorError> {
    let output = output.into_dimensionality::<Ix3>()?;
    if output.shape()[0] == 0 || output.shape()[1] <= 4 {
        return Err(DetectorError::Inference(format!(
            "unexpected model output shape {:?}",
            output.shape()
        )));
    }

    let x_scale = image_width as f32 / settings.input_width as f32;
    let y_scale = image_height as f32 / settings.input_height as f32;

    let mut detections = Vec::new();
    for candidate in output.index_axis(Axis(0), 0).axis_iter(Axis(1)) {
        let row: Vec<_> = candidate.iter().copied().collect();
        let Some((class_id, prob)) = row
            .iter()
            .skip(4)
            .enumerate()
            .map(|(index, value)| (index, *value))
            .reduce(|accum, row| if row.1 > accum.1 { row } else { accum })
        else {
            continue;
        };

        if prob < settings.min_probability {
            continue;
        }

        let w = row[2] * x_scale;
        let h = row[3] * y_scale;
        let x = row[0] * x_scale - w / 2.;
        let y = row[1] * y_scale - h / 2.;

        detections.push(Detection::new(class_label(class_id), prob, x, y, w, h));
    }

    Ok(detections)
}

/// Greedy suppression: keeps the most confident box and drops every box
/// overlapping it by at least `iou_threshold`, then repeats.
pub fn non_maximum_suppression(mut boxes: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    boxes.sort_by(|box1, box2| box2.confidence.total_cmp(&box1.confidence));
    let mut result = Vec::new();

    while !boxes.is_empty() {
        let best = boxes.remove(0);
        boxes.retain(|candidate| best.intersection_over_union(candidate) < iou_threshold);
        result.push(best);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use ndarray::Array3;

    fn settings() -> ModelSettings {
        ModelSettings {
            input_width: 4,
            input_height: 4,
            min_probability: 0.5,
            iou_threshold: 0.7,
        }
    }

    /// Builds a `1x(4+classes)xN` output from per-candidate rows.
    fn output(rows: &[Vec<f32>]) -> Array3<f32> {
        let features = rows[0].len();
        Array3::from_shape_fn((1, features, rows.len()), |(_, f, n)| rows[n][f])
    }

    #[test]
    fn test_image_to_tensor() {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(100, 50, Rgb([255, 0, 51]));
        let input = image_to_tensor(&DynamicImage::ImageRgb8(img), 640, 640);

        assert_eq!(input.shape(), &[1, 3, 640, 640]);
        assert!((input[[0, 0, 10, 10]] - 1.0).abs() < 1e-2);
        assert!(input[[0, 1, 10, 10]].abs() < 1e-2);
        assert!((input[[0, 2, 639, 639]] - 0.2).abs() < 1e-2);
    }

    #[test]
    fn test_decode_scales_to_image_and_thresholds() {
        let out = output(&[
            vec![2.0, 2.0, 2.0, 2.0, 0.1, 0.9],
            vec![1.0, 1.0, 1.0, 1.0, 0.4, 0.3],
            vec![3.0, 1.0, 2.0, 2.0, 0.6, 0.2],
        ]);

        let detections = decode_output(out.view().into_dyn(), &settings(), 8, 4).unwrap();

        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0], Detection::new("bicycle", 0.9, 2.0, 1.0, 4.0, 2.0));
        assert_eq!(detections[1], Detection::new("person", 0.6, 4.0, 0.0, 4.0, 2.0));
    }

    #[test]
    fn test_decode_rejects_malformed_output() {
        let out = Array3::<f32>::zeros((1, 4, 10));
        let result = decode_output(out.view().into_dyn(), &settings(), 4, 4);
        assert!(matches!(result, Err(DetectorError::Inference(_))));

        let flat = ndarray::Array2::<f32>::zeros((84, 10));
        let result = decode_output(flat.view().into_dyn(), &settings(), 4, 4);
        assert!(matches!(result, Err(DetectorError::Shape(_))));
    }

    #[test]
    fn test_nms_keeps_best_of_overlapping_boxes() {
        let boxes = vec![
            Detection::new("car", 0.6, 0.0, 0.0, 4.0, 4.0),
            Detection::new("car", 0.55, 0.0, 0.0, 4.2, 4.2),
            Detection::new("car", 0.75, 6.0, 6.0, 4.0, 4.0),
        ];

        let kept = non_maximum_suppression(boxes, 0.7);

        assert_eq!(
            kept,
            vec![
                Detection::new("car", 0.75, 6.0, 6.0, 4.0, 4.0),
                Detection::new("car", 0.6, 0.0, 0.0, 4.0, 4.0),
            ]
        );
    }

    #[test]
    fn test_nms_keeps_disjoint_boxes() {
        let boxes = vec![
            Detection::new("bus", 0.9, 0.0, 0.0, 1.0, 1.0),
            Detection::new("bus", 0.6, 2.0, 2.0, 1.0, 1.0),
        ];

        assert_eq!(non_maximum_suppression(boxes.clone(), 0.7), boxes);
    }
}
