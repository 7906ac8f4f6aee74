use super::ensure_model_file;
use crate::config::ModelSettings;
use crate::detection::Detection;
use crate::detector::{BackendKind, Detector, DetectorError};
use crate::yolo;
use async_trait::async_trait;
use image::GenericImageView;
use ndarray::{ArrayD, IxDyn};
use std::path::Path;
use std::sync::Arc;
use tract_onnx::prelude::*;
use tract_onnx::tract_hir::internal::TractErrorContext;

/// Optimised plan behind a closure so callers do not depend on the plan type.
type TractPlan = Arc<dyn Fn(TVec<TValue>) -> TractResult<TVec<TValue>> + Send + Sync>;

fn tract_error(err: TractError) -> DetectorError {
    DetectorError::Tract(format!("{:#}", err))
}

/// Pure-Rust ONNX inference through an optimised tract plan.
pub struct TractDetector {
    plan: Option<TractPlan>,
    settings: ModelSettings,
}

impl TractDetector {
    pub fn new(settings: &ModelSettings) -> Self {
        Self {
            plan: None,
            settings: settings.clone(),
        }
    }
}

fn load_plan(model_path: &Path, width: usize, height: usize) -> TractResult<TractPlan> {
    let runnable = tract_onnx::onnx()
        .model_for_path(model_path)
        .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
        .with_input_fact(
            0,
            InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, height, width)),
        )
        .context("failed to set input fact")?
        .into_optimized()
        .context("failed to optimize ONNX model")?
        .into_runnable()
        .context("failed to build runnable ONNX model")?;

    let plan: TractPlan = Arc::new(move |inputs: TVec<TValue>| runnable.run(inputs));
    Ok(plan)
}

fn run_plan(
    plan: &TractPlan,
    image_path: &Path,
    settings: &ModelSettings,
) -> Result<Vec<Detection>, DetectorError> {
    let image = image::open(image_path)?;
    let (width, height) = image.dimensions();
    let input = yolo::image_to_tensor(&image, settings.input_width, settings.input_height);

    let data = input
        .as_slice()
        .ok_or_else(|| DetectorError::Inference("input tensor is not contiguous".to_string()))?;
    let tensor = Tensor::from_shape(input.shape(), data).map_err(tract_error)?;

    let outputs = plan.as_ref()(tvec!(tensor.into())).map_err(tract_error)?;
    let output = outputs
        .first()
        .ok_or_else(|| DetectorError::Inference("model produced no outputs".to_string()))?;
    let view = output.to_array_view::<f32>().map_err(tract_error)?;

    let array = ArrayD::from_shape_vec(IxDyn(view.shape()), view.iter().copied().collect())?;
    let boxes = yolo::decode_output(array.view(), settings, width, height)?;

    Ok(yolo::non_maximum_suppression(boxes, settings.iou_threshold))
}

#[async_trait]
impl Detector for TractDetector {
    fn name(&self) -> &str {
        BackendKind::Tract.as_str()
    }

    async fn initialize(&mut self, model_path: &Path) -> Result<(), DetectorError> {
        ensure_model_file(model_path)?;
        let model_path = model_path.to_path_buf();
        let width = self.settings.input_width as usize;
        let height = self.settings.input_height as usize;

        let plan = tokio::task::spawn_blocking(move || load_plan(&model_path, width, height))
            .await?
            .map_err(tract_error)?;

        self.plan = Some(plan);
        tracing::debug!("{} plan optimized", self.name());
        Ok(())
    }

    async fn detect(&self, image_path: &Path) -> Result<Vec<Detection>, DetectorError> {
        let plan = self.plan.clone().ok_or(DetectorError::NotInitialized)?;
        let image_path = image_path.to_path_buf();
        let settings = self.settings.clone();

        tokio::task::spawn_blocking(move || run_plan(&plan, &image_path, &settings)).await?
    }

    fn dispose(&mut self) {
        self.plan.take();
    }
}
