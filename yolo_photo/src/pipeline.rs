use crate::{
    config::{Config, DetectionConfig, ModelConfig},
    decoder::DetectionDecoder,
    detection::{Detection, Prediction},
    encoder::TensorEncoder,
    error::{DetectError, Result},
    labels::LabelSet,
    model_service::ModelHandle,
    post_filter::{self, PostFilter},
};
use image::DynamicImage;
use serde::Deserialize;
use tracing::instrument;

/// How detections collapse into the one reported prediction.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReductionPolicy {
    /// Top detection, or the empty prediction when nothing passed.
    #[default]
    HighestConfidence,
    /// Always the empty prediction.
    Discard,
}

impl ReductionPolicy {
    pub fn reduce(&self, detections: &[Detection]) -> Prediction {
        match self {
            ReductionPolicy::HighestConfidence => detections
                .iter()
                .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
                .map(Prediction::from)
                .unwrap_or_default(),
            ReductionPolicy::Discard => Prediction::default(),
        }
    }
}

/// Loaded once at startup and lent to every `predict` call.
pub struct InferenceContext<M: ModelHandle> {
    model: M,
    labels: LabelSet,
}

impl<M: ModelHandle> InferenceContext<M> {
    pub fn new(model: M, labels: LabelSet, num_classes: usize) -> Self {
        if labels.len() != num_classes {
            tracing::warn!(
                "Label file has {} entries but the model has {} classes",
                labels.len(),
                num_classes
            );
        }
        Self { model, labels }
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }
}

pub struct Pipeline {
    encoder: TensorEncoder,
    decoder: DetectionDecoder,
    post_filter: Box<dyn PostFilter>,
    reduction: ReductionPolicy,
    output_name: String,
}

impl Pipeline {
    pub fn new(
        encoder: TensorEncoder,
        decoder: DetectionDecoder,
        post_filter: Box<dyn PostFilter>,
        reduction: ReductionPolicy,
        output_name: &str,
    ) -> Self {
        Self {
            encoder,
            decoder,
            post_filter,
            reduction,
            output_name: output_name.to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::from_parts(&config.model, &config.detection)
    }

    pub fn from_parts(model: &ModelConfig, detection: &DetectionConfig) -> Self {
        Self::new(
            TensorEncoder::new(model.input_width, model.input_height),
            DetectionDecoder::new(
                model.num_classes,
                model.output_layout,
                detection.confidence_threshold,
                detection.score_scale,
            ),
            post_filter::from_iou_threshold(detection.nms_iou_threshold),
            detection.reduction,
            &model.output_name,
        )
    }

    pub fn encoder(&self) -> &TensorEncoder {
        &self.encoder
    }

    /// Encode, run and decode; detections are post-filtered and sorted by
    /// descending confidence.
    pub fn detect<M: ModelHandle>(
        &self,
        ctx: &InferenceContext<M>,
        img: &DynamicImage,
    ) -> Result<Vec<Detection>> {
        let input = self.encoder.encode(img)?;
        let outputs = ctx.model.run(&input)?;

        let output = outputs.get(&self.output_name).ok_or_else(|| {
            DetectError::Inference(format!("model produced no {:?} output", self.output_name))
        })?;
        let raw = output.as_slice().ok_or_else(|| {
            DetectError::Inference(format!("{:?} output is not contiguous", self.output_name))
        })?;

        let detections = self.decoder.decode(raw, &ctx.labels)?;
        let mut detections = self.post_filter.apply(detections);
        detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        for (i, detection) in detections.iter().enumerate() {
            tracing::debug!(
                "Detection {}: label={}, confidence={:.3}, bbox=({}, {}, {}, {})",
                i,
                detection.label,
                detection.confidence,
                detection.x,
                detection.y,
                detection.width,
                detection.height
            );
        }

        Ok(detections)
    }

    #[instrument(skip(self, ctx, img))]
    pub fn predict<M: ModelHandle>(
        &self,
        ctx: &InferenceContext<M>,
        img: &DynamicImage,
    ) -> Result<Prediction> {
        let detections = self.detect(ctx, img)?;
        Ok(self.reduce(&detections))
    }

    pub fn reduce(&self, detections: &[Detection]) -> Prediction {
        let prediction = self.reduction.reduce(detections);
        tracing::info!(
            "Predicted {:?} ({:.3}) from {} detections",
            prediction.label,
            prediction.confidence,
            detections.len()
        );
        prediction
    }
}
