use crate::{
    capture::load_image,
    config::Config,
    detection::Prediction,
    encoder::fit_to_input,
    error::Result,
    labels::LabelSet,
    model_service::ModelHandle,
    ort_service::OrtModelHandle,
    pipeline::{InferenceContext, Pipeline},
};
use image::GenericImageView;
use std::path::Path;

pub struct App<M: ModelHandle> {
    ctx: InferenceContext<M>,
    pipeline: Pipeline,
}

impl<M: ModelHandle> App<M> {
    pub fn new(ctx: InferenceContext<M>, pipeline: Pipeline) -> Self {
        Self { ctx, pipeline }
    }

    /// Takes a photo of any size, stretches it to the model input and
    /// reports detections in the photo's own pixel space.
    pub fn process_photo(&self, path: &Path) -> Result<Prediction> {
        let photo = load_image(path)?;
        let input_size = self.pipeline.encoder().dimensions();
        let img = fit_to_input(&photo, self.pipeline.encoder());

        let detections = self.pipeline.detect(&self.ctx, &img)?;
        for detection in &detections {
            let scaled = detection.rescaled(input_size, photo.dimensions());
            tracing::info!(
                "{} ({:.3}) at x={}, y={}, w={}, h={}",
                scaled.label,
                scaled.confidence,
                scaled.x,
                scaled.y,
                scaled.width,
                scaled.height
            );
        }

        Ok(self.pipeline.reduce(&detections))
    }
}

pub fn start_app(config: Config, photo: &Path) -> Result<Prediction> {
    let model = OrtModelHandle::from_config(&config.model)?;
    let labels = LabelSet::from_config(&config.labels)?;
    let ctx = InferenceContext::new(model, labels, config.model.num_classes);

    let app = App::new(ctx, Pipeline::from_config(&config));
    let prediction = app.process_photo(photo)?;

    tracing::info!("Announcing: {}", prediction.announcement());
    Ok(prediction)
}
