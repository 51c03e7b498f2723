mod app;
mod capture;
mod model_service;
mod ort_service;

pub mod config;
pub mod decoder;
pub mod detection;
pub mod encoder;
pub mod error;
pub mod labels;
pub mod pipeline;
pub mod post_filter;

pub use app::{start_app, App};
pub use capture::load_image;
pub use detection::{Detection, Prediction};
pub use error::{DetectError, Result};
pub use model_service::ModelHandle;
pub use ort_service::OrtModelHandle;
pub use pipeline::{InferenceContext, Pipeline, ReductionPolicy};
