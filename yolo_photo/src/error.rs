use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to load model: {0}")]
    ModelLoad(String),
    #[error("Image is {width}x{height}, model expects {expected_width}x{expected_height}")]
    ShapeMismatch {
        expected_width: u32,
        expected_height: u32,
        width: u32,
        height: u32,
    },
    #[error("Inference failed: {0}")]
    Inference(String),
    #[error("Class index {index} out of range for {len} labels")]
    LabelIndexOutOfRange { index: usize, len: usize },
    #[error("Error decoding image: {0}")]
    ImageDecode(#[from] image::ImageError),
}

impl DetectError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DetectError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, DetectError>;
