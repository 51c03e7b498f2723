use crate::error::{DetectError, Result};
use image::DynamicImage;
use std::path::Path;

/// Decodes a photo from disk, guessing the format from its contents.
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    let image_reader = image::ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| DetectError::io(path, e))?;

    Ok(image_reader.decode()?)
}
