use crate::error::{DetectError, Result};
use image::{imageops::FilterType, DynamicImage, GenericImageView};
use ndarray::{Array, Ix4};

pub type InputTensor = Array<f32, Ix4>;

/// Writes an RGB image into a (1, 3, height, width) tensor scaled to [0, 1].
#[derive(Debug, Clone, Copy)]
pub struct TensorEncoder {
    width: u32,
    height: u32,
}

impl TensorEncoder {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Does not resize: the image must already match the input dimensions.
    pub fn encode(&self, img: &DynamicImage) -> Result<InputTensor> {
        let (img_width, img_height) = img.dimensions();
        if (img_width, img_height) != (self.width, self.height) {
            return Err(DetectError::ShapeMismatch {
                expected_width: self.width,
                expected_height: self.height,
                width: img_width,
                height: img_height,
            });
        }

        let mut input = Array::zeros((1, 3, self.height as usize, self.width as usize));
        for pixel in img.pixels() {
            let x = pixel.0 as usize;
            let y = pixel.1 as usize;
            let [r, g, b, _] = pixel.2 .0;
            input[[0, 0, y, x]] = (r as f32) / 255.;
            input[[0, 1, y, x]] = (g as f32) / 255.;
            input[[0, 2, y, x]] = (b as f32) / 255.;
        }

        Ok(input)
    }
}

/// Stretches a photo to the model input size.
pub fn fit_to_input(img: &DynamicImage, encoder: &TensorEncoder) -> DynamicImage {
    let (width, height) = encoder.dimensions();
    if img.dimensions() == (width, height) {
        return img.clone();
    }
    img.resize_exact(width, height, FilterType::CatmullRom)
}
