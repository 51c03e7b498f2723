use crate::{encoder::InputTensor, error::Result};
use ndarray::ArrayD;
use std::collections::HashMap;

/// A loaded inference graph. Implementations serialize concurrent `run` calls.
pub trait ModelHandle: Send + Sync + 'static {
    fn run(&self, input: &InputTensor) -> Result<HashMap<String, ArrayD<f32>>>;
}
