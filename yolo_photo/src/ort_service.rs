use crate::{
    config::{ModelConfig, Validatable},
    encoder::InputTensor,
    error::{DetectError, Result},
    model_service::ModelHandle,
};
use ndarray::ArrayD;
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::{collections::HashMap, sync::Mutex};

fn build_session(model_bytes: &[u8], intra_threads: usize) -> ort::Result<Session> {
    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(intra_threads)?
        .commit_from_memory(model_bytes)?;
    Ok(session)
}

/// ONNX Runtime session behind a mutex; runs are serialized.
pub struct OrtModelHandle {
    session: Mutex<Session>,
    input_name: String,
    output_names: Vec<String>,
}

impl OrtModelHandle {
    pub fn from_config(model_config: &ModelConfig) -> Result<Self> {
        let path = model_config.get_path();
        let model_bytes = std::fs::read(&path).map_err(|e| DetectError::io(&path, e))?;
        tracing::info!("Read {} bytes of model from {:?}", model_bytes.len(), path);

        Self::load(
            &model_bytes,
            &model_config.input_name,
            &model_config.output_name,
            model_config.intra_threads,
        )
    }

    /// Fails with `ModelLoad` on bytes that are not a graph, or a graph that
    /// lacks the named input or output.
    pub fn load(
        model_bytes: &[u8],
        input_name: &str,
        output_name: &str,
        intra_threads: usize,
    ) -> Result<Self> {
        let session = build_session(model_bytes, intra_threads)
            .map_err(|e| DetectError::ModelLoad(e.to_string()))?;

        if !session.inputs.iter().any(|input| input.name == input_name) {
            return Err(DetectError::ModelLoad(format!(
                "model has no input named {:?}",
                input_name
            )));
        }

        let output_names: Vec<String> = session
            .outputs
            .iter()
            .map(|output| output.name.clone())
            .collect();
        if !output_names.iter().any(|name| name == output_name) {
            return Err(DetectError::ModelLoad(format!(
                "model has no output named {:?}, found {:?}",
                output_name, output_names
            )));
        }

        tracing::info!(
            "Created ONNX session with input {:?} and outputs {:?}",
            input_name,
            output_names
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name: input_name.to_string(),
            output_names,
        })
    }
}

impl ModelHandle for OrtModelHandle {
    fn run(&self, input: &InputTensor) -> Result<HashMap<String, ArrayD<f32>>> {
        let mut session = self
            .session
            .lock()
            .map_err(|e| DetectError::Inference(format!("session mutex poisoned: {}", e)))?;

        let owned_buffer;
        let input_view = if input.view().is_standard_layout() {
            input.view()
        } else {
            owned_buffer = input.as_standard_layout().into_owned();
            owned_buffer.view()
        };

        let tensor_ref = TensorRef::from_array_view(input_view)
            .map_err(|e| DetectError::Inference(format!("failed to build tensor: {}", e)))?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => tensor_ref])
            .map_err(|e| DetectError::Inference(e.to_string()))?;

        let mut tensors = HashMap::with_capacity(self.output_names.len());
        for name in &self.output_names {
            let (shape, data) = outputs[name.as_str()]
                .try_extract_tensor::<f32>()
                .map_err(|e| {
                    DetectError::Inference(format!("failed to extract {:?}: {}", name, e))
                })?;

            let array = ArrayD::from_shape_vec(shape.to_ixdyn(), data.to_vec())
                .map_err(|e| DetectError::Inference(format!("invalid tensor shape: {}", e)))?;
            tracing::debug!("Output {:?} has shape {:?}", name, array.shape());
            tensors.insert(name.clone(), array);
        }

        Ok(tensors)
    }
}
