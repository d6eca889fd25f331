use std::path::{Path, PathBuf};

use log::{info, warn};
use ndarray::ArrayViewD;
use tch::{CModule, Device, Kind, Tensor};

/// A required model could not be located or deserialized. Fatal: the service
/// must not start accepting requests without all three models.
#[derive(Debug, thiserror::Error)]
pub enum ModelLoadError {
    #[error("no model file found from candidates: {0:?}")]
    NoCandidate(Vec<PathBuf>),
    #[error("failed to load model from {path:?}: {source}")]
    Load {
        path: PathBuf,
        source: tch::TchError,
    },
}

/// A model invocation failed or produced output of unexpected shape/range.
/// Recoverable per request: the pipeline run is aborted, nothing is persisted.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("model error: {0}")]
    Model(#[from] tch::TchError),
    #[error("model returned an empty score vector")]
    EmptyOutput,
    #[error("fused probability {0} outside [0, 1]")]
    ProbabilityOutOfRange(f32),
}

/// Black-box scoring function: a read-only model mapping an input tensor to a
/// flat score vector. Image tensors go to the branch models, the concatenated
/// feature vector to the fusion model.
pub trait Scorer: Send + Sync {
    fn score(&self, input: ArrayViewD<'_, f32>) -> Result<Vec<f32>, InferenceError>;
}

/// TorchScript module held for the process lifetime. Loaded once, never
/// mutated after load, so it is shared without locking.
pub struct TorchModel {
    module: CModule,
    device: Device,
}

impl std::fmt::Debug for TorchModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TorchModel")
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

impl TorchModel {
    /// Tries `candidates` in priority order: missing paths are skipped, the
    /// first module that loads wins. If every existing candidate fails to
    /// parse, the last load error is propagated; if none existed at all the
    /// error lists the candidates that were tried.
    pub fn load(candidates: &[PathBuf]) -> Result<Self, ModelLoadError> {
        let device = Device::cuda_if_available();
        let mut last_error = None;

        for path in candidates {
            if !path.exists() {
                continue;
            }
            match CModule::load_on_device(path, device) {
                Ok(module) => {
                    info!("loaded model from {}", path.display());
                    return Ok(Self { module, device });
                }
                Err(source) => {
                    warn!("failed to load model candidate {}: {}", path.display(), source);
                    last_error = Some(ModelLoadError::Load {
                        path: path.clone(),
                        source,
                    });
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ModelLoadError::NoCandidate(candidates.to_vec())))
    }
}

impl Scorer for TorchModel {
    fn score(&self, input: ArrayViewD<'_, f32>) -> Result<Vec<f32>, InferenceError> {
        // Single-element batch: prepend a batch dimension of 1.
        let mut shape: Vec<i64> = Vec::with_capacity(input.ndim() + 1);
        shape.push(1);
        shape.extend(input.shape().iter().map(|&d| d as i64));

        let flat: Vec<f32> = input.iter().copied().collect();
        let tensor = Tensor::from_slice(&flat)
            .view(shape.as_slice())
            .to_device(self.device);

        let output = self.module.forward_ts(&[tensor])?;
        let output = output.to_kind(Kind::Float).view([-1]);
        let len = output.size()[0] as usize;
        if len == 0 {
            return Err(InferenceError::EmptyOutput);
        }
        let mut scores = vec![0.0f32; len];
        output.copy_data(&mut scores, len);
        Ok(scores)
    }
}

/// Resolves candidate paths relative to `base` unless already absolute.
pub fn resolve_candidates(base: &Path, candidates: &[PathBuf]) -> Vec<PathBuf> {
    candidates
        .iter()
        .map(|c| {
            if c.is_absolute() {
                c.clone()
            } else {
                base.join(c)
            }
        })
        .collect()
}
