use std::sync::Arc;

use image::GenericImageView;
use ndarray::{Array1, Array3};
use shared::Verdict;

use super::config::PipelineConfig;
use super::model::{InferenceError, ModelLoadError, Scorer, TorchModel};
use super::preprocess::{DecodeError, Preprocessor};

/// A pipeline stage failed. Decode failures reject the upload; inference
/// failures abort the run before anything downstream executes. The stage name
/// is carried so the caller can report where the run died.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("image decode failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("{stage} inference failed: {source}")]
    Inference {
        stage: &'static str,
        source: InferenceError,
    },
}

/// Outcome of one full pipeline run.
#[derive(Debug, Clone)]
pub struct Screening {
    pub branch_a_scores: Vec<f32>,
    pub branch_b_scores: Vec<f32>,
    pub probability: f32,
    pub verdict: Verdict,
    pub image_width: u32,
    pub image_height: u32,
}

/// The process-wide inference context: one preprocessor and three read-only
/// models, constructed once at startup and shared for the process lifetime.
/// Nothing in here is mutated per request.
pub struct EnsemblePipeline {
    preprocessor: Preprocessor,
    branch_a: Arc<dyn Scorer>,
    branch_b: Arc<dyn Scorer>,
    fusion: Arc<dyn Scorer>,
    default_threshold: f32,
}

impl EnsemblePipeline {
    /// Loads all three models from their configured candidate paths. Any
    /// failure here is fatal to the service.
    pub fn load(config: &PipelineConfig) -> Result<Self, ModelLoadError> {
        let branch_a = TorchModel::load(&config.models.branch_a.candidates)?;
        let branch_b = TorchModel::load(&config.models.branch_b.candidates)?;
        let fusion = TorchModel::load(&config.models.fusion.candidates)?;
        Ok(Self::from_parts(
            Preprocessor::new(config.image.size, config.image.mask_radius_ratio),
            Arc::new(branch_a),
            Arc::new(branch_b),
            Arc::new(fusion),
            config.decision.default_threshold,
        ))
    }

    /// Assembles a pipeline from already-built parts. Tests use this to
    /// substitute stub scorers for the torch modules.
    pub fn from_parts(
        preprocessor: Preprocessor,
        branch_a: Arc<dyn Scorer>,
        branch_b: Arc<dyn Scorer>,
        fusion: Arc<dyn Scorer>,
        default_threshold: f32,
    ) -> Self {
        Self {
            preprocessor,
            branch_a,
            branch_b,
            fusion,
            default_threshold,
        }
    }

    pub fn default_threshold(&self) -> f32 {
        self.default_threshold
    }

    /// Runs the full image-to-verdict pipeline: normalize, score both
    /// branches on the identical tensor, fuse the concatenated scores, and
    /// threshold the fused probability.
    pub fn classify(&self, bytes: &[u8], threshold: f32) -> Result<Screening, PipelineError> {
        let (tensor, decoded) = self.preprocessor.normalize(bytes)?;

        let (branch_a_scores, branch_b_scores) = self.score_both(&tensor)?;
        let probability = self.fuse(&branch_a_scores, &branch_b_scores)?;
        let verdict = Verdict::from_probability(probability, threshold);

        Ok(Screening {
            branch_a_scores,
            branch_b_scores,
            probability,
            verdict,
            image_width: decoded.width(),
            image_height: decoded.height(),
        })
    }

    /// Both branches consume the same tensor; neither depends on the other.
    fn score_both(&self, tensor: &Array3<f32>) -> Result<(Vec<f32>, Vec<f32>), PipelineError> {
        let scores_a = self
            .branch_a
            .score(tensor.view().into_dyn())
            .map_err(|source| PipelineError::Inference {
                stage: "branch_a",
                source,
            })?;
        let scores_b = self
            .branch_b
            .score(tensor.view().into_dyn())
            .map_err(|source| PipelineError::Inference {
                stage: "branch_b",
                source,
            })?;
        Ok((scores_a, scores_b))
    }

    /// Concatenates branch A scores followed by branch B scores and feeds the
    /// fusion model. The fused output must be a non-empty vector whose first
    /// element lies in [0, 1]; anything else is treated as a misconfigured
    /// model.
    fn fuse(&self, scores_a: &[f32], scores_b: &[f32]) -> Result<f32, PipelineError> {
        let inference = |source| PipelineError::Inference {
            stage: "fusion",
            source,
        };

        if scores_a.is_empty() || scores_b.is_empty() {
            return Err(inference(InferenceError::EmptyOutput));
        }

        let mut features = Vec::with_capacity(scores_a.len() + scores_b.len());
        features.extend_from_slice(scores_a);
        features.extend_from_slice(scores_b);
        let features = Array1::from_vec(features);

        let fused = self
            .fusion
            .score(features.view().into_dyn())
            .map_err(inference)?;

        let probability = *fused.first().ok_or(inference(InferenceError::EmptyOutput))?;
        if !(0.0..=1.0).contains(&probability) {
            return Err(inference(InferenceError::ProbabilityOutOfRange(
                probability,
            )));
        }
        Ok(probability)
    }
}
