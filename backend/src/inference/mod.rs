pub mod config;
pub mod model;
pub mod pipeline;
pub mod preprocess;

pub use config::PipelineConfig;
pub use model::{InferenceError, ModelLoadError, Scorer, TorchModel};
pub use pipeline::{EnsemblePipeline, PipelineError, Screening};
pub use preprocess::{DecodeError, Preprocessor};
