use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::model::resolve_candidates;

#[derive(Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub version: f32,
    pub models: ModelsConfig,
    pub image: ImageConfig,
    pub decision: DecisionConfig,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelsConfig {
    pub branch_a: ModelSpec,
    pub branch_b: ModelSpec,
    pub fusion: ModelSpec,
}

/// Candidate model files in priority order; the first one that loads wins.
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelSpec {
    pub candidates: Vec<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImageConfig {
    pub size: u32,
    pub mask_radius_ratio: f32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DecisionConfig {
    pub default_threshold: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            version: 1.0,
            models: ModelsConfig {
                branch_a: ModelSpec {
                    candidates: vec![
                        PathBuf::from("models/base_model_1.pt"),
                        PathBuf::from("models/legacy/base_model_1.pt"),
                    ],
                },
                branch_b: ModelSpec {
                    candidates: vec![
                        PathBuf::from("models/base_model_2.pt"),
                        PathBuf::from("models/legacy/base_model_2.pt"),
                    ],
                },
                fusion: ModelSpec {
                    candidates: vec![PathBuf::from("models/meta_model.pt")],
                },
            },
            image: ImageConfig {
                size: 224,
                mask_radius_ratio: 0.8,
            },
            decision: DecisionConfig {
                default_threshold: 0.40,
            },
        }
    }
}

impl PipelineConfig {
    /// Reads the pipeline configuration from `$PIPELINE_CONFIG`, falling back
    /// to `config/models.yaml` next to the workspace. Relative model paths
    /// are resolved against the config file's directory.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = match std::env::var("PIPELINE_CONFIG") {
            Ok(path) => PathBuf::from(path),
            Err(_) => {
                let manifest_dir = std::env::var("CARGO_MANIFEST_DIR")
                    .map_err(|_| "Failed to get manifest directory")?;
                PathBuf::from(format!("{}/../config/models.yaml", manifest_dir))
            }
        };
        let config_str = std::fs::read_to_string(&config_path)?;
        let mut config: PipelineConfig = serde_yaml::from_str(&config_str)?;
        if let Some(base) = config_path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        for spec in [
            &mut self.models.branch_a,
            &mut self.models.branch_b,
            &mut self.models.fusion,
        ] {
            spec.candidates = resolve_candidates(base, &spec.candidates);
        }
    }
}
