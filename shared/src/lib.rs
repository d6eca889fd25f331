use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Binary screening outcome for a fundus image.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Display, EnumString)]
pub enum Verdict {
    Cataract,
    Normal,
}

impl Verdict {
    /// Thresholds a fused probability into a verdict. Strict inequality:
    /// a probability equal to the threshold is `Normal`.
    pub fn from_probability(probability: f32, threshold: f32) -> Self {
        if probability > threshold {
            Verdict::Cataract
        } else {
            Verdict::Normal
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Display, EnumString)]
pub enum Gender {
    Male,
    Female,
    Other,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Display, EnumString)]
pub enum EyeSide {
    Left,
    Right,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PatientInfo {
    pub name: String,
    pub age: u32,
    pub gender: Gender,
    pub eye_side: EyeSide,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ScreeningResponse {
    pub branch_a_scores: Vec<f32>,
    pub branch_b_scores: Vec<f32>,
    pub class_labels: Vec<String>,
    pub probability: f32,
    pub threshold: f32,
    pub verdict: Verdict,
}
