use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{EyeSide, Gender, PatientInfo, Verdict};

/// One row of the screening dashboard. Field names mirror the CSV header so
/// rows round-trip through the serde reader unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRecord {
    #[serde(rename = "Timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "Patient Name")]
    pub patient_name: String,
    #[serde(rename = "Age")]
    pub age: u32,
    #[serde(rename = "Gender")]
    pub gender: Gender,
    #[serde(rename = "Eye Side")]
    pub eye_side: EyeSide,
    #[serde(rename = "Meta Probability")]
    pub probability: f32,
    #[serde(rename = "Final Class")]
    pub verdict: Verdict,
    #[serde(rename = "Image Hash")]
    pub image_hash: String,
}

impl ReportRecord {
    pub fn new(
        patient: &PatientInfo,
        probability: f32,
        verdict: Verdict,
        image_hash: String,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            patient_name: patient.name.clone(),
            age: patient.age,
            gender: patient.gender,
            eye_side: patient.eye_side,
            probability: round4(probability),
            verdict,
            image_hash,
        }
    }
}

/// Rounds to four decimals for display and persistence.
fn round4(value: f32) -> f32 {
    (value * 10_000.0).round() / 10_000.0
}

/// Dashboard filters; every field is optional and absent fields match all
/// rows.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ReportFilter {
    pub patient: Option<String>,
    pub verdict: Option<Verdict>,
    pub gender: Option<Gender>,
    pub eye_side: Option<EyeSide>,
}

impl ReportFilter {
    pub fn matches(&self, record: &ReportRecord) -> bool {
        if let Some(fragment) = &self.patient {
            if !record
                .patient_name
                .to_lowercase()
                .contains(&fragment.to_lowercase())
            {
                return false;
            }
        }
        if let Some(verdict) = self.verdict {
            if record.verdict != verdict {
                return false;
            }
        }
        if let Some(gender) = self.gender {
            if record.gender != gender {
                return false;
            }
        }
        if let Some(eye_side) = self.eye_side {
            if record.eye_side != eye_side {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, verdict: Verdict) -> ReportRecord {
        ReportRecord::new(
            &PatientInfo {
                name: name.to_string(),
                age: 52,
                gender: Gender::Female,
                eye_side: EyeSide::Right,
            },
            0.73456,
            verdict,
            "abc123".to_string(),
        )
    }

    #[test]
    fn probability_is_rounded_to_four_decimals() {
        let rec = record("A", Verdict::Cataract);
        assert!((rec.probability - 0.7346).abs() < 1e-6);
    }

    #[test]
    fn name_filter_is_case_insensitive_substring() {
        let rec = record("Jane Doe", Verdict::Normal);
        let filter = ReportFilter {
            patient: Some("jane".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&rec));
        let filter = ReportFilter {
            patient: Some("smith".to_string()),
            ..Default::default()
        };
        assert!(!filter.matches(&rec));
    }

    #[test]
    fn verdict_and_demographic_filters_are_exact() {
        let rec = record("Jane", Verdict::Cataract);
        let filter = ReportFilter {
            verdict: Some(Verdict::Normal),
            ..Default::default()
        };
        assert!(!filter.matches(&rec));
        let filter = ReportFilter {
            gender: Some(Gender::Female),
            eye_side: Some(EyeSide::Right),
            ..Default::default()
        };
        assert!(filter.matches(&rec));
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(ReportFilter::default().matches(&record("X", Verdict::Normal)));
    }
}
