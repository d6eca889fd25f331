use super::models::ReportRecord;

/// Renders the downloadable plain-text diagnostic report for one screening.
pub fn render_report(record: &ReportRecord) -> String {
    format!(
        "Cataract Screening Report\n\
         -------------------------\n\
         Timestamp: {}\n\
         Patient Name: {}\n\
         Age: {}\n\
         Gender: {}\n\
         Eye Side: {}\n\
         Meta-Model Probability: {:.4}\n\
         Final Classification: {}\n",
        record.timestamp.format("%Y-%m-%d %H:%M:%S"),
        record.patient_name,
        record.age,
        record.gender,
        record.eye_side,
        record.probability,
        record.verdict,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{EyeSide, Gender, PatientInfo, Verdict};

    #[test]
    fn report_contains_patient_and_model_fields() {
        let record = ReportRecord::new(
            &PatientInfo {
                name: "Jane Doe".to_string(),
                age: 67,
                gender: Gender::Female,
                eye_side: EyeSide::Left,
            },
            0.9512,
            Verdict::Cataract,
            "hash".to_string(),
        );
        let text = render_report(&record);
        assert!(text.contains("Patient Name: Jane Doe"));
        assert!(text.contains("Age: 67"));
        assert!(text.contains("Gender: Female"));
        assert!(text.contains("Eye Side: Left"));
        assert!(text.contains("Meta-Model Probability: 0.9512"));
        assert!(text.contains("Final Classification: Cataract"));
    }
}
