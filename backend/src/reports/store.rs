use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, info};
use tokio::sync::Mutex;

use super::models::{ReportFilter, ReportRecord};

pub const REPORT_HEADERS: [&str; 8] = [
    "Timestamp",
    "Patient Name",
    "Age",
    "Gender",
    "Eye Side",
    "Meta Probability",
    "Final Class",
    "Image Hash",
];

#[derive(Debug, thiserror::Error)]
pub enum ReportStoreError {
    #[error("report store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("report store CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Append-only CSV store backing the public dashboard. One row per completed
/// screening; rows are never rewritten.
#[derive(Clone)]
pub struct ReportStore {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl ReportStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Creates the CSV with its header row if it does not exist yet.
    pub fn init(&self) -> Result<(), ReportStoreError> {
        if self.path.exists() {
            return Ok(());
        }
        let mut writer = csv::Writer::from_path(&self.path)?;
        writer.write_record(REPORT_HEADERS)?;
        writer.flush()?;
        info!("created report store at {}", self.path.display());
        Ok(())
    }

    /// Appends one record, writing the header first when the file is new or
    /// empty.
    pub async fn append(&self, record: &ReportRecord) -> Result<(), ReportStoreError> {
        let _guard = self.lock.lock().await;

        let needs_header = match std::fs::metadata(&self.path) {
            Ok(meta) => meta.len() == 0,
            Err(_) => true,
        };
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(record)?;
        writer.flush()?;
        debug!(
            "appended report for {} ({})",
            record.patient_name, record.verdict
        );
        Ok(())
    }

    /// Loads every record matching `filter`, newest first.
    pub async fn load(&self, filter: &ReportFilter) -> Result<Vec<ReportRecord>, ReportStoreError> {
        let _guard = self.lock.lock().await;

        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut records = Vec::new();
        for row in reader.deserialize::<ReportRecord>() {
            let record = row?;
            if filter.matches(&record) {
                records.push(record);
            }
        }
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{EyeSide, Gender, PatientInfo, Verdict};
    use uuid::Uuid;

    fn temp_store() -> ReportStore {
        let path = std::env::temp_dir().join(format!("reports-{}.csv", Uuid::new_v4()));
        ReportStore::new(path)
    }

    fn patient(name: &str, gender: Gender, eye_side: EyeSide) -> PatientInfo {
        PatientInfo {
            name: name.to_string(),
            age: 61,
            gender,
            eye_side,
        }
    }

    #[actix_web::test]
    async fn append_then_load_round_trips() {
        let store = temp_store();
        store.init().unwrap();

        let record = ReportRecord::new(
            &patient("Jane Doe", Gender::Female, EyeSide::Left),
            0.95,
            Verdict::Cataract,
            "deadbeef".to_string(),
        );
        store.append(&record).await.unwrap();

        let loaded = store.load(&ReportFilter::default()).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].patient_name, "Jane Doe");
        assert_eq!(loaded[0].verdict, Verdict::Cataract);
        assert!((loaded[0].probability - 0.95).abs() < 1e-6);
        assert_eq!(loaded[0].image_hash, "deadbeef");

        std::fs::remove_file(store.path()).ok();
    }

    #[actix_web::test]
    async fn append_without_init_still_writes_header() {
        let store = temp_store();

        let record = ReportRecord::new(
            &patient("A", Gender::Male, EyeSide::Right),
            0.2,
            Verdict::Normal,
            "ff".to_string(),
        );
        store.append(&record).await.unwrap();

        let header = std::fs::read_to_string(store.path()).unwrap();
        assert!(header.starts_with("Timestamp,Patient Name,Age"));
        assert_eq!(store.load(&ReportFilter::default()).await.unwrap().len(), 1);

        std::fs::remove_file(store.path()).ok();
    }

    #[actix_web::test]
    async fn load_applies_dashboard_filters() {
        let store = temp_store();
        store.init().unwrap();

        let cataract = ReportRecord::new(
            &patient("Jane Doe", Gender::Female, EyeSide::Left),
            0.9,
            Verdict::Cataract,
            "a".to_string(),
        );
        let normal = ReportRecord::new(
            &patient("John Smith", Gender::Male, EyeSide::Right),
            0.1,
            Verdict::Normal,
            "b".to_string(),
        );
        store.append(&cataract).await.unwrap();
        store.append(&normal).await.unwrap();

        let filter = ReportFilter {
            verdict: Some(Verdict::Cataract),
            ..Default::default()
        };
        let loaded = store.load(&filter).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].patient_name, "Jane Doe");

        let filter = ReportFilter {
            patient: Some("smith".to_string()),
            ..Default::default()
        };
        let loaded = store.load(&filter).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].verdict, Verdict::Normal);

        std::fs::remove_file(store.path()).ok();
    }

    #[actix_web::test]
    async fn missing_file_loads_empty() {
        let store = temp_store();
        assert!(store.load(&ReportFilter::default()).await.unwrap().is_empty());
    }
}
