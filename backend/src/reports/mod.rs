pub mod assembler;
pub mod models;
pub mod store;

pub use models::{ReportFilter, ReportRecord};
pub use store::{ReportStore, ReportStoreError};
