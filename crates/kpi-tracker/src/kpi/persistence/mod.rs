//! Durable storage for the dataset: the CSV workbook, the settings file, and
//! the built-in seed data used when no workbook exists yet.

mod seed;
mod settings;
mod workbook;

pub use seed::seed_dataset;
pub use settings::{Settings, Storage, SETTINGS_FILE};
pub use workbook::{CsvWorkbook, BACKUP_DIR, WORKBOOK_DIR};

use super::domain::Dataset;
use super::error::TrackerError;

/// Storage abstraction so the tracker can be saved and reloaded without
/// knowing the on-disk format.
pub trait DatasetRepository: Send + Sync {
    fn load(&self) -> Result<Dataset, PersistenceError>;
    fn save(&self, dataset: &Dataset) -> Result<(), PersistenceError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("storage io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("workbook sheet unreadable: {0}")]
    Csv(#[from] csv::Error),
    #[error("settings file invalid: {0}")]
    Json(#[from] serde_json::Error),
    #[error("workbook not found at {0}")]
    Missing(String),
    #[error("database path must not be empty")]
    EmptyPath,
    #[error(transparent)]
    Tracker(#[from] TrackerError),
}
