use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{info, warn};

use super::{CsvWorkbook, PersistenceError};
use crate::kpi::error::TrackerError;

pub const SETTINGS_FILE: &str = "settings.json";
const REPORTS_DIR: &str = "reports";

/// User-editable settings persisted next to the data directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub database_path: PathBuf,
}

/// Settings file plus the workbook location it points at.
#[derive(Debug)]
pub struct Storage {
    settings_path: PathBuf,
    settings: RwLock<Settings>,
}

impl Storage {
    /// Read `<data_dir>/settings.json`, writing defaults when it is missing.
    ///
    /// A malformed settings file is logged and replaced by defaults in memory.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir)?;
        let settings_path = data_dir.join(SETTINGS_FILE);
        let defaults = Settings {
            database_path: data_dir.to_path_buf(),
        };

        let settings = match fs::read_to_string(&settings_path) {
            Ok(raw) => match serde_json::from_str::<Settings>(&raw) {
                Ok(settings) => settings,
                Err(err) => {
                    warn!(path = %settings_path.display(), error = %err, "settings file unreadable, using defaults");
                    defaults
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                write_settings(&settings_path, &defaults)?;
                defaults
            }
            Err(err) => return Err(err.into()),
        };

        Ok(Self {
            settings_path,
            settings: RwLock::new(settings),
        })
    }

    pub fn settings(&self) -> Result<Settings, PersistenceError> {
        let guard = self
            .settings
            .read()
            .map_err(|_| TrackerError::LockPoisoned)?;
        Ok(guard.clone())
    }

    pub fn workbook(&self) -> Result<CsvWorkbook, PersistenceError> {
        Ok(CsvWorkbook::new(self.settings()?.database_path))
    }

    /// Directory rendered reports are written to.
    pub fn reports_dir(&self) -> Result<PathBuf, PersistenceError> {
        Ok(self.settings()?.database_path.join(REPORTS_DIR))
    }

    /// Point the workbook at `path`, carrying the current sheets over when
    /// the new location has none yet.
    pub fn update_database_path(&self, path: &str) -> Result<Settings, PersistenceError> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return Err(PersistenceError::EmptyPath);
        }
        let target = PathBuf::from(trimmed);
        fs::create_dir_all(&target)?;

        let mut guard = self
            .settings
            .write()
            .map_err(|_| TrackerError::LockPoisoned)?;
        let current = CsvWorkbook::new(guard.database_path.clone());
        let next = CsvWorkbook::new(target.clone());
        if current.exists() && !next.exists() {
            current.copy_to(&next)?;
            info!(
                from = %current.workbook_path().display(),
                to = %next.workbook_path().display(),
                "workbook copied to new database path"
            );
        }

        let updated = Settings {
            database_path: target,
        };
        write_settings(&self.settings_path, &updated)?;
        *guard = updated.clone();
        Ok(updated)
    }
}

fn write_settings(path: &Path, settings: &Settings) -> Result<(), PersistenceError> {
    let body = serde_json::to_string_pretty(settings)?;
    fs::write(path, body)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kpi::persistence::{seed_dataset, DatasetRepository};

    #[test]
    fn open_writes_default_settings() {
        let dir = tempfile::tempdir().expect("temp dir");
        let storage = Storage::open(dir.path()).expect("storage opens");

        let settings = storage.settings().expect("settings readable");
        assert_eq!(settings.database_path, dir.path());
        let raw = fs::read_to_string(dir.path().join(SETTINGS_FILE)).expect("file written");
        assert!(raw.contains("database_path"));
    }

    #[test]
    fn malformed_settings_fall_back_to_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        fs::write(dir.path().join(SETTINGS_FILE), "{ not json").expect("file written");

        let storage = Storage::open(dir.path()).expect("storage opens");
        assert_eq!(
            storage.settings().expect("settings readable").database_path,
            dir.path()
        );
    }

    #[test]
    fn update_database_path_copies_workbook() {
        let dir = tempfile::tempdir().expect("temp dir");
        let storage = Storage::open(dir.path()).expect("storage opens");
        storage
            .workbook()
            .expect("workbook")
            .save(&seed_dataset())
            .expect("seed saved");

        let target = dir.path().join("moved");
        let updated = storage
            .update_database_path(target.to_str().expect("utf-8 path"))
            .expect("path updated");

        assert_eq!(updated.database_path, target);
        let moved = storage.workbook().expect("workbook");
        assert!(moved.exists());
        assert_eq!(moved.load().expect("moved workbook loads"), seed_dataset());

        let reopened = Storage::open(dir.path()).expect("storage reopens");
        assert_eq!(reopened.settings().expect("settings"), updated);
    }

    #[test]
    fn update_database_path_rejects_empty_path() {
        let dir = tempfile::tempdir().expect("temp dir");
        let storage = Storage::open(dir.path()).expect("storage opens");
        assert!(matches!(
            storage.update_database_path("   "),
            Err(PersistenceError::EmptyPath)
        ));
    }
}
