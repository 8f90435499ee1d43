use kpi_tracker::error::AppError;
use kpi_tracker::kpi::domain::ensure_supported_year;
use kpi_tracker::kpi::{DatasetSummary, KpiTracker, Period, Settings, Storage};
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

/// Process-level state shared with the health endpoints.
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// The shared dataset and the storage it is persisted to.
#[derive(Clone)]
pub(crate) struct TrackerState {
    pub(crate) tracker: Arc<KpiTracker>,
    pub(crate) storage: Arc<Storage>,
}

impl TrackerState {
    /// Open the settings under `data_dir` and load (or seed) the workbook.
    pub(crate) fn open(data_dir: &Path) -> Result<Self, AppError> {
        let storage = Storage::open(data_dir)?;
        let workbook = storage.workbook()?;
        let dataset = workbook.load_or_seed()?;
        let tracker = KpiTracker::new(dataset)?;
        info!(
            data_dir = %data_dir.display(),
            database_path = %workbook.database_path().display(),
            "dataset ready"
        );
        Ok(Self {
            tracker: Arc::new(tracker),
            storage: Arc::new(storage),
        })
    }

    /// Write the dataset to the configured workbook.
    pub(crate) fn save(&self) -> Result<DatasetSummary, AppError> {
        let workbook = self.storage.workbook()?;
        Ok(self.tracker.save_to(&workbook)?)
    }

    /// Replace the dataset with the contents of the configured workbook.
    pub(crate) fn reload(&self) -> Result<DatasetSummary, AppError> {
        let workbook = self.storage.workbook()?;
        Ok(self.tracker.reload_from(&workbook)?)
    }

    /// Run `task` with a handle to this state on the blocking pool, keeping
    /// filesystem work off the async workers.
    pub(crate) async fn blocking<T, F>(&self, task: F) -> Result<T, AppError>
    where
        F: FnOnce(TrackerState) -> Result<T, AppError> + Send + 'static,
        T: Send + 'static,
    {
        let state = self.clone();
        tokio::task::spawn_blocking(move || task(state))
            .await
            .map_err(|err| AppError::Io(std::io::Error::other(err)))?
    }

    pub(crate) async fn save_in_background(&self) -> Result<DatasetSummary, AppError> {
        self.blocking(|state| state.save()).await
    }

    pub(crate) async fn reload_in_background(&self) -> Result<DatasetSummary, AppError> {
        self.blocking(|state| state.reload()).await
    }

    /// [`Storage::update_database_path`] on the blocking pool.
    pub(crate) async fn update_database_path(&self, path: String) -> Result<Settings, AppError> {
        self.blocking(move |state| Ok(state.storage.update_database_path(&path)?))
            .await
    }
}

pub(crate) fn parse_year(raw: &str) -> Result<i32, String> {
    let year = raw
        .trim()
        .parse::<i32>()
        .map_err(|_| format!("'{raw}' is not a year"))?;
    ensure_supported_year(year).map_err(|err| err.to_string())
}

/// Parse a `YYYY-MM` (or `YYYY-MM-DD`) period within the supported years.
pub(crate) fn parse_period(raw: &str) -> Result<Period, String> {
    let period = raw.parse::<Period>()?;
    ensure_supported_year(period.year()).map_err(|err| err.to_string())?;
    Ok(period)
}
