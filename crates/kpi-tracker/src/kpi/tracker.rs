use chrono::Local;
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;

use super::aggregate::{role_report, Report, ReportRange, RoleReport};
use super::dashboard::{self, MonthlyTrend, RoleOverview};
use super::domain::{
    Dataset, Kpi, KpiId, Measurement, MeasurementId, MeasurementInput, Period, Role, RoleId,
};
use super::error::{EntityRef, TrackerError};
use super::persistence::{DatasetRepository, PersistenceError};
use super::scoring;
use super::store::{MeasurementFilter, MeasurementStore, UpsertOutcome};

/// Thread-safe access point shared by the console and the HTTP handlers.
///
/// All reads take the shared lock and all mutations take the exclusive lock,
/// so every report is computed against one consistent dataset.
#[derive(Debug, Default)]
pub struct KpiTracker {
    store: RwLock<MeasurementStore>,
    /// Held for the duration of a save so only one writes the workbook at a time.
    saving: Mutex<()>,
}

/// Collection sizes after a load or save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct DatasetSummary {
    pub roles: usize,
    pub kpis: usize,
    pub measurements: usize,
}

impl DatasetSummary {
    fn of(dataset: &Dataset) -> Self {
        Self {
            roles: dataset.roles.len(),
            kpis: dataset.kpis.len(),
            measurements: dataset.measurements.len(),
        }
    }
}

impl KpiTracker {
    pub fn new(dataset: Dataset) -> Result<Self, TrackerError> {
        Ok(Self {
            store: RwLock::new(MeasurementStore::from_dataset(dataset)?),
            saving: Mutex::new(()),
        })
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MeasurementStore>, TrackerError> {
        self.store.read().map_err(|_| TrackerError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MeasurementStore>, TrackerError> {
        self.store.write().map_err(|_| TrackerError::LockPoisoned)
    }

    pub fn list_roles(&self) -> Result<Vec<Role>, TrackerError> {
        Ok(self.read()?.list_roles().to_vec())
    }

    pub fn find_role(&self, id: RoleId) -> Result<Role, TrackerError> {
        self.read()?
            .find_role(id)
            .cloned()
            .ok_or(TrackerError::NotFound(EntityRef::Role(id)))
    }

    pub fn list_kpis(&self) -> Result<Vec<Kpi>, TrackerError> {
        Ok(self.read()?.list_kpis().to_vec())
    }

    pub fn find_kpi(&self, id: KpiId) -> Result<Kpi, TrackerError> {
        self.read()?
            .find_kpi(id)
            .cloned()
            .ok_or(TrackerError::NotFound(EntityRef::Kpi(id)))
    }

    pub fn kpis_for_role(&self, role_id: RoleId) -> Result<Vec<Kpi>, TrackerError> {
        let store = self.read()?;
        if store.find_role(role_id).is_none() {
            return Err(TrackerError::NotFound(EntityRef::Role(role_id)));
        }
        Ok(store.kpis_for_role(role_id))
    }

    pub fn find_measurement(
        &self,
        kpi_id: KpiId,
        period: Period,
    ) -> Result<Option<Measurement>, TrackerError> {
        Ok(self.read()?.find_measurement(kpi_id, period).cloned())
    }

    pub fn measurements(&self, filter: MeasurementFilter) -> Result<Vec<Measurement>, TrackerError> {
        Ok(self.read()?.measurements(filter))
    }

    /// Insert or update the measurement for the input's KPI and month.
    pub fn upsert_measurement(&self, input: MeasurementInput) -> Result<UpsertOutcome, TrackerError> {
        let now = Local::now().naive_local();
        self.write()?.upsert_measurement(input, now)
    }

    /// Validated write path: applies the KPI's unit rules before upserting.
    pub fn record_measurement(&self, input: MeasurementInput) -> Result<UpsertOutcome, TrackerError> {
        let now = Local::now().naive_local();
        let mut store = self.write()?;
        let kpi = store
            .find_kpi(input.kpi_id)
            .ok_or(TrackerError::InvalidReference(EntityRef::Kpi(input.kpi_id)))?;
        kpi.validate_value(input.metric_value)?;
        store.upsert_measurement(input, now)
    }

    pub fn update_measurement(
        &self,
        id: MeasurementId,
        metric_value: f64,
        notes: String,
    ) -> Result<Measurement, TrackerError> {
        let mut store = self.write()?;
        let kpi_id = store
            .find_measurement_by_id(id)
            .map(|measurement| measurement.kpi_id)
            .ok_or(TrackerError::NotFound(EntityRef::Measurement(id)))?;
        if let Some(kpi) = store.find_kpi(kpi_id) {
            kpi.validate_value(metric_value)?;
        }
        store.update_measurement(id, metric_value, notes)
    }

    pub fn snapshot(&self) -> Result<Dataset, TrackerError> {
        Ok(self.read()?.snapshot())
    }

    /// Replace the whole dataset; rejected datasets leave the current one intact.
    pub fn replace_all(&self, dataset: Dataset) -> Result<DatasetSummary, TrackerError> {
        let summary = DatasetSummary::of(&dataset);
        let replacement = MeasurementStore::from_dataset(dataset)?;
        *self.write()? = replacement;
        info!(
            roles = summary.roles,
            kpis = summary.kpis,
            measurements = summary.measurements,
            "dataset replaced"
        );
        Ok(summary)
    }

    pub fn role_score(&self, role_id: RoleId, period: Period) -> Result<f64, TrackerError> {
        let store = self.read()?;
        if store.find_role(role_id).is_none() {
            return Err(TrackerError::NotFound(EntityRef::Role(role_id)));
        }
        let kpis = store.kpis_for_role(role_id);
        Ok(scoring::role_score(&kpis, period, &*store))
    }

    pub fn role_report(&self, role_id: RoleId, months: &[Period]) -> Result<RoleReport, TrackerError> {
        let store = self.read()?;
        let role = store
            .find_role(role_id)
            .ok_or(TrackerError::NotFound(EntityRef::Role(role_id)))?;
        let kpis = store.kpis_for_role(role_id);
        Ok(role_report(role, &kpis, months, &*store))
    }

    /// Build a report for `range`, for all roles or only those in `role_ids`.
    pub fn report(
        &self,
        range: ReportRange,
        role_ids: Option<&[RoleId]>,
    ) -> Result<Report, TrackerError> {
        let months = range.months()?;
        let store = self.read()?;

        if let Some(ids) = role_ids {
            if let Some(&missing) = ids.iter().find(|id| store.find_role(**id).is_none()) {
                return Err(TrackerError::NotFound(EntityRef::Role(missing)));
            }
        }

        let roles = store
            .list_roles()
            .iter()
            .filter(|role| role_ids.map_or(true, |ids| ids.contains(&role.id)))
            .map(|role| {
                let kpis = store.kpis_for_role(role.id);
                role_report(role, &kpis, &months, &*store)
            })
            .collect();

        Ok(Report {
            range,
            title: range.label(),
            months,
            generated_at: Local::now().naive_local(),
            roles,
        })
    }

    pub fn dashboard_overview(&self, period: Period) -> Result<Vec<RoleOverview>, TrackerError> {
        let store = self.read()?;
        let roles = roles_with_kpis(&store);
        Ok(dashboard::overview(&roles, period, &*store))
    }

    pub fn dashboard_trends(&self, year: i32) -> Result<Vec<MonthlyTrend>, TrackerError> {
        let store = self.read()?;
        let roles = roles_with_kpis(&store);
        dashboard::trends(&roles, year, &*store)
    }

    /// Write the dataset through `repository` while holding the shared lock,
    /// so no mutation can interleave with the save.
    ///
    /// Concurrent saves queue behind one another; readers are not blocked.
    pub fn save_to<R>(&self, repository: &R) -> Result<DatasetSummary, PersistenceError>
    where
        R: DatasetRepository + ?Sized,
    {
        let _saving = self.saving.lock().map_err(|_| TrackerError::LockPoisoned)?;
        let store = self.read()?;
        let dataset = store.snapshot();
        repository.save(&dataset)?;
        Ok(DatasetSummary::of(&dataset))
    }

    /// Load a dataset from `repository` and swap it in.
    ///
    /// Loading happens outside the lock; the swap itself is exclusive. A
    /// failed load or an invalid dataset leaves the current data untouched.
    pub fn reload_from<R>(&self, repository: &R) -> Result<DatasetSummary, PersistenceError>
    where
        R: DatasetRepository + ?Sized,
    {
        let dataset = repository.load()?;
        Ok(self.replace_all(dataset)?)
    }
}

fn roles_with_kpis(store: &MeasurementStore) -> Vec<(Role, Vec<Kpi>)> {
    store
        .list_roles()
        .iter()
        .map(|role| (role.clone(), store.kpis_for_role(role.id)))
        .collect()
}
