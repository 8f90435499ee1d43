use chrono::NaiveDateTime;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use super::domain::{
    Dataset, Kpi, KpiId, Measurement, MeasurementId, MeasurementInput, Period, Role, RoleId,
};
use super::error::{EntityRef, TrackerError};

/// Read access to measurements keyed by KPI and calendar month.
///
/// The scoring functions are written against this trait so they can run over
/// the live store or any other source of measurements.
pub trait MeasurementLookup {
    fn measurement_for(&self, kpi_id: KpiId, period: Period) -> Option<&Measurement>;
}

/// Result of an upsert: the stored record and whether it was newly created.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertOutcome {
    pub measurement: Measurement,
    pub created: bool,
}

/// Optional filters for listing measurements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeasurementFilter {
    pub kpi_id: Option<KpiId>,
    pub year: Option<i32>,
    pub month: Option<u32>,
}

impl MeasurementFilter {
    fn matches(&self, measurement: &Measurement) -> bool {
        self.kpi_id.map_or(true, |id| measurement.kpi_id == id)
            && self.year.map_or(true, |year| measurement.period.year() == year)
            && self
                .month
                .map_or(true, |month| measurement.period.month() == month)
    }
}

/// Owns the role, KPI, and measurement collections.
///
/// Collections keep their insertion order. Measurements are additionally
/// indexed by `(KPI, month)` which is the identity used for upserts.
/// This type is not synchronized; [`super::tracker::KpiTracker`] wraps it in
/// a lock for shared use.
#[derive(Debug, Default)]
pub struct MeasurementStore {
    roles: Vec<Role>,
    kpis: Vec<Kpi>,
    measurements: Vec<Measurement>,
    by_period: HashMap<(KpiId, Period), usize>,
}

impl MeasurementStore {
    /// Build a store from a dataset after checking its referential integrity.
    pub fn from_dataset(dataset: Dataset) -> Result<Self, TrackerError> {
        let by_period = validate_dataset(&dataset)?;
        let Dataset {
            roles,
            kpis,
            measurements,
        } = dataset;

        Ok(Self {
            roles,
            kpis,
            measurements,
            by_period,
        })
    }

    pub fn list_roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn find_role(&self, id: RoleId) -> Option<&Role> {
        self.roles.iter().find(|role| role.id == id)
    }

    pub fn list_kpis(&self) -> &[Kpi] {
        &self.kpis
    }

    pub fn find_kpi(&self, id: KpiId) -> Option<&Kpi> {
        self.kpis.iter().find(|kpi| kpi.id == id)
    }

    pub fn kpis_for_role(&self, role_id: RoleId) -> Vec<Kpi> {
        self.kpis
            .iter()
            .filter(|kpi| kpi.role_id == role_id)
            .cloned()
            .collect()
    }

    pub fn find_measurement(&self, kpi_id: KpiId, period: Period) -> Option<&Measurement> {
        self.by_period
            .get(&(kpi_id, period))
            .and_then(|&index| self.measurements.get(index))
    }

    pub fn find_measurement_by_id(&self, id: MeasurementId) -> Option<&Measurement> {
        self.measurements.iter().find(|m| m.id == id)
    }

    pub fn measurements(&self, filter: MeasurementFilter) -> Vec<Measurement> {
        self.measurements
            .iter()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect()
    }

    pub fn measurement_count(&self) -> usize {
        self.measurements.len()
    }

    /// Insert or update the measurement for `(input.kpi_id, input.period)`.
    ///
    /// Updates only touch value, unit, and notes. New records get
    /// `max(existing ids) + 1` and `created_at = now`.
    pub fn upsert_measurement(
        &mut self,
        input: MeasurementInput,
        now: NaiveDateTime,
    ) -> Result<UpsertOutcome, TrackerError> {
        if self.find_kpi(input.kpi_id).is_none() {
            return Err(TrackerError::InvalidReference(EntityRef::Kpi(input.kpi_id)));
        }

        let key = (input.kpi_id, input.period);
        if let Some(&index) = self.by_period.get(&key) {
            let existing = &mut self.measurements[index];
            existing.metric_value = input.metric_value;
            existing.unit = input.unit;
            existing.notes = input.notes;
            debug!(
                measurement_id = %existing.id,
                kpi_id = %input.kpi_id,
                period = %input.period,
                "measurement updated"
            );
            return Ok(UpsertOutcome {
                measurement: existing.clone(),
                created: false,
            });
        }

        let measurement = Measurement {
            id: self.next_measurement_id(),
            kpi_id: input.kpi_id,
            metric_value: input.metric_value,
            unit: input.unit,
            period: input.period,
            notes: input.notes,
            created_at: now,
        };
        debug!(
            measurement_id = %measurement.id,
            kpi_id = %measurement.kpi_id,
            period = %measurement.period,
            "measurement created"
        );

        self.by_period.insert(key, self.measurements.len());
        self.measurements.push(measurement.clone());
        Ok(UpsertOutcome {
            measurement,
            created: true,
        })
    }

    /// Update value and notes of a measurement addressed by its ID.
    pub fn update_measurement(
        &mut self,
        id: MeasurementId,
        metric_value: f64,
        notes: String,
    ) -> Result<Measurement, TrackerError> {
        let measurement = self
            .measurements
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(TrackerError::NotFound(EntityRef::Measurement(id)))?;
        measurement.metric_value = metric_value;
        measurement.notes = notes;
        Ok(measurement.clone())
    }

    /// Swap in a new dataset; the current one is kept if validation fails.
    pub fn replace_all(&mut self, dataset: Dataset) -> Result<(), TrackerError> {
        *self = Self::from_dataset(dataset)?;
        Ok(())
    }

    pub fn snapshot(&self) -> Dataset {
        Dataset {
            roles: self.roles.clone(),
            kpis: self.kpis.clone(),
            measurements: self.measurements.clone(),
        }
    }

    fn next_measurement_id(&self) -> MeasurementId {
        let max = self.measurements.iter().map(|m| m.id.0).max().unwrap_or(0);
        MeasurementId(max + 1)
    }
}

impl MeasurementLookup for MeasurementStore {
    fn measurement_for(&self, kpi_id: KpiId, period: Period) -> Option<&Measurement> {
        self.find_measurement(kpi_id, period)
    }
}

fn validate_dataset(dataset: &Dataset) -> Result<HashMap<(KpiId, Period), usize>, TrackerError> {
    let mut role_ids = HashSet::new();
    for role in &dataset.roles {
        if !role_ids.insert(role.id) {
            return Err(TrackerError::DuplicateId {
                kind: "role",
                id: role.id.0,
            });
        }
    }

    let mut kpi_ids = HashSet::new();
    for kpi in &dataset.kpis {
        if !role_ids.contains(&kpi.role_id) {
            return Err(TrackerError::InvalidReference(EntityRef::Role(kpi.role_id)));
        }
        if !kpi_ids.insert(kpi.id) {
            return Err(TrackerError::DuplicateId {
                kind: "KPI",
                id: kpi.id.0,
            });
        }
    }

    let mut measurement_ids = HashSet::new();
    let mut by_period = HashMap::with_capacity(dataset.measurements.len());
    for (index, measurement) in dataset.measurements.iter().enumerate() {
        if !kpi_ids.contains(&measurement.kpi_id) {
            return Err(TrackerError::InvalidReference(EntityRef::Kpi(
                measurement.kpi_id,
            )));
        }
        if !measurement_ids.insert(measurement.id) {
            return Err(TrackerError::DuplicateId {
                kind: "measurement",
                id: measurement.id.0,
            });
        }
        if by_period
            .insert((measurement.kpi_id, measurement.period), index)
            .is_some()
        {
            return Err(TrackerError::DuplicateMeasurement {
                kpi_id: measurement.kpi_id,
                period: measurement.period,
            });
        }
    }

    Ok(by_period)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kpi::domain::{ComparisonOperator, KpiCategory};
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 1)
            .and_then(|date| date.and_hms_opt(9, 30, 0))
            .expect("valid timestamp")
    }

    fn period(year: i32, month: u32) -> Period {
        Period::new(year, month).expect("valid period")
    }

    fn dataset() -> Dataset {
        Dataset {
            roles: vec![Role {
                id: RoleId(1),
                name: "Support Agent".to_string(),
                description: String::new(),
            }],
            kpis: vec![Kpi {
                id: KpiId(1),
                role_id: RoleId(1),
                category: KpiCategory::Quantitative,
                name: "Resolution time".to_string(),
                description: String::new(),
                metric: "Average days to resolve".to_string(),
                unit: "days".to_string(),
                target: "≤ 3 days".to_string(),
                target_value: 3.0,
                operator: ComparisonOperator::LessOrEqual,
                weight: 70.0,
            }],
            measurements: Vec::new(),
        }
    }

    fn input(value: f64, period: Period, notes: &str) -> MeasurementInput {
        MeasurementInput {
            kpi_id: KpiId(1),
            metric_value: value,
            unit: "days".to_string(),
            period,
            notes: notes.to_string(),
        }
    }

    #[test]
    fn upsert_twice_for_same_month_updates_in_place() {
        let mut store = MeasurementStore::from_dataset(dataset()).expect("valid dataset");
        let first = store
            .upsert_measurement(input(2.0, period(2025, 2), ""), now())
            .expect("created");
        assert!(first.created);
        assert_eq!(first.measurement.id, MeasurementId(1));

        let later = now() + chrono::Duration::hours(5);
        let second = store
            .upsert_measurement(input(6.0, period(2025, 2), "late"), later)
            .expect("updated");
        assert!(!second.created);
        assert_eq!(second.measurement.id, MeasurementId(1));
        assert_eq!(second.measurement.metric_value, 6.0);
        assert_eq!(second.measurement.notes, "late");
        assert_eq!(second.measurement.created_at, now());
        assert_eq!(store.measurement_count(), 1);
    }

    #[test]
    fn upsert_rejects_unknown_kpi() {
        let mut store = MeasurementStore::from_dataset(dataset()).expect("valid dataset");
        let mut orphan = input(1.0, period(2025, 1), "");
        orphan.kpi_id = KpiId(42);
        assert_eq!(
            store.upsert_measurement(orphan, now()),
            Err(TrackerError::InvalidReference(EntityRef::Kpi(KpiId(42))))
        );
        assert_eq!(store.measurement_count(), 0);
    }

    #[test]
    fn new_ids_continue_from_highest_existing() {
        let mut seeded = dataset();
        seeded.measurements.push(Measurement {
            id: MeasurementId(7),
            kpi_id: KpiId(1),
            metric_value: 1.0,
            unit: "days".to_string(),
            period: period(2024, 12),
            notes: String::new(),
            created_at: now(),
        });
        let mut store = MeasurementStore::from_dataset(seeded).expect("valid dataset");
        let outcome = store
            .upsert_measurement(input(2.0, period(2025, 1), ""), now())
            .expect("created");
        assert_eq!(outcome.measurement.id, MeasurementId(8));
    }

    #[test]
    fn replace_all_keeps_previous_dataset_on_invalid_input() {
        let mut store = MeasurementStore::from_dataset(dataset()).expect("valid dataset");
        store
            .upsert_measurement(input(2.0, period(2025, 2), ""), now())
            .expect("created");

        let mut broken = dataset();
        broken.kpis[0].role_id = RoleId(9);
        assert_eq!(
            store.replace_all(broken),
            Err(TrackerError::InvalidReference(EntityRef::Role(RoleId(9))))
        );
        assert_eq!(store.measurement_count(), 1);
        assert!(store.find_measurement(KpiId(1), period(2025, 2)).is_some());
    }

    #[test]
    fn duplicate_months_are_rejected_on_load() {
        let mut duplicated = dataset();
        for id in [1, 2] {
            duplicated.measurements.push(Measurement {
                id: MeasurementId(id),
                kpi_id: KpiId(1),
                metric_value: 1.0,
                unit: "days".to_string(),
                period: period(2025, 4),
                notes: String::new(),
                created_at: now(),
            });
        }
        assert!(matches!(
            MeasurementStore::from_dataset(duplicated),
            Err(TrackerError::DuplicateMeasurement { .. })
        ));
    }

    #[test]
    fn filters_by_year_month_and_kpi() {
        let mut store = MeasurementStore::from_dataset(dataset()).expect("valid dataset");
        for (year, month) in [(2024, 12), (2025, 1), (2025, 2)] {
            store
                .upsert_measurement(input(1.0, period(year, month), ""), now())
                .expect("created");
        }

        let in_2025 = store.measurements(MeasurementFilter {
            year: Some(2025),
            ..MeasurementFilter::default()
        });
        assert_eq!(in_2025.len(), 2);

        let february = store.measurements(MeasurementFilter {
            kpi_id: Some(KpiId(1)),
            year: Some(2025),
            month: Some(2),
        });
        assert_eq!(february.len(), 1);
        assert_eq!(february[0].period, period(2025, 2));
    }

    #[test]
    fn update_by_id_reports_missing_measurement() {
        let mut store = MeasurementStore::from_dataset(dataset()).expect("valid dataset");
        assert_eq!(
            store.update_measurement(MeasurementId(3), 1.0, String::new()),
            Err(TrackerError::NotFound(EntityRef::Measurement(
                MeasurementId(3)
            )))
        );
    }
}
