use std::fmt;

use super::domain::{KpiId, MeasurementId, Period, RoleId};

/// Identifies the record an error is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityRef {
    Role(RoleId),
    Kpi(KpiId),
    Measurement(MeasurementId),
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Role(id) => write!(f, "role {id}"),
            EntityRef::Kpi(id) => write!(f, "KPI {id}"),
            EntityRef::Measurement(id) => write!(f, "measurement {id}"),
        }
    }
}

/// Failures raised by the measurement store, scoring engine, and tracker facade.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrackerError {
    #[error("{0} not found")]
    NotFound(EntityRef),
    #[error("unknown {0} referenced")]
    InvalidReference(EntityRef),
    #[error("duplicate {kind} id {id}")]
    DuplicateId { kind: &'static str, id: u32 },
    #[error("more than one measurement for KPI {kpi_id} in {period}")]
    DuplicateMeasurement { kpi_id: KpiId, period: Period },
    #[error("end period {end} precedes start period {start}")]
    InvalidRange { start: Period, end: Period },
    #[error("invalid period {year}-{month:02}")]
    InvalidPeriod { year: i32, month: u32 },
    #[error("year {0} is outside the supported range 2000-2100")]
    UnsupportedYear(i32),
    #[error("quarter must be between 1 and 4, got {0}")]
    InvalidQuarter(u32),
    #[error("value {value} rejected for unit '{unit}': {reason}")]
    ValueRejected {
        value: f64,
        unit: String,
        reason: &'static str,
    },
    #[error("measurement store lock poisoned")]
    LockPoisoned,
}

impl TrackerError {
    /// True for errors caused by caller input rather than the process state.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, TrackerError::LockPoisoned | TrackerError::NotFound(_))
    }
}
