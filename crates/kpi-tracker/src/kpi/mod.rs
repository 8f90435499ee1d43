//! Roles, KPIs, monthly measurements, and the scoring built on top of them.

pub mod aggregate;
pub mod dashboard;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod render;
pub mod scoring;
pub mod store;
pub mod tracker;

pub use aggregate::{month_sequence, KpiPoint, KpiSeries, Report, ReportRange, RoleReport, ScorePoint};
pub use dashboard::{MonthlyTrend, RoleOverview, RoleTrendScore};
pub use domain::{
    ComparisonOperator, Dataset, Kpi, KpiCategory, KpiId, Measurement, MeasurementId,
    MeasurementInput, Period, Role, RoleId, SUPPORTED_YEARS,
};
pub use error::{EntityRef, TrackerError};
pub use persistence::{CsvWorkbook, DatasetRepository, PersistenceError, Settings, Storage};
pub use render::{render, write_report, RenderError, ReportFormat};
pub use store::{MeasurementFilter, MeasurementLookup, MeasurementStore, UpsertOutcome};
pub use tracker::{DatasetSummary, KpiTracker};
