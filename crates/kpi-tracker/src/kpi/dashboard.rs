use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use super::domain::{ensure_supported_year, Kpi, Period, Role, RoleId};
use super::error::TrackerError;
use super::scoring::{measured_count, role_score};
use super::store::MeasurementLookup;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleOverview {
    pub role_id: RoleId,
    pub role_name: String,
    pub total_score: f64,
    pub kpi_count: usize,
    #[serde(rename = "measured_kpis")]
    pub measured: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleTrendScore {
    pub role_id: RoleId,
    pub role_name: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyTrend {
    pub month: u32,
    pub month_name: String,
    /// Serialized as an object keyed by role name, in role order.
    #[serde(serialize_with = "scores_by_role_name")]
    pub role_scores: Vec<RoleTrendScore>,
}

impl MonthlyTrend {
    pub fn score_for(&self, role_name: &str) -> Option<f64> {
        self.role_scores
            .iter()
            .find(|entry| entry.role_name == role_name)
            .map(|entry| entry.score)
    }
}

fn scores_by_role_name<S>(scores: &[RoleTrendScore], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(scores.len()))?;
    for entry in scores {
        map.serialize_entry(&entry.role_name, &entry.score)?;
    }
    map.end()
}

/// Score and measurement coverage per role for a single month.
///
/// Roles without KPIs are skipped.
pub fn overview<L>(roles: &[(Role, Vec<Kpi>)], period: Period, lookup: &L) -> Vec<RoleOverview>
where
    L: MeasurementLookup + ?Sized,
{
    roles
        .iter()
        .filter(|(_, kpis)| !kpis.is_empty())
        .map(|(role, kpis)| RoleOverview {
            role_id: role.id,
            role_name: role.name.clone(),
            total_score: role_score(kpis, period, lookup),
            kpi_count: kpis.len(),
            measured: measured_count(kpis, period, lookup),
        })
        .collect()
}

/// Role scores for each of the twelve months of `year`.
pub fn trends<L>(
    roles: &[(Role, Vec<Kpi>)],
    year: i32,
    lookup: &L,
) -> Result<Vec<MonthlyTrend>, TrackerError>
where
    L: MeasurementLookup + ?Sized,
{
    ensure_supported_year(year)?;
    (1..=12)
        .map(|month| {
            let period = Period::new(year, month)?;
            let role_scores = roles
                .iter()
                .filter(|(_, kpis)| !kpis.is_empty())
                .map(|(role, kpis)| RoleTrendScore {
                    role_id: role.id,
                    role_name: role.name.clone(),
                    score: role_score(kpis, period, lookup),
                })
                .collect();
            Ok(MonthlyTrend {
                month,
                month_name: period.month_name(),
                role_scores,
            })
        })
        .collect()
}
