use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::domain::{Kpi, KpiCategory, KpiId, Measurement, Period, Role};
use super::error::TrackerError;
use super::scoring::{achievement, measured_count, role_score, weighted_score};
use super::store::MeasurementLookup;

/// Every month from `start` to `end`, both inclusive, in ascending order.
pub fn month_sequence(start: Period, end: Period) -> Result<Vec<Period>, TrackerError> {
    if end < start {
        return Err(TrackerError::InvalidRange { start, end });
    }

    let mut months = vec![start];
    let mut current = start;
    while current < end {
        match current.next() {
            Some(next) => {
                months.push(next);
                current = next;
            }
            None => break,
        }
    }
    Ok(months)
}

/// The period ranges reports are generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportRange {
    Monthly { year: i32, month: u32 },
    Quarterly { year: i32, quarter: u32 },
    Yearly { year: i32 },
    Custom { start: Period, end: Period },
}

impl ReportRange {
    pub fn bounds(&self) -> Result<(Period, Period), TrackerError> {
        match *self {
            ReportRange::Monthly { year, month } => {
                let period = Period::new(year, month)?;
                Ok((period, period))
            }
            ReportRange::Quarterly { year, quarter } => {
                if !(1..=4).contains(&quarter) {
                    return Err(TrackerError::InvalidQuarter(quarter));
                }
                let start = Period::new(year, 3 * (quarter - 1) + 1)?;
                let end = Period::new(year, 3 * quarter)?;
                Ok((start, end))
            }
            ReportRange::Yearly { year } => Ok((Period::new(year, 1)?, Period::new(year, 12)?)),
            ReportRange::Custom { start, end } => {
                if end < start {
                    return Err(TrackerError::InvalidRange { start, end });
                }
                Ok((start, end))
            }
        }
    }

    pub fn months(&self) -> Result<Vec<Period>, TrackerError> {
        let (start, end) = self.bounds()?;
        month_sequence(start, end)
    }

    /// Heading used by the renderers, e.g. "Q1 2025".
    pub fn label(&self) -> String {
        match *self {
            ReportRange::Monthly { year, month } => Period::new(year, month)
                .map(Period::label)
                .unwrap_or_else(|_| format!("{year}-{month:02}")),
            ReportRange::Quarterly { year, quarter } => format!("Q{quarter} {year}"),
            ReportRange::Yearly { year } => year.to_string(),
            ReportRange::Custom { start, end } => format!("{} - {}", start.label(), end.label()),
        }
    }

    /// Base file name (without extension) for a saved report.
    pub fn file_stem(&self) -> String {
        match *self {
            ReportRange::Monthly { year, month } => {
                let stem = Period::new(year, month)
                    .map(Period::compact_label)
                    .unwrap_or_else(|_| format!("{year}{month:02}"));
                format!("Monthly_Report_{stem}")
            }
            ReportRange::Quarterly { year, quarter } => {
                format!("Quarterly_Report_Q{quarter}_{year}")
            }
            ReportRange::Yearly { year } => format!("Yearly_Report_{year}"),
            ReportRange::Custom { start, end } => format!(
                "Custom_Report_{}_to_{}",
                start.compact_label(),
                end.compact_label()
            ),
        }
    }
}

/// One KPI's result for one month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiPoint {
    pub period: Period,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurement: Option<Measurement>,
    /// `None` when the KPI has no measurement for the month.
    pub achievement: Option<f64>,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiSeries {
    pub kpi: Kpi,
    pub points: Vec<KpiPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScorePoint {
    pub period: Period,
    pub score: f64,
    pub measured_kpis: usize,
}

/// Per-KPI and overall results for one role across a month sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleReport {
    pub role: Role,
    pub kpis: Vec<KpiSeries>,
    pub overall: Vec<ScorePoint>,
}

impl RoleReport {
    pub fn series(&self, kpi_id: KpiId) -> Option<&KpiSeries> {
        self.kpis.iter().find(|series| series.kpi.id == kpi_id)
    }

    pub fn series_in(&self, category: KpiCategory) -> impl Iterator<Item = &KpiSeries> {
        self.kpis
            .iter()
            .filter(move |series| series.kpi.category == category)
    }

    /// Sum of the weights of this role's KPIs in `category`.
    pub fn category_weight(&self, category: KpiCategory) -> f64 {
        self.series_in(category).map(|series| series.kpi.weight).sum()
    }

    /// Mean score over the months that have a positive score.
    pub fn average_score(&self) -> Option<f64> {
        let scored: Vec<f64> = self
            .overall
            .iter()
            .map(|point| point.score)
            .filter(|score| *score > 0.0)
            .collect();
        if scored.is_empty() {
            None
        } else {
            Some(scored.iter().sum::<f64>() / scored.len() as f64)
        }
    }
}

/// Fold the scoring engine over `months` for one role.
pub fn role_report<L>(role: &Role, kpis: &[Kpi], months: &[Period], lookup: &L) -> RoleReport
where
    L: MeasurementLookup + ?Sized,
{
    let series = kpis
        .iter()
        .map(|kpi| KpiSeries {
            kpi: kpi.clone(),
            points: months
                .iter()
                .map(|&period| {
                    let measurement = lookup.measurement_for(kpi.id, period);
                    let achieved = measurement.map(|m| achievement(kpi, Some(m)));
                    KpiPoint {
                        period,
                        measurement: measurement.cloned(),
                        achievement: achieved,
                        score: achieved.map(|pct| weighted_score(pct, kpi.weight)),
                    }
                })
                .collect(),
        })
        .collect();

    let overall = months
        .iter()
        .map(|&period| ScorePoint {
            period,
            score: role_score(kpis, period, lookup),
            measured_kpis: measured_count(kpis, period, lookup),
        })
        .collect();

    RoleReport {
        role: role.clone(),
        kpis: series,
        overall,
    }
}

/// A full report across roles for a [`ReportRange`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub range: ReportRange,
    pub title: String,
    pub months: Vec<Period>,
    pub generated_at: NaiveDateTime,
    pub roles: Vec<RoleReport>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn period(year: i32, month: u32) -> Period {
        Period::new(year, month).expect("valid period")
    }

    #[test]
    fn month_sequence_is_inclusive() {
        let months = month_sequence(period(2025, 1), period(2025, 3)).expect("valid range");
        assert_eq!(months, vec![period(2025, 1), period(2025, 2), period(2025, 3)]);
    }

    #[test]
    fn month_sequence_crosses_year_boundary() {
        let months = month_sequence(period(2024, 11), period(2025, 2)).expect("valid range");
        assert_eq!(months.len(), 4);
        assert_eq!(months[2], period(2025, 1));
    }

    #[test]
    fn month_sequence_rejects_reversed_range() {
        assert_eq!(
            month_sequence(period(2025, 3), period(2025, 1)),
            Err(TrackerError::InvalidRange {
                start: period(2025, 3),
                end: period(2025, 1)
            })
        );
    }

    #[test]
    fn quarter_maps_to_three_months() {
        let range = ReportRange::Quarterly {
            year: 2025,
            quarter: 4,
        };
        assert_eq!(
            range.months().expect("valid quarter"),
            vec![period(2025, 10), period(2025, 11), period(2025, 12)]
        );
        assert_eq!(range.file_stem(), "Quarterly_Report_Q4_2025");
        assert_eq!(
            ReportRange::Quarterly {
                year: 2025,
                quarter: 5
            }
            .months(),
            Err(TrackerError::InvalidQuarter(5))
        );
    }

    #[test]
    fn yearly_and_monthly_ranges() {
        assert_eq!(
            ReportRange::Yearly { year: 2024 }
                .months()
                .expect("valid year")
                .len(),
            12
        );
        let monthly = ReportRange::Monthly {
            year: 2025,
            month: 1,
        };
        assert_eq!(monthly.months(), Ok(vec![period(2025, 1)]));
        assert_eq!(monthly.label(), "January 2025");
        assert_eq!(monthly.file_stem(), "Monthly_Report_Jan2025");
    }

    #[test]
    fn custom_range_requires_ordered_bounds() {
        let custom = ReportRange::Custom {
            start: period(2025, 1),
            end: period(2025, 3),
        };
        assert_eq!(custom.file_stem(), "Custom_Report_Jan2025_to_Mar2025");
        let reversed = ReportRange::Custom {
            start: period(2025, 3),
            end: period(2025, 1),
        };
        assert!(matches!(
            reversed.months(),
            Err(TrackerError::InvalidRange { .. })
        ));
    }
}
