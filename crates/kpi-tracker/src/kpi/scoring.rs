//! Single-period achievement and weighted role scoring.

use super::domain::{ComparisonOperator, Kpi, Measurement, Period};
use super::store::MeasurementLookup;

pub const MAX_ACHIEVEMENT: f64 = 100.0;

/// Percentage of `kpi`'s target reached by `measurement`, in `[0, 100]`.
///
/// A missing measurement or a zero target scores 0. Results are capped at
/// 100 and floored at 0, so negative values or targets never produce a
/// negative achievement.
pub fn achievement(kpi: &Kpi, measurement: Option<&Measurement>) -> f64 {
    let Some(measurement) = measurement else {
        return 0.0;
    };

    let value = measurement.metric_value;
    let target = kpi.target_value;
    if target == 0.0 {
        return 0.0;
    }

    let raw = match kpi.operator {
        ComparisonOperator::LessOrEqual if value <= target => MAX_ACHIEVEMENT,
        ComparisonOperator::LessOrEqual => target / value * 100.0,
        ComparisonOperator::Equal if value >= target => MAX_ACHIEVEMENT,
        ComparisonOperator::Equal
        | ComparisonOperator::GreaterOrEqual
        | ComparisonOperator::Unspecified(_) => value / target * 100.0,
    };

    if raw.is_nan() {
        return 0.0;
    }
    raw.clamp(0.0, MAX_ACHIEVEMENT)
}

/// Contribution of one KPI to its role score: achievement scaled by weight.
pub fn weighted_score(achievement: f64, weight: f64) -> f64 {
    achievement * weight / 100.0
}

/// Weighted average achievement over the KPIs measured in `period`.
///
/// KPIs without a measurement are left out of both the weighted sum and the
/// weight total, so the score reflects only what was measured. Returns 0
/// when nothing was measured or the measured weights sum to zero.
pub fn role_score<L>(kpis: &[Kpi], period: Period, lookup: &L) -> f64
where
    L: MeasurementLookup + ?Sized,
{
    let (total_score, total_weight) = kpis
        .iter()
        .filter_map(|kpi| {
            lookup.measurement_for(kpi.id, period).map(|measurement| {
                let pct = achievement(kpi, Some(measurement));
                (weighted_score(pct, kpi.weight), kpi.weight)
            })
        })
        .fold((0.0, 0.0), |(score, weight), (s, w)| (score + s, weight + w));

    if total_weight == 0.0 {
        return 0.0;
    }
    total_score / total_weight * 100.0
}

/// Number of `kpis` that have a measurement in `period`.
pub fn measured_count<L>(kpis: &[Kpi], period: Period, lookup: &L) -> usize
where
    L: MeasurementLookup + ?Sized,
{
    kpis.iter()
        .filter(|kpi| lookup.measurement_for(kpi.id, period).is_some())
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kpi::domain::{KpiCategory, KpiId, MeasurementId, RoleId};
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct Lookup(HashMap<(KpiId, Period), Measurement>);

    impl Lookup {
        fn with(mut self, kpi: KpiId, period: Period, value: f64) -> Self {
            let id = MeasurementId(self.0.len() as u32 + 1);
            self.0.insert((kpi, period), measurement(kpi, period, value, id));
            self
        }
    }

    impl MeasurementLookup for Lookup {
        fn measurement_for(&self, kpi_id: KpiId, period: Period) -> Option<&Measurement> {
            self.0.get(&(kpi_id, period))
        }
    }

    fn period() -> Period {
        Period::new(2025, 2).expect("valid period")
    }

    fn kpi(id: u32, operator: ComparisonOperator, target: f64, weight: f64) -> Kpi {
        Kpi {
            id: KpiId(id),
            role_id: RoleId(1),
            category: KpiCategory::Quantitative,
            name: format!("KPI {id}"),
            description: String::new(),
            metric: String::new(),
            unit: "count".to_string(),
            target: target.to_string(),
            target_value: target,
            operator,
            weight,
        }
    }

    fn measurement(kpi_id: KpiId, period: Period, value: f64, id: MeasurementId) -> Measurement {
        Measurement {
            id,
            kpi_id,
            metric_value: value,
            unit: "count".to_string(),
            period,
            notes: String::new(),
            created_at: NaiveDate::from_ymd_opt(2025, 2, 3)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .expect("valid timestamp"),
        }
    }

    fn score(kpi: &Kpi, value: f64) -> f64 {
        achievement(kpi, Some(&measurement(kpi.id, period(), value, MeasurementId(1))))
    }

    #[test]
    fn absent_measurement_scores_zero() {
        let target = kpi(1, ComparisonOperator::GreaterOrEqual, 10.0, 50.0);
        assert_eq!(achievement(&target, None), 0.0);
    }

    #[test]
    fn lower_is_better_scales_inversely() {
        let lte = kpi(1, ComparisonOperator::LessOrEqual, 3.0, 70.0);
        assert_eq!(score(&lte, 2.0), 100.0);
        assert_eq!(score(&lte, 3.0), 100.0);
        assert_eq!(score(&lte, 6.0), 50.0);
    }

    #[test]
    fn equal_operator_caps_at_target() {
        let eq = kpi(1, ComparisonOperator::Equal, 100.0, 30.0);
        assert_eq!(score(&eq, 120.0), 100.0);
        assert_eq!(score(&eq, 80.0), 80.0);
    }

    #[test]
    fn unspecified_operator_falls_back_to_higher_is_better() {
        let other = kpi(1, ComparisonOperator::Unspecified("~".into()), 8.0, 30.0);
        assert_eq!(score(&other, 4.0), 50.0);
        assert_eq!(score(&other, 16.0), 100.0);
    }

    #[test]
    fn zero_target_scores_zero_for_every_operator() {
        for operator in [
            ComparisonOperator::LessOrEqual,
            ComparisonOperator::GreaterOrEqual,
            ComparisonOperator::Equal,
            ComparisonOperator::default(),
        ] {
            let zero = kpi(1, operator, 0.0, 50.0);
            assert_eq!(score(&zero, 5.0), 0.0);
            assert_eq!(score(&zero, 0.0), 0.0);
        }
    }

    #[test]
    fn negative_values_floor_at_zero() {
        let gte = kpi(1, ComparisonOperator::GreaterOrEqual, 10.0, 50.0);
        assert_eq!(score(&gte, -5.0), 0.0);

        let negative_target = kpi(2, ComparisonOperator::LessOrEqual, -2.0, 50.0);
        assert_eq!(score(&negative_target, 4.0), 0.0);
        assert_eq!(score(&negative_target, 0.0), 0.0);
    }

    #[test]
    fn role_score_ignores_unmeasured_weight() {
        let heavy = kpi(1, ComparisonOperator::GreaterOrEqual, 10.0, 70.0);
        let light = kpi(2, ComparisonOperator::GreaterOrEqual, 10.0, 30.0);
        let lookup = Lookup::default().with(heavy.id, period(), 10.0);

        let kpis = [heavy, light];
        assert_eq!(role_score(&kpis, period(), &lookup), 100.0);
        assert_eq!(measured_count(&kpis, period(), &lookup), 1);
    }

    #[test]
    fn role_score_weights_measured_kpis() {
        let heavy = kpi(1, ComparisonOperator::GreaterOrEqual, 10.0, 70.0);
        let light = kpi(2, ComparisonOperator::GreaterOrEqual, 10.0, 30.0);
        let lookup = Lookup::default()
            .with(heavy.id, period(), 10.0)
            .with(light.id, period(), 5.0);

        let score = role_score(&[heavy, light], period(), &lookup);
        assert!((score - 85.0).abs() < 1e-9, "unexpected score {score}");
    }

    #[test]
    fn role_score_is_zero_without_measurements() {
        let only = kpi(1, ComparisonOperator::GreaterOrEqual, 10.0, 70.0);
        assert_eq!(role_score(&[only], period(), &Lookup::default()), 0.0);
        assert_eq!(role_score(&[], period(), &Lookup::default()), 0.0);
    }

    proptest! {
        #[test]
        fn higher_is_better_is_monotonic_and_capped(
            target in 0.1f64..1_000.0,
            a in 0.0f64..5_000.0,
            b in 0.0f64..5_000.0,
        ) {
            let gte = kpi(1, ComparisonOperator::GreaterOrEqual, target, 50.0);
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(score(&gte, low) <= score(&gte, high));
            prop_assert!(score(&gte, high) <= MAX_ACHIEVEMENT);
            prop_assert!((score(&gte, target) - 100.0).abs() < 1e-9);
        }

        #[test]
        fn lower_is_better_halves_at_double_target(target in 0.1f64..1_000.0) {
            let lte = kpi(1, ComparisonOperator::LessOrEqual, target, 50.0);
            prop_assert_eq!(score(&lte, target), 100.0);
            prop_assert!((score(&lte, target * 2.0) - 50.0).abs() < 1e-9);
            prop_assert!(score(&lte, target * 1e9) < 1e-6);
        }
    }
}
