use kpi_tracker::kpi::persistence::seed_dataset;
use kpi_tracker::kpi::{
    render, ComparisonOperator, CsvWorkbook, Dataset, DatasetRepository, Kpi, KpiCategory, KpiId,
    KpiTracker, MeasurementInput, Period, ReportFormat, ReportRange, Role, RoleId, TrackerError,
};

fn period(year: i32, month: u32) -> Period {
    Period::new(year, month).expect("valid period")
}

fn input(kpi: u32, value: f64, unit: &str, period: Period, notes: &str) -> MeasurementInput {
    MeasurementInput {
        kpi_id: KpiId(kpi),
        metric_value: value,
        unit: unit.to_string(),
        period,
        notes: notes.to_string(),
    }
}

fn support_agent_dataset() -> Dataset {
    Dataset {
        roles: vec![Role {
            id: RoleId(1),
            name: "Support Agent".to_string(),
            description: "Front line support".to_string(),
        }],
        kpis: vec![Kpi {
            id: KpiId(1),
            role_id: RoleId(1),
            category: KpiCategory::Quantitative,
            name: "Resolution Time".to_string(),
            description: "Average days to resolve a ticket".to_string(),
            metric: "Average resolution time".to_string(),
            unit: "days".to_string(),
            target: "≤ 3 days".to_string(),
            target_value: 3.0,
            operator: ComparisonOperator::LessOrEqual,
            weight: 70.0,
        }],
        measurements: Vec::new(),
    }
}

#[test]
fn upsert_rescores_the_same_measurement() {
    let tracker = KpiTracker::new(support_agent_dataset()).expect("valid dataset");
    let february = period(2025, 2);

    let first = tracker
        .upsert_measurement(input(1, 2.0, "days", february, ""))
        .expect("created");
    assert!(first.created);
    assert_eq!(tracker.role_score(RoleId(1), february).expect("scored"), 100.0);

    let second = tracker
        .upsert_measurement(input(1, 6.0, "days", february, "late"))
        .expect("updated");
    assert!(!second.created);
    assert_eq!(second.measurement.id, first.measurement.id);
    assert_eq!(second.measurement.created_at, first.measurement.created_at);
    assert_eq!(tracker.role_score(RoleId(1), february).expect("scored"), 50.0);

    let summary = tracker.snapshot().expect("snapshot");
    assert_eq!(summary.measurements.len(), 1);
    assert_eq!(summary.measurements[0].notes, "late");
}

#[test]
fn unknown_kpi_is_an_invalid_reference() {
    let tracker = KpiTracker::new(support_agent_dataset()).expect("valid dataset");
    let err = tracker
        .upsert_measurement(input(42, 1.0, "days", period(2025, 1), ""))
        .expect_err("unknown KPI");
    assert!(matches!(err, TrackerError::InvalidReference(_)));
}

#[test]
fn quarter_report_survives_a_workbook_round_trip() {
    let dir = tempfile::tempdir().expect("temp dir");
    let workbook = CsvWorkbook::new(dir.path());
    let tracker = KpiTracker::new(workbook.load_or_seed().expect("seeded")).expect("valid seed");

    tracker
        .record_measurement(input(1, 2.0, "days", period(2025, 1), "steady"))
        .expect("recorded");
    tracker
        .record_measurement(input(1, 6.0, "days", period(2025, 3), ""))
        .expect("recorded");
    tracker.save_to(&workbook).expect("saved");

    let reloaded = KpiTracker::new(workbook.load().expect("loads")).expect("valid dataset");
    let report = reloaded
        .report(ReportRange::Quarterly { year: 2025, quarter: 1 }, Some(&[RoleId(1)]))
        .expect("report");

    assert_eq!(report.title, "Q1 2025");
    assert_eq!(report.months, vec![period(2025, 1), period(2025, 2), period(2025, 3)]);
    assert_eq!(report.roles.len(), 1);

    let scores: Vec<f64> = report.roles[0].overall.iter().map(|point| point.score).collect();
    assert_eq!(scores, vec![100.0, 0.0, 50.0]);
    assert_eq!(report.roles[0].average_score(), Some(75.0));

    let text = render(&report, ReportFormat::Txt).expect("renders");
    assert!(text.contains("KPI REPORT: Q1 2025"));
    assert!(text.contains("Jan 2025: 2.00 days (100.00%)"));
}

#[test]
fn reversed_custom_range_is_rejected() {
    let tracker = KpiTracker::new(seed_dataset()).expect("valid seed");
    let err = tracker
        .report(
            ReportRange::Custom {
                start: period(2025, 3),
                end: period(2025, 1),
            },
            None,
        )
        .expect_err("reversed range");
    assert!(matches!(err, TrackerError::InvalidRange { .. }));
}
