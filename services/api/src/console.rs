//! Interactive menu driven over any line reader and writer.

use crate::infra::TrackerState;
use chrono::{Datelike, NaiveDate};
use kpi_tracker::kpi::domain::ensure_supported_year;
use kpi_tracker::kpi::{
    month_sequence, write_report, KpiCategory, MeasurementInput, Period, ReportFormat,
    ReportRange, Role, RoleId, RoleReport,
};
use std::fmt::Display;
use std::io::{self, BufRead, Write};
use std::path::Path;

const RULE: &str = "------------------------------";
const CHART_HEIGHT: usize = 10;

pub(crate) struct Console<R, W> {
    state: TrackerState,
    input: R,
    output: W,
    today: NaiveDate,
    closed: bool,
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub(crate) fn new(state: TrackerState, input: R, output: W, today: NaiveDate) -> Self {
        Self {
            state,
            input,
            output,
            today,
            closed: false,
        }
    }

    /// Show the main menu until the user exits or input ends.
    pub(crate) fn run(&mut self) -> io::Result<()> {
        loop {
            writeln!(self.output, "\n=== KPI Tracker ===")?;
            writeln!(self.output, "1. Input KPI values")?;
            writeln!(self.output, "2. View KPIs")?;
            writeln!(self.output, "3. Generate reports")?;
            writeln!(self.output, "4. Settings")?;
            writeln!(self.output, "5. Exit")?;
            let choice = self.prompt("\nEnter your choice: ")?;
            if self.closed {
                break;
            }

            match choice.as_str() {
                "1" => self.input_values()?,
                "2" => self.view_menu()?,
                "3" => self.report_menu()?,
                "4" => self.settings_menu()?,
                "5" => {
                    writeln!(self.output, "Exiting...")?;
                    break;
                }
                other => writeln!(
                    self.output,
                    "Invalid choice '{other}'. Please enter a number from 1 to 5."
                )?,
            }
        }
        Ok(())
    }

    fn prompt(&mut self, text: &str) -> io::Result<String> {
        write!(self.output, "{text}")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            self.closed = true;
        }
        Ok(line.trim().to_string())
    }

    fn fail(&mut self, err: impl Display) -> io::Result<()> {
        writeln!(self.output, "Error: {err}")
    }

    fn pause(&mut self) -> io::Result<()> {
        self.prompt("\nPress Enter to continue...").map(|_| ())
    }

    fn select_role(&mut self) -> io::Result<Option<Role>> {
        let roles = match self.state.tracker.list_roles() {
            Ok(roles) => roles,
            Err(err) => {
                self.fail(err)?;
                return Ok(None);
            }
        };

        writeln!(self.output, "\n=== Select Role ===")?;
        for (index, role) in roles.iter().enumerate() {
            writeln!(self.output, "{}. {}", index + 1, role.name)?;
        }
        let choice = self.prompt("\nEnter role number (0 to cancel): ")?;
        match choice.parse::<usize>() {
            Ok(0) => Ok(None),
            Ok(index) if index <= roles.len() => Ok(Some(roles[index - 1].clone())),
            _ => {
                writeln!(self.output, "Invalid selection.")?;
                Ok(None)
            }
        }
    }

    fn select_year(&mut self, text: &str) -> io::Result<Option<i32>> {
        let raw = self.prompt(text)?;
        match raw.parse::<i32>().ok().map(ensure_supported_year) {
            Some(Ok(year)) => Ok(Some(year)),
            _ => {
                writeln!(self.output, "Invalid year. Enter a year between 2000 and 2100.")?;
                Ok(None)
            }
        }
    }

    fn select_period(&mut self) -> io::Result<Option<Period>> {
        writeln!(self.output, "\n=== Select Period ===")?;
        let current = self.today.year();
        let raw = self.prompt(&format!("Year (default: {current}): "))?;
        let year = if raw.is_empty() {
            current
        } else {
            match raw.parse::<i32>().ok().map(ensure_supported_year) {
                Some(Ok(year)) => year,
                _ => {
                    writeln!(self.output, "Invalid year. Using current year.")?;
                    current
                }
            }
        };

        let raw = self.prompt("Month (1-12): ")?;
        let period = raw
            .parse::<u32>()
            .ok()
            .filter(|month| (1..=12).contains(month))
            .and_then(|month| Period::new(year, month).ok());
        if period.is_none() {
            writeln!(self.output, "Invalid month.")?;
        }
        Ok(period)
    }

    fn input_values(&mut self) -> io::Result<()> {
        let Some(role) = self.select_role()? else {
            return Ok(());
        };
        let Some(period) = self.select_period()? else {
            return Ok(());
        };
        let kpis = match self.state.tracker.kpis_for_role(role.id) {
            Ok(kpis) => kpis,
            Err(err) => return self.fail(err),
        };
        if kpis.is_empty() {
            return writeln!(self.output, "No KPIs found for this role.");
        }

        writeln!(
            self.output,
            "\n=== Entering KPI values for {} - {} ===",
            role.name,
            period.label()
        )?;

        let mut saved = 0;
        for category in KpiCategory::ordered() {
            let weight: f64 = kpis
                .iter()
                .filter(|kpi| kpi.category == category)
                .map(|kpi| kpi.weight)
                .sum();
            writeln!(
                self.output,
                "\n{} KPIs ({weight:.0}% Weight)",
                category.label().to_uppercase()
            )?;
            writeln!(self.output, "{RULE}")?;

            for kpi in kpis.iter().filter(|kpi| kpi.category == category) {
                writeln!(self.output, "\n{}", kpi.name)?;
                writeln!(self.output, "Description: {}", kpi.description)?;
                writeln!(self.output, "Metric: {}", kpi.metric)?;
                writeln!(self.output, "Target: {} (Weight: {:.1}%)", kpi.target, kpi.weight)?;
                if let Ok(Some(existing)) = self.state.tracker.find_measurement(kpi.id, period) {
                    writeln!(
                        self.output,
                        "Current value: {:.2} {}",
                        existing.metric_value, existing.unit
                    )?;
                }

                let raw = self.prompt(&format!(
                    "Enter value ({}) or press Enter to skip: ",
                    kpi.unit_hint()
                ))?;
                if raw.is_empty() {
                    continue;
                }
                let Ok(value) = raw.parse::<f64>() else {
                    writeln!(self.output, "Invalid number. Skipping.")?;
                    continue;
                };
                if let Err(err) = kpi.validate_value(value) {
                    writeln!(self.output, "{err}. Skipping.")?;
                    continue;
                }

                let notes = self.prompt("Enter notes (optional): ")?;
                let input = MeasurementInput {
                    kpi_id: kpi.id,
                    metric_value: value,
                    unit: kpi.unit.clone(),
                    period,
                    notes,
                };
                match self.state.tracker.record_measurement(input) {
                    Ok(outcome) => {
                        let verb = if outcome.created { "Saved" } else { "Updated" };
                        writeln!(
                            self.output,
                            "{verb} measurement: {:.2} {}",
                            outcome.measurement.metric_value, outcome.measurement.unit
                        )?;
                        saved += 1;
                    }
                    Err(err) => self.fail(err)?,
                }
            }
        }

        writeln!(self.output, "\n{saved} KPI value(s) recorded.")?;
        if saved > 0 {
            if let Err(err) = self.state.save() {
                writeln!(self.output, "Warning: failed to save workbook: {err}")?;
            }
        }
        Ok(())
    }

    fn view_menu(&mut self) -> io::Result<()> {
        writeln!(self.output, "\n=== View KPIs ===")?;
        writeln!(self.output, "1. View by Role")?;
        writeln!(self.output, "2. View by Month")?;
        writeln!(self.output, "3. View Year-to-Date")?;
        writeln!(self.output, "4. View Trends")?;
        writeln!(self.output, "0. Back to Main Menu")?;
        match self.prompt("\nEnter your choice: ")?.as_str() {
            "1" => self.view_by_role(),
            "2" => self.view_by_month(),
            "3" => self.view_year_to_date(),
            "4" => self.view_trends(),
            "0" => Ok(()),
            _ => writeln!(self.output, "Invalid choice."),
        }
    }

    fn view_by_role(&mut self) -> io::Result<()> {
        let Some(role) = self.select_role()? else {
            return Ok(());
        };
        let Some(period) = self.select_period()? else {
            return Ok(());
        };
        let report = match self.state.tracker.role_report(role.id, &[period]) {
            Ok(report) => report,
            Err(err) => return self.fail(err),
        };
        if report.kpis.is_empty() {
            return writeln!(self.output, "No KPIs found for this role.");
        }

        writeln!(
            self.output,
            "\n=== KPI Values for {} - {} ===",
            role.name,
            period.label()
        )?;
        for category in KpiCategory::ordered() {
            writeln!(
                self.output,
                "\n{} KPIs ({:.0}% Weight)",
                category.label().to_uppercase(),
                report.category_weight(category)
            )?;
            writeln!(self.output, "{RULE}")?;
            for series in report.series_in(category) {
                let kpi = &series.kpi;
                match series.points.first().and_then(|point| {
                    point
                        .measurement
                        .as_ref()
                        .zip(point.achievement)
                }) {
                    Some((measurement, achievement)) => writeln!(
                        self.output,
                        "{}: {:.2} {} (Target: {}, Achievement: {:.2}%)",
                        kpi.name, measurement.metric_value, measurement.unit, kpi.target, achievement
                    )?,
                    None => writeln!(self.output, "{}: No data (Target: {})", kpi.name, kpi.target)?,
                }
            }
        }

        let score = report.overall.first().map_or(0.0, |point| point.score);
        writeln!(self.output, "\nOVERALL SCORE: {score:.2}%")?;
        self.pause()
    }

    fn view_by_month(&mut self) -> io::Result<()> {
        let Some(period) = self.select_period()? else {
            return Ok(());
        };
        let report = match self.state.tracker.report(
            ReportRange::Monthly {
                year: period.year(),
                month: period.month(),
            },
            None,
        ) {
            Ok(report) => report,
            Err(err) => return self.fail(err),
        };

        writeln!(self.output, "\n=== All KPIs for {} ===\n", period.label())?;
        for role in &report.roles {
            writeln!(self.output, "== {} ==", role.role.name)?;
            if role.kpis.is_empty() {
                writeln!(self.output, "No KPIs defined.")?;
                continue;
            }
            let score = role.overall.first().map_or(0.0, |point| point.score);
            writeln!(self.output, "Overall Score: {score:.2}%\n")?;
        }
        self.pause()
    }

    /// Months of `year` shown in year-to-date views: up to the current month
    /// for the current year, otherwise all twelve.
    fn months_to_date(&self, year: i32) -> Vec<Period> {
        let last = if year == self.today.year() {
            self.today.month()
        } else {
            12
        };
        match (Period::new(year, 1), Period::new(year, last)) {
            (Ok(start), Ok(end)) => month_sequence(start, end).unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    fn view_year_to_date(&mut self) -> io::Result<()> {
        let Some(year) = self.select_year("Enter year: ")? else {
            return Ok(());
        };
        let months = self.months_to_date(year);
        let roles = match self.state.tracker.list_roles() {
            Ok(roles) => roles,
            Err(err) => return self.fail(err),
        };

        writeln!(self.output, "\n=== Year-to-Date KPI Performance for {year} ===\n")?;
        for role in roles {
            writeln!(self.output, "== {} ==", role.name)?;
            let report = match self.state.tracker.role_report(role.id, &months) {
                Ok(report) => report,
                Err(err) => return self.fail(err),
            };
            if report.kpis.is_empty() {
                writeln!(self.output, "No KPIs defined.")?;
                continue;
            }

            self.month_header(&months, "Average")?;
            write!(self.output, "{:<15}", "Score (%)")?;
            for point in &report.overall {
                self.score_cell(point.score)?;
            }
            writeln!(
                self.output,
                "{:<8.2}\n",
                report.average_score().unwrap_or(0.0)
            )?;
        }
        self.pause()
    }

    fn view_trends(&mut self) -> io::Result<()> {
        let Some(role) = self.select_role()? else {
            return Ok(());
        };
        let Some(year) = self.select_year("Enter year: ")? else {
            return Ok(());
        };
        let months = self.months_to_date(year);
        let report = match self.state.tracker.role_report(role.id, &months) {
            Ok(report) => report,
            Err(err) => return self.fail(err),
        };
        if report.kpis.is_empty() {
            return writeln!(self.output, "No KPIs found for this role.");
        }

        writeln!(self.output, "\nAvailable KPIs:")?;
        for (index, series) in report.kpis.iter().enumerate() {
            writeln!(self.output, "{}. {}", index + 1, series.kpi.name)?;
        }
        let choice = self.prompt("Enter KPI number (or 0 for overall score): ")?;
        let points = match choice.parse::<usize>() {
            Ok(0) => {
                writeln!(
                    self.output,
                    "\n=== Overall Score Trend for {} in {year} ===\n",
                    role.name
                )?;
                self.trend_rows(&months, "Score (%)", overall_points(&report))?
            }
            Ok(index) if index <= report.kpis.len() => {
                let series = &report.kpis[index - 1];
                writeln!(
                    self.output,
                    "\n=== Trend for {} in {year} ===\n",
                    series.kpi.name
                )?;
                let points = series
                    .points
                    .iter()
                    .map(|point| point.achievement.unwrap_or(0.0))
                    .collect();
                self.trend_rows(&months, "Achievement (%)", points)?
            }
            _ => return writeln!(self.output, "Invalid KPI number."),
        };

        match ascii_chart(&points) {
            Some(lines) => {
                writeln!(self.output, "Chart:")?;
                for line in lines {
                    writeln!(self.output, "{line}")?;
                }
            }
            None => writeln!(self.output, "No data available for chart.")?,
        }
        self.pause()
    }

    fn trend_rows(&mut self, months: &[Period], label: &str, points: Vec<f64>) -> io::Result<Vec<f64>> {
        self.month_header(months, "")?;
        write!(self.output, "{label:<15}")?;
        for value in &points {
            self.score_cell(*value)?;
        }
        writeln!(self.output, "\n")?;
        Ok(points)
    }

    fn month_header(&mut self, months: &[Period], trailer: &str) -> io::Result<()> {
        write!(self.output, "{:<15}", "Month")?;
        for period in months {
            write!(self.output, "{:<8}", period.first_day().format("%b"))?;
        }
        writeln!(self.output, "{trailer}")?;
        writeln!(
            self.output,
            "{}",
            "-".repeat(15 + 8 * months.len() + trailer.len().min(1) * 8)
        )
    }

    fn score_cell(&mut self, value: f64) -> io::Result<()> {
        if value > 0.0 {
            write!(self.output, "{value:<8.2}")
        } else {
            write!(self.output, "{:<8}", "-")
        }
    }

    fn report_menu(&mut self) -> io::Result<()> {
        writeln!(self.output, "\n=== Generate Reports ===")?;
        writeln!(self.output, "1. Monthly Report")?;
        writeln!(self.output, "2. Quarterly Report")?;
        writeln!(self.output, "3. Yearly Report")?;
        writeln!(self.output, "4. Custom Report")?;
        writeln!(self.output, "5. Save workbook now")?;
        writeln!(self.output, "0. Back to Main Menu")?;

        let (range, role_ids) = match self.prompt("\nEnter your choice: ")?.as_str() {
            "1" => match self.select_period()? {
                Some(period) => (
                    ReportRange::Monthly {
                        year: period.year(),
                        month: period.month(),
                    },
                    None,
                ),
                None => return Ok(()),
            },
            "2" => {
                let Some(year) = self.select_year("Enter year: ")? else {
                    return Ok(());
                };
                let raw = self.prompt("Enter quarter (1-4): ")?;
                match raw.parse::<u32>() {
                    Ok(quarter) if (1..=4).contains(&quarter) => {
                        (ReportRange::Quarterly { year, quarter }, None)
                    }
                    _ => return writeln!(self.output, "Invalid quarter."),
                }
            }
            "3" => match self.select_year("Enter year: ")? {
                Some(year) => (ReportRange::Yearly { year }, None),
                None => return Ok(()),
            },
            "4" => match self.custom_range()? {
                Some(selection) => selection,
                None => return Ok(()),
            },
            "5" => {
                return match self.state.save() {
                    Ok(summary) => writeln!(
                        self.output,
                        "Workbook saved ({} measurements).",
                        summary.measurements
                    ),
                    Err(err) => self.fail(err),
                };
            }
            "0" => return Ok(()),
            _ => return writeln!(self.output, "Invalid choice."),
        };

        let Some(format) = self.select_format()? else {
            return Ok(());
        };
        writeln!(self.output, "\nGenerating report for {}...", range.label())?;
        let report = match self.state.tracker.report(range, role_ids.as_deref()) {
            Ok(report) => report,
            Err(err) => return self.fail(err),
        };
        let written = self
            .state
            .storage
            .reports_dir()
            .map_err(|err| err.to_string())
            .and_then(|dir| write_report(&report, format, &dir).map_err(|err| err.to_string()));
        match written {
            Ok(path) => writeln!(self.output, "Report saved to {}", path.display()),
            Err(err) => self.fail(err),
        }
    }

    fn custom_range(&mut self) -> io::Result<Option<(ReportRange, Option<Vec<RoleId>>)>> {
        writeln!(self.output, "\n=== Custom Report ===")?;
        writeln!(self.output, "Select start period:")?;
        let Some(start) = self.select_period()? else {
            return Ok(None);
        };
        writeln!(self.output, "Select end period:")?;
        let Some(end) = self.select_period()? else {
            return Ok(None);
        };
        if end < start {
            writeln!(self.output, "End period cannot be before start period.")?;
            return Ok(None);
        }

        writeln!(self.output, "\nSelect roles to include:")?;
        writeln!(self.output, "1. All roles")?;
        writeln!(self.output, "2. Specific roles")?;
        let role_ids = match self.prompt("Enter your choice: ")?.as_str() {
            "1" => None,
            "2" => {
                let roles = match self.state.tracker.list_roles() {
                    Ok(roles) => roles,
                    Err(err) => {
                        self.fail(err)?;
                        return Ok(None);
                    }
                };
                writeln!(self.output, "\nSelect roles (comma-separated numbers, e.g., 1,3):")?;
                for (index, role) in roles.iter().enumerate() {
                    writeln!(self.output, "{}. {}", index + 1, role.name)?;
                }
                let raw = self.prompt("\nEnter role numbers: ")?;
                let selected: Vec<RoleId> = raw
                    .split(',')
                    .filter_map(|part| part.trim().parse::<usize>().ok())
                    .filter(|index| (1..=roles.len()).contains(index))
                    .map(|index| roles[index - 1].id)
                    .collect();
                if selected.is_empty() {
                    writeln!(self.output, "No valid roles selected.")?;
                    return Ok(None);
                }
                Some(selected)
            }
            _ => {
                writeln!(self.output, "Invalid choice.")?;
                return Ok(None);
            }
        };

        Ok(Some((ReportRange::Custom { start, end }, role_ids)))
    }

    fn select_format(&mut self) -> io::Result<Option<ReportFormat>> {
        writeln!(self.output, "\n=== Select Report Format ===")?;
        writeln!(self.output, "1. Text (.txt)")?;
        writeln!(self.output, "2. CSV (.csv)")?;
        writeln!(self.output, "3. HTML (.html)")?;
        writeln!(self.output, "0. Cancel")?;
        match self.prompt("\nEnter your choice: ")?.as_str() {
            "1" => Ok(Some(ReportFormat::Txt)),
            "2" => Ok(Some(ReportFormat::Csv)),
            "3" => Ok(Some(ReportFormat::Html)),
            "0" => Ok(None),
            _ => {
                writeln!(self.output, "Invalid choice.")?;
                Ok(None)
            }
        }
    }

    fn settings_menu(&mut self) -> io::Result<()> {
        let current = match self.state.storage.settings() {
            Ok(settings) => settings,
            Err(err) => return self.fail(err),
        };
        writeln!(self.output, "\n=== Settings ===")?;
        writeln!(
            self.output,
            "Current database path: {}",
            current.database_path.display()
        )?;
        writeln!(self.output, "1. Change database path")?;
        writeln!(self.output, "2. Reload data from workbook")?;
        writeln!(self.output, "3. Force save to workbook")?;
        writeln!(self.output, "0. Back to Main Menu")?;

        match self.prompt("\nEnter your choice: ")?.as_str() {
            "1" => self.change_database_path(),
            "2" => {
                let confirm = self.prompt("This will discard any unsaved changes. Continue? (y/n): ")?;
                if !confirm.eq_ignore_ascii_case("y") {
                    return writeln!(self.output, "Canceled.");
                }
                match self.state.reload() {
                    Ok(summary) => writeln!(
                        self.output,
                        "Data reloaded: {} roles, {} KPIs, {} measurements.",
                        summary.roles, summary.kpis, summary.measurements
                    ),
                    Err(err) => self.fail(err),
                }
            }
            "3" => match self.state.save() {
                Ok(_) => writeln!(self.output, "Data saved to workbook."),
                Err(err) => self.fail(err),
            },
            "0" => Ok(()),
            _ => writeln!(self.output, "Invalid choice."),
        }
    }

    fn change_database_path(&mut self) -> io::Result<()> {
        let raw = self.prompt("Enter new database path (or Enter to keep current): ")?;
        if raw.is_empty() {
            return Ok(());
        }
        if !Path::new(&raw).exists() {
            let confirm = self.prompt("Path does not exist. Create it? (y/n): ")?;
            if !confirm.eq_ignore_ascii_case("y") {
                return writeln!(self.output, "Canceled.");
            }
        }
        match self.state.storage.update_database_path(&raw) {
            Ok(settings) => writeln!(
                self.output,
                "Database path updated to {}.",
                settings.database_path.display()
            ),
            Err(err) => self.fail(err),
        }
    }
}

fn overall_points(report: &RoleReport) -> Vec<f64> {
    report.overall.iter().map(|point| point.score).collect()
}

/// Vertical bar chart of `points`, scaled to the largest value.
///
/// Returns `None` when no point is positive.
pub(crate) fn ascii_chart(points: &[f64]) -> Option<Vec<String>> {
    let max = points.iter().copied().fold(0.0_f64, f64::max);
    if max <= 0.0 {
        return None;
    }

    let heights: Vec<Option<usize>> = points
        .iter()
        .map(|&value| {
            (value > 0.0).then(|| ((value / max) * (CHART_HEIGHT - 1) as f64) as usize)
        })
        .collect();
    let axis = "-".repeat(points.len() * 2);

    let mut lines = vec![format!("{max:.0}% +{axis}")];
    for row in (0..CHART_HEIGHT).rev() {
        let cells: String = heights
            .iter()
            .map(|height| match height {
                Some(height) if *height >= row => "* ",
                _ => "  ",
            })
            .collect();
        lines.push(format!("|{cells}"));
    }
    lines.push(format!("0%  +{axis}"));
    let initials: String = (1..=points.len())
        .filter_map(|month| NaiveDate::from_ymd_opt(2000, month as u32, 1))
        .map(|date| format!("{} ", date.format("%b").to_string().chars().next().unwrap_or(' ')))
        .collect();
    lines.push(format!("    {initials}"));
    Some(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kpi_tracker::kpi::{DatasetRepository, KpiId, MeasurementFilter};
    use std::io::Cursor;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 15).expect("valid date")
    }

    fn run_script(state: &TrackerState, script: &str) -> String {
        let mut output = Vec::new();
        Console::new(state.clone(), Cursor::new(script.to_string()), &mut output, today())
            .run()
            .expect("console runs");
        String::from_utf8(output).expect("utf-8 output")
    }

    fn open_state() -> (tempfile::TempDir, TrackerState) {
        let dir = tempfile::tempdir().expect("temp dir");
        let state = TrackerState::open(dir.path()).expect("state opens");
        (dir, state)
    }

    #[test]
    fn records_values_and_saves_workbook() {
        let (_dir, state) = open_state();
        // role 1, default year, February, KPI 1 = 2 days with a note, skip the rest
        let output = run_script(&state, "1\n1\n\n2\n2\nquiet month\n\n\n\n5\n");

        assert!(output.contains("=== Entering KPI values for Support Agent - February 2025 ==="));
        assert!(output.contains("Enter value (days) or press Enter to skip: "));
        assert!(output.contains("Saved measurement: 2.00 days"));

        let period = Period::new(2025, 2).expect("valid period");
        let stored = state
            .tracker
            .find_measurement(KpiId(1), period)
            .expect("lock healthy")
            .expect("measurement stored");
        assert_eq!(stored.notes, "quiet month");

        let saved = state
            .storage
            .workbook()
            .expect("workbook")
            .load()
            .expect("workbook loads");
        assert_eq!(saved.measurements.len(), 1);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let (_dir, state) = open_state();
        // KPI 1 skipped, KPI 2 (%) given 140
        let output = run_script(&state, "1\n1\n2025\n2\n\n140\n\n\n5\n");

        assert!(output.contains("percentage must be between 0 and 100. Skipping."));
        assert!(state
            .tracker
            .measurements(MeasurementFilter::default())
            .expect("lock healthy")
            .is_empty());
    }

    #[test]
    fn invalid_choices_return_to_menu_and_eof_exits() {
        let (_dir, state) = open_state();
        let output = run_script(&state, "9\n2\n7\n");

        assert!(output.contains("Invalid choice '9'"));
        assert!(output.contains("Invalid choice."));
        assert_eq!(output.matches("=== KPI Tracker ===").count(), 3);
    }

    #[test]
    fn monthly_report_is_written_to_reports_dir() {
        let (_dir, state) = open_state();
        let output = run_script(&state, "3\n1\n2025\n1\n1\n5\n");

        assert!(output.contains("Generating report for January 2025..."));
        let path = state
            .storage
            .reports_dir()
            .expect("reports dir")
            .join("Monthly_Report_Jan2025.txt");
        assert!(path.is_file(), "missing {}", path.display());
    }

    #[test]
    fn year_to_date_stops_at_current_month() {
        let (_dir, state) = open_state();
        state
            .tracker
            .upsert_measurement(MeasurementInput {
                kpi_id: KpiId(1),
                metric_value: 6.0,
                unit: "days".to_string(),
                period: Period::new(2025, 2).expect("valid period"),
                notes: String::new(),
            })
            .expect("stored");

        let output = run_script(&state, "2\n3\n2025\n\n5\n");

        assert!(output.contains("Month          Jan     Feb     Mar     Average"));
        assert!(output.contains("Score (%)      -       50.00   -       50.00"));
        assert!(!output.contains("Apr"));
    }

    #[test]
    fn chart_scales_to_largest_point() {
        let lines = ascii_chart(&[50.0, 100.0, 0.0]).expect("chart drawn");
        assert_eq!(lines[0], "100% +------");
        assert_eq!(lines[1], "|  *   ");
        assert_eq!(lines[CHART_HEIGHT], "|* *   ");
        assert_eq!(lines[CHART_HEIGHT + 2], "    J F M ");
        assert!(ascii_chart(&[0.0, 0.0]).is_none());
    }
}
