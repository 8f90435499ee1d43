//! Text, CSV, HTML, and JSON renderings of a [`Report`].

use std::fmt::{self, Write as _};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::aggregate::{KpiSeries, Report, RoleReport};
use super::domain::KpiCategory;

const RULE: &str = "----------------------------------------";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Json,
    #[serde(alias = "text")]
    Txt,
    Csv,
    Html,
}

impl ReportFormat {
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Txt => "txt",
            Self::Csv => "csv",
            Self::Html => "html",
        }
    }

    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Txt => "text/plain; charset=utf-8",
            Self::Csv => "text/csv; charset=utf-8",
            Self::Html => "text/html; charset=utf-8",
        }
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "txt" | "text" => Ok(Self::Txt),
            "csv" => Ok(Self::Csv),
            "html" => Ok(Self::Html),
            other => Err(format!("unsupported report format '{other}'")),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("report formatting failed")]
    Format(#[from] fmt::Error),
    #[error("csv rendering failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("json rendering failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("report io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv output was not valid utf-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

pub fn render(report: &Report, format: ReportFormat) -> Result<String, RenderError> {
    match format {
        ReportFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        ReportFormat::Txt => Ok(render_text(report)?),
        ReportFormat::Csv => render_csv(report),
        ReportFormat::Html => Ok(render_html(report)?),
    }
}

/// Render `report` and write it to `<dir>/<file stem>.<extension>`.
pub fn write_report(
    report: &Report,
    format: ReportFormat,
    dir: &Path,
) -> Result<PathBuf, RenderError> {
    let body = render(report, format)?;
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.{}", report.range.file_stem(), format.extension()));
    fs::write(&path, body)?;
    info!(path = %path.display(), %format, "report written");
    Ok(path)
}

fn percent(value: f64) -> String {
    format!("{value:.2}%")
}

fn category_heading(role: &RoleReport, category: KpiCategory) -> String {
    format!(
        "{} KPIs ({:.0}% Weight)",
        category.label(),
        role.category_weight(category)
    )
}

fn render_text(report: &Report) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(out, "KPI REPORT: {}", report.title)?;
    writeln!(out, "==========================================")?;
    writeln!(out)?;
    writeln!(
        out,
        "Generated: {}",
        report.generated_at.format("%Y-%m-%d %H:%M:%S")
    )?;
    writeln!(out)?;

    for role in &report.roles {
        writeln!(out, "ROLE: {}", role.role.name)?;
        writeln!(out, "{RULE}")?;
        writeln!(out)?;

        if role.kpis.is_empty() {
            writeln!(out, "No KPIs defined.")?;
            writeln!(out)?;
            continue;
        }

        for category in KpiCategory::ordered() {
            writeln!(
                out,
                "{} KPIs ({:.0}% Weight)",
                category.label().to_uppercase(),
                role.category_weight(category)
            )?;
            writeln!(out, "{RULE}")?;
            for series in role.series_in(category) {
                text_series(&mut out, series)?;
            }
        }

        writeln!(out, "OVERALL SCORES")?;
        writeln!(out, "{RULE}")?;
        for point in role.overall.iter().filter(|point| point.score > 0.0) {
            writeln!(
                out,
                "  {}: {}",
                point.period.short_label(),
                percent(point.score)
            )?;
        }
        if let Some(average) = role.average_score() {
            writeln!(out, "  Average: {}", percent(average))?;
        }
        writeln!(out)?;
    }

    Ok(out)
}

fn text_series(out: &mut String, series: &KpiSeries) -> fmt::Result {
    let kpi = &series.kpi;
    writeln!(out, "KPI: {}", kpi.name)?;
    writeln!(out, "Metric: {}", kpi.metric)?;
    writeln!(out, "Target: {} (Weight: {:.1}%)", kpi.target, kpi.weight)?;
    for point in &series.points {
        if let (Some(measurement), Some(achievement)) = (&point.measurement, point.achievement) {
            writeln!(
                out,
                "  {}: {:.2} {} ({})",
                point.period.short_label(),
                measurement.metric_value,
                measurement.unit,
                percent(achievement)
            )?;
        }
    }
    writeln!(out)
}

fn render_csv(report: &Report) -> Result<String, RenderError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec![
        "Role".to_string(),
        "KPI".to_string(),
        "Category".to_string(),
        "Weight".to_string(),
        "Target".to_string(),
    ];
    header.extend(report.months.iter().map(|period| period.short_label()));
    writer.write_record(&header)?;

    for role in &report.roles {
        for series in &role.kpis {
            let mut record = vec![
                role.role.name.clone(),
                series.kpi.name.clone(),
                series.kpi.category.label().to_string(),
                format!("{:.1}%", series.kpi.weight),
                series.kpi.target.clone(),
            ];
            record.extend(
                series
                    .points
                    .iter()
                    .map(|point| point.achievement.map(percent).unwrap_or_default()),
            );
            writer.write_record(&record)?;
        }

        let mut overall = vec![
            role.role.name.clone(),
            "OVERALL SCORE".to_string(),
            String::new(),
            String::new(),
            String::new(),
        ];
        overall.extend(role.overall.iter().map(|point| {
            if point.score > 0.0 {
                percent(point.score)
            } else {
                String::new()
            }
        }));
        writer.write_record(&overall)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| RenderError::Io(err.into_error()))?;
    Ok(String::from_utf8(bytes)?)
}

fn score_class(value: f64) -> &'static str {
    if value >= 90.0 {
        "good"
    } else if value >= 70.0 {
        "warning"
    } else {
        "bad"
    }
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

const HTML_HEAD: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="UTF-8">
  <title>KPI Report</title>
  <style>
    body { font-family: Arial, sans-serif; margin: 20px; }
    h1, h2, h3 { color: #333; }
    table { border-collapse: collapse; width: 100%; margin-bottom: 20px; }
    th, td { border: 1px solid #ddd; padding: 8px; text-align: left; }
    th { background-color: #f2f2f2; }
    tr:nth-child(even) { background-color: #f9f9f9; }
    .good { color: green; }
    .warning { color: orange; }
    .bad { color: red; }
  </style>
</head>
<body>
"#;

fn render_html(report: &Report) -> Result<String, fmt::Error> {
    let mut out = String::from(HTML_HEAD);
    writeln!(out, "  <h1>KPI Report</h1>")?;
    writeln!(out, "  <p>Period: {}</p>", escape_html(&report.title))?;
    writeln!(
        out,
        "  <p>Generated: {}</p>",
        report.generated_at.format("%Y-%m-%d %H:%M:%S")
    )?;

    for role in &report.roles {
        writeln!(out, "  <h2>{}</h2>", escape_html(&role.role.name))?;
        if role.kpis.is_empty() {
            writeln!(out, "  <p>No KPIs defined.</p>")?;
            continue;
        }

        for category in KpiCategory::ordered() {
            writeln!(out, "  <h3>{}</h3>", category_heading(role, category))?;
            write!(out, "  <table><tr><th>KPI</th><th>Target</th><th>Weight</th>")?;
            for period in &report.months {
                write!(out, "<th>{}</th>", period.short_label())?;
            }
            writeln!(out, "</tr>")?;

            for series in role.series_in(category) {
                write!(
                    out,
                    "  <tr><td>{}</td><td>{}</td><td>{:.1}%</td>",
                    escape_html(&series.kpi.name),
                    escape_html(&series.kpi.target),
                    series.kpi.weight
                )?;
                for point in &series.points {
                    match point.achievement {
                        Some(value) => write!(
                            out,
                            "<td class=\"{}\">{}</td>",
                            score_class(value),
                            percent(value)
                        )?,
                        None => write!(out, "<td>-</td>")?,
                    }
                }
                writeln!(out, "</tr>")?;
            }
            writeln!(out, "  </table>")?;
        }

        writeln!(out, "  <h3>Overall Scores</h3>")?;
        writeln!(out, "  <table><tr><th>Period</th><th>Score</th></tr>")?;
        for point in role.overall.iter().filter(|point| point.score > 0.0) {
            writeln!(
                out,
                "  <tr><td>{}</td><td class=\"{}\">{}</td></tr>",
                point.period.short_label(),
                score_class(point.score),
                percent(point.score)
            )?;
        }
        writeln!(out, "  </table>")?;
    }

    out.push_str("</body>\n</html>\n");
    Ok(out)
}
