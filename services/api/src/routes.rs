use crate::infra::{AppState, TrackerState};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Extension, Json, Router};
use chrono::{Datelike, Local};
use kpi_tracker::error::AppError;
use kpi_tracker::kpi::domain::ensure_supported_year;
use kpi_tracker::kpi::{
    render, Kpi, KpiId, Measurement, MeasurementFilter, MeasurementId, MeasurementInput,
    MonthlyTrend, Period, Report, ReportFormat, ReportRange, Role, RoleId, RoleOverview, Settings,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::Ordering;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub(crate) fn router(state: TrackerState, app_state: AppState) -> Router {
    let api = Router::new()
        .route("/roles", get(list_roles))
        .route("/roles/:id", get(get_role))
        .route("/roles/:id/kpis", get(role_kpis))
        .route("/kpis", get(list_kpis))
        .route("/kpis/:id", get(get_kpi))
        .route("/kpis/:id/measurements", get(kpi_measurements))
        .route(
            "/measurements",
            get(list_measurements).post(create_measurement),
        )
        .route("/measurements/:id", put(update_measurement))
        .route("/reports/monthly/:year/:month", get(monthly_report))
        .route("/reports/quarterly/:year/:quarter", get(quarterly_report))
        .route("/reports/yearly/:year", get(yearly_report))
        .route("/reports/custom", post(custom_report))
        .route("/dashboard/overview", get(dashboard_overview))
        .route("/dashboard/trends", get(dashboard_trends))
        .route("/settings", get(get_settings).put(update_settings))
        .route("/settings/reload", post(reload_workbook))
        .route("/settings/save", post(save_workbook))
        .with_state(state);

    Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .nest("/api/v1", api)
        .layer(Extension(app_state))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn list_roles(
    State(state): State<TrackerState>,
) -> Result<Json<Vec<Role>>, AppError> {
    Ok(Json(state.tracker.list_roles()?))
}

pub(crate) async fn get_role(
    State(state): State<TrackerState>,
    Path(id): Path<u32>,
) -> Result<Json<Role>, AppError> {
    Ok(Json(state.tracker.find_role(RoleId(id))?))
}

pub(crate) async fn role_kpis(
    State(state): State<TrackerState>,
    Path(id): Path<u32>,
) -> Result<Json<Vec<Kpi>>, AppError> {
    Ok(Json(state.tracker.kpis_for_role(RoleId(id))?))
}

pub(crate) async fn list_kpis(State(state): State<TrackerState>) -> Result<Json<Vec<Kpi>>, AppError> {
    Ok(Json(state.tracker.list_kpis()?))
}

pub(crate) async fn get_kpi(
    State(state): State<TrackerState>,
    Path(id): Path<u32>,
) -> Result<Json<Kpi>, AppError> {
    Ok(Json(state.tracker.find_kpi(KpiId(id))?))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct MeasurementQuery {
    #[serde(default)]
    pub(crate) kpi_id: Option<u32>,
    #[serde(default)]
    pub(crate) year: Option<i32>,
    #[serde(default)]
    pub(crate) month: Option<u32>,
}

impl MeasurementQuery {
    fn into_filter(self) -> Result<MeasurementFilter, AppError> {
        if let Some(month) = self.month {
            if !(1..=12).contains(&month) {
                return Err(AppError::BadRequest(format!(
                    "month must be between 1 and 12, got {month}"
                )));
            }
        }
        Ok(MeasurementFilter {
            kpi_id: self.kpi_id.map(KpiId),
            year: self.year,
            month: self.month,
        })
    }
}

pub(crate) async fn kpi_measurements(
    State(state): State<TrackerState>,
    Path(id): Path<u32>,
    Query(query): Query<MeasurementQuery>,
) -> Result<Json<Vec<Measurement>>, AppError> {
    let kpi = state.tracker.find_kpi(KpiId(id))?;
    let filter = MeasurementQuery {
        kpi_id: Some(kpi.id.0),
        ..query
    }
    .into_filter()?;
    Ok(Json(state.tracker.measurements(filter)?))
}

pub(crate) async fn list_measurements(
    State(state): State<TrackerState>,
    Query(query): Query<MeasurementQuery>,
) -> Result<Json<Vec<Measurement>>, AppError> {
    Ok(Json(state.tracker.measurements(query.into_filter()?)?))
}

pub(crate) async fn create_measurement(
    State(state): State<TrackerState>,
    Json(input): Json<MeasurementInput>,
) -> Result<Response, AppError> {
    ensure_supported_year(input.period.year())?;
    let outcome = state.tracker.record_measurement(input)?;
    persist(&state).await;

    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome.measurement)).into_response())
}

#[derive(Debug, Deserialize)]
pub(crate) struct MeasurementUpdate {
    pub(crate) metric_value: f64,
    #[serde(default)]
    pub(crate) notes: String,
}

pub(crate) async fn update_measurement(
    State(state): State<TrackerState>,
    Path(id): Path<u32>,
    Json(update): Json<MeasurementUpdate>,
) -> Result<Json<Measurement>, AppError> {
    let measurement = state
        .tracker
        .update_measurement(MeasurementId(id), update.metric_value, update.notes)?;
    persist(&state).await;
    Ok(Json(measurement))
}

/// Save after a write. The in-memory change stands even when the save fails;
/// the next save (or the one at shutdown) picks it up.
async fn persist(state: &TrackerState) {
    if let Err(err) = state.save_in_background().await {
        warn!(error = %err, "workbook save after write failed");
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct FormatQuery {
    #[serde(default)]
    pub(crate) format: Option<String>,
}

impl FormatQuery {
    fn format(&self) -> Result<ReportFormat, AppError> {
        match self.format.as_deref() {
            None => Ok(ReportFormat::Json),
            Some(raw) => raw.parse().map_err(AppError::BadRequest),
        }
    }
}

fn report_response(report: Report, format: ReportFormat) -> Result<Response, AppError> {
    if format == ReportFormat::Json {
        return Ok(Json(report).into_response());
    }
    let body = render(&report, format)?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, format.content_type())],
        body,
    )
        .into_response())
}

fn build_report(
    state: &TrackerState,
    range: ReportRange,
    role_ids: Option<&[RoleId]>,
) -> Result<Report, AppError> {
    let (start, end) = range.bounds()?;
    ensure_supported_year(start.year())?;
    ensure_supported_year(end.year())?;
    Ok(state.tracker.report(range, role_ids)?)
}

pub(crate) async fn monthly_report(
    State(state): State<TrackerState>,
    Path((year, month)): Path<(i32, u32)>,
    Query(query): Query<FormatQuery>,
) -> Result<Response, AppError> {
    let format = query.format()?;
    let report = build_report(&state, ReportRange::Monthly { year, month }, None)?;
    report_response(report, format)
}

pub(crate) async fn quarterly_report(
    State(state): State<TrackerState>,
    Path((year, quarter)): Path<(i32, u32)>,
    Query(query): Query<FormatQuery>,
) -> Result<Response, AppError> {
    let format = query.format()?;
    let report = build_report(&state, ReportRange::Quarterly { year, quarter }, None)?;
    report_response(report, format)
}

pub(crate) async fn yearly_report(
    State(state): State<TrackerState>,
    Path(year): Path<i32>,
    Query(query): Query<FormatQuery>,
) -> Result<Response, AppError> {
    let format = query.format()?;
    let report = build_report(&state, ReportRange::Yearly { year }, None)?;
    report_response(report, format)
}

#[derive(Debug, Deserialize)]
pub(crate) struct CustomReportRequest {
    pub(crate) start_period: Period,
    pub(crate) end_period: Period,
    #[serde(default)]
    pub(crate) role_ids: Option<Vec<RoleId>>,
    #[serde(default)]
    pub(crate) format: Option<ReportFormat>,
}

pub(crate) async fn custom_report(
    State(state): State<TrackerState>,
    Json(request): Json<CustomReportRequest>,
) -> Result<Response, AppError> {
    let range = ReportRange::Custom {
        start: request.start_period,
        end: request.end_period,
    };
    let report = build_report(&state, range, request.role_ids.as_deref())?;
    report_response(report, request.format.unwrap_or_default())
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct OverviewQuery {
    #[serde(default)]
    pub(crate) year: Option<i32>,
    #[serde(default)]
    pub(crate) month: Option<u32>,
}

pub(crate) async fn dashboard_overview(
    State(state): State<TrackerState>,
    Query(query): Query<OverviewQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let today = Local::now().date_naive();
    let year = ensure_supported_year(query.year.unwrap_or_else(|| today.year()))?;
    let period = Period::new(year, query.month.unwrap_or_else(|| today.month()))?;
    let roles: Vec<RoleOverview> = state.tracker.dashboard_overview(period)?;
    Ok(Json(json!({
        "period": period,
        "period_label": period.label(),
        "roles": roles,
    })))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TrendsQuery {
    #[serde(default)]
    pub(crate) year: Option<i32>,
}

pub(crate) async fn dashboard_trends(
    State(state): State<TrackerState>,
    Query(query): Query<TrendsQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let year = query.year.unwrap_or_else(|| Local::now().year());
    let months: Vec<MonthlyTrend> = state.tracker.dashboard_trends(year)?;
    Ok(Json(json!({ "year": year, "months": months })))
}

pub(crate) async fn get_settings(
    State(state): State<TrackerState>,
) -> Result<Json<Settings>, AppError> {
    Ok(Json(state.storage.settings()?))
}

#[derive(Debug, Deserialize)]
pub(crate) struct SettingsUpdate {
    pub(crate) database_path: String,
}

pub(crate) async fn update_settings(
    State(state): State<TrackerState>,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<Settings>, AppError> {
    let settings = state.update_database_path(update.database_path).await?;
    info!(database_path = %settings.database_path.display(), "database path updated");
    Ok(Json(settings))
}

pub(crate) async fn reload_workbook(
    State(state): State<TrackerState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let summary = state.reload_in_background().await?;
    Ok(Json(json!({
        "success": true,
        "message": "Data reloaded from workbook",
        "dataset": summary,
    })))
}

pub(crate) async fn save_workbook(
    State(state): State<TrackerState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let summary = state.save_in_background().await?;
    Ok(Json(json!({
        "success": true,
        "message": "Data saved to workbook",
        "dataset": summary,
    })))
}
