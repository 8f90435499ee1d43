use chrono::{Local, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::{seed_dataset, DatasetRepository, PersistenceError};
use crate::kpi::domain::{
    ComparisonOperator, Dataset, Kpi, KpiId, Measurement, MeasurementId, Period, Role, RoleId,
};

/// Directory holding the sheets, relative to the database path.
pub const WORKBOOK_DIR: &str = "kpi_database";
/// Directory receiving a copy of the workbook before each save.
pub const BACKUP_DIR: &str = "excel_backups";

const ROLES_SHEET: &str = "roles.csv";
const KPIS_SHEET: &str = "kpis.csv";
const MEASUREMENTS_SHEET: &str = "measurements.csv";
const SHEETS: [&str; 3] = [ROLES_SHEET, KPIS_SHEET, MEASUREMENTS_SHEET];

const ROLE_HEADERS: &[&str] = &["ID", "Name", "Description"];
const KPI_HEADERS: &[&str] = &[
    "ID",
    "RoleID",
    "Category",
    "Name",
    "Description",
    "Metric",
    "Unit",
    "Target",
    "TargetValue",
    "Operator",
    "Weight",
];
const MEASUREMENT_HEADERS: &[&str] = &[
    "ID",
    "KPIID",
    "MetricValue",
    "Unit",
    "Period",
    "Notes",
    "CreatedAt",
];

const CREATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Spreadsheet-style storage: one CSV sheet per collection under
/// `<database_path>/kpi_database/`.
#[derive(Debug, Clone)]
pub struct CsvWorkbook {
    database_path: PathBuf,
}

impl CsvWorkbook {
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
        }
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn workbook_path(&self) -> PathBuf {
        self.database_path.join(WORKBOOK_DIR)
    }

    pub fn exists(&self) -> bool {
        self.workbook_path().join(ROLES_SHEET).is_file()
    }

    /// Load the workbook, or write and return the seed dataset when none exists.
    pub fn load_or_seed(&self) -> Result<Dataset, PersistenceError> {
        if self.exists() {
            return self.load();
        }
        info!(path = %self.workbook_path().display(), "workbook not found, creating seed data");
        let dataset = seed_dataset();
        self.save(&dataset)?;
        Ok(dataset)
    }

    /// Copy every sheet of `self` into the workbook at `target`.
    pub fn copy_to(&self, target: &CsvWorkbook) -> Result<(), PersistenceError> {
        copy_sheets(&self.workbook_path(), &target.workbook_path())
    }

    fn backup(&self) -> Result<Option<PathBuf>, PersistenceError> {
        if !self.exists() {
            return Ok(None);
        }
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let target = self
            .database_path
            .join(BACKUP_DIR)
            .join(format!("kpi_database_backup_{stamp}"));
        copy_sheets(&self.workbook_path(), &target)?;
        Ok(Some(target))
    }

    fn sheet(&self, name: &str) -> PathBuf {
        self.workbook_path().join(name)
    }
}

impl DatasetRepository for CsvWorkbook {
    fn load(&self) -> Result<Dataset, PersistenceError> {
        if !self.exists() {
            return Err(PersistenceError::Missing(
                self.workbook_path().display().to_string(),
            ));
        }

        let now = Local::now().naive_local();
        let dataset = Dataset {
            roles: read_sheet(fs::File::open(self.sheet(ROLES_SHEET))?, RoleRow::into_role)?,
            kpis: read_sheet(fs::File::open(self.sheet(KPIS_SHEET))?, KpiRow::into_kpi)?,
            measurements: read_sheet(fs::File::open(self.sheet(MEASUREMENTS_SHEET))?, |row| {
                MeasurementRow::into_measurement(row, now)
            })?,
        };

        info!(
            roles = dataset.roles.len(),
            kpis = dataset.kpis.len(),
            measurements = dataset.measurements.len(),
            "workbook loaded"
        );
        Ok(dataset)
    }

    fn save(&self, dataset: &Dataset) -> Result<(), PersistenceError> {
        let directory = self.workbook_path();
        fs::create_dir_all(&directory)?;
        if let Some(backup) = self.backup()? {
            info!(path = %backup.display(), "workbook backed up");
        }

        write_sheet(
            &self.sheet(ROLES_SHEET),
            ROLE_HEADERS,
            dataset.roles.iter().map(RoleRow::from),
        )?;
        write_sheet(
            &self.sheet(KPIS_SHEET),
            KPI_HEADERS,
            dataset.kpis.iter().map(KpiRow::from),
        )?;
        write_sheet(
            &self.sheet(MEASUREMENTS_SHEET),
            MEASUREMENT_HEADERS,
            dataset.measurements.iter().map(MeasurementRow::from),
        )?;

        info!(
            path = %directory.display(),
            measurements = dataset.measurements.len(),
            "workbook saved"
        );
        Ok(())
    }
}

fn copy_sheets(from: &Path, to: &Path) -> Result<(), PersistenceError> {
    fs::create_dir_all(to)?;
    for sheet in SHEETS {
        let source = from.join(sheet);
        if source.is_file() {
            fs::copy(&source, to.join(sheet))?;
        }
    }
    Ok(())
}

/// Deserialize every row of a sheet, skipping rows that cannot be converted.
fn read_sheet<R, Row, T>(
    reader: R,
    convert: impl Fn(Row) -> Result<T, String>,
) -> Result<Vec<T>, PersistenceError>
where
    R: Read,
    Row: DeserializeOwned,
{
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let mut records = Vec::new();

    for (index, record) in csv_reader.deserialize::<Row>().enumerate() {
        let row = match record {
            Ok(row) => row,
            Err(err) if err.is_io_error() => return Err(err.into()),
            Err(err) => {
                warn!(row = index + 2, error = %err, "skipping unreadable row");
                continue;
            }
        };
        match convert(row) {
            Ok(value) => records.push(value),
            Err(reason) => warn!(row = index + 2, %reason, "skipping invalid row"),
        }
    }

    Ok(records)
}

/// Write a sheet to a uniquely named temporary file beside `path` and move
/// it into place.
///
/// Headers are written explicitly so empty collections still produce a
/// readable sheet.
fn write_sheet<Row: Serialize>(
    path: &Path,
    headers: &[&str],
    rows: impl Iterator<Item = Row>,
) -> Result<(), PersistenceError> {
    let directory = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = tempfile::Builder::new()
        .prefix(".sheet-")
        .suffix(".csv.tmp")
        .tempfile_in(directory)?;
    {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(temp.as_file_mut());
        writer.write_record(headers)?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
    }
    temp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

fn parse_id(raw: &str, column: &str) -> Result<u32, String> {
    match raw.parse::<u32>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(format!("{column} '{raw}' is not a positive integer")),
    }
}

fn parse_number_or_zero(raw: &str) -> f64 {
    raw.parse().unwrap_or(0.0)
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.unwrap_or_default())
}

#[derive(Debug, Serialize, Deserialize)]
struct RoleRow {
    #[serde(rename = "ID", default, deserialize_with = "lenient_string")]
    id: String,
    #[serde(rename = "Name", default, deserialize_with = "lenient_string")]
    name: String,
    #[serde(rename = "Description", default, deserialize_with = "lenient_string")]
    description: String,
}

impl RoleRow {
    fn into_role(self) -> Result<Role, String> {
        Ok(Role {
            id: RoleId(parse_id(&self.id, "ID")?),
            name: self.name,
            description: self.description,
        })
    }
}

impl From<&Role> for RoleRow {
    fn from(role: &Role) -> Self {
        Self {
            id: role.id.to_string(),
            name: role.name.clone(),
            description: role.description.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct KpiRow {
    #[serde(rename = "ID", default, deserialize_with = "lenient_string")]
    id: String,
    #[serde(rename = "RoleID", default, deserialize_with = "lenient_string")]
    role_id: String,
    #[serde(rename = "Category", default, deserialize_with = "lenient_string")]
    category: String,
    #[serde(rename = "Name", default, deserialize_with = "lenient_string")]
    name: String,
    #[serde(rename = "Description", default, deserialize_with = "lenient_string")]
    description: String,
    #[serde(rename = "Metric", default, deserialize_with = "lenient_string")]
    metric: String,
    #[serde(rename = "Unit", default, deserialize_with = "lenient_string")]
    unit: String,
    #[serde(rename = "Target", default, deserialize_with = "lenient_string")]
    target: String,
    #[serde(rename = "TargetValue", default, deserialize_with = "lenient_string")]
    target_value: String,
    #[serde(rename = "Operator", default, deserialize_with = "lenient_string")]
    operator: String,
    #[serde(rename = "Weight", default, deserialize_with = "lenient_string")]
    weight: String,
}

impl KpiRow {
    fn into_kpi(self) -> Result<Kpi, String> {
        Ok(Kpi {
            id: KpiId(parse_id(&self.id, "ID")?),
            role_id: RoleId(parse_id(&self.role_id, "RoleID")?),
            category: self.category.parse()?,
            name: self.name,
            description: self.description,
            metric: self.metric,
            unit: self.unit,
            target: self.target,
            target_value: parse_number_or_zero(&self.target_value),
            operator: ComparisonOperator::parse(&self.operator),
            weight: parse_number_or_zero(&self.weight),
        })
    }
}

impl From<&Kpi> for KpiRow {
    fn from(kpi: &Kpi) -> Self {
        Self {
            id: kpi.id.to_string(),
            role_id: kpi.role_id.to_string(),
            category: kpi.category.label().to_string(),
            name: kpi.name.clone(),
            description: kpi.description.clone(),
            metric: kpi.metric.clone(),
            unit: kpi.unit.clone(),
            target: kpi.target.clone(),
            target_value: kpi.target_value.to_string(),
            operator: kpi.operator.symbol().to_string(),
            weight: kpi.weight.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct MeasurementRow {
    #[serde(rename = "ID", default, deserialize_with = "lenient_string")]
    id: String,
    #[serde(rename = "KPIID", default, deserialize_with = "lenient_string")]
    kpi_id: String,
    #[serde(rename = "MetricValue", default, deserialize_with = "lenient_string")]
    metric_value: String,
    #[serde(rename = "Unit", default, deserialize_with = "lenient_string")]
    unit: String,
    #[serde(rename = "Period", default, deserialize_with = "lenient_string")]
    period: String,
    #[serde(rename = "Notes", default, deserialize_with = "lenient_string")]
    notes: String,
    #[serde(rename = "CreatedAt", default, deserialize_with = "lenient_string")]
    created_at: String,
}

impl MeasurementRow {
    fn into_measurement(self, now: NaiveDateTime) -> Result<Measurement, String> {
        let metric_value = self
            .metric_value
            .parse::<f64>()
            .map_err(|_| format!("MetricValue '{}' is not a number", self.metric_value))?;
        let period = self.period.parse::<Period>()?;
        let created_at =
            NaiveDateTime::parse_from_str(&self.created_at, CREATED_AT_FORMAT).unwrap_or(now);

        Ok(Measurement {
            id: MeasurementId(parse_id(&self.id, "ID")?),
            kpi_id: KpiId(parse_id(&self.kpi_id, "KPIID")?),
            metric_value,
            unit: self.unit,
            period,
            notes: self.notes,
            created_at,
        })
    }
}

impl From<&Measurement> for MeasurementRow {
    fn from(measurement: &Measurement) -> Self {
        Self {
            id: measurement.id.to_string(),
            kpi_id: measurement.kpi_id.to_string(),
            metric_value: measurement.metric_value.to_string(),
            unit: measurement.unit.clone(),
            period: measurement.period.first_day().format("%Y-%m-%d").to_string(),
            notes: measurement.notes.clone(),
            created_at: measurement.created_at.format(CREATED_AT_FORMAT).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kpi::domain::KpiCategory;
    use chrono::NaiveDate;

    fn timestamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 2, 10)
            .and_then(|date| date.and_hms_opt(9, 30, 0))
            .expect("valid timestamp")
    }

    fn dataset_with_measurement() -> Dataset {
        let mut dataset = seed_dataset();
        dataset.measurements.push(Measurement {
            id: MeasurementId(1),
            kpi_id: KpiId(1),
            metric_value: 2.5,
            unit: "days".to_string(),
            period: Period::new(2025, 2).expect("valid period"),
            notes: "quiet, month".to_string(),
            created_at: timestamp(),
        });
        dataset
    }

    #[test]
    fn save_then_load_preserves_dataset() {
        let dir = tempfile::tempdir().expect("temp dir");
        let workbook = CsvWorkbook::new(dir.path());
        let dataset = dataset_with_measurement();

        workbook.save(&dataset).expect("workbook saves");
        let loaded = workbook.load().expect("workbook loads");

        assert_eq!(loaded, dataset);
    }

    #[test]
    fn load_or_seed_creates_missing_workbook() {
        let dir = tempfile::tempdir().expect("temp dir");
        let workbook = CsvWorkbook::new(dir.path());
        assert!(!workbook.exists());

        let dataset = workbook.load_or_seed().expect("seed created");

        assert_eq!(dataset, seed_dataset());
        assert!(workbook.exists());
        assert!(!dir.path().join(BACKUP_DIR).exists());
    }

    #[test]
    fn save_backs_up_previous_workbook() {
        let dir = tempfile::tempdir().expect("temp dir");
        let workbook = CsvWorkbook::new(dir.path());
        workbook.save(&seed_dataset()).expect("first save");
        workbook
            .save(&dataset_with_measurement())
            .expect("second save");

        let backups: Vec<_> = fs::read_dir(dir.path().join(BACKUP_DIR))
            .expect("backup dir exists")
            .filter_map(Result::ok)
            .collect();
        assert_eq!(backups.len(), 1);
        let backup = backups[0].path();
        assert!(backup
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with("kpi_database_backup_")));
        let backed_up = fs::read_to_string(backup.join(MEASUREMENTS_SHEET)).expect("sheet copied");
        assert_eq!(backed_up.lines().count(), 1, "backup holds the empty sheet");
    }

    #[test]
    fn load_skips_malformed_rows() {
        let dir = tempfile::tempdir().expect("temp dir");
        let sheets = dir.path().join(WORKBOOK_DIR);
        fs::create_dir_all(&sheets).expect("sheet dir");
        fs::write(
            sheets.join(ROLES_SHEET),
            "ID,Name,Description\n1,Support Agent,Tickets\nabc,Broken,Row\n",
        )
        .expect("roles written");
        fs::write(
            sheets.join(KPIS_SHEET),
            "ID,RoleID,Category,Name,Description,Metric,Unit,Target,TargetValue,Operator,Weight\n\
             1,1,Quantitative,Resolution,,,days,≤ 3,3,≤,n/a\n\
             2,1,Unknown,Bad,,,days,,3,≤,30\n",
        )
        .expect("kpis written");
        fs::write(
            sheets.join(MEASUREMENTS_SHEET),
            "ID,KPIID,MetricValue,Unit,Period,Notes,CreatedAt\n\
             1,1,2,days,2025-02-01,,not a date\n\
             2,1,oops,days,2025-03-01,,\n\
             3,1,4,days,March,,\n",
        )
        .expect("measurements written");

        let dataset = CsvWorkbook::new(dir.path()).load().expect("workbook loads");

        assert_eq!(dataset.roles.len(), 1);
        assert_eq!(dataset.kpis.len(), 1);
        assert_eq!(dataset.kpis[0].category, KpiCategory::Quantitative);
        assert_eq!(dataset.kpis[0].weight, 0.0);
        assert_eq!(dataset.measurements.len(), 1);
        assert_eq!(dataset.measurements[0].period, Period::new(2025, 2).expect("period"));
    }

    #[test]
    fn load_reports_missing_workbook() {
        let dir = tempfile::tempdir().expect("temp dir");
        let result = CsvWorkbook::new(dir.path()).load();
        assert!(matches!(result, Err(PersistenceError::Missing(_))));
    }
}
