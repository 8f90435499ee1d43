use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use super::error::TrackerError;

/// Years accepted from console prompts and HTTP path parameters.
pub const SUPPORTED_YEARS: RangeInclusive<i32> = 2000..=2100;

pub fn ensure_supported_year(year: i32) -> Result<i32, TrackerError> {
    if SUPPORTED_YEARS.contains(&year) {
        Ok(year)
    } else {
        Err(TrackerError::UnsupportedYear(year))
    }
}

macro_rules! numeric_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(RoleId);
numeric_id!(KpiId);
numeric_id!(MeasurementId);

/// Calendar month used as the measurement and reporting granularity.
///
/// Always normalized to the first day of the month so that equality and
/// ordering only ever compare year and month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period(NaiveDate);

impl Period {
    pub fn new(year: i32, month: u32) -> Result<Self, TrackerError> {
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(Self)
            .ok_or(TrackerError::InvalidPeriod { year, month })
    }

    /// The month containing `date`; the day component is dropped.
    pub fn containing(date: NaiveDate) -> Self {
        Self(date - Days::new(u64::from(date.day0())))
    }

    pub fn year(self) -> i32 {
        self.0.year()
    }

    pub fn month(self) -> u32 {
        self.0.month()
    }

    pub fn first_day(self) -> NaiveDate {
        self.0
    }

    pub fn next(self) -> Option<Self> {
        self.0.checked_add_months(Months::new(1)).map(Self)
    }

    /// "January 2025"
    pub fn label(self) -> String {
        self.0.format("%B %Y").to_string()
    }

    /// "Jan 2025"
    pub fn short_label(self) -> String {
        self.0.format("%b %Y").to_string()
    }

    /// "Jan2025", used in report file names.
    pub fn compact_label(self) -> String {
        self.0.format("%b%Y").to_string()
    }

    pub fn month_name(self) -> String {
        self.0.format("%B").to_string()
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

impl FromStr for Period {
    type Err = String;

    /// Accepts `YYYY-MM`, `YYYY-MM-DD`, or an RFC 3339 timestamp.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
            return Ok(Self::containing(date));
        }
        if let Ok(date) = NaiveDate::parse_from_str(&format!("{trimmed}-01"), "%Y-%m-%d") {
            return Ok(Self(date));
        }
        if let Ok(timestamp) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(Self::containing(timestamp.date_naive()));
        }
        Err(format!(
            "failed to parse '{raw}' as a period (expected YYYY-MM or YYYY-MM-DD)"
        ))
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KpiCategory {
    Quantitative,
    Qualitative,
}

impl KpiCategory {
    pub const fn ordered() -> [Self; 2] {
        [Self::Quantitative, Self::Qualitative]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Quantitative => "Quantitative",
            Self::Qualitative => "Qualitative",
        }
    }
}

impl FromStr for KpiCategory {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "quantitative" => Ok(Self::Quantitative),
            "qualitative" => Ok(Self::Qualitative),
            other => Err(format!("unknown KPI category '{other}'")),
        }
    }
}

/// Direction in which a KPI's measured value is compared against its target.
///
/// Operators that are not recognized keep their raw text so they survive a
/// save/load cycle; they are scored as higher-is-better.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ComparisonOperator {
    LessOrEqual,
    GreaterOrEqual,
    Equal,
    Unspecified(String),
}

impl ComparisonOperator {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "≤" | "<=" => Self::LessOrEqual,
            "≥" | ">=" => Self::GreaterOrEqual,
            "=" | "==" => Self::Equal,
            other => Self::Unspecified(other.to_string()),
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            Self::LessOrEqual => "≤",
            Self::GreaterOrEqual => "≥",
            Self::Equal => "=",
            Self::Unspecified(raw) => raw,
        }
    }
}

impl Default for ComparisonOperator {
    fn default() -> Self {
        Self::Unspecified(String::new())
    }
}

impl From<String> for ComparisonOperator {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<ComparisonOperator> for String {
    fn from(value: ComparisonOperator) -> Self {
        value.symbol().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kpi {
    pub id: KpiId,
    pub role_id: RoleId,
    pub category: KpiCategory,
    pub name: String,
    pub description: String,
    pub metric: String,
    pub unit: String,
    /// Human readable target, e.g. "≤ 3 days".
    pub target: String,
    pub target_value: f64,
    #[serde(default)]
    pub operator: ComparisonOperator,
    /// Percentage points contributed to the role score.
    pub weight: f64,
}

impl Kpi {
    /// Range checks applied to values entered through the console or API.
    pub fn validate_value(&self, value: f64) -> Result<(), TrackerError> {
        let reject = |reason| TrackerError::ValueRejected {
            value,
            unit: self.unit.clone(),
            reason,
        };

        if !value.is_finite() {
            return Err(reject("value must be a finite number"));
        }

        match self.unit.as_str() {
            "%" if !(0.0..=100.0).contains(&value) => {
                Err(reject("percentage must be between 0 and 100"))
            }
            "score" if !(0.0..=10.0).contains(&value) => {
                Err(reject("score must be between 0 and 10"))
            }
            "days" if value < 0.0 => Err(reject("days cannot be negative")),
            "%" | "score" | "days" => Ok(()),
            _ if value < 0.0 && !self.metric.to_lowercase().contains("error") => {
                Err(reject("value cannot be negative"))
            }
            _ => Ok(()),
        }
    }

    /// Prompt hint describing the expected input for this KPI's unit.
    pub fn unit_hint(&self) -> &str {
        match self.unit.as_str() {
            "%" => "percentage",
            "score" => "score (0-10)",
            "days" => "days",
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub id: MeasurementId,
    pub kpi_id: KpiId,
    pub metric_value: f64,
    pub unit: String,
    pub period: Period,
    pub notes: String,
    pub created_at: NaiveDateTime,
}

/// Caller-supplied fields for an upsert; identity is `(kpi_id, period)`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MeasurementInput {
    pub kpi_id: KpiId,
    pub metric_value: f64,
    #[serde(default)]
    pub unit: String,
    pub period: Period,
    #[serde(default)]
    pub notes: String,
}

/// The complete in-memory dataset, in load order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub roles: Vec<Role>,
    pub kpis: Vec<Kpi>,
    pub measurements: Vec<Measurement>,
}
