use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{EtlError, Result};
use crate::models::{Dataset, Value};

// ---------------------------------------------------------------------------
// Column declaration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Text,
    Integer,
    Float,
    Date,
    Timestamp,
}

impl ColumnType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Date => "date",
            Self::Timestamp => "timestamp",
        }
    }

    /// Parse a non-empty raw field. `None` means the field does not fit the type.
    pub fn parse(&self, raw: &str) -> Option<Value> {
        match self {
            Self::Text => Some(Value::Text(raw.to_string())),
            Self::Integer => raw.parse().ok().map(Value::Integer),
            // SQLite stores NaN as NULL
            Self::Float => raw
                .parse()
                .ok()
                .filter(|f: &f64| f.is_finite())
                .map(Value::Float),
            Self::Date => parse_date(raw).map(Value::Date),
            Self::Timestamp => parse_timestamp(raw).map(Value::Timestamp),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ColumnType,
}

/// Explicit, versioned description of the input file's columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSchema {
    pub name: String,
    pub version: u32,
    pub columns: Vec<ColumnSpec>,
}

const NUGA_BANK_V1: &[(&str, ColumnType)] = &[
    ("Customer_Name", ColumnType::Text),
    ("Customer_Address", ColumnType::Text),
    ("Customer_City", ColumnType::Text),
    ("Customer_State", ColumnType::Text),
    ("Customer_Country", ColumnType::Text),
    ("Company", ColumnType::Text),
    ("Job_Title", ColumnType::Text),
    ("Email", ColumnType::Text),
    ("Phone_Number", ColumnType::Text),
    ("Credit_Card_Number", ColumnType::Text),
    ("IBAN", ColumnType::Text),
    ("Currency_Code", ColumnType::Text),
    ("Random_Number", ColumnType::Float),
    ("Category", ColumnType::Text),
    ("Group", ColumnType::Text),
    ("Is_Active", ColumnType::Text),
    ("Last_Updated", ColumnType::Timestamp),
    ("Description", ColumnType::Text),
    ("Gender", ColumnType::Text),
    ("Marital_Status", ColumnType::Text),
    ("Transaction_Date", ColumnType::Date),
    ("Amount", ColumnType::Float),
    ("Transaction_Type", ColumnType::Text),
];

impl SourceSchema {
    pub fn nuga_bank_v1() -> Self {
        Self {
            name: "nuga_bank".to_string(),
            version: 1,
            columns: NUGA_BANK_V1
                .iter()
                .map(|(name, kind)| ColumnSpec {
                    name: name.to_string(),
                    kind: *kind,
                })
                .collect(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let schema: Self = serde_json::from_str(&content)?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(EtlError::SourceSchema(format!(
                "{} v{} declares no columns",
                self.name, self.version
            )));
        }
        let mut seen = HashSet::new();
        for col in &self.columns {
            if !seen.insert(col.name.as_str()) {
                return Err(EtlError::SourceSchema(format!(
                    "column {} declared twice",
                    col.name
                )));
            }
        }
        Ok(())
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

// ---------------------------------------------------------------------------
// Value parsing
// ---------------------------------------------------------------------------

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

fn parse_date(raw: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| parse_datetime(raw).map(|dt| dt.date()))
}

fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.naive_utc()))
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    parse_datetime(raw).or_else(|| {
        DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    })
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

pub fn read_csv(path: &Path, schema: &SourceSchema) -> Result<Dataset> {
    let file = std::fs::File::open(path)?;
    let dataset = read_from(std::io::BufReader::new(file), schema)?;
    tracing::info!(
        path = %path.display(),
        rows = dataset.len(),
        schema = %schema.name,
        version = schema.version,
        "source file read"
    );
    Ok(dataset)
}

/// Read CSV with a header row. Columns come out in declaration order; header
/// columns the schema does not declare are ignored.
pub fn read_from<R: Read>(reader: R, schema: &SourceSchema) -> Result<Dataset> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();

    let mut positions = Vec::with_capacity(schema.columns.len());
    let mut missing = Vec::new();
    for col in &schema.columns {
        match headers.iter().position(|h| *h == col.name) {
            Some(pos) => positions.push(pos),
            None => missing.push(col.name.as_str()),
        }
    }
    if !missing.is_empty() {
        return Err(EtlError::SourceSchema(format!(
            "header is missing declared columns: {}",
            missing.join(", ")
        )));
    }
    for extra in headers.iter().filter(|h| !schema.columns.iter().any(|c| &c.name == *h)) {
        tracing::debug!(column = %extra, "ignoring undeclared column");
    }

    let mut dataset = Dataset::new(schema.column_names());
    for (i, result) in rdr.records().enumerate() {
        let record = result?;
        let mut row = Vec::with_capacity(positions.len());
        for (col, &pos) in schema.columns.iter().zip(&positions) {
            let raw = record.get(pos).map(str::trim).unwrap_or("");
            if raw.is_empty() {
                row.push(Value::Null);
                continue;
            }
            let value = col.kind.parse(raw).ok_or_else(|| EtlError::Parse {
                row: i + 1,
                column: col.name.clone(),
                value: raw.to_string(),
                expected: col.kind.label(),
            })?;
            row.push(value);
        }
        dataset.rows.push(row);
    }
    Ok(dataset)
}
