use crate::error::Result;
use crate::models::{Dataset, Value};

const UNKNOWN: &str = "Unknown";

const TEXT_DEFAULTS: &[&str] = &[
    "Customer_Name",
    "Customer_Address",
    "Customer_City",
    "Customer_State",
    "Customer_Country",
    "Company",
    "Job_Title",
    "Email",
    "Phone_Number",
    "IBAN",
    "Currency_Code",
    "Category",
    "Group",
    "Is_Active",
    "Description",
    "Gender",
    "Marital_Status",
    "Transaction_Type",
];

/// Null substitutions applied column by column, then the columns a row may not
/// lack.
#[derive(Debug, Clone)]
pub struct CleaningPolicy {
    pub defaults: Vec<(String, Value)>,
    pub required: Vec<String>,
}

impl CleaningPolicy {
    pub fn nuga_bank() -> Self {
        let mut defaults: Vec<(String, Value)> = TEXT_DEFAULTS
            .iter()
            .map(|c| (c.to_string(), Value::Text(UNKNOWN.to_string())))
            .collect();
        defaults.push(("Credit_Card_Number".to_string(), Value::Text("0".to_string())));
        defaults.push(("Random_Number".to_string(), Value::Float(0.0)));
        defaults.push(("Amount".to_string(), Value::Float(0.0)));
        Self {
            defaults,
            required: vec!["Last_Updated".to_string(), "Transaction_Date".to_string()],
        }
    }
}

#[derive(Debug, Default)]
pub struct CleanReport {
    pub rows_in: usize,
    pub rows_dropped: usize,
    /// (column, nulls replaced), only columns where something was filled.
    pub filled: Vec<(String, usize)>,
}

/// Fill defaults, then drop rows missing a required column. Every column the
/// policy names must exist in the dataset.
pub fn clean(mut dataset: Dataset, policy: &CleaningPolicy) -> Result<(Dataset, CleanReport)> {
    let fill: Vec<(usize, &Value)> = policy
        .defaults
        .iter()
        .map(|(col, default)| dataset.require_column(col).map(|idx| (idx, default)))
        .collect::<Result<_>>()?;
    let required: Vec<usize> = policy
        .required
        .iter()
        .map(|col| dataset.require_column(col))
        .collect::<Result<_>>()?;

    let mut counts = vec![0usize; fill.len()];
    for row in &mut dataset.rows {
        for (n, (idx, default)) in fill.iter().enumerate() {
            if row[*idx].is_null() {
                row[*idx] = Value::clone(default);
                counts[n] += 1;
            }
        }
    }

    let rows_in = dataset.rows.len();
    dataset
        .rows
        .retain(|row| required.iter().all(|&idx| !row[idx].is_null()));
    let rows_dropped = rows_in - dataset.rows.len();

    let filled = policy
        .defaults
        .iter()
        .zip(counts)
        .filter(|(_, n)| *n > 0)
        .map(|((col, _), n)| (col.clone(), n))
        .collect::<Vec<_>>();

    for (col, n) in &filled {
        tracing::debug!(column = %col, filled = n, "nulls replaced with default");
    }
    tracing::info!(
        rows_in,
        rows_dropped,
        rows_out = dataset.rows.len(),
        "dataset cleaned"
    );

    Ok((
        dataset,
        CleanReport {
            rows_in,
            rows_dropped,
            filled,
        },
    ))
}
