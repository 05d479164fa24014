use std::collections::{HashMap, HashSet};

use crate::error::Result;
use crate::models::{Dataset, KeyValue, NaturalKey, Value};

/// How surrogate keys are handed out.
///
/// `Distinct` groups rows by natural key first and gives each distinct tuple one
/// id. `PerRow` gives every cleaned row its own dimension row, matching the
/// legacy job; duplicate natural keys then fan out in the fact join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyMode {
    #[default]
    Distinct,
    PerRow,
}

#[derive(Debug)]
pub struct DimensionSpec {
    pub table: &'static str,
    pub id_column: &'static str,
    pub source_columns: &'static [&'static str],
}

impl DimensionSpec {
    /// Destination column names, surrogate id first.
    pub fn columns(&self) -> Vec<String> {
        std::iter::once(self.id_column.to_string())
            .chain(self.source_columns.iter().map(|c| c.to_lowercase()))
            .collect()
    }
}

pub const CUSTOMER: DimensionSpec = DimensionSpec {
    table: "customer",
    id_column: "customer_id",
    source_columns: &[
        "Customer_Name",
        "Customer_Address",
        "Customer_City",
        "Customer_State",
        "Customer_Country",
    ],
};

pub const TRANSACTION: DimensionSpec = DimensionSpec {
    table: "transaction",
    id_column: "transaction_id",
    source_columns: &["Transaction_Date", "Amount", "Transaction_Type"],
};

pub const EMPLOYEE: DimensionSpec = DimensionSpec {
    table: "employee",
    id_column: "employee_id",
    source_columns: &[
        "Company",
        "Job_Title",
        "Email",
        "Phone_Number",
        "Gender",
        "Marital_Status",
    ],
};

#[derive(Debug, Clone, PartialEq)]
pub struct DimensionRow {
    pub id: i64,
    pub values: Vec<Value>,
}

#[derive(Debug)]
pub struct DimensionTable {
    pub spec: &'static DimensionSpec,
    pub rows: Vec<DimensionRow>,
}

impl DimensionTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Natural key to every id carrying it. Rows with a null key part are left
    /// out since they can never join.
    pub fn key_index(&self) -> HashMap<NaturalKey, Vec<i64>> {
        let mut index: HashMap<NaturalKey, Vec<i64>> = HashMap::new();
        for row in &self.rows {
            let key: Option<NaturalKey> = row.values.iter().map(Value::key).collect();
            if let Some(key) = key {
                index.entry(key).or_default().push(row.id);
            }
        }
        index
    }

    /// Number of rows whose natural key already appeared earlier in the table.
    pub fn duplicate_keys(&self) -> usize {
        let mut seen = HashSet::new();
        self.rows
            .iter()
            .filter(|r| !seen.insert(r.values.iter().map(Value::key).collect::<Vec<_>>()))
            .count()
    }
}

/// Project `spec`'s columns out of the cleaned dataset and assign ids in row
/// order, starting at 0.
pub fn extract(
    dataset: &Dataset,
    spec: &'static DimensionSpec,
    mode: KeyMode,
) -> Result<DimensionTable> {
    let indices = dataset.require_columns(spec.source_columns)?;
    let mut rows = Vec::new();
    let mut seen: HashSet<Vec<Option<KeyValue>>> = HashSet::new();

    for source in &dataset.rows {
        if mode == KeyMode::Distinct {
            let key = indices.iter().map(|&i| source[i].key()).collect();
            if !seen.insert(key) {
                continue;
            }
        }
        rows.push(DimensionRow {
            id: rows.len() as i64,
            values: indices.iter().map(|&i| source[i].clone()).collect(),
        });
    }

    let table = DimensionTable { spec, rows };
    let duplicates = table.duplicate_keys();
    if duplicates > 0 {
        tracing::warn!(
            table = spec.table,
            duplicates,
            "dimension has repeated natural keys; fact rows will fan out"
        );
    }
    tracing::info!(table = spec.table, rows = table.len(), ?mode, "dimension extracted");
    Ok(table)
}

#[derive(Debug)]
pub struct Dimensions {
    pub customer: DimensionTable,
    pub transaction: DimensionTable,
    pub employee: DimensionTable,
}

pub fn extract_all(dataset: &Dataset, mode: KeyMode) -> Result<Dimensions> {
    Ok(Dimensions {
        customer: extract(dataset, &CUSTOMER, mode)?,
        transaction: extract(dataset, &TRANSACTION, mode)?,
        employee: extract(dataset, &EMPLOYEE, mode)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaner::{clean, CleaningPolicy};
    use crate::testutil::{full_line, load};

    fn cleaned(lines: &[String]) -> Dataset {
        clean(load(lines), &CleaningPolicy::nuga_bank()).unwrap().0
    }

    #[test]
    fn test_ids_unique_and_increasing() {
        let ds = cleaned(&[full_line(1), full_line(2), full_line(3)]);
        for spec in [&CUSTOMER, &TRANSACTION, &EMPLOYEE] {
            let dim = extract(&ds, spec, KeyMode::PerRow).unwrap();
            let ids: Vec<i64> = dim.rows.iter().map(|r| r.id).collect();
            assert_eq!(ids, vec![0, 1, 2], "table {}", spec.table);
            assert!(ids.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_identical_customers_get_two_ids_per_row() {
        // Legacy behavior: no dedup, one customer row per source row.
        let ds = cleaned(&[full_line(7), full_line(7)]);
        let dim = extract(&ds, &CUSTOMER, KeyMode::PerRow).unwrap();
        assert_eq!(dim.len(), 2);
        assert_ne!(dim.rows[0].id, dim.rows[1].id);
        assert_eq!(dim.rows[0].values, dim.rows[1].values);
        assert_eq!(dim.duplicate_keys(), 1);
    }

    #[test]
    fn test_identical_customers_share_id_when_distinct() {
        let ds = cleaned(&[full_line(7), full_line(8), full_line(7)]);
        let dim = extract(&ds, &CUSTOMER, KeyMode::Distinct).unwrap();
        assert_eq!(dim.len(), 2);
        assert_eq!(dim.duplicate_keys(), 0);
        let index = dim.key_index();
        assert!(index.values().all(|ids| ids.len() == 1));
    }

    #[test]
    fn test_repeated_rows_collapse_in_every_dimension() {
        let ds = cleaned(&[full_line(1), full_line(1), full_line(2)]);
        let dims = extract_all(&ds, KeyMode::Distinct).unwrap();
        assert_eq!(dims.customer.len(), 2);
        assert_eq!(dims.transaction.len(), 2);
        assert_eq!(dims.employee.len(), 2);
    }

    #[test]
    fn test_columns_are_lowercased_with_id_first() {
        assert_eq!(
            TRANSACTION.columns(),
            vec!["transaction_id", "transaction_date", "amount", "transaction_type"]
        );
        assert_eq!(CUSTOMER.columns().len(), 6);
        assert_eq!(EMPLOYEE.columns()[0], "employee_id");
    }
}
