use std::collections::HashMap;

use crate::dimensions::{DimensionTable, Dimensions};
use crate::error::Result;
use crate::models::{Dataset, NaturalKey, Value};

pub const FACT_TABLE: &str = "fact_table";

/// Source columns carried into the fact table after the three foreign keys.
pub const FACT_ATTRIBUTES: &[&str] = &[
    "Credit_Card_Number",
    "IBAN",
    "Currency_Code",
    "Random_Number",
    "Category",
    "Group",
    "Is_Active",
    "Last_Updated",
    "Description",
];

#[derive(Debug, Clone, PartialEq)]
pub struct FactRow {
    pub transaction_id: i64,
    pub customer_id: i64,
    pub employee_id: i64,
    pub attributes: Vec<Value>,
}

#[derive(Debug, Default)]
pub struct FactTable {
    pub rows: Vec<FactRow>,
    /// Cleaned rows that found no partner in at least one dimension.
    pub unmatched: usize,
}

impl FactTable {
    pub fn columns() -> Vec<String> {
        ["transaction_id", "customer_id", "employee_id"]
            .into_iter()
            .map(String::from)
            .chain(FACT_ATTRIBUTES.iter().map(|c| c.to_lowercase()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

struct JoinSide<'a> {
    indices: Vec<usize>,
    index: HashMap<NaturalKey, Vec<i64>>,
    table: &'a str,
}

impl<'a> JoinSide<'a> {
    fn new(dataset: &Dataset, dim: &'a DimensionTable) -> Result<Self> {
        Ok(Self {
            indices: dataset.require_columns(dim.spec.source_columns)?,
            index: dim.key_index(),
            table: dim.spec.table,
        })
    }

    fn matches(&self, row: &[Value]) -> &[i64] {
        Dataset::natural_key(row, &self.indices)
            .and_then(|key| self.index.get(&key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Inner-join the cleaned rows with the transaction, customer and employee
/// dimensions on their natural keys. Every matching combination yields a fact
/// row, so a repeated natural key multiplies rows.
pub fn assemble(dataset: &Dataset, dims: &Dimensions) -> Result<FactTable> {
    let sides = [
        JoinSide::new(dataset, &dims.transaction)?,
        JoinSide::new(dataset, &dims.customer)?,
        JoinSide::new(dataset, &dims.employee)?,
    ];
    let attributes = dataset.require_columns(FACT_ATTRIBUTES)?;

    let mut fact = FactTable::default();
    for row in &dataset.rows {
        let [t_ids, c_ids, e_ids] = [
            sides[0].matches(row),
            sides[1].matches(row),
            sides[2].matches(row),
        ];
        if t_ids.is_empty() || c_ids.is_empty() || e_ids.is_empty() {
            let missing: Vec<&str> = sides
                .iter()
                .zip([t_ids, c_ids, e_ids])
                .filter(|(_, ids)| ids.is_empty())
                .map(|(side, _)| side.table)
                .collect();
            tracing::debug!(?missing, "row dropped by inner join");
            fact.unmatched += 1;
            continue;
        }
        for &transaction_id in t_ids {
            for &customer_id in c_ids {
                for &employee_id in e_ids {
                    fact.rows.push(FactRow {
                        transaction_id,
                        customer_id,
                        employee_id,
                        attributes: attributes.iter().map(|&i| row[i].clone()).collect(),
                    });
                }
            }
        }
    }

    if fact.len() > dataset.len() {
        tracing::warn!(
            cleaned = dataset.len(),
            facts = fact.len(),
            "fact table larger than cleaned dataset (join fan-out)"
        );
    }
    tracing::info!(rows = fact.len(), unmatched = fact.unmatched, "fact table assembled");
    Ok(fact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaner::{clean, CleaningPolicy};
    use crate::dimensions::{extract_all, KeyMode};
    use crate::testutil::{full_line, load};

    fn cleaned(lines: &[String]) -> Dataset {
        clean(load(lines), &CleaningPolicy::nuga_bank()).unwrap().0
    }

    #[test]
    fn test_one_fact_per_row_without_duplicates() {
        let ds = cleaned(&[full_line(1), full_line(2), full_line(3)]);
        for mode in [KeyMode::Distinct, KeyMode::PerRow] {
            let dims = extract_all(&ds, mode).unwrap();
            let fact = assemble(&ds, &dims).unwrap();
            assert_eq!(fact.len(), ds.len());
            assert_eq!(fact.unmatched, 0);
        }
    }

    #[test]
    fn test_foreign_keys_resolve() {
        let ds = cleaned(&[full_line(1), full_line(2), full_line(1)]);
        let dims = extract_all(&ds, KeyMode::Distinct).unwrap();
        let fact = assemble(&ds, &dims).unwrap();
        assert_eq!(fact.len(), 3);
        for row in &fact.rows {
            assert!(dims.transaction.rows.iter().any(|r| r.id == row.transaction_id));
            assert!(dims.customer.rows.iter().any(|r| r.id == row.customer_id));
            assert!(dims.employee.rows.iter().any(|r| r.id == row.employee_id));
        }
        assert_eq!(fact.rows[0].customer_id, fact.rows[2].customer_id);
    }

    #[test]
    fn test_per_row_duplicates_fan_out() {
        // Two identical rows: each dimension has two rows with the same key,
        // so each source row matches 2 x 2 x 2 combinations.
        let ds = cleaned(&[full_line(5), full_line(5)]);
        let dims = extract_all(&ds, KeyMode::PerRow).unwrap();
        let fact = assemble(&ds, &dims).unwrap();
        assert_eq!(fact.len(), 16);
    }

    #[test]
    fn test_unmatched_rows_are_dropped() {
        let ds = cleaned(&[full_line(1), full_line(2)]);
        let mut dims = extract_all(&ds, KeyMode::Distinct).unwrap();
        dims.customer.rows.remove(1);
        let fact = assemble(&ds, &dims).unwrap();
        assert_eq!(fact.len(), 1);
        assert_eq!(fact.unmatched, 1);
    }

    #[test]
    fn test_attributes_follow_fact_columns() {
        let ds = cleaned(&[full_line(1)]);
        let dims = extract_all(&ds, KeyMode::Distinct).unwrap();
        let fact = assemble(&ds, &dims).unwrap();
        let columns = FactTable::columns();
        assert_eq!(columns.len(), 3 + fact.rows[0].attributes.len());
        assert_eq!(columns[8], "group");
        assert_eq!(fact.rows[0].attributes[1], Value::Text("GB29NWBK60161331926819".to_string()));
        assert_eq!(fact.rows[0].attributes[3], Value::Float(0.42));
    }
}
