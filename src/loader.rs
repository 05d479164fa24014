use rusqlite::types::ToSql;
use rusqlite::Connection;

use crate::db::{quote, Warehouse};
use crate::dimensions::{DimensionTable, Dimensions};
use crate::error::{EtlError, Result};
use crate::fact::{FactTable, FACT_TABLE};

/// Lowest bound-parameter limit across SQLite builds.
const MAX_PARAMS: usize = 999;

/// An in-memory table that can be appended to its destination.
pub trait Loadable {
    fn table(&self) -> &str;
    fn columns(&self) -> Vec<String>;
    fn row_count(&self) -> usize;
    fn sql_rows(&self) -> Box<dyn Iterator<Item = Vec<&dyn ToSql>> + '_>;
}

impl Loadable for DimensionTable {
    fn table(&self) -> &str {
        self.spec.table
    }

    fn columns(&self) -> Vec<String> {
        self.spec.columns()
    }

    fn row_count(&self) -> usize {
        self.len()
    }

    fn sql_rows(&self) -> Box<dyn Iterator<Item = Vec<&dyn ToSql>> + '_> {
        Box::new(self.rows.iter().map(|r| {
            std::iter::once(&r.id as &dyn ToSql)
                .chain(r.values.iter().map(|v| v as &dyn ToSql))
                .collect()
        }))
    }
}

impl Loadable for FactTable {
    fn table(&self) -> &str {
        FACT_TABLE
    }

    fn columns(&self) -> Vec<String> {
        FactTable::columns()
    }

    fn row_count(&self) -> usize {
        self.len()
    }

    fn sql_rows(&self) -> Box<dyn Iterator<Item = Vec<&dyn ToSql>> + '_> {
        Box::new(self.rows.iter().map(|r| {
            [
                &r.transaction_id as &dyn ToSql,
                &r.customer_id,
                &r.employee_id,
            ]
            .into_iter()
            .chain(r.attributes.iter().map(|v| v as &dyn ToSql))
            .collect()
        }))
    }
}

fn write_error(table: &str, source: rusqlite::Error) -> EtlError {
    EtlError::Write {
        table: table.to_string(),
        source,
    }
}

fn insert_sql(table: &str, columns: &[String], rows: usize) -> String {
    let cols: Vec<String> = columns.iter().map(|c| quote(c)).collect();
    let placeholders = format!("({})", vec!["?"; columns.len()].join(", "));
    format!(
        "INSERT INTO {} ({}) VALUES {}",
        quote(table),
        cols.join(", "),
        vec![placeholders; rows].join(", ")
    )
}

fn insert_batch(
    conn: &Connection,
    table: &str,
    columns: &[String],
    batch: &[Vec<&dyn ToSql>],
) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare_cached(&insert_sql(table, columns, batch.len()))?;
    stmt.execute(rusqlite::params_from_iter(batch.iter().flatten().copied()))?;
    Ok(())
}

/// Append every row of `data` inside one transaction using multi-row inserts of
/// at most `batch_size` rows. Returns the number of rows written.
pub fn load_table(conn: &mut Connection, data: &dyn Loadable, batch_size: usize) -> Result<usize> {
    let table = data.table();
    let columns = data.columns();
    let per_statement = batch_size.min(MAX_PARAMS / columns.len()).max(1);

    let tx = conn.transaction().map_err(|e| write_error(table, e))?;
    let mut written = 0usize;
    let mut batch = Vec::with_capacity(per_statement);
    for row in data.sql_rows() {
        batch.push(row);
        if batch.len() == per_statement {
            insert_batch(&tx, table, &columns, &batch).map_err(|e| write_error(table, e))?;
            written += batch.len();
            batch.clear();
            tracing::debug!(table, written, "batch inserted");
        }
    }
    if !batch.is_empty() {
        insert_batch(&tx, table, &columns, &batch).map_err(|e| write_error(table, e))?;
        written += batch.len();
    }
    tx.commit().map_err(|e| write_error(table, e))?;
    Ok(written)
}

/// Rows written per destination table, in load order.
pub type LoadReport = Vec<(String, usize)>;

/// Load tables in the given order. The first failure stops the run; tables
/// loaded before it stay committed.
pub fn load_all(
    warehouse: &mut Warehouse,
    tables: &[&dyn Loadable],
    batch_size: usize,
) -> Result<LoadReport> {
    let mut report = Vec::with_capacity(tables.len());
    for data in tables {
        let table = data.table();
        tracing::info!(table, rows = data.row_count(), "writing {table} data");
        match load_table(warehouse.conn_mut(), *data, batch_size) {
            Ok(written) => {
                tracing::info!(table, written, "{table} data written");
                report.push((table.to_string(), written));
            }
            Err(e) => {
                tracing::error!(table, error = %e, "error writing {table} data");
                return Err(e);
            }
        }
    }
    Ok(report)
}

/// Dimensions first so every fact foreign key already resolves.
pub fn load_star(
    warehouse: &mut Warehouse,
    dims: &Dimensions,
    fact: &FactTable,
    batch_size: usize,
) -> Result<LoadReport> {
    load_all(
        warehouse,
        &[&dims.customer as &dyn Loadable, &dims.transaction, &dims.employee, fact],
        batch_size,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaner::{clean, CleaningPolicy};
    use crate::db::initialize_schema;
    use crate::dimensions::{extract_all, KeyMode};
    use crate::fact::assemble;
    use crate::models::Dataset;
    use crate::settings::DbConfig;
    use crate::testutil::{count, full_line, load};

    fn test_warehouse() -> (tempfile::TempDir, Warehouse) {
        let dir = tempfile::tempdir().unwrap();
        let config = DbConfig {
            database: dir.path().join("test.db").to_string_lossy().to_string(),
            ..DbConfig::default()
        };
        let mut wh = Warehouse::open(&config).unwrap();
        initialize_schema(&mut wh).unwrap();
        (dir, wh)
    }

    fn star(n: usize) -> (Dataset, Dimensions, FactTable) {
        let lines: Vec<String> = (0..n).map(full_line).collect();
        let (ds, _) = clean(load(&lines), &CleaningPolicy::nuga_bank()).unwrap();
        let dims = extract_all(&ds, KeyMode::Distinct).unwrap();
        let fact = assemble(&ds, &dims).unwrap();
        (ds, dims, fact)
    }

    #[test]
    fn test_insert_sql_shape() {
        let cols = vec!["a".to_string(), "group".to_string()];
        assert_eq!(
            insert_sql("transaction", &cols, 2),
            "INSERT INTO \"transaction\" (\"a\", \"group\") VALUES (?, ?), (?, ?)"
        );
    }

    #[test]
    fn test_load_star_writes_all_tables() {
        let (_dir, mut wh) = test_warehouse();
        let (_, dims, fact) = star(5);
        let report = load_star(&mut wh, &dims, &fact, 2).unwrap();
        let order: Vec<&str> = report.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(order, vec!["customer", "transaction", "employee", "fact_table"]);
        assert!(report.iter().all(|(_, n)| *n == 5));
        for table in ["customer", "transaction", "employee", "fact_table"] {
            assert_eq!(count(wh.conn(), table), 5, "table {table}");
        }
    }

    #[test]
    fn test_fact_keys_resolve_in_warehouse() {
        let (_dir, mut wh) = test_warehouse();
        let (_, dims, fact) = star(4);
        load_star(&mut wh, &dims, &fact, 500).unwrap();
        let orphans: i64 = wh
            .conn()
            .query_row(
                "SELECT count(*) FROM fact_table f \
                 LEFT JOIN customer c ON c.customer_id = f.customer_id \
                 LEFT JOIN \"transaction\" t ON t.transaction_id = f.transaction_id \
                 LEFT JOIN employee e ON e.employee_id = f.employee_id \
                 WHERE c.customer_id IS NULL OR t.transaction_id IS NULL OR e.employee_id IS NULL",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(orphans, 0);
        let (date, amount): (String, f64) = wh
            .conn()
            .query_row(
                "SELECT transaction_date, amount FROM \"transaction\" WHERE transaction_id = 0",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(date, "2023-01-01");
        assert_eq!(amount, 100.25);
    }

    #[test]
    fn test_large_batch_is_split_under_param_limit() {
        let (_dir, mut wh) = test_warehouse();
        let (_, dims, fact) = star(150);
        // 150 rows x 12 fact columns would exceed 999 parameters in one statement
        load_star(&mut wh, &dims, &fact, 10_000).unwrap();
        assert_eq!(count(wh.conn(), "fact_table"), 150);
    }

    #[test]
    fn test_failed_table_reports_name_and_keeps_earlier_tables() {
        let (_dir, mut wh) = test_warehouse();
        let (_, dims, fact) = star(3);
        // fact before its dimensions: foreign keys cannot resolve
        let err = load_all(&mut wh, &[&dims.customer as &dyn Loadable, &fact, &dims.employee], 100).unwrap_err();
        match &err {
            EtlError::Write { table, .. } => assert_eq!(table, "fact_table"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.exit_code(), 5);
        assert_eq!(count(wh.conn(), "customer"), 3);
        assert_eq!(count(wh.conn(), "fact_table"), 0);
        assert_eq!(count(wh.conn(), "employee"), 0);
    }
}
