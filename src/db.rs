use std::path::{Path, PathBuf};

use rusqlite::Connection;

use crate::dimensions::{DimensionSpec, CUSTOMER, EMPLOYEE, TRANSACTION};
use crate::error::{EtlError, Result};
use crate::fact::{FactTable, FACT_TABLE};
use crate::settings::DbConfig;

/// Bumped whenever the destination DDL changes; stored in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 1;

// ---------------------------------------------------------------------------
// Declarative table definitions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    BigInt,
    Text,
    Float,
    Date,
    Timestamp,
}

impl SqlType {
    fn ddl(&self) -> &'static str {
        match self {
            Self::BigInt => "BIGINT",
            Self::Text => "VARCHAR(10000)",
            Self::Float => "FLOAT",
            Self::Date => "DATE",
            Self::Timestamp => "TIMESTAMP",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub name: String,
    pub sql_type: SqlType,
    pub primary_key: bool,
    /// Referenced (table, column).
    pub references: Option<(&'static str, &'static str)>,
}

#[derive(Debug, Clone)]
pub struct TableDef {
    pub name: &'static str,
    pub columns: Vec<ColumnDef>,
}

pub fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

impl TableDef {
    pub fn create_sql(&self) -> String {
        let cols: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                let mut col = format!("{} {}", quote(&c.name), c.sql_type.ddl());
                if c.primary_key {
                    col.push_str(" PRIMARY KEY");
                }
                if let Some((table, column)) = c.references {
                    col.push_str(&format!(" REFERENCES {}({})", quote(table), quote(column)));
                }
                col
            })
            .collect();
        format!("CREATE TABLE {} (\n    {}\n)", quote(self.name), cols.join(",\n    "))
    }

    pub fn drop_sql(&self) -> String {
        format!("DROP TABLE IF EXISTS {}", quote(self.name))
    }
}

fn column(name: &str, sql_type: SqlType) -> ColumnDef {
    ColumnDef {
        name: name.to_string(),
        sql_type,
        primary_key: false,
        references: None,
    }
}

fn dimension_def(spec: &'static DimensionSpec, types: &[SqlType]) -> TableDef {
    let mut columns = vec![ColumnDef {
        primary_key: true,
        ..column(spec.id_column, SqlType::BigInt)
    }];
    for (name, ty) in spec.columns().iter().skip(1).zip(types) {
        columns.push(column(name, *ty));
    }
    TableDef {
        name: spec.table,
        columns,
    }
}

/// Destination tables in creation (and load) order: dimensions, then fact.
pub fn star_schema() -> Vec<TableDef> {
    use SqlType::*;

    let customer = dimension_def(&CUSTOMER, &[Text; 5]);
    let transaction = dimension_def(&TRANSACTION, &[Date, Float, Text]);
    let employee = dimension_def(&EMPLOYEE, &[Text; 6]);

    let fact_types = [Text, Text, Text, Float, Text, Text, Text, Timestamp, Text];
    let mut fact_columns: Vec<ColumnDef> = [&TRANSACTION, &CUSTOMER, &EMPLOYEE]
        .iter()
        .map(|dim| ColumnDef {
            references: Some((dim.table, dim.id_column)),
            ..column(dim.id_column, BigInt)
        })
        .collect();
    for (name, ty) in FactTable::columns().iter().skip(3).zip(fact_types) {
        fact_columns.push(column(name, ty));
    }
    let fact = TableDef {
        name: FACT_TABLE,
        columns: fact_columns,
    };

    vec![customer, transaction, employee, fact]
}

// ---------------------------------------------------------------------------
// Connection context
// ---------------------------------------------------------------------------

pub fn get_connection(db_path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

/// The run's single database connection. Closed explicitly with [`close`] on
/// success; dropping it on an error path closes it as well.
///
/// [`close`]: Warehouse::close
pub struct Warehouse {
    conn: Connection,
    path: PathBuf,
}

impl Warehouse {
    pub fn open(config: &DbConfig) -> Result<Self> {
        config.check_local()?;
        let path = config.database_path();
        tracing::info!(target_db = %config, "connecting to warehouse");
        let conn = get_connection(&path).map_err(|e| EtlError::Connection {
            target: path.display().to_string(),
            source: Box::new(e),
        })?;
        Ok(Self { conn, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Release the connection. Everything written is already committed, so a
    /// failed close is logged and not reported as a run failure.
    pub fn close(self) {
        match self.conn.close() {
            Ok(()) => tracing::debug!(path = %self.path.display(), "warehouse connection closed"),
            Err((_, e)) => {
                tracing::warn!(path = %self.path.display(), error = %e, "warehouse connection did not close cleanly")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Schema initialization
// ---------------------------------------------------------------------------

/// Drop and recreate the star schema in one transaction. A failure anywhere
/// rolls back to the previous schema.
pub fn initialize_schema(warehouse: &mut Warehouse) -> Result<()> {
    let tables = star_schema();
    let tx = warehouse.conn_mut().transaction().map_err(EtlError::Ddl)?;
    for table in tables.iter().rev() {
        tx.execute_batch(&table.drop_sql()).map_err(EtlError::Ddl)?;
    }
    for table in &tables {
        tracing::debug!(table = table.name, "creating table");
        tx.execute_batch(&table.create_sql()).map_err(EtlError::Ddl)?;
    }
    tx.pragma_update(None, "user_version", SCHEMA_VERSION)
        .map_err(EtlError::Ddl)?;
    tx.commit().map_err(EtlError::Ddl)?;
    tracing::info!(tables = tables.len(), version = SCHEMA_VERSION, "schema initialized");
    Ok(())
}

pub fn schema_version(conn: &Connection) -> Result<i64> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(EtlError::Ddl)
}
