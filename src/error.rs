use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Source schema error: {0}")]
    SourceSchema(String),

    #[error("Row {row}, column {column}: cannot parse {value:?} as {expected}")]
    Parse {
        row: usize,
        column: String,
        value: String,
        expected: &'static str,
    },

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Could not connect to {target}: {source}")]
    Connection {
        target: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Schema initialization failed: {0}")]
    Ddl(#[source] rusqlite::Error),

    #[error("Failed writing table {table}: {source}")]
    Write {
        table: String,
        #[source]
        source: rusqlite::Error,
    },
}

impl EtlError {
    /// Infrastructure failures worth retrying from outside the process.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Connection { .. } => 3,
            Self::Ddl(_) => 4,
            Self::Write { .. } => 5,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
