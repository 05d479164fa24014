use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{EtlError, Result};

const LOCAL_HOSTS: &[&str] = &["localhost", "127.0.0.1", "::1"];

/// Connection options. For the embedded warehouse `database` is the SQLite file
/// path; `host` may only name the local machine.
#[derive(Clone, Serialize, Deserialize)]
pub struct DbConfig {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            database: default_database(),
            username: None,
            password: None,
        }
    }
}

// Keep the password out of logs and panics.
impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

impl fmt::Display for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(user) = &self.username {
            write!(f, "{user}@")?;
        }
        write!(f, "{}", self.host.as_deref().unwrap_or("localhost"))?;
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }
        write!(f, "/{}", self.database_path().display())
    }
}

impl DbConfig {
    pub fn database_path(&self) -> PathBuf {
        if self.database.trim().is_empty() {
            return default_data_dir().join("warehouse.db");
        }
        PathBuf::from(shellexpand_path(&self.database))
    }

    pub fn check_local(&self) -> Result<()> {
        match self.host.as_deref().map(str::trim) {
            None | Some("") => Ok(()),
            Some(h) if LOCAL_HOSTS.contains(&h) => Ok(()),
            Some(h) => Err(EtlError::Connection {
                target: h.to_string(),
                source: "remote hosts are not supported by the embedded warehouse".into(),
            }),
        }
    }

    /// Overlay `DB_*` variables. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(host) = get("DB_HOST") {
            self.host = Some(host);
        }
        if let Some(port) = get("DB_PORT") {
            self.port = Some(
                port.trim()
                    .parse()
                    .map_err(|_| EtlError::Config(format!("DB_PORT is not a port number: {port}")))?,
            );
        }
        if let Some(name) = get("DB_NAME") {
            self.database = name;
        }
        if let Some(user) = get("DB_USERNAME") {
            self.username = Some(user);
        }
        if let Some(password) = get("DB_PASSWORD") {
            self.password = Some(password);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Reproduce the legacy one-key-per-row behavior.
    #[serde(default)]
    pub per_row_keys: bool,
}

fn default_batch_size() -> usize {
    500
}

fn default_database() -> String {
    default_data_dir()
        .join("warehouse.db")
        .to_string_lossy()
        .to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db: DbConfig::default(),
            batch_size: default_batch_size(),
            per_row_keys: false,
        }
    }
}

impl Settings {
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.db.apply_env(&lookup)?;
        if let Some(raw) = lookup("ETL_BATCH_SIZE").filter(|v| !v.trim().is_empty()) {
            self.batch_size = parse_batch_size(&raw)?;
        }
        Ok(())
    }
}

pub fn parse_batch_size(raw: &str) -> Result<usize> {
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(EtlError::Config(format!(
            "batch size must be a positive integer: {raw}"
        ))),
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("nuga-etl")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("nuga-etl")
}

pub fn parse_settings(content: &str) -> Result<Settings> {
    let settings: Settings = serde_json::from_str(content)
        .map_err(|e| EtlError::Config(format!("{}: {e}", settings_path().display())))?;
    if settings.batch_size == 0 {
        return Err(EtlError::Config(format!(
            "{}: batch_size must be a positive integer",
            settings_path().display()
        )));
    }
    Ok(settings)
}

/// Defaults, then the settings file, then the process environment (including
/// any `.env` loaded at startup).
pub fn load_settings() -> Result<Settings> {
    let path = settings_path();
    let mut settings = if path.exists() {
        parse_settings(&std::fs::read_to_string(&path)?)?
    } else {
        Settings::default()
    };
    settings.apply_env(|key| std::env::var(key).ok())?;
    tracing::debug!(?settings, "settings loaded");
    Ok(settings)
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}
