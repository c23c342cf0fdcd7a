use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::session::SESSION_IDLE_TIMEOUT;

pub const DB_ENV_VAR: &str = "MOVIE_SHELF_DB";
pub const BIND_ENV_VAR: &str = "MOVIE_SHELF_BIND";
pub const DEFAULT_DB_PATH: &str = "./movie_shelf.sqlite3";
pub const DEFAULT_BIND: &str = "127.0.0.1:8433";
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Settings read from `movie_shelf.toml`. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct ShelfConfig {
    pub database: DatabaseConfig,
    pub service: ServiceConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    pub bind: Option<String>,
    /// Seconds a session may stay unused before it expires.
    pub session_idle_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    pub filter: Option<String>,
}

/// `<config_dir>/movie_shelf/movie_shelf.toml` for the current platform.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("movie_shelf").join("movie_shelf.toml"))
}

impl ShelfConfig {
    /// Load an explicitly named config file, or the platform default when present.
    ///
    /// # Errors
    /// Returns an error when an explicit file is missing, or any file read cannot
    /// be parsed.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        match default_config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// # Errors
    /// Returns an error when the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("invalid config file {}", path.display()))
    }

    /// # Errors
    /// Returns an error when `raw` is not valid TOML for this shape.
    pub fn parse(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("failed to parse TOML config")
    }

    /// Database path by priority: flag, `MOVIE_SHELF_DB`, config file, default.
    #[must_use]
    pub fn resolve_db_path(&self, flag: Option<PathBuf>) -> PathBuf {
        self.db_path_with(flag, std::env::var_os(DB_ENV_VAR).map(PathBuf::from))
    }

    /// Bind address by priority: flag, `MOVIE_SHELF_BIND`, config file, default.
    ///
    /// # Errors
    /// Returns an error when the chosen value is not a socket address.
    pub fn resolve_bind(&self, flag: Option<SocketAddr>) -> Result<SocketAddr> {
        self.bind_with(flag, std::env::var(BIND_ENV_VAR).ok())
    }

    #[must_use]
    pub fn session_idle_timeout(&self) -> Duration {
        self.service.session_idle_secs.map_or(SESSION_IDLE_TIMEOUT, Duration::from_secs)
    }

    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log.filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }

    fn db_path_with(&self, flag: Option<PathBuf>, env: Option<PathBuf>) -> PathBuf {
        flag.or(env)
            .or_else(|| self.database.path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH))
    }

    fn bind_with(&self, flag: Option<SocketAddr>, env: Option<String>) -> Result<SocketAddr> {
        if let Some(addr) = flag {
            return Ok(addr);
        }
        let raw = env
            .or_else(|| self.service.bind.clone())
            .unwrap_or_else(|| DEFAULT_BIND.to_string());
        raw.parse().with_context(|| format!("invalid bind address `{raw}`"))
    }
}
