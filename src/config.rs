//! Environment configuration for the server process.
//!
//! SYSTEM CONTEXT
//! ==============
//! Startup reads every knob once into a `Config`; nothing else in the
//! codebase touches the environment. All variables are optional and default
//! to a self-contained local layout under `./data`.

use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 4000;
pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_DB_FILE: &str = "boardroom.db";
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";
pub const DEFAULT_CLIENT_DIST: &str = "./client/dist";
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub db_file: PathBuf,
    pub upload_dir: PathBuf,
    pub client_dist: PathBuf,
    /// Overrides request-derived base URLs when set. Stored without a
    /// trailing slash; an empty value counts as unset.
    pub public_base_url: Option<String>,
    pub port: u16,
    pub db_max_connections: u32,
}

impl Config {
    /// Read configuration from the environment, applying defaults for
    /// anything unset or unparseable.
    #[must_use]
    pub fn from_env() -> Self {
        let data_dir = env_path("DATA_DIR").unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        let db_file = env_path("DB_FILE").unwrap_or_else(|| data_dir.join(DEFAULT_DB_FILE));
        let upload_dir =
            env_path("UPLOAD_DIR").unwrap_or_else(|| data_dir.join(DEFAULT_UPLOAD_DIR));
        let client_dist =
            env_path("CLIENT_DIST").unwrap_or_else(|| PathBuf::from(DEFAULT_CLIENT_DIST));

        Self {
            data_dir,
            db_file,
            upload_dir,
            client_dist,
            public_base_url: env_base_url("PUBLIC_BASE_URL"),
            port: env_parse("PORT", DEFAULT_PORT),
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
        }
    }
}

fn env_path(name: &str) -> Option<PathBuf> {
    let value = std::env::var(name).ok()?;
    if value.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(value))
}

fn env_base_url(name: &str) -> Option<String> {
    let value = std::env::var(name).ok()?;
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_owned())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
