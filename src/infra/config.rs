use std::path::PathBuf;
use std::str::FromStr;

use log::LevelFilter;

use crate::domain::error::DomainError;

pub const DEFAULT_LIMIT: u32 = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_url: Option<String>,
    pub data_dir: PathBuf,
    pub limit: u32,
    pub log_level: LevelFilter,
}

impl Config {
    pub fn from_env() -> Result<Self, DomainError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable lookup, so tests do not
    /// have to touch the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DomainError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let limit = match lookup("THREADVIEW_LIMIT") {
            Some(v) => v
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    DomainError::InvalidInput(format!("THREADVIEW_LIMIT must be a positive integer: {}", v))
                })?,
            None => DEFAULT_LIMIT,
        };

        let log_level = match lookup("THREADVIEW_LOG") {
            Some(v) => LevelFilter::from_str(v.trim())
                .map_err(|_| DomainError::InvalidInput(format!("unknown log level: {}", v)))?,
            None => LevelFilter::Warn,
        };

        Ok(Self {
            api_url: lookup("THREADVIEW_API_URL").filter(|s| !s.trim().is_empty()),
            data_dir: data_dir(&lookup),
            limit,
            log_level,
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("threadview.db")
    }
}

fn data_dir<F>(lookup: &F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(dir) = lookup("THREADVIEW_DATA_DIR") {
        return PathBuf::from(dir);
    }
    if let Some(data) = lookup("LOCALAPPDATA") {
        return PathBuf::from(data).join("threadview");
    }
    if let Some(home) = lookup("HOME") {
        return PathBuf::from(home).join(".local").join("share").join("threadview");
    }
    PathBuf::from(".threadview")
}
