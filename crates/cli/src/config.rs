use anyhow::{Context, Result};
use saldo_core::UserId;
use saldo_import::CategoryPattern;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "saldo.toml";
pub const DEFAULT_USER_ID: i64 = 1;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite ledger file. Defaults to `ledger.db` in the platform data dir.
    pub database: Option<PathBuf>,
    pub user_id: Option<i64>,
    /// Checked before patterns stored in the database.
    pub category_patterns: Vec<CategoryPattern>,
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "saldo", "Saldo")
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config")
    }

    /// An explicit path must exist. Without one, `saldo.toml` in the platform
    /// config dir is used when present, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match project_dirs().map(|d| d.config_dir().join(CONFIG_FILE_NAME)) {
                Some(p) if p.exists() => p,
                _ => return Ok(Config::default()),
            },
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config");
        Self::from_toml(&content)
    }

    pub fn database_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.database {
            return Ok(path.clone());
        }
        let dirs = project_dirs().context("Failed to get app directory")?;
        Ok(dirs.data_dir().join("ledger.db"))
    }

    /// `--user` wins over the config file.
    pub fn user(&self, cli_user: Option<i64>) -> UserId {
        UserId(cli_user.or(self.user_id).unwrap_or(DEFAULT_USER_ID))
    }
}
