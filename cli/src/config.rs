use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use tracing::debug;

use mealprep_core::history::DEFAULT_MAX_HISTORY;

const REMOTE_DB_ENV: &str = "MEALPREP_REMOTE_DB";
const MAX_HISTORY_ENV: &str = "MEALPREP_MAX_HISTORY";

pub struct Config {
    /// Device storage: guest plans, custom ingredients, recents, session.
    pub local_db_path: PathBuf,
    /// Stand-in for the hosted backend that signed-in users write to.
    pub remote_db_path: PathBuf,
    pub max_history: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "mealprep").context("Could not determine home directory")?;

        let remote_override = std::env::var_os(REMOTE_DB_ENV).map(PathBuf::from);
        let max_history = match std::env::var(MAX_HISTORY_ENV) {
            Ok(v) => parse_max_history(&v)?,
            Err(_) => DEFAULT_MAX_HISTORY,
        };

        Self::in_dir(proj_dirs.data_dir(), remote_override, max_history)
    }

    /// Lay out both stores under `data_dir`, creating it if needed.
    fn in_dir(
        data_dir: &Path,
        remote_override: Option<PathBuf>,
        max_history: usize,
    ) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let config = Config {
            local_db_path: data_dir.join("local.db"),
            remote_db_path: remote_override.unwrap_or_else(|| data_dir.join("cloud.db")),
            max_history,
        };
        debug!(
            local = %config.local_db_path.display(),
            remote = %config.remote_db_path.display(),
            max_history,
            "loaded config"
        );
        Ok(config)
    }
}

fn parse_max_history(value: &str) -> Result<usize> {
    let n: usize = value
        .trim()
        .parse()
        .with_context(|| format!("Invalid {MAX_HISTORY_ENV}: '{value}'"))?;
    anyhow::ensure!(n > 0, "{MAX_HISTORY_ENV} must be at least 1");
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_max_history() {
        assert_eq!(parse_max_history("50").unwrap(), 50);
        assert_eq!(parse_max_history(" 5 ").unwrap(), 5);
        assert!(parse_max_history("0").is_err());
        assert!(parse_max_history("lots").is_err());
    }

    #[test]
    fn test_in_dir_creates_data_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let data_dir = tmp.path().join("nested").join("mealprep");
        let config = Config::in_dir(&data_dir, None, 7).unwrap();
        assert!(data_dir.is_dir());
        assert_eq!(config.local_db_path, data_dir.join("local.db"));
        assert_eq!(config.remote_db_path, data_dir.join("cloud.db"));
        assert_eq!(config.max_history, 7);

        let shared = tmp.path().join("shared.db");
        let config = Config::in_dir(&data_dir, Some(shared.clone()), 7).unwrap();
        assert_eq!(config.remote_db_path, shared);
    }
}
