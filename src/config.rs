use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_SCRAPE_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_HEALTH_TIMEOUT_SECS: u64 = 5;

const ENV_API_URL: &str = "JOBTABLE_API_URL";
const ENV_DOWNLOAD_DIR: &str = "JOBTABLE_DOWNLOAD_DIR";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub scrape_timeout: Duration,
    pub health_timeout: Duration,
    pub download_dir: PathBuf,
}

/// Optional `config.json`; every key may be omitted.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    api_url: Option<String>,
    scrape_timeout_secs: Option<u64>,
    health_timeout_secs: Option<u64>,
    download_dir: Option<PathBuf>,
}

/// Values given on the command line; they win over everything else.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub api_url: Option<String>,
    pub download_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            scrape_timeout: Duration::from_secs(DEFAULT_SCRAPE_TIMEOUT_SECS),
            health_timeout: Duration::from_secs(DEFAULT_HEALTH_TIMEOUT_SECS),
            download_dir: default_download_dir(),
        }
    }
}

impl Config {
    /// Defaults, then the config file, then the environment, then `overrides`.
    pub fn load(overrides: Overrides) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = Self::default_path() {
            if path.exists() {
                config.apply_file(&path)?;
                log::debug!("Loaded config from {}", path.display());
            }
        }

        if let Ok(url) = std::env::var(ENV_API_URL) {
            config.api_url = url;
        }
        if let Ok(dir) = std::env::var(ENV_DOWNLOAD_DIR) {
            config.download_dir = PathBuf::from(dir);
        }

        if let Some(url) = overrides.api_url {
            config.api_url = url;
        }
        if let Some(dir) = overrides.download_dir {
            config.download_dir = dir;
        }

        Ok(config)
    }

    fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "jobtable")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    fn apply_file(&mut self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let file: FileConfig = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        if let Some(url) = file.api_url {
            self.api_url = url;
        }
        if let Some(secs) = file.scrape_timeout_secs {
            self.scrape_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.health_timeout_secs {
            self.health_timeout = Duration::from_secs(secs);
        }
        if let Some(dir) = file.download_dir {
            self.download_dir = dir;
        }
        Ok(())
    }
}

fn default_download_dir() -> PathBuf {
    directories::UserDirs::new()
        .and_then(|dirs| dirs.download_dir().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_url, "http://localhost:8000");
        assert_eq!(config.scrape_timeout, Duration::from_secs(300));
        assert!(config.health_timeout < config.scrape_timeout);
    }

    #[test]
    fn test_file_overrides_only_given_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"api_url": "http://scraper:9000", "scrape_timeout_secs": 60}"#).unwrap();

        let mut config = Config::default();
        config.apply_file(&path).unwrap();
        assert_eq!(config.api_url, "http://scraper:9000");
        assert_eq!(config.scrape_timeout, Duration::from_secs(60));
        assert_eq!(config.health_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_bad_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();

        let err = Config::default().apply_file(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid config file"));
    }

    #[test]
    fn test_cli_overrides_win() {
        let config = Config::load(Overrides {
            api_url: Some("http://127.0.0.1:1".to_string()),
            download_dir: Some(PathBuf::from("/tmp/exports")),
        })
        .unwrap();
        assert_eq!(config.api_url, "http://127.0.0.1:1");
        assert_eq!(config.download_dir, PathBuf::from("/tmp/exports"));
    }
}
