use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HailError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub db_path: PathBuf,
    pub orchestrator_addr: String,
    pub directory_addr: String,
    pub formatter_addr: String,
    pub directory_url: String,
    pub formatter_url: String,
    pub http_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
        let data_home = env::var("XDG_DATA_HOME").ok();

        let data_root = data_home
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(home).join(".local/share"));

        Self {
            db_path: data_root.join("hail/people.duckdb"),
            orchestrator_addr: "127.0.0.1:8080".to_string(),
            directory_addr: "127.0.0.1:8081".to_string(),
            formatter_addr: "127.0.0.1:8082".to_string(),
            directory_url: "http://127.0.0.1:8081".to_string(),
            formatter_url: "http://127.0.0.1:8082".to_string(),
            http_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut cfg = Self::default();
        let config_path = config_file_path();
        if let Some(file_overrides) = load_file_overrides(&config_path)? {
            apply_overrides(&mut cfg, file_overrides, "config file")?;
        }
        let env_overrides = load_env_overrides()?;
        apply_overrides(&mut cfg, env_overrides, "environment")?;
        Ok(cfg)
    }

    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();
        let env_overrides = load_env_overrides()?;
        apply_overrides(&mut cfg, env_overrides, "environment")?;
        Ok(cfg)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigOverrides {
    db_path: Option<PathBuf>,
    orchestrator_addr: Option<String>,
    directory_addr: Option<String>,
    formatter_addr: Option<String>,
    directory_url: Option<String>,
    formatter_url: Option<String>,
    http_timeout: Option<String>,
}

fn config_file_path() -> PathBuf {
    if let Ok(path) = env::var("HAIL_CONFIG") {
        return PathBuf::from(path);
    }

    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let config_home = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(home).join(".config"));
    config_home.join("hail/config.toml")
}

fn load_file_overrides(path: &PathBuf) -> Result<Option<ConfigOverrides>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| HailError::Config(format!("failed reading {}: {e}", path.display())))?;
    let parsed: ConfigOverrides = toml::from_str(&raw)
        .map_err(|e| HailError::Config(format!("failed parsing {}: {e}", path.display())))?;
    Ok(Some(parsed))
}

fn load_env_overrides() -> Result<ConfigOverrides> {
    Ok(ConfigOverrides {
        db_path: env::var("HAIL_DB_PATH").ok().map(PathBuf::from),
        orchestrator_addr: env::var("HAIL_ORCHESTRATOR_ADDR").ok(),
        directory_addr: env::var("HAIL_DIRECTORY_ADDR").ok(),
        formatter_addr: env::var("HAIL_FORMATTER_ADDR").ok(),
        directory_url: env::var("HAIL_DIRECTORY_URL").ok(),
        formatter_url: env::var("HAIL_FORMATTER_URL").ok(),
        http_timeout: env::var("HAIL_HTTP_TIMEOUT").ok(),
    })
}

fn apply_overrides(cfg: &mut Config, overrides: ConfigOverrides, source: &str) -> Result<()> {
    if let Some(v) = overrides.db_path {
        cfg.db_path = v;
    }
    if let Some(v) = overrides.orchestrator_addr {
        cfg.orchestrator_addr = v;
    }
    if let Some(v) = overrides.directory_addr {
        cfg.directory_addr = v;
    }
    if let Some(v) = overrides.formatter_addr {
        cfg.formatter_addr = v;
    }
    if let Some(v) = overrides.directory_url {
        cfg.directory_url = v;
    }
    if let Some(v) = overrides.formatter_url {
        cfg.formatter_url = v;
    }
    if let Some(v) = overrides.http_timeout {
        cfg.http_timeout = humantime::parse_duration(&v).map_err(|e| {
            HailError::Config(format!("bad http_timeout in {source}: {e} (value={v})"))
        })?;
    }
    Ok(())
}
