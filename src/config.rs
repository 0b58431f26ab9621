use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

pub const DEFAULT_CONFIG_FILE: &str = "po-translator.toml";

#[derive(Clone, Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub batch: BatchConfig,
    pub run: RunConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// `deepseek`, `openai`, or `custom` (requires `base_url`).
    pub provider: String,
    pub base_url: Option<String>,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub max_attempts: usize,
    pub base_delay_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            provider: "deepseek".into(),
            base_url: None,
            model: "deepseek-chat".into(),
            api_key_env: "DEEPSEEK_API_KEY".into(),
            max_tokens: 8192,
            temperature: 0.0,
            timeout_secs: 120,
            max_attempts: 3,
            base_delay_ms: 1000,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub size: usize,
    pub max_chars: usize,
    pub sleep_secs: f64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            size: 50,
            max_chars: 8000,
            sleep_secs: 1.0,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub source_language: String,
    pub debug_dir: PathBuf,
    pub backup: bool,
    pub keep_responses: bool,
    pub workers: Option<usize>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            source_language: "en".into(),
            debug_dir: PathBuf::from("responses"),
            backup: true,
            keep_responses: false,
            workers: None,
        }
    }
}

impl AppConfig {
    /// Loads `path`, or `po-translator.toml` from the working directory when
    /// present, or the built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => {
                if !p.exists() {
                    return Err(Error::config(format!("config file not found: {}", p.display())));
                }
                p.to_path_buf()
            }
            None => {
                let p = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !p.exists() {
                    return Ok(Self::default());
                }
                p
            }
        };

        let text = std::fs::read_to_string(&path)?;
        let cfg: AppConfig = toml::from_str(&text)?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch.size == 0 {
            return Err(Error::config("batch size must be at least 1"));
        }
        if self.batch.max_chars == 0 {
            return Err(Error::config("max chars must be at least 1"));
        }
        if !self.batch.sleep_secs.is_finite() || self.batch.sleep_secs < 0.0 {
            return Err(Error::config("sleep must be a non-negative number of seconds"));
        }
        if self.service.max_attempts == 0 {
            return Err(Error::config("max_attempts must be at least 1"));
        }
        if self.run.workers == Some(0) {
            return Err(Error::config("workers must be at least 1"));
        }
        if self.service.provider == "custom" && self.service.base_url.is_none() {
            return Err(Error::config("provider `custom` needs service.base_url"));
        }
        Ok(())
    }

    pub fn inter_batch_delay(&self) -> Duration {
        Duration::from_secs_f64(self.batch.sleep_secs)
    }

    pub fn workers(&self) -> usize {
        self.run.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [service]
            model = "gpt-4o-mini"
            provider = "openai"

            [batch]
            size = 10
            "#,
        )
        .unwrap();

        assert_eq!(cfg.service.model, "gpt-4o-mini");
        assert_eq!(cfg.service.max_attempts, 3);
        assert_eq!(cfg.batch.size, 10);
        assert_eq!(cfg.batch.max_chars, 8000);
        assert_eq!(cfg.run.source_language, "en");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_zero_limits() {
        let mut cfg = AppConfig::default();
        cfg.batch.size = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.batch.sleep_secs = -1.0;
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.service.provider = "custom".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = AppConfig::load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn loads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.toml");
        std::fs::write(&path, "[run]\nsource_language = \"zh_CN\"\nworkers = 2\n").unwrap();

        let cfg = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.run.source_language, "zh_CN");
        assert_eq!(cfg.workers(), 2);
    }
}
