use crate::constants::{
    CUSTOMERS_FILE, DEFAULT_CONFIG_FILE, DEFAULT_DATA_DIR, DEFAULT_LOG_DIR, DEFAULT_PIPELINES_DIR,
    DEFAULT_TRANSACTION_API_URL, ENV_DATA_DIR, ENV_PIPELINES_DIR, ENV_TRANSACTION_API_KEY,
    ENV_TRANSACTION_API_URL,
};
use crate::error::{PipelineError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Runtime configuration, resolved once at the process boundary
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub pipelines_dir: PathBuf,
    pub log_dir: PathBuf,
    pub transaction_api: TransactionApiConfig,
}

/// Connection details for the transaction API. Only recorded; the source
/// generates its data in-process.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionApiConfig {
    pub api_url: String,
    pub api_key: Option<String>,
}

impl Default for TransactionApiConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_TRANSACTION_API_URL.to_string(),
            api_key: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            pipelines_dir: PathBuf::from(DEFAULT_PIPELINES_DIR),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            transaction_api: TransactionApiConfig::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    #[serde(default)]
    paths: PathsSection,
    #[serde(default)]
    transaction_api: TransactionApiSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PathsSection {
    data_dir: Option<PathBuf>,
    pipelines_dir: Option<PathBuf>,
    log_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TransactionApiSection {
    api_url: Option<String>,
    api_key: Option<String>,
}

impl Config {
    /// Loads defaults, then the config file, then the process environment.
    ///
    /// An explicitly given file must exist; the default `config.toml` is
    /// optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        let (config_path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        if config_path.exists() {
            let content = fs::read_to_string(&config_path).map_err(|e| {
                PipelineError::Config(format!(
                    "Failed to read config file '{}': {}",
                    config_path.display(),
                    e
                ))
            })?;
            config.merge_toml(&content)?;
        } else if required {
            return Err(PipelineError::Config(format!(
                "Config file '{}' does not exist",
                config_path.display()
            )));
        }

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Overlays values present in a TOML document.
    pub fn merge_toml(&mut self, content: &str) -> Result<()> {
        let file: FileConfig = toml::from_str(content)?;

        if let Some(dir) = file.paths.data_dir {
            self.data_dir = dir;
        }
        if let Some(dir) = file.paths.pipelines_dir {
            self.pipelines_dir = dir;
        }
        if let Some(dir) = file.paths.log_dir {
            self.log_dir = dir;
        }
        if let Some(url) = file.transaction_api.api_url {
            self.transaction_api.api_url = url;
        }
        if let Some(key) = file.transaction_api.api_key {
            self.transaction_api.api_key = Some(key);
        }
        Ok(())
    }

    /// Overlays environment values. Empty values count as unset.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(ENV_TRANSACTION_API_URL) {
            self.transaction_api.api_url = url;
        }
        if let Some(key) = get(ENV_TRANSACTION_API_KEY) {
            self.transaction_api.api_key = Some(key);
        }
        if let Some(dir) = get(ENV_DATA_DIR) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = get(ENV_PIPELINES_DIR) {
            self.pipelines_dir = PathBuf::from(dir);
        }
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }

    pub fn customers_csv_path(&self) -> PathBuf {
        self.raw_dir().join(CUSTOMERS_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.transaction_api.api_url, "mock://transactions");
        assert!(config.transaction_api.api_key.is_none());
        assert_eq!(config.customers_csv_path(), PathBuf::from("data/raw/customers.csv"));
    }

    #[test]
    fn test_env_overrides_defaults() {
        let env: HashMap<&str, &str> = [
            ("TRANSACTION_API_URL", "https://api.example.com/tx"),
            ("TRANSACTION_API_KEY", "secret"),
            ("KNOWLEDGE_PIPELINE_DATA_DIR", "/tmp/kp-data"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.transaction_api.api_url, "https://api.example.com/tx");
        assert_eq!(config.transaction_api.api_key.as_deref(), Some("secret"));
        assert_eq!(config.data_dir, PathBuf::from("/tmp/kp-data"));
        assert_eq!(config.pipelines_dir, PathBuf::from(".pipelines"));
    }

    #[test]
    fn test_empty_env_value_is_ignored() {
        let mut config = Config::default();
        config.apply_env(|key| (key == "TRANSACTION_API_KEY").then(String::new));
        assert!(config.transaction_api.api_key.is_none());
    }

    #[test]
    fn test_toml_then_env_layering() {
        let mut config = Config::default();
        config
            .merge_toml(
                r#"
                [paths]
                pipelines_dir = "warehouse"

                [transaction_api]
                api_url = "mock://from-file"
                "#,
            )
            .unwrap();
        assert_eq!(config.pipelines_dir, PathBuf::from("warehouse"));
        assert_eq!(config.transaction_api.api_url, "mock://from-file");

        config.apply_env(|key| (key == "TRANSACTION_API_URL").then(|| "mock://from-env".to_string()));
        assert_eq!(config.transaction_api.api_url, "mock://from-env");
    }

    #[test]
    fn test_unknown_toml_key_is_rejected() {
        let mut config = Config::default();
        let err = config.merge_toml("[paths]\nbogus = 1\n").unwrap_err();
        assert!(matches!(err, PipelineError::Toml(_)));
    }

    #[test]
    fn test_missing_explicit_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }
}
