// SPDX-License-Identifier: PMPL-1.0-or-later

//! Runtime configuration.
//!
//! Layers, later wins: built-in defaults, YAML file, environment, CLI flags
//! (applied by the binary on the returned value).

use crate::api::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
use crate::i18n::Lang;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_API_URL: &str = "NBS_QR_API_URL";
pub const ENV_TIMEOUT: &str = "NBS_QR_TIMEOUT";
pub const ENV_DATA_DIR: &str = "NBS_QR_DATA_DIR";
pub const ENV_LANG: &str = "NBS_QR_LANG";

const APP_DIR: &str = "nbs-qr";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub api_base_url: String,
    pub timeout_secs: u64,
    /// Where templates and preferences are stored
    pub data_dir: PathBuf,
    pub default_language: Lang,
    /// Side length in pixels requested from the image endpoints
    pub image_size: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            data_dir: default_data_dir(),
            default_language: Lang::default(),
            image_size: None,
        }
    }
}

impl Config {
    /// Load from `path` (or the default location when `None`) and apply
    /// environment overrides. A missing default file is not an error; a
    /// missing explicit file is.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = default_config_path();
                match default_path {
                    Some(p) if p.is_file() => Self::from_file(&p)?,
                    _ => Self::default(),
                }
            }
        };
        let env: HashMap<String, String> = std::env::vars().collect();
        config.apply_env(&env)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Apply `NBS_QR_*` overrides from `env`.
    pub fn apply_env(&mut self, env: &HashMap<String, String>) -> Result<()> {
        if let Some(url) = non_empty(env, ENV_API_URL) {
            self.api_base_url = url.to_string();
        }
        if let Some(raw) = non_empty(env, ENV_TIMEOUT) {
            self.timeout_secs = raw
                .parse()
                .with_context(|| format!("{} must be a number of seconds, got {:?}", ENV_TIMEOUT, raw))?;
        }
        if let Some(dir) = non_empty(env, ENV_DATA_DIR) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(code) = non_empty(env, ENV_LANG) {
            self.default_language = Lang::from_code(code)
                .ok_or_else(|| anyhow!("{} names an unsupported language: {:?}", ENV_LANG, code))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(anyhow!("timeout_secs must be greater than zero"));
        }
        if self.api_base_url.trim().is_empty() {
            return Err(anyhow!("api_base_url must not be empty"));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn non_empty<'a>(env: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    env.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join(APP_DIR).join("config.yaml"))
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|base| base.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(".nbs-qr"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn yaml_file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "api_base_url: http://localhost:9000/api\ntimeout_secs: 5\ndefault_language: en\n",
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.api_base_url, "http://localhost:9000/api");
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.default_language, Lang::En);
        assert_eq!(config.image_size, None);
        assert_eq!(config.data_dir, Config::default().data_dir);
    }

    #[test]
    fn unknown_yaml_keys_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "timeout: 5\n").unwrap();
        assert!(Config::from_file(&path).is_err());
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = Config::default();
        let env: HashMap<String, String> = [
            (ENV_API_URL, "http://127.0.0.1:8080"),
            (ENV_TIMEOUT, "3"),
            (ENV_DATA_DIR, "/tmp/nbs"),
            (ENV_LANG, "en-GB"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        config.apply_env(&env).unwrap();
        assert_eq!(config.api_base_url, "http://127.0.0.1:8080");
        assert_eq!(config.timeout_secs, 3);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/nbs"));
        assert_eq!(config.default_language, Lang::En);
    }

    #[test]
    fn bad_env_values_fail() {
        let mut config = Config::default();
        let env: HashMap<String, String> =
            [(ENV_TIMEOUT.to_string(), "soon".to_string())].into_iter().collect();
        assert!(config.apply_env(&env).is_err());

        let env: HashMap<String, String> =
            [(ENV_LANG.to_string(), "de".to_string())].into_iter().collect();
        assert!(config.apply_env(&env).is_err());
    }

    #[test]
    fn zero_timeout_is_invalid() {
        let config = Config {
            timeout_secs: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(Config::load(Some(&dir.path().join("absent.yaml"))).is_err());
    }
}
