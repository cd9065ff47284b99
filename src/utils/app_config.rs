/// Application configuration management
/// Stores settings in ~/.config/fleet-restore/config.toml, overridable from
/// the environment (and .env) and from command-line flags

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::bundles::{BundleRuleConfig, BundleRules};
use crate::core::retry::{Backoff, RetryPolicy};
use crate::utils::constants::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Base URL of the database server
    pub server_url: String,
    /// Directory holding one dump file per database
    pub backup_dir: PathBuf,
    /// Dump tool executable; next to this binary when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_path: Option<PathBuf>,
    pub dump_extension: String,
    pub page_size: usize,
    /// Pause after every dump tool operation
    #[serde(with = "duration_str")]
    pub cooldown: Duration,
    /// Hard limit per tool invocation, "off" disables it
    #[serde(with = "optional_duration_str")]
    pub tool_timeout: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
    pub data_dir_prefix: String,
    pub default_bundles: Vec<String>,
    pub export_args: Vec<String>,
    pub import_args: Vec<String>,
    pub retry: RetryConfig,
    pub bundle_rules: Vec<BundleRuleConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    #[serde(with = "duration_str")]
    pub delay: Duration,
    pub backoff: Backoff,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
            backoff: Backoff::Fixed,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            backup_dir: PathBuf::new(),
            tool_path: None,
            dump_extension: DEFAULT_DUMP_EXTENSION.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            cooldown: DEFAULT_COOLDOWN,
            tool_timeout: Some(DEFAULT_TOOL_TIMEOUT),
            log_dir: Some(PathBuf::from(DEFAULT_LOG_DIR)),
            data_dir_prefix: DEFAULT_DATA_DIR_PREFIX.to_string(),
            default_bundles: to_strings(DEFAULT_BUNDLES),
            export_args: to_strings(DEFAULT_EXPORT_ARGS),
            import_args: to_strings(DEFAULT_IMPORT_ARGS),
            retry: RetryConfig::default(),
            bundle_rules: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Get config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine the user configuration directory")?
            .join("fleet-restore");

        Ok(config_dir.join("config.toml"))
    }

    /// Load configuration from `path`, or from the default location.
    ///
    /// A missing default file yields the defaults; a missing explicit file
    /// is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::config_path()?, false),
        };

        if !path.exists() {
            if explicit {
                return Err(anyhow!("Config file not found at {}", path.display()));
            }
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(Into::into)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        fs::write(path, self.to_toml()?)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;

        Ok(())
    }

    /// Write the defaults to `path` without reading what is there, so a
    /// broken file can be replaced with `force`
    pub fn init_file(path: &Path, force: bool) -> Result<()> {
        if path.exists() && !force {
            return Err(anyhow!("{} already exists, use --force to overwrite", path.display()));
        }

        Self::default().save_to(path)
    }

    /// Apply `FLEET_*` overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(ENV_SERVER_URL) {
            self.server_url = url;
        }
        if let Some(dir) = get(ENV_BACKUP_DIR) {
            self.backup_dir = PathBuf::from(dir);
        }
        if let Some(tool) = get(ENV_TOOL_PATH) {
            self.tool_path = Some(PathBuf::from(tool));
        }
        if let Some(dir) = get(ENV_LOG_DIR) {
            self.log_dir = Some(PathBuf::from(dir));
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry.max_attempts, self.retry.delay, self.retry.backoff)
    }

    pub fn bundle_rules(&self) -> Result<BundleRules> {
        BundleRules::from_config(&self.bundle_rules)
    }

    /// Configured tool path, or the default tool name next to this binary
    pub fn resolved_tool_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.tool_path {
            return Ok(path.clone());
        }

        let exe = std::env::current_exe().context("Failed to locate the running executable")?;
        let dir = exe
            .parent()
            .ok_or_else(|| anyhow!("Executable {} has no parent directory", exe.display()))?;

        Ok(dir.join(DEFAULT_TOOL_NAME))
    }

    /// Validate configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.server_url.trim().is_empty() {
            errors.push("server_url is not set".to_string());
        } else if let Err(e) = reqwest::Url::parse(&self.server_url) {
            errors.push(format!("Invalid server_url '{}': {}", self.server_url, e));
        }

        if self.dump_extension.is_empty() || !self.dump_extension.starts_with('.') {
            errors.push(format!(
                "dump_extension must start with '.', got '{}'",
                self.dump_extension
            ));
        }

        if self.page_size == 0 {
            errors.push("page_size must be greater than 0".to_string());
        }

        if self.retry.max_attempts == 0 {
            errors.push("retry.max_attempts must be at least 1".to_string());
        }

        if self.tool_timeout == Some(Duration::ZERO) {
            errors.push("tool_timeout must be positive (use \"off\" to disable)".to_string());
        }

        if let Err(e) = self.bundle_rules() {
            errors.push(format!("{:#}", e));
        }

        errors
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

/// Durations as humantime strings ("5s", "2h 30m")
mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(raw.trim()).map_err(serde::de::Error::custom)
    }
}

mod optional_duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    const OFF: &str = "off";

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_str(&humantime::format_duration(*d).to_string()),
            None => serializer.serialize_str(OFF),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case(OFF) || raw.eq_ignore_ascii_case("none") {
            return Ok(None);
        }
        humantime::parse_duration(raw)
            .map(Some)
            .map_err(serde::de::Error::custom)
    }
}
