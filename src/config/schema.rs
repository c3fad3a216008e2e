use crate::error::ConfigError;
use crate::llm::gemini::DEFAULT_BASE_URL;
use crate::tools::builtin::{
    DEFAULT_DICTIONARY_BASE_URL, DEFAULT_TOMTOM_BASE_URL, DEFAULT_WEATHER_GOV_BASE_URL,
};
use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

// ── Top-level config ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,
    #[serde(default)]
    pub api_key: Option<String>,
    /// File holding the API key on a single line; `~` is expanded.
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub temperature: Option<f64>,

    #[serde(default)]
    pub exchange: ExchangeConfig,

    #[serde(default)]
    pub reliability: ReliabilityConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub scenarios: ScenariosConfig,
}

fn default_model() -> String {
    "gemini-2.5-flash".into()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: PathBuf::new(),
            api_key: None,
            api_key_file: None,
            model: default_model(),
            base_url: default_base_url(),
            temperature: None,
            exchange: ExchangeConfig::default(),
            reliability: ReliabilityConfig::default(),
            tools: ToolsConfig::default(),
            scenarios: ScenariosConfig::default(),
        }
    }
}

// ── Exchange loop ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Model turns allowed before an exchange fails.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Run the calls of one model turn concurrently.
    #[serde(default = "default_true")]
    pub parallel_tool_calls: bool,
    #[serde(default)]
    pub system_instruction: Option<String>,
}

fn default_max_iterations() -> u32 {
    10
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_true() -> bool {
    true
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            request_timeout_secs: default_request_timeout_secs(),
            parallel_tool_calls: true,
            system_instruction: None,
        }
    }
}

// ── Reliability ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReliabilityConfig {
    #[serde(default = "default_transport_retries")]
    pub transport_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_transport_retries() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    500
}

impl Default for ReliabilityConfig {
    fn default() -> Self {
        Self {
            transport_retries: default_transport_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

// ── Built-in tools ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_true")]
    pub scrabble_enabled: bool,
    #[serde(default = "default_true")]
    pub dictionary_enabled: bool,
    #[serde(default = "default_true")]
    pub weather_enabled: bool,
    #[serde(default)]
    pub tomtom_api_key: Option<String>,
    #[serde(default = "default_dictionary_base_url")]
    pub dictionary_base_url: String,
    #[serde(default = "default_tomtom_base_url")]
    pub tomtom_base_url: String,
    #[serde(default = "default_weather_base_url")]
    pub weather_base_url: String,
    /// Sent to weather.gov, which rejects anonymous clients.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_tool_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_dictionary_base_url() -> String {
    DEFAULT_DICTIONARY_BASE_URL.into()
}

fn default_tomtom_base_url() -> String {
    DEFAULT_TOMTOM_BASE_URL.into()
}

fn default_weather_base_url() -> String {
    DEFAULT_WEATHER_GOV_BASE_URL.into()
}

fn default_user_agent() -> String {
    format!("toolweave/{}", env!("CARGO_PKG_VERSION"))
}

fn default_tool_timeout_secs() -> u64 {
    30
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            scrabble_enabled: true,
            dictionary_enabled: true,
            weather_enabled: true,
            tomtom_api_key: None,
            dictionary_base_url: default_dictionary_base_url(),
            tomtom_base_url: default_tomtom_base_url(),
            weather_base_url: default_weather_base_url(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_tool_timeout_secs(),
        }
    }
}

// ── Scenario payloads ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenariosConfig {
    /// Directory searched for `fn-*.json` payloads, relative to the working
    /// directory unless absolute.
    #[serde(default = "default_scenarios_dir")]
    pub dir: String,
}

fn default_scenarios_dir() -> String {
    "config".into()
}

impl Default for ScenariosConfig {
    fn default() -> Self {
        Self {
            dir: default_scenarios_dir(),
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────

impl Config {
    pub fn load_or_init() -> Result<Self> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .context("Could not find home directory")?;
        Self::load_or_init_in(&home.join(".toolweave"))
    }

    /// Load `config.toml` from `dir`, writing a default one first if absent.
    pub fn load_or_init_in(dir: &Path) -> Result<Self> {
        let config_path = dir.join("config.toml");
        if !dir.exists() {
            fs::create_dir_all(dir).context("Failed to create .toolweave directory")?;
        }

        if config_path.exists() {
            let contents =
                fs::read_to_string(&config_path).context("Failed to read config file")?;
            let mut config: Config =
                toml::from_str(&contents).context("Failed to parse config file")?;
            config.config_path.clone_from(&config_path);
            Ok(config)
        } else {
            let config = Self {
                config_path,
                ..Self::default()
            };
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&self.config_path, toml_str).context("Failed to write config file")?;
        Ok(())
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    /// Apply overrides from any variable source. Empty values are ignored.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(key) = var("GEMINI_API_KEY").or_else(|| var("GOOGLE_API_KEY")) {
            self.api_key = Some(key);
        }

        if let Some(model) = var("TOOLWEAVE_MODEL") {
            self.model = model;
        }

        if let Some(raw) = var("TOOLWEAVE_MAX_ITERATIONS") {
            match raw.trim().parse::<u32>() {
                Ok(limit) => self.exchange.max_iterations = limit,
                Err(_) => {
                    tracing::warn!(value = raw.as_str(), "Ignoring invalid TOOLWEAVE_MAX_ITERATIONS");
                }
            }
        }

        if let Some(key) = var("TOMTOM_APIKEY") {
            self.tools.tomtom_api_key = Some(key);
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        validate_max_iterations(self.exchange.max_iterations, "exchange.max_iterations")?;
        if self.exchange.request_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "exchange.request_timeout_secs must be at least 1".into(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::Validation("model must not be empty".into()));
        }
        if let Some(temperature) = self.temperature
            && !(0.0..=2.0).contains(&temperature)
        {
            return Err(ConfigError::Validation(format!(
                "temperature {temperature} is outside 0.0..=2.0"
            )));
        }
        Ok(())
    }

    /// The Gemini key: inline value first, then `api_key_file`.
    pub fn resolve_api_key(&self) -> std::result::Result<String, ConfigError> {
        if let Some(key) = self.api_key.as_deref().map(str::trim)
            && !key.is_empty()
        {
            return Ok(key.to_string());
        }

        let Some(file) = self.api_key_file.as_deref() else {
            return Err(ConfigError::Load(
                "no Gemini API key: set api_key, api_key_file or GEMINI_API_KEY".into(),
            ));
        };
        let path = shellexpand::tilde(file).to_string();
        let key = fs::read_to_string(&path)?.trim().to_string();
        if key.is_empty() {
            return Err(ConfigError::Load(format!("API key file '{path}' is empty")));
        }
        Ok(key)
    }

    /// `generationConfig` built from the configured sampling knobs.
    pub fn generation_config(&self) -> Option<crate::llm::GenerationConfig> {
        let temperature = self.temperature?;
        let mut config = crate::llm::GenerationConfig::new();
        config.insert("temperature".into(), serde_json::json!(temperature));
        Some(config)
    }
}

/// Iteration bound check shared by the config file and command-line
/// overrides. `source` names the setting in the error.
pub fn validate_max_iterations(limit: u32, source: &str) -> std::result::Result<(), ConfigError> {
    if limit == 0 {
        return Err(ConfigError::Validation(format!("{source} must be at least 1")));
    }
    Ok(())
}
