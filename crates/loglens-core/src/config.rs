use crate::error::{AppError, AppResult};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub translator: TranslatorConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from_env("LOGLENS")?;
        config.apply_legacy_env();
        Ok(config)
    }

    /// Load configuration from environment with custom prefix
    pub fn load_from_env(prefix: &str) -> Result<Self, ConfigError> {
        let builder = with_defaults(Config::builder())?.add_source(
            Environment::with_prefix(prefix)
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load configuration from file with environment overrides
    pub fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let builder = with_defaults(Config::builder())?
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("LOGLENS").separator("__"));

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Rejects settings no translator could use.
    pub fn validate(&self) -> AppResult<()> {
        if self.llm.max_tokens == 0 {
            return Err(AppError::validation("llm.max_tokens must be greater than zero"));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(AppError::validation(format!(
                "llm.temperature must be between 0 and 2, got {}",
                self.llm.temperature
            )));
        }
        if self.llm.timeout_seconds == 0 {
            return Err(AppError::validation("llm.timeout_seconds must be greater than zero"));
        }
        if self.translator.overlay_path.as_os_str().is_empty() {
            return Err(AppError::config("translator.overlay_path is empty"));
        }
        Ok(())
    }

    /// Applies the plain Azure/OpenAI variable names on top of the prefixed ones.
    pub fn apply_legacy_env(&mut self) {
        self.apply_legacy_overrides(|key| std::env::var(key).ok());
    }

    /// Same as [`apply_legacy_env`](Self::apply_legacy_env) with an injectable lookup.
    pub fn apply_legacy_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(endpoint) = get("AZURE_OPENAI_ENDPOINT") {
            self.llm.provider = LlmProvider::Azure;
            self.llm.endpoint = Some(endpoint);
            if let Some(key) = get("AZURE_OPENAI_KEY") {
                self.llm.api_key = Some(key);
            }
            if let Some(deployment) = get("AZURE_OPENAI_DEPLOYMENT") {
                self.llm.model = deployment;
            }
        } else if let Some(key) = get("OPENAI_API_KEY") {
            self.llm.provider = LlmProvider::OpenAi;
            self.llm.api_key = Some(key);
        }

        if let Some(id) = get("AZURE_LOG_ANALYTICS_WORKSPACE_ID") {
            self.workspace.workspace_id = Some(id);
        }
    }
}

fn with_defaults(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
    builder
        .set_default("llm.provider", "azure")?
        .set_default("llm.model", DEFAULT_MODEL)?
        .set_default("llm.api_version", DEFAULT_API_VERSION)?
        .set_default("llm.max_tokens", 500)?
        .set_default("llm.temperature", 0.0)?
        .set_default("llm.timeout_seconds", 60)?
        .set_default("translator.overlay_path", DEFAULT_OVERLAY_PATH)?
        .set_default("translator.max_prompt_tables", 30)?
        .set_default("translator.ai_enabled", true)
}

const DEFAULT_MODEL: &str = "gpt-4";
const DEFAULT_API_VERSION: &str = "2024-02-15-preview";
const DEFAULT_OVERLAY_PATH: &str = "kql_instructions.yaml";

/// Which chat-completion API the translator talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Azure OpenAI deployment route (`api-key` header)
    Azure,
    /// Public OpenAI API (bearer token)
    #[serde(alias = "open_ai")]
    OpenAi,
}

/// LLM provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Model name, or deployment name for Azure
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl LlmConfig {
    pub fn azure(endpoint: String, api_key: String, deployment: String) -> Self {
        Self {
            provider: LlmProvider::Azure,
            endpoint: Some(endpoint),
            api_key: Some(api_key),
            model: deployment,
            api_version: default_api_version(),
            max_tokens: default_max_tokens(),
            temperature: 0.0,
            timeout_seconds: default_timeout_seconds(),
        }
    }

    pub fn openai(api_key: String, model: String) -> Self {
        Self {
            provider: LlmProvider::OpenAi,
            endpoint: None,
            api_key: Some(api_key),
            model,
            api_version: default_api_version(),
            max_tokens: default_max_tokens(),
            temperature: 0.0,
            timeout_seconds: default_timeout_seconds(),
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_endpoint(mut self, endpoint: String) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// True when enough is set to reach a chat-completion endpoint.
    pub fn is_configured(&self) -> bool {
        let has_key = self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty());
        match self.provider {
            LlmProvider::Azure => {
                has_key && self.endpoint.as_deref().is_some_and(|e| !e.trim().is_empty())
            }
            LlmProvider::OpenAi => has_key,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Azure,
            endpoint: None,
            api_key: None,
            model: default_model(),
            api_version: default_api_version(),
            max_tokens: default_max_tokens(),
            temperature: 0.0,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_max_tokens() -> u32 {
    500
}

fn default_timeout_seconds() -> u64 {
    60
}

/// Translation engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TranslatorConfig {
    /// Location of the operator instruction overlay document
    #[serde(default = "default_overlay_path")]
    pub overlay_path: PathBuf,
    /// Known table names included in the AI system prompt
    #[serde(default = "default_max_prompt_tables")]
    pub max_prompt_tables: usize,
    /// Set to false to force the deterministic path even when a key is present
    #[serde(default = "default_ai_enabled")]
    pub ai_enabled: bool,
}

impl TranslatorConfig {
    pub fn new() -> Self {
        Self {
            overlay_path: default_overlay_path(),
            max_prompt_tables: default_max_prompt_tables(),
            ai_enabled: default_ai_enabled(),
        }
    }

    pub fn with_overlay_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.overlay_path = path.into();
        self
    }

    pub fn with_max_prompt_tables(mut self, max: usize) -> Self {
        self.max_prompt_tables = max;
        self
    }

    pub fn with_ai_enabled(mut self, enabled: bool) -> Self {
        self.ai_enabled = enabled;
        self
    }
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Log Analytics workspace the translated queries are meant for.
///
/// The translator never executes queries; the id is carried for callers
/// that list tables or run the output.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkspaceConfig {
    pub workspace_id: Option<String>,
}

impl WorkspaceConfig {
    pub fn is_configured(&self) -> bool {
        self.workspace_id.as_deref().is_some_and(|id| !id.trim().is_empty())
    }
}

fn default_overlay_path() -> PathBuf {
    PathBuf::from(DEFAULT_OVERLAY_PATH)
}

fn default_max_prompt_tables() -> usize {
    30
}

fn default_ai_enabled() -> bool {
    true
}
