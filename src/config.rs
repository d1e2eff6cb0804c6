//! Configuration for the manager and the sessions it creates.
//!
//! Configuration is YAML rendered through `tera` first, so values can be
//! pulled from the environment:
//!
//! ```yaml
//! ai:
//!   generator:
//!     kind: openai
//!     api_key: {{ get_env(name="OPENAI_API_KEY", default="") }}
//!     model: gpt-4o-mini
//! translation:
//!   strategies: [direct, structured]
//!   max_attempts: 2
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use validator::Validate;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read configuration file `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot render configuration template: {0}")]
    Template(#[from] tera::Error),

    #[error("cannot parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),

    #[error("unknown translation strategy `{0}`")]
    UnknownStrategy(String),

    #[error("strategy `{0}` is reserved for the reasoning loop and cannot be used for translation")]
    StrategyNotAllowed(String),

    #[error(transparent)]
    Generator(#[from] crate::ai::GeneratorInitError),
}

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, Validate)]
pub struct Config {
    #[serde(default)]
    pub logger: Logger,
    #[serde(default)]
    pub ai: AiSettings,
    #[serde(default)]
    #[validate(nested)]
    pub translation: TranslationSettings,
    #[serde(default)]
    #[validate(nested)]
    pub reasoning: ReasoningSettings,
    #[serde(default)]
    #[validate(nested)]
    pub engine: EngineSettings,
}

impl Config {
    /// Renders, parses and validates configuration text.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] when rendering, parsing or validation fails.
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let rendered = tera::Tera::one_off(content, &tera::Context::new(), false)?;
        let config: Self = serde_yaml::from_str(&rendered)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] when the file cannot be read or is invalid.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }
}

/// Logger configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Logger {
    #[serde(default = "default_true")]
    pub enable: bool,
    #[serde(default)]
    pub level: LogLevel,
    #[serde(default)]
    pub format: LogFormat,
    /// Full `EnvFilter` directive replacing the crate level filter, e.g.
    /// `mcr_rs=trace,async_openai=info`.
    pub override_filter: Option<String>,
    pub file_appender: Option<FileAppender>,
}

impl Default for Logger {
    fn default() -> Self {
        Self {
            enable: true,
            level: LogLevel::default(),
            format: LogFormat::default(),
            override_filter: None,
            file_appender: None,
        }
    }
}

/// Rolling file output for logs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FileAppender {
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub non_blocking: bool,
    #[serde(default)]
    pub level: LogLevel,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default)]
    pub rotation: LogRotation,
    #[serde(default = "default_log_dir")]
    pub dir: String,
    #[serde(default = "default_log_prefix")]
    pub filename_prefix: String,
    pub max_log_files: Option<usize>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Minutely,
    Hourly,
    #[default]
    Daily,
    Never,
}

/// Generation service selection.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AiSettings {
    /// Backend used for translation and fallback answers. Sessions created
    /// without a generator can still assert and query Prolog text.
    #[serde(default)]
    pub generator: Option<GeneratorBackend>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind")]
pub enum GeneratorBackend {
    #[serde(rename = "openai")]
    OpenAi(OpenAiSettings),
}

/// OpenAI chat completion settings.
#[derive(Clone, PartialEq, Deserialize, Serialize)]
pub struct OpenAiSettings {
    pub api_key: String,
    #[serde(default = "default_openai_model")]
    pub model: String,
    pub api_base: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub system_prompt: Option<String>,
}

impl std::fmt::Debug for OpenAiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiSettings")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("system_prompt", &self.system_prompt)
            .finish()
    }
}

/// Translation pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Validate)]
pub struct TranslationSettings {
    /// Strategy names tried in order within each attempt.
    #[serde(default = "default_strategies")]
    #[validate(length(min = 1))]
    pub strategies: Vec<String>,
    #[serde(default = "default_max_attempts")]
    #[validate(range(min = 1))]
    pub max_attempts: u32,
    /// Delay between full rounds over the strategies.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Upper bound for a whole translation, including retries.
    pub operation_timeout_ms: Option<u64>,
}

impl Default for TranslationSettings {
    fn default() -> Self {
        Self {
            strategies: default_strategies(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            operation_timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Validate)]
pub struct ReasoningSettings {
    #[serde(default = "default_max_steps")]
    #[validate(range(min = 1))]
    pub max_steps: u32,
}

impl Default for ReasoningSettings {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
        }
    }
}

/// Search bounds of the in-memory engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Validate)]
pub struct EngineSettings {
    #[serde(default = "default_max_depth")]
    #[validate(range(min = 1))]
    pub max_depth: usize,
    #[serde(default = "default_max_solutions")]
    #[validate(range(min = 1))]
    pub max_solutions: usize,
    /// Predicate calls a single query may make before the search gives up.
    #[serde(default = "default_max_inferences")]
    #[validate(range(min = 1))]
    pub max_inferences: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_solutions: default_max_solutions(),
            max_inferences: default_max_inferences(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_log_dir() -> String {
    "./logs".to_string()
}

fn default_log_prefix() -> String {
    "mcr".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_strategies() -> Vec<String> {
    vec!["direct".to_string(), "structured".to_string()]
}

fn default_max_attempts() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_max_steps() -> u32 {
    5
}

fn default_max_depth() -> usize {
    512
}

fn default_max_solutions() -> usize {
    256
}

fn default_max_inferences() -> usize {
    20_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = Config::from_yaml_str("{}").expect("valid config");
        assert_eq!(config, Config::default());
        assert_eq!(config.translation.max_attempts, 2);
        assert_eq!(config.translation.retry_delay_ms, 500);
        assert_eq!(config.reasoning.max_steps, 5);
        assert_eq!(config.engine.max_inferences, 20_000);
        assert!(config.ai.generator.is_none());
    }

    #[test]
    fn renders_environment_values() {
        std::env::set_var("MCR_CONFIG_TEST_KEY", "sk-test");
        let config = Config::from_yaml_str(
            r#"
ai:
  generator:
    kind: openai
    api_key: {{ get_env(name="MCR_CONFIG_TEST_KEY") }}
    temperature: 0.0
"#,
        )
        .expect("valid config");
        let Some(GeneratorBackend::OpenAi(settings)) = config.ai.generator else {
            panic!("expected openai backend");
        };
        assert_eq!(settings.api_key, "sk-test");
        assert_eq!(settings.model, "gpt-4o-mini");
    }

    #[test]
    fn debug_output_hides_the_api_key() {
        let config = Config::from_yaml_str(
            "ai:\n  generator:\n    kind: openai\n    api_key: sk-very-secret\n",
        )
        .expect("valid config");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-very-secret"));
        assert!(rendered.contains("<redacted>"));
        assert!(rendered.contains("gpt-4o-mini"));
    }

    #[test]
    fn zero_bounds_are_rejected() {
        let err = Config::from_yaml_str("reasoning:\n  max_steps: 0\n").expect_err("invalid");
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = Config::from_yaml_str("translation:\n  max_attempts: 0\n").expect_err("invalid");
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = Config::from_yaml_str("engine:\n  max_inferences: 0\n").expect_err("invalid");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn logger_section_parses() {
        let config = Config::from_yaml_str(
            "logger:\n  level: debug\n  format: json\n  override_filter: mcr_rs=trace\n",
        )
        .expect("valid config");
        assert_eq!(config.logger.level, LogLevel::Debug);
        assert_eq!(config.logger.format, LogFormat::Json);
        assert!(config.logger.enable);
    }
}
