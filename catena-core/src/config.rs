//! Configuration types for the Catena framework
//!
//! Configuration is layered with figment:
//! 1. Built-in defaults
//! 2. `catena/catena.toml` in the user config directory
//! 3. `./catena.toml`
//! 4. The file named by `CATENA_CONFIG_PATH`
//! 5. `CATENA_*` environment variables, `__` separating nested keys
//!    (e.g. `CATENA_MODEL__TEMPERATURE=0.2`)

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CatenaError, Result};
use crate::provider::{ModelParams, RetryConfig};

/// Main configuration for the Catena framework
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CatenaConfig {
    /// Model used by chains and agents
    pub model: ModelConfig,

    /// Agent loop settings
    pub agent: AgentConfig,

    /// HTTP transport settings
    pub http: HttpConfig,

    /// Attach the logging observer to every component
    pub verbose: bool,
}

/// Provider backing a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenAI,
    Bedrock,
    /// Cohere's own generate API
    Cohere,
    /// SageMaker inference endpoint named by `model`
    Sagemaker,
    /// Scripted responses, no network
    Fake,
}

/// Completion-style or chat-style model facade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    #[default]
    Chat,
    Completion,
}

/// Model configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub provider: ProviderKind,

    pub kind: ModelKind,

    /// Model name, Bedrock model id (`anthropic.claude-3-haiku-20240307-v1:0`)
    /// or SageMaker endpoint name
    pub model: String,

    /// API key; falls back to the provider's usual environment variable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Custom base URL (OpenAI-compatible servers, Bedrock or SageMaker gateways)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// AWS region for Bedrock and SageMaker
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    pub stop: Vec<String>,

    /// Stream tokens instead of waiting for the full response
    pub stream: bool,

    /// Responses replayed by the `fake` provider
    pub fake_responses: Vec<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::OpenAI,
            kind: ModelKind::Chat,
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            base_url: None,
            region: None,
            temperature: None,
            max_tokens: None,
            top_p: None,
            stop: Vec::new(),
            stream: false,
            fake_responses: Vec::new(),
        }
    }
}

impl ModelConfig {
    /// Configuration for the scripted fake provider
    pub fn fake(responses: Vec<String>) -> Self {
        Self {
            provider: ProviderKind::Fake,
            model: "fake".to_string(),
            fake_responses: responses,
            ..Default::default()
        }
    }

    /// Inference parameters derived from this configuration
    pub fn params(&self) -> ModelParams {
        ModelParams {
            model: Some(self.model.clone()),
            stop: self.stop.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_p: self.top_p,
            top_k: None,
            stream: self.stream,
            extra: Default::default(),
        }
    }
}

/// Agent loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Iteration cap; 0 disables the cap
    pub max_iterations: usize,

    /// Return the step history alongside the answer
    pub return_intermediate_steps: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 15,
            return_intermediate_steps: false,
        }
    }
}

/// HTTP transport configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Retry policy for transient provider failures
    pub retry: RetryConfig,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            retry: RetryConfig::default(),
        }
    }
}

impl CatenaConfig {
    /// Load configuration from the default locations and environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is invalid or the merged
    /// configuration fails validation.
    pub fn load() -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(CatenaConfig::default()));

        if let Some(path) = Self::user_config_path() {
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Toml::file("catena.toml"));

        if let Ok(path) = std::env::var("CATENA_CONFIG_PATH") {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(
            Env::prefixed("CATENA_")
                .ignore(&["CONFIG_PATH"])
                .split("__"),
        );

        Self::extract(figment)
    }

    /// Load configuration from a specific file path, on top of defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CatenaError::Configuration(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }

        let figment =
            Figment::from(Serialized::defaults(CatenaConfig::default())).merge(Toml::file(path));

        Self::extract(figment)
    }

    /// `<config dir>/catena/catena.toml`, when a config dir exists
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("catena").join("catena.toml"))
    }

    fn extract(figment: Figment) -> Result<Self> {
        let config: CatenaConfig = figment.extract().map_err(|e| {
            CatenaError::Configuration(format!("Failed to load configuration: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        let model = &self.model;

        if model.provider != ProviderKind::Fake && model.model.trim().is_empty() {
            return Err(CatenaError::Configuration(
                "model.model must name a model".to_string(),
            ));
        }
        if let Some(t) = model.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(CatenaError::Configuration(format!(
                    "model.temperature must be within 0.0..=2.0, got {}",
                    t
                )));
            }
        }
        if let Some(p) = model.top_p {
            if !(0.0..=1.0).contains(&p) {
                return Err(CatenaError::Configuration(format!(
                    "model.top_p must be within 0.0..=1.0, got {}",
                    p
                )));
            }
        }
        if model.provider == ProviderKind::Fake && model.fake_responses.is_empty() {
            return Err(CatenaError::Configuration(
                "the fake provider needs at least one entry in model.fake_responses".to_string(),
            ));
        }
        if self.http.retry.max_attempts == 0 {
            return Err(CatenaError::Configuration(
                "http.retry.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults_are_valid() {
        let config = CatenaConfig::default();
        config.validate().unwrap();
        assert_eq!(config.agent.max_iterations, 15);
        assert_eq!(config.http.timeout, Duration::from_secs(60));
        assert_eq!(config.model.provider, ProviderKind::OpenAI);
    }

    #[test]
    fn test_from_file_merges_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catena.toml");
        std::fs::write(
            &path,
            r#"
verbose = true

[model]
provider = "bedrock"
model = "anthropic.claude-3-haiku-20240307-v1:0"
temperature = 0.2
stop = ["Observation:"]

[http]
timeout = "15s"

[http.retry]
max_attempts = 5
initial_delay = "250ms"
"#,
        )
        .unwrap();

        let config = CatenaConfig::from_file(&path).unwrap();

        assert!(config.verbose);
        assert_eq!(config.model.provider, ProviderKind::Bedrock);
        assert_eq!(config.model.temperature, Some(0.2));
        assert_eq!(config.model.stop, vec!["Observation:".to_string()]);
        assert_eq!(config.http.timeout, Duration::from_secs(15));
        assert_eq!(config.http.retry.max_attempts, 5);
        assert_eq!(config.http.retry.initial_delay, Duration::from_millis(250));
        assert_eq!(config.agent.max_iterations, 15);
    }

    #[test]
    fn test_from_file_missing() {
        let err = CatenaConfig::from_file("/nonexistent/catena.toml").unwrap_err();
        assert!(matches!(err, CatenaError::Configuration(_)));
    }

    #[test]
    fn test_invalid_temperature_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catena.toml");
        std::fs::write(&path, "[model]\ntemperature = 3.5\n").unwrap();

        let err = CatenaConfig::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("temperature"));
    }

    #[test]
    fn test_fake_provider_requires_responses() {
        let mut config = CatenaConfig::default();
        config.model = ModelConfig::fake(Vec::new());
        assert!(config.validate().is_err());

        config.model = ModelConfig::fake(vec!["ok".into()]);
        config.validate().unwrap();
    }

    #[test]
    fn test_load_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "catena.toml",
                r#"
[model]
model = "gpt-4o"
max_tokens = 100
"#,
            )?;
            jail.set_env("CATENA_MODEL__MAX_TOKENS", "256");
            jail.set_env("CATENA_AGENT__MAX_ITERATIONS", "4");

            let config = CatenaConfig::load().map_err(|e| e.to_string())?;

            assert_eq!(config.model.model, "gpt-4o");
            assert_eq!(config.model.max_tokens, Some(256));
            assert_eq!(config.agent.max_iterations, 4);
            Ok(())
        });
    }

    #[test]
    fn test_provider_names_from_env() {
        Jail::expect_with(|jail| {
            jail.set_env("CATENA_MODEL__PROVIDER", "sagemaker");
            jail.set_env("CATENA_MODEL__MODEL", "my-tgi-endpoint");
            let config = CatenaConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.model.provider, ProviderKind::Sagemaker);

            jail.set_env("CATENA_MODEL__PROVIDER", "cohere");
            let config = CatenaConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.model.provider, ProviderKind::Cohere);
            Ok(())
        });
    }

    #[test]
    fn test_params_from_model_config() {
        let mut model = ModelConfig::default();
        model.temperature = Some(0.1);
        model.stream = true;

        let params = model.params();
        assert_eq!(params.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(params.temperature, Some(0.1));
        assert!(params.stream);
    }
}
