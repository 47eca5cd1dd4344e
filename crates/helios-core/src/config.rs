//! Gateway configuration. Load from TOML or env.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Global application configuration (gateway + upstream tuning).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Application identity shown in `/api/status`.
    pub app_name: String,
    /// HTTP port for the gateway.
    pub port: u16,
    /// LLM mode (`"mock"` or `"live"`). Overridable per-process via
    /// `HELIOS_LLM_MODE`.
    pub llm_mode: String,
    /// Upstream model slug sent in the chat completion request.
    pub llm_model: String,
    /// Upstream chat completions endpoint.
    pub llm_api_url: String,
    /// Token ceiling for the completion.
    pub llm_max_tokens: u32,
    /// Sampling temperature for the completion.
    pub llm_temperature: f32,
    /// Seconds a cached completion stays fresh.
    pub cache_ttl_secs: u64,
}

impl GatewayConfig {
    /// Load config from file and environment. Precedence: env `HELIOS_CONFIG`
    /// path > `config/gateway.toml` > defaults.
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("HELIOS_CONFIG").unwrap_or_else(|_| "config/gateway".to_string());
        let builder = config::Config::builder()
            .set_default("app_name", "Helios Insight Gateway")?
            .set_default("port", 8010_i64)?
            .set_default("llm_mode", "mock")?
            .set_default("llm_model", "meta-llama/llama-3.3-70b-instruct")?
            .set_default("llm_api_url", "https://openrouter.ai/api/v1/chat/completions")?
            .set_default("llm_max_tokens", 512_i64)?
            .set_default("llm_temperature", 0.4_f64)?
            .set_default("cache_ttl_secs", 300_i64)?;

        let path = Path::new(&config_path);
        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        let built = builder
            .add_source(config::Environment::with_prefix("HELIOS").separator("__"))
            .build()?;

        built.try_deserialize()
    }

    /// Cache TTL as a [`Duration`].
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}
