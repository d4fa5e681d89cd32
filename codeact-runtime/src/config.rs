//! Runtime configuration
//!
//! Values come from three layers: built-in defaults, environment variables,
//! then explicit overrides (the CLI). Provider values are opaque to the agent.

use codeact_error::{Error, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// DashScope's OpenAI-compatible endpoint
pub const DEFAULT_BASE_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";
pub const DEFAULT_MODEL: &str = "qwen-flash";
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_SANDBOX_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_PYTHON: &str = "python3";

/// Modules bound by name in every execution scope
pub const DEFAULT_PRELOAD: &[&str] = &["math", "json"];

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_u64(name: &str) -> Result<Option<u64>> {
    match env_var(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| Error::config_invalid(name, format!("expected an integer, got '{}': {}", raw, e))),
    }
}

// ============================================================================
// Provider configuration
// ============================================================================

/// Configuration for the completion client
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub default_model: Option<String>,
    pub headers: HashMap<String, String>,
    pub timeout_secs: Option<u64>,
}

impl ProviderConfig {
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            base_url: Some("https://api.openai.com/v1".into()),
            default_model: Some("gpt-4o".into()),
            headers: HashMap::new(),
            timeout_secs: Some(DEFAULT_PROVIDER_TIMEOUT_SECS),
        }
    }

    pub fn dashscope(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            base_url: Some(DEFAULT_BASE_URL.into()),
            default_model: Some(DEFAULT_MODEL.into()),
            headers: HashMap::new(),
            timeout_secs: Some(DEFAULT_PROVIDER_TIMEOUT_SECS),
        }
    }

    /// Any OpenAI-compatible server without credentials (vLLM, Ollama, ...)
    pub fn local(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: None,
            base_url: Some(base_url.into()),
            default_model: Some(model.into()),
            headers: HashMap::new(),
            timeout_secs: Some(300),
        }
    }

    /// Load from `CODEACT_*` variables.
    ///
    /// The credential falls back to `DASHSCOPE_API_KEY`, then `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let api_key = env_var("CODEACT_API_KEY")
            .or_else(|| env_var("DASHSCOPE_API_KEY"))
            .or_else(|| env_var("OPENAI_API_KEY"));

        Ok(Self {
            api_key,
            base_url: Some(env_var("CODEACT_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into())),
            default_model: Some(env_var("CODEACT_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into())),
            headers: HashMap::new(),
            timeout_secs: Some(env_u64("CODEACT_TIMEOUT_SECS")?.unwrap_or(DEFAULT_PROVIDER_TIMEOUT_SECS)),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

// ============================================================================
// Sandbox configuration
// ============================================================================

/// Configuration for the code execution sandbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxConfig {
    /// Interpreter executable
    pub python: PathBuf,
    /// Wall-clock limit for one execution
    pub timeout: Duration,
    /// Modules importable by name without an import statement
    pub preload: Vec<String>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            python: PathBuf::from(DEFAULT_PYTHON),
            timeout: Duration::from_secs(DEFAULT_SANDBOX_TIMEOUT_SECS),
            preload: DEFAULT_PRELOAD.iter().map(|m| m.to_string()).collect(),
        }
    }
}

impl SandboxConfig {
    /// Load from `CODEACT_PYTHON` and `CODEACT_SANDBOX_TIMEOUT_SECS`
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(python) = env_var("CODEACT_PYTHON") {
            config.python = PathBuf::from(python);
        }
        if let Some(secs) = env_u64("CODEACT_SANDBOX_TIMEOUT_SECS")? {
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    /// Override with CLI parameters
    pub fn with_cli_overrides(mut self, python: Option<PathBuf>, timeout_secs: Option<u64>) -> Self {
        if let Some(python) = python {
            self.python = python;
        }
        if let Some(secs) = timeout_secs {
            self.timeout = Duration::from_secs(secs);
        }
        self
    }
}
