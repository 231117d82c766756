//! Runtime configuration.
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! environment overrides.  Every section is optional in the file.
//!
//! ```toml
//! [llm]
//! base_url = "http://127.0.0.1:8080/v1"
//! model = "phi-3-mini-4k-instruct"
//!
//! [agent]
//! empty_plan_policy = "answer_directly"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{AgentError, Result};
use crate::executor::{EmptyPlanPolicy, ExecutorConfig};

/// Path read when no explicit config file is given.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Environment variables that override file settings.
pub mod env {
    pub const LLM_BASE_URL: &str = "STEWARD_LLM_BASE_URL";
    pub const LLM_MODEL: &str = "STEWARD_LLM_MODEL";
    pub const LLM_API_KEY: &str = "STEWARD_LLM_API_KEY";
    pub const SERPAPI_KEY: &str = "STEWARD_SERPAPI_KEY";
    pub const SESSION: &str = "STEWARD_SESSION";
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Which completion provider to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// An OpenAI-compatible HTTP endpoint.
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    /// The offline echo provider.
    Echo,
}

/// Which planner to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlannerKind {
    /// Ask the model for a JSON plan.
    #[default]
    Llm,
    /// Never plan tool calls.
    Direct,
}

/// Completion provider settings.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub provider: ProviderKind,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub request_timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::OpenAi,
            base_url: "http://127.0.0.1:8080/v1".into(),
            model: "phi-3-mini-4k-instruct".into(),
            api_key: None,
            max_tokens: 512,
            temperature: 0.2,
            top_p: 0.9,
            request_timeout_secs: 120,
        }
    }
}

impl std::fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmSettings")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Orchestration loop settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub default_session_id: String,
    pub tool_timeout_secs: u64,
    pub empty_plan_policy: EmptyPlanPolicy,
    pub planner: PlannerKind,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            default_session_id: "demo".into(),
            tool_timeout_secs: 60,
            empty_plan_policy: EmptyPlanPolicy::Fallback,
            planner: PlannerKind::Llm,
        }
    }
}

impl AgentSettings {
    /// Executor configuration derived from these settings.
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            tool_timeout: Duration::from_secs(self.tool_timeout_secs),
            empty_plan_policy: self.empty_plan_policy,
        }
    }
}

/// Tool settings.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    pub web_search_enabled: bool,
    pub serpapi_api_key: Option<String>,
    pub serpapi_gl: String,
    pub serpapi_google_domain: String,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            web_search_enabled: true,
            serpapi_api_key: None,
            serpapi_gl: "bd".into(),
            serpapi_google_domain: "google.com.bd".into(),
        }
    }
}

impl std::fmt::Debug for ToolSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSettings")
            .field("web_search_enabled", &self.web_search_enabled)
            .field(
                "serpapi_api_key",
                &self.serpapi_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("serpapi_gl", &self.serpapi_gl)
            .field("serpapi_google_domain", &self.serpapi_google_domain)
            .finish()
    }
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Root
// ---------------------------------------------------------------------------

/// Complete runtime configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StewardConfig {
    pub llm: LlmSettings,
    pub agent: AgentSettings,
    pub tools: ToolSettings,
    pub logging: LoggingSettings,
}

impl StewardConfig {
    /// Parse a TOML document.  Missing sections and keys keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| AgentError::Config {
            reason: format!("invalid TOML: {e}"),
        })
    }

    /// Load from `path`, falling back to defaults when the file is absent.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| AgentError::Config {
            reason: format!("failed to read {}: {e}", path.display()),
        })?;

        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "config file loaded");
        Ok(config)
    }

    /// Apply environment overrides using `lookup` to read variables.
    ///
    /// Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(env::LLM_BASE_URL) {
            self.llm.base_url = v;
        }
        if let Some(v) = get(env::LLM_MODEL) {
            self.llm.model = v;
        }
        if let Some(v) = get(env::LLM_API_KEY) {
            self.llm.api_key = Some(v);
        }
        if let Some(v) = get(env::SERPAPI_KEY) {
            self.tools.serpapi_api_key = Some(v);
        }
        if let Some(v) = get(env::SESSION) {
            self.agent.default_session_id = v;
        }
    }

    /// Reject settings the runtime cannot work with.
    pub fn validate(&self) -> Result<()> {
        let fail = |reason: &str| {
            Err(AgentError::Config {
                reason: reason.to_owned(),
            })
        };

        if self.llm.base_url.trim().is_empty() {
            return fail("llm.base_url must not be empty");
        }
        if self.llm.model.trim().is_empty() {
            return fail("llm.model must not be empty");
        }
        if self.llm.max_tokens == 0 {
            return fail("llm.max_tokens must be greater than zero");
        }
        if self.llm.request_timeout_secs == 0 {
            return fail("llm.request_timeout_secs must be greater than zero");
        }
        if !self.llm.temperature.is_finite() || self.llm.temperature < 0.0 {
            return fail("llm.temperature must be a non-negative number");
        }
        if !(self.llm.top_p > 0.0 && self.llm.top_p <= 1.0) {
            return fail("llm.top_p must be in (0, 1]");
        }
        if self.agent.default_session_id.trim().is_empty() {
            return fail("agent.default_session_id must not be empty");
        }
        if self.agent.tool_timeout_secs == 0 {
            return fail("agent.tool_timeout_secs must be greater than zero");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
