//! Tools for Steward: web search through DuckDuckGo and SerpApi.
//!
//! Each tool implements [`steward_agent::Tool`].  [`build_registry`] creates
//! a registry holding every tool enabled by the configuration.

pub mod serp_search;
pub mod web_search;

use std::sync::Arc;

use steward_agent::config::ToolSettings;
use steward_agent::tool::{SharedTool, ToolRegistry};

pub use serp_search::SerpSearchTool;
pub use web_search::WebSearchTool;

/// Tools enabled by `settings`.
///
/// SerpApi search is only offered when an API key is configured.
pub fn enabled_tools(settings: &ToolSettings) -> Vec<SharedTool> {
    let mut tools: Vec<SharedTool> = Vec::new();

    if settings.web_search_enabled {
        tools.push(Arc::new(WebSearchTool::new()));
    }
    if settings.serpapi_api_key.is_some() {
        tools.push(Arc::new(SerpSearchTool::new(
            settings.serpapi_api_key.clone(),
            settings.serpapi_gl.clone(),
            settings.serpapi_google_domain.clone(),
        )));
    }

    tools
}

/// A registry holding [`enabled_tools`].
pub fn build_registry(settings: &ToolSettings) -> ToolRegistry {
    let registry = ToolRegistry::from_tools(enabled_tools(settings));
    tracing::info!(tool_count = registry.len(), "tool registry ready");
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_web_search_only() {
        let registry = build_registry(&ToolSettings::default());
        assert_eq!(registry.len(), 1);
        // Search synonyms resolve to DuckDuckGo while SerpApi is absent.
        assert_eq!(registry.try_get("serpsearch").unwrap().name(), "WebSearch");
        assert_eq!(registry.try_get("Google").unwrap().name(), "WebSearch");
    }

    #[test]
    fn serpapi_key_adds_serp_search() {
        let settings = ToolSettings {
            serpapi_api_key: Some("key".into()),
            ..ToolSettings::default()
        };
        let registry = build_registry(&settings);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.try_get("SerpSearch").unwrap().name(), "SerpSearch");
    }

    #[test]
    fn everything_disabled() {
        let settings = ToolSettings {
            web_search_enabled: false,
            ..ToolSettings::default()
        };
        assert!(build_registry(&settings).is_empty());
    }
}
