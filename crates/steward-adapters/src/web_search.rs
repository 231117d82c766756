//! Web search via the DuckDuckGo instant-answer API.
//!
//! No API key is needed.  Failures are reported as text so the model can
//! still hand the user a search link.

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use steward_agent::error::ToolError;
use steward_agent::tool::Tool;

// ═══════════════════════════════════════════════════════════════════════
//  Constants
// ═══════════════════════════════════════════════════════════════════════

/// Instant-answer API endpoint.
const DUCKDUCKGO_API_URL: &str = "https://api.duckduckgo.com/";

/// Human-facing search page.
const DUCKDUCKGO_SEARCH_URL: &str = "https://duckduckgo.com/";

/// Maximum number of snippets included in the observation.
const MAX_SNIPPETS: usize = 5;

const TOOL_NAME: &str = "WebSearch";

// ═══════════════════════════════════════════════════════════════════════
//  Tool
// ═══════════════════════════════════════════════════════════════════════

/// DuckDuckGo-backed web search tool.
#[derive(Debug, Clone)]
pub struct WebSearchTool {
    client: reqwest::Client,
    endpoint: String,
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

impl WebSearchTool {
    pub fn new() -> Self {
        Self::with_endpoint(DUCKDUCKGO_API_URL)
    }

    /// Use a different API endpoint (a proxy or a local mock).
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    /// The API request URL for `query`.
    pub fn request_url(&self, query: &str) -> Result<Url, ToolError> {
        Url::parse_with_params(
            &self.endpoint,
            &[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ],
        )
        .map_err(|e| ToolError::InvalidInput {
            tool: TOOL_NAME.into(),
            reason: format!("invalid endpoint: {e}"),
        })
    }

    async fn fetch(&self, query: &str) -> Result<Value, ToolError> {
        let url = self.request_url(query)?;
        debug!(query, "querying duckduckgo");

        let value = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;
        Ok(value)
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Searches the web for information. Use this tool whenever the user asks for recent or factual data."
    }

    async fn execute(&self, input: &str, cancel: &CancellationToken) -> Result<String, ToolError> {
        let Some(result) = cancel.run_until_cancelled(self.fetch(input)).await else {
            return Err(ToolError::Cancelled);
        };

        match result {
            Ok(body) => Ok(format_instant_answer(input, &body).unwrap_or_else(|| {
                format!(
                    "I couldn't extract snippets, but here's a direct search link: {}",
                    search_link(input)
                )
            })),
            Err(e) => {
                warn!(query = input, error = %e, "web search failed");
                Ok(format!("WebSearch error: {e}. Open: {}", search_link(input)))
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Response handling
// ═══════════════════════════════════════════════════════════════════════

/// Link to the search page for `query`.
pub fn search_link(query: &str) -> String {
    Url::parse_with_params(DUCKDUCKGO_SEARCH_URL, &[("q", query)])
        .map(String::from)
        .unwrap_or_else(|_| DUCKDUCKGO_SEARCH_URL.to_owned())
}

/// Collect the abstract and related-topic snippets, or `None` when the
/// response holds no usable text.
pub fn format_instant_answer(query: &str, body: &Value) -> Option<String> {
    let non_blank = |v: &Value| {
        v.as_str()
            .filter(|s| !s.trim().is_empty())
            .map(str::to_owned)
    };

    let mut snippets: Vec<String> = body.get("AbstractText").and_then(non_blank).into_iter().collect();

    if let Some(topics) = body.get("RelatedTopics").and_then(Value::as_array) {
        snippets.extend(topics.iter().filter_map(|t| t.get("Text").and_then(non_blank)));
    }

    if snippets.is_empty() {
        return None;
    }

    snippets.truncate(MAX_SNIPPETS);
    Some(format!(
        "Top web results for '{query}':\n• {}",
        snippets.join("\n• ")
    ))
}
