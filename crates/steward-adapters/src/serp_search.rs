//! Google search through SerpApi.

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use steward_agent::error::ToolError;
use steward_agent::tool::Tool;

const SERPAPI_URL: &str = "https://serpapi.com/search.json";
const SERPAPI_SEARCH_PAGE: &str = "https://serpapi.com/search";
const MAX_RESULTS: usize = 5;
const TOOL_NAME: &str = "SerpSearch";

/// SerpApi-backed search tool.
#[derive(Clone)]
pub struct SerpSearchTool {
    client: reqwest::Client,
    api_key: Option<String>,
    gl: String,
    google_domain: String,
}

impl std::fmt::Debug for SerpSearchTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerpSearchTool")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("gl", &self.gl)
            .field("google_domain", &self.google_domain)
            .finish()
    }
}

impl SerpSearchTool {
    /// `gl` and `google_domain` select the Google market, e.g. `bd` and
    /// `google.com.bd`.
    pub fn new(
        api_key: Option<String>,
        gl: impl Into<String>,
        google_domain: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            gl: gl.into(),
            google_domain: google_domain.into(),
        }
    }

    pub fn request_url(&self, query: &str, api_key: &str) -> Result<Url, ToolError> {
        Url::parse_with_params(
            SERPAPI_URL,
            &[
                ("engine", "google"),
                ("q", query),
                ("gl", self.gl.as_str()),
                ("google_domain", self.google_domain.as_str()),
                ("api_key", api_key),
                ("num", "5"),
            ],
        )
        .map_err(|e| ToolError::InvalidInput {
            tool: TOOL_NAME.into(),
            reason: e.to_string(),
        })
    }

    /// Search page link shown when nothing useful came back.
    pub fn fallback_link(&self, query: &str) -> String {
        Url::parse_with_params(SERPAPI_SEARCH_PAGE, &[("q", query), ("gl", self.gl.as_str())])
            .map(String::from)
            .unwrap_or_else(|_| SERPAPI_SEARCH_PAGE.to_owned())
    }

    async fn search(&self, query: &str, api_key: &str) -> Result<String, ToolError> {
        let url = self.request_url(query, api_key)?;
        debug!(query, gl = %self.gl, "querying serpapi");

        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;

        let results = organic_results(&body);
        debug!(query, count = results.len(), "serpapi search completed");

        if results.is_empty() {
            return Ok(format!(
                "No good results found. See: {}",
                self.fallback_link(query)
            ));
        }
        Ok(format!("Top results:\n• {}", results.join("\n• ")))
    }
}

#[async_trait]
impl Tool for SerpSearchTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Search the web via SerpApi (Google) for global and regional results."
    }

    async fn execute(&self, input: &str, cancel: &CancellationToken) -> Result<String, ToolError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(ToolError::InvalidInput {
                tool: TOOL_NAME.into(),
                reason: "SerpApi key is not configured".into(),
            });
        };

        cancel
            .run_until_cancelled(self.search(input, api_key))
            .await
            .unwrap_or(Err(ToolError::Cancelled))
    }
}

/// `title - link` lines for the first organic results that have both.
pub fn organic_results(body: &Value) -> Vec<String> {
    body.get("organic_results")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .take(MAX_RESULTS)
                .filter_map(|r| {
                    let title = r.get("title")?.as_str()?;
                    let link = r.get("link")?.as_str()?;
                    Some(format!("{title} - {link}"))
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn tool(key: Option<&str>) -> SerpSearchTool {
        SerpSearchTool::new(key.map(str::to_owned), "bd", "google.com.bd")
    }

    #[test]
    fn request_url_carries_market_and_key() {
        let url = tool(Some("k")).request_url("dhaka weather", "k").unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("engine".into(), "google".into())));
        assert!(pairs.contains(&("q".into(), "dhaka weather".into())));
        assert!(pairs.contains(&("gl".into(), "bd".into())));
        assert!(pairs.contains(&("google_domain".into(), "google.com.bd".into())));
        assert!(pairs.contains(&("api_key".into(), "k".into())));
        assert!(pairs.contains(&("num".into(), "5".into())));
    }

    #[test]
    fn organic_results_take_first_five_complete_entries() {
        let mut items: Vec<Value> = vec![json!({"title": "no link"})];
        items.extend((0..6).map(|i| json!({"title": format!("T{i}"), "link": format!("https://x/{i}")})));
        let body = json!({"organic_results": items});

        let results = organic_results(&body);
        assert_eq!(results.len(), 4);
        assert_eq!(results[0], "T0 - https://x/0");
    }

    #[test]
    fn missing_results_is_empty() {
        assert!(organic_results(&json!({"error": "quota"})).is_empty());
    }

    #[test]
    fn fallback_link_includes_market() {
        assert_eq!(
            tool(None).fallback_link("a b"),
            "https://serpapi.com/search?q=a+b&gl=bd"
        );
    }

    #[test]
    fn debug_hides_key() {
        assert!(!format!("{:?}", tool(Some("secret-key"))).contains("secret-key"));
    }

    #[tokio::test]
    async fn missing_key_is_invalid_input() {
        for key in [None, Some("  ")] {
            let result = tool(key).execute("q", &CancellationToken::new()).await;
            assert!(matches!(result, Err(ToolError::InvalidInput { .. })));
        }
    }
}
