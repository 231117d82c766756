//! Tool capability trait and the name-keyed tool registry.
//!
//! Tools are registered once at startup and shared read-only afterwards.
//! Lookup keys are normalised (trimmed, lowercased) so the model may refer to
//! a tool as `" websearch "` and still reach `WebSearch`.
//!
//! ```rust
//! # use std::sync::Arc;
//! # use async_trait::async_trait;
//! # use tokio_util::sync::CancellationToken;
//! # use steward_agent::tool::{Tool, ToolRegistry};
//! # use steward_agent::error::ToolError;
//! struct Clock;
//!
//! #[async_trait]
//! impl Tool for Clock {
//!     fn name(&self) -> &str { "Clock" }
//!     fn description(&self) -> &str { "Current time" }
//!     async fn execute(&self, _: &str, _: &CancellationToken) -> Result<String, ToolError> {
//!         Ok("noon".into())
//!     }
//! }
//!
//! let registry = ToolRegistry::new();
//! registry.register(Arc::new(Clock));
//! assert!(registry.try_get("  CLOCK ").is_some());
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use crate::error::ToolError;

/// Extra lookup keys registered alongside a tool of the given name.
///
/// Each entry is `(primary name, aliases)`.
pub const BUILTIN_ALIASES: &[(&str, &[&str])] = &[(
    "WebSearch",
    &["SerpSearch", "WebSearch", "Google", "Search", "Internet search"],
)];

// ---------------------------------------------------------------------------
// Tool trait
// ---------------------------------------------------------------------------

/// A named capability the agent can invoke with a text input.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the planner uses to refer to this tool.
    fn name(&self) -> &str;

    /// One-line description shown to the planner.
    fn description(&self) -> &str;

    /// Run the tool.  Implementations should stop early once `cancel` fires
    /// and return [`ToolError::Cancelled`].
    async fn execute(&self, input: &str, cancel: &CancellationToken) -> Result<String, ToolError>;
}

/// Shared handle to a registered tool.
pub type SharedTool = Arc<dyn Tool>;

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct Entry {
    tool: SharedTool,
    alias: bool,
}

/// Concurrent tool registry backed by [`DashMap`].
///
/// Cloning is cheap and shares the underlying map.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    inner: Arc<DashMap<String, Entry>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self.all().iter().map(|t| t.name().to_owned()).collect();
        f.debug_struct("ToolRegistry").field("tools", &names).finish()
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

impl ToolRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every tool in `tools`.
    pub fn from_tools(tools: impl IntoIterator<Item = SharedTool>) -> Self {
        let registry = Self::new();
        for tool in tools {
            registry.register(tool);
        }
        registry
    }

    /// Register a tool under its own name.
    ///
    /// An existing entry with the same name is replaced.  Names listed in
    /// [`BUILTIN_ALIASES`] for this tool are added as aliases.
    pub fn register(&self, tool: SharedTool) {
        let key = normalize(tool.name());
        if key.is_empty() {
            tracing::warn!("ignoring tool with an empty name");
            return;
        }

        tracing::info!(tool = %tool.name(), "tool registered");
        self.inner.insert(
            key.clone(),
            Entry {
                tool: Arc::clone(&tool),
                alias: false,
            },
        );

        let builtin = BUILTIN_ALIASES
            .iter()
            .find(|(primary, _)| normalize(primary) == key)
            .map(|(_, aliases)| *aliases)
            .unwrap_or_default();
        self.add_aliases(&tool, builtin.iter().copied());
    }

    /// Register a tool and make it reachable under additional names.
    pub fn register_with_aliases<'a>(
        &self,
        tool: SharedTool,
        aliases: impl IntoIterator<Item = &'a str>,
    ) {
        self.register(Arc::clone(&tool));
        self.add_aliases(&tool, aliases);
    }

    /// Aliases never replace an existing key.
    fn add_aliases<'a>(&self, tool: &SharedTool, aliases: impl IntoIterator<Item = &'a str>) {
        for alias in aliases {
            let key = normalize(alias);
            if key.is_empty() {
                continue;
            }
            self.inner.entry(key).or_insert_with(|| {
                tracing::debug!(tool = %tool.name(), alias = %alias, "tool alias added");
                Entry {
                    tool: Arc::clone(tool),
                    alias: true,
                }
            });
        }
    }

    /// Look up a tool by name or alias, ignoring case and surrounding
    /// whitespace.
    pub fn try_get(&self, name: &str) -> Option<SharedTool> {
        self.inner
            .get(&normalize(name))
            .map(|entry| Arc::clone(&entry.tool))
    }

    /// Every registered tool once, sorted by name.  Aliases are not repeated.
    pub fn all(&self) -> Vec<SharedTool> {
        let mut tools: Vec<SharedTool> = self
            .inner
            .iter()
            .filter(|entry| !entry.alias)
            .map(|entry| Arc::clone(&entry.tool))
            .collect();
        tools.sort_by(|a, b| a.name().cmp(b.name()));
        tools
    }

    /// Number of distinct registered tools.
    pub fn len(&self) -> usize {
        self.inner.iter().filter(|entry| !entry.alias).count()
    }

    /// Returns `true` when no tool is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
