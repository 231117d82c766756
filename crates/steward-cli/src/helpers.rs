//! Startup helpers: tracing, configuration and dependency wiring.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, reload};

use steward_agent::config::{DEFAULT_CONFIG_PATH, PlannerKind, ProviderKind};
use steward_agent::{
    AgentExecutor, DirectPlanner, EchoProvider, InMemoryConversationStore, LlmPlanner,
    OpenAiCompatibleProvider, SharedPlanner, SharedProvider, StewardConfig,
};

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Filter used until the configuration has been read.
const BOOTSTRAP_LEVEL: &str = "info";

/// Handle for swapping the log filter once `[logging] level` is known.
pub struct TracingHandle {
    filter: reload::Handle<EnvFilter, Registry>,
    env_override: bool,
}

impl TracingHandle {
    /// Switch to `level`.  A filter taken from `RUST_LOG` is left alone.
    pub fn apply_level(&self, level: &str) {
        if self.env_override {
            return;
        }
        match EnvFilter::try_new(level) {
            Ok(filter) => {
                if let Err(e) = self.filter.reload(filter) {
                    tracing::warn!(error = %e, "failed to apply log level");
                }
            }
            Err(e) => {
                tracing::warn!(level, error = %e, "invalid logging.level, keeping bootstrap filter");
            }
        }
    }
}

/// Install the global subscriber before anything else logs.
///
/// `RUST_LOG` wins for the whole run.  Otherwise the bootstrap level holds
/// until [`TracingHandle::apply_level`] is called.  Logs go to stderr so
/// streamed replies on stdout stay clean.
pub fn init_tracing() -> TracingHandle {
    let (filter, env_override) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, true),
        Err(_) => (EnvFilter::new(BOOTSTRAP_LEVEL), false),
    };
    let (subscriber, handle) = build_subscriber(filter, env_override, std::io::stderr);
    subscriber.init();
    handle
}

fn build_subscriber<W>(
    filter: EnvFilter,
    env_override: bool,
    writer: W,
) -> (impl Subscriber + Send + Sync + 'static, TracingHandle)
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let (filter, handle) = reload::Layer::new(filter);
    let subscriber = tracing_subscriber::registry().with(filter).with(
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(writer)
            .compact(),
    );
    (
        subscriber,
        TracingHandle {
            filter: handle,
            env_override,
        },
    )
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Load configuration: file, then `.env`, then `STEWARD_*` overrides.
pub fn load_config(path: Option<&Path>) -> Result<StewardConfig> {
    dotenvy::dotenv().ok();
    load_config_with(path, |key| std::env::var(key).ok())
}

/// Load configuration from `path`, applying overrides from `lookup`.
pub fn load_config_with<F>(path: Option<&Path>, lookup: F) -> Result<StewardConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
    let mut config = StewardConfig::load(path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;

    config.apply_env(lookup);

    config.validate().context("invalid configuration")?;
    tracing::debug!(
        path = %path.display(),
        provider = ?config.llm.provider,
        level = %config.logging.level,
        "configuration ready"
    );
    Ok(config)
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

pub fn build_provider(config: &StewardConfig) -> Result<SharedProvider> {
    let provider: SharedProvider = match config.llm.provider {
        ProviderKind::OpenAi => Arc::new(
            OpenAiCompatibleProvider::new(config.llm.clone())
                .context("failed to create completion provider")?,
        ),
        ProviderKind::Echo => Arc::new(EchoProvider),
    };
    tracing::info!(
        provider = ?config.llm.provider,
        model = %config.llm.model,
        "completion provider ready"
    );
    Ok(provider)
}

/// Assemble an executor with an in-memory store and the configured tools.
pub fn build_executor(config: &StewardConfig, provider: SharedProvider) -> AgentExecutor {
    let planner: SharedPlanner = match config.agent.planner {
        PlannerKind::Llm => Arc::new(LlmPlanner::new(Arc::clone(&provider))),
        PlannerKind::Direct => Arc::new(DirectPlanner),
    };
    let registry = steward_adapters::build_registry(&config.tools);

    AgentExecutor::new(
        Arc::new(InMemoryConversationStore::new()),
        planner,
        registry,
        provider,
    )
    .with_config(config.agent.executor_config())
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// A cancellation token fired by Ctrl-C for as long as the guard lives.
pub struct CtrlCGuard {
    token: CancellationToken,
    watcher: JoinHandle<()>,
}

impl CtrlCGuard {
    pub fn arm() -> Self {
        let token = CancellationToken::new();
        let child = token.clone();
        let watcher = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                child.cancel();
            }
        });
        Self { token, watcher }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for CtrlCGuard {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}
