//! Wires the Assignment & Lifecycle engine components into one
//! [`Application`], and spawns the two background loops that run outside
//! any tool call: the stale-agent sweeper and the push-retry drain.

use anyhow::{Context, Result};
use marcus_board_providers::{GitHubProjectsProvider, InMemoryBoardProvider, LinearProvider, PlankaProvider};
use marcus_core::advisor::{AiAdvisor, FallbackAdvisor};
use marcus_core::assignment::{sweep_stale_agents, AssignmentEngine};
use marcus_core::board_provider::BoardProvider;
use marcus_core::lifecycle::LifecycleStateMachine;
use marcus_core::progress::ProgressHandler;
use marcus_core::reconciliation::PushRetryQueue;
use marcus_core::store::TaskStore;
use marcus_mcp_protocol::ToolDispatcher;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{Config, ProviderKind};

/// Everything the stdio transport needs to serve tool calls, plus the
/// pieces background loops close over.
pub struct Application {
    pub dispatcher: Arc<ToolDispatcher>,
    store: Arc<TaskStore>,
    provider: Arc<dyn BoardProvider>,
    push_retry: Arc<PushRetryQueue>,
    stale_ttl: chrono::Duration,
    stale_check_interval: Duration,
    push_retry_interval: Duration,
}

impl Application {
    /// The board provider this application was wired against, exposed so
    /// callers can run a startup reachability probe when
    /// `require_provider_on_start` is set.
    pub fn provider(&self) -> &dyn BoardProvider {
        self.provider.as_ref()
    }
}

fn build_provider(config: &Config) -> Result<Arc<dyn BoardProvider>> {
    let pc = &config.provider_config;
    let provider: Arc<dyn BoardProvider> = match config.provider {
        ProviderKind::InMemory => Arc::new(InMemoryBoardProvider::new()),
        ProviderKind::Planka => {
            let base_url = pc.base_url.clone().context("planka provider requires base_url")?;
            let board_id = pc.board_id.clone().context("planka provider requires board_id")?;
            let token = pc.api_token.clone().unwrap_or_default();
            Arc::new(PlankaProvider::new(base_url, token, board_id))
        }
        ProviderKind::Github => {
            let owner = pc.owner.clone().context("github provider requires owner")?;
            let repo = pc.repo.clone().context("github provider requires repo")?;
            let token = pc.api_token.clone().unwrap_or_default();
            let project_number = pc.project_number.unwrap_or(1);
            Arc::new(GitHubProjectsProvider::new(token, owner, repo, project_number))
        }
        ProviderKind::Linear => {
            let team_id = pc.team_id.clone().context("linear provider requires team_id")?;
            let api_key = pc.api_token.clone().unwrap_or_default();
            Arc::new(LinearProvider::new(api_key, team_id))
        }
    };
    Ok(provider)
}

/// A real AI backend is out of scope; `config.ai.enabled` is read here only
/// so a future pluggable backend has somewhere to hook in. Today every
/// configuration resolves to the deterministic [`FallbackAdvisor`], which is
/// never itself a failure mode.
fn build_advisor(config: &Config) -> Arc<dyn AiAdvisor> {
    if config.ai.enabled {
        info!("ai advisor enabled in config but no AI backend is wired in this build; using deterministic fallback");
    }
    Arc::new(FallbackAdvisor)
}

/// Build the full set of wired components from a validated [`Config`].
pub fn initialize_app(config: &Config) -> Result<Application> {
    config.validate().context("invalid configuration")?;

    let store = Arc::new(TaskStore::new());
    let provider = build_provider(config).context("failed to construct board provider")?;
    let advisor = build_advisor(config);
    let push_retry = Arc::new(PushRetryQueue::new(config.reconciliation.push_retry_limit));

    let lifecycle = Arc::new(LifecycleStateMachine::new(store.clone(), provider.clone(), push_retry.clone()));
    let assignment = Arc::new(AssignmentEngine::new(
        store.clone(),
        provider.clone(),
        advisor.clone(),
        push_retry.clone(),
        config.assignment.assignment_retry_limit,
    ));
    let progress = Arc::new(ProgressHandler::new(store.clone(), lifecycle.clone(), provider.clone(), advisor.clone()));

    let deadline = Duration::from_millis(config.tool_dispatcher.deadline_ms);
    let dispatcher = Arc::new(ToolDispatcher::new(
        store.clone(),
        provider.clone(),
        assignment,
        progress,
        push_retry.clone(),
        deadline,
    ));

    info!("application initialized successfully");
    Ok(Application {
        dispatcher,
        store,
        provider,
        push_retry,
        stale_ttl: chrono::Duration::seconds(config.assignment.stale_ttl_seconds),
        stale_check_interval: Duration::from_secs(config.assignment.stale_check_seconds),
        push_retry_interval: Duration::from_secs(config.reconciliation.push_retry_interval_seconds),
    })
}

/// Best-effort reachability probe used when `require_provider_on_start` is
/// set; a failure here is the only path to exit code 69.
pub async fn check_provider_reachable(provider: &dyn BoardProvider) -> Result<()> {
    provider
        .get_board_summary()
        .await
        .map(|_| ())
        .map_err(|e| anyhow::anyhow!("board provider unreachable at startup: {e}"))
}

/// Spawns the stale-agent sweeper and the push-retry drain as background
/// tasks, returning their join handles so the caller can let them run for
/// the life of the process.
pub fn spawn_background_loops(app: &Application) -> Vec<tokio::task::JoinHandle<()>> {
    let mut handles = Vec::new();

    let store = app.store.clone();
    let provider = app.provider.clone();
    let ttl = app.stale_ttl;
    let check_interval = app.stale_check_interval;
    handles.push(tokio::spawn(async move {
        let mut interval = tokio::time::interval(check_interval);
        loop {
            interval.tick().await;
            sweep_stale_agents(&store, provider.as_ref(), ttl).await;
        }
    }));

    let provider = app.provider.clone();
    let push_retry = app.push_retry.clone();
    let push_retry_interval = app.push_retry_interval;
    handles.push(tokio::spawn(async move {
        let mut interval = tokio::time::interval(push_retry_interval);
        loop {
            interval.tick().await;
            let pending = push_retry.pending_count();
            if pending > 0 {
                warn!(pending, "draining queued push-retry mirror moves");
            }
            push_retry.drain_once(provider.as_ref()).await;
        }
    }));

    handles
}
