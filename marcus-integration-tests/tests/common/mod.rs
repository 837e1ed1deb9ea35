//! Shared harness for end-to-end scenario tests: wires a [`ToolDispatcher`]
//! against an [`InMemoryBoardProvider`] the same way `marcus-mcp-server`'s
//! `setup::initialize_app` does, but keeps the store and provider handles
//! reachable so tests can assert on internal state directly.

use marcus_board_providers::InMemoryBoardProvider;
use marcus_core::advisor::FallbackAdvisor;
use marcus_core::assignment::AssignmentEngine;
use marcus_core::board_provider::BoardProvider;
use marcus_core::lifecycle::LifecycleStateMachine;
use marcus_core::progress::ProgressHandler;
use marcus_core::reconciliation::PushRetryQueue;
use marcus_core::store::TaskStore;
use marcus_core::{Agent, Task};
use marcus_mcp_protocol::ToolDispatcher;
use std::sync::Arc;
use std::time::Duration;

pub struct Harness {
    pub dispatcher: Arc<ToolDispatcher>,
    pub store: Arc<TaskStore>,
    pub provider: Arc<InMemoryBoardProvider>,
    pub push_retry: Arc<PushRetryQueue>,
}

impl Harness {
    pub fn new() -> Self {
        Self::seeded(Vec::new(), Vec::new())
    }

    pub fn with_retry_limit(retry_limit: u32) -> Self {
        Self::build(Vec::new(), Vec::new(), retry_limit)
    }

    /// Seeds both the internal store and the board provider with the same
    /// tasks, the way they'd already agree on startup before any drift.
    /// Agents are only meaningful internally, so they go straight into the
    /// store.
    pub fn seeded(tasks: Vec<Task>, agents: Vec<Agent>) -> Self {
        Self::build(tasks, agents, 3)
    }

    fn build(tasks: Vec<Task>, agents: Vec<Agent>, retry_limit: u32) -> Self {
        let store = Arc::new(TaskStore::new());
        let provider = Arc::new(InMemoryBoardProvider::with_tasks(tasks.clone()));
        let provider_dyn: Arc<dyn BoardProvider> = provider.clone();
        for task in tasks {
            store.upsert_task(task).expect("seed task");
        }
        for agent in agents {
            store.upsert_agent(agent).expect("seed agent");
        }

        let advisor = Arc::new(FallbackAdvisor);
        let push_retry = Arc::new(PushRetryQueue::new(retry_limit));
        let lifecycle = Arc::new(LifecycleStateMachine::new(store.clone(), provider_dyn.clone(), push_retry.clone()));
        let assignment = Arc::new(AssignmentEngine::new(
            store.clone(),
            provider_dyn.clone(),
            advisor.clone(),
            push_retry.clone(),
            retry_limit,
        ));
        let progress = Arc::new(ProgressHandler::new(store.clone(), lifecycle, provider_dyn.clone(), advisor));
        let dispatcher = Arc::new(ToolDispatcher::new(
            store.clone(),
            provider_dyn,
            assignment,
            progress,
            push_retry.clone(),
            Duration::from_secs(5),
        ));
        Self {
            dispatcher,
            store,
            provider,
            push_retry,
        }
    }
}
