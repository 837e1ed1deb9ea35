use crate::error::{MarcusError, Result};
use crate::models::{Agent, TaskDraft};

/// Validation rules shared by the Task Store, Assignment Engine and Tool Dispatcher.
pub struct Validator;

impl Validator {
    /// Agent ids and names: 1-50 chars, alphanumeric boundaries, hyphen/underscore allowed inside.
    pub fn validate_agent_name(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(MarcusError::empty_field("name"));
        }
        if name.len() > 50 {
            return Err(MarcusError::validation("agent name must be at most 50 characters"));
        }
        let first = name.chars().next().unwrap();
        let last = name.chars().last().unwrap();
        if !first.is_alphanumeric() || !last.is_alphanumeric() {
            return Err(MarcusError::validation(
                "agent name must start and end with a letter or number",
            ));
        }
        if !name.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_') {
            return Err(MarcusError::validation(
                "agent name may only contain letters, numbers, hyphens and underscores",
            ));
        }
        Ok(())
    }

    pub fn validate_capacity(capacity: u32) -> Result<()> {
        if capacity == 0 {
            return Err(MarcusError::validation("capacity must be at least 1"));
        }
        Ok(())
    }

    pub fn validate_task_draft(draft: &TaskDraft) -> Result<()> {
        if draft.name.trim().is_empty() {
            return Err(MarcusError::empty_field("name"));
        }
        if draft.name.len() > 200 {
            return Err(MarcusError::validation("task name must be at most 200 characters"));
        }
        if draft.description.len() > 4000 {
            return Err(MarcusError::validation(
                "task description must be at most 4000 characters",
            ));
        }
        if draft.estimated_hours < 0.0 {
            return Err(MarcusError::validation("estimated_hours must be >= 0"));
        }
        Ok(())
    }

    pub fn validate_progress_percent(percent: u8) -> Result<()> {
        if percent > 100 {
            return Err(MarcusError::validation("progress percent must be in [0, 100]"));
        }
        Ok(())
    }

    /// True if `deps`, once added to `agent`'s unrelated graph, would not
    /// introduce a cycle reachable from `task_id`. Used by the Task Store
    /// before accepting an `upsert_task`.
    pub fn would_introduce_cycle(
        task_id: &str,
        deps: &std::collections::BTreeSet<String>,
        lookup: impl Fn(&str) -> Option<std::collections::BTreeSet<String>>,
    ) -> bool {
        let mut stack: Vec<String> = deps.iter().cloned().collect();
        let mut visited = std::collections::HashSet::new();
        while let Some(current) = stack.pop() {
            if current == task_id {
                return true;
            }
            if !visited.insert(current.clone()) {
                continue;
            }
            if let Some(next_deps) = lookup(&current) {
                stack.extend(next_deps);
            }
        }
        false
    }

    pub fn validate_agent(agent: &Agent) -> Result<()> {
        Self::validate_agent_name(&agent.name)?;
        Self::validate_capacity(agent.capacity)
    }
}
