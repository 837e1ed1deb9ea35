//! The AI Advisor, optional: produces assignment instructions and
//! blocker-resolution suggestions, with a deterministic fallback when the
//! AI engine is disabled, times out, or lacks credentials.

use crate::models::{Agent, Severity, Task};
use async_trait::async_trait;
use handlebars::Handlebars;
use once_cell::sync::Lazy;
use serde_json::json;
use std::time::Duration;

/// Capability-set interface satisfied by a real AI backend or the
/// deterministic [`FallbackAdvisor`].
#[async_trait]
pub trait AiAdvisor: Send + Sync {
    async fn generate_task_instructions(&self, task: &Task, agent: &Agent) -> Option<String>;

    async fn suggest_blocker_resolutions(&self, task: &Task, description: &str, severity: Severity) -> Option<Vec<String>>;

    /// Optional: best-effort task-type classification. Not currently
    /// consulted by the assignment path; kept for forward compatibility.
    async fn classify_task_type(&self, _task: &Task) -> Option<String> {
        None
    }

    fn deadline(&self) -> Duration {
        Duration::from_secs(5)
    }
}

const INSTRUCTIONS_TEMPLATE: &str = "\
Task: {{name}}
Description: {{description}}
Priority: {{priority}}
{{#if labels}}Labels: {{labels}}
{{/if}}
Assigned to: {{agent_name}} ({{agent_role}})

Complete this task and report progress via report_task_progress. If you hit \
an obstacle, report it via report_blocker with a clear description.";

static TEMPLATES: Lazy<Handlebars<'static>> = Lazy::new(|| {
    let mut hb = Handlebars::new();
    hb.register_template_string("instructions", INSTRUCTIONS_TEMPLATE)
        .expect("static instructions template must compile");
    hb
});

/// Deterministic, template-based advisor used when the AI engine is
/// disabled or unreachable. It is always available and never fails — it is
/// the thing the real AI Advisor falls back *to*, not a distinct failure mode.
pub struct FallbackAdvisor;

#[async_trait]
impl AiAdvisor for FallbackAdvisor {
    async fn generate_task_instructions(&self, task: &Task, agent: &Agent) -> Option<String> {
        let labels: Vec<&String> = task.labels.iter().collect();
        let rendered = TEMPLATES
            .render(
                "instructions",
                &json!({
                    "name": task.name,
                    "description": task.description,
                    "priority": task.priority.to_string(),
                    "labels": if labels.is_empty() { None } else { Some(labels.iter().map(|l| l.as_str()).collect::<Vec<_>>().join(", ")) },
                    "agent_name": agent.name,
                    "agent_role": agent.role,
                }),
            )
            .unwrap_or_else(|_| format!("Complete task: {}", task.name));
        Some(rendered)
    }

    async fn suggest_blocker_resolutions(&self, _task: &Task, _description: &str, severity: Severity) -> Option<Vec<String>> {
        Some(static_suggestions(severity))
    }
}

/// Static suggestion list keyed on severity.
pub fn static_suggestions(severity: Severity) -> Vec<String> {
    match severity {
        Severity::Low => vec!["check docs".to_string(), "attempt workaround".to_string()],
        Severity::Medium => vec![
            "check docs".to_string(),
            "attempt workaround".to_string(),
            "ask a teammate".to_string(),
        ],
        Severity::High => vec![
            "ask PM".to_string(),
            "check docs".to_string(),
            "attempt workaround".to_string(),
        ],
    }
}

/// Runs `advisor`'s call with its configured deadline, falling back to
/// `FallbackAdvisor` on timeout — callers never see the AI engine's absence
/// or slowness as an error. AI failure is never fatal to the caller.
pub async fn generate_instructions_with_fallback(advisor: &dyn AiAdvisor, task: &Task, agent: &Agent) -> String {
    let deadline = advisor.deadline();
    match tokio::time::timeout(deadline, advisor.generate_task_instructions(task, agent)).await {
        Ok(Some(instructions)) => instructions,
        _ => FallbackAdvisor
            .generate_task_instructions(task, agent)
            .await
            .unwrap_or_default(),
    }
}

pub async fn suggest_resolutions_with_fallback(
    advisor: &dyn AiAdvisor,
    task: &Task,
    description: &str,
    severity: Severity,
) -> Vec<String> {
    let deadline = advisor.deadline();
    match tokio::time::timeout(deadline, advisor.suggest_blocker_resolutions(task, description, severity)).await {
        Ok(Some(suggestions)) if !suggestions.is_empty() => suggestions,
        _ => static_suggestions(severity),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn task() -> Task {
        Task {
            id: "t1".into(),
            name: "Write parser".into(),
            description: "Parse the config file".into(),
            status: crate::models::TaskStatus::Todo,
            priority: crate::models::Priority::High,
            labels: ["rust".to_string()].into_iter().collect::<BTreeSet<_>>(),
            dependencies: BTreeSet::new(),
            estimated_hours: 2.0,
            actual_hours: 0.0,
            assigned_to: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            due_date: None,
        }
    }

    #[tokio::test]
    async fn fallback_instructions_are_never_empty() {
        let agent = Agent::new("a1", "agent-1", "coder", vec!["rust".into()]);
        let instructions = FallbackAdvisor.generate_task_instructions(&task(), &agent).await.unwrap();
        assert!(!instructions.is_empty());
        assert!(instructions.contains("Write parser"));
    }

    #[test]
    fn suggestions_scale_with_severity() {
        assert_eq!(static_suggestions(Severity::Low).len(), 2);
        assert_eq!(static_suggestions(Severity::High).len(), 3);
        assert!(static_suggestions(Severity::High).contains(&"ask PM".to_string()));
    }

    struct NeverRespondsAdvisor;
    #[async_trait]
    impl AiAdvisor for NeverRespondsAdvisor {
        async fn generate_task_instructions(&self, _task: &Task, _agent: &Agent) -> Option<String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            unreachable!()
        }
        async fn suggest_blocker_resolutions(&self, _task: &Task, _description: &str, _severity: Severity) -> Option<Vec<String>> {
            None
        }
        fn deadline(&self) -> Duration {
            Duration::from_millis(10)
        }
    }

    #[tokio::test]
    async fn slow_advisor_falls_back_within_deadline() {
        let agent = Agent::new("a1", "agent-1", "coder", vec![]);
        let instructions = generate_instructions_with_fallback(&NeverRespondsAdvisor, &task(), &agent).await;
        assert!(!instructions.is_empty());
    }
}
