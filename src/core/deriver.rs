//! Agent status derivation from the execution log.
//!
//! The panel is a fold over normalized events. [`AgentTracker`] carries the
//! fold state so a long-running job can apply newly arrived events
//! incrementally; [`derive_agent_states`] is the same fold started from
//! scratch over the whole log.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::domain::agent::COMPLETED_LABEL;
use crate::domain::{AgentPanel, AgentState, AgentStatus, Event, EventType, Manifest, RawEvent};

/// Pseudo-agent used by the job runtime for its own notes
pub const SYSTEM_AGENT: &str = "System";

const TOOL_NAME_KEYS: [&str; 2] = ["tool_name", "tool"];
const ERROR_TEXT_KEYS: [&str; 4] = ["error", "error_message", "message", "detail"];
const DURATION_KEYS: [&str; 2] = ["duration_ms", "durationMs"];

/// Fold the full event log into the agent panel
pub fn derive_agent_states(events: &[Event], manifest: Option<&Manifest>) -> AgentPanel {
    let mut tracker = AgentTracker::new();
    tracker.extend(events);
    tracker.snapshot(manifest)
}

/// Normalize raw transport events, dropping malformed ones, then fold
pub fn derive_from_raw<I>(events: I, manifest: Option<&Manifest>) -> AgentPanel
where
    I: IntoIterator<Item = RawEvent>,
{
    let mut tracker = AgentTracker::new();
    for raw in events {
        tracker.apply_raw(raw);
    }
    tracker.snapshot(manifest)
}

/// Per-agent fold state
#[derive(Debug, Clone)]
pub struct AgentTracker {
    reserved_names: Vec<String>,
    /// First-observed order
    agents: Vec<AgentState>,
    index: HashMap<String, usize>,
    active_agent_name: Option<String>,
    applied: usize,
}

impl Default for AgentTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentTracker {
    pub fn new() -> Self {
        Self::with_reserved_names([SYSTEM_AGENT])
    }

    /// Tracker that ignores the given pseudo-agent names
    pub fn with_reserved_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            reserved_names: names.into_iter().map(Into::into).collect(),
            agents: Vec::new(),
            index: HashMap::new(),
            active_agent_name: None,
            applied: 0,
        }
    }

    /// Number of events that updated the panel
    pub fn applied(&self) -> usize {
        self.applied
    }

    pub fn is_reserved(&self, agent_name: &str) -> bool {
        self.reserved_names.iter().any(|r| r == agent_name)
    }

    pub fn extend<'e, I>(&mut self, events: I)
    where
        I: IntoIterator<Item = &'e Event>,
    {
        for event in events {
            self.apply(event);
        }
    }

    /// Normalize and apply a transport event. Returns false if it was dropped.
    pub fn apply_raw(&mut self, raw: RawEvent) -> bool {
        match Event::normalize(raw) {
            Ok(event) => self.apply(&event),
            Err(e) => {
                debug!("Dropping malformed event: {}", e);
                false
            }
        }
    }

    /// Apply one event. Returns false if the event does not belong on the panel.
    pub fn apply(&mut self, event: &Event) -> bool {
        let name = event.agent_name.trim();
        if name.is_empty() || self.is_reserved(name) {
            return false;
        }

        let state = self.entry(name);
        state.last_seen_at = Some(match state.last_seen_at {
            Some(seen) if seen > event.timestamp => seen,
            _ => event.timestamp,
        });

        match event.event_type {
            EventType::ToolCall => {
                let tool = event
                    .payload_text(&TOOL_NAME_KEYS)
                    .unwrap_or_else(|| "tool".to_string());
                state.status = AgentStatus::Running;
                state.current_action_label = format!("Running {}", tool);
            }
            EventType::ToolResult => {
                if event.is_error() || payload_status(event).as_deref() == Some("failed") {
                    state.status = AgentStatus::Failed;
                    state.current_action_label = event
                        .payload_text(&ERROR_TEXT_KEYS)
                        .unwrap_or_else(|| "Tool failed".to_string());
                } else {
                    state.status = AgentStatus::Running;
                    if let Some(duration) = duration_ms(event) {
                        state.last_tool_duration_ms = Some(duration);
                    }
                }
            }
            EventType::TaskOutput => {
                state.status = AgentStatus::Done;
                state.current_action_label = COMPLETED_LABEL.to_string();
            }
            EventType::TaskState => match payload_status(event).as_deref() {
                Some("failed") => {
                    state.status = AgentStatus::Failed;
                    state.current_action_label = event
                        .payload_text(&ERROR_TEXT_KEYS)
                        .unwrap_or_else(|| "Task failed".to_string());
                }
                Some("completed") => state.status = AgentStatus::Done,
                _ => {}
            },
            EventType::Activity => {}
        }

        self.active_agent_name = Some(name.to_string());
        self.applied += 1;
        true
    }

    fn entry(&mut self, name: &str) -> &mut AgentState {
        let idx = match self.index.get(name) {
            Some(idx) => *idx,
            None => {
                self.agents.push(AgentState::waiting(name));
                let idx = self.agents.len() - 1;
                self.index.insert(name.to_string(), idx);
                idx
            }
        };
        &mut self.agents[idx]
    }

    /// Current panel: observed agents, then manifest placeholders, most
    /// recently active first.
    pub fn snapshot(&self, manifest: Option<&Manifest>) -> AgentPanel {
        let mut agents = self.agents.clone();

        if let Some(manifest) = manifest {
            for name in manifest.agent_names() {
                let known = self.index.contains_key(name)
                    || agents.iter().any(|a| a.agent_name == name);
                if !known && !self.is_reserved(name) {
                    agents.push(AgentState::waiting(name));
                }
            }
        }

        // Stable: ties keep first-observed order, placeholders stay last
        agents.sort_by(|a, b| b.last_seen_at.cmp(&a.last_seen_at));

        AgentPanel {
            agents,
            active_agent_name: self.active_agent_name.clone(),
        }
    }
}

fn payload_status(event: &Event) -> Option<String> {
    event
        .payload_str("status")
        .map(|s| s.trim().to_ascii_lowercase())
}

fn duration_ms(event: &Event) -> Option<u64> {
    DURATION_KEYS
        .iter()
        .filter_map(|key| event.payload.get(*key))
        .find_map(|value| match value {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64)),
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_714_557_600 + secs, 0).unwrap()
    }

    fn event(id: &str, secs: i64, event_type: EventType, agent: &str) -> Event {
        Event::new(id, at(secs), event_type, agent)
    }

    #[test]
    fn test_tool_call_sets_running_label() {
        let mut tracker = AgentTracker::new();
        tracker.apply(&event("1", 0, EventType::ToolCall, "Analyst").with_field("tool_name", "get_quote"));

        let panel = tracker.snapshot(None);
        let analyst = panel.get("Analyst").unwrap();
        assert_eq!(analyst.status, AgentStatus::Running);
        assert_eq!(analyst.current_action_label, "Running get_quote");
    }

    #[test]
    fn test_tool_result_error_severity_fails_agent() {
        let panel = derive_agent_states(
            &[
                event("1", 0, EventType::ToolCall, "Analyst").with_field("tool_name", "search"),
                event("2", 1, EventType::ToolResult, "Analyst")
                    .with_severity(crate::domain::Severity::Error)
                    .with_field("error", "rate limited"),
            ],
            None,
        );

        let analyst = panel.get("Analyst").unwrap();
        assert_eq!(analyst.status, AgentStatus::Failed);
        assert_eq!(analyst.current_action_label, "rate limited");
    }

    #[test]
    fn test_tool_result_status_failed_without_message() {
        let panel = derive_agent_states(
            &[event("1", 0, EventType::ToolResult, "Analyst").with_field("status", "FAILED")],
            None,
        );
        let analyst = panel.get("Analyst").unwrap();
        assert_eq!(analyst.status, AgentStatus::Failed);
        assert_eq!(analyst.current_action_label, "Tool failed");
    }

    #[test]
    fn test_successful_tool_result_keeps_running_and_records_duration() {
        let panel = derive_agent_states(
            &[
                event("1", 0, EventType::ToolCall, "Analyst").with_field("tool_name", "search"),
                event("2", 2, EventType::ToolResult, "Analyst").with_field("duration_ms", 1532),
            ],
            None,
        );

        let analyst = panel.get("Analyst").unwrap();
        assert_eq!(analyst.status, AgentStatus::Running);
        assert_eq!(analyst.current_action_label, "Running search");
        assert_eq!(analyst.last_tool_duration_ms, Some(1532));
    }

    #[test]
    fn test_fractional_duration_is_rounded() {
        let panel = derive_agent_states(
            &[event("1", 0, EventType::ToolResult, "Analyst").with_field("durationMs", 12.6)],
            None,
        );
        assert_eq!(panel.get("Analyst").unwrap().last_tool_duration_ms, Some(13));
    }

    #[test]
    fn test_task_state_transitions() {
        let panel = derive_agent_states(
            &[
                event("1", 0, EventType::TaskState, "Writer").with_field("status", "failed").with_field("error", "context overflow"),
                event("2", 0, EventType::TaskState, "Reviewer").with_field("status", "completed"),
                event("3", 0, EventType::TaskState, "Editor").with_field("status", "started"),
            ],
            None,
        );

        let writer = panel.get("Writer").unwrap();
        assert_eq!(writer.status, AgentStatus::Failed);
        assert_eq!(writer.current_action_label, "context overflow");

        assert_eq!(panel.get("Reviewer").unwrap().status, AgentStatus::Done);

        let editor = panel.get("Editor").unwrap();
        assert_eq!(editor.status, AgentStatus::Idle);
        assert_eq!(editor.current_action_label, "Waiting");
    }

    #[test]
    fn test_activity_only_touches_last_seen() {
        let panel = derive_agent_states(
            &[event("1", 5, EventType::Activity, "Planner").with_field("message", "thinking")],
            None,
        );
        let planner = panel.get("Planner").unwrap();
        assert_eq!(planner.status, AgentStatus::Idle);
        assert_eq!(planner.last_seen_at, Some(at(5)));
    }

    #[test]
    fn test_custom_reserved_names() {
        let mut tracker = AgentTracker::with_reserved_names(["Orchestrator"]);
        assert!(!tracker.apply(&event("1", 0, EventType::Activity, "Orchestrator")));
        assert!(tracker.apply(&event("2", 0, EventType::Activity, "System")));
        assert_eq!(tracker.applied(), 1);
    }

    #[test]
    fn test_manifest_duplicates_and_reserved_are_skipped() {
        let manifest = Manifest::from_names(["Writer", "Writer", "System"]);
        let panel = derive_agent_states(&[], Some(&manifest));

        assert_eq!(panel.agents.len(), 1);
        assert_eq!(panel.agents[0].agent_name, "Writer");
        assert!(panel.active_agent_name.is_none());
    }
}
