//! Per-agent status view and crew manifests.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Label shown for agents that have not done anything yet
pub const WAITING_LABEL: &str = "Waiting";

/// Label shown once an agent has delivered its task output
pub const COMPLETED_LABEL: &str = "Completed";

/// Status of a single agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Known but not active
    #[default]
    Idle,

    /// Working on a tool call or task
    Running,

    /// Delivered its task output
    Done,

    /// A tool or task failed
    Failed,
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentStatus::Idle => write!(f, "idle"),
            AgentStatus::Running => write!(f, "running"),
            AgentStatus::Done => write!(f, "done"),
            AgentStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Derived state of one agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentState {
    /// Canonical agent name
    pub agent_name: String,

    /// Current status
    pub status: AgentStatus,

    /// Human-readable description of what the agent is doing
    pub current_action_label: String,

    /// Timestamp of the most recent event for this agent (None for manifest placeholders)
    pub last_seen_at: Option<DateTime<Utc>>,

    /// Duration reported by the most recent successful tool result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_tool_duration_ms: Option<u64>,
}

impl AgentState {
    /// A placeholder for an agent that has not been observed yet
    pub fn waiting(agent_name: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            status: AgentStatus::Idle,
            current_action_label: WAITING_LABEL.to_string(),
            last_seen_at: None,
            last_tool_duration_ms: None,
        }
    }

    /// Check if the agent reached a terminal status
    pub fn is_finished(&self) -> bool {
        matches!(self.status, AgentStatus::Done | AgentStatus::Failed)
    }
}

/// The derived "who is doing what" view
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPanel {
    /// One entry per agent, most recently active first
    pub agents: Vec<AgentState>,

    /// Agent attached to the latest accepted event
    pub active_agent_name: Option<String>,
}

impl AgentPanel {
    /// Find an agent by canonical name
    pub fn get(&self, agent_name: &str) -> Option<&AgentState> {
        self.agents.iter().find(|a| a.agent_name == agent_name)
    }
}

/// Static declaration of the agents expected to work a job
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub agents: Vec<ManifestAgent>,
}

/// One expected agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestAgent {
    pub name: String,

    #[serde(default)]
    pub role: String,
}

impl Manifest {
    /// Build a manifest from agent names
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            agents: names
                .into_iter()
                .map(|name| ManifestAgent {
                    name: name.into(),
                    role: String::new(),
                })
                .collect(),
        }
    }

    /// Load a manifest from a YAML or JSON file (by extension, YAML otherwise)
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest file: {}", path.display()))?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content),
            _ => Self::from_yaml(&content),
        }
        .with_context(|| format!("Invalid manifest: {}", path.display()))
    }

    /// Parse a manifest from YAML content
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse manifest YAML")
    }

    /// Parse a manifest from JSON content
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Failed to parse manifest JSON")
    }

    /// Canonical (trimmed, non-empty) agent names in declaration order
    pub fn agent_names(&self) -> impl Iterator<Item = &str> {
        self.agents
            .iter()
            .map(|a| a.name.trim())
            .filter(|name| !name.is_empty())
    }
}
