//! crewscope - Execution-stream interpretation for multi-agent job monitors
//!
//! Two independent consumers of a crew's execution stream:
//!
//! - The agent panel: a fold over the event log that tracks, per agent,
//!   whether it is idle, running, done or failed and what it is doing.
//! - The payload router: classifies structured tool output into one of a
//!   closed set of data types and picks a renderer for it, falling back to a
//!   generic preview when none is registered.
//!
//! Both are synchronous and deterministic; identical input always yields
//! identical output.
//!
//! # Modules
//!
//! - `domain`: Data structures (Event, AgentState, DetectionResult)
//! - `core`: Detector, heuristics chain, registry, router, agent deriver, event log
//! - `renderers`: Renderer trait and built-in text renderers
//! - `config`: Layered configuration
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Classify a tool payload
//! echo '{"symbol":"AAPL","price":182.5,"change":1.2}' | crewscope detect
//!
//! # Show the agent panel for a job
//! crewscope agents --events job/events.jsonl --manifest crew.yaml
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod renderers;

// Re-export main types at crate root for convenience
pub use crate::core::{derive_agent_states, detect, AgentTracker, ComponentRegistry, Detector, Router};
pub use domain::{
    AgentPanel, AgentState, AgentStatus, DataType, DetectionResult, Event, EventType, Manifest,
    RawEvent,
};
pub use renderers::{default_registry, RenderedView, Renderer};
