//! Domain types for crewscope.
//!
//! This module contains the core data structures:
//! - Events: Normalized records from the execution log
//! - Agent: Derived per-agent status and crew manifests
//! - Detection: Data categories and classification results

pub mod agent;
pub mod detection;
pub mod events;

// Re-export commonly used types
pub use agent::{AgentPanel, AgentState, AgentStatus, Manifest, ManifestAgent};
pub use detection::{DataType, DetectError, DetectionMetadata, DetectionResult};
pub use events::{Event, EventError, EventType, RawEvent, Severity};
