//! Core interpretation logic.
//!
//! This module contains:
//! - Heuristics/Detector: Ordered payload classification chain
//! - Registry: Data type to renderer lookup, built once at startup
//! - Router: Detection + registry lookup with a universal fallback
//! - Deriver: Agent status fold over the execution log
//! - EventLog: JSONL event log reader

pub mod deriver;
pub mod detector;
pub mod event_log;
pub mod heuristics;
pub mod registry;
pub mod router;

// Re-export commonly used types
pub use deriver::{derive_agent_states, derive_from_raw, AgentTracker, SYSTEM_AGENT};
pub use detector::{detect, detect_str, Detector, MIN_CONFIDENCE};
pub use event_log::{EventLog, LogChunk};
pub use heuristics::{Heuristic, Probe, ScoreFn, DEFAULT_CHAIN};
pub use registry::{ComponentRegistry, RegistryBuilder, RegistryError};
pub use router::{payload_digest, CacheStats, Resolution, RouteOptions, Router, DEFAULT_CACHE_CAPACITY};
