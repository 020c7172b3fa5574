//! Routes tool payloads to renderers.
//!
//! Detection results are memoized by payload digest so that re-rendering
//! unchanged data does not re-run the heuristic chain. A router belongs to
//! one render context; it is not shared between threads.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::detector::Detector;
use super::registry::ComponentRegistry;
use crate::domain::{DataType, DetectError, DetectionResult};
use crate::renderers::{FallbackRenderer, RenderedView, Renderer};

/// Default number of memoized detections
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Per-call routing options
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteOptions<'a> {
    /// Use this data type instead of the detected one
    pub override_type: Option<DataType>,

    /// Name of the tool that emitted the payload
    pub tool_name: Option<&'a str>,
}

impl<'a> RouteOptions<'a> {
    pub fn with_override(data_type: DataType) -> Self {
        Self {
            override_type: Some(data_type),
            tool_name: None,
        }
    }

    pub fn with_tool(tool_name: &'a str) -> Self {
        Self {
            override_type: None,
            tool_name: Some(tool_name),
        }
    }
}

/// What the router decided to show
pub enum Resolution {
    /// Nothing to show
    Nothing,

    /// A registered renderer handles this data type
    Component {
        renderer: Arc<dyn Renderer>,
        detection: DetectionResult,
    },

    /// No renderer is registered; show the generic preview
    Fallback { detection: DetectionResult },
}

impl Resolution {
    pub fn detection(&self) -> Option<&DetectionResult> {
        match self {
            Resolution::Nothing => None,
            Resolution::Component { detection, .. } | Resolution::Fallback { detection } => {
                Some(detection)
            }
        }
    }
}

impl std::fmt::Debug for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resolution::Nothing => f.write_str("Nothing"),
            Resolution::Component {
                renderer,
                detection,
            } => f
                .debug_struct("Component")
                .field("renderer", &renderer.name())
                .field("data_type", &detection.data_type)
                .finish(),
            Resolution::Fallback { detection } => f
                .debug_struct("Fallback")
                .field("data_type", &detection.data_type)
                .finish(),
        }
    }
}

/// Memoization counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Bounded memo of detection outcomes, evicting the oldest entry first
struct DetectionCache {
    capacity: usize,
    entries: HashMap<String, Result<DetectionResult, DetectError>>,
    order: VecDeque<String>,
    hits: u64,
    misses: u64,
}

impl DetectionCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            order: VecDeque::new(),
            hits: 0,
            misses: 0,
        }
    }

    fn get_or_insert_with<F>(&mut self, key: String, compute: F) -> Result<DetectionResult, DetectError>
    where
        F: FnOnce() -> Result<DetectionResult, DetectError>,
    {
        if let Some(cached) = self.entries.get(&key) {
            self.hits += 1;
            return cached.clone();
        }

        self.misses += 1;
        let outcome = compute();

        if self.capacity > 0 {
            while self.entries.len() >= self.capacity {
                match self.order.pop_front() {
                    Some(oldest) => {
                        self.entries.remove(&oldest);
                    }
                    None => break,
                }
            }
            self.order.push_back(key.clone());
            self.entries.insert(key, outcome.clone());
        }

        outcome
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.entries.len(),
        }
    }
}

/// Picks a renderer for a payload, with a universal fallback
pub struct Router {
    detector: Detector,
    registry: Arc<ComponentRegistry>,
    fallback: FallbackRenderer,
    cache: DetectionCache,
}

impl Router {
    pub fn new(registry: Arc<ComponentRegistry>) -> Self {
        Self::with_capacity(registry, DEFAULT_CACHE_CAPACITY)
    }

    /// Router with a bounded memo; a capacity of zero disables memoization
    pub fn with_capacity(registry: Arc<ComponentRegistry>, capacity: usize) -> Self {
        Self {
            detector: Detector::default(),
            registry,
            fallback: FallbackRenderer,
            cache: DetectionCache::new(capacity),
        }
    }

    /// Replace the detection chain
    pub fn with_detector(mut self, detector: Detector) -> Self {
        self.detector = detector;
        self
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Classify a payload, memoized by content
    pub fn detect(
        &mut self,
        payload: &Value,
        tool_name: Option<&str>,
    ) -> Result<DetectionResult, DetectError> {
        let key = payload_digest(payload, tool_name);
        let detector = &self.detector;
        self.cache
            .get_or_insert_with(key, || detector.try_detect(payload, tool_name))
    }

    pub fn resolve(&mut self, payload: &Value) -> Resolution {
        self.resolve_with(payload, RouteOptions::default())
    }

    /// Decide what to show for a payload
    pub fn resolve_with(&mut self, payload: &Value, options: RouteOptions<'_>) -> Resolution {
        let outcome = match options.override_type {
            Some(data_type) => self.detector.classify_as(payload, data_type),
            None => self.detect(payload, options.tool_name),
        };

        let detection = match outcome {
            Ok(detection) => detection,
            Err(reason) => {
                debug!(%reason, "Nothing to render");
                return Resolution::Nothing;
            }
        };

        match self.registry.lookup(detection.data_type) {
            Some(renderer) => Resolution::Component {
                renderer,
                detection,
            },
            None => {
                debug!(data_type = %detection.data_type, "No renderer registered, using fallback");
                Resolution::Fallback { detection }
            }
        }
    }

    pub fn render(&mut self, payload: &Value) -> Option<RenderedView> {
        self.render_with(payload, RouteOptions::default())
    }

    /// Resolve and render. `None` means there is nothing to show.
    pub fn render_with(
        &mut self,
        payload: &Value,
        options: RouteOptions<'_>,
    ) -> Option<RenderedView> {
        match self.resolve_with(payload, options) {
            Resolution::Nothing => None,
            Resolution::Fallback { detection } => Some(self.fallback.preview(&detection)),
            Resolution::Component {
                renderer,
                detection,
            } => match renderer.render(&detection) {
                Ok(view) if !view.body.trim().is_empty() => Some(view),
                Ok(_) => {
                    warn!(component = renderer.name(), "Renderer produced an empty view, using fallback");
                    Some(self.fallback.preview(&detection))
                }
                Err(e) => {
                    warn!(component = renderer.name(), "Renderer failed, using fallback: {}", e);
                    Some(self.fallback.preview(&detection))
                }
            },
        }
    }
}

/// Content digest of a payload (and hint) used as the memo key
pub fn payload_digest(payload: &Value, tool_name: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.to_string().as_bytes());
    if let Some(tool_name) = tool_name {
        hasher.update([0u8]);
        hasher.update(tool_name.as_bytes());
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_digest_is_stable_and_hint_sensitive() {
        let payload = json!({"a": [1, 2, 3]});
        assert_eq!(payload_digest(&payload, None), payload_digest(&payload.clone(), None));
        assert_ne!(payload_digest(&payload, None), payload_digest(&payload, Some("macro")));
        assert_eq!(payload_digest(&payload, None).len(), 64);
    }

    #[test]
    fn test_cache_evicts_oldest() {
        let mut cache = DetectionCache::new(2);
        for key in ["a", "b", "c"] {
            cache.get_or_insert_with(key.to_string(), || Err(DetectError::NoData));
        }
        assert_eq!(cache.stats().entries, 2);
        assert!(!cache.entries.contains_key("a"));

        cache.get_or_insert_with("c".to_string(), || panic!("should be cached"));
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 3);
    }

    #[test]
    fn test_zero_capacity_disables_memo() {
        let mut cache = DetectionCache::new(0);
        cache.get_or_insert_with("a".to_string(), || Err(DetectError::NoData));
        cache.get_or_insert_with("a".to_string(), || Err(DetectError::NoData));
        assert_eq!(cache.stats(), CacheStats { hits: 0, misses: 2, entries: 0 });
    }
}
