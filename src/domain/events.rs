//! Execution events emitted while a crew works a job.
//!
//! Events arrive from the job transport as [`RawEvent`]s. Older producers put
//! the agent name inside the payload instead of at the top level, so every
//! raw event is normalized into a canonical [`Event`] before anything folds
//! over it.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Payload keys that carried the agent name in older event shapes, in lookup order.
const LEGACY_AGENT_KEYS: [&str; 3] = ["agent_name", "agentName", "agent"];

/// An event exactly as the transport delivers it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    /// Producer-assigned identifier
    #[serde(default)]
    pub event_id: String,

    /// When the event occurred: RFC 3339, naive ISO 8601 (read as UTC), or
    /// epoch seconds/milliseconds
    #[serde(deserialize_with = "lenient_timestamp")]
    pub timestamp: DateTime<Utc>,

    /// Event kind as a string (`tool_call`, `tool_result`, ...)
    pub event_type: String,

    /// Agent that produced the event (absent in older shapes)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,

    /// Severity, if the producer attached one; unrecognized values read as none
    #[serde(
        default,
        deserialize_with = "lenient_severity",
        skip_serializing_if = "Option::is_none"
    )]
    pub severity: Option<Severity>,

    /// Free-form event body
    #[serde(default)]
    pub payload: Value,
}

/// Epoch values above this are taken as milliseconds
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    parse_timestamp(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("unrecognized timestamp: {}", value)))
}

/// Parse the timestamp shapes producers are known to emit
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(text) => {
            let text = text.trim();
            if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
                return Some(ts.with_timezone(&Utc));
            }
            if let Some(naive) = NAIVE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
            {
                return Some(naive.and_utc());
            }
            text.parse::<i64>().ok().and_then(from_epoch)
        }
        Value::Number(n) => match n.as_i64() {
            Some(whole) => from_epoch(whole),
            None => n.as_f64().and_then(from_epoch_float),
        },
        _ => None,
    }
}

fn from_epoch(value: i64) -> Option<DateTime<Utc>> {
    if value.abs() >= EPOCH_MILLIS_THRESHOLD {
        Utc.timestamp_millis_opt(value).single()
    } else {
        Utc.timestamp_opt(value, 0).single()
    }
}

fn from_epoch_float(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() {
        return None;
    }
    if value.abs() >= EPOCH_MILLIS_THRESHOLD as f64 {
        return Utc.timestamp_millis_opt(value.round() as i64).single();
    }
    let secs = value.floor();
    let nanos = ((value - secs) * 1e9).round().min(999_999_999.0) as u32;
    Utc.timestamp_opt(secs as i64, nanos).single()
}

fn lenient_severity<'de, D>(deserializer: D) -> Result<Option<Severity>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(Value::as_str).and_then(Severity::parse))
}

/// A normalized event in the execution log.
///
/// `agent_name` is already canonical: trimmed and resolved from whichever
/// field the producer used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Producer-assigned identifier
    pub event_id: String,

    /// When the event occurred
    pub timestamp: DateTime<Utc>,

    /// Kind of event
    pub event_type: EventType,

    /// Canonical agent name
    pub agent_name: String,

    /// Severity, if any
    pub severity: Option<Severity>,

    /// Free-form event body
    pub payload: Map<String, Value>,
}

impl Event {
    /// Create a new event with an empty payload
    pub fn new(
        event_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        event_type: EventType,
        agent_name: impl Into<String>,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            timestamp,
            event_type,
            agent_name: agent_name.into(),
            severity: None,
            payload: Map::new(),
        }
    }

    /// Attach a severity
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    /// Set one payload field
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Normalize a raw transport event into the canonical shape.
    ///
    /// The top-level agent name wins; otherwise the legacy payload fields are
    /// consulted in order.
    pub fn normalize(raw: RawEvent) -> Result<Self, EventError> {
        let event_type: EventType = raw
            .event_type
            .parse()
            .map_err(|_| EventError::UnknownEventType(raw.event_type.clone()))?;

        let payload = match raw.payload {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(EventError::InvalidPayload {
                    event_id: raw.event_id,
                    found: json_kind(&other),
                })
            }
        };

        let agent_name = raw
            .agent_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .or_else(|| legacy_agent_name(&payload))
            .ok_or_else(|| EventError::MissingAgent(raw.event_id.clone()))?;

        Ok(Self {
            event_id: raw.event_id,
            timestamp: raw.timestamp,
            event_type,
            agent_name,
            severity: raw.severity,
            payload,
        })
    }

    /// Look up a string field in the payload
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    /// First non-empty string among several payload keys
    pub fn payload_text(&self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .filter_map(|key| self.payload.get(*key))
            .find_map(|value| match value {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Value::Object(_) | Value::Array(_) => Some(value.to_string()),
                _ => None,
            })
    }

    /// Whether the producer flagged this event as an error
    pub fn is_error(&self) -> bool {
        matches!(self.severity, Some(Severity::Error))
    }
}

impl TryFrom<RawEvent> for Event {
    type Error = EventError;

    fn try_from(raw: RawEvent) -> Result<Self, Self::Error> {
        Self::normalize(raw)
    }
}

fn legacy_agent_name(payload: &Map<String, Value>) -> Option<String> {
    LEGACY_AGENT_KEYS
        .iter()
        .filter_map(|key| payload.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|name| !name.is_empty())
        .map(str::to_string)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Kinds of events in the execution log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// An agent invoked a tool
    ToolCall,

    /// A tool invocation returned
    ToolResult,

    /// A task produced its final output
    TaskOutput,

    /// A task-level state change
    TaskState,

    /// Free-text activity note
    Activity,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::ToolCall => "tool_call",
            EventType::ToolResult => "tool_result",
            EventType::TaskOutput => "task_output",
            EventType::TaskState => "task_state",
            EventType::Activity => "activity",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventType {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tool_call" => Ok(EventType::ToolCall),
            "tool_result" => Ok(EventType::ToolResult),
            "task_output" => Ok(EventType::TaskOutput),
            "task_state" => Ok(EventType::TaskState),
            "activity" => Ok(EventType::Activity),
            _ => Err(EventError::UnknownEventType(s.to_string())),
        }
    }
}

/// Event severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    /// Case-insensitive, accepting common logging-level spellings
    pub fn parse(level: &str) -> Option<Self> {
        match level.trim().to_ascii_lowercase().as_str() {
            "info" | "information" | "debug" | "trace" => Some(Severity::Info),
            "warning" | "warn" => Some(Severity::Warning),
            "error" | "err" | "critical" | "fatal" => Some(Severity::Error),
            _ => None,
        }
    }
}

/// Reasons a raw event cannot enter the fold
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventError {
    #[error("event {0} has no resolvable agent name")]
    MissingAgent(String),

    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    #[error("event {event_id} has a {found} payload, expected an object")]
    InvalidPayload { event_id: String, found: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawEvent {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_top_level_agent_name_wins() {
        let event = Event::normalize(raw(json!({
            "event_id": "e1",
            "timestamp": "2024-05-01T10:00:00Z",
            "event_type": "tool_call",
            "agent_name": "  Analyst ",
            "payload": {"agent_name": "Writer", "tool_name": "search"}
        })))
        .unwrap();

        assert_eq!(event.agent_name, "Analyst");
        assert_eq!(event.event_type, EventType::ToolCall);
        assert_eq!(event.payload_str("tool_name"), Some("search"));
    }

    #[test]
    fn test_legacy_payload_agent_name() {
        let event = Event::normalize(raw(json!({
            "event_id": "e2",
            "timestamp": "2024-05-01T10:00:00Z",
            "event_type": "task_output",
            "payload": {"agent_name": "Writer"}
        })))
        .unwrap();

        assert_eq!(event.agent_name, "Writer");
    }

    #[test]
    fn test_blank_top_level_name_falls_back() {
        let event = Event::normalize(raw(json!({
            "event_id": "e3",
            "timestamp": "2024-05-01T10:00:00Z",
            "event_type": "activity",
            "agent_name": "   ",
            "payload": {"agent": "Researcher"}
        })))
        .unwrap();

        assert_eq!(event.agent_name, "Researcher");
    }

    #[test]
    fn test_missing_agent_is_rejected() {
        let err = Event::normalize(raw(json!({
            "event_id": "e4",
            "timestamp": "2024-05-01T10:00:00Z",
            "event_type": "activity",
            "payload": {"message": "thinking"}
        })))
        .unwrap_err();

        assert_eq!(err, EventError::MissingAgent("e4".to_string()));
    }

    #[test]
    fn test_unknown_event_type_is_rejected() {
        let err = Event::normalize(raw(json!({
            "event_id": "e5",
            "timestamp": "2024-05-01T10:00:00Z",
            "event_type": "heartbeat",
            "agent_name": "Analyst"
        })))
        .unwrap_err();

        assert!(matches!(err, EventError::UnknownEventType(t) if t == "heartbeat"));
    }

    #[test]
    fn test_non_object_payload_is_rejected() {
        let err = Event::normalize(raw(json!({
            "event_id": "e6",
            "timestamp": "2024-05-01T10:00:00Z",
            "event_type": "tool_result",
            "agent_name": "Analyst",
            "payload": [1, 2, 3]
        })))
        .unwrap_err();

        assert!(matches!(err, EventError::InvalidPayload { found: "array", .. }));
    }

    #[test]
    fn test_event_type_round_trips_as_snake_case() {
        for event_type in [
            EventType::ToolCall,
            EventType::ToolResult,
            EventType::TaskOutput,
            EventType::TaskState,
            EventType::Activity,
        ] {
            let parsed: EventType = event_type.as_str().parse().unwrap();
            assert_eq!(parsed, event_type);
            assert_eq!(
                serde_json::to_value(event_type).unwrap(),
                json!(event_type.as_str())
            );
        }
    }

    #[test]
    fn test_naive_iso_timestamp_reads_as_utc() {
        let event = raw(json!({
            "event_id": "t1",
            "timestamp": "2024-05-01T10:00:00.123456",
            "event_type": "activity",
            "agent_name": "Analyst"
        }));

        assert_eq!(
            event.timestamp,
            Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
                + chrono::Duration::microseconds(123_456)
        );

        let spaced = raw(json!({
            "timestamp": "2024-05-01 10:00:00",
            "event_type": "activity"
        }));
        assert_eq!(spaced.timestamp, Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_epoch_timestamps() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();

        for timestamp in [json!(1_714_557_600), json!(1_714_557_600_000i64), json!("1714557600")] {
            let event = raw(json!({"timestamp": timestamp, "event_type": "activity"}));
            assert_eq!(event.timestamp, expected);
        }

        let fractional = raw(json!({"timestamp": 1_714_557_600.5, "event_type": "activity"}));
        assert_eq!(fractional.timestamp, expected + chrono::Duration::milliseconds(500));
    }

    #[test]
    fn test_garbage_timestamp_is_rejected() {
        let parsed = serde_json::from_value::<RawEvent>(json!({
            "timestamp": "yesterday",
            "event_type": "activity"
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_severity_is_case_insensitive() {
        let event = raw(json!({
            "timestamp": "2024-05-01T10:00:00Z",
            "event_type": "tool_result",
            "severity": "ERROR"
        }));
        assert_eq!(event.severity, Some(Severity::Error));

        let event = raw(json!({
            "timestamp": "2024-05-01T10:00:00Z",
            "event_type": "tool_result",
            "severity": "critical"
        }));
        assert_eq!(event.severity, Some(Severity::Error));

        assert_eq!(Severity::parse(" Warn "), Some(Severity::Warning));
    }

    #[test]
    fn test_unknown_severity_reads_as_none() {
        let event = raw(json!({
            "timestamp": "2024-05-01T10:00:00Z",
            "event_type": "activity",
            "agent_name": "Analyst",
            "severity": "noteworthy"
        }));
        assert_eq!(event.severity, None);

        let event = raw(json!({
            "timestamp": "2024-05-01T10:00:00Z",
            "event_type": "activity",
            "severity": 3
        }));
        assert_eq!(event.severity, None);
    }

    #[test]
    fn test_try_from_raw_event() {
        let event = Event::try_from(raw(json!({
            "event_id": "e7",
            "timestamp": "2024-05-01T10:00:00Z",
            "event_type": "task_state",
            "agent_name": "Writer",
            "severity": "Warning",
            "payload": {"status": "completed"}
        })))
        .unwrap();

        assert_eq!(event.event_type, EventType::TaskState);
        assert_eq!(event.severity, Some(Severity::Warning));
        assert_eq!(event.payload_str("status"), Some("completed"));
    }
}
