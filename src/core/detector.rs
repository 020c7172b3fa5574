//! Tool payload classification.
//!
//! A payload is run through an ordered chain of heuristics. The first one
//! scoring above [`MIN_CONFIDENCE`] wins, so overlapping shapes are settled
//! by position in the chain rather than by the highest score.

use serde_json::{Map, Value};
use tracing::debug;

use super::heuristics::{
    Heuristic, Probe, COMPANY_NAME_KEYS, DEFAULT_CHAIN, PROFILE_KEYS,
};
use crate::domain::{DataType, DetectError, DetectionMetadata, DetectionResult};

/// Scores at or below this are not accepted
pub const MIN_CONFIDENCE: f64 = 0.5;

/// Classify a payload with the standard chain
pub fn detect(payload: &Value) -> Option<DetectionResult> {
    classify(&DEFAULT_CHAIN, payload, None).ok()
}

/// Classify a string that should contain structured data
pub fn detect_str(payload: &str) -> Option<DetectionResult> {
    detect(&Value::String(payload.to_string()))
}

/// An ordered, inspectable detection chain
#[derive(Debug, Clone)]
pub struct Detector {
    chain: Vec<Heuristic>,
}

impl Default for Detector {
    fn default() -> Self {
        Self {
            chain: DEFAULT_CHAIN.to_vec(),
        }
    }
}

impl Detector {
    /// Build a detector from a custom chain (evaluated in the given order)
    pub fn with_chain(chain: Vec<Heuristic>) -> Self {
        Self { chain }
    }

    /// The heuristics in priority order
    pub fn chain(&self) -> &[Heuristic] {
        &self.chain
    }

    /// Priority order as data types
    pub fn priority(&self) -> Vec<DataType> {
        self.chain.iter().map(|h| h.data_type).collect()
    }

    pub fn detect(&self, payload: &Value) -> Option<DetectionResult> {
        self.try_detect(payload, None).ok()
    }

    /// Classify, explaining why nothing matched.
    ///
    /// `tool_name` is an optional hint from the tool that emitted the payload.
    pub fn try_detect(
        &self,
        payload: &Value,
        tool_name: Option<&str>,
    ) -> Result<DetectionResult, DetectError> {
        classify(&self.chain, payload, tool_name)
    }

    /// Describe a payload as a caller-chosen data type, skipping the chain.
    ///
    /// Used for manual corrections; the payload must still be decodable.
    pub fn classify_as(
        &self,
        payload: &Value,
        data_type: DataType,
    ) -> Result<DetectionResult, DetectError> {
        let data = decode(payload)?;
        let metadata = extract_metadata(&Probe::new(&data, None), data_type);
        Ok(DetectionResult {
            data_type,
            confidence: 1.0,
            data,
            metadata,
        })
    }
}

fn classify(
    chain: &[Heuristic],
    payload: &Value,
    tool_name: Option<&str>,
) -> Result<DetectionResult, DetectError> {
    let data = decode(payload)?;
    let probe = Probe::new(&data, tool_name);

    for heuristic in chain {
        let confidence = (heuristic.score)(&probe);
        if confidence > MIN_CONFIDENCE {
            debug!(
                data_type = %heuristic.data_type,
                confidence,
                "Classified tool payload"
            );
            let metadata = extract_metadata(&probe, heuristic.data_type);
            return Ok(DetectionResult {
                data_type: heuristic.data_type,
                confidence: confidence.min(1.0),
                data,
                metadata,
            });
        }
    }

    debug!("Tool payload matched no data type");
    Err(DetectError::UnknownType)
}

/// Accept objects and arrays; decode strings; reject everything else
fn decode(payload: &Value) -> Result<Value, DetectError> {
    let value = match payload {
        Value::Null => return Err(DetectError::NoData),
        Value::String(text) => {
            let text = text.trim();
            if text.is_empty() {
                return Err(DetectError::NoData);
            }
            serde_json::from_str::<Value>(text).map_err(|_| DetectError::Unparseable)?
        }
        other => other.clone(),
    };

    match &value {
        Value::Null => Err(DetectError::NoData),
        Value::Object(map) if map.is_empty() => Err(DetectError::NoData),
        Value::Array(items) if items.is_empty() => Err(DetectError::NoData),
        Value::Object(_) | Value::Array(_) => Ok(value),
        Value::Bool(_) => Err(DetectError::UnsupportedShape("bool")),
        Value::Number(_) => Err(DetectError::UnsupportedShape("number")),
        Value::String(_) => Err(DetectError::UnsupportedShape("string")),
    }
}

fn extract_metadata(probe: &Probe<'_>, data_type: DataType) -> DetectionMetadata {
    let symbol = probe.symbol().map(str::to_string);

    DetectionMetadata {
        title: Some(synthesize_title(probe, data_type, symbol.as_deref())),
        symbol,
        row_count: probe.records().map(<[Value]>::len),
        columns: probe.declared_columns().map(<[String]>::to_vec),
    }
}

fn synthesize_title(probe: &Probe<'_>, data_type: DataType, symbol: Option<&str>) -> String {
    let titled = |suffix: &str, bare: &str| match symbol {
        Some(symbol) => format!("{} {}", symbol, suffix),
        None => bare.to_string(),
    };
    let object = probe.object();

    match data_type {
        DataType::StockInfo => {
            let name = object.and_then(|map| {
                PROFILE_KEYS
                    .iter()
                    .filter_map(|key| map.get(*key).and_then(Value::as_object))
                    .chain(std::iter::once(map))
                    .find_map(|m| {
                        COMPANY_NAME_KEYS
                            .iter()
                            .find_map(|key| m.get(*key).and_then(Value::as_str))
                    })
            });
            match (name, symbol) {
                (Some(name), Some(symbol)) => format!("{} ({})", name, symbol),
                (Some(name), None) => name.to_string(),
                (None, _) => titled("Company Profile", "Company Profile"),
            }
        }
        DataType::Kline => titled("Price History", "Price History"),
        DataType::Financial => titled("Financial Statements", "Financial Statements"),
        DataType::Quote => titled("Quote", "Quote"),
        DataType::News => titled("News", "Latest News"),
        DataType::Search => match first_text(object, &["query", "q"]) {
            Some(query) => format!("Search: {}", query),
            None => "Search Results".to_string(),
        },
        DataType::FundFlow => titled("Fund Flow", "Fund Flow"),
        DataType::Ranking => "Rankings".to_string(),
        DataType::Holders => titled("Shareholders", "Shareholders"),
        DataType::Macro => "Macro Indicators".to_string(),
        DataType::Metrics => titled("Key Metrics", "Key Metrics"),
        DataType::WebContent => first_text(object, &["title"])
            .or_else(|| first_text(object, &["url", "link", "source_url"]))
            .unwrap_or_else(|| "Web Content".to_string()),
        DataType::TimeSeries => titled("Time Series", "Time Series"),
        DataType::Comparison => "Comparison".to_string(),
        DataType::Table => titled("Data", "Data Table"),
    }
}

fn first_text(object: Option<&Map<String, Value>>, keys: &[&str]) -> Option<String> {
    let map = object?;
    keys.iter()
        .find_map(|key| map.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn never(_: &Probe<'_>) -> f64 {
        0.0
    }

    fn always(_: &Probe<'_>) -> f64 {
        0.99
    }

    #[test]
    fn test_decode_rejects_scalars() {
        assert_eq!(decode(&json!(42)), Err(DetectError::UnsupportedShape("number")));
        assert_eq!(decode(&json!(true)), Err(DetectError::UnsupportedShape("bool")));
        assert_eq!(decode(&json!("\"just text\"")), Err(DetectError::UnsupportedShape("string")));
        assert_eq!(decode(&json!("   ")), Err(DetectError::NoData));
        assert_eq!(decode(&json!("{oops")), Err(DetectError::Unparseable));
    }

    #[test]
    fn test_custom_chain_order_is_respected() {
        let detector = Detector::with_chain(vec![
            Heuristic { data_type: DataType::Quote, score: never },
            Heuristic { data_type: DataType::Comparison, score: always },
            Heuristic { data_type: DataType::Table, score: always },
        ]);

        let result = detector.detect(&json!([{"a": 1}])).unwrap();
        assert_eq!(result.data_type, DataType::Comparison);
        assert_eq!(result.confidence, 0.99);
    }

    #[test]
    fn test_exactly_threshold_is_rejected() {
        fn half(_: &Probe<'_>) -> f64 {
            MIN_CONFIDENCE
        }
        let detector =
            Detector::with_chain(vec![Heuristic { data_type: DataType::Table, score: half }]);

        assert_eq!(
            detector.try_detect(&json!([1, 2]), None),
            Err(DetectError::UnknownType)
        );
    }

    #[test]
    fn test_object_matching_nothing_is_unknown() {
        let detector = Detector::default();
        assert_eq!(
            detector.try_detect(&json!({"status": "ok"}), None),
            Err(DetectError::UnknownType)
        );
    }

    #[test]
    fn test_tool_name_hint_selects_macro() {
        let detector = Detector::default();
        let result = detector
            .try_detect(&json!({"country": "US", "value": 3.1}), Some("get_macro_data"))
            .unwrap();
        assert_eq!(result.data_type, DataType::Macro);
        assert_eq!(result.metadata.title.as_deref(), Some("Macro Indicators"));
    }

    #[test]
    fn test_stock_info_title_uses_company_name() {
        let result = detect(&json!({
            "symbol": "AAPL",
            "info": {"shortName": "Apple Inc.", "sector": "Technology"}
        }))
        .unwrap();
        assert_eq!(result.metadata.title.as_deref(), Some("Apple Inc. (AAPL)"));
    }

    #[test]
    fn test_default_priority() {
        assert_eq!(Detector::default().priority(), DataType::ALL.to_vec());
    }

    #[test]
    fn test_chain_exposes_the_heuristics() {
        let detector = Detector::default();
        assert_eq!(detector.chain().len(), DEFAULT_CHAIN.len());
        assert_eq!(detector.chain()[0].data_type, DataType::ALL[0]);

        // Reusing a prefix of the chain keeps its order
        let leading = Detector::with_chain(detector.chain()[..4].to_vec());
        assert_eq!(leading.priority(), DataType::ALL[..4].to_vec());
        assert_eq!(
            leading.try_detect(&json!([{"a": 1}]), None),
            Err(DetectError::UnknownType)
        );
    }
}
