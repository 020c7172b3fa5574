//! Semantic data categories for tool payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Closed set of categories a tool payload can be classified into.
///
/// Declaration order matches detection priority; `Table` is the generic
/// fallback for any array-shaped payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    StockInfo,
    Kline,
    Financial,
    Quote,
    News,
    Search,
    FundFlow,
    Ranking,
    Holders,
    Macro,
    Metrics,
    WebContent,
    TimeSeries,
    Comparison,
    Table,
}

impl DataType {
    pub const ALL: [DataType; 15] = [
        DataType::StockInfo,
        DataType::Kline,
        DataType::Financial,
        DataType::Quote,
        DataType::News,
        DataType::Search,
        DataType::FundFlow,
        DataType::Ranking,
        DataType::Holders,
        DataType::Macro,
        DataType::Metrics,
        DataType::WebContent,
        DataType::TimeSeries,
        DataType::Comparison,
        DataType::Table,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::StockInfo => "stock_info",
            DataType::Kline => "kline",
            DataType::Financial => "financial",
            DataType::Quote => "quote",
            DataType::News => "news",
            DataType::Search => "search",
            DataType::FundFlow => "fund_flow",
            DataType::Ranking => "ranking",
            DataType::Holders => "holders",
            DataType::Macro => "macro",
            DataType::Metrics => "metrics",
            DataType::WebContent => "web_content",
            DataType::TimeSeries => "time_series",
            DataType::Comparison => "comparison",
            DataType::Table => "table",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DataType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        DataType::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| anyhow::anyhow!("Unknown data type: {}", s))
    }
}

/// Descriptive metadata extracted alongside a classification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Length of the tabular body, when the payload carries one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<usize>,

    /// Columns, when the payload declares them explicitly
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
}

/// Outcome of classifying a payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    #[serde(rename = "type")]
    pub data_type: DataType,

    /// Score of the winning heuristic, always above the acceptance floor
    pub confidence: f64,

    /// The payload, decoded if it arrived as a string
    pub data: Value,

    pub metadata: DetectionMetadata,
}

impl DetectionResult {
    /// Title to show for this result, never empty
    pub fn display_title(&self) -> &str {
        self.metadata
            .title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or("Data Preview")
    }
}

/// Why a payload produced no classification
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DetectError {
    #[error("no data")]
    NoData,

    #[error("string payload is not structured data")]
    Unparseable,

    #[error("payload is a {0}, expected an object or array")]
    UnsupportedShape(&'static str),

    #[error("payload matched no known data type")]
    UnknownType,
}
