//! Shape heuristics for tool payload classification.
//!
//! Each heuristic inspects a [`Probe`] and returns a score in `[0, 1]`. The
//! scores are fixed per matched shape; nothing here is learned or adaptive.
//! [`DEFAULT_CHAIN`] lists them in priority order.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};

use crate::domain::DataType;

/// Keys under which an object payload may carry its tabular body
const TABULAR_KEYS: [&str; 3] = ["data", "rows", "records"];

/// Keys that may carry the producing tool's name
const HINT_KEYS: [&str; 3] = ["tool_name", "tool", "source"];

/// Accepted symbol field names, in lookup order
pub const SYMBOL_KEYS: [&str; 2] = ["symbol", "ticker"];

/// Rows inspected when inferring column shapes
const ROW_SAMPLE: usize = 20;

/// Scores a payload against one data category
pub type ScoreFn = fn(&Probe<'_>) -> f64;

/// One entry in the detection chain
#[derive(Clone, Copy)]
pub struct Heuristic {
    pub data_type: DataType,
    pub score: ScoreFn,
}

impl std::fmt::Debug for Heuristic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Heuristic")
            .field("data_type", &self.data_type)
            .finish()
    }
}

/// The standard detection chain, highest priority first
pub const DEFAULT_CHAIN: [Heuristic; 15] = [
    Heuristic { data_type: DataType::StockInfo, score: score_stock_info },
    Heuristic { data_type: DataType::Kline, score: score_kline },
    Heuristic { data_type: DataType::Financial, score: score_financial },
    Heuristic { data_type: DataType::Quote, score: score_quote },
    Heuristic { data_type: DataType::News, score: score_news },
    Heuristic { data_type: DataType::Search, score: score_search },
    Heuristic { data_type: DataType::FundFlow, score: score_fund_flow },
    Heuristic { data_type: DataType::Ranking, score: score_ranking },
    Heuristic { data_type: DataType::Holders, score: score_holders },
    Heuristic { data_type: DataType::Macro, score: score_macro },
    Heuristic { data_type: DataType::Metrics, score: score_metrics },
    Heuristic { data_type: DataType::WebContent, score: score_web_content },
    Heuristic { data_type: DataType::TimeSeries, score: score_time_series },
    Heuristic { data_type: DataType::Comparison, score: score_comparison },
    Heuristic { data_type: DataType::Table, score: score_table },
];

/// Precomputed view of a payload shared by every heuristic
#[derive(Debug)]
pub struct Probe<'a> {
    value: &'a Value,
    object: Option<&'a Map<String, Value>>,
    records: Option<&'a [Value]>,
    declared_columns: Option<Vec<String>>,
    columns: Vec<String>,
    hint: Option<String>,
}

impl<'a> Probe<'a> {
    pub fn new(value: &'a Value, hint: Option<&str>) -> Self {
        let object = value.as_object();

        let records = match value {
            Value::Array(items) => Some(items.as_slice()),
            Value::Object(map) => TABULAR_KEYS
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_array))
                .map(Vec::as_slice),
            _ => None,
        };

        let declared_columns = object
            .and_then(|map| map.get("columns"))
            .and_then(Value::as_array)
            .map(|cols| {
                cols.iter()
                    .filter_map(|c| c.as_str().map(str::to_string))
                    .collect::<Vec<_>>()
            })
            .filter(|cols| !cols.is_empty());

        let columns = match &declared_columns {
            Some(cols) => cols.clone(),
            None => infer_columns(records.unwrap_or_default()),
        };

        let hint = hint
            .map(str::to_string)
            .or_else(|| {
                object.and_then(|map| {
                    HINT_KEYS
                        .iter()
                        .find_map(|key| map.get(*key).and_then(Value::as_str))
                        .map(str::to_string)
                })
            })
            .map(|h| h.to_lowercase());

        Self {
            value,
            object,
            records,
            declared_columns,
            columns,
            hint,
        }
    }

    pub fn value(&self) -> &'a Value {
        self.value
    }

    pub fn object(&self) -> Option<&'a Map<String, Value>> {
        self.object
    }

    /// The tabular body: a top-level array or an array under a data key
    pub fn records(&self) -> Option<&'a [Value]> {
        self.records
    }

    /// Columns the payload declares explicitly
    pub fn declared_columns(&self) -> Option<&[String]> {
        self.declared_columns.as_deref()
    }

    /// Declared columns, or the keys seen in the first records
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    /// Top-level symbol or ticker
    pub fn symbol(&self) -> Option<&'a str> {
        let object = self.object?;
        SYMBOL_KEYS
            .iter()
            .find_map(|key| object.get(*key).and_then(Value::as_str))
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    fn has_column(&self, names: &[&str]) -> bool {
        self.columns
            .iter()
            .any(|c| names.contains(&normalize_key(c).as_str()))
    }

    /// Field/value pairs of the first few records
    fn sample_rows(&self) -> Vec<Vec<(&str, &'a Value)>> {
        let Some(records) = self.records else {
            return Vec::new();
        };

        records
            .iter()
            .take(ROW_SAMPLE)
            .filter_map(|row| match row {
                Value::Object(map) => Some(map.iter().map(|(k, v)| (k.as_str(), v)).collect()),
                Value::Array(cells) => self.declared_columns.as_ref().map(|cols| {
                    cols.iter()
                        .map(String::as_str)
                        .zip(cells.iter())
                        .collect::<Vec<_>>()
                }),
                _ => None,
            })
            .collect()
    }

    /// Columns whose sampled non-null values are all numbers
    fn numeric_columns(&self) -> Vec<&str> {
        let rows = self.sample_rows();
        self.columns
            .iter()
            .map(String::as_str)
            .filter(|column| {
                let mut values = rows
                    .iter()
                    .filter_map(|row| row.iter().find(|(k, _)| k == column).map(|(_, v)| *v))
                    .filter(|v| !v.is_null())
                    .peekable();
                values.peek().is_some() && values.all(Value::is_number)
            })
            .collect()
    }

    /// The date columns, and whether they were recognized by name or by value
    fn date_columns(&self) -> Option<(DateColumn, Vec<&str>)> {
        let named: Vec<&str> = self
            .columns
            .iter()
            .map(String::as_str)
            .filter(|c| DATE_KEYS.contains(&normalize_key(c).as_str()))
            .collect();
        if !named.is_empty() {
            return Some((DateColumn::Named, named));
        }

        let rows = self.sample_rows();
        let by_value: Vec<&str> = self
            .columns
            .iter()
            .map(String::as_str)
            .filter(|column| {
                let mut values = rows
                    .iter()
                    .filter_map(|row| row.iter().find(|(k, _)| k == column).map(|(_, v)| *v))
                    .peekable();
                values.peek().is_some()
                    && values.all(|v| v.as_str().map(looks_like_date).unwrap_or(false))
            })
            .collect();

        (!by_value.is_empty()).then_some((DateColumn::ByValue, by_value))
    }

    /// Normalized top-level keys plus normalized columns
    fn vocabulary(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .object
            .map(|map| map.keys().map(|k| normalize_key(k)).collect())
            .unwrap_or_default();
        for column in &self.columns {
            let column = normalize_key(column);
            if !keys.contains(&column) {
                keys.push(column);
            }
        }
        keys
    }
}

enum DateColumn {
    Named,
    ByValue,
}

const DATE_KEYS: [&str; 12] = [
    "date",
    "datetime",
    "time",
    "timestamp",
    "tradedate",
    "tradingdate",
    "period",
    "day",
    "month",
    "reportdate",
    "日期",
    "时间",
];

/// Lowercase and keep only alphanumerics, so `Total Revenue`, `total_revenue`
/// and `totalRevenue` compare equal.
pub fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn infer_columns(records: &[Value]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for row in records.iter().take(ROW_SAMPLE) {
        if let Value::Object(map) = row {
            for key in map.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
    }
    columns
}

fn looks_like_date(s: &str) -> bool {
    let s = s.trim();
    DateTime::parse_from_rfc3339(s).is_ok()
        || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
        || NaiveDate::parse_from_str(s, "%Y/%m/%d").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").is_ok()
}

fn has_any(map: &Map<String, Value>, keys: &[&str]) -> bool {
    keys.iter().any(|key| map.contains_key(*key))
}

fn number_at(map: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| map.get(*key).and_then(Value::as_f64))
}

fn text_at<'v>(map: &'v Map<String, Value>, keys: &[&str]) -> Option<&'v str> {
    keys.iter()
        .find_map(|key| map.get(*key).and_then(Value::as_str))
        .filter(|s| !s.trim().is_empty())
}

/// A field on the entry itself or on any object nested one level down
fn field_one_level<'v>(entry: &'v Map<String, Value>, key: &str) -> Option<&'v Value> {
    entry.get(key).or_else(|| {
        entry
            .values()
            .filter_map(Value::as_object)
            .find_map(|nested| nested.get(key))
    })
}

fn has_text_one_level(entry: &Map<String, Value>, keys: &[&str]) -> bool {
    keys.iter().any(|key| {
        field_one_level(entry, key)
            .and_then(Value::as_str)
            .map(|s| !s.trim().is_empty())
            .unwrap_or(false)
    })
}

fn has_field_one_level(entry: &Map<String, Value>, keys: &[&str]) -> bool {
    keys.iter().any(|key| field_one_level(entry, key).is_some())
}

/// A list of entry objects, either the payload itself or under one of `keys`
fn entry_list<'a>(
    probe: &Probe<'a>,
    keys: &[&'static str],
) -> Option<(Vec<&'a Map<String, Value>>, Option<&'static str>)> {
    let (items, key) = match probe.value() {
        Value::Array(items) => (items, None),
        Value::Object(map) => keys
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array).map(|a| (a, Some(*key))))?,
        _ => return None,
    };

    let entries: Vec<_> = items.iter().filter_map(Value::as_object).collect();
    (!entries.is_empty()).then_some((entries, key))
}

fn at_least_half(matching: usize, total: usize) -> bool {
    total > 0 && matching * 2 >= total
}

// ---------------------------------------------------------------------------
// Heuristics, in priority order
// ---------------------------------------------------------------------------

pub(crate) const PROFILE_KEYS: [&str; 4] = ["info", "profile", "company_info", "companyInfo"];
pub(crate) const COMPANY_NAME_KEYS: [&str; 5] =
    ["longName", "shortName", "companyName", "company_name", "name"];
const PROFILE_FIELDS: [&str; 10] = [
    "shortName",
    "longName",
    "name",
    "companyName",
    "sector",
    "industry",
    "currentPrice",
    "price",
    "regularMarketPrice",
    "marketCap",
];

pub fn score_stock_info(probe: &Probe<'_>) -> f64 {
    let Some(object) = probe.object() else {
        return 0.0;
    };

    if probe.symbol().is_some() {
        let profile = PROFILE_KEYS
            .iter()
            .find_map(|key| object.get(*key).and_then(Value::as_object));
        if let Some(profile) = profile {
            let fields = PROFILE_FIELDS
                .iter()
                .filter(|f| profile.contains_key(**f))
                .count();
            if fields >= 2 {
                return 0.95;
            }
            if fields == 1 {
                return 0.9;
            }
        }
    }

    let named = has_any(object, &["longName", "shortName", "companyName", "company_name"]);
    if named && has_any(object, &["sector", "industry"]) {
        return 0.9;
    }

    0.0
}

pub fn score_kline(probe: &Probe<'_>) -> f64 {
    if probe.records().is_none() {
        return 0.0;
    }
    let ohlc = ["open", "high", "low", "close"]
        .iter()
        .all(|wanted| probe.has_column(&[*wanted]));
    if ohlc {
        0.95
    } else {
        0.0
    }
}

const STATEMENT_TAG_KEYS: [&str; 5] = [
    "statement_type",
    "statementType",
    "report_type",
    "reportType",
    "statement",
];
const FINANCIAL_VOCABULARY: [&str; 15] = [
    "totalrevenue",
    "netincome",
    "grossprofit",
    "operatingincome",
    "ebitda",
    "totalassets",
    "totalliabilities",
    "totalequity",
    "stockholdersequity",
    "totalcurrentassets",
    "totalcurrentliabilities",
    "operatingcashflow",
    "freecashflow",
    "capitalexpenditure",
    "cashflowfromoperations",
];

pub fn score_financial(probe: &Probe<'_>) -> f64 {
    if probe.records().is_none() {
        return 0.0;
    }

    let tagged = probe
        .object()
        .and_then(|map| text_at(map, &STATEMENT_TAG_KEYS))
        .is_some();
    if tagged {
        return 0.9;
    }

    if probe.has_column(&FINANCIAL_VOCABULARY) {
        return 0.85;
    }

    // Statements are often transposed: one row per line item
    let labelled_rows = probe.sample_rows().iter().any(|row| {
        row.iter().any(|(_, v)| {
            v.as_str()
                .map(|s| FINANCIAL_VOCABULARY.contains(&normalize_key(s).as_str()))
                .unwrap_or(false)
        })
    });
    if labelled_rows {
        0.85
    } else {
        0.0
    }
}

const PRICE_KEYS: [&str; 6] = [
    "price",
    "current_price",
    "currentPrice",
    "last",
    "last_price",
    "lastPrice",
];
const CHANGE_KEYS: [&str; 6] = [
    "change",
    "change_percent",
    "changePercent",
    "change_pct",
    "pct_change",
    "changesPercentage",
];

pub fn score_quote(probe: &Probe<'_>) -> f64 {
    let Some(object) = probe.object() else {
        return 0.0;
    };

    if probe.symbol().is_some()
        && number_at(object, &PRICE_KEYS).is_some()
        && number_at(object, &CHANGE_KEYS).is_some()
    {
        return 0.9;
    }

    if number_at(object, &["regularMarketPrice"]).is_some()
        && number_at(object, &["regularMarketChange", "regularMarketChangePercent"]).is_some()
    {
        return 0.85;
    }

    0.0
}

const NEWS_LIST_KEYS: [&str; 5] = ["news", "articles", "stories", "items", "data"];
const NEWS_MARKERS: [&str; 9] = [
    "publisher",
    "provider",
    "published",
    "publishedAt",
    "published_at",
    "pubDate",
    "providerPublishTime",
    "summary",
    "author",
];

pub fn score_news(probe: &Probe<'_>) -> f64 {
    let Some((entries, key)) = entry_list(probe, &NEWS_LIST_KEYS) else {
        return 0.0;
    };
    let total = entries.len();

    let titled = entries
        .iter()
        .filter(|e| has_text_one_level(e, &["title"]))
        .count();
    let marked = entries
        .iter()
        .filter(|e| has_field_one_level(e, &NEWS_MARKERS))
        .count();
    let news_key = matches!(key, Some("news" | "articles" | "stories"));

    if at_least_half(titled, total) && (news_key || at_least_half(marked, total)) {
        return 0.9;
    }

    let summarized = entries
        .iter()
        .filter(|e| has_field_one_level(e, &["summary", "provider", "publisher"]))
        .count();
    if at_least_half(summarized, total) {
        return 0.85;
    }

    0.0
}

const SEARCH_LIST_KEYS: [&str; 5] = ["results", "organic", "organic_results", "items", "web_results"];

pub fn score_search(probe: &Probe<'_>) -> f64 {
    let Some((entries, _)) = entry_list(probe, &SEARCH_LIST_KEYS) else {
        return 0.0;
    };

    let complete = entries
        .iter()
        .filter(|e| {
            text_at(e, &["title"]).is_some()
                && text_at(e, &["snippet", "description"]).is_some()
                && text_at(e, &["url", "link", "href"]).is_some()
        })
        .count();

    if complete == entries.len() {
        0.85
    } else if at_least_half(complete, entries.len()) {
        0.8
    } else {
        0.0
    }
}

const FUND_FLOW_TERMS: [&str; 11] = [
    "netinflow",
    "netoutflow",
    "fundflow",
    "moneyflow",
    "mainforce",
    "净流入",
    "净流出",
    "资金流",
    "主力",
    "超大单",
    "大单",
];

pub fn score_fund_flow(probe: &Probe<'_>) -> f64 {
    let matches = probe
        .vocabulary()
        .iter()
        .filter(|key| FUND_FLOW_TERMS.iter().any(|term| key.contains(term)))
        .count();

    match matches {
        0 => 0.0,
        1 => 0.75,
        _ => 0.85,
    }
}

const RANK_KEYS: [&str; 3] = ["rank", "ranking", "排名"];

pub fn score_ranking(probe: &Probe<'_>) -> f64 {
    let rows = probe.sample_rows();
    let ranked = rows
        .iter()
        .filter(|row| row.iter().any(|(k, _)| RANK_KEYS.contains(&normalize_key(k).as_str())))
        .count();
    if at_least_half(ranked, rows.len()) {
        return 0.8;
    }

    if let Some(object) = probe.object() {
        if has_any(object, &["leaderboard", "rankings", "top_list"]) {
            return 0.75;
        }
        let marker = text_at(object, &["type", "kind"]).map(str::to_lowercase);
        if matches!(marker.as_deref(), Some("ranking" | "leaderboard")) {
            return 0.75;
        }
    }

    0.0
}

const HOLDER_LIST_KEYS: [&str; 13] = [
    "holders",
    "shareholders",
    "institutional_holders",
    "institutionalHolders",
    "major_holders",
    "majorHolders",
    "mutualfund_holders",
    "mutualFundHolders",
    "insider_holders",
    "top_holders",
    "topHolders",
    "十大股东",
    "股东",
];

pub fn score_holders(probe: &Probe<'_>) -> f64 {
    if let Some(object) = probe.object() {
        let listed = HOLDER_LIST_KEYS
            .iter()
            .any(|key| object.get(*key).map(Value::is_array).unwrap_or(false));
        if listed {
            return 0.8;
        }
    }

    if probe.has_column(&["holder", "shareholder", "holdername", "股东名称"]) {
        return 0.7;
    }

    0.0
}

const MACRO_TERMS: [&str; 5] = ["gdp", "cpi", "pmi", "unemployment", "interestrate"];

pub fn score_macro(probe: &Probe<'_>) -> f64 {
    if probe.hint().map(|h| h.contains("macro")).unwrap_or(false) {
        return 0.8;
    }

    let mut vocabulary = probe.vocabulary();
    if let Some(indicator) = probe.object().and_then(|map| text_at(map, &["indicator"])) {
        vocabulary.push(normalize_key(indicator));
    }

    let matched = MACRO_TERMS
        .iter()
        .filter(|term| vocabulary.iter().any(|key| key.contains(*term)))
        .count();

    match matched {
        0 => 0.0,
        1 => 0.7,
        _ => 0.8,
    }
}

/// Valuation ratios and the key spellings accepted for each
const METRIC_KEYS: [(&str, &[&str]); 5] = [
    ("pe", &["pe", "peratio", "trailingpe"]),
    ("pb", &["pb", "pbratio", "pricetobook"]),
    ("roe", &["roe", "returnonequity"]),
    ("roa", &["roa", "returnonassets"]),
    ("eps", &["eps", "trailingeps"]),
];

pub fn score_metrics(probe: &Probe<'_>) -> f64 {
    let Some(object) = probe.object() else {
        return 0.0;
    };

    let keys: Vec<String> = object.keys().map(|k| normalize_key(k)).collect();
    let present = METRIC_KEYS
        .iter()
        .filter(|(_, spellings)| keys.iter().any(|k| spellings.contains(&k.as_str())))
        .count();

    match present {
        0 | 1 => 0.0,
        2 => 0.6,
        3 => 0.7,
        _ => 0.75,
    }
}

pub fn score_web_content(probe: &Probe<'_>) -> f64 {
    let Some(object) = probe.object() else {
        return 0.0;
    };

    if text_at(object, &["url", "link", "source_url"]).is_none() {
        return 0.0;
    }

    if text_at(object, &["content", "markdown"]).is_some() {
        0.75
    } else if text_at(object, &["text", "raw_content", "html"]).is_some() {
        0.7
    } else {
        0.0
    }
}

pub fn score_time_series(probe: &Probe<'_>) -> f64 {
    if probe.records().is_none() {
        return 0.0;
    }
    let Some((kind, dates)) = probe.date_columns() else {
        return 0.0;
    };

    // An epoch timestamp is numeric but is the key, not the series
    let has_series = probe
        .numeric_columns()
        .iter()
        .any(|column| !dates.contains(column));
    if !has_series {
        return 0.0;
    }

    match kind {
        DateColumn::Named => 0.7,
        DateColumn::ByValue => 0.65,
    }
}

pub fn score_comparison(probe: &Probe<'_>) -> f64 {
    if probe.records().is_some() && probe.numeric_columns().len() >= 2 {
        0.6
    } else {
        0.0
    }
}

pub fn score_table(probe: &Probe<'_>) -> f64 {
    if probe.records().is_some() {
        0.51
    } else {
        0.0
    }
}
