//! Numbered list for news articles and search results.

use serde_json::{Map, Value};

use super::{RenderError, RenderedView, Renderer};
use crate::domain::DetectionResult;

const COMPONENT: &str = "article_list";
const LIST_KEYS: [&str; 9] = [
    "news",
    "articles",
    "stories",
    "results",
    "organic",
    "organic_results",
    "web_results",
    "items",
    "data",
];

#[derive(Debug, Clone)]
pub struct ArticleListRenderer {
    pub max_items: usize,
}

impl Default for ArticleListRenderer {
    fn default() -> Self {
        Self { max_items: 10 }
    }
}

impl Renderer for ArticleListRenderer {
    fn name(&self) -> &str {
        COMPONENT
    }

    fn render(&self, detection: &DetectionResult) -> Result<RenderedView, RenderError> {
        let items = match &detection.data {
            Value::Array(items) => Some(items),
            Value::Object(map) => LIST_KEYS
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_array)),
            _ => None,
        }
        .ok_or(RenderError::UnexpectedShape {
            component: COMPONENT,
            expected: "a list of articles",
        })?;

        let entries: Vec<String> = items
            .iter()
            .filter_map(Value::as_object)
            .filter_map(format_entry)
            .take(self.max_items)
            .enumerate()
            .map(|(i, entry)| format!("{:>2}. {}", i + 1, entry))
            .collect();

        if entries.is_empty() {
            return Err(RenderError::Empty {
                component: COMPONENT,
            });
        }

        Ok(RenderedView::new(
            COMPONENT,
            detection.display_title(),
            entries.join("\n"),
        ))
    }
}

/// `title (source)`, with the link on the following line
fn format_entry(entry: &Map<String, Value>) -> Option<String> {
    let title = text(entry, &["title", "headline"])?;
    let source = text(entry, &["publisher", "source", "provider", "displayLink"]);
    let link = text(entry, &["url", "link", "href", "canonicalUrl"]);

    let mut line = title;
    if let Some(source) = source {
        line.push_str(&format!(" ({})", source));
    }
    if let Some(link) = link {
        line.push_str(&format!("\n    {}", link));
    }
    Some(line)
}

/// A text field on the entry or one object level down
fn text(entry: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        let value = entry.get(*key).or_else(|| {
            entry
                .values()
                .filter_map(Value::as_object)
                .find_map(|nested| nested.get(*key))
        })?;
        match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            // e.g. provider: {displayName: ...}
            Value::Object(nested) => nested
                .get("displayName")
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DataType, DetectionMetadata};
    use serde_json::json;

    #[test]
    fn test_renders_nested_news_entries() {
        let detection = DetectionResult {
            data_type: DataType::News,
            confidence: 0.9,
            data: json!([
                {"content": {"title": "Apple unveils new chip", "provider": {"displayName": "Reuters"}}},
                {"title": "Markets rally", "publisher": "Bloomberg", "link": "https://example.com/a"}
            ]),
            metadata: DetectionMetadata::default(),
        };

        let view = ArticleListRenderer::default().render(&detection).unwrap();
        assert_eq!(
            view.body,
            " 1. Apple unveils new chip (Reuters)\n 2. Markets rally (Bloomberg)\n    https://example.com/a"
        );
    }

    #[test]
    fn test_untitled_entries_are_empty() {
        let detection = DetectionResult {
            data_type: DataType::Search,
            confidence: 0.85,
            data: json!({"results": [{"snippet": "no title"}]}),
            metadata: DetectionMetadata::default(),
        };

        assert_eq!(
            ArticleListRenderer::default().render(&detection).unwrap_err(),
            RenderError::Empty { component: "article_list" }
        );
    }
}
