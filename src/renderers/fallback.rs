//! Generic preview used when no renderer is registered for a data type.

use crate::domain::DetectionResult;

use super::{RenderError, RenderedView, Renderer};

pub const FALLBACK_COMPONENT: &str = "fallback";

/// Pretty-prints the payload under the synthesized title
#[derive(Debug, Default, Clone, Copy)]
pub struct FallbackRenderer;

impl FallbackRenderer {
    /// Infallible preview; never produces an empty title or body
    pub fn preview(&self, detection: &DetectionResult) -> RenderedView {
        let body = serde_json::to_string_pretty(&detection.data)
            .unwrap_or_else(|_| detection.data.to_string());
        let body = if body.trim().is_empty() {
            "(empty)".to_string()
        } else {
            body
        };

        RenderedView::new(FALLBACK_COMPONENT, detection.display_title(), body)
    }
}

impl Renderer for FallbackRenderer {
    fn name(&self) -> &str {
        FALLBACK_COMPONENT
    }

    fn render(&self, detection: &DetectionResult) -> Result<RenderedView, RenderError> {
        Ok(self.preview(detection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DataType, DetectionMetadata};
    use serde_json::json;

    #[test]
    fn test_preview_pretty_prints_with_title() {
        let detection = DetectionResult {
            data_type: DataType::Holders,
            confidence: 0.8,
            data: json!({"holders": [{"name": "Vanguard"}]}),
            metadata: DetectionMetadata {
                title: Some("AAPL Shareholders".to_string()),
                ..Default::default()
            },
        };

        let view = FallbackRenderer.preview(&detection);
        assert_eq!(view.component, "fallback");
        assert_eq!(view.title, "AAPL Shareholders");
        assert!(view.body.contains("\"Vanguard\""));
        assert!(view.body.contains('\n'));
    }

    #[test]
    fn test_preview_without_title() {
        let detection = DetectionResult {
            data_type: DataType::Table,
            confidence: 0.51,
            data: json!([1]),
            metadata: DetectionMetadata::default(),
        };

        assert_eq!(FallbackRenderer.preview(&detection).title, "Data Preview");
    }
}
