//! Key/value sheet for profile and indicator objects.

use serde_json::Value;

use super::{display_scalar, RenderError, RenderedView, Renderer};
use crate::domain::DetectionResult;

const COMPONENT: &str = "key_value";

#[derive(Debug, Default, Clone, Copy)]
pub struct KeyValueRenderer;

impl Renderer for KeyValueRenderer {
    fn name(&self) -> &str {
        COMPONENT
    }

    fn render(&self, detection: &DetectionResult) -> Result<RenderedView, RenderError> {
        let mut pairs = Vec::new();
        match &detection.data {
            Value::Object(map) => collect_pairs("", map, &mut pairs),
            Value::Array(rows) => {
                for (i, row) in rows.iter().enumerate() {
                    if let Value::Object(map) = row {
                        collect_pairs(&format!("[{}].", i), map, &mut pairs);
                    }
                }
            }
            _ => {
                return Err(RenderError::UnexpectedShape {
                    component: COMPONENT,
                    expected: "an object",
                })
            }
        }

        if pairs.is_empty() {
            return Err(RenderError::Empty {
                component: COMPONENT,
            });
        }

        let width = pairs.iter().map(|(k, _)| k.chars().count()).max().unwrap_or(0);
        let body = pairs
            .iter()
            .map(|(key, value)| format!("{:<width$}  {}", key, value, width = width))
            .collect::<Vec<_>>()
            .join("\n");

        Ok(RenderedView::new(COMPONENT, detection.display_title(), body))
    }
}

/// Scalars at this level, plus scalars one object level down (dotted keys)
fn collect_pairs(prefix: &str, map: &serde_json::Map<String, Value>, out: &mut Vec<(String, String)>) {
    for (key, value) in map {
        match value {
            Value::Object(nested) => {
                for (inner_key, inner) in nested {
                    if !inner.is_object() && !inner.is_array() {
                        out.push((format!("{}{}.{}", prefix, key, inner_key), display_scalar(inner)));
                    }
                }
            }
            Value::Array(items) => {
                out.push((format!("{}{}", prefix, key), format!("{} items", items.len())));
            }
            scalar => out.push((format!("{}{}", prefix, key), display_scalar(scalar))),
        }
    }
}
