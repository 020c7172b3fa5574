//! One-line price quote card.

use serde_json::{Map, Value};

use super::{format_number, RenderError, RenderedView, Renderer};
use crate::domain::DetectionResult;

const COMPONENT: &str = "quote";

#[derive(Debug, Default, Clone, Copy)]
pub struct QuoteRenderer;

impl Renderer for QuoteRenderer {
    fn name(&self) -> &str {
        COMPONENT
    }

    fn render(&self, detection: &DetectionResult) -> Result<RenderedView, RenderError> {
        let quote = detection
            .data
            .as_object()
            .ok_or(RenderError::UnexpectedShape {
                component: COMPONENT,
                expected: "a quote object",
            })?;

        let price = number(
            quote,
            &["price", "current_price", "currentPrice", "last", "last_price", "lastPrice", "regularMarketPrice"],
        )
        .ok_or(RenderError::Empty {
            component: COMPONENT,
        })?;
        let change = number(quote, &["change", "regularMarketChange"]);
        let percent = number(
            quote,
            &["change_percent", "changePercent", "change_pct", "pct_change", "changesPercentage", "regularMarketChangePercent"],
        );

        let mut line = match detection.metadata.symbol.as_deref() {
            Some(symbol) => format!("{}  {}", symbol, format_number(price)),
            None => format_number(price),
        };
        if let Some(change) = change {
            line.push_str(&format!("  {}", signed(change)));
        }
        if let Some(percent) = percent {
            line.push_str(&format!(" ({}%)", signed(percent)));
        }

        let direction = match change.or(percent) {
            Some(c) if c > 0.0 => "▲ up",
            Some(c) if c < 0.0 => "▼ down",
            _ => "■ flat",
        };

        Ok(RenderedView::new(
            COMPONENT,
            detection.display_title(),
            format!("{}\n{}", line, direction),
        ))
    }
}

fn number(map: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| map.get(*key).and_then(Value::as_f64))
}

fn signed(value: f64) -> String {
    if value > 0.0 {
        format!("+{}", format_number(value))
    } else {
        format_number(value)
    }
}
