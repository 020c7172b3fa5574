//! Renderers turn a classified payload into a view.
//!
//! Renderers are registered against data types in a
//! [`ComponentRegistry`](crate::core::ComponentRegistry) once at startup.
//! [`default_registry`] is the composition root for the built-in set.

pub mod articles;
pub mod fallback;
pub mod key_value;
pub mod quote;
pub mod table;

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::core::{ComponentRegistry, RegistryBuilder, RegistryError};
use crate::domain::{DataType, DetectionResult};

pub use articles::ArticleListRenderer;
pub use fallback::{FallbackRenderer, FALLBACK_COMPONENT};
pub use key_value::KeyValueRenderer;
pub use quote::QuoteRenderer;
pub use table::TableRenderer;

/// A rendered, display-ready view of a payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedView {
    /// Name of the renderer that produced this view
    pub component: String,

    /// Heading
    pub title: String,

    /// Body text
    pub body: String,
}

impl RenderedView {
    pub fn new(
        component: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            component: component.into(),
            title: title.into(),
            body: body.into(),
        }
    }
}

impl std::fmt::Display for RenderedView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.title)?;
        writeln!(f, "{}", "─".repeat(self.title.chars().count().max(3)))?;
        write!(f, "{}", self.body)
    }
}

/// Errors a renderer can report; the router degrades to the fallback view
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("{component} expected {expected}")]
    UnexpectedShape {
        component: &'static str,
        expected: &'static str,
    },

    #[error("{component} found nothing to show")]
    Empty { component: &'static str },
}

/// Presents one or more data types
pub trait Renderer: Send + Sync {
    /// Component name
    fn name(&self) -> &str;

    /// Render a classified payload
    fn render(&self, detection: &DetectionResult) -> Result<RenderedView, RenderError>;
}

/// Register the built-in renderers.
///
/// `holders` and `web_content` have no built-in renderer and take
/// the fallback path.
pub fn register_builtin(registry: &mut RegistryBuilder) -> Result<(), RegistryError> {
    let table: Arc<dyn Renderer> = Arc::new(TableRenderer::default());
    for data_type in [
        DataType::Kline,
        DataType::Financial,
        DataType::Ranking,
        DataType::TimeSeries,
        DataType::Comparison,
        DataType::Table,
    ] {
        registry.register(data_type, Arc::clone(&table))?;
    }

    let sheet: Arc<dyn Renderer> = Arc::new(KeyValueRenderer);
    for data_type in [
        DataType::StockInfo,
        DataType::FundFlow,
        DataType::Macro,
        DataType::Metrics,
    ] {
        registry.register(data_type, Arc::clone(&sheet))?;
    }

    let articles: Arc<dyn Renderer> = Arc::new(ArticleListRenderer::default());
    registry.register(DataType::News, Arc::clone(&articles))?;
    registry.register(DataType::Search, articles)?;

    registry.register(DataType::Quote, Arc::new(QuoteRenderer))?;

    Ok(())
}

/// Registry populated with the built-in renderers
pub fn default_registry() -> Result<Arc<ComponentRegistry>, RegistryError> {
    let mut builder = ComponentRegistry::builder();
    register_builtin(&mut builder)?;
    Ok(Arc::new(builder.build()))
}

/// Render a JSON scalar for display
pub(crate) fn display_scalar(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "-".to_string(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() => format_number(f),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

/// Compact float formatting: up to 4 decimals, trailing zeros trimmed
pub(crate) fn format_number(value: f64) -> String {
    let text = format!("{:.4}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}
