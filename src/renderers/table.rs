//! Plain-text table for record-shaped payloads.

use serde_json::{Map, Value};

use super::{display_scalar, RenderError, RenderedView, Renderer};
use crate::domain::DetectionResult;

const COMPONENT: &str = "table";
const TABULAR_KEYS: [&str; 3] = ["data", "rows", "records"];
const MAX_CELL_WIDTH: usize = 24;

/// Renders the tabular body as aligned columns
#[derive(Debug, Clone)]
pub struct TableRenderer {
    /// Rows shown before the remainder is summarized
    pub max_rows: usize,
}

impl Default for TableRenderer {
    fn default() -> Self {
        Self { max_rows: 20 }
    }
}

impl Renderer for TableRenderer {
    fn name(&self) -> &str {
        COMPONENT
    }

    fn render(&self, detection: &DetectionResult) -> Result<RenderedView, RenderError> {
        let rows = tabular_body(&detection.data).ok_or(RenderError::UnexpectedShape {
            component: COMPONENT,
            expected: "an array of records",
        })?;

        let columns = detection
            .metadata
            .columns
            .clone()
            .unwrap_or_else(|| object_columns(rows));
        if columns.is_empty() {
            return Err(RenderError::Empty {
                component: COMPONENT,
            });
        }

        let cells: Vec<Vec<String>> = rows
            .iter()
            .take(self.max_rows)
            .map(|row| row_cells(row, &columns))
            .collect();

        let widths: Vec<usize> = columns
            .iter()
            .enumerate()
            .map(|(i, column)| {
                cells
                    .iter()
                    .map(|row| row[i].chars().count())
                    .chain(std::iter::once(column.chars().count()))
                    .max()
                    .unwrap_or(0)
                    .min(MAX_CELL_WIDTH)
            })
            .collect();

        let mut lines = Vec::with_capacity(cells.len() + 3);
        lines.push(format_line(&columns, &widths));
        lines.push(
            widths
                .iter()
                .map(|w| "-".repeat(*w))
                .collect::<Vec<_>>()
                .join("  "),
        );
        for row in &cells {
            lines.push(format_line(row, &widths));
        }
        if rows.len() > self.max_rows {
            lines.push(format!("… {} more rows", rows.len() - self.max_rows));
        }

        Ok(RenderedView::new(
            COMPONENT,
            detection.display_title(),
            lines.join("\n"),
        ))
    }
}

fn tabular_body(data: &Value) -> Option<&[Value]> {
    match data {
        Value::Array(items) => Some(items.as_slice()),
        Value::Object(map) => TABULAR_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array))
            .map(Vec::as_slice),
        _ => None,
    }
}

fn object_columns(rows: &[Value]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for key in rows.iter().filter_map(Value::as_object).flat_map(Map::keys) {
        if !columns.contains(key) {
            columns.push(key.clone());
        }
    }
    columns
}

fn row_cells(row: &Value, columns: &[String]) -> Vec<String> {
    match row {
        Value::Object(map) => columns
            .iter()
            .map(|c| map.get(c).map(display_scalar).unwrap_or_default())
            .collect(),
        Value::Array(values) => (0..columns.len())
            .map(|i| values.get(i).map(display_scalar).unwrap_or_default())
            .collect(),
        scalar => {
            let mut cells = vec![String::new(); columns.len()];
            cells[0] = display_scalar(scalar);
            cells
        }
    }
}

fn format_line(cells: &[String], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| {
            let cell: String = if cell.chars().count() > *width {
                let mut cut: String = cell.chars().take(width.saturating_sub(1)).collect();
                cut.push('…');
                cut
            } else {
                cell.clone()
            };
            format!("{:<width$}", cell, width = *width)
        })
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}
