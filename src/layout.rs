//! Page layout handed to the hosting UI: the filter panel and the chart grid.

use serde::Serialize;

use crate::config::{DashboardConfig, VisualizationSpec, RESET_BUTTON_ID};
use crate::data::Dataset;

/// Columns in one grid row.
pub const GRID_COLUMNS: u8 = 12;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardLayout {
    pub title: String,
    pub filter_panel: FilterPanel,
    pub rows: Vec<LayoutRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterPanel {
    pub dropdowns: Vec<Dropdown>,
    pub reset_button: ResetButton,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dropdown {
    pub id: String,
    pub label: String,
    pub placeholder: String,
    pub options: Vec<String>,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResetButton {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutRow {
    pub cells: Vec<LayoutCell>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutCell {
    pub id: String,
    pub width: u8,
}

impl LayoutRow {
    pub fn width(&self) -> u8 {
        self.cells.iter().map(|c| c.width).sum()
    }
}

/// Build the full layout: one dropdown per filter, then the packed chart grid.
pub fn generate_layout(config: &DashboardConfig, dataset: &Dataset) -> DashboardLayout {
    let dropdowns = config
        .filters
        .iter()
        .map(|f| Dropdown {
            id: f.id.clone(),
            label: f.label.clone(),
            placeholder: f.placeholder.clone(),
            options: dataset.unique_values(&f.column),
            value: None,
        })
        .collect();

    DashboardLayout {
        title: config.title.clone(),
        filter_panel: FilterPanel {
            dropdowns,
            reset_button: ResetButton {
                id: RESET_BUTTON_ID.to_string(),
                label: "Reset Filters".to_string(),
            },
        },
        rows: pack_rows(&config.visualizations),
    }
}

/// Greedy row packing in declaration order; a panel that would overflow starts a new row.
pub fn pack_rows(visualizations: &[VisualizationSpec]) -> Vec<LayoutRow> {
    let mut rows = Vec::new();
    let mut row: Vec<LayoutCell> = Vec::new();
    let mut current_width = 0u8;

    for viz in visualizations {
        let width = viz.width.clamp(1, GRID_COLUMNS);
        if current_width + width > GRID_COLUMNS {
            rows.push(LayoutRow { cells: std::mem::take(&mut row) });
            current_width = 0;
        }
        row.push(LayoutCell {
            id: viz.id.clone(),
            width,
        });
        current_width += width;
    }

    if !row.is_empty() {
        rows.push(LayoutRow { cells: row });
    }
    rows
}
