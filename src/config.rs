//! Declarative dashboard configuration: filters and visualization panels.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::data::Dataset;
use crate::error::ConfigError;

/// Element id of the "Reset Filters" button.
pub const RESET_BUTTON_ID: &str = "reset-filters-button";

/// Name of the aggregated measure column produced by count aggregations.
pub const COUNT_FIELD: &str = "count";

const DEFAULT_TITLE: &str = "CyDash: The Cyber-Events Dashboard";

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_title")]
    pub title: String,
    pub filters: Vec<FilterSpec>,
    pub visualizations: Vec<VisualizationSpec>,
}

fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FilterSpec {
    pub id: String,
    pub column: String,
    pub label: String,
    pub placeholder: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VisualizationSpec {
    pub id: String,
    pub title: String,
    #[serde(default = "default_width")]
    pub width: u8,
    #[serde(flatten)]
    pub kind: ChartKind,
}

fn default_width() -> u8 {
    6
}

/// Chart type with the field references each type requires.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChartKind {
    Line {
        x: String,
        y: String,
    },
    Bar {
        x: String,
        y: String,
    },
    StackedBar {
        x: String,
        y: String,
        color: String,
    },
    Pie {
        names: String,
    },
    HorizontalBar {
        column: String,
        #[serde(default = "default_orientation")]
        orientation: String,
    },
    Choropleth {
        location: String,
    },
    #[serde(rename = "choropleth2")]
    Choropleth2 {
        location: String,
    },
    Treemap {
        path: Vec<String>,
        values: String,
    },
    Heatmap {
        x: String,
        y: String,
    },
}

fn default_orientation() -> String {
    "h".to_string()
}

impl ChartKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ChartKind::Line { .. } => "line",
            ChartKind::Bar { .. } => "bar",
            ChartKind::StackedBar { .. } => "stacked_bar",
            ChartKind::Pie { .. } => "pie",
            ChartKind::HorizontalBar { .. } => "horizontal_bar",
            ChartKind::Choropleth { .. } => "choropleth",
            ChartKind::Choropleth2 { .. } => "choropleth2",
            ChartKind::Treemap { .. } => "treemap",
            ChartKind::Heatmap { .. } => "heatmap",
        }
    }

    /// Every dataset column this chart reads.
    pub fn columns(&self) -> Vec<&str> {
        match self {
            ChartKind::Line { x, .. } | ChartKind::Bar { x, .. } => vec![x.as_str()],
            ChartKind::StackedBar { x, color, .. } => vec![x.as_str(), color.as_str()],
            ChartKind::Pie { names } => vec![names.as_str()],
            ChartKind::HorizontalBar { column, .. } => vec![column.as_str()],
            ChartKind::Choropleth { location } | ChartKind::Choropleth2 { location } => {
                vec![location.as_str()]
            }
            ChartKind::Treemap { path, values } => {
                path.iter().map(String::as_str).chain([values.as_str()]).collect()
            }
            ChartKind::Heatmap { x, y } => vec![x.as_str(), y.as_str()],
        }
    }

    /// Column a click on this chart filters by (single-axis charts only).
    ///
    /// Follows `names`, then `x`, then `column`, whichever the chart defines.
    pub fn click_column(&self) -> Option<&str> {
        match self {
            ChartKind::Pie { names } => Some(names),
            ChartKind::Line { x, .. }
            | ChartKind::Bar { x, .. }
            | ChartKind::StackedBar { x, .. } => Some(x),
            ChartKind::HorizontalBar { column, .. } => Some(column),
            ChartKind::Choropleth { location } | ChartKind::Choropleth2 { location } => {
                Some(location)
            }
            ChartKind::Treemap { .. } | ChartKind::Heatmap { .. } => None,
        }
    }
}

/// What a UI element id is bound to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Element<'a> {
    Filter(&'a FilterSpec),
    Visualization(&'a VisualizationSpec),
    ResetButton,
}

impl DashboardConfig {
    /// Read and validate a config file against the dataset schema.
    pub fn load(path: &Path, dataset: &Dataset) -> Result<Self, ConfigError> {
        let text =
            fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_json_str(&text, dataset)
    }

    pub fn from_json_str(text: &str, dataset: &Dataset) -> Result<Self, ConfigError> {
        let config: DashboardConfig = serde_json::from_str(text)?;
        config.validate(dataset)?;
        log::debug!(
            "config loaded: {} filters, {} visualizations",
            config.filters.len(),
            config.visualizations.len()
        );
        Ok(config)
    }

    /// Check ids and every column reference.
    pub fn validate(&self, dataset: &Dataset) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        let ids = self
            .filters
            .iter()
            .map(|f| &f.id)
            .chain(self.visualizations.iter().map(|v| &v.id));
        for id in ids {
            if id == RESET_BUTTON_ID {
                return Err(ConfigError::ReservedId(id.clone()));
            }
            if !seen.insert(id.as_str()) {
                return Err(ConfigError::DuplicateId(id.clone()));
            }
        }

        for filter in &self.filters {
            require_column(dataset, &filter.id, &filter.column)?;
        }

        for viz in &self.visualizations {
            if !(1..=12).contains(&viz.width) {
                return Err(ConfigError::InvalidWidth {
                    owner: viz.id.clone(),
                    width: viz.width,
                });
            }
            match &viz.kind {
                ChartKind::Line { y, .. }
                | ChartKind::Bar { y, .. }
                | ChartKind::StackedBar { y, .. }
                    if y != COUNT_FIELD =>
                {
                    return Err(ConfigError::InvalidMeasure {
                        owner: viz.id.clone(),
                        found: y.clone(),
                    });
                }
                ChartKind::HorizontalBar { orientation, .. }
                    if orientation != "h" && orientation != "v" =>
                {
                    return Err(ConfigError::InvalidOrientation {
                        owner: viz.id.clone(),
                        found: orientation.clone(),
                    });
                }
                ChartKind::Treemap { path, .. } if path.is_empty() => {
                    return Err(ConfigError::EmptyPath(viz.id.clone()));
                }
                _ => {}
            }
            for column in viz.kind.columns() {
                require_column(dataset, &viz.id, column)?;
            }
        }
        Ok(())
    }

    pub fn filter(&self, id: &str) -> Option<&FilterSpec> {
        self.filters.iter().find(|f| f.id == id)
    }

    pub fn visualization(&self, id: &str) -> Option<&VisualizationSpec> {
        self.visualizations.iter().find(|v| v.id == id)
    }

    /// First filter (in declaration order) bound to `column`.
    pub fn filter_for_column(&self, column: &str) -> Option<&FilterSpec> {
        self.filters
            .iter()
            .find(|f| f.column.eq_ignore_ascii_case(column))
    }

    /// Resolve a UI element id.
    pub fn element(&self, id: &str) -> Option<Element<'_>> {
        if id == RESET_BUTTON_ID {
            return Some(Element::ResetButton);
        }
        self.filter(id)
            .map(Element::Filter)
            .or_else(|| self.visualization(id).map(Element::Visualization))
    }
}

fn require_column(dataset: &Dataset, owner: &str, column: &str) -> Result<(), ConfigError> {
    if dataset.has_column(column) {
        Ok(())
    } else {
        Err(ConfigError::UnknownColumn {
            owner: owner.to_string(),
            column: column.to_string(),
        })
    }
}
