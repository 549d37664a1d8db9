//! Chart specifications and the per-type aggregations that produce them.
//!
//! A [`ChartSpec`] is renderer-agnostic: it carries the aggregated numbers and
//! the field names a charting collaborator needs, nothing about pixels.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

use crate::config::{ChartKind, VisualizationSpec};
use crate::data::{is_null, DatasetView};
use crate::error::ChartBuildError;

/// Text shown by the placeholder chart.
pub const NO_DATA: &str = "No Data Available";

/// Horizontal bar charts keep only this many most frequent values.
pub const TOP_N: usize = 10;

/// Heatmap column labels longer than this are truncated.
pub const MAX_LABEL_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub id: String,
    pub title: String,
    #[serde(flatten)]
    pub body: ChartBody,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChartBody {
    Line {
        x_field: String,
        y_field: String,
        points: Vec<CategoryCount>,
    },
    Bar {
        x_field: String,
        y_field: String,
        bars: Vec<CategoryCount>,
    },
    StackedBar {
        x_field: String,
        y_field: String,
        color_field: String,
        categories: Vec<String>,
        series: Vec<Series>,
    },
    Pie {
        names_field: String,
        slices: Vec<CategoryCount>,
    },
    HorizontalBar {
        field: String,
        orientation: String,
        bars: Vec<CategoryCount>,
    },
    Choropleth {
        location_field: String,
        regions: Vec<CategoryCount>,
        color_scale: Option<ColorScale>,
    },
    Treemap {
        path: Vec<String>,
        values_field: String,
        nodes: Vec<TreemapNode>,
    },
    Heatmap {
        x_field: String,
        y_field: String,
        rows: Vec<String>,
        columns: Vec<String>,
        column_labels: Vec<String>,
        cells: Vec<Vec<u64>>,
    },
    Placeholder {
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: u64,
}

/// One color group of a stacked bar chart; `counts` aligns with the chart's categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Series {
    pub key: String,
    pub counts: Vec<u64>,
}

/// Fixed sequential scale with a two-tick legend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorScale {
    pub name: String,
    pub title: String,
    pub ticks: Vec<Tick>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tick {
    pub value: u64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreemapNode {
    pub id: String,
    pub label: String,
    pub parent: String,
    pub value: f64,
}

impl ChartSpec {
    /// The "No Data Available" chart for a visualization.
    pub fn placeholder(viz: &VisualizationSpec) -> Self {
        Self {
            id: viz.id.clone(),
            title: viz.title.clone(),
            body: ChartBody::Placeholder {
                message: NO_DATA.to_string(),
            },
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.body, ChartBody::Placeholder { .. })
    }
}

/// Aggregate the view for one visualization.
pub fn build_chart(
    viz: &VisualizationSpec,
    view: &DatasetView<'_>,
) -> Result<ChartSpec, ChartBuildError> {
    if view.is_empty() {
        return Err(ChartBuildError::Empty);
    }

    let body = match &viz.kind {
        ChartKind::Line { x, y } => ChartBody::Line {
            x_field: x.clone(),
            y_field: y.clone(),
            points: sorted_by_key(count_by(view, x)?),
        },
        ChartKind::Bar { x, y } => ChartBody::Bar {
            x_field: x.clone(),
            y_field: y.clone(),
            bars: sorted_by_key(count_by(view, x)?),
        },
        ChartKind::StackedBar { x, y, color } => stacked_bar(view, x, y, color)?,
        ChartKind::Pie { names } => ChartBody::Pie {
            names_field: names.clone(),
            slices: sorted_by_frequency(count_by(view, names)?),
        },
        ChartKind::HorizontalBar {
            column,
            orientation,
        } => {
            let mut bars = sorted_by_frequency(count_by(view, column)?);
            bars.truncate(TOP_N);
            ChartBody::HorizontalBar {
                field: column.clone(),
                orientation: orientation.clone(),
                bars,
            }
        }
        ChartKind::Choropleth { location } => ChartBody::Choropleth {
            location_field: location.clone(),
            regions: sorted_by_key(count_by(view, location)?),
            color_scale: None,
        },
        ChartKind::Choropleth2 { location } => {
            let regions = sorted_by_key(count_by(view, location)?);
            let color_scale = legend_scale(&regions);
            ChartBody::Choropleth {
                location_field: location.clone(),
                regions,
                color_scale: Some(color_scale),
            }
        }
        ChartKind::Treemap { path, values } => treemap(view, path, values)?,
        ChartKind::Heatmap { x, y } => heatmap(view, x, y)?,
    };

    Ok(ChartSpec {
        id: viz.id.clone(),
        title: viz.title.clone(),
        body,
    })
}

/// Count non-null values of `column`. Errors when nothing is left to count.
fn count_by(view: &DatasetView<'_>, column: &str) -> Result<BTreeMap<String, u64>, ChartBuildError> {
    let mut counts = BTreeMap::new();
    for value in view.column(column)? {
        *counts.entry(value.to_string()).or_insert(0) += 1;
    }
    if counts.is_empty() {
        return Err(ChartBuildError::Empty);
    }
    Ok(counts)
}

fn sorted_by_key(counts: BTreeMap<String, u64>) -> Vec<CategoryCount> {
    counts
        .into_iter()
        .map(|(category, count)| CategoryCount { category, count })
        .collect()
}

/// Descending count; ties broken by ascending category.
fn sorted_by_frequency(counts: BTreeMap<String, u64>) -> Vec<CategoryCount> {
    let mut items = sorted_by_key(counts);
    items.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.category.cmp(&b.category)));
    items
}

fn legend_scale(regions: &[CategoryCount]) -> ColorScale {
    let min = regions.iter().map(|r| r.count).min().unwrap_or(0);
    let max = regions.iter().map(|r| r.count).max().unwrap_or(0);
    ColorScale {
        name: "Reds".to_string(),
        title: "Event Count".to_string(),
        ticks: vec![
            Tick { value: min, text: "Low".to_string() },
            Tick { value: max, text: "High".to_string() },
        ],
    }
}

fn stacked_bar(
    view: &DatasetView<'_>,
    x: &str,
    y: &str,
    color: &str,
) -> Result<ChartBody, ChartBuildError> {
    let dataset = view.dataset();
    let x_idx = dataset.column_index(x)?;
    let c_idx = dataset.column_index(color)?;

    let mut pairs: BTreeMap<(&str, &str), u64> = BTreeMap::new();
    for row in view.rows() {
        let (xv, cv) = (row[x_idx].as_str(), row[c_idx].as_str());
        if is_null(xv) || is_null(cv) {
            continue;
        }
        *pairs.entry((xv, cv)).or_insert(0) += 1;
    }
    if pairs.is_empty() {
        return Err(ChartBuildError::Empty);
    }

    let categories: Vec<String> = distinct(pairs.keys().map(|(xv, _)| *xv))
        .into_iter()
        .map(str::to_string)
        .collect();
    let position: HashMap<&str, usize> = categories
        .iter()
        .enumerate()
        .map(|(i, c)| (c.as_str(), i))
        .collect();

    let mut by_color: BTreeMap<&str, Vec<u64>> = BTreeMap::new();
    for ((xv, cv), count) in &pairs {
        let counts = by_color
            .entry(*cv)
            .or_insert_with(|| vec![0; categories.len()]);
        counts[position[xv]] = *count;
    }

    Ok(ChartBody::StackedBar {
        x_field: x.to_string(),
        y_field: y.to_string(),
        color_field: color.to_string(),
        categories,
        series: by_color
            .into_iter()
            .map(|(key, counts)| Series { key: key.to_string(), counts })
            .collect(),
    })
}

/// Sum `values` over every prefix of `path`. Rows with a null path segment or value are skipped.
fn treemap(
    view: &DatasetView<'_>,
    path: &[String],
    values: &str,
) -> Result<ChartBody, ChartBuildError> {
    let dataset = view.dataset();
    let path_idx = path
        .iter()
        .map(|c| dataset.column_index(c))
        .collect::<Result<Vec<_>, _>>()?;
    let value_idx = dataset.column_index(values)?;

    let mut sums: BTreeMap<Vec<&str>, f64> = BTreeMap::new();
    let mut total = 0.0;
    for row in view.rows() {
        let raw = row[value_idx].trim();
        if raw.is_empty() || path_idx.iter().any(|&i| is_null(&row[i])) {
            continue;
        }
        let value: f64 = raw.parse().map_err(|_| ChartBuildError::NotNumeric {
            column: values.to_string(),
            value: raw.to_string(),
        })?;
        total += value;
        let segments: Vec<&str> = path_idx.iter().map(|&i| row[i].as_str()).collect();
        for depth in 1..=segments.len() {
            *sums.entry(segments[..depth].to_vec()).or_insert(0.0) += value;
        }
    }
    if sums.is_empty() || total == 0.0 {
        return Err(ChartBuildError::Empty);
    }

    let nodes = sums
        .into_iter()
        .map(|(segments, value)| {
            let parent = segments[..segments.len() - 1].join("/");
            TreemapNode {
                id: segments.join("/"),
                label: segments.last().copied().unwrap_or_default().to_string(),
                parent,
                value,
            }
        })
        .collect();

    Ok(ChartBody::Treemap {
        path: path.to_vec(),
        values_field: values.to_string(),
        nodes,
    })
}

/// Cross-tabulate `x` (rows) by `y` (columns); missing cells are zero.
fn heatmap(view: &DatasetView<'_>, x: &str, y: &str) -> Result<ChartBody, ChartBuildError> {
    let dataset = view.dataset();
    let x_idx = dataset.column_index(x)?;
    let y_idx = dataset.column_index(y)?;

    let mut pairs: BTreeMap<(&str, &str), u64> = BTreeMap::new();
    for row in view.rows() {
        let (xv, yv) = (row[x_idx].as_str(), row[y_idx].as_str());
        if is_null(xv) || is_null(yv) {
            continue;
        }
        *pairs.entry((xv, yv)).or_insert(0) += 1;
    }
    if pairs.is_empty() {
        return Err(ChartBuildError::Empty);
    }

    let rows: Vec<&str> = distinct(pairs.keys().map(|(r, _)| *r));
    let columns: Vec<&str> = distinct(pairs.keys().map(|(_, c)| *c));
    let cells = rows
        .iter()
        .map(|r| {
            columns
                .iter()
                .map(|c| pairs.get(&(*r, *c)).copied().unwrap_or(0))
                .collect()
        })
        .collect();

    Ok(ChartBody::Heatmap {
        x_field: x.to_string(),
        y_field: y.to_string(),
        rows: rows.iter().map(|s| s.to_string()).collect(),
        column_labels: columns.iter().map(|c| truncate_label(c, MAX_LABEL_LEN)).collect(),
        columns: columns.iter().map(|s| s.to_string()).collect(),
        cells,
    })
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    values.collect::<BTreeSet<_>>().into_iter().collect()
}

/// Cut a label to `max_len` characters and mark the cut with "...".
pub fn truncate_label(label: &str, max_len: usize) -> String {
    if label.chars().count() > max_len {
        let mut cut: String = label.chars().take(max_len).collect();
        cut.push_str("...");
        cut
    } else {
        label.to_string()
    }
}
