//! Reconciliation engine: one trigger in, next filter state and every chart out.

use serde::Serialize;

use crate::chart::{build_chart, ChartSpec};
use crate::config::{ChartKind, DashboardConfig, VisualizationSpec};
use crate::data::Dataset;
use crate::filter::{apply_filters, FilterState};
use crate::trigger::{ClickPayload, TriggerEvent};

/// Result of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reconciliation {
    pub filters: FilterState,
    /// One chart per visualization, in declaration order.
    pub charts: Vec<ChartSpec>,
}

impl Reconciliation {
    pub fn chart(&self, viz_id: &str) -> Option<&ChartSpec> {
        self.charts.iter().find(|c| c.id == viz_id)
    }
}

/// Stateless engine over an immutable config and dataset.
#[derive(Debug, Clone, Copy)]
pub struct Engine<'a> {
    config: &'a DashboardConfig,
    dataset: &'a Dataset,
}

impl<'a> Engine<'a> {
    pub fn new(config: &'a DashboardConfig, dataset: &'a Dataset) -> Self {
        Self { config, dataset }
    }

    /// Filter state with every configured filter unset.
    pub fn initial_filters(&self) -> FilterState {
        FilterState::unset(&self.config.filters)
    }

    /// Run one pass: resolve the next filter state, filter, build every chart.
    pub fn reconcile(&self, current: &FilterState, trigger: &TriggerEvent) -> Reconciliation {
        let filters = self.next_filters(current, trigger);
        let charts = self.render_charts(&filters);
        Reconciliation { filters, charts }
    }

    /// Step 1: apply the trigger to the current filter state.
    pub fn next_filters(&self, current: &FilterState, trigger: &TriggerEvent) -> FilterState {
        let mut next = current.clone();
        match trigger {
            TriggerEvent::ResetRequested => {
                log::debug!("reset requested");
                next.clear_all();
            }
            TriggerEvent::FilterChanged { filter, value } => {
                if !next.set(filter, value.clone()) {
                    log::warn!("ignoring change to unknown filter '{}'", filter);
                }
            }
            TriggerEvent::VisualizationClicked {
                visualization,
                payload,
            } => match self.config.visualization(visualization) {
                Some(viz) => self.apply_click(&mut next, viz, payload),
                None => log::warn!("ignoring click on unknown visualization '{}'", visualization),
            },
        }
        next
    }

    fn apply_click(&self, state: &mut FilterState, viz: &VisualizationSpec, payload: &ClickPayload) {
        let Some(point) = payload.first() else {
            return;
        };
        match &viz.kind {
            ChartKind::Choropleth { location } | ChartKind::Choropleth2 { location } => {
                if let Some(region) = point.location() {
                    self.toggle_column(state, location, &region);
                }
            }
            // Heatmap rows are the x field, so the clicked point's y is the x value.
            ChartKind::Heatmap { x, y } => {
                if let Some(row) = point.y() {
                    self.toggle_column(state, x, &row);
                }
                if let Some(col) = point.x() {
                    self.toggle_column(state, y, &col);
                }
            }
            kind => {
                if let (Some(column), Some(value)) = (kind.click_column(), point.category()) {
                    self.toggle_column(state, column, &value);
                }
            }
        }
    }

    fn toggle_column(&self, state: &mut FilterState, column: &str, value: &str) {
        match self.config.filter_for_column(column) {
            Some(filter) => {
                state.toggle(&filter.id, value);
                log::debug!("click on '{}' -> {:?}", filter.id, state.get(&filter.id));
            }
            None => log::debug!("no filter bound to column '{}'; click ignored", column),
        }
    }

    /// Steps 2 and 3: filter the dataset and build every chart, isolating failures.
    pub fn render_charts(&self, filters: &FilterState) -> Vec<ChartSpec> {
        let view = apply_filters(self.dataset, &self.config.filters, filters);
        log::debug!("{} of {} records match the filters", view.len(), self.dataset.len());

        self.config
            .visualizations
            .iter()
            .map(|viz| {
                build_chart(viz, &view).unwrap_or_else(|e| {
                    log::warn!("failed to generate {}: {}", viz.id, e);
                    ChartSpec::placeholder(viz)
                })
            })
            .collect()
    }
}
