use serde::Deserialize;
use serde_json::Value;

use crate::config::Element;
use crate::data::scalar_to_string;

/// The single event that starts a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "trigger", rename_all = "snake_case")]
pub enum TriggerEvent {
    /// A dropdown selection; `None` clears the filter.
    FilterChanged {
        filter: String,
        #[serde(default)]
        value: Option<String>,
    },
    /// A click on a chart panel.
    VisualizationClicked {
        visualization: String,
        #[serde(default)]
        payload: ClickPayload,
    },
    ResetRequested,
}

impl TriggerEvent {
    /// Trigger for an interaction with a resolved UI element.
    ///
    /// `value` is only read for dropdowns and `payload` only for charts.
    pub fn from_element(element: Element<'_>, value: Option<String>, payload: ClickPayload) -> Self {
        match element {
            Element::ResetButton => TriggerEvent::ResetRequested,
            Element::Filter(filter) => TriggerEvent::FilterChanged {
                filter: filter.id.clone(),
                value,
            },
            Element::Visualization(viz) => TriggerEvent::VisualizationClicked {
                visualization: viz.id.clone(),
                payload,
            },
        }
    }
}

/// Points reported by the charting layer for a click. Only the first is used.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ClickPayload {
    #[serde(default)]
    pub points: Vec<ClickPoint>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ClickPoint {
    #[serde(default)]
    pub location: Option<Value>,
    #[serde(default)]
    pub label: Option<Value>,
    #[serde(default)]
    pub x: Option<Value>,
    #[serde(default)]
    pub y: Option<Value>,
}

impl ClickPayload {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&ClickPoint> {
        self.points.first()
    }

    /// Payload for a click on a single point, mostly for tests and replays.
    pub fn point(point: ClickPoint) -> Self {
        Self { points: vec![point] }
    }
}

impl ClickPoint {
    /// Clicked map region.
    pub fn location(&self) -> Option<String> {
        field(&self.location)
    }

    /// Clicked category label, falling back to the x value.
    pub fn category(&self) -> Option<String> {
        field(&self.label).or_else(|| field(&self.x))
    }

    pub fn x(&self) -> Option<String> {
        field(&self.x)
    }

    pub fn y(&self) -> Option<String> {
        field(&self.y)
    }
}

fn field(value: &Option<Value>) -> Option<String> {
    value
        .as_ref()
        .and_then(scalar_to_string)
        .filter(|s| !s.is_empty())
}
