use crate::engine::{Engine, Reconciliation};
use crate::filter::FilterState;
use crate::trigger::TriggerEvent;

/// Owns the filter state between passes and feeds triggers to the engine one at a time.
#[derive(Debug)]
pub struct Session<'a> {
    engine: Engine<'a>,
    filters: FilterState,
}

impl<'a> Session<'a> {
    pub fn new(engine: Engine<'a>) -> Self {
        let filters = engine.initial_filters();
        Self { engine, filters }
    }

    /// Start from a previously saved state.
    pub fn with_filters(engine: Engine<'a>, filters: FilterState) -> Self {
        Self { engine, filters }
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    /// Charts for the current state, without applying a trigger.
    pub fn current(&self) -> Reconciliation {
        Reconciliation {
            filters: self.filters.clone(),
            charts: self.engine.render_charts(&self.filters),
        }
    }

    /// Process one trigger and keep the resulting filter state.
    pub fn apply(&mut self, trigger: &TriggerEvent) -> Reconciliation {
        let result = self.engine.reconcile(&self.filters, trigger);
        self.filters = result.filters.clone();
        result
    }

    /// Apply triggers in order; returns the last pass, or the current view if there were none.
    pub fn replay<'t, I>(&mut self, triggers: I) -> Reconciliation
    where
        I: IntoIterator<Item = &'t TriggerEvent>,
    {
        // Intermediate charts are never observed, so only filter state is advanced.
        for trigger in triggers {
            self.filters = self.engine.next_filters(&self.filters, trigger);
        }
        self.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DashboardConfig;
    use crate::data::Dataset;
    use crate::trigger::{ClickPayload, ClickPoint};
    use serde_json::json;

    fn fixtures() -> (Dataset, String) {
        let csv = "event_date,actor_type,country,industry\n\
                   2024-01-01,Criminal,Brazil,Finance\n\
                   2024-01-02,Hacktivist,Peru,Retail\n";
        let config = r#"{
            "filters": [{"id": "country", "column": "country", "label": "Country", "placeholder": "-"}],
            "visualizations": [{"id": "viz_map", "type": "choropleth", "title": "Map", "location": "country"}]
        }"#;
        (Dataset::from_csv_reader(csv.as_bytes()).unwrap(), config.to_string())
    }

    fn brazil() -> TriggerEvent {
        TriggerEvent::VisualizationClicked {
            visualization: "viz_map".to_string(),
            payload: ClickPayload::point(ClickPoint {
                location: Some(json!("Brazil")),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_session_keeps_state_between_passes() {
        let (data, text) = fixtures();
        let config = DashboardConfig::from_json_str(&text, &data).unwrap();
        let mut session = Session::new(Engine::new(&config, &data));

        session.apply(&brazil());
        assert_eq!(session.filters().get("country"), Some("Brazil"));
        session.apply(&brazil());
        assert!(session.filters().is_all_unset());
    }

    #[test]
    fn test_replay_matches_sequential_apply() {
        let (data, text) = fixtures();
        let config = DashboardConfig::from_json_str(&text, &data).unwrap();
        let engine = Engine::new(&config, &data);
        let triggers = vec![brazil(), TriggerEvent::ResetRequested, brazil()];

        let mut stepwise = Session::new(engine);
        let mut last = stepwise.current();
        for t in &triggers {
            last = stepwise.apply(t);
        }

        let mut replayed = Session::new(engine);
        assert_eq!(replayed.replay(&triggers), last);
    }

    #[test]
    fn test_replay_of_nothing_is_current_view() {
        let (data, text) = fixtures();
        let config = DashboardConfig::from_json_str(&text, &data).unwrap();
        let mut session = Session::new(Engine::new(&config, &data));
        let result = session.replay(std::iter::empty::<&TriggerEvent>());
        assert!(result.filters.is_all_unset());
        assert_eq!(result.charts.len(), 1);
    }
}
