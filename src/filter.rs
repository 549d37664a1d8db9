use std::collections::HashMap;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::config::FilterSpec;
use crate::data::{Dataset, DatasetView};

/// Current value of every configured filter, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterState {
    entries: Vec<(String, Option<String>)>,
}

impl FilterState {
    /// Every filter unset.
    pub fn unset(filters: &[FilterSpec]) -> Self {
        Self {
            entries: filters.iter().map(|f| (f.id.clone(), None)).collect(),
        }
    }

    /// Build a state from an id-keyed map; ids absent from the map stay unset.
    ///
    /// Ids not naming a configured filter are ignored with a warning.
    pub fn from_map(filters: &[FilterSpec], mut values: HashMap<String, Option<String>>) -> Self {
        let mut state = Self::unset(filters);
        for (id, value) in state.entries.iter_mut() {
            *value = values.remove(id.as_str()).flatten().filter(|v| !v.is_empty());
        }
        for id in values.keys() {
            log::warn!("ignoring value for unknown filter '{}'", id);
        }
        state
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == id)
            .and_then(|(_, v)| v.as_deref())
    }

    /// Set or clear a filter. An empty string clears. Returns false for unknown ids.
    pub fn set(&mut self, id: &str, value: Option<String>) -> bool {
        match self.entries.iter_mut().find(|(k, _)| k == id) {
            Some((_, slot)) => {
                *slot = value.filter(|v| !v.is_empty());
                true
            }
            None => false,
        }
    }

    /// Clear the filter if it already equals `value`, else set it.
    pub fn toggle(&mut self, id: &str, value: &str) -> bool {
        let next = if self.get(id) == Some(value) {
            None
        } else {
            Some(value.to_string())
        };
        self.set(id, next)
    }

    pub fn clear_all(&mut self) {
        for (_, value) in self.entries.iter_mut() {
            *value = None;
        }
    }

    pub fn is_all_unset(&self) -> bool {
        self.entries.iter().all(|(_, v)| v.is_none())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_deref()))
    }
}

impl Serialize for FilterState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, value) in &self.entries {
            map.serialize_entry(id, value)?;
        }
        map.end()
    }
}

/// Apply one equality predicate per set filter, in filter declaration order.
pub fn apply_filters<'a>(
    dataset: &'a Dataset,
    filters: &[FilterSpec],
    state: &FilterState,
) -> DatasetView<'a> {
    let mut view = dataset.view();
    for filter in filters {
        let Some(value) = state.get(&filter.id) else {
            continue;
        };
        match dataset.column_index(&filter.column) {
            Ok(idx) => view.retain_eq(idx, value),
            Err(e) => log::warn!("filter '{}' skipped: {}", filter.id, e),
        }
    }
    view
}
