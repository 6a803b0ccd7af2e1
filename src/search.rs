//! Literal substring search over declared row paths.
//!
//! A row matches a (trimmed, lower-cased) query when either
//!
//! - the first property of `also_filter_by_properties` that holds a non-empty
//!   value on the row contains the query, or
//! - any path of `filter_props` resolves to a value whose stringification
//!   contains the query.
//!
//! Later fallback properties are never consulted once an earlier one produced
//! a value.

use crate::record::{Record, is_empty_value, resolve_path, stringify};
use crate::relay::{Relay, Subscription};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Immutable search configuration of one list view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchConfig {
    /// Dotted paths probed for the query.
    pub filter_props: Vec<String>,
    /// Ordered fallback chain; only the first non-empty one is checked.
    pub also_filter_by_properties: Vec<String>,
}

impl SearchConfig {
    pub fn new<I, S>(filter_props: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            filter_props: filter_props.into_iter().map(Into::into).collect(),
            also_filter_by_properties: Vec::new(),
        }
    }

    pub fn with_fallbacks<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.also_filter_by_properties = properties.into_iter().map(Into::into).collect();
        self
    }
}

/// Normalize a raw query: trimmed and lower-cased.
pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Does `row` match the already-normalized `query`?
pub fn row_matches<V: Record>(config: &SearchConfig, row: &V, query: &str) -> bool {
    if query.is_empty() || config.filter_props.is_empty() {
        return true;
    }

    let fallback = config
        .also_filter_by_properties
        .iter()
        .find_map(|property| resolve_path(row, property).filter(|v| !is_empty_value(v)));
    if let Some(value) = fallback
        && stringify(&value).to_lowercase().contains(query)
    {
        return true;
    }

    config.filter_props.iter().any(|path| {
        resolve_path(row, path)
            .filter(|value| !is_empty_value(value))
            .is_some_and(|value| stringify(&value).to_lowercase().contains(query))
    })
}

struct SearchState<V> {
    source: Vec<V>,
    query: String,
}

pub struct SearchEngine<V> {
    config: SearchConfig,
    state: Mutex<SearchState<V>>,
    output: Relay<Vec<V>>,
    input_subscription: Mutex<Option<Subscription>>,
}

impl<V> SearchEngine<V>
where
    V: Record + Clone + Send + Sync + 'static,
{
    pub fn new(config: SearchConfig) -> Self {
        if config.filter_props.is_empty() {
            warn!(
                target: "meeting_lists::search",
                "search configured without filter_props; every row will match"
            );
        }
        Self {
            config,
            state: Mutex::new(SearchState {
                source: Vec::new(),
                query: String::new(),
            }),
            output: Relay::new(),
            input_subscription: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn output(&self) -> &Relay<Vec<V>> {
        &self.output
    }

    /// Current normalized query.
    pub fn query(&self) -> String {
        self.state.lock().query.clone()
    }

    /// Set the query and re-filter the last source snapshot.
    pub fn search(&self, query: &str) {
        let result = {
            let mut state = self.state.lock();
            state.query = normalize_query(query);
            self.filter_rows(&state.source, &state.query)
        };
        trace!(target: "meeting_lists::search", rows = result.len(), "search applied");
        self.output.publish(result);
    }

    /// Replace the source snapshot and republish with the current query.
    pub fn set_source(&self, rows: Vec<V>) {
        let result = {
            let mut state = self.state.lock();
            state.source = rows;
            self.filter_rows(&state.source, &state.query)
        };
        self.output.publish(result);
    }

    pub fn matches(&self, row: &V) -> bool {
        let query = self.state.lock().query.clone();
        row_matches(&self.config, row, &query)
    }

    pub fn connect(self: &Arc<Self>, source: &Relay<Vec<V>>) {
        drop(self.input_subscription.lock().take());
        let weak = Arc::downgrade(self);
        let subscription = source.subscribe(move |rows: &Vec<V>| {
            if let Some(engine) = weak.upgrade() {
                engine.set_source(rows.clone());
            }
        });
        *self.input_subscription.lock() = Some(subscription);
    }

    pub fn disconnect(&self) {
        if self.input_subscription.lock().take().is_some() {
            debug!(target: "meeting_lists::search", "search stage disconnected");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.input_subscription.lock().is_some()
    }

    fn filter_rows(&self, rows: &[V], query: &str) -> Vec<V> {
        rows.iter()
            .filter(|row| row_matches(&self.config, *row, query))
            .cloned()
            .collect()
    }
}
