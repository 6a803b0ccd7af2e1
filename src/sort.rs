//! Sort stage: comparator selection by property, persisted per list view.

use crate::record::{Record, resolve_path, stringify};
use crate::relay::{Relay, Subscription};
use crate::storage::{self, FilterStorage, ModeGate};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Persisted sort choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortDefinition {
    pub sort_property: String,
    #[serde(default = "default_ascending")]
    pub ascending: bool,
}

fn default_ascending() -> bool {
    true
}

impl SortDefinition {
    pub fn ascending(property: impl Into<String>) -> Self {
        Self {
            sort_property: property.into(),
            ascending: true,
        }
    }

    pub fn descending(property: impl Into<String>) -> Self {
        Self {
            sort_property: property.into(),
            ascending: false,
        }
    }
}

/// Row comparator registered for one sort property.
pub type Comparator<V> = Arc<dyn Fn(&V, &V) -> Ordering + Send + Sync>;

/// Ordering of two resolved values: missing/null last, then by kind
/// (numbers, booleans, text, arrays and objects), and within one kind
/// numerically, `false` first, or as case-insensitive text.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => kind_rank(x).cmp(&kind_rank(y)).then_with(|| match (x, y) {
            (Value::Number(x), Value::Number(y)) => number_key(x).total_cmp(&number_key(y)),
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            _ => stringify(x).to_lowercase().cmp(&stringify(y).to_lowercase()),
        }),
    }
}

fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Number(_) => 0,
        Value::Bool(_) => 1,
        Value::String(_) => 2,
        Value::Array(_) | Value::Object(_) => 3,
        Value::Null => 4,
    }
}

fn number_key(number: &serde_json::Number) -> f64 {
    number.as_f64().unwrap_or(f64::NAN)
}

struct SortState<V> {
    definition: SortDefinition,
    input: Vec<V>,
}

pub struct SortEngine<V> {
    storage_key: String,
    default_definition: SortDefinition,
    comparators: HashMap<String, Comparator<V>>,
    state: Mutex<SortState<V>>,
    output: Relay<Vec<V>>,
    input_subscription: Mutex<Option<Subscription>>,
    storage: Arc<dyn FilterStorage>,
    gate: Arc<dyn ModeGate>,
}

impl<V> SortEngine<V>
where
    V: Record + Clone + Send + Sync + 'static,
{
    pub fn new(
        storage_key: impl Into<String>,
        default_definition: SortDefinition,
        storage: Arc<dyn FilterStorage>,
        gate: Arc<dyn ModeGate>,
    ) -> Self {
        Self {
            storage_key: storage_key.into(),
            state: Mutex::new(SortState {
                definition: default_definition.clone(),
                input: Vec::new(),
            }),
            default_definition,
            comparators: HashMap::new(),
            output: Relay::new(),
            input_subscription: Mutex::new(None),
            storage,
            gate,
        }
    }

    /// Use `comparator` instead of value comparison for `property`.
    pub fn with_comparator(
        mut self,
        property: impl Into<String>,
        comparator: impl Fn(&V, &V) -> Ordering + Send + Sync + 'static,
    ) -> Self {
        self.comparators.insert(property.into(), Arc::new(comparator));
        self
    }

    pub fn output(&self) -> &Relay<Vec<V>> {
        &self.output
    }

    pub fn definition(&self) -> SortDefinition {
        self.state.lock().definition.clone()
    }

    /// Sorted copy of `rows` under the current definition. Stable; ties keep
    /// ascending id order.
    pub fn sort_rows(&self, rows: &[V]) -> Vec<V> {
        let definition = self.definition();
        self.sorted_with(&definition, rows)
    }

    fn sorted_with(&self, definition: &SortDefinition, rows: &[V]) -> Vec<V> {
        let mut sorted = rows.to_vec();
        let comparator = self.comparators.get(&definition.sort_property);
        sorted.sort_by(|a, b| {
            let ord = match comparator {
                Some(cmp) => cmp(a, b),
                None => compare_values(
                    resolve_path(a, &definition.sort_property).as_ref(),
                    resolve_path(b, &definition.sort_property).as_ref(),
                ),
            };
            let ord = if definition.ascending { ord } else { ord.reverse() };
            ord.then_with(|| a.id().cmp(&b.id()))
        });
        sorted
    }

    /// Load the persisted sort choice (skipped in history mode).
    pub async fn restore(&self) {
        if self.gate.is_frozen() {
            return;
        }
        let key = storage::sort_key(&self.storage_key);
        let restored = match self.storage.get(&key).await {
            Ok(Some(raw)) => serde_json::from_value::<SortDefinition>(raw).ok(),
            Ok(None) => None,
            Err(err) => {
                debug!(target: "meeting_lists::sort", key = %key, error = %err, "failed loading sort");
                None
            }
        };
        if let Some(definition) = restored {
            self.apply_definition(definition);
        }
    }

    /// Sort by `property`. Choosing the current property again flips the
    /// direction.
    pub async fn set_sort_property(&self, property: &str) {
        let mut definition = self.definition();
        if definition.sort_property == property {
            definition.ascending = !definition.ascending;
        } else {
            definition = SortDefinition::ascending(property);
        }
        self.set_sort(definition).await;
    }

    pub async fn set_sort(&self, definition: SortDefinition) {
        self.apply_definition(definition.clone());
        if self.gate.is_frozen() {
            return;
        }
        let key = storage::sort_key(&self.storage_key);
        let value = match serde_json::to_value(&definition) {
            Ok(value) => value,
            Err(err) => {
                warn!(target: "meeting_lists::sort", error = %err, "failed serializing sort");
                return;
            }
        };
        if let Err(err) = self.storage.set(&key, value).await {
            warn!(target: "meeting_lists::sort", key = %key, error = %err, "failed persisting sort");
        }
    }

    /// Back to the view's default ordering (in memory only).
    pub fn reset(&self) {
        self.apply_definition(self.default_definition.clone());
    }

    pub fn set_input(&self, rows: Vec<V>) {
        let sorted = {
            let mut state = self.state.lock();
            state.input = rows;
            self.sorted_with(&state.definition, &state.input)
        };
        self.output.publish(sorted);
    }

    pub fn connect(self: &Arc<Self>, source: &Relay<Vec<V>>) {
        drop(self.input_subscription.lock().take());
        let weak = Arc::downgrade(self);
        let subscription = source.subscribe(move |rows: &Vec<V>| {
            if let Some(engine) = weak.upgrade() {
                engine.set_input(rows.clone());
            }
        });
        *self.input_subscription.lock() = Some(subscription);
    }

    pub fn disconnect(&self) {
        if self.input_subscription.lock().take().is_some() {
            debug!(target: "meeting_lists::sort", key = %self.storage_key, "sort stage disconnected");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.input_subscription.lock().is_some()
    }

    fn apply_definition(&self, definition: SortDefinition) {
        let sorted = {
            let mut state = self.state.lock();
            state.definition = definition;
            self.sorted_with(&state.definition, &state.input)
        };
        self.output.publish(sorted);
    }
}
