//! Filter engine for list views.
//!
//! Each list view owns one [`FilterEngine`]. It holds the view's
//! [`FilterState`] (definitions, latest input rows, derived filter stack),
//! republishes the filtered rows on every input or definition change, and
//! persists the definitions under `filter_<storage_key>` unless the
//! [`ModeGate`] reports history mode.
//!
//! Predicate semantics: a row passes when, for every definition that has at
//! least one active option, at least one active option matches the row's value
//! at the definition's property. Definitions without active options impose no
//! constraint.

pub mod chips;
pub mod repo;
pub mod types;

pub use chips::FilterChip;
pub use repo::{ItemPredicate, OptionSource};
pub use types::{
    ActiveFilter, Condition, FilterDefinition, FilterEntry, FilterOption, parse_persisted,
};

use crate::record::{Record, resolve_path};
use crate::relay::{Relay, Subscription};
use crate::storage::{self, FilterStorage, ModeGate};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Per-view customization points.
pub trait FilterHooks<V>: Send + Sync {
    /// Definitions used when nothing valid is persisted.
    fn default_definitions(&self) -> Vec<FilterDefinition>;

    /// Drop rows before the definitions are applied (and before counts are
    /// computed).
    fn pre_filter(&self, rows: Vec<V>) -> Vec<V> {
        rows
    }
}

/// [`FilterHooks`] from a closure producing the default definitions.
pub struct DefaultDefinitions<F>(pub F);

impl<V, F> FilterHooks<V> for DefaultDefinitions<F>
where
    F: Fn() -> Vec<FilterDefinition> + Send + Sync,
{
    fn default_definitions(&self) -> Vec<FilterDefinition> {
        (self.0)()
    }
}

/// Mutable filter state of one list view.
#[derive(Debug)]
pub struct FilterState<V> {
    /// `None` until [`FilterEngine::restore_or_initialize`] ran.
    pub filter_definitions: Option<Vec<FilterDefinition>>,
    pub input_data: Vec<V>,
    /// Derived from `filter_definitions`; never edited directly.
    pub filter_stack: Vec<ActiveFilter>,
    pub storage_key: String,
}

impl<V: Record + Clone> FilterState<V> {
    fn new(storage_key: String) -> Self {
        Self {
            filter_definitions: None,
            input_data: Vec::new(),
            filter_stack: Vec::new(),
            storage_key,
        }
    }

    fn filtered(&self) -> Vec<V> {
        match &self.filter_definitions {
            Some(defs) => apply_definitions(defs, &self.input_data),
            None => self.input_data.clone(),
        }
    }

    fn refresh_derived(&mut self) {
        if let Some(defs) = self.filter_definitions.as_mut() {
            for def in defs.iter_mut() {
                recount_definition(def, &self.input_data);
            }
            self.filter_stack = compute_stack(defs);
        } else {
            self.filter_stack.clear();
        }
    }
}

/// Every active `(definition, option)` pair, in definition order.
pub fn compute_stack(definitions: &[FilterDefinition]) -> Vec<ActiveFilter> {
    definitions
        .iter()
        .flat_map(|def| {
            def.active_options().into_iter().map(|option| ActiveFilter {
                property: def.property.clone(),
                definition_label: def.label.clone(),
                option: option.clone(),
            })
        })
        .collect()
}

/// AND across definitions, OR within one.
pub fn row_passes<V: Record>(definitions: &[FilterDefinition], row: &V) -> bool {
    definitions.iter().all(|def| {
        let active = def.active_options();
        if active.is_empty() {
            return true;
        }
        let actual = resolve_path(row, &def.property);
        active
            .iter()
            .any(|option| option.condition.matches(actual.as_ref()))
    })
}

pub fn apply_definitions<V: Record + Clone>(definitions: &[FilterDefinition], data: &[V]) -> Vec<V> {
    data.iter()
        .filter(|row| row_passes(definitions, *row))
        .cloned()
        .collect()
}

/// Recompute each option's row count and the definition's active count.
fn recount_definition<V: Record>(def: &mut FilterDefinition, rows: &[V]) {
    let values: Vec<Option<Value>> = rows
        .iter()
        .map(|row| resolve_path(row, &def.property))
        .collect();
    def.for_each_option_mut(|option| {
        let count = values
            .iter()
            .filter(|value| option.condition.matches(value.as_ref()))
            .count();
        option.count = Some(count);
    });
    def.update_count();
}

pub struct FilterEngine<V> {
    state: Mutex<FilterState<V>>,
    output: Relay<Vec<V>>,
    definitions: Relay<Vec<FilterDefinition>>,
    input_subscription: Mutex<Option<Subscription>>,
    repo_subscriptions: Mutex<Vec<Subscription>>,
    /// Repo-sourced options that arrived before the definitions were loaded.
    pending_options: Mutex<HashMap<String, Vec<FilterEntry>>>,
    storage: Arc<dyn FilterStorage>,
    gate: Arc<dyn ModeGate>,
    hooks: Arc<dyn FilterHooks<V>>,
}

impl<V> FilterEngine<V>
where
    V: Record + Clone + Send + Sync + 'static,
{
    pub fn new(
        storage_key: impl Into<String>,
        storage: Arc<dyn FilterStorage>,
        gate: Arc<dyn ModeGate>,
        hooks: Arc<dyn FilterHooks<V>>,
    ) -> Self {
        Self {
            state: Mutex::new(FilterState::new(storage_key.into())),
            output: Relay::new(),
            definitions: Relay::new(),
            input_subscription: Mutex::new(None),
            repo_subscriptions: Mutex::new(Vec::new()),
            pending_options: Mutex::new(HashMap::new()),
            storage,
            gate,
            hooks,
        }
    }

    pub fn storage_key(&self) -> String {
        self.state.lock().storage_key.clone()
    }

    /// Filtered rows, replayed to late subscribers.
    pub fn output(&self) -> &Relay<Vec<V>> {
        &self.output
    }

    /// Definitions (with counts) after every change, for filter menus.
    pub fn definitions_relay(&self) -> &Relay<Vec<FilterDefinition>> {
        &self.definitions
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock().filter_definitions.is_some()
    }

    pub fn filter_definitions(&self) -> Option<Vec<FilterDefinition>> {
        self.state.lock().filter_definitions.clone()
    }

    pub fn filter_stack(&self) -> Vec<ActiveFilter> {
        self.state.lock().filter_stack.clone()
    }

    /// Number of active options across all definitions.
    pub fn filter_count(&self) -> usize {
        self.state.lock().filter_stack.len()
    }

    pub fn has_active_filters(&self) -> bool {
        self.filter_count() > 0
    }

    pub fn filter_chips(&self) -> Vec<FilterChip> {
        self.state
            .lock()
            .filter_stack
            .iter()
            .map(FilterChip::from)
            .collect()
    }

    pub fn input_data(&self) -> Vec<V> {
        self.state.lock().input_data.clone()
    }

    /// Filter `data` with the current definitions without touching state.
    pub fn apply_filters(&self, data: &[V]) -> Vec<V> {
        match &self.state.lock().filter_definitions {
            Some(defs) => apply_definitions(defs, data),
            None => data.to_vec(),
        }
    }

    /// Load persisted definitions, or adopt and persist the view defaults.
    ///
    /// Must complete before [`FilterEngine::connect`] so the first filtered
    /// emission already uses the restored definitions. In history mode the
    /// store is neither read nor written.
    pub async fn restore_or_initialize(&self) {
        let key = storage::filter_key(&self.storage_key());
        let restored = if self.gate.is_frozen() {
            debug!(target: "meeting_lists::filter", key = %key, "history mode: skipping persisted filters");
            None
        } else {
            match self.storage.get(&key).await {
                Ok(Some(raw)) => {
                    let parsed = parse_persisted(raw);
                    if parsed.is_none() {
                        debug!(target: "meeting_lists::filter", key = %key, "persisted filters have an invalid shape; using defaults");
                    }
                    parsed
                }
                Ok(None) => None,
                Err(err) => {
                    debug!(target: "meeting_lists::filter", key = %key, error = %err, "failed loading persisted filters; using defaults");
                    None
                }
            }
        };

        let from_defaults = restored.is_none();
        let definitions = restored.unwrap_or_else(|| self.hooks.default_definitions());
        let pending: HashMap<String, Vec<FilterEntry>> = std::mem::take(&mut *self.pending_options.lock());

        let (filtered, defs_snapshot) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let mut definitions = definitions;
            for (property, options) in pending {
                if let Some(def) = definitions.iter_mut().find(|d| d.property == property) {
                    merge_options(def, options);
                }
            }
            state.filter_definitions = Some(definitions);
            state.refresh_derived();
            (state.filtered(), state.filter_definitions.clone().unwrap_or_default())
        };
        debug!(
            target: "meeting_lists::filter",
            key = %key,
            from_defaults,
            definitions = defs_snapshot.len(),
            "filter definitions ready"
        );
        self.definitions.publish(defs_snapshot);
        self.output.publish(filtered);

        if from_defaults {
            self.persist().await;
        }
    }

    /// Attach to the upstream row stream, replacing any previous attachment.
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

    /// Release the upstream row subscription only.
    pub fn disconnect_input(&self) {
        if self.input_subscription.lock().take().is_some() {
            debug!(target: "meeting_lists::filter", key = %self.storage_key(), "filter stage disconnected");
        }
    }

    /// Release the upstream subscription and every repo-backed option source.
    pub fn disconnect(&self) {
        self.disconnect_input();
        let repo: Vec<Subscription> = std::mem::take(&mut *self.repo_subscriptions.lock());
        drop(repo);
    }

    pub fn is_connected(&self) -> bool {
        self.input_subscription.lock().is_some()
    }

    /// Replace the input rows and republish the filtered result.
    pub fn set_input(&self, rows: Vec<V>) {
        let (filtered, defs) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            state.input_data = self.hooks.pre_filter(rows);
            state.refresh_derived();
            (state.filtered(), state.filter_definitions.clone())
        };
        trace!(target: "meeting_lists::filter", rows = filtered.len(), "input filtered");
        if let Some(defs) = defs {
            self.definitions.publish(defs);
        }
        self.output.publish(filtered);
    }

    /// Flip the option of `property` whose condition equals `option`'s.
    /// Returns whether an option was toggled; unknown properties and
    /// uninitialized state are a no-op.
    pub async fn toggle_filter_option(&self, property: &str, option: &FilterOption) -> bool {
        self.toggle_condition(property, &option.condition).await
    }

    pub async fn toggle_condition(&self, property: &str, condition: &Condition) -> bool {
        let toggled = self.mutate_definitions(|defs| {
            // First definition with the property wins.
            let Some(def) = defs.iter_mut().find(|d| d.property == property) else {
                return false;
            };
            let mut hit = false;
            def.for_each_option_mut(|candidate| {
                if !hit && candidate.condition == *condition {
                    candidate.is_active = !candidate.is_active;
                    hit = true;
                }
            });
            def.update_count();
            hit
        });
        if toggled {
            self.persist().await;
        } else {
            debug!(target: "meeting_lists::filter", property, "toggle ignored: no matching option");
        }
        toggled
    }

    /// Deactivate every option of every definition.
    pub async fn clear_all_filters(&self) {
        let changed = self.mutate_definitions(|defs| {
            for def in defs.iter_mut() {
                def.for_each_option_mut(|option| option.is_active = false);
                def.update_count();
            }
            true
        });
        if changed {
            self.persist().await;
        }
    }

    /// Populate the options of the `property` definition from a live
    /// collection. Every emission of `source` rebuilds the options, keeps
    /// previously active selections and recomputes counts.
    pub fn update_filter_for_repo<T>(
        self: &Arc<Self>,
        source: &Relay<Vec<T>>,
        property: impl Into<String>,
        predicate: Option<ItemPredicate<T>>,
        none_option_label: Option<String>,
    ) where
        T: OptionSource + Clone + Send + Sync + 'static,
    {
        let weak = Arc::downgrade(self);
        let property = property.into();
        let subscription = source.subscribe(move |items: &Vec<T>| {
            let Some(engine) = weak.upgrade() else {
                return;
            };
            let options =
                repo::options_from_items(items, predicate.as_ref(), none_option_label.as_deref());
            engine.refresh_options(&property, options);
        });
        self.repo_subscriptions.lock().push(subscription);
    }

    /// Replace the options of one definition in place and rerun the
    /// definitions refresh (selection carry-over, counts, stack, output).
    pub fn refresh_options(&self, property: &str, options: Vec<FilterEntry>) {
        let (filtered, defs_snapshot) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let Some(defs) = state.filter_definitions.as_mut() else {
                trace!(target: "meeting_lists::filter", property, "definitions not loaded yet; deferring options");
                self.pending_options
                    .lock()
                    .insert(property.to_string(), options);
                return;
            };
            let Some(def) = defs.iter_mut().find(|d| d.property == property) else {
                debug!(target: "meeting_lists::filter", property, "no definition for repo-backed options");
                return;
            };
            merge_options(def, options);
            state.refresh_derived();
            (state.filtered(), state.filter_definitions.clone().unwrap_or_default())
        };
        self.definitions.publish(defs_snapshot);
        self.output.publish(filtered);
    }

    fn mutate_definitions(&self, f: impl FnOnce(&mut Vec<FilterDefinition>) -> bool) -> bool {
        let (filtered, defs_snapshot) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let Some(defs) = state.filter_definitions.as_mut() else {
                debug!(target: "meeting_lists::filter", "filter definitions not initialized; ignoring");
                return false;
            };
            if !f(defs) {
                return false;
            }
            state.filter_stack = compute_stack(defs);
            let snapshot = defs.clone();
            (state.filtered(), snapshot)
        };
        self.definitions.publish(defs_snapshot);
        self.output.publish(filtered);
        true
    }

    async fn persist(&self) {
        if self.gate.is_frozen() {
            debug!(target: "meeting_lists::filter", "history mode: not persisting filters");
            return;
        }
        let (key, payload) = {
            let state = self.state.lock();
            let Some(defs) = &state.filter_definitions else {
                return;
            };
            (
                storage::filter_key(&state.storage_key),
                serde_json::to_value(defs),
            )
        };
        let value = match payload {
            Ok(value) => value,
            Err(err) => {
                warn!(target: "meeting_lists::filter", key = %key, error = %err, "failed serializing filters");
                return;
            }
        };
        if let Err(err) = self.storage.set(&key, value).await {
            warn!(target: "meeting_lists::filter", key = %key, error = %err, "failed persisting filters");
        }
    }
}

impl<V> Drop for FilterEngine<V> {
    fn drop(&mut self) {
        self.input_subscription.get_mut().take();
        self.repo_subscriptions.get_mut().clear();
    }
}

/// Swap in fresh options, keeping options active whose condition was active
/// before.
fn merge_options(def: &mut FilterDefinition, options: Vec<FilterEntry>) {
    let previously_active: Vec<Condition> = def
        .active_options()
        .into_iter()
        .map(|option| option.condition.clone())
        .collect();
    def.options = options;
    def.for_each_option_mut(|option| {
        option.is_active = previously_active.contains(&option.condition);
    });
    def.update_count();
}
