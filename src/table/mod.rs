//! Incremental row reconciler backing a rendered list table.
//!
//! The reconciler keeps one [`TableRow`] per row id. Every new emission of the
//! terminal row stream is merged with a two-pointer walk over both id-sorted
//! sequences, so rows that are merely re-emitted with changed fields keep
//! their selection.

pub mod registry;
pub mod selection;

pub use registry::{
    MountGuard, SelectAllTarget, deselect_all_in_active_table, has_active_table,
    select_all_in_active_table,
};
pub use selection::range_between;

use crate::record::{Record, RowId};
use crate::relay::{Relay, Subscription};
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use tracing::{debug, trace};

/// One rendered row with its selection flag.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow<V> {
    /// Position in the current display order.
    pub index: usize,
    pub is_selected: bool,
    pub row: V,
}

/// Emitted whenever the selection (or the set it is counted over) changes.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionChange<V> {
    pub affected_rows: Vec<V>,
    /// Total number of selected rows after the change.
    pub selected: usize,
    pub selected_rows: Vec<V>,
}

/// What one [`RowReconciler::build_data_table`] pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub inserted: usize,
    pub updated: usize,
    pub removed: usize,
}

struct Upsert<V> {
    id: RowId,
    is_selected: bool,
    row: V,
}

struct TableState<V> {
    rows: FxHashMap<RowId, TableRow<V>>,
    /// Row ids in display order.
    display: Vec<RowId>,
    /// First row of a pending range selection.
    anchor: Option<RowId>,
}

impl<V: Clone> TableState<V> {
    fn rows_in_display_order(&self) -> Vec<V> {
        self.display
            .iter()
            .filter_map(|id| self.rows.get(id))
            .map(|entry| entry.row.clone())
            .collect()
    }

    fn selected_in_display_order(&self) -> Vec<V> {
        self.display
            .iter()
            .filter_map(|id| self.rows.get(id))
            .filter(|entry| entry.is_selected)
            .map(|entry| entry.row.clone())
            .collect()
    }

    fn change(&self, affected_rows: Vec<V>) -> SelectionChange<V> {
        let selected_rows = self.selected_in_display_order();
        SelectionChange {
            affected_rows,
            selected: selected_rows.len(),
            selected_rows,
        }
    }
}

pub struct RowReconciler<V> {
    state: Mutex<TableState<V>>,
    rendered: Relay<Vec<V>>,
    selection: Relay<SelectionChange<V>>,
    input_subscription: Mutex<Option<Subscription>>,
}

impl<V> Default for RowReconciler<V>
where
    V: Record + Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> RowReconciler<V>
where
    V: Record + Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TableState {
                rows: FxHashMap::default(),
                display: Vec::new(),
                anchor: None,
            }),
            rendered: Relay::new(),
            selection: Relay::new(),
            input_subscription: Mutex::new(None),
        }
    }

    /// Rows handed to the renderer, in display order.
    pub fn rendered(&self) -> &Relay<Vec<V>> {
        &self.rendered
    }

    pub fn selection(&self) -> &Relay<SelectionChange<V>> {
        &self.selection
    }

    pub fn len(&self) -> usize {
        self.state.lock().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: RowId) -> bool {
        self.state.lock().rows.contains_key(&id)
    }

    /// Selection flag of `id`, `None` for ids that are not rendered.
    pub fn is_selected(&self, id: RowId) -> Option<bool> {
        self.state.lock().rows.get(&id).map(|entry| entry.is_selected)
    }

    /// Snapshot of every table row in display order.
    pub fn table_rows(&self) -> Vec<TableRow<V>> {
        let state = self.state.lock();
        state
            .display
            .iter()
            .filter_map(|id| state.rows.get(id).cloned())
            .collect()
    }

    pub fn display_ids(&self) -> Vec<RowId> {
        self.state.lock().display.clone()
    }

    /// Merge `next_rows` into the table, keeping the selection of every
    /// surviving id.
    pub fn build_data_table(&self, next_rows: Vec<V>) -> ReconcileReport {
        let (report, change) = {
            let mut state = self.state.lock();

            let mut incoming: Vec<&V> = next_rows.iter().collect();
            incoming.sort_by_key(|row| row.id());

            let mut known: Vec<RowId> = state.rows.keys().copied().collect();
            known.sort_unstable();

            let mut upserts: Vec<Upsert<V>> = Vec::with_capacity(incoming.len());
            let mut deletions: Vec<RowId> = Vec::new();
            let mut report = ReconcileReport::default();
            let mut j = 0;

            for &row in &incoming {
                let id = row.id();
                while j < known.len() && known[j] < id {
                    deletions.push(known[j]);
                    j += 1;
                }
                let is_selected = if let Some(previous) = upserts.last().filter(|u| u.id == id) {
                    // Repeated id inside one emission; the last occurrence wins.
                    previous.is_selected
                } else if j < known.len() && known[j] == id {
                    j += 1;
                    report.updated += 1;
                    state.rows.get(&id).is_some_and(|entry| entry.is_selected)
                } else {
                    report.inserted += 1;
                    false
                };
                upserts.push(Upsert {
                    id,
                    is_selected,
                    row: row.clone(),
                });
            }
            deletions.extend_from_slice(&known[j..]);
            report.removed = deletions.len();

            for upsert in upserts {
                state.rows.insert(
                    upsert.id,
                    TableRow {
                        index: 0,
                        is_selected: upsert.is_selected,
                        row: upsert.row,
                    },
                );
            }
            for id in &deletions {
                state.rows.remove(id);
            }
            if state.anchor.is_some_and(|anchor| deletions.contains(&anchor)) {
                state.anchor = None;
            }

            let mut seen = FxHashSet::default();
            let display: Vec<RowId> = next_rows
                .iter()
                .map(Record::id)
                .filter(|id| seen.insert(*id))
                .collect();
            for (index, id) in display.iter().enumerate() {
                if let Some(entry) = state.rows.get_mut(id) {
                    entry.index = index;
                }
            }
            state.display = display;

            let change = (!deletions.is_empty()).then(|| {
                let all = state.rows_in_display_order();
                state.change(all)
            });
            (report, change)
        };

        trace!(
            target: "meeting_lists::table",
            inserted = report.inserted,
            updated = report.updated,
            removed = report.removed,
            "table reconciled"
        );
        if let Some(change) = change {
            self.selection.publish(change);
        }
        self.rendered.publish(next_rows);
        report
    }

    /// Follow `source`, reconciling on every emission.
    pub fn connect(self: &Arc<Self>, source: &Relay<Vec<V>>) {
        drop(self.input_subscription.lock().take());
        let weak = Arc::downgrade(self);
        let subscription = source.subscribe(move |rows: &Vec<V>| {
            if let Some(table) = weak.upgrade() {
                table.build_data_table(rows.clone());
            }
        });
        *self.input_subscription.lock() = Some(subscription);
    }

    pub fn disconnect(&self) {
        drop(self.input_subscription.lock().take());
    }

    pub fn is_connected(&self) -> bool {
        self.input_subscription.lock().is_some()
    }

    /// Register as the process-wide active table until the guard drops.
    pub fn mount(self: &Arc<Self>) -> MountGuard {
        debug!(target: "meeting_lists::table", rows = self.len(), "table mounted");
        let target: Arc<dyn SelectAllTarget> = self.clone();
        registry::mount(&target)
    }
}

impl<V> SelectAllTarget for RowReconciler<V>
where
    V: Record + Clone + Send + Sync + 'static,
{
    fn select_all(&self) {
        RowReconciler::select_all(self);
    }

    fn deselect_all(&self) {
        RowReconciler::deselect_all(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn rows(ids: &[i64]) -> Vec<Value> {
        ids.iter().map(|id| json!({"id": id})).collect()
    }

    fn collect_changes(table: &RowReconciler<Value>) -> (Arc<Mutex<Vec<SelectionChange<Value>>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sub = table
            .selection()
            .subscribe(move |change: &SelectionChange<Value>| sink.lock().push(change.clone()));
        (seen, sub)
    }

    #[test]
    fn first_emission_inserts_everything_unselected() {
        let table = RowReconciler::new();
        let report = table.build_data_table(rows(&[3, 1, 2]));
        assert_eq!(
            report,
            ReconcileReport {
                inserted: 3,
                updated: 0,
                removed: 0
            }
        );
        assert_eq!(table.display_ids(), vec![3, 1, 2]);
        assert_eq!(table.table_rows()[0].index, 0);
        assert_eq!(table.is_selected(1), Some(false));
    }

    #[test]
    fn survivors_keep_selection_and_removed_rows_notify() {
        let table = RowReconciler::new();
        table.build_data_table(rows(&[1, 2, 3]));
        table.toggle(1);
        table.toggle(2);
        let (changes, _sub) = collect_changes(&table);
        changes.lock().clear();

        let report = table.build_data_table(rows(&[2, 3, 4]));
        assert_eq!(report.inserted, 1);
        assert_eq!(report.updated, 2);
        assert_eq!(report.removed, 1);
        assert!(!table.contains(1));
        assert_eq!(table.is_selected(2), Some(true));
        assert_eq!(table.is_selected(3), Some(false));
        assert_eq!(table.is_selected(4), Some(false));

        let changes = changes.lock();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].selected, 1);
        assert_eq!(changes[0].affected_rows.len(), 3);
    }

    #[test]
    fn updated_payload_replaces_row() {
        let table = RowReconciler::new();
        table.build_data_table(vec![json!({"id": 1, "name": "old"})]);
        table.toggle(1);
        table.build_data_table(vec![json!({"id": 1, "name": "new"})]);

        let rows = table.table_rows();
        assert!(rows[0].is_selected);
        assert_eq!(rows[0].row["name"], "new");
    }

    #[test]
    fn no_deletion_means_no_selection_notification() {
        let table = RowReconciler::new();
        table.build_data_table(rows(&[1]));
        let (changes, _sub) = collect_changes(&table);
        table.build_data_table(rows(&[1, 2]));
        assert!(changes.lock().is_empty());
        assert_eq!(table.rendered().latest().map(|r| r.len()), Some(2));
    }

    #[test]
    fn duplicate_ids_collapse_to_one_entry() {
        let table = RowReconciler::new();
        let report = table.build_data_table(vec![
            json!({"id": 5, "v": 1}),
            json!({"id": 5, "v": 2}),
        ]);
        assert_eq!(report.inserted, 1);
        assert_eq!(table.len(), 1);
        assert_eq!(table.display_ids(), vec![5]);
        assert_eq!(table.table_rows()[0].row["v"], 2);
    }

    #[test]
    fn connect_follows_source() {
        let source = Relay::with_value(rows(&[1, 2]));
        let table = Arc::new(RowReconciler::new());
        table.connect(&source);
        assert_eq!(table.len(), 2);

        source.publish(rows(&[2]));
        assert_eq!(table.display_ids(), vec![2]);

        table.disconnect();
        source.publish(rows(&[7, 8, 9]));
        assert_eq!(table.len(), 1);
    }
}
