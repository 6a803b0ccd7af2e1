//! Row selection on a [`RowReconciler`]: single toggles, range selection in
//! display order, and select/deselect all.

use super::{RowReconciler, SelectionChange};
use crate::record::{Record, RowId};
use tracing::debug;

/// Ids between `anchor` and `target` (both inclusive) in `display` order.
/// Empty when either id is not displayed.
pub fn range_between(display: &[RowId], anchor: RowId, target: RowId) -> Vec<RowId> {
    let Some(from) = display.iter().position(|id| *id == anchor) else {
        return Vec::new();
    };
    let Some(to) = display.iter().position(|id| *id == target) else {
        return Vec::new();
    };
    let (start, end) = if from <= to { (from, to) } else { (to, from) };
    display[start..=end].to_vec()
}

impl<V> RowReconciler<V>
where
    V: Record + Clone + Send + Sync + 'static,
{
    /// Flip the selection of one row.
    pub fn toggle(&self, id: RowId) {
        let change = {
            let mut state = self.state.lock();
            let Some(entry) = state.rows.get_mut(&id) else {
                debug!(target: "meeting_lists::table", id, "toggle ignored: row not rendered");
                return;
            };
            entry.is_selected = !entry.is_selected;
            let affected = vec![entry.row.clone()];
            state.change(affected)
        };
        self.selection.publish(change);
    }

    /// Set the selection of one row. No notification when nothing changes.
    pub fn set_selected(&self, id: RowId, selected: bool) {
        if self.is_selected(id).is_some_and(|current| current != selected) {
            self.toggle(id);
        }
    }

    /// Checkbox click. A plain click toggles `id` and makes it the range
    /// anchor. A click with the range modifier held selects every row
    /// between the anchor and `id` in display order and clears the anchor;
    /// without an anchor it behaves like a plain click.
    pub fn click(&self, id: RowId, range_modifier: bool) {
        let change = {
            let mut state = self.state.lock();
            if !state.rows.contains_key(&id) {
                debug!(target: "meeting_lists::table", id, "click ignored: row not rendered");
                return;
            }
            match state.anchor.filter(|_| range_modifier) {
                Some(anchor) => {
                    let range = range_between(&state.display, anchor, id);
                    let mut affected = Vec::with_capacity(range.len());
                    for row_id in range {
                        if let Some(entry) = state.rows.get_mut(&row_id) {
                            entry.is_selected = true;
                            affected.push(entry.row.clone());
                        }
                    }
                    state.anchor = None;
                    state.change(affected)
                }
                None => {
                    let Some(entry) = state.rows.get_mut(&id) else {
                        return;
                    };
                    entry.is_selected = !entry.is_selected;
                    let affected = vec![entry.row.clone()];
                    state.anchor = Some(id);
                    state.change(affected)
                }
            }
        };
        self.selection.publish(change);
    }

    pub fn anchor(&self) -> Option<RowId> {
        self.state.lock().anchor
    }

    pub fn select_all(&self) {
        self.set_all(true);
    }

    pub fn deselect_all(&self) {
        self.set_all(false);
    }

    fn set_all(&self, selected: bool) {
        let change: SelectionChange<V> = {
            let mut state = self.state.lock();
            for entry in state.rows.values_mut() {
                entry.is_selected = selected;
            }
            state.anchor = None;
            let all = state.rows_in_display_order();
            state.change(all)
        };
        debug!(
            target: "meeting_lists::table",
            selected = change.selected,
            "selection set on all rows"
        );
        self.selection.publish(change);
    }

    /// Selected rows in display order.
    pub fn selected_rows(&self) -> Vec<V> {
        self.state.lock().selected_in_display_order()
    }

    pub fn selected_count(&self) -> usize {
        self.state
            .lock()
            .rows
            .values()
            .filter(|entry| entry.is_selected)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn table(ids: &[i64]) -> RowReconciler<Value> {
        let table = RowReconciler::new();
        table.build_data_table(ids.iter().map(|id| json!({"id": id})).collect());
        table
    }

    fn selected_ids(table: &RowReconciler<Value>) -> Vec<i64> {
        table.selected_rows().iter().map(Record::id).collect()
    }

    #[test]
    fn range_between_follows_display_order() {
        let display = [30, 10, 20, 40];
        assert_eq!(range_between(&display, 10, 40), vec![10, 20, 40]);
        assert_eq!(range_between(&display, 40, 30), vec![30, 10, 20, 40]);
        assert_eq!(range_between(&display, 20, 20), vec![20]);
        assert!(range_between(&display, 99, 20).is_empty());
    }

    #[test]
    fn toggle_reports_the_single_row_and_total() {
        let table = table(&[1, 2, 3]);
        table.toggle(2);
        let change = table.selection().latest().unwrap();
        assert_eq!(change.affected_rows, vec![json!({"id": 2})]);
        assert_eq!(change.selected, 1);

        table.toggle(2);
        assert_eq!(table.selected_count(), 0);
    }

    #[test]
    fn range_click_uses_display_order_and_resets_anchor() {
        let table = table(&[3, 1, 4, 2]);
        table.click(1, false);
        assert_eq!(table.anchor(), Some(1));

        table.click(2, true);
        assert_eq!(selected_ids(&table), vec![1, 4, 2]);
        assert_eq!(table.anchor(), None);

        // No anchor any more: a modifier click is a plain toggle.
        table.click(3, true);
        assert_eq!(selected_ids(&table), vec![3, 1, 4, 2]);
        assert_eq!(table.anchor(), Some(3));
    }

    #[test]
    fn select_all_and_deselect_all_emit_once() {
        let table = table(&[1, 2, 3]);
        let seen = std::sync::Arc::new(parking_lot::Mutex::new(0));
        let counter = seen.clone();
        let _sub = table.selection().subscribe(move |_| *counter.lock() += 1);

        table.select_all();
        assert_eq!(*seen.lock(), 1);
        assert_eq!(table.selected_count(), 3);

        table.deselect_all();
        assert_eq!(*seen.lock(), 2);
        assert_eq!(table.selection().latest().unwrap().selected, 0);
    }

    #[test]
    fn unknown_ids_are_ignored() {
        let table = table(&[1]);
        table.toggle(9);
        table.click(9, true);
        table.set_selected(9, true);
        assert!(table.selection().latest().is_none());
        assert_eq!(table.anchor(), None);
    }
}
