//! Process-wide pointer to the currently mounted list table.
//!
//! Keyboard shortcuts such as "select all" act on whichever table is mounted.
//! Tables register through [`mount`]; the returned [`MountGuard`] clears the
//! slot again on drop, unless another table has mounted in the meantime.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;

/// Something that can apply a bulk selection.
pub trait SelectAllTarget: Send + Sync {
    fn select_all(&self);
    fn deselect_all(&self);
}

struct ActiveTable {
    token: u64,
    target: Weak<dyn SelectAllTarget>,
}

static ACTIVE_TABLE: Lazy<Mutex<Option<ActiveTable>>> = Lazy::new(|| Mutex::new(None));
static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Registration handle of a mounted table.
#[must_use = "dropping the guard unmounts the table"]
#[derive(Debug)]
pub struct MountGuard {
    token: u64,
}

impl MountGuard {
    /// Whether this guard still owns the active slot.
    pub fn is_active(&self) -> bool {
        ACTIVE_TABLE
            .lock()
            .as_ref()
            .is_some_and(|active| active.token == self.token)
    }
}

impl Drop for MountGuard {
    fn drop(&mut self) {
        let mut slot = ACTIVE_TABLE.lock();
        if slot.as_ref().is_some_and(|active| active.token == self.token) {
            *slot = None;
            debug!(target: "meeting_lists::table", token = self.token, "table unmounted");
        }
    }
}

/// Make `target` the active table, replacing any previous one.
pub fn mount(target: &Arc<dyn SelectAllTarget>) -> MountGuard {
    let token = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
    *ACTIVE_TABLE.lock() = Some(ActiveTable {
        token,
        target: Arc::downgrade(target),
    });
    MountGuard { token }
}

fn active_target() -> Option<Arc<dyn SelectAllTarget>> {
    ACTIVE_TABLE
        .lock()
        .as_ref()
        .and_then(|active| active.target.upgrade())
}

pub fn has_active_table() -> bool {
    active_target().is_some()
}

/// Select every row of the mounted table. Returns `false` when none is mounted.
pub fn select_all_in_active_table() -> bool {
    match active_target() {
        Some(target) => {
            target.select_all();
            true
        }
        None => false,
    }
}

/// Deselect every row of the mounted table. Returns `false` when none is mounted.
pub fn deselect_all_in_active_table() -> bool {
    match active_target() {
        Some(target) => {
            target.deselect_all();
            true
        }
        None => false,
    }
}
