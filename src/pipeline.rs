//! Composes the sort, filter and search stages over one raw row stream.
//!
//! ```text
//! raw ──► sort ──► filter ──► search ──► terminal
//! ```
//!
//! Missing stages are skipped. [`ListPipeline::start`] restores persisted
//! sort and filter state first and only then wires the stages, so the first
//! terminal emission already reflects the restored filters.

use crate::filter::FilterEngine;
use crate::record::Record;
use crate::relay::{Relay, Subscription};
use crate::search::SearchEngine;
use crate::sort::SortEngine;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

pub struct ListPipeline<V>
where
    V: Record + Clone + Send + Sync + 'static,
{
    source: Relay<Vec<V>>,
    sort: Option<Arc<SortEngine<V>>>,
    filter: Option<Arc<FilterEngine<V>>>,
    search: Option<Arc<SearchEngine<V>>>,
    terminal: Relay<Vec<V>>,
    terminal_link: Mutex<Option<Subscription>>,
    started: AtomicBool,
}

impl<V> ListPipeline<V>
where
    V: Record + Clone + Send + Sync + 'static,
{
    pub fn new(source: Relay<Vec<V>>) -> Self {
        Self {
            source,
            sort: None,
            filter: None,
            search: None,
            terminal: Relay::new(),
            terminal_link: Mutex::new(None),
            started: AtomicBool::new(false),
        }
    }

    pub fn with_sort(mut self, sort: Arc<SortEngine<V>>) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_filter(mut self, filter: Arc<FilterEngine<V>>) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_search(mut self, search: Arc<SearchEngine<V>>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn sort(&self) -> Option<&Arc<SortEngine<V>>> {
        self.sort.as_ref()
    }

    pub fn filter(&self) -> Option<&Arc<FilterEngine<V>>> {
        self.filter.as_ref()
    }

    pub fn search(&self) -> Option<&Arc<SearchEngine<V>>> {
        self.search.as_ref()
    }

    /// The displayed rows: output of the last present stage.
    pub fn output(&self) -> &Relay<Vec<V>> {
        &self.terminal
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Restore persisted state, then wire raw → sort → filter → search.
    /// Calling `start` on a running pipeline rewires it from scratch.
    pub async fn start(&self) {
        if self.started.swap(false, Ordering::SeqCst) {
            self.unwire(false);
        }
        if let Some(sort) = &self.sort {
            sort.restore().await;
        }
        if let Some(filter) = &self.filter {
            filter.restore_or_initialize().await;
        }

        let mut upstream = self.source.clone();
        if let Some(sort) = &self.sort {
            sort.connect(&upstream);
            upstream = sort.output().clone();
        }
        if let Some(filter) = &self.filter {
            filter.connect(&upstream);
            upstream = filter.output().clone();
        }
        if let Some(search) = &self.search {
            search.connect(&upstream);
            upstream = search.output().clone();
        }

        let terminal = self.terminal.clone();
        let link = upstream.subscribe(move |rows: &Vec<V>| terminal.publish(rows.clone()));
        *self.terminal_link.lock() = Some(link);
        self.started.store(true, Ordering::SeqCst);
        debug!(
            target: "meeting_lists::pipeline",
            sort = self.sort.is_some(),
            filter = self.filter.is_some(),
            search = self.search.is_some(),
            "pipeline wired"
        );
    }

    /// Tear the stages down in wiring order (sort, filter, search), each one
    /// releasing its upstream subscription. Repo-backed filter options are
    /// released even when the pipeline never started. Idempotent.
    pub fn dispose(&self) {
        if !self.started.swap(false, Ordering::SeqCst) {
            if let Some(filter) = &self.filter {
                filter.disconnect();
            }
            return;
        }
        self.unwire(true);
        debug!(target: "meeting_lists::pipeline", "pipeline disposed");
    }

    fn unwire(&self, release_option_sources: bool) {
        if let Some(sort) = &self.sort {
            sort.disconnect();
        }
        if let Some(filter) = &self.filter {
            if release_option_sources {
                filter.disconnect();
            } else {
                filter.disconnect_input();
            }
        }
        if let Some(search) = &self.search {
            search.disconnect();
        }
        drop(self.terminal_link.lock().take());
    }
}

impl<V> Drop for ListPipeline<V>
where
    V: Record + Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.dispose();
    }
}
