//! Grid state and host-facing accessors.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::column::Column;
use crate::compose::{RenderRow, compose};
use crate::config::GridConfig;
use crate::expansion::{ExpandStatus, ExpansionState};
use crate::host::{BlockFetcher, ChildFetcher, RowDecorator};
use crate::row::GridRow;
use crate::selection::{AllRecordsBanner, HeaderCheckState, SelectionState};
use crate::sort::{SortDescriptor, SortState};
use crate::window::{BlockStatus, WindowState, WindowedDataSource};

use super::events::GridEvent;

/// Snapshot of the selection for the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionSummary<K> {
    /// Explicitly selected ids (empty in all-records mode).
    pub selected_ids: Vec<K>,
    /// Ids deselected while in all-records mode.
    pub excluded_ids: Vec<K>,
    pub all_records_mode: bool,
    /// Number of selected rows.
    pub count: usize,
}

/// Internal state for the grid.
pub(super) struct GridInner<R: GridRow> {
    pub columns: Vec<Column<R>>,
    pub config: GridConfig,
    /// Rows supplied by the host (unused in windowed mode).
    pub rows: Vec<R>,
    pub sort: SortState,
    pub selection: SelectionState<R::Id>,
    pub expansion: ExpansionState<R>,
    /// Present when a block fetcher is configured.
    pub window: Option<WindowedDataSource<R>>,
    pub child_fetcher: Option<Arc<dyn ChildFetcher<R>>>,
    pub block_fetcher: Option<Arc<dyn BlockFetcher<R>>>,
    pub decorator: Option<Arc<dyn RowDecorator<R>>>,
    /// Outgoing events not yet drained by the host.
    pub events: Vec<GridEvent<R::Id>>,
}

impl<R: GridRow> GridInner<R> {
    fn new(columns: Vec<Column<R>>) -> Self {
        Self {
            columns,
            config: GridConfig::default(),
            rows: Vec::new(),
            sort: SortState::new(),
            selection: SelectionState::new(),
            expansion: ExpansionState::new(),
            window: None,
            child_fetcher: None,
            block_fetcher: None,
            decorator: None,
            events: Vec::new(),
        }
    }

    /// Tree mode: rows can be expanded.
    pub fn is_tree(&self) -> bool {
        self.child_fetcher.is_some()
    }

    /// Recreate the window for the current config and sort.
    fn rebuild_window(&mut self) {
        let mut window = WindowedDataSource::new(self.config.clone());
        window.set_sort(self.sort.current().cloned());
        self.window = Some(window);
    }

    /// Top-level rows: fetched rows in windowed mode, else the host's rows.
    pub fn base_rows(&self) -> Vec<R> {
        match &self.window {
            Some(window) => window.rows().into_iter().map(|r| r.row.clone()).collect(),
            None => self.rows.clone(),
        }
    }

    /// Ids of the displayed rows in display order.
    ///
    /// In tree mode a row reachable twice is listed once, at its first
    /// position.
    pub fn ordered_ids(&self) -> Vec<R::Id> {
        let roots = self.base_rows().into_iter().map(|row| row.id());
        if !self.is_tree() {
            return roots.collect();
        }
        let mut seen = HashSet::new();
        let mut ids = Vec::new();
        for id in roots {
            if !seen.insert(id.clone()) {
                continue;
            }
            let descendants = self.expansion.visible_descendants(&id);
            ids.push(id);
            ids.extend(
                descendants
                    .into_iter()
                    .map(|n| n.id.clone())
                    .filter(|id| seen.insert(id.clone())),
            );
        }
        ids
    }

    pub fn visible_rows(&self) -> Vec<RenderRow<R>> {
        let rows = self.base_rows();
        let tree = self.is_tree().then_some(&self.expansion);
        let mut view = compose(&rows, &self.sort, &self.selection, tree);

        if let Some(window) = &self.window {
            let statuses: HashMap<R::Id, _> = window
                .rows()
                .into_iter()
                .filter_map(|r| r.status.clone().map(|s| (r.row.id(), s)))
                .collect();
            for render in &mut view {
                render.status = statuses.get(&render.row.id()).cloned();
            }
        }
        view
    }

    /// Size of the logical dataset.
    pub fn total_rows(&self) -> usize {
        self.config
            .total_records
            .or_else(|| self.window.as_ref().map(WindowedDataSource::row_count))
            .unwrap_or_else(|| self.ordered_ids().len())
    }

    /// Queue selection events after a selection change.
    pub fn notify_selection(&mut self, was_all_records: bool) {
        let all_records = self.selection.is_all_records_mode();
        if all_records != was_all_records {
            self.events.push(GridEvent::AllRecordsModeChanged(all_records));
        }
        self.events
            .push(GridEvent::SelectionChanged(self.selection.selected_ids()));
    }
}

/// Headless data grid state.
///
/// `Grid<R>` owns everything a data grid needs to remember between
/// renders:
/// - Single-column sort (cycled by header clicks)
/// - Id-based row selection with shift ranges and all-records mode
/// - Expandable tree rows with lazily fetched children
/// - Windowed block fetching for large datasets
///
/// The handle is cheap to clone and shares its state, so a render loop can
/// keep reading while another task awaits a fetch. The lock is never held
/// across an `.await`.
pub struct Grid<R: GridRow> {
    pub(super) inner: Arc<RwLock<GridInner<R>>>,
    /// Dirty flag for re-render.
    pub(super) dirty: Arc<AtomicBool>,
}

impl<R: GridRow> Clone for Grid<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            dirty: Arc::clone(&self.dirty),
        }
    }
}

impl<R: GridRow> Grid<R> {
    /// Create a new grid with column definitions.
    pub fn new(columns: Vec<Column<R>>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(GridInner::new(columns))),
            dirty: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Set the initial rows.
    pub fn with_rows(self, rows: Vec<R>) -> Self {
        self.set_rows(rows);
        self.dirty.store(false, Ordering::SeqCst);
        self
    }

    /// Set the configuration.
    pub fn with_config(self, config: GridConfig) -> Self {
        if let Ok(mut guard) = self.inner.write() {
            guard.config = config;
            if guard.window.is_some() {
                guard.rebuild_window();
            }
        }
        self
    }

    /// Enable tree mode with a child fetcher. Disables sorting.
    pub fn with_child_fetcher(self, fetcher: impl ChildFetcher<R> + 'static) -> Self {
        if let Ok(mut guard) = self.inner.write() {
            guard.child_fetcher = Some(Arc::new(fetcher));
        }
        self
    }

    /// Enable windowed mode with a block fetcher.
    pub fn with_block_fetcher(self, fetcher: impl BlockFetcher<R> + 'static) -> Self {
        if let Ok(mut guard) = self.inner.write() {
            guard.block_fetcher = Some(Arc::new(fetcher));
            guard.rebuild_window();
        }
        self
    }

    /// Set the row decorator for fetched blocks.
    pub fn with_row_decorator(self, decorator: impl RowDecorator<R> + 'static) -> Self {
        if let Ok(mut guard) = self.inner.write() {
            guard.decorator = Some(Arc::new(decorator));
        }
        self
    }

    /// Set the initial sort.
    pub fn with_sort(self, sort: Option<SortDescriptor>) -> Self {
        if let Ok(mut guard) = self.inner.write() {
            guard.sort.set(sort.clone());
            if let Some(window) = guard.window.as_mut() {
                window.set_sort(sort);
            }
        }
        self
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Get the column definitions.
    pub fn columns(&self) -> Vec<Column<R>> {
        self.inner
            .read()
            .map(|g| g.columns.clone())
            .unwrap_or_default()
    }

    /// Get the configuration.
    pub fn config(&self) -> GridConfig {
        self.inner
            .read()
            .map(|g| g.config.clone())
            .unwrap_or_default()
    }

    /// Rows to render, in display order.
    pub fn visible_rows(&self) -> Vec<RenderRow<R>> {
        self.inner
            .read()
            .map(|g| g.visible_rows())
            .unwrap_or_default()
    }

    /// Get the active sort.
    pub fn sort_descriptor(&self) -> Option<SortDescriptor> {
        self.inner
            .read()
            .ok()
            .and_then(|g| g.sort.current().cloned())
    }

    /// Check if a row is selected.
    pub fn is_selected(&self, id: &R::Id) -> bool {
        self.inner
            .read()
            .map(|g| g.selection.is_selected(id))
            .unwrap_or(false)
    }

    pub fn selection_summary(&self) -> SelectionSummary<R::Id> {
        self.inner
            .read()
            .map(|g| SelectionSummary {
                selected_ids: g.selection.selected_ids(),
                excluded_ids: g.selection.excluded_ids(),
                all_records_mode: g.selection.is_all_records_mode(),
                count: g.selection.count(g.total_rows()),
            })
            .unwrap_or_else(|_| SelectionSummary {
                selected_ids: Vec::new(),
                excluded_ids: Vec::new(),
                all_records_mode: false,
                count: 0,
            })
    }

    /// Value of the header checkbox.
    pub fn header_checkbox_state(&self) -> HeaderCheckState {
        self.inner
            .read()
            .map(|g| g.selection.header_state(&g.ordered_ids()))
            .unwrap_or(HeaderCheckState::Unchecked)
    }

    /// The "select all records" banner, if one should show.
    pub fn all_records_banner(&self) -> Option<AllRecordsBanner> {
        self.inner.read().ok().and_then(|g| {
            g.selection
                .all_records_banner(&g.ordered_ids(), g.total_rows())
        })
    }

    /// Expand icon of a row.
    pub fn expand_status(&self, id: &R::Id) -> ExpandStatus {
        self.inner
            .read()
            .map(|g| g.expansion.expandable_status_for(id))
            .unwrap_or_default()
    }

    /// Viewport range and known extent (windowed mode only).
    pub fn window_state(&self) -> Option<WindowState> {
        self.inner
            .read()
            .ok()
            .and_then(|g| g.window.as_ref().map(WindowedDataSource::window_state))
    }

    /// Status of the block starting at `start_row` (windowed mode only).
    pub fn block_state(&self, start_row: usize) -> Option<BlockStatus> {
        self.inner.read().ok().and_then(|g| {
            g.window
                .as_ref()
                .and_then(|w| w.block_state(start_row).map(|s| s.status()))
        })
    }

    /// Row to scroll back to after the first load (windowed mode only).
    pub fn take_restore_position(&self) -> Option<usize> {
        self.inner
            .write()
            .ok()
            .and_then(|mut g| g.window.as_mut().and_then(|w| w.take_restore_position()))
    }

    /// Check and clear the dirty flag.
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::SeqCst)
    }

    /// Take the outgoing events queued since the last call.
    pub fn drain_events(&self) -> Vec<GridEvent<R::Id>> {
        self.inner
            .write()
            .map(|mut g| std::mem::take(&mut g.events))
            .unwrap_or_default()
    }

    // -------------------------------------------------------------------------
    // Host imperatives
    // -------------------------------------------------------------------------

    /// Replace the host-supplied rows.
    ///
    /// Selection is kept (it is id-based). Cached children and expand state
    /// are dropped.
    pub fn set_rows(&self, rows: Vec<R>) {
        if let Ok(mut guard) = self.inner.write() {
            guard.expansion.reset(rows.clone());
            guard.rows = rows;
            self.dirty.store(true, Ordering::SeqCst);
        }
    }

    /// Replace the selection with exactly `ids`.
    pub fn set_selected_rows(&self, ids: Vec<R::Id>) {
        if let Ok(mut guard) = self.inner.write() {
            let was_all = guard.selection.is_all_records_mode();
            guard.selection.set_selected(ids);
            guard.notify_selection(was_all);
            self.dirty.store(true, Ordering::SeqCst);
        }
    }

    /// Clear the selection.
    pub fn unselect_all(&self) {
        if let Ok(mut guard) = self.inner.write() {
            let was_all = guard.selection.is_all_records_mode();
            guard.selection.clear();
            guard.notify_selection(was_all);
            self.dirty.store(true, Ordering::SeqCst);
        }
    }

    /// Select every record of the dataset, fetched or not.
    pub fn enter_all_records_mode(&self) {
        if let Ok(mut guard) = self.inner.write() {
            let was_all = guard.selection.is_all_records_mode();
            guard.selection.enter_all_records_mode();
            guard.notify_selection(was_all);
            self.dirty.store(true, Ordering::SeqCst);
        }
    }

    /// Leave all-records mode with nothing selected.
    pub fn exit_all_records_mode(&self) {
        if let Ok(mut guard) = self.inner.write() {
            let was_all = guard.selection.is_all_records_mode();
            guard.selection.exit_all_records_mode();
            guard.notify_selection(was_all);
            self.dirty.store(true, Ordering::SeqCst);
        }
    }
}

impl<R: GridRow> std::fmt::Debug for Grid<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Ok(guard) = self.inner.read() else {
            return f.debug_struct("Grid").finish_non_exhaustive();
        };
        f.debug_struct("Grid")
            .field("columns", &guard.columns.len())
            .field("rows", &guard.base_rows().len())
            .field("sort", &guard.sort.current())
            .field("all_records", &guard.selection.is_all_records_mode())
            .field("windowed", &guard.window.is_some())
            .finish()
    }
}
