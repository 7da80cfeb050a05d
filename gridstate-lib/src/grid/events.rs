//! Event handling for the grid.

use std::sync::atomic::Ordering;

use crate::expansion::{ExpandStatus, ToggleAction};
use crate::host::with_timeout;
use crate::row::GridRow;
use crate::sort::SortDescriptor;
use crate::window::{BlockOutcome, BlockRequest, BlockState, RequestOutcome, ViewportMetrics, fetch_decorated};

use super::state::Grid;

/// Result of handling a user event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventResult {
    /// Event was ignored (unknown target, read-only grid, disabled feature).
    Ignored,
    /// Event changed grid state.
    Consumed,
}

impl EventResult {
    /// Check if the event was handled.
    pub fn is_handled(&self) -> bool {
        matches!(self, EventResult::Consumed)
    }
}

/// Notification for the host, drained with [`Grid::drain_events`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridEvent<K> {
    /// The explicit selection changed; carries the selected ids.
    SelectionChanged(Vec<K>),
    /// All-records mode was entered (`true`) or left (`false`).
    AllRecordsModeChanged(bool),
    /// The sort changed.
    SortChanged(Option<SortDescriptor>),
    /// A row was double-clicked.
    RowActivated(K),
    /// A block fetch failed; the range may be requested again.
    BlockFailed { start_row: usize, end_row: usize },
}

impl<R: GridRow> Grid<R> {
    /// Handle a header click: cycle the sort of a sortable column.
    ///
    /// Sorting is disabled in tree mode. In windowed mode the loaded
    /// blocks are purged and the viewport is fetched again in the new order.
    pub async fn on_header_click(&self, column_id: &str) -> EventResult {
        let reload = {
            let Ok(mut guard) = self.inner.write() else {
                return EventResult::Ignored;
            };
            let sortable = guard
                .columns
                .iter()
                .any(|c| c.key == column_id && c.sortable);
            if !sortable || guard.is_tree() {
                return EventResult::Ignored;
            }

            let sort = guard.sort.activate(column_id).cloned();
            guard.events.push(GridEvent::SortChanged(sort.clone()));
            self.dirty.store(true, Ordering::SeqCst);

            guard.window.as_mut().and_then(|window| {
                window.set_sort(sort);
                let state = window.window_state();
                window.ensure_visible(state.start_row, state.end_row)
            })
        };

        if let Some(request) = reload {
            self.load_block(request).await;
        }
        EventResult::Consumed
    }

    /// Handle a row checkbox click.
    ///
    /// A shift-click applies the checked state of the last plain click to
    /// the range between that row and this one, the anchor row itself
    /// included. Without an anchor it behaves like a plain click.
    pub fn on_row_checkbox_toggle(&self, id: R::Id, shift_key: bool, checked: bool) -> EventResult {
        let Ok(mut guard) = self.inner.write() else {
            return EventResult::Ignored;
        };
        if guard.config.readonly {
            return EventResult::Ignored;
        }

        let was_all = guard.selection.is_all_records_mode();
        let ranged = shift_key && {
            let ordered = guard.ordered_ids();
            guard.selection.shift_click(&ordered, &id)
        };
        if !ranged {
            guard.selection.set_checked(id, checked);
        }
        guard.notify_selection(was_all);
        self.dirty.store(true, Ordering::SeqCst);
        EventResult::Consumed
    }

    /// Handle a header checkbox click.
    ///
    /// From an empty selection, selects every displayed row. Otherwise
    /// (including all-records mode) clears the selection.
    pub fn on_header_checkbox_toggle(&self) -> EventResult {
        let Ok(mut guard) = self.inner.write() else {
            return EventResult::Ignored;
        };
        if guard.config.readonly {
            return EventResult::Ignored;
        }

        let was_all = guard.selection.is_all_records_mode();
        let ordered = guard.ordered_ids();
        guard.selection.toggle_all_visible(&ordered);
        guard.notify_selection(was_all);
        self.dirty.store(true, Ordering::SeqCst);
        EventResult::Consumed
    }

    /// Handle an expand icon click. Returns the row's new expand status.
    ///
    /// Children are fetched on first expansion only; the row shows
    /// [`ExpandStatus::Loading`] meanwhile and further clicks are ignored.
    pub async fn on_expand_icon_click(&self, id: &R::Id) -> ExpandStatus {
        let (ticket, parent, fetcher, timeout) = {
            let Ok(mut guard) = self.inner.write() else {
                return ExpandStatus::None;
            };
            let Some(fetcher) = guard.child_fetcher.clone() else {
                return ExpandStatus::None;
            };
            match guard.expansion.begin_toggle(id) {
                ToggleAction::Fetch { ticket, parent } => {
                    (ticket, parent, fetcher, guard.config.fetch_timeout)
                }
                ToggleAction::Ignored => return guard.expansion.expandable_status_for(id),
                ToggleAction::Collapsed | ToggleAction::Expanded => {
                    self.dirty.store(true, Ordering::SeqCst);
                    return guard.expansion.expandable_status_for(id);
                }
            }
        };
        self.dirty.store(true, Ordering::SeqCst);

        let result = with_timeout(timeout, fetcher.fetch_children(&parent)).await;

        let Ok(mut guard) = self.inner.write() else {
            return ExpandStatus::None;
        };
        let status = guard.expansion.finish_fetch(ticket, result);
        self.dirty.store(true, Ordering::SeqCst);
        status
    }

    /// Handle a row double-click.
    pub fn on_row_double_click(&self, id: R::Id) -> EventResult {
        let Ok(mut guard) = self.inner.write() else {
            return EventResult::Ignored;
        };
        guard.events.push(GridEvent::RowActivated(id));
        EventResult::Consumed
    }

    /// Handle a scroll position change: fetch the next block when the
    /// viewport is near the bottom (windowed mode only).
    pub async fn on_scroll_near_bottom(&self, metrics: ViewportMetrics) -> EventResult {
        let request = self.inner.read().ok().and_then(|g| {
            g.window
                .as_ref()
                .and_then(|w| w.on_scroll_near_bottom(metrics))
        });
        match request {
            Some(request) => {
                self.load_block(request).await;
                EventResult::Consumed
            }
            None => EventResult::Ignored,
        }
    }

    /// Handle a change of the visible row range: fetch missing blocks
    /// around it (windowed mode only).
    pub async fn on_viewport_change(&self, first_row: usize, last_row: usize) -> EventResult {
        let request = self.inner.write().ok().and_then(|mut g| {
            g.window
                .as_mut()
                .and_then(|w| w.ensure_visible(first_row, last_row))
        });
        match request {
            Some(request) => {
                self.load_block(request).await;
                EventResult::Consumed
            }
            None => EventResult::Ignored,
        }
    }

    /// Clear the selection and reload.
    ///
    /// Windowed grids drop every block and fetch the viewport again; tree
    /// grids drop cached children.
    pub async fn refresh(&self) {
        let reload = {
            let Ok(mut guard) = self.inner.write() else {
                return;
            };
            let inner = &mut *guard;
            let was_all = inner.selection.is_all_records_mode();
            inner.selection.clear();
            inner.notify_selection(was_all);
            inner.expansion.reset(inner.rows.clone());
            self.dirty.store(true, Ordering::SeqCst);

            inner.window.as_mut().and_then(|window| {
                window.purge();
                let state = window.window_state();
                window.ensure_visible(state.start_row, state.end_row)
            })
        };

        if let Some(request) = reload {
            self.load_block(request).await;
        }
    }

    /// Fetch a block, then every request queued while it was in flight.
    async fn load_block(&self, request: BlockRequest) {
        let mut next = Some(request);
        while let Some(request) = next.take() {
            let (ticket, fetcher, decorator, timeout) = {
                let Ok(mut guard) = self.inner.write() else {
                    return;
                };
                let Some(fetcher) = guard.block_fetcher.clone() else {
                    return;
                };
                let decorator = guard.decorator.clone();
                let timeout = guard.config.fetch_timeout;
                let Some(window) = guard.window.as_mut() else {
                    return;
                };
                match window.begin_request(request) {
                    RequestOutcome::Issued(ticket) => (ticket, fetcher, decorator, timeout),
                    RequestOutcome::Queued | RequestOutcome::Skipped => return,
                }
            };
            self.dirty.store(true, Ordering::SeqCst);

            let result = fetch_decorated(
                fetcher.as_ref(),
                decorator.as_deref(),
                ticket.request(),
                timeout,
            )
            .await;

            next = {
                let Ok(mut guard) = self.inner.write() else {
                    return;
                };
                let inner = &mut *guard;
                let Some(window) = inner.window.as_mut() else {
                    return;
                };
                let request = ticket.request().clone();
                match window.complete(ticket, result) {
                    BlockOutcome::Loaded { .. } => {
                        if let Some(BlockState::Loaded(rows)) = window.block_state(request.start_row) {
                            inner
                                .expansion
                                .extend_roots(rows.iter().map(|r| r.row.clone()));
                        }
                    }
                    BlockOutcome::Failed(_) => inner.events.push(GridEvent::BlockFailed {
                        start_row: request.start_row,
                        end_row: request.end_row,
                    }),
                    BlockOutcome::Stale => {}
                }
                window.take_queued()
            };
            self.dirty.store(true, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::Column;
    use crate::config::GridConfig;
    use crate::row::Record;

    fn grid() -> Grid<Record> {
        Grid::new(vec![
            Column::new("name", "Name").sortable(),
            Column::new("notes", "Notes"),
        ])
        .with_rows((0..6).map(Record::new).collect())
    }

    #[tokio::test]
    async fn test_header_click_cycles_sort() {
        let grid = grid();

        assert!(grid.on_header_click("name").await.is_handled());
        assert_eq!(grid.sort_descriptor(), Some(SortDescriptor::asc("name")));
        grid.on_header_click("name").await;
        assert_eq!(grid.sort_descriptor(), Some(SortDescriptor::desc("name")));
        grid.on_header_click("name").await;
        assert_eq!(grid.sort_descriptor(), None);

        assert_eq!(grid.on_header_click("notes").await, EventResult::Ignored);
        assert_eq!(grid.on_header_click("missing").await, EventResult::Ignored);

        let sorts: Vec<_> = grid
            .drain_events()
            .into_iter()
            .filter_map(|e| match e {
                GridEvent::SortChanged(sort) => Some(sort),
                _ => None,
            })
            .collect();
        assert_eq!(
            sorts,
            vec![
                Some(SortDescriptor::asc("name")),
                Some(SortDescriptor::desc("name")),
                None
            ]
        );
    }

    #[test]
    fn test_shift_click_range() {
        let grid = grid();

        grid.on_row_checkbox_toggle(1, false, true);
        grid.on_row_checkbox_toggle(4, true, true);
        assert_eq!(grid.selection_summary().selected_ids, vec![1, 2, 3, 4]);

        grid.on_row_checkbox_toggle(2, true, true);
        assert_eq!(grid.selection_summary().selected_ids, vec![1, 2]);
    }

    #[test]
    fn test_shift_click_on_anchor_keeps_anchor_only() {
        let grid = grid();

        grid.on_row_checkbox_toggle(0, false, true);
        grid.on_row_checkbox_toggle(3, true, true);
        assert_eq!(grid.selection_summary().selected_ids, vec![0, 1, 2, 3]);

        grid.on_row_checkbox_toggle(0, true, false);
        assert_eq!(grid.selection_summary().selected_ids, vec![0]);
    }

    #[test]
    fn test_shift_click_without_anchor_is_plain_click() {
        let grid = grid();

        grid.on_row_checkbox_toggle(3, true, true);
        assert_eq!(grid.selection_summary().selected_ids, vec![3]);
    }

    #[test]
    fn test_readonly_ignores_checkboxes() {
        let grid = grid().with_config(GridConfig::default().readonly(true));

        assert_eq!(grid.on_row_checkbox_toggle(1, false, true), EventResult::Ignored);
        assert_eq!(grid.on_header_checkbox_toggle(), EventResult::Ignored);
        assert!(grid.selection_summary().selected_ids.is_empty());
        assert!(grid.drain_events().is_empty());
    }

    #[test]
    fn test_header_checkbox_toggle() {
        let grid = grid();

        grid.on_header_checkbox_toggle();
        assert_eq!(grid.selection_summary().selected_ids, vec![0, 1, 2, 3, 4, 5]);

        grid.on_header_checkbox_toggle();
        assert!(grid.selection_summary().selected_ids.is_empty());

        // Partial selection clears rather than filling up.
        grid.on_row_checkbox_toggle(2, false, true);
        grid.on_header_checkbox_toggle();
        assert!(grid.selection_summary().selected_ids.is_empty());
    }

    #[test]
    fn test_all_records_individual_deselect() {
        let grid = grid().with_config(GridConfig::default().with_total_records(500));
        grid.enter_all_records_mode();

        grid.on_row_checkbox_toggle(3, false, false);

        let summary = grid.selection_summary();
        assert!(summary.all_records_mode);
        assert_eq!(summary.excluded_ids, vec![3]);
        assert_eq!(summary.count, 499);
        assert!(!grid.is_selected(&3));
        assert!(grid.is_selected(&400));
    }

    #[test]
    fn test_double_click_activates_row() {
        let grid = grid();

        grid.on_row_double_click(5);
        assert_eq!(grid.drain_events(), vec![GridEvent::RowActivated(5)]);
    }
}
