//! Windowed block fetching for large datasets.
//!
//! Rows are fetched in fixed-size blocks as the viewport moves. At most one
//! block request is in flight; a request made meanwhile is queued, and only
//! the latest queued request is kept. When a fetch returns fewer rows than
//! requested, the end of the data is known.
//!
//! The source itself never awaits while it holds state: a request is
//! started with [`WindowedDataSource::begin_request`], fetched by the
//! caller (see [`fetch_decorated`]) and handed back with
//! [`WindowedDataSource::complete`].

use std::collections::BTreeMap;
use std::time::Duration;

use futures::future::join_all;
use serde_json::Value;

use crate::config::GridConfig;
use crate::error::FetchError;
use crate::host::{BlockFetcher, RowDecorator, with_timeout};
use crate::row::GridRow;
use crate::sort::{Direction, SortDescriptor};

/// A range of rows to fetch, with the sort to fetch them in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRequest {
    /// First row (inclusive).
    pub start_row: usize,
    /// Last row (exclusive).
    pub end_row: usize,
    pub sort: Option<SortDescriptor>,
}

impl BlockRequest {
    /// Creates an unsorted request for `start_row..end_row`.
    pub fn new(start_row: usize, end_row: usize) -> Self {
        Self {
            start_row,
            end_row,
            sort: None,
        }
    }

    /// Sets the sort.
    pub fn with_sort(mut self, sort: Option<SortDescriptor>) -> Self {
        self.sort = sort;
        self
    }

    /// Number of rows requested.
    pub fn len(&self) -> usize {
        self.end_row.saturating_sub(self.start_row)
    }

    /// Check if the request covers no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sort in `column → direction` form.
    pub fn sort_fields(&self) -> BTreeMap<String, Direction> {
        self.sort
            .iter()
            .map(|d| (d.column_id.clone(), d.direction()))
            .collect()
    }
}

/// A fetched row with its decoration status.
#[derive(Debug, Clone, PartialEq)]
pub struct DecoratedRow<R> {
    pub row: R,
    pub status: Option<Value>,
}

impl<R> DecoratedRow<R> {
    /// Wrap a row without status.
    pub fn plain(row: R) -> Self {
        Self { row, status: None }
    }
}

/// State of one block.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockState<R> {
    Loading,
    Loaded(Vec<DecoratedRow<R>>),
    Failed(FetchError),
}

/// Discriminant of [`BlockState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
    Loading,
    Loaded,
    Failed,
}

impl<R> BlockState<R> {
    pub fn status(&self) -> BlockStatus {
        match self {
            BlockState::Loading => BlockStatus::Loading,
            BlockState::Loaded(_) => BlockStatus::Loaded,
            BlockState::Failed(_) => BlockStatus::Failed,
        }
    }

    /// A request for this block may be issued again.
    fn is_retryable(&self) -> bool {
        matches!(self, BlockState::Failed(_))
    }
}

#[derive(Debug, Clone)]
struct Block<R> {
    end_row: usize,
    state: BlockState<R>,
}

/// Viewport range and known data extent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowState {
    /// First visible row.
    pub start_row: usize,
    /// Last visible row (inclusive).
    pub end_row: usize,
    /// Total row count, once a short block revealed the end.
    pub total_known_rows: Option<usize>,
}

/// Scroll geometry of the viewport, in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ViewportMetrics {
    pub scroll_height: f64,
    pub scroll_top: f64,
    pub client_height: f64,
}

impl ViewportMetrics {
    /// Remaining scroll distance to the bottom.
    pub fn distance_to_bottom(&self) -> f64 {
        self.scroll_height - self.scroll_top - self.client_height
    }
}

/// An issued block request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockTicket {
    request: BlockRequest,
    generation: u64,
}

impl BlockTicket {
    pub fn request(&self) -> &BlockRequest {
        &self.request
    }
}

/// Result of [`WindowedDataSource::begin_request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Fetch now and report back with the ticket.
    Issued(BlockTicket),
    /// Another request is in flight; this one waits in the queue.
    Queued,
    /// Already loaded or loading, or past the end of the data.
    Skipped,
}

/// Result of [`WindowedDataSource::complete`].
#[derive(Debug, Clone, PartialEq)]
pub enum BlockOutcome {
    Loaded {
        rows: usize,
        /// Set when the block revealed the end of the data.
        last_row: Option<usize>,
    },
    Failed(FetchError),
    /// The source was purged while the fetch ran.
    Stale,
}

/// Block cache and request bookkeeping for windowed display.
#[derive(Debug, Clone)]
pub struct WindowedDataSource<R: GridRow> {
    config: GridConfig,
    sort: Option<SortDescriptor>,
    /// Blocks keyed by start row.
    blocks: BTreeMap<usize, Block<R>>,
    pending: Option<BlockRequest>,
    queued: Option<BlockRequest>,
    generation: u64,
    window: WindowState,
    first_visible_row: Option<usize>,
    first_load_done: bool,
    restore: Option<usize>,
}

impl<R: GridRow> WindowedDataSource<R> {
    pub fn new(config: GridConfig) -> Self {
        Self {
            config,
            sort: None,
            blocks: BTreeMap::new(),
            pending: None,
            queued: None,
            generation: 0,
            window: WindowState::default(),
            first_visible_row: None,
            first_load_done: false,
            restore: None,
        }
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    /// Sort used for new requests.
    pub fn sort(&self) -> Option<&SortDescriptor> {
        self.sort.as_ref()
    }

    /// Change the sort. Loaded blocks are in the old order, so everything
    /// is purged.
    pub fn set_sort(&mut self, sort: Option<SortDescriptor>) {
        self.sort = sort;
        self.purge();
    }

    // -------------------------------------------------------------------------
    // Request lifecycle
    // -------------------------------------------------------------------------

    /// Start a request, or queue it if another one is in flight.
    ///
    /// The request is clipped to the rows no loaded or loading block covers,
    /// so blocks never overlap. Failed blocks inside the clipped range are
    /// replaced.
    pub fn begin_request(&mut self, request: BlockRequest) -> RequestOutcome {
        let Some((start_row, end_row)) = self.uncovered(request.start_row, request.end_row) else {
            return RequestOutcome::Skipped;
        };
        if self.is_past_end(start_row) {
            return RequestOutcome::Skipped;
        }
        let request = BlockRequest {
            start_row,
            end_row,
            ..request
        };
        if self.pending.is_some() {
            if self.pending.as_ref() != Some(&request) {
                log::debug!(
                    "[window] queueing rows {}..{}",
                    request.start_row,
                    request.end_row
                );
                self.queued = Some(request);
                return RequestOutcome::Queued;
            }
            return RequestOutcome::Skipped;
        }

        log::debug!(
            "[window] requesting rows {}..{}",
            request.start_row,
            request.end_row
        );
        let failed: Vec<usize> = self
            .blocks
            .range(request.start_row..request.end_row)
            .map(|(&start, _)| start)
            .collect();
        for start in failed {
            self.blocks.remove(&start);
        }
        self.blocks.insert(
            request.start_row,
            Block {
                end_row: request.end_row,
                state: BlockState::Loading,
            },
        );
        self.pending = Some(request.clone());
        RequestOutcome::Issued(BlockTicket {
            request,
            generation: self.generation,
        })
    }

    /// Store the result of an issued request.
    ///
    /// A fetch that returns fewer rows than requested reveals the last row.
    /// A failed fetch marks the block failed so it can be requested again.
    pub fn complete(
        &mut self,
        ticket: BlockTicket,
        result: Result<Vec<DecoratedRow<R>>, FetchError>,
    ) -> BlockOutcome {
        if ticket.generation != self.generation {
            log::debug!(
                "[window] dropping stale rows {}..{}",
                ticket.request.start_row,
                ticket.request.end_row
            );
            return BlockOutcome::Stale;
        }
        self.pending = None;
        let request = ticket.request;

        match result {
            Ok(rows) => {
                let count = rows.len();
                let last_row = (count < request.len()).then_some(request.start_row + count);
                if let Some(last) = last_row {
                    log::debug!("[window] end of data at row {}", last);
                    self.window.total_known_rows = Some(last);
                }
                self.blocks.insert(
                    request.start_row,
                    Block {
                        end_row: request.end_row,
                        state: BlockState::Loaded(rows),
                    },
                );
                if !self.first_load_done {
                    self.first_load_done = true;
                    self.restore = self.first_visible_row.filter(|&row| row > 0);
                }
                BlockOutcome::Loaded {
                    rows: count,
                    last_row,
                }
            }
            Err(e) => {
                if e.is_retryable() {
                    log::warn!(
                        "[window] rows {}..{} failed: {}",
                        request.start_row,
                        request.end_row,
                        e
                    );
                } else {
                    log::error!(
                        "[window] rows {}..{} failed: {}",
                        request.start_row,
                        request.end_row,
                        e
                    );
                }
                self.blocks.insert(
                    request.start_row,
                    Block {
                        end_row: request.end_row,
                        state: BlockState::Failed(e.clone()),
                    },
                );
                BlockOutcome::Failed(e)
            }
        }
    }

    /// Take the request queued while another was in flight.
    pub fn take_queued(&mut self) -> Option<BlockRequest> {
        self.queued.take()
    }

    /// The request in flight.
    pub fn pending(&self) -> Option<&BlockRequest> {
        self.pending.as_ref()
    }

    /// The request waiting for the in-flight one to finish.
    pub fn queued(&self) -> Option<&BlockRequest> {
        self.queued.as_ref()
    }

    /// Drop every block and forget the end of the data.
    ///
    /// Results of fetches already in flight are discarded when they arrive.
    pub fn purge(&mut self) {
        log::debug!("[window] purge ({} blocks)", self.blocks.len());
        self.blocks.clear();
        self.pending = None;
        self.queued = None;
        self.generation += 1;
        self.window.total_known_rows = None;
    }

    // -------------------------------------------------------------------------
    // Viewport
    // -------------------------------------------------------------------------

    /// Record the visible rows and return the first block still missing
    /// around them (viewport plus `row_buffer` rows on each side).
    pub fn ensure_visible(&mut self, first_row: usize, last_row: usize) -> Option<BlockRequest> {
        let last_row = last_row.max(first_row);
        self.window.start_row = first_row;
        self.window.end_row = last_row;
        self.first_visible_row = Some(first_row);

        let block_size = self.config.block_size.max(1);
        let low = first_row.saturating_sub(self.config.row_buffer);
        let mut high = last_row.saturating_add(self.config.row_buffer);
        if let Some(total) = self.window.total_known_rows {
            if low >= total {
                return None;
            }
            high = high.min(total.saturating_sub(1));
        }

        (low / block_size..=high / block_size)
            .map(|n| n * block_size)
            .find_map(|start| self.uncovered(start, start + block_size))
            .map(|(start, end)| BlockRequest::new(start, end).with_sort(self.sort.clone()))
    }

    /// The part of `start..end` not covered by a loaded or loading block,
    /// cut short at the next covered row.
    fn uncovered(&self, start: usize, end: usize) -> Option<(usize, usize)> {
        let mut start = start;
        loop {
            let covered_until = self
                .blocks
                .range(..=start)
                .rev()
                .find(|(_, block)| !block.state.is_retryable() && block.end_row > start)
                .map(|(_, block)| block.end_row);
            match covered_until {
                Some(row) => start = row,
                None => break,
            }
        }
        if start >= end {
            return None;
        }
        let end = self
            .blocks
            .range(start..end)
            .find(|(_, block)| !block.state.is_retryable())
            .map_or(end, |(&next, _)| next);
        Some((start, end))
    }

    /// Next block to fetch when the viewport nears the bottom, if any.
    pub fn on_scroll_near_bottom(&self, metrics: ViewportMetrics) -> Option<BlockRequest> {
        if metrics.distance_to_bottom() >= self.config.scroll_threshold
            || self.is_end_reached()
        {
            return None;
        }
        Some(self.block_request(self.requested_until()))
    }

    fn block_request(&self, start_row: usize) -> BlockRequest {
        BlockRequest::new(start_row, start_row + self.config.block_size.max(1))
            .with_sort(self.sort.clone())
    }

    /// End of the contiguous run of loaded or loading blocks from row 0.
    fn requested_until(&self) -> usize {
        let mut row = 0;
        while let Some(block) = self.blocks.get(&row) {
            if block.state.is_retryable() || block.end_row <= row {
                break;
            }
            row = block.end_row;
        }
        row
    }

    /// End of the contiguous run of loaded rows from row 0.
    pub fn loaded_until(&self) -> usize {
        let mut row = 0;
        while let Some(Block {
            state: BlockState::Loaded(rows),
            ..
        }) = self.blocks.get(&row)
        {
            if rows.is_empty() {
                break;
            }
            row += rows.len();
        }
        row
    }

    fn is_past_end(&self, row: usize) -> bool {
        self.window.total_known_rows.is_some_and(|total| row >= total)
    }

    /// Check if a short block revealed the end of the data.
    pub fn is_end_reached(&self) -> bool {
        self.window.total_known_rows.is_some()
    }

    pub fn window_state(&self) -> WindowState {
        self.window
    }

    /// Remember the first visible row, e.g. from a previous session.
    pub fn remember_first_visible_row(&mut self, row: usize) {
        self.first_visible_row = Some(row);
    }

    /// Row to scroll back to, yielded once after the first successful load.
    pub fn take_restore_position(&mut self) -> Option<usize> {
        self.restore.take()
    }

    // -------------------------------------------------------------------------
    // Data
    // -------------------------------------------------------------------------

    /// State of the block starting at `start_row`.
    pub fn block_state(&self, start_row: usize) -> Option<&BlockState<R>> {
        self.blocks.get(&start_row).map(|b| &b.state)
    }

    /// All loaded rows in row order.
    pub fn rows(&self) -> Vec<&DecoratedRow<R>> {
        self.blocks
            .values()
            .filter_map(|block| match &block.state {
                BlockState::Loaded(rows) => Some(rows.iter()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// Loaded row at an absolute index.
    pub fn row(&self, index: usize) -> Option<&DecoratedRow<R>> {
        let (start, block) = self.blocks.range(..=index).next_back()?;
        match &block.state {
            BlockState::Loaded(rows) => rows.get(index - start),
            _ => None,
        }
    }

    /// Number of loaded rows.
    pub fn loaded_count(&self) -> usize {
        self.blocks
            .values()
            .map(|block| match &block.state {
                BlockState::Loaded(rows) => rows.len(),
                _ => 0,
            })
            .sum()
    }

    /// Estimated row count: the known total, else the configured initial
    /// count (or the loaded rows, if more).
    pub fn row_count(&self) -> usize {
        self.window.total_known_rows.unwrap_or_else(|| {
            self.config
                .initial_row_count
                .unwrap_or(0)
                .max(self.loaded_count())
        })
    }

    /// Decoration status of a loaded row.
    pub fn status_of(&self, id: &R::Id) -> Option<&Value> {
        self.rows()
            .into_iter()
            .find(|r| &r.row.id() == id)
            .and_then(|r| r.status.as_ref())
    }

    // -------------------------------------------------------------------------
    // Fetching
    // -------------------------------------------------------------------------

    /// Fetch `start_row..end_row` through `fetcher` and store the block.
    ///
    /// Rows already loaded or loading are not fetched again: the request is
    /// clipped first, and only the newly fetched rows are returned. Returns
    /// `None` when the fetch failed or the request was skipped or queued.
    /// Queued requests are left for [`take_queued`].
    ///
    /// [`take_queued`]: Self::take_queued
    pub async fn request_block(
        &mut self,
        fetcher: &dyn BlockFetcher<R>,
        decorator: Option<&dyn RowDecorator<R>>,
        start_row: usize,
        end_row: usize,
        sort: Option<SortDescriptor>,
    ) -> Option<Vec<R>> {
        let request = BlockRequest::new(start_row, end_row).with_sort(sort);
        let RequestOutcome::Issued(ticket) = self.begin_request(request) else {
            return None;
        };
        let start_row = ticket.request().start_row;
        let result = fetch_decorated(
            fetcher,
            decorator,
            ticket.request(),
            self.config.fetch_timeout,
        )
        .await;
        match self.complete(ticket, result) {
            BlockOutcome::Loaded { .. } => match self.block_state(start_row) {
                Some(BlockState::Loaded(rows)) => {
                    Some(rows.iter().map(|r| r.row.clone()).collect())
                }
                _ => None,
            },
            _ => None,
        }
    }
}

/// Fetch one block and decorate every row concurrently.
///
/// A fetch resolving to no data fails with [`FetchError::NoData`]. The
/// block only becomes visible once every decoration has resolved.
pub async fn fetch_decorated<R: GridRow>(
    fetcher: &dyn BlockFetcher<R>,
    decorator: Option<&dyn RowDecorator<R>>,
    request: &BlockRequest,
    timeout: Option<Duration>,
) -> Result<Vec<DecoratedRow<R>>, FetchError> {
    let rows = with_timeout(timeout, fetcher.fetch_block(request))
        .await?
        .ok_or(FetchError::NoData)?;

    let statuses = match decorator {
        Some(decorator) => join_all(rows.iter().map(|row| decorator.decorate(row))).await,
        None => vec![None; rows.len()],
    };

    Ok(rows
        .into_iter()
        .zip(statuses)
        .map(|(row, status)| DecoratedRow { row, status })
        .collect())
}
