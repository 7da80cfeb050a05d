//! Integration tests for windowed block fetching.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::oneshot;

use gridstate_lib::window::{BlockStatus, WindowedDataSource};
use gridstate_lib::{
    BlockFetcher, BlockRequest, Column, FetchError, Grid, GridConfig, GridEvent, Record,
    RowDecorator, SortDescriptor, ViewportMetrics,
};

/// A server holding `total` records. Records every request it serves.
#[derive(Clone)]
struct Server {
    total: u64,
    requests: Arc<Mutex<Vec<BlockRequest>>>,
    fail_next: Arc<AtomicBool>,
    gate: Arc<Mutex<Option<oneshot::Receiver<()>>>>,
    delay: Option<Duration>,
}

impl Server {
    fn new(total: u64) -> Self {
        Self {
            total,
            requests: Arc::new(Mutex::new(Vec::new())),
            fail_next: Arc::new(AtomicBool::new(false)),
            gate: Arc::new(Mutex::new(None)),
            delay: None,
        }
    }

    fn requests(&self) -> Vec<BlockRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl BlockFetcher<Record> for Server {
    async fn fetch_block(&self, request: &BlockRequest) -> Result<Option<Vec<Record>>, FetchError> {
        self.requests.lock().unwrap().push(request.clone());
        let gate = self.gate.lock().unwrap().take();
        if let Some(rx) = gate {
            let _ = rx.await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(FetchError::host("503 Service Unavailable"));
        }
        let start = request.start_row as u64;
        let end = (request.end_row as u64).min(self.total);
        Ok(Some(
            (start..end)
                .map(|id| Record::new(id).with_field("name", format!("Record {}", id)))
                .collect(),
        ))
    }
}

/// Answers with no data at all.
struct Empty;

#[async_trait]
impl BlockFetcher<Record> for Empty {
    async fn fetch_block(&self, _request: &BlockRequest) -> Result<Option<Vec<Record>>, FetchError> {
        Ok(None)
    }
}

/// Marks even ids with a badge.
struct Badges {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl RowDecorator<Record> for Badges {
    async fn decorate(&self, row: &Record) -> Option<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (row.id % 2 == 0).then(|| json!({ "badge": "even" }))
    }
}

fn grid(server: &Server) -> Grid<Record> {
    Grid::new(vec![Column::new("name", "Name").sortable()]).with_block_fetcher(server.clone())
}

fn ids(grid: &Grid<Record>) -> Vec<u64> {
    grid.visible_rows().iter().map(|r| r.row.id).collect()
}

const NEAR_BOTTOM: ViewportMetrics = ViewportMetrics {
    scroll_height: 1000.0,
    scroll_top: 600.0,
    client_height: 300.0,
};

#[tokio::test]
async fn test_short_block_reveals_last_row() {
    let server = Server::new(30);
    let mut source: WindowedDataSource<Record> = WindowedDataSource::new(GridConfig::default());

    let rows = source.request_block(&server, None, 0, 50, None).await;

    assert_eq!(rows.map(|r| r.len()), Some(30));
    assert_eq!(source.window_state().total_known_rows, Some(30));
    assert_eq!(source.row_count(), 30);
}

#[tokio::test]
async fn test_overlapping_request_fetches_only_new_rows() {
    let server = Server::new(100);
    let mut source: WindowedDataSource<Record> = WindowedDataSource::new(GridConfig::default());

    source.request_block(&server, None, 0, 50, None).await;
    let rows = source.request_block(&server, None, 30, 80, None).await;

    let fetched: Vec<u64> = rows.unwrap_or_default().iter().map(|r| r.id).collect();
    assert_eq!(fetched, (50..80).collect::<Vec<_>>());
    assert_eq!(server.requests().last(), Some(&BlockRequest::new(50, 80)));
    let ids: Vec<u64> = source.rows().iter().map(|r| r.row.id).collect();
    assert_eq!(ids, (0..80).collect::<Vec<_>>());

    assert_eq!(source.request_block(&server, None, 10, 40, None).await, None);
    assert_eq!(server.requests().len(), 2);
}

#[tokio::test]
async fn test_viewport_loads_first_block() {
    let server = Server::new(100);
    let grid = grid(&server);

    assert!(grid.on_viewport_change(0, 10).await.is_handled());

    assert_eq!(ids(&grid), (0..30).collect::<Vec<_>>());
    assert_eq!(grid.block_state(0), Some(BlockStatus::Loaded));
    assert_eq!(server.requests(), vec![BlockRequest::new(0, 30)]);
    assert!(grid.take_dirty());
}

#[tokio::test]
async fn test_scroll_near_bottom_appends_until_end() {
    let server = Server::new(70);
    let grid = grid(&server);
    grid.on_viewport_change(0, 10).await;

    grid.on_scroll_near_bottom(NEAR_BOTTOM).await;
    grid.on_scroll_near_bottom(NEAR_BOTTOM).await;
    assert_eq!(ids(&grid), (0..70).collect::<Vec<_>>());
    assert_eq!(grid.window_state().and_then(|w| w.total_known_rows), Some(70));

    // End reached: no further requests.
    assert!(!grid.on_scroll_near_bottom(NEAR_BOTTOM).await.is_handled());
    assert_eq!(server.requests().len(), 3);
}

#[tokio::test]
async fn test_failed_block_then_retry() {
    let server = Server::new(100);
    server.fail_next.store(true, Ordering::SeqCst);
    let grid = grid(&server);

    grid.on_viewport_change(0, 10).await;
    assert_eq!(grid.block_state(0), Some(BlockStatus::Failed));
    assert!(ids(&grid).is_empty());
    assert_eq!(
        grid.drain_events(),
        vec![GridEvent::BlockFailed {
            start_row: 0,
            end_row: 30
        }]
    );

    grid.on_viewport_change(0, 10).await;
    assert_eq!(grid.block_state(0), Some(BlockStatus::Loaded));
    assert_eq!(ids(&grid).len(), 30);
}

#[tokio::test]
async fn test_missing_data_fails_block() {
    let grid = Grid::new(vec![Column::new("name", "Name")]).with_block_fetcher(Empty);

    grid.on_viewport_change(0, 10).await;

    assert_eq!(grid.block_state(0), Some(BlockStatus::Failed));
    assert!(grid.visible_rows().is_empty());
}

#[tokio::test]
async fn test_rows_carry_decoration() {
    let server = Server::new(4);
    let calls = Arc::new(AtomicUsize::new(0));
    let grid = grid(&server).with_row_decorator(Badges {
        calls: Arc::clone(&calls),
    });

    grid.on_viewport_change(0, 3).await;

    let statuses: Vec<Option<Value>> = grid.visible_rows().into_iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![
            Some(json!({ "badge": "even" })),
            None,
            Some(json!({ "badge": "even" })),
            None,
        ]
    );
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_sort_change_purges_and_refetches() {
    let server = Server::new(100);
    let grid = grid(&server);
    grid.on_viewport_change(0, 10).await;
    grid.on_scroll_near_bottom(NEAR_BOTTOM).await;
    assert_eq!(ids(&grid).len(), 60);

    grid.on_header_click("name").await;

    let last = server.requests().pop();
    assert_eq!(
        last,
        Some(BlockRequest::new(0, 30).with_sort(Some(SortDescriptor::asc("name"))))
    );
    assert_eq!(ids(&grid).len(), 30);
    assert_eq!(grid.block_state(30), None);
}

#[tokio::test]
async fn test_all_records_mode_covers_later_blocks() {
    let server = Server::new(90);
    let grid = grid(&server);
    grid.on_viewport_change(0, 10).await;

    grid.enter_all_records_mode();
    grid.on_row_checkbox_toggle(4, false, false);
    grid.on_scroll_near_bottom(NEAR_BOTTOM).await;

    let rows = grid.visible_rows();
    assert_eq!(rows.len(), 60);
    assert!(rows.iter().filter(|r| r.row.id != 4).all(|r| r.is_selected));
    assert!(!rows[4].is_selected);

    let summary = grid.selection_summary();
    assert_eq!(summary.excluded_ids, vec![4]);
    // Extent unknown yet: count is against the loaded rows.
    assert_eq!(summary.count, 59);
}

#[tokio::test]
async fn test_request_during_fetch_is_queued() {
    let (tx, rx) = oneshot::channel();
    let server = Server::new(100);
    *server.gate.lock().unwrap() = Some(rx);
    let grid = grid(&server);

    let loader = grid.clone();
    let scroller = grid.clone();
    let first = async move { loader.on_viewport_change(0, 10).await };
    let second = async move {
        tokio::task::yield_now().await;
        let during = scroller.block_state(0);
        let result = scroller.on_scroll_near_bottom(NEAR_BOTTOM).await;
        let _ = tx.send(());
        (during, result)
    };

    let (first, (during, second)) = tokio::join!(first, second);

    assert!(first.is_handled());
    assert!(second.is_handled());
    assert_eq!(during, Some(BlockStatus::Loading));
    assert_eq!(grid.block_state(30), Some(BlockStatus::Loaded));
    assert_eq!(
        server.requests(),
        vec![BlockRequest::new(0, 30), BlockRequest::new(30, 60)]
    );
}

#[tokio::test]
async fn test_refresh_clears_selection_and_reloads() {
    let server = Server::new(100);
    let grid = grid(&server);
    grid.on_viewport_change(0, 10).await;
    grid.on_row_checkbox_toggle(3, false, true);

    grid.refresh().await;

    assert!(grid.selection_summary().selected_ids.is_empty());
    assert_eq!(ids(&grid).len(), 30);
    assert_eq!(server.requests().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_timed_out_block_fails() {
    let mut server = Server::new(100);
    server.delay = Some(Duration::from_secs(120));
    let grid = Grid::new(vec![Column::new("name", "Name")])
        .with_config(GridConfig::default().with_fetch_timeout(Duration::from_secs(10)))
        .with_block_fetcher(server.clone());

    grid.on_viewport_change(0, 10).await;

    assert_eq!(grid.block_state(0), Some(BlockStatus::Failed));
    assert!(matches!(
        grid.drain_events().as_slice(),
        [GridEvent::BlockFailed { start_row: 0, .. }]
    ));
}
