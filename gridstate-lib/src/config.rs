//! Grid configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a [`Grid`](crate::Grid).
///
/// Every field has a default, so partial configs deserialize cleanly.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use gridstate_lib::GridConfig;
///
/// let config = GridConfig::default()
///     .with_block_size(50)
///     .with_total_records(1_200)
///     .with_fetch_timeout(Duration::from_secs(10));
/// assert_eq!(config.block_size, 50);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Rows per fetched block.
    ///
    /// Default: 30
    pub block_size: usize,

    /// Extra rows kept loaded above and below the viewport.
    ///
    /// Default: 5
    pub row_buffer: usize,

    /// Remaining scroll distance below which the next block is fetched.
    ///
    /// Default: 500.0
    pub scroll_threshold: f64,

    /// Row count assumed before the end of the data is known.
    ///
    /// Default: none
    pub initial_row_count: Option<usize>,

    /// Total number of records on the server, if the host knows it.
    ///
    /// Drives the "select all records" banner and all-records counts.
    ///
    /// Default: none
    pub total_records: Option<usize>,

    /// Upper bound on how long a fetch may take before it fails.
    ///
    /// Default: none (a hung fetch stays loading)
    pub fetch_timeout: Option<Duration>,

    /// Ignore checkbox events.
    ///
    /// Default: false
    pub readonly: bool,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            block_size: 30,
            row_buffer: 5,
            scroll_threshold: 500.0,
            initial_row_count: None,
            total_records: None,
            fetch_timeout: None,
            readonly: false,
        }
    }
}

impl GridConfig {
    /// Creates a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the block size. Zero is clamped to one.
    pub fn with_block_size(mut self, size: usize) -> Self {
        self.block_size = size.max(1);
        self
    }

    /// Sets the row buffer.
    pub fn with_row_buffer(mut self, rows: usize) -> Self {
        self.row_buffer = rows;
        self
    }

    /// Sets the scroll threshold.
    pub fn with_scroll_threshold(mut self, threshold: f64) -> Self {
        self.scroll_threshold = threshold;
        self
    }

    /// Sets the initial row count.
    pub fn with_initial_row_count(mut self, rows: usize) -> Self {
        self.initial_row_count = Some(rows);
        self
    }

    /// Sets the total record count.
    pub fn with_total_records(mut self, total: usize) -> Self {
        self.total_records = Some(total);
        self
    }

    /// Sets the fetch timeout.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    /// Sets read-only mode.
    pub fn readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }
}
