//! Callbacks supplied by the host application.
//!
//! Transport is entirely the host's business: the engine only calls these
//! traits and reacts to what they resolve to.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::FetchError;
use crate::row::GridRow;
use crate::window::BlockRequest;

/// Loads the children of a tree row.
///
/// # Example
///
/// ```ignore
/// struct Api { client: HttpClient }
///
/// #[async_trait]
/// impl ChildFetcher<Record> for Api {
///     async fn fetch_children(&self, parent: &Record) -> Result<Vec<Record>, FetchError> {
///         self.client
///             .get_children(parent.id)
///             .await
///             .map_err(|e| FetchError::host(e.to_string()))
///     }
/// }
/// ```
#[async_trait]
pub trait ChildFetcher<R: GridRow>: Send + Sync {
    /// Fetch the child rows of `parent`.
    async fn fetch_children(&self, parent: &R) -> Result<Vec<R>, FetchError>;
}

/// Loads a contiguous block of rows for windowed display.
#[async_trait]
pub trait BlockFetcher<R: GridRow>: Send + Sync {
    /// Fetch rows `request.start_row..request.end_row` in the requested sort.
    ///
    /// Returning fewer rows than requested marks the end of the data.
    /// Returning `Ok(None)` is treated as a failure.
    async fn fetch_block(&self, request: &BlockRequest) -> Result<Option<Vec<R>>, FetchError>;
}

/// Computes a per-row status value (e.g. a badge) for fetched rows.
#[async_trait]
pub trait RowDecorator<R: GridRow>: Send + Sync {
    /// Status for one row, or `None` when the row has none.
    async fn decorate(&self, row: &R) -> Option<Value>;
}

/// Await `fetch`, failing with [`FetchError::Timeout`] after `timeout`.
pub(crate) async fn with_timeout<T>(
    timeout: Option<Duration>,
    fetch: impl Future<Output = Result<T, FetchError>>,
) -> Result<T, FetchError> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fetch)
            .await
            .unwrap_or_else(|_| Err(FetchError::Timeout(limit))),
        None => fetch.await,
    }
}
