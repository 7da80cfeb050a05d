//! Fetch error types

use std::time::Duration;

/// Errors produced by host fetch callbacks.
///
/// State operations of the engine never fail; only the asynchronous
/// fetches it delegates to the host can.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The host callback reported a failure.
    #[error("Fetch failed: {0}")]
    Host(String),

    /// The host callback resolved without any data.
    ///
    /// A block fetch returning nothing is treated exactly like a failure.
    #[error("Fetch returned no data")]
    NoData,

    /// The fetch did not resolve within the configured timeout.
    #[error("Timeout after {0:?}")]
    Timeout(Duration),
}

impl FetchError {
    /// Creates a new host error.
    pub fn host(message: impl Into<String>) -> Self {
        Self::Host(message.into())
    }

    /// Returns `true` if issuing the same fetch again may succeed.
    ///
    /// A host that answered with no data is unlikely to answer differently.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Host(_) | Self::Timeout(_))
    }
}
