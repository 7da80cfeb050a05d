//! Data grid state engine
//!
//! Headless interaction state for tabular widgets: single-column sorting,
//! multi-row selection (including "all records" selection over paged data),
//! lazily loaded tree rows and windowed block fetching. A rendering layer
//! reads [`RenderRow`]s from a [`Grid`] and forwards user events back
//! into it.

pub mod column;
pub mod compose;
pub mod config;
pub mod error;
pub mod expansion;
pub mod grid;
pub mod host;
pub mod row;
pub mod selection;
pub mod sort;
pub mod window;

pub use column::{Alignment, Column};
pub use compose::{RenderRow, compose};
pub use config::GridConfig;
pub use error::FetchError;
pub use expansion::ExpandStatus;
pub use grid::{EventResult, Grid, GridEvent, SelectionSummary};
pub use host::{BlockFetcher, ChildFetcher, RowDecorator};
pub use row::{GridRow, Record};
pub use sort::SortDescriptor;
pub use window::{BlockRequest, ViewportMetrics};
