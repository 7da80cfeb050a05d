//! The grid: one handle over sort, selection, tree and window state.

mod events;
mod state;

pub use events::{EventResult, GridEvent};
pub use state::{Grid, SelectionSummary};
