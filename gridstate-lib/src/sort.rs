//! Single-column sort state.
//!
//! The engine only tracks which column is sorted and in which direction.
//! Rows are never reordered here: the host (or the server behind a block
//! fetch) sorts using the current [`SortDescriptor`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Ascending order (A-Z, 0-9).
    Asc,
    /// Descending order (Z-A, 9-0).
    Desc,
}

/// The active sort: one column and a direction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortDescriptor {
    pub column_id: String,
    pub descending: bool,
}

impl SortDescriptor {
    /// Creates an ascending sort on a column.
    pub fn asc(column_id: impl Into<String>) -> Self {
        Self {
            column_id: column_id.into(),
            descending: false,
        }
    }

    /// Creates a descending sort on a column.
    pub fn desc(column_id: impl Into<String>) -> Self {
        Self {
            column_id: column_id.into(),
            descending: true,
        }
    }

    /// Returns the sort direction.
    pub fn direction(&self) -> Direction {
        if self.descending {
            Direction::Desc
        } else {
            Direction::Asc
        }
    }
}

/// Tracks at most one active sort.
///
/// Repeated activation of the same column cycles
/// ascending → descending → none. Activating another column starts over
/// at ascending.
///
/// # Example
///
/// ```
/// use gridstate_lib::sort::{SortDescriptor, SortState};
///
/// let mut sort = SortState::new();
/// sort.activate("name");
/// assert_eq!(sort.current(), Some(&SortDescriptor::asc("name")));
/// sort.activate("name");
/// assert_eq!(sort.current(), Some(&SortDescriptor::desc("name")));
/// sort.activate("name");
/// assert_eq!(sort.current(), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortState {
    current: Option<SortDescriptor>,
}

impl SortState {
    /// Creates a sort state with no active sort.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sort state with an initial sort.
    pub fn with(descriptor: Option<SortDescriptor>) -> Self {
        Self {
            current: descriptor,
        }
    }

    /// Activate a column (header click). Returns the new sort.
    pub fn activate(&mut self, column_id: &str) -> Option<&SortDescriptor> {
        self.current = match self.current.take() {
            Some(SortDescriptor {
                column_id: active,
                descending: false,
            }) if active == column_id => Some(SortDescriptor {
                column_id: active,
                descending: true,
            }),
            Some(SortDescriptor {
                column_id: active,
                descending: true,
            }) if active == column_id => None,
            _ => Some(SortDescriptor::asc(column_id)),
        };
        log::debug!("[sort] {} -> {:?}", column_id, self.current);
        self.current.as_ref()
    }

    /// Get the active sort.
    pub fn current(&self) -> Option<&SortDescriptor> {
        self.current.as_ref()
    }

    /// Check if a column is the sorted one.
    pub fn is_column_active(&self, column_id: &str) -> bool {
        self.current
            .as_ref()
            .is_some_and(|d| d.column_id == column_id)
    }

    /// Replace the active sort.
    pub fn set(&mut self, descriptor: Option<SortDescriptor>) {
        self.current = descriptor;
    }

    /// Clear the active sort.
    pub fn clear(&mut self) {
        self.current = None;
    }

    /// Sort fields in the `column → direction` shape fetch callbacks expect.
    ///
    /// Empty when nothing is sorted.
    pub fn sort_fields(&self) -> BTreeMap<String, Direction> {
        self.current
            .iter()
            .map(|d| (d.column_id.clone(), d.direction()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_returns_to_none() {
        let mut sort = SortState::new();

        assert_eq!(sort.activate("name"), Some(&SortDescriptor::asc("name")));
        assert_eq!(sort.activate("name"), Some(&SortDescriptor::desc("name")));
        assert_eq!(sort.activate("name"), None);
        assert_eq!(sort.current(), None);
    }

    #[test]
    fn test_other_column_restarts_ascending() {
        let mut sort = SortState::with(Some(SortDescriptor::desc("name")));

        sort.activate("age");
        assert_eq!(sort.current(), Some(&SortDescriptor::asc("age")));
        assert!(sort.is_column_active("age"));
        assert!(!sort.is_column_active("name"));
    }

    #[test]
    fn test_sort_fields() {
        let mut sort = SortState::new();
        assert!(sort.sort_fields().is_empty());

        sort.activate("age");
        sort.activate("age");
        let fields = sort.sort_fields();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields.get("age"), Some(&Direction::Desc));
    }

    #[test]
    fn test_direction_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Direction::Asc).unwrap(), r#""asc""#);
        assert_eq!(serde_json::to_string(&Direction::Desc).unwrap(), r#""desc""#);
    }
}
