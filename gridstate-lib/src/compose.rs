//! Combines sort, selection and expansion state into renderable rows.

use std::collections::HashSet;

use serde_json::Value;

use crate::expansion::{ExpandStatus, ExpansionState};
use crate::row::GridRow;
use crate::selection::SelectionState;
use crate::sort::SortState;

/// One row as the rendering layer sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRow<R> {
    pub row: R,
    pub level: usize,
    pub is_selected: bool,
    /// Column to highlight, i.e. the sorted one.
    pub highlighted_column: Option<String>,
    pub expand_status: ExpandStatus,
    /// Decoration from the row decorator, for fetched rows.
    pub status: Option<Value>,
}

impl<R> RenderRow<R> {
    /// Check if a sort column is active.
    pub fn is_sort_highlighted(&self) -> bool {
        self.highlighted_column.is_some()
    }

    /// Check if cells of column `key` are highlighted.
    pub fn is_column_highlighted(&self, key: &str) -> bool {
        self.highlighted_column.as_deref() == Some(key)
    }
}

/// Build the render rows for `rows`.
///
/// Without expansion state every row is top level and the order of `rows`
/// is kept. With it, each row is followed by its visible descendants, and
/// a row reachable more than once shows only at its first position.
/// Pure: the same inputs always give the same output.
///
/// # Example
///
/// ```
/// use gridstate_lib::compose;
/// use gridstate_lib::Record;
/// use gridstate_lib::selection::SelectionState;
/// use gridstate_lib::sort::SortState;
///
/// let rows = vec![Record::new(1), Record::new(2)];
/// let mut selection = SelectionState::new();
/// selection.toggle_one(2);
/// let mut sort = SortState::new();
/// sort.activate("name");
///
/// let view = compose(&rows, &sort, &selection, None);
/// assert!(!view[0].is_selected);
/// assert!(view[1].is_selected);
/// assert!(view[1].is_column_highlighted("name"));
/// ```
pub fn compose<R: GridRow>(
    rows: &[R],
    sort: &SortState,
    selection: &SelectionState<R::Id>,
    expansion: Option<&ExpansionState<R>>,
) -> Vec<RenderRow<R>> {
    let highlighted = sort.current().map(|d| d.column_id.clone());
    let render = |row: &R, level: usize, expand_status: ExpandStatus| RenderRow {
        row: row.clone(),
        level,
        is_selected: selection.is_selected(&row.id()),
        highlighted_column: highlighted.clone(),
        expand_status,
        status: None,
    };

    let Some(tree) = expansion else {
        return rows
            .iter()
            .map(|row| render(row, 0, ExpandStatus::None))
            .collect();
    };

    let mut out = Vec::with_capacity(rows.len());
    let mut seen = HashSet::new();
    for row in rows {
        let id = row.id();
        if !seen.insert(id.clone()) {
            continue;
        }
        let level = tree.level_of(&id).unwrap_or(0);
        out.push(render(row, level, tree.expandable_status_for(&id)));
        for node in tree.visible_descendants(&id) {
            if !seen.insert(node.id.clone()) {
                continue;
            }
            out.push(render(
                &node.data,
                node.level,
                tree.expandable_status_for(&node.id),
            ));
        }
    }
    out
}
