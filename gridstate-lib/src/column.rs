//! Column metadata.

use std::fmt;
use std::sync::Arc;

use crate::row::GridRow;

/// Horizontal alignment for column content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

/// Renders the text of one cell.
pub type CellRenderer<R> = Arc<dyn Fn(&R) -> String + Send + Sync>;

/// Column configuration.
///
/// Columns define the key used to read cell values and to identify the sort
/// column, the header title, whether header clicks sort, and an optional
/// renderer overriding the plain field text.
///
/// # Examples
///
/// ```
/// use gridstate_lib::{Alignment, Column, Record};
///
/// let columns: Vec<Column<Record>> = vec![
///     Column::new("name", "Name").sortable(),
///     Column::new("age", "Age").align(Alignment::Right),
///     Column::new("badge", "").render(|row: &Record| format!("#{}", row.id)),
/// ];
/// ```
#[derive(Clone)]
pub struct Column<R> {
    /// Field key, also the column id used by sorting.
    pub key: String,
    /// Header text.
    pub title: String,
    /// Whether header clicks change the sort.
    pub sortable: bool,
    /// Horizontal alignment.
    pub align: Alignment,
    render: Option<CellRenderer<R>>,
}

impl<R> Column<R> {
    /// Create a new column.
    pub fn new(key: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            sortable: false,
            align: Alignment::Left,
            render: None,
        }
    }

    /// Make the column sortable.
    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    /// Set the column alignment.
    pub fn align(mut self, align: Alignment) -> Self {
        self.align = align;
        self
    }

    /// Set a custom cell renderer.
    pub fn render(mut self, render: impl Fn(&R) -> String + Send + Sync + 'static) -> Self {
        self.render = Some(Arc::new(render));
        self
    }
}

impl<R: GridRow> Column<R> {
    /// Text for this column's cell in `row`.
    ///
    /// Uses the renderer when one is set, otherwise the row's field value,
    /// otherwise an empty string.
    pub fn cell_text(&self, row: &R) -> String {
        match &self.render {
            Some(render) => render(row),
            None => row.field(&self.key).unwrap_or_default(),
        }
    }
}

impl<R> fmt::Debug for Column<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("key", &self.key)
            .field("title", &self.title)
            .field("sortable", &self.sortable)
            .field("align", &self.align)
            .field("render", &self.render.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::Record;

    #[test]
    fn test_cell_text_uses_field() {
        let column: Column<Record> = Column::new("name", "Name");
        let row = Record::new(1).with_field("name", "Kate");
        assert_eq!(column.cell_text(&row), "Kate");
        assert_eq!(column.cell_text(&Record::new(2)), "");
    }

    #[test]
    fn test_cell_text_uses_renderer() {
        let column: Column<Record> =
            Column::new("name", "Name").render(|row: &Record| format!("row {}", row.id));
        let row = Record::new(3).with_field("name", "Kate");
        assert_eq!(column.cell_text(&row), "row 3");
    }
}
