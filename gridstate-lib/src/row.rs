//! Row trait and a schemaless record type.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::hash::Hash;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Trait for host records displayed as grid rows.
///
/// The engine never mutates rows. It only reads the identifier, the child
/// identifiers used by the tree engine, and field values for cell text.
///
/// # Example
///
/// ```
/// use gridstate_lib::GridRow;
///
/// #[derive(Clone)]
/// struct Folder {
///     id: u32,
///     name: String,
///     children: Vec<u32>,
/// }
///
/// impl GridRow for Folder {
///     type Id = u32;
///
///     fn id(&self) -> u32 {
///         self.id
///     }
///
///     fn child_ids(&self) -> &[u32] {
///         &self.children
///     }
///
///     fn field(&self, key: &str) -> Option<String> {
///         (key == "name").then(|| self.name.clone())
///     }
/// }
/// ```
pub trait GridRow: Send + Sync + Clone + 'static {
    /// Stable, comparable row identifier.
    type Id: Clone + Eq + Hash + Debug + Send + Sync + 'static;

    /// Unique identifier for this row.
    fn id(&self) -> Self::Id;

    /// Identifiers of this row's children.
    ///
    /// An empty list means the row cannot be expanded.
    fn child_ids(&self) -> &[Self::Id] {
        &[]
    }

    /// Text value of the field shown in column `key`.
    fn field(&self, _key: &str) -> Option<String> {
        None
    }
}

/// A schemaless row: numeric id, optional children and JSON fields.
///
/// Useful when rows arrive as JSON from a server and no dedicated type
/// exists for them.
///
/// # Example
///
/// ```
/// use gridstate_lib::{GridRow, Record};
///
/// let row = Record::new(0).with_children([2]).with_field("name", "Kate");
/// assert_eq!(row.child_ids(), &[2]);
/// assert_eq!(row.field("name").as_deref(), Some("Kate"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: u64,
    #[serde(default, rename = "child_id", skip_serializing_if = "Vec::is_empty")]
    pub child_ids: Vec<u64>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl Record {
    /// Creates a record with no children and no fields.
    pub fn new(id: u64) -> Self {
        Self {
            id,
            child_ids: Vec::new(),
            fields: BTreeMap::new(),
        }
    }

    /// Sets the child identifiers.
    pub fn with_children(mut self, ids: impl IntoIterator<Item = u64>) -> Self {
        self.child_ids = ids.into_iter().collect();
        self
    }

    /// Sets a field value.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Returns the raw JSON value of a field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

impl GridRow for Record {
    type Id = u64;

    fn id(&self) -> u64 {
        self.id
    }

    fn child_ids(&self) -> &[u64] {
        &self.child_ids
    }

    fn field(&self, key: &str) -> Option<String> {
        match self.fields.get(key)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}
