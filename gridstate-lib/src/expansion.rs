//! Tree engine: expand/collapse state and lazily loaded children.
//!
//! Every row known to the tree lives in one flat node store, top-level rows
//! and fetched children alike; they differ only in their `level`. Children
//! of a row are looked up through the row's child-id list.
//!
//! Expanding a row whose children were never fetched is a two-phase
//! operation so that a UI loop can keep rendering while the fetch runs:
//! [`ExpansionState::begin_toggle`] marks the row loading and hands back a
//! [`FetchTicket`], and [`ExpansionState::finish_fetch`] merges the result.

use std::collections::{HashMap, HashSet};

use crate::error::FetchError;
use crate::host::ChildFetcher;
use crate::row::GridRow;

/// A row wrapped with tree metadata.
#[derive(Debug, Clone)]
pub struct RowNode<R: GridRow> {
    pub id: R::Id,
    pub child_ids: Vec<R::Id>,
    /// A child fetch for this row is in flight.
    pub is_loading: bool,
    /// Depth in the tree (0 = top level). Assigned once on insertion.
    pub level: usize,
    pub data: R,
}

impl<R: GridRow> RowNode<R> {
    fn new(data: R, level: usize) -> Self {
        Self {
            id: data.id(),
            child_ids: data.child_ids().to_vec(),
            is_loading: false,
            level,
            data,
        }
    }

    /// Whether this row has children to show.
    pub fn has_children(&self) -> bool {
        !self.child_ids.is_empty()
    }
}

/// Which expand icon a row shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpandStatus {
    /// Not expandable.
    #[default]
    None,
    /// Has children, collapsed.
    Expand,
    /// Has children, expanded.
    Collapse,
    /// Child fetch in flight.
    Loading,
}

/// Proof that a child fetch was started.
///
/// Tickets from before the last [`ExpansionState::reset`] are stale and
/// their results are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket<K> {
    parent_id: K,
    generation: u64,
}

impl<K> FetchTicket<K> {
    /// Id of the row whose children are being fetched.
    pub fn parent_id(&self) -> &K {
        &self.parent_id
    }
}

/// Outcome of an expand icon click.
#[derive(Debug, Clone)]
pub enum ToggleAction<R: GridRow> {
    /// Unknown row, leaf row, or a fetch already in flight.
    Ignored,
    /// The row was expanded and is now collapsed.
    Collapsed,
    /// The row was expanded from cached children.
    Expanded,
    /// Children must be fetched for `parent`; report back with
    /// [`ExpansionState::finish_fetch`].
    Fetch {
        ticket: FetchTicket<R::Id>,
        parent: R,
    },
}

/// Expand/collapse and child-loading state for hierarchical rows.
#[derive(Debug, Clone)]
pub struct ExpansionState<R: GridRow> {
    /// Flat node store.
    nodes: Vec<RowNode<R>>,
    /// Id → position in `nodes`.
    index: HashMap<R::Id, usize>,
    /// Id → level, fixed on insertion.
    levels: HashMap<R::Id, usize>,
    /// Rows whose children are displayed.
    opened: HashSet<R::Id>,
    /// Rows whose children were fetched at least once.
    loaded: HashSet<R::Id>,
    generation: u64,
}

impl<R: GridRow> Default for ExpansionState<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: GridRow> ExpansionState<R> {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            index: HashMap::new(),
            levels: HashMap::new(),
            opened: HashSet::new(),
            loaded: HashSet::new(),
            generation: 0,
        }
    }

    /// Create a tree with initial top-level rows.
    pub fn with_rows(rows: impl IntoIterator<Item = R>) -> Self {
        let mut tree = Self::new();
        tree.extend_roots(rows);
        tree
    }

    // -------------------------------------------------------------------------
    // Node store
    // -------------------------------------------------------------------------

    /// Replace all rows, dropping cached children and expand state.
    ///
    /// Child fetches started before the reset are discarded when they finish.
    pub fn reset(&mut self, rows: impl IntoIterator<Item = R>) {
        self.nodes.clear();
        self.index.clear();
        self.levels.clear();
        self.opened.clear();
        self.loaded.clear();
        self.generation += 1;
        self.extend_roots(rows);
    }

    /// Add top-level rows. Rows already in the tree keep their level.
    pub fn extend_roots(&mut self, rows: impl IntoIterator<Item = R>) {
        for row in rows {
            self.insert(row, 0);
        }
    }

    fn insert(&mut self, row: R, level: usize) {
        let id = row.id();
        if let Some(node) = self.index.get(&id).and_then(|&i| self.nodes.get_mut(i)) {
            node.child_ids = row.child_ids().to_vec();
            node.data = row;
            return;
        }
        self.index.insert(id.clone(), self.nodes.len());
        self.levels.insert(id, level);
        self.nodes.push(RowNode::new(row, level));
    }

    /// Number of rows in the store, collapsed children included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the tree has no rows.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get a node by id.
    pub fn node(&self, id: &R::Id) -> Option<&RowNode<R>> {
        self.index.get(id).and_then(|&i| self.nodes.get(i))
    }

    fn node_mut(&mut self, id: &R::Id) -> Option<&mut RowNode<R>> {
        self.index.get(id).and_then(|&i| self.nodes.get_mut(i))
    }

    /// Depth of a row (0 = top level).
    pub fn level_of(&self, id: &R::Id) -> Option<usize> {
        self.levels.get(id).copied()
    }

    // -------------------------------------------------------------------------
    // Expand state
    // -------------------------------------------------------------------------

    /// Check if a row has children.
    pub fn has_children(&self, id: &R::Id) -> bool {
        self.node(id).is_some_and(RowNode::has_children)
    }

    /// Check if a row is expanded. Rows without children never are.
    pub fn is_opened(&self, id: &R::Id) -> bool {
        self.opened.contains(id) && self.has_children(id)
    }

    /// Check if a row's children were fetched.
    pub fn is_loaded(&self, id: &R::Id) -> bool {
        self.loaded.contains(id)
    }

    /// Check if a child fetch for a row is in flight.
    pub fn is_loading(&self, id: &R::Id) -> bool {
        self.node(id).is_some_and(|n| n.is_loading)
    }

    /// Which expand icon a row shows.
    pub fn expandable_status_for(&self, id: &R::Id) -> ExpandStatus {
        let Some(node) = self.node(id) else {
            return ExpandStatus::None;
        };
        if node.is_loading {
            ExpandStatus::Loading
        } else if !node.has_children() {
            ExpandStatus::None
        } else if self.opened.contains(id) {
            ExpandStatus::Collapse
        } else {
            ExpandStatus::Expand
        }
    }

    /// Collapse every row. Cached children are kept.
    pub fn collapse_all(&mut self) {
        self.opened.clear();
    }

    /// Expand every row whose children are already loaded.
    pub fn expand_all_loaded(&mut self) {
        let ids: Vec<R::Id> = self
            .loaded
            .iter()
            .filter(|id| self.has_children(id))
            .cloned()
            .collect();
        self.opened.extend(ids);
    }

    // -------------------------------------------------------------------------
    // Traversal
    // -------------------------------------------------------------------------

    /// Loaded children of a row, in child-id order.
    ///
    /// Child ids without a loaded row are skipped.
    pub fn children_of(&self, parent_id: &R::Id) -> Vec<&RowNode<R>> {
        self.node(parent_id)
            .map(|parent| {
                parent
                    .child_ids
                    .iter()
                    .filter_map(|id| self.node(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All visible rows: each top-level row followed by its expanded
    /// descendants in pre-order.
    pub fn visible_flattened_rows(&self) -> Vec<&RowNode<R>> {
        let mut out = Vec::new();
        let mut visited = HashSet::new();
        for root in self.nodes.iter().filter(|n| n.level == 0) {
            if visited.insert(&root.id) {
                out.push(root);
                self.collect_visible(&root.id, &mut visited, &mut out);
            }
        }
        out
    }

    /// Visible descendants of one row, in pre-order, without the row itself.
    pub fn visible_descendants(&self, id: &R::Id) -> Vec<&RowNode<R>> {
        let mut out = Vec::new();
        if let Some(node) = self.node(id) {
            let mut visited = HashSet::from([&node.id]);
            self.collect_visible(&node.id, &mut visited, &mut out);
        }
        out
    }

    /// Ids of [`visible_flattened_rows`](Self::visible_flattened_rows).
    pub fn visible_ids(&self) -> Vec<R::Id> {
        self.visible_flattened_rows()
            .into_iter()
            .map(|n| n.id.clone())
            .collect()
    }

    /// Recursively collect the opened subtree below `id`.
    ///
    /// `visited` cuts cycles and rows listed under two parents.
    fn collect_visible<'a>(
        &'a self,
        id: &R::Id,
        visited: &mut HashSet<&'a R::Id>,
        out: &mut Vec<&'a RowNode<R>>,
    ) {
        if !self.is_opened(id) {
            return;
        }
        for child in self.children_of(id) {
            if visited.insert(&child.id) {
                out.push(child);
                self.collect_visible(&child.id, visited, out);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Expand icon clicks
    // -------------------------------------------------------------------------

    /// Handle an expand icon click.
    ///
    /// Collapses an expanded row, expands a row with cached children, or
    /// marks the row loading and asks for a fetch. Clicks on a loading row
    /// are ignored.
    pub fn begin_toggle(&mut self, id: &R::Id) -> ToggleAction<R> {
        let Some(node) = self.node(id) else {
            return ToggleAction::Ignored;
        };
        if node.is_loading {
            log::debug!("[tree] {:?} is loading, ignoring toggle", id);
            return ToggleAction::Ignored;
        }
        if !node.has_children() {
            self.opened.remove(id);
            return ToggleAction::Ignored;
        }
        if self.opened.remove(id) {
            log::debug!("[tree] collapsed {:?}", id);
            return ToggleAction::Collapsed;
        }
        if self.loaded.contains(id) {
            self.opened.insert(id.clone());
            log::debug!("[tree] expanded {:?} from cache", id);
            return ToggleAction::Expanded;
        }

        let generation = self.generation;
        let Some(node) = self.node_mut(id) else {
            return ToggleAction::Ignored;
        };
        node.is_loading = true;
        log::debug!("[tree] fetching children of {:?}", id);
        ToggleAction::Fetch {
            ticket: FetchTicket {
                parent_id: id.clone(),
                generation,
            },
            parent: node.data.clone(),
        }
    }

    /// Merge the result of a child fetch. Returns the row's new status.
    ///
    /// On success the children are stored one level below the parent, the
    /// parent is marked loaded and expanded. On failure the parent goes
    /// back to collapsed and is not marked loaded, so the next click
    /// fetches again.
    pub fn finish_fetch(
        &mut self,
        ticket: FetchTicket<R::Id>,
        result: Result<Vec<R>, FetchError>,
    ) -> ExpandStatus {
        let id = ticket.parent_id;
        if ticket.generation != self.generation {
            log::debug!("[tree] dropping stale children of {:?}", id);
            return self.expandable_status_for(&id);
        }
        let Some(node) = self.node_mut(&id) else {
            return ExpandStatus::None;
        };
        node.is_loading = false;
        let level = node.level + 1;

        match result {
            Ok(children) => {
                log::debug!("[tree] loaded {} children of {:?}", children.len(), id);
                for child in children {
                    self.insert(child, level);
                }
                self.loaded.insert(id.clone());
                self.opened.insert(id.clone());
            }
            Err(e) => {
                log::error!("[tree] failed to load children of {:?}: {}", id, e);
            }
        }
        self.expandable_status_for(&id)
    }

    /// Handle an expand icon click, fetching children through `fetcher` when
    /// needed. Returns the row's new status.
    pub async fn toggle<F>(&mut self, id: &R::Id, fetcher: &F) -> ExpandStatus
    where
        F: ChildFetcher<R> + ?Sized,
    {
        if let ToggleAction::Fetch { ticket, parent } = self.begin_toggle(id) {
            let result = fetcher.fetch_children(&parent).await;
            return self.finish_fetch(ticket, result);
        }
        self.expandable_status_for(id)
    }
}
