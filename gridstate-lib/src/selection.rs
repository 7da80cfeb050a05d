//! Row selection state.
//!
//! Selection is tracked by row id, so it survives rows being fetched,
//! purged and re-fetched. Besides the explicit id set there is an
//! "all records" mode, which selects every row of the logical dataset,
//! including rows that were never fetched. In that mode the id set records
//! exclusions instead of inclusions.

use std::collections::HashSet;
use std::hash::Hash;

/// Ids in insertion order with O(1) membership.
#[derive(Debug, Clone)]
struct IdSet<K: Clone + Eq + Hash> {
    order: Vec<K>,
    members: HashSet<K>,
}

impl<K: Clone + Eq + Hash> IdSet<K> {
    fn new() -> Self {
        Self {
            order: Vec::new(),
            members: HashSet::new(),
        }
    }

    fn contains(&self, id: &K) -> bool {
        self.members.contains(id)
    }

    fn len(&self) -> usize {
        self.order.len()
    }

    fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn insert(&mut self, id: K) -> bool {
        if self.members.insert(id.clone()) {
            self.order.push(id);
            true
        } else {
            false
        }
    }

    fn remove_all(&mut self, ids: &HashSet<K>) -> bool {
        let before = self.order.len();
        self.order.retain(|id| !ids.contains(id));
        self.members.retain(|id| !ids.contains(id));
        before != self.order.len()
    }

    fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }

    fn to_vec(&self) -> Vec<K> {
        self.order.clone()
    }
}

/// Starting point of shift-click ranges.
#[derive(Debug, Clone)]
struct Anchor<K> {
    /// Row of the last plain click.
    id: K,
    /// Checked state that click produced.
    checked: bool,
    /// Target of the previous range from this anchor.
    last_target: Option<K>,
}

/// Tri-state value of the header checkbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderCheckState {
    Unchecked,
    Checked,
    Indeterminate,
}

/// Prompt shown above the grid while selecting over paged data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllRecordsBanner {
    /// Every loaded row is selected and more records exist: offer to select
    /// all of them.
    Offer { selected: usize, total: usize },
    /// All-records mode is active.
    AllSelected { total: usize },
}

/// ID-based selection state with shift-range and all-records support.
///
/// # Example
///
/// ```
/// use gridstate_lib::selection::SelectionState;
///
/// let ordered = ["a", "b", "c", "d", "e"];
/// let mut selection = SelectionState::new();
///
/// selection.toggle_one("a");
/// selection.shift_click(&ordered, &"d");
/// assert_eq!(selection.selected_ids(), vec!["a", "b", "c", "d"]);
///
/// selection.shift_click(&ordered, &"b");
/// assert_eq!(selection.selected_ids(), vec!["a", "b"]);
/// ```
#[derive(Debug, Clone)]
pub struct SelectionState<K: Clone + Eq + Hash> {
    /// Selected ids, or excluded ids in all-records mode.
    ids: IdSet<K>,
    all_records: bool,
    anchor: Option<Anchor<K>>,
}

impl<K: Clone + Eq + Hash> Default for SelectionState<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone + Eq + Hash> SelectionState<K> {
    /// Create a new empty selection.
    pub fn new() -> Self {
        Self {
            ids: IdSet::new(),
            all_records: false,
            anchor: None,
        }
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Check if an id is selected.
    ///
    /// In all-records mode every id not explicitly excluded is selected,
    /// including ids of rows that have not been fetched yet.
    pub fn is_selected(&self, id: &K) -> bool {
        if self.all_records {
            !self.ids.contains(id)
        } else {
            self.ids.contains(id)
        }
    }

    /// Check if nothing is selected.
    pub fn is_empty(&self) -> bool {
        !self.all_records && self.ids.is_empty()
    }

    /// Number of explicitly selected ids (zero in all-records mode).
    pub fn len(&self) -> usize {
        if self.all_records { 0 } else { self.ids.len() }
    }

    /// Number of selected rows in a dataset of `total_rows` rows.
    pub fn count(&self, total_rows: usize) -> usize {
        if self.all_records {
            total_rows.saturating_sub(self.ids.len())
        } else {
            self.ids.len()
        }
    }

    /// Explicitly selected ids in selection order (empty in all-records mode).
    pub fn selected_ids(&self) -> Vec<K> {
        if self.all_records {
            Vec::new()
        } else {
            self.ids.to_vec()
        }
    }

    /// Ids deselected while in all-records mode.
    pub fn excluded_ids(&self) -> Vec<K> {
        if self.all_records {
            self.ids.to_vec()
        } else {
            Vec::new()
        }
    }

    /// Check if all-records mode is active.
    pub fn is_all_records_mode(&self) -> bool {
        self.all_records
    }

    /// Get the range anchor and the checked state it was clicked to.
    pub fn anchor(&self) -> Option<(&K, bool)> {
        self.anchor.as_ref().map(|a| (&a.id, a.checked))
    }

    // -------------------------------------------------------------------------
    // Single rows
    // -------------------------------------------------------------------------

    /// Flip the selection of one id (plain click). Returns the new state.
    ///
    /// The id becomes the anchor for following shift-clicks.
    pub fn toggle_one(&mut self, id: K) -> bool {
        let checked = !self.is_selected(&id);
        self.set_checked(id, checked);
        checked
    }

    /// Set the selection of one id (plain checkbox click).
    ///
    /// The id becomes the anchor for following shift-clicks.
    pub fn set_checked(&mut self, id: K, checked: bool) {
        self.change(checked, [id.clone()]);
        self.anchor = Some(Anchor {
            id,
            checked,
            last_target: None,
        });
    }

    /// Select or deselect many ids without touching the anchor.
    ///
    /// Returns `true` if the selection changed.
    pub fn change(&mut self, checked: bool, ids: impl IntoIterator<Item = K>) -> bool {
        // In all-records mode the set holds exclusions, so the meaning flips.
        let insert = checked != self.all_records;
        if insert {
            ids.into_iter()
                .fold(false, |changed, id| self.ids.insert(id) || changed)
        } else {
            let ids: HashSet<K> = ids.into_iter().collect();
            !ids.is_empty() && self.ids.remove_all(&ids)
        }
    }

    // -------------------------------------------------------------------------
    // Ranges
    // -------------------------------------------------------------------------

    /// Apply `checked` to every id between `anchor` and `target` inclusive.
    ///
    /// Positions come from `ordered_ids`. When the previous range from the
    /// same anchor reached further than the new one, the ids it no longer
    /// covers are set to `!checked`. The anchor stays in place until the next
    /// plain click.
    ///
    /// A target equal to the anchor is a one-row range: the anchor keeps
    /// `checked` and the previous range shrinks back to it. Ids missing from
    /// `ordered_ids` are a no-op. Returns `true` if the range was applied.
    pub fn range_select(&mut self, ordered_ids: &[K], anchor: &K, target: &K, checked: bool) -> bool {
        let position = |id: &K| ordered_ids.iter().position(|x| x == id);
        let (Some(from), Some(to)) = (position(anchor), position(target)) else {
            return false;
        };
        let (start, end) = (from.min(to), from.max(to));

        let previous = self
            .anchor
            .as_ref()
            .filter(|a| &a.id == anchor)
            .and_then(|a| a.last_target.as_ref())
            .and_then(position);

        self.change(checked, ordered_ids[start..=end].iter().cloned());
        match previous {
            Some(prev) if prev > end => {
                self.change(!checked, ordered_ids[end + 1..=prev].iter().cloned());
            }
            Some(prev) if prev < start => {
                self.change(!checked, ordered_ids[prev..start].iter().cloned());
            }
            _ => {}
        }

        self.anchor = Some(Anchor {
            id: anchor.clone(),
            checked,
            last_target: Some(target.clone()),
        });
        true
    }

    /// Range-select from the stored anchor to `target` (shift-click).
    ///
    /// Uses the checked state of the last plain click. Returns `false` when
    /// there is no anchor or the range could not be applied.
    pub fn shift_click(&mut self, ordered_ids: &[K], target: &K) -> bool {
        let Some((anchor, checked)) = self.anchor.as_ref().map(|a| (a.id.clone(), a.checked)) else {
            return false;
        };
        self.range_select(ordered_ids, &anchor, target, checked)
    }

    // -------------------------------------------------------------------------
    // Bulk
    // -------------------------------------------------------------------------

    /// Header checkbox toggle.
    ///
    /// From an empty selection, selects exactly `visible_ids`. From any other
    /// state (partial, full or all-records) clears to empty. Returns `true`
    /// if rows are selected afterwards.
    pub fn toggle_all_visible(&mut self, visible_ids: &[K]) -> bool {
        if self.is_empty() {
            self.anchor = None;
            self.change(true, visible_ids.iter().cloned());
        } else {
            self.clear();
        }
        !self.is_empty()
    }

    /// Replace the selection with exactly `ids`, leaving all-records mode.
    pub fn set_selected(&mut self, ids: impl IntoIterator<Item = K>) {
        self.clear();
        self.change(true, ids);
    }

    /// Clear all selection, leaving all-records mode.
    pub fn clear(&mut self) {
        self.ids.clear();
        self.all_records = false;
        self.anchor = None;
    }

    /// Select every record of the dataset, fetched or not.
    pub fn enter_all_records_mode(&mut self) {
        self.clear();
        self.all_records = true;
    }

    /// Leave all-records mode with nothing selected.
    pub fn exit_all_records_mode(&mut self) {
        self.clear();
    }

    // -------------------------------------------------------------------------
    // Derived view state
    // -------------------------------------------------------------------------

    /// Value of the header checkbox over the displayed rows.
    ///
    /// Only ids in `displayed_ids` count, so ids selected on rows that are
    /// no longer shown do not check the header.
    pub fn header_state(&self, displayed_ids: &[K]) -> HeaderCheckState {
        if self.all_records && self.ids.is_empty() {
            return HeaderCheckState::Checked;
        }
        let selected = displayed_ids.iter().filter(|id| self.is_selected(id)).count();
        match selected {
            0 if !self.all_records => HeaderCheckState::Unchecked,
            n if n == displayed_ids.len() && !self.all_records => HeaderCheckState::Checked,
            _ => HeaderCheckState::Indeterminate,
        }
    }

    /// The "select all records" banner for the currently loaded rows.
    pub fn all_records_banner(&self, loaded_ids: &[K], total_records: usize) -> Option<AllRecordsBanner> {
        if loaded_ids.is_empty() {
            return None;
        }
        if self.all_records {
            return Some(AllRecordsBanner::AllSelected {
                total: self.count(total_records),
            });
        }
        let selected = loaded_ids.iter().filter(|id| self.is_selected(id)).count();
        if selected < loaded_ids.len() || total_records <= loaded_ids.len() {
            return None;
        }
        Some(AllRecordsBanner::Offer {
            selected,
            total: total_records,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORDERED: [&str; 5] = ["a", "b", "c", "d", "e"];

    fn sorted(mut ids: Vec<&'static str>) -> Vec<&'static str> {
        ids.sort();
        ids
    }

    #[test]
    fn test_toggle_one_twice_restores() {
        let mut selection = SelectionState::new();
        selection.set_selected(["b", "c"]);

        assert!(selection.toggle_one("a"));
        assert!(!selection.toggle_one("a"));
        assert_eq!(selection.selected_ids(), vec!["b", "c"]);
    }

    #[test]
    fn test_toggle_all_from_empty_selects_visible() {
        let mut selection = SelectionState::new();
        assert!(selection.toggle_all_visible(&ORDERED));
        assert_eq!(selection.selected_ids(), ORDERED.to_vec());
    }

    #[test]
    fn test_toggle_all_from_partial_clears() {
        let mut selection = SelectionState::new();
        selection.toggle_one("c");

        assert!(!selection.toggle_all_visible(&ORDERED));
        assert!(selection.is_empty());
    }

    #[test]
    fn test_toggle_all_from_full_clears() {
        let mut selection = SelectionState::new();
        selection.set_selected(ORDERED);

        selection.toggle_all_visible(&ORDERED);
        assert!(selection.is_empty());
    }

    #[test]
    fn test_toggle_all_leaves_all_records_mode() {
        let mut selection = SelectionState::new();
        selection.enter_all_records_mode();

        selection.toggle_all_visible(&ORDERED);
        assert!(!selection.is_all_records_mode());
        assert!(!selection.is_selected(&"a"));
    }

    #[test]
    fn test_range_is_inclusive() {
        let mut selection = SelectionState::new();
        selection.toggle_one("a");

        assert!(selection.shift_click(&ORDERED, &"d"));
        assert_eq!(sorted(selection.selected_ids()), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_second_range_shrinks_forward_overshoot() {
        let mut selection = SelectionState::new();
        selection.toggle_one("a");
        selection.shift_click(&ORDERED, &"d");
        selection.shift_click(&ORDERED, &"b");

        assert_eq!(sorted(selection.selected_ids()), vec!["a", "b"]);
    }

    #[test]
    fn test_second_range_shrinks_backward_overshoot() {
        let mut selection = SelectionState::new();
        selection.toggle_one("c");
        selection.shift_click(&ORDERED, &"a");
        assert_eq!(sorted(selection.selected_ids()), vec!["a", "b", "c"]);

        selection.shift_click(&ORDERED, &"e");
        assert_eq!(sorted(selection.selected_ids()), vec!["c", "d", "e"]);
    }

    #[test]
    fn test_range_deselects_with_unchecked_anchor() {
        let mut selection = SelectionState::new();
        selection.set_selected(ORDERED);
        selection.set_checked("b", false);

        selection.shift_click(&ORDERED, &"d");
        assert_eq!(sorted(selection.selected_ids()), vec!["a", "e"]);
    }

    #[test]
    fn test_plain_click_resets_anchor() {
        let mut selection = SelectionState::new();
        selection.toggle_one("a");
        selection.shift_click(&ORDERED, &"c");
        selection.toggle_one("e");

        // New anchor e: the old range from a is not shrunk.
        selection.shift_click(&ORDERED, &"d");
        assert_eq!(sorted(selection.selected_ids()), vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_range_noops() {
        let mut selection = SelectionState::new();
        assert!(!selection.shift_click(&ORDERED, &"c"));

        assert!(!selection.range_select(&ORDERED, &"b", &"z", true));
        assert!(selection.is_empty());
    }

    #[test]
    fn test_shift_click_on_anchor_shrinks_to_anchor() {
        let mut selection = SelectionState::new();
        selection.toggle_one("a");
        selection.shift_click(&ORDERED, &"d");

        assert!(selection.shift_click(&ORDERED, &"a"));
        assert_eq!(selection.selected_ids(), vec!["a"]);
        assert_eq!(selection.anchor(), Some((&"a", true)));
    }

    #[test]
    fn test_all_records_selects_unseen_ids() {
        let mut selection = SelectionState::new();
        selection.toggle_one("a");
        selection.enter_all_records_mode();

        assert!(selection.is_selected(&"never-fetched"));
        assert!(selection.selected_ids().is_empty());
        assert_eq!(selection.count(100), 100);
    }

    #[test]
    fn test_all_records_tracks_exclusions() {
        let mut selection = SelectionState::new();
        selection.enter_all_records_mode();

        assert!(!selection.toggle_one("b"));
        assert!(!selection.is_selected(&"b"));
        assert!(selection.is_selected(&"c"));
        assert_eq!(selection.excluded_ids(), vec!["b"]);
        assert_eq!(selection.count(100), 99);

        assert!(selection.toggle_one("b"));
        assert!(selection.excluded_ids().is_empty());
    }

    #[test]
    fn test_exit_all_records_clears() {
        let mut selection = SelectionState::new();
        selection.enter_all_records_mode();
        selection.exit_all_records_mode();

        assert!(selection.is_empty());
        assert!(!selection.is_selected(&"a"));
    }

    #[test]
    fn test_header_state() {
        let mut selection = SelectionState::new();
        assert_eq!(selection.header_state(&ORDERED), HeaderCheckState::Unchecked);

        selection.toggle_one("a");
        assert_eq!(selection.header_state(&ORDERED), HeaderCheckState::Indeterminate);

        selection.set_selected(ORDERED);
        assert_eq!(selection.header_state(&ORDERED), HeaderCheckState::Checked);

        selection.enter_all_records_mode();
        assert_eq!(selection.header_state(&ORDERED), HeaderCheckState::Checked);
        selection.toggle_one("a");
        assert_eq!(selection.header_state(&ORDERED), HeaderCheckState::Indeterminate);
    }

    #[test]
    fn test_header_state_ignores_rows_not_displayed() {
        let mut selection = SelectionState::new();
        selection.set_selected(["x", "y", "z", "v", "w"]);
        assert_eq!(selection.header_state(&ORDERED), HeaderCheckState::Unchecked);

        selection.change(true, ["a", "b"]);
        assert_eq!(selection.header_state(&ORDERED), HeaderCheckState::Indeterminate);

        selection.change(true, ORDERED);
        assert_eq!(selection.header_state(&ORDERED), HeaderCheckState::Checked);
    }

    #[test]
    fn test_all_records_banner() {
        let mut selection = SelectionState::new();
        assert_eq!(selection.all_records_banner(&ORDERED, 40), None);
        assert_eq!(selection.all_records_banner(&[], 40), None);

        selection.set_selected(ORDERED);
        assert_eq!(
            selection.all_records_banner(&ORDERED, 40),
            Some(AllRecordsBanner::Offer {
                selected: 5,
                total: 40
            })
        );
        // Nothing more to select.
        assert_eq!(selection.all_records_banner(&ORDERED, 5), None);

        selection.enter_all_records_mode();
        assert_eq!(
            selection.all_records_banner(&ORDERED, 40),
            Some(AllRecordsBanner::AllSelected { total: 40 })
        );
    }
}
