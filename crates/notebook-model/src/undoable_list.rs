//! Transactional ordered collection with undo/redo.
//!
//! Every primitive mutation is captured as a change record. Outside an open
//! compound operation each primitive is its own one-step undo unit; inside
//! one, all primitives buffer into a single change-set that undoes and
//! redoes as a unit. Undo applies inverses in reverse recording order; redo
//! re-applies forward in the original order.
//!
//! Inverse restoration is by value (via [`Snapshot::from_record`]) for
//! removals, sets and wholesale replaces. Moves are the exception: moving
//! never destroys the element, so undoing a move relocates the same live
//! element instead of rebuilding it.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// An item that can snapshot itself to and from a plain data record.
pub trait Snapshot {
    type Record: Clone;

    fn to_record(&self) -> Self::Record;
    fn from_record(record: &Self::Record) -> Self;
}

/// Kind of change delivered on the event feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListChangeKind {
    Added,
    Removed,
    Moved,
    Set,
    Replaced,
    Undone,
    Redone,
}

/// Emitted after every primitive mutation and after each undo/redo unit.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ListEvent {
    pub kind: ListChangeKind,
    /// Length of the live sequence after the change.
    pub new_len: usize,
}

/// One recorded primitive mutation.
enum Change<R> {
    Added { index: usize, record: R },
    Removed { index: usize, record: R },
    Moved { from: usize, to: usize },
    Set { index: usize, old: R, new: R },
    Replaced { old: Vec<R>, new: Vec<R> },
}

/// A group of primitive changes undone/redone as one unit.
type ChangeSet<R> = Vec<Change<R>>;

/// Ordered sequence of `T` with undo/redo stacks and compound operations.
///
/// Index arguments out of range are programmer errors and panic, with one
/// documented exception: an `insert` position beyond the length appends.
pub struct UndoableList<T: Snapshot> {
    items: Vec<T>,
    undo_stack: Vec<ChangeSet<T::Record>>,
    redo_stack: Vec<ChangeSet<T::Record>>,
    /// Open compound buffer plus whether it lands in history on close.
    compound: Option<(ChangeSet<T::Record>, bool)>,
    event_txs: Vec<mpsc::UnboundedSender<ListEvent>>,
    dirty: Option<Arc<AtomicBool>>,
}

impl<T: Snapshot> Default for UndoableList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Snapshot> UndoableList<T> {
    pub fn new() -> Self {
        UndoableList {
            items: Vec::new(),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            compound: None,
            event_txs: Vec::new(),
            dirty: None,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// Mutable access for in-place content edits. Such edits do not enter
    /// undo history; structural changes must go through the primitives.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Receive a [`ListEvent`] after every change to the live sequence.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<ListEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.event_txs.push(tx);
        rx
    }

    /// Share a dirty flag that is raised on every mutation.
    pub fn set_dirty_flag(&mut self, flag: Arc<AtomicBool>) {
        self.dirty = Some(flag);
    }

    // ── Primitive mutations ─────────────────────────────────────────

    pub fn push_back(&mut self, item: T) {
        let index = self.items.len();
        let record = item.to_record();
        self.items.push(item);
        self.record(Change::Added { index, record });
        self.touch(ListChangeKind::Added);
    }

    /// Insert at `index`; a position beyond the length appends.
    pub fn insert(&mut self, index: usize, item: T) {
        let index = index.min(self.items.len());
        let record = item.to_record();
        self.items.insert(index, item);
        self.record(Change::Added { index, record });
        self.touch(ListChangeKind::Added);
    }

    /// Remove and return the item at `index`.
    ///
    /// Panics if `index` is out of range.
    pub fn remove_at(&mut self, index: usize) -> T {
        assert!(
            index < self.items.len(),
            "remove_at index {} out of range (len {})",
            index,
            self.items.len()
        );
        let item = self.items.remove(index);
        self.record(Change::Removed {
            index,
            record: item.to_record(),
        });
        self.touch(ListChangeKind::Removed);
        item
    }

    /// Remove the first item equal to `item`, returning its index.
    pub fn remove(&mut self, item: &T) -> Option<usize>
    where
        T: PartialEq,
    {
        let index = self.items.iter().position(|x| x == item)?;
        self.remove_at(index);
        Some(index)
    }

    /// Relocate the item at `from` to `to`. The element itself is moved,
    /// never recreated, so its identity is preserved.
    ///
    /// Panics if either index is out of range.
    pub fn move_item(&mut self, from: usize, to: usize) {
        let len = self.items.len();
        assert!(
            from < len && to < len,
            "move_item indices {}→{} out of range (len {})",
            from,
            to,
            len
        );
        if from == to {
            return;
        }
        let item = self.items.remove(from);
        self.items.insert(to, item);
        self.record(Change::Moved { from, to });
        self.touch(ListChangeKind::Moved);
    }

    /// Replace the item at `index`.
    ///
    /// Panics if `index` is out of range.
    pub fn set(&mut self, index: usize, item: T) {
        assert!(
            index < self.items.len(),
            "set index {} out of range (len {})",
            index,
            self.items.len()
        );
        let old = self.items[index].to_record();
        let new = item.to_record();
        self.items[index] = item;
        self.record(Change::Set { index, old, new });
        self.touch(ListChangeKind::Set);
    }

    /// Remove the items in `start..end` as one undo unit.
    ///
    /// Panics if the range is out of bounds.
    pub fn remove_range(&mut self, start: usize, end: usize) {
        assert!(
            start <= end && end <= self.items.len(),
            "remove_range {}..{} out of range (len {})",
            start,
            end,
            self.items.len()
        );
        let auto = self.compound.is_none();
        if auto {
            self.begin_compound(true);
        }
        for _ in start..end {
            self.remove_at(start);
        }
        if auto {
            self.end_compound();
        }
    }

    /// Swap out the entire contents as one change.
    pub fn replace_all(&mut self, items: Vec<T>) {
        let old = self.items.iter().map(Snapshot::to_record).collect();
        let new = items.iter().map(Snapshot::to_record).collect();
        self.items = items;
        self.record(Change::Replaced { old, new });
        self.touch(ListChangeKind::Replaced);
    }

    // ── Compound operations ─────────────────────────────────────────

    /// Open a compound operation: until [`end_compound`], all primitive
    /// mutations buffer into one change-set. With `undoable = false` the
    /// buffered changes still mutate the live sequence but are discarded
    /// from history on close.
    ///
    /// Nesting is not supported; panics if a compound operation is already
    /// open.
    ///
    /// [`end_compound`]: UndoableList::end_compound
    pub fn begin_compound(&mut self, undoable: bool) {
        assert!(
            self.compound.is_none(),
            "compound operation already open; nesting is not supported"
        );
        self.compound = Some((Vec::new(), undoable));
    }

    /// Close the open compound operation. Empty change-sets are discarded.
    ///
    /// Panics if no compound operation is open.
    pub fn end_compound(&mut self) {
        let (changes, undoable) = self
            .compound
            .take()
            .expect("end_compound without an open compound operation");
        if undoable && !changes.is_empty() {
            self.undo_stack.push(changes);
            self.redo_stack.clear();
        }
    }

    pub fn in_compound(&self) -> bool {
        self.compound.is_some()
    }

    // ── History ─────────────────────────────────────────────────────

    /// Revert the most recent change-set, applying inverses in reverse
    /// recording order. No-op when the undo stack is empty.
    ///
    /// Panics if a compound operation is open.
    pub fn undo(&mut self) {
        assert!(
            self.compound.is_none(),
            "cannot undo while a compound operation is open"
        );
        let Some(set) = self.undo_stack.pop() else {
            return;
        };
        for change in set.iter().rev() {
            self.apply_inverse(change);
        }
        self.redo_stack.push(set);
        self.touch(ListChangeKind::Undone);
    }

    /// Re-apply the most recently undone change-set in its original order.
    /// No-op when the redo stack is empty.
    ///
    /// Panics if a compound operation is open.
    pub fn redo(&mut self) {
        assert!(
            self.compound.is_none(),
            "cannot redo while a compound operation is open"
        );
        let Some(set) = self.redo_stack.pop() else {
            return;
        };
        for change in set.iter() {
            self.apply_forward(change);
        }
        self.undo_stack.push(set);
        self.touch(ListChangeKind::Redone);
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Empty both stacks without touching the live sequence. Used after an
    /// external reload so undo cannot revert a programmatic load.
    pub fn clear_undo(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    // ── Internals ───────────────────────────────────────────────────

    fn record(&mut self, change: Change<T::Record>) {
        if let Some((buffer, _)) = self.compound.as_mut() {
            buffer.push(change);
        } else {
            self.undo_stack.push(vec![change]);
            self.redo_stack.clear();
        }
    }

    fn apply_forward(&mut self, change: &Change<T::Record>) {
        match change {
            Change::Added { index, record } => {
                self.items.insert(*index, T::from_record(record));
            }
            Change::Removed { index, .. } => {
                self.items.remove(*index);
            }
            Change::Moved { from, to } => {
                let item = self.items.remove(*from);
                self.items.insert(*to, item);
            }
            Change::Set { index, new, .. } => {
                self.items[*index] = T::from_record(new);
            }
            Change::Replaced { new, .. } => {
                self.items = new.iter().map(T::from_record).collect();
            }
        }
    }

    fn apply_inverse(&mut self, change: &Change<T::Record>) {
        match change {
            Change::Added { index, .. } => {
                self.items.remove(*index);
            }
            Change::Removed { index, record } => {
                self.items.insert(*index, T::from_record(record));
            }
            Change::Moved { from, to } => {
                let item = self.items.remove(*to);
                self.items.insert(*from, item);
            }
            Change::Set { index, old, .. } => {
                self.items[*index] = T::from_record(old);
            }
            Change::Replaced { old, .. } => {
                self.items = old.iter().map(T::from_record).collect();
            }
        }
    }

    fn touch(&mut self, kind: ListChangeKind) {
        if let Some(flag) = &self.dirty {
            flag.store(true, Ordering::Relaxed);
        }
        let event = ListEvent {
            kind,
            new_len: self.items.len(),
        };
        self.event_txs.retain(|tx| tx.send(event).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test item whose record drops the `touched` flag, making the
    /// by-value vs by-identity restore paths observable.
    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        value: i32,
        touched: bool,
    }

    impl Item {
        fn new(value: i32) -> Self {
            Item {
                value,
                touched: false,
            }
        }
    }

    impl Snapshot for Item {
        type Record = i32;

        fn to_record(&self) -> i32 {
            self.value
        }

        fn from_record(record: &i32) -> Self {
            Item::new(*record)
        }
    }

    fn list_of(values: &[i32]) -> UndoableList<Item> {
        let mut list = UndoableList::new();
        for &v in values {
            list.push_back(Item::new(v));
        }
        list.clear_undo();
        list
    }

    fn values(list: &UndoableList<Item>) -> Vec<i32> {
        list.iter().map(|item| item.value).collect()
    }

    #[test]
    fn test_new_list_is_empty() {
        let list: UndoableList<Item> = UndoableList::new();
        assert!(list.is_empty());
        assert!(!list.can_undo());
        assert!(!list.can_redo());
    }

    #[test]
    fn test_push_back_appends() {
        let mut list = UndoableList::new();
        list.push_back(Item::new(1));
        list.push_back(Item::new(2));
        assert_eq!(values(&list), vec![1, 2]);
    }

    #[test]
    fn test_insert_at_index() {
        let mut list = list_of(&[1, 3]);
        list.insert(1, Item::new(2));
        assert_eq!(values(&list), vec![1, 2, 3]);
    }

    #[test]
    fn test_insert_beyond_length_appends() {
        let mut list = list_of(&[1]);
        list.insert(99, Item::new(2));
        assert_eq!(values(&list), vec![1, 2]);
    }

    #[test]
    fn test_remove_at_returns_item() {
        let mut list = list_of(&[1, 2, 3]);
        let removed = list.remove_at(1);
        assert_eq!(removed.value, 2);
        assert_eq!(values(&list), vec![1, 3]);
    }

    #[test]
    fn test_remove_by_equality() {
        let mut list = list_of(&[1, 2, 3]);
        assert_eq!(list.remove(&Item::new(2)), Some(1));
        assert_eq!(list.remove(&Item::new(9)), None);
        assert_eq!(values(&list), vec![1, 3]);
    }

    #[test]
    fn test_move_item_reorders_both_directions() {
        let mut list = list_of(&[1, 2, 3, 4]);
        list.move_item(0, 2);
        assert_eq!(values(&list), vec![2, 3, 1, 4]);
        list.move_item(3, 1);
        assert_eq!(values(&list), vec![2, 4, 3, 1]);
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut list = list_of(&[1, 2, 3]);
        list.set(1, Item::new(9));
        assert_eq!(values(&list), vec![1, 9, 3]);
    }

    #[test]
    fn test_remove_range_is_one_undo_unit() {
        let mut list = list_of(&[1, 2, 3, 4]);
        list.remove_range(1, 3);
        assert_eq!(values(&list), vec![1, 4]);
        list.undo();
        assert_eq!(values(&list), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_replace_all_swaps_contents_and_undoes() {
        let mut list = list_of(&[1, 2]);
        list.replace_all(vec![Item::new(7), Item::new(8), Item::new(9)]);
        assert_eq!(values(&list), vec![7, 8, 9]);
        list.undo();
        assert_eq!(values(&list), vec![1, 2]);
        list.redo();
        assert_eq!(values(&list), vec![7, 8, 9]);
    }

    #[test]
    fn test_each_primitive_is_its_own_undo_unit() {
        let mut list = UndoableList::new();
        list.push_back(Item::new(1));
        list.push_back(Item::new(2));
        list.push_back(Item::new(3));

        list.undo();
        assert_eq!(values(&list), vec![1, 2]);
        list.undo();
        assert_eq!(values(&list), vec![1]);
        list.undo();
        assert!(list.is_empty());
    }

    #[test]
    fn test_compound_groups_mutations_into_one_unit() {
        // Seed one item, then push two as one compound operation.
        let mut list = list_of(&[0]);
        list.begin_compound(true);
        list.push_back(Item::new(1));
        list.push_back(Item::new(2));
        list.end_compound();
        assert_eq!(values(&list), vec![0, 1, 2]);

        list.undo();
        assert_eq!(values(&list), vec![0]);

        list.redo();
        assert_eq!(values(&list), vec![0, 1, 2]);
    }

    #[test]
    fn test_compound_undo_restores_exact_order() {
        let mut list = list_of(&[1, 2, 3]);
        list.begin_compound(true);
        list.set(0, Item::new(9));
        list.move_item(2, 0);
        list.remove_at(1);
        list.push_back(Item::new(5));
        list.end_compound();

        list.undo();
        assert_eq!(values(&list), vec![1, 2, 3]);
    }

    #[test]
    fn test_redo_after_undo_restores_post_mutation_state() {
        let mut list = list_of(&[1, 2, 3]);
        list.begin_compound(true);
        list.move_item(0, 2);
        list.remove_at(0);
        list.end_compound();
        let after = values(&list);

        list.undo();
        list.redo();
        assert_eq!(values(&list), after);
    }

    #[test]
    fn test_new_mutation_clears_redo() {
        let mut list = list_of(&[1]);
        list.push_back(Item::new(2));
        list.undo();
        assert!(list.can_redo());

        list.push_back(Item::new(3));
        assert!(!list.can_redo());
        list.redo();
        assert_eq!(values(&list), vec![1, 3]);
    }

    #[test]
    fn test_undo_on_empty_history_is_noop() {
        let mut list = list_of(&[1]);
        list.undo();
        assert_eq!(values(&list), vec![1]);
    }

    #[test]
    fn test_redo_on_empty_stack_is_noop() {
        let mut list = list_of(&[1]);
        list.redo();
        assert_eq!(values(&list), vec![1]);
    }

    #[test]
    fn test_empty_compound_is_discarded() {
        let mut list = list_of(&[1]);
        list.push_back(Item::new(2));
        list.begin_compound(true);
        list.end_compound();

        // The only undo unit left is the push.
        list.undo();
        assert_eq!(values(&list), vec![1]);
        assert!(!list.can_undo());
    }

    #[test]
    fn test_non_undoable_compound_mutates_but_skips_history() {
        let mut list = list_of(&[1]);
        list.begin_compound(false);
        list.push_back(Item::new(2));
        list.end_compound();

        assert_eq!(values(&list), vec![1, 2]);
        assert!(!list.can_undo());
    }

    #[test]
    fn test_non_undoable_compound_preserves_redo_stack() {
        let mut list = list_of(&[1]);
        list.push_back(Item::new(2));
        list.undo();
        assert!(list.can_redo());

        list.begin_compound(false);
        list.push_back(Item::new(3));
        list.end_compound();

        assert!(list.can_redo());
    }

    #[test]
    #[should_panic(expected = "nesting is not supported")]
    fn test_nested_begin_compound_panics() {
        let mut list: UndoableList<Item> = UndoableList::new();
        list.begin_compound(true);
        list.begin_compound(true);
    }

    #[test]
    #[should_panic(expected = "end_compound without an open compound")]
    fn test_end_compound_without_begin_panics() {
        let mut list: UndoableList<Item> = UndoableList::new();
        list.end_compound();
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_remove_at_out_of_range_panics() {
        let mut list = list_of(&[1]);
        list.remove_at(1);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_set_out_of_range_panics() {
        let mut list = list_of(&[1]);
        list.set(5, Item::new(9));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_move_item_out_of_range_panics() {
        let mut list = list_of(&[1, 2]);
        list.move_item(0, 2);
    }

    #[test]
    fn test_move_undo_preserves_identity() {
        let mut list = list_of(&[1, 2, 3]);
        list.get_mut(0).unwrap().touched = true;

        list.move_item(0, 2);
        list.undo();

        // The element came back by relocation, not reconstruction.
        assert_eq!(values(&list), vec![1, 2, 3]);
        assert!(list.get(0).unwrap().touched);
    }

    #[test]
    fn test_remove_undo_restores_by_value() {
        let mut list = list_of(&[1, 2]);
        list.get_mut(0).unwrap().touched = true;

        list.remove_at(0);
        list.undo();

        // Reconstructed from its record: unserialized state is gone.
        assert_eq!(values(&list), vec![1, 2]);
        assert!(!list.get(0).unwrap().touched);
    }

    #[test]
    fn test_set_undo_restores_by_value() {
        let mut list = list_of(&[1]);
        list.get_mut(0).unwrap().touched = true;

        list.set(0, Item::new(9));
        list.undo();

        assert_eq!(values(&list), vec![1]);
        assert!(!list.get(0).unwrap().touched);
    }

    #[test]
    fn test_clear_undo_empties_stacks_and_keeps_items() {
        let mut list = list_of(&[1]);
        list.push_back(Item::new(2));
        list.undo();
        list.clear_undo();

        assert!(!list.can_undo());
        assert!(!list.can_redo());
        assert_eq!(values(&list), vec![1]);
    }

    #[test]
    fn test_subscribe_receives_events_with_lengths() {
        let mut list = list_of(&[1]);
        let mut rx = list.subscribe();

        list.push_back(Item::new(2));
        list.remove_at(0);
        list.undo();

        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, ListChangeKind::Added);
        assert_eq!(event.new_len, 2);

        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, ListChangeKind::Removed);
        assert_eq!(event.new_len, 1);

        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, ListChangeKind::Undone);
        assert_eq!(event.new_len, 2);

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dirty_flag_raised_on_mutation_and_undo() {
        let mut list = list_of(&[1]);
        let dirty = Arc::new(AtomicBool::new(false));
        list.set_dirty_flag(Arc::clone(&dirty));

        list.push_back(Item::new(2));
        assert!(dirty.load(Ordering::Relaxed));

        dirty.store(false, Ordering::Relaxed);
        list.undo();
        assert!(dirty.load(Ordering::Relaxed));
    }
}
