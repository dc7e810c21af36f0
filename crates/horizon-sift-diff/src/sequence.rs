//! The keyed diff algorithm.
//!
//! [`diff`] compares two ordered sequences of [`Diffable`] items and returns
//! the change list that transforms the old sequence into the new one under
//! batch-update semantics: deletes and move sources address old positions,
//! inserts and move targets address new positions, and untouched items keep
//! their relative order.
//!
//! Identity is tracked by [`Diffable::diff_key`]; surviving keys are split
//! into stable items and moves by a longest increasing subsequence of their
//! old positions, which keeps the number of reported moves minimal.

use std::collections::{HashMap, HashSet};

use crate::change::{Change, Delete, Insert, Move, Replace};
use crate::Diffable;

/// Computes the change list between two sequences.
///
/// Keys must be unique within each input sequence. Duplicate keys are a
/// precondition violation: debug builds flag them and panic, release builds
/// produce an unspecified (but memory-safe) change list.
///
/// The result is ordered deletes-first (in old order) followed by the
/// per-position changes of the new sequence (in new order).
///
/// # Example
///
/// ```
/// use horizon_sift_diff::diff;
///
/// let changes = diff(&["a", "b", "c"], &["a", "c", "d"]);
///
/// let deleted: Vec<usize> = changes.iter().filter_map(|c| c.delete()).map(|d| d.index).collect();
/// let inserted: Vec<usize> = changes.iter().filter_map(|c| c.insert()).map(|i| i.index).collect();
/// assert_eq!(deleted, vec![1]); // "b" at old index 1
/// assert_eq!(inserted, vec![2]); // "d" at new index 2
/// ```
pub fn diff<T: Diffable + Clone>(old: &[T], new: &[T]) -> Vec<Change<T>> {
    debug_assert_unique_keys(old, "old");
    debug_assert_unique_keys(new, "new");

    let old_index_of: HashMap<T::Key, usize> = old
        .iter()
        .enumerate()
        .map(|(index, item)| (item.diff_key(), index))
        .collect();
    let new_keys: HashSet<T::Key> = new.iter().map(Diffable::diff_key).collect();

    let mut changes = Vec::new();

    for (index, item) in old.iter().enumerate() {
        if !new_keys.contains(&item.diff_key()) {
            changes.push(Change::Delete(Delete {
                item: item.clone(),
                index,
            }));
        }
    }

    // Old position of each surviving new item, in new order.
    let origins: Vec<Option<usize>> = new
        .iter()
        .map(|item| old_index_of.get(&item.diff_key()).copied())
        .collect();
    let survivors: Vec<usize> = origins.iter().filter_map(|origin| *origin).collect();
    let stable = stable_old_indices(&survivors);

    for (index, item) in new.iter().enumerate() {
        match origins[index] {
            None => changes.push(Change::Insert(Insert {
                item: item.clone(),
                index,
            })),
            Some(from_index) => {
                if !stable.contains(&from_index) {
                    changes.push(Change::Move(Move {
                        item: item.clone(),
                        from_index,
                        to_index: index,
                    }));
                }
                if !old[from_index].content_equal(item) {
                    changes.push(Change::Replace(Replace {
                        old_item: old[from_index].clone(),
                        new_item: item.clone(),
                        index,
                    }));
                }
            }
        }
    }

    changes
}

/// Returns the members of a longest increasing subsequence of `seq`,
/// tie-broken toward the earliest positions.
///
/// Items in the result keep their relative order across both sequences and
/// need no move operation; everything else gets relocated explicitly. When
/// several subsequences tie on length, the earliest items (in new order)
/// stay put, so a reorder like `[A, B] -> [B, A]` reports `A` as the move.
/// O(n log n); `seq` values are distinct by the unique-key precondition.
fn stable_old_indices(seq: &[usize]) -> HashSet<usize> {
    let n = seq.len();
    if n == 0 {
        return HashSet::new();
    }

    // ending[p]: length of the longest increasing run ending at p.
    // starting[p]: length of the longest increasing run starting at p,
    // obtained by scanning the reversed, negated sequence.
    let ending = increasing_run_lengths(seq.iter().map(|&value| value as i64));
    let reversed = increasing_run_lengths(seq.iter().rev().map(|&value| -(value as i64)));
    let starting = |position: usize| reversed[n - 1 - position];

    let length = ending.iter().copied().max().unwrap_or(0);

    // A position lies on some full-length subsequence exactly when the runs
    // through it add up to the full length. Walking left to right and taking
    // the first such position for each run length yields the earliest chain.
    let mut members = HashSet::with_capacity(length);
    let mut want = 1;
    let mut floor: Option<usize> = None;
    for position in 0..n {
        if want > length {
            break;
        }
        let on_longest = ending[position] + starting(position) - 1 == length;
        if on_longest
            && ending[position] == want
            && floor.is_none_or(|bound| seq[position] > bound)
        {
            members.insert(seq[position]);
            floor = Some(seq[position]);
            want += 1;
        }
    }
    members
}

/// For each element, the length of the longest strictly increasing
/// subsequence ending at that element. Patience-sorting tails, O(n log n).
fn increasing_run_lengths(values: impl Iterator<Item = i64>) -> Vec<usize> {
    let mut tails: Vec<i64> = Vec::new();
    let mut lengths = Vec::new();
    for value in values {
        let position = tails.partition_point(|&tail| tail < value);
        if position == tails.len() {
            tails.push(value);
        } else {
            tails[position] = value;
        }
        lengths.push(position + 1);
    }
    lengths
}

/// Flags duplicate keys in debug builds; see the precondition on [`diff`].
fn debug_assert_unique_keys<T: Diffable>(items: &[T], side: &'static str) {
    if cfg!(debug_assertions) {
        let mut seen = HashSet::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            if !seen.insert(item.diff_key()) {
                tracing::warn!(
                    target: "horizon_sift_diff",
                    side,
                    index,
                    "duplicate diff key; keys must be unique within a sequence"
                );
                debug_assert!(
                    false,
                    "duplicate diff key at {side}[{index}]; keys must be unique within a sequence"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    /// An item with identity distinct from content.
    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Row {
        id: u32,
        text: &'static str,
    }

    fn row(id: u32, text: &'static str) -> Row {
        Row { id, text }
    }

    impl Diffable for Row {
        type Key = u32;

        fn diff_key(&self) -> u32 {
            self.id
        }

        fn content_equal(&self, other: &Self) -> bool {
            self.text == other.text
        }
    }

    /// Replays a change list under batch semantics: remove deletes and move
    /// sources at old positions, place inserts and move targets at new
    /// positions, let stable items fill the remaining slots in order, then
    /// apply replaces at new positions.
    fn apply<T: Diffable + Clone>(old: &[T], changes: &[Change<T>]) -> Vec<T> {
        let removed: HashSet<usize> = changes
            .iter()
            .filter_map(|c| c.delete().map(|d| d.index))
            .chain(changes.iter().filter_map(|c| c.moved().map(|m| m.from_index)))
            .collect();
        let mut placed: BTreeMap<usize, T> = changes
            .iter()
            .filter_map(|c| c.insert().map(|i| (i.index, i.item.clone())))
            .chain(
                changes
                    .iter()
                    .filter_map(|c| c.moved().map(|m| (m.to_index, m.item.clone()))),
            )
            .collect();

        let mut stable = old
            .iter()
            .enumerate()
            .filter(|(index, _)| !removed.contains(index))
            .map(|(_, item)| item.clone());

        let total = old.len() - removed.len() + placed.len();
        let mut result: Vec<T> = (0..total)
            .map(|index| {
                placed
                    .remove(&index)
                    .unwrap_or_else(|| stable.next().expect("stable item for unplaced slot"))
            })
            .collect();

        for change in changes {
            if let Some(replace) = change.replace() {
                result[replace.index] = replace.new_item.clone();
            }
        }
        result
    }

    fn assert_round_trip(old: &[Row], new: &[Row]) {
        let changes = diff(old, new);
        assert_eq!(apply(old, &changes), new, "changes: {changes:?}");
    }

    #[test]
    fn test_identical_sequences_produce_no_changes() {
        let rows = vec![row(1, "a"), row(2, "b"), row(3, "c")];
        assert!(diff(&rows, &rows).is_empty());
    }

    #[test]
    fn test_empty_to_full_is_all_inserts() {
        let new = vec![row(1, "a"), row(2, "b")];
        let changes = diff(&[], &new);
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| c.insert().is_some()));
    }

    #[test]
    fn test_full_to_empty_is_all_deletes() {
        let old = vec![row(1, "a"), row(2, "b")];
        let changes = diff(&old, &[]);
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| c.delete().is_some()));
    }

    #[test]
    fn test_content_change_is_replace_at_new_index() {
        let old = vec![row(1, "a"), row(2, "b")];
        let new = vec![row(1, "a"), row(2, "B")];
        let changes = diff(&old, &new);
        assert_eq!(changes.len(), 1);
        let replace = changes[0].replace().expect("replace");
        assert_eq!(replace.index, 1);
        assert_eq!(replace.old_item.text, "b");
        assert_eq!(replace.new_item.text, "B");
    }

    #[test]
    fn test_swap_produces_single_move_of_later_item() {
        let old = vec![row(1, "a"), row(2, "b")];
        let new = vec![row(2, "b"), row(1, "a")];
        let changes = diff(&old, &new);
        let moves: Vec<&Move<Row>> = changes.iter().filter_map(|c| c.moved()).collect();
        assert_eq!(moves.len(), 1);
        // The item that comes first in the new order stays put; the other moves.
        assert_eq!(moves[0].item.id, 1);
        assert_eq!((moves[0].from_index, moves[0].to_index), (0, 1));
        assert_round_trip(&old, &new);
    }

    #[test]
    fn test_moved_item_with_changed_content_yields_move_and_replace() {
        let old = vec![row(1, "a"), row(2, "b"), row(3, "c")];
        let new = vec![row(3, "C"), row(1, "a"), row(2, "b")];
        let changes = diff(&old, &new);
        let mv = changes
            .iter()
            .filter_map(|c| c.moved())
            .find(|m| m.item.id == 3)
            .expect("move for id 3");
        assert_eq!((mv.from_index, mv.to_index), (2, 0));
        let replace = changes
            .iter()
            .filter_map(|c| c.replace())
            .find(|r| r.new_item.id == 3)
            .expect("replace for id 3");
        assert_eq!(replace.index, 0);
        assert_round_trip(&old, &new);
    }

    #[test]
    fn test_spec_scenario_head_drop_tail_append() {
        // [x, y] -> [y, z]: y retained, x removed, z appended.
        let old = vec![row(10, "x"), row(11, "y")];
        let new = vec![row(11, "y"), row(12, "z")];
        let changes = diff(&old, &new);

        let deletes: Vec<usize> = changes.iter().filter_map(|c| c.delete()).map(|d| d.index).collect();
        let inserts: Vec<usize> = changes.iter().filter_map(|c| c.insert()).map(|i| i.index).collect();
        assert_eq!(deletes, vec![0]);
        assert_eq!(inserts, vec![1]);
        assert!(changes.iter().all(|c| c.moved().is_none()));
        assert_round_trip(&old, &new);
    }

    #[test]
    fn test_round_trip_mixed_edits() {
        let old = vec![row(1, "a"), row(2, "b"), row(3, "c"), row(4, "d")];
        let cases: Vec<Vec<Row>> = vec![
            vec![row(4, "d"), row(2, "b"), row(5, "e")],
            vec![row(3, "c"), row(2, "b"), row(1, "a")],
            vec![row(2, "B"), row(4, "d"), row(1, "a"), row(6, "f")],
            vec![row(5, "e")],
            vec![],
        ];
        for new in &cases {
            assert_round_trip(&old, new);
        }
    }

    #[test]
    fn test_insert_at_front_shifts_without_moves() {
        let old = vec![row(1, "a"), row(2, "b")];
        let new = vec![row(9, "z"), row(1, "a"), row(2, "b")];
        let changes = diff(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].insert().expect("insert").index, 0);
    }

    #[test]
    #[should_panic(expected = "duplicate diff key")]
    fn test_duplicate_keys_flagged_in_debug() {
        let old = vec![row(1, "a"), row(1, "b")];
        let _ = diff(&old, &[]);
    }
}
