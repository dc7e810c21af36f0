//! Change descriptions produced by the sequence diff.
//!
//! A diff is reported as a flat list of [`Change`] values. Each variant
//! carries the affected item(s) so consumers can render or log the change
//! without re-indexing into the source sequences.
//!
//! # Index Coordinates
//!
//! Indices are not all in the same coordinate space:
//!
//! - [`Delete::index`] and [`Move::from_index`] address the **old** sequence
//! - [`Insert::index`], [`Replace::index`], and [`Move::to_index`] address
//!   the **new** sequence
//!
//! This matches standard batch-update semantics: removals are issued against
//! pre-update positions, placements against post-update positions.

/// An item that exists only in the new sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insert<T> {
    /// The inserted item.
    pub item: T,
    /// Position of the item in the new sequence.
    pub index: usize,
}

/// An item that exists only in the old sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delete<T> {
    /// The removed item.
    pub item: T,
    /// Position of the item in the old sequence.
    pub index: usize,
}

/// An item whose identity survived but whose content changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replace<T> {
    /// The item as it appeared in the old sequence.
    pub old_item: T,
    /// The item as it appears in the new sequence.
    pub new_item: T,
    /// Position of the item in the new sequence.
    pub index: usize,
}

/// An item whose identity survived but whose position changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Move<T> {
    /// The moved item (new-sequence content).
    pub item: T,
    /// Position of the item in the old sequence.
    pub from_index: usize,
    /// Position of the item in the new sequence.
    pub to_index: usize,
}

/// A single edit in the minimal change list between two sequences.
///
/// Produced by [`diff`](crate::diff). An item that both moves and changes
/// content yields a [`Change::Move`] *and* a [`Change::Replace`]; all other
/// variants are mutually exclusive per item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change<T> {
    /// Item added to the new sequence.
    Insert(Insert<T>),
    /// Item removed from the old sequence.
    Delete(Delete<T>),
    /// Item content changed in place.
    Replace(Replace<T>),
    /// Item relocated within the sequence.
    Move(Move<T>),
}

impl<T> Change<T> {
    /// Returns the insert payload, if this change is an insert.
    pub fn insert(&self) -> Option<&Insert<T>> {
        match self {
            Self::Insert(insert) => Some(insert),
            _ => None,
        }
    }

    /// Returns the delete payload, if this change is a delete.
    pub fn delete(&self) -> Option<&Delete<T>> {
        match self {
            Self::Delete(delete) => Some(delete),
            _ => None,
        }
    }

    /// Returns the replace payload, if this change is a replace.
    pub fn replace(&self) -> Option<&Replace<T>> {
        match self {
            Self::Replace(replace) => Some(replace),
            _ => None,
        }
    }

    /// Returns the move payload, if this change is a move.
    ///
    /// Named `moved` because `move` is a keyword.
    pub fn moved(&self) -> Option<&Move<T>> {
        match self {
            Self::Move(mv) => Some(mv),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors_match_variants() {
        let change: Change<i32> = Change::Insert(Insert { item: 7, index: 0 });
        assert!(change.insert().is_some());
        assert!(change.delete().is_none());
        assert!(change.replace().is_none());
        assert!(change.moved().is_none());

        let change: Change<i32> = Change::Move(Move {
            item: 7,
            from_index: 2,
            to_index: 0,
        });
        let mv = change.moved().expect("move payload");
        assert_eq!(mv.from_index, 2);
        assert_eq!(mv.to_index, 0);
    }
}
