//! Keyed sequence diffing for Horizon Sift.
//!
//! This crate computes the minimal set of insert/delete/replace/move
//! operations between two ordered sequences of identifiable items. It is the
//! flat primitive underneath the sectioned translation in `horizon-sift`:
//!
//! - **Identity** decides whether an item survived between the two sequences
//!   ([`Diffable::diff_key`])
//! - **Content equality** decides whether a surviving item needs a replace
//!   ([`Diffable::content_equal`])
//! - **Position** of surviving items decides moves, minimized via a longest
//!   increasing subsequence
//!
//! # Example
//!
//! ```
//! use horizon_sift_diff::{diff, Change};
//!
//! let old = vec!["apple", "banana", "cherry"];
//! let new = vec!["banana", "cherry", "date"];
//!
//! for change in diff(&old, &new) {
//!     match change {
//!         Change::Delete(d) => println!("- {} (old index {})", d.item, d.index),
//!         Change::Insert(i) => println!("+ {} (new index {})", i.item, i.index),
//!         Change::Replace(r) => println!("~ {} (index {})", r.new_item, r.index),
//!         Change::Move(m) => println!("> {} ({} -> {})", m.item, m.from_index, m.to_index),
//!     }
//! }
//! ```
//!
//! # Precondition
//!
//! Keys must be unique within each input sequence. Debug builds validate
//! this and flag violations; release builds do not pay for the check and
//! produce an unspecified (memory-safe) change list on violation.

use std::hash::Hash;

mod change;
mod sequence;

pub use change::{Change, Delete, Insert, Move, Replace};
pub use sequence::diff;

/// An item that can participate in keyed diffing.
///
/// Two aspects of an item are compared independently:
///
/// - the **key** tracks identity across sequence versions; an item is
///   considered present in both sequences when its key occurs in both
/// - **content equality** detects in-place edits of a surviving item
///
/// Types whose value *is* their identity (strings, integers, ...) have
/// blanket-style impls below where both aspects coincide.
pub trait Diffable {
    /// The identity key type. Must be stable for the lifetime of the item.
    type Key: Hash + Eq;

    /// Returns the identity key for this item.
    fn diff_key(&self) -> Self::Key;

    /// Returns `true` when two items with the same key have equal content.
    fn content_equal(&self, other: &Self) -> bool;
}

/// Implements [`Diffable`] for value-like types that are their own key.
macro_rules! impl_diffable_for_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Diffable for $ty {
                type Key = $ty;

                fn diff_key(&self) -> Self::Key {
                    self.clone()
                }

                fn content_equal(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

impl_diffable_for_value!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, bool, char, String
);

impl<'a> Diffable for &'a str {
    type Key = &'a str;

    fn diff_key(&self) -> Self::Key {
        *self
    }

    fn content_equal(&self, other: &Self) -> bool {
        self == other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_types_are_their_own_key() {
        assert_eq!(42u32.diff_key(), 42);
        assert_eq!("abc".diff_key(), "abc");
        assert!(String::from("x").content_equal(&String::from("x")));
        assert!(!true.content_equal(&false));
    }
}
