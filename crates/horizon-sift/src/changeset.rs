//! Sectioned change sets addressed by two-dimensional positions.
//!
//! [`SectionPatch::between`] runs the flat sequence diff twice — once over
//! the sections themselves, then over the items of every section present in
//! both snapshots — and flattens the results into one set of
//! `(section, item)`-addressed operations that a view sink can apply as a
//! single batch.

use std::collections::BTreeSet;
use std::fmt;

use horizon_sift_diff::{diff, Change, Diffable};

use crate::model::SectionModel;

/// Address of an item in a sectioned model: section index plus item index
/// within that section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemPosition {
    /// Index of the containing section.
    pub section: usize,
    /// Index of the item within its section.
    pub item: usize,
}

impl ItemPosition {
    /// Creates a position from a section index and an item index.
    pub const fn new(section: usize, item: usize) -> Self {
        Self { section, item }
    }
}

impl fmt::Display for ItemPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.section, self.item)
    }
}

/// Relocation of a single item from one position to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemMove {
    /// Position of the item before the update.
    pub from: ItemPosition,
    /// Position of the item after the update.
    pub to: ItemPosition,
}

/// The structural operations that turn one model snapshot into another.
///
/// Section indices in `section_deletes` address the existing snapshot,
/// those in `section_inserts` the updated one. A section that changed
/// position shows up in both sets — moves are normalized into
/// delete-at-old-index plus insert-at-new-index, never reported as a
/// separate move — so the item pass never has to re-map item indices across
/// a section relocation.
///
/// Item operations are only computed for sections that persist (by
/// identity) between the snapshots; their positions carry the **updated**
/// snapshot's section index. `replaces` must be applied outside the batch
/// that applies the rest (see [`apply_patch`](crate::apply::apply_patch)).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionPatch {
    /// Sections inserted at these updated-snapshot indices.
    pub section_inserts: BTreeSet<usize>,
    /// Sections removed at these existing-snapshot indices.
    pub section_deletes: BTreeSet<usize>,
    /// Items inserted at these positions.
    pub inserts: Vec<ItemPosition>,
    /// Items removed at these positions.
    pub deletes: Vec<ItemPosition>,
    /// Items whose content changed in place; reloaded outside the batch.
    pub replaces: Vec<ItemPosition>,
    /// Items relocated within their section.
    pub moves: Vec<ItemMove>,
}

impl SectionPatch {
    /// Computes the patch that turns `existing` into `updated`.
    ///
    /// Pure and deterministic, but potentially expensive — run it off the
    /// UI thread. The pipeline does exactly that; call it directly only for
    /// one-off synchronous diffs.
    ///
    /// Section and item identity keys must be unique within their snapshot
    /// and section respectively; see [`horizon_sift_diff::diff`].
    pub fn between<S: SectionModel>(existing: &[S], updated: &[S]) -> Self {
        let section_changes = diff(existing, updated);

        let mut section_inserts: BTreeSet<usize> = section_changes
            .iter()
            .filter_map(|change| change.insert())
            .map(|insert| insert.index)
            .collect();
        let mut section_deletes: BTreeSet<usize> = section_changes
            .iter()
            .filter_map(|change| change.delete())
            .map(|delete| delete.index)
            .collect();

        // Treat section moves as insert/delete pairs to keep the item pass
        // simple: a section either keeps its identity in place or is
        // rebuilt wholesale at its new position.
        for relocation in section_changes.iter().filter_map(|change| change.moved()) {
            section_inserts.insert(relocation.to_index);
            section_deletes.insert(relocation.from_index);
        }

        let mut inserts = Vec::new();
        let mut deletes = Vec::new();
        let mut replaces = Vec::new();
        let mut moves = Vec::new();

        for (section_index, updated_section) in updated.iter().enumerate() {
            if section_inserts.contains(&section_index) {
                continue;
            }
            if section_index >= existing.len() {
                continue;
            }
            // First match by identity key wins.
            let Some(existing_section) = existing
                .iter()
                .find(|section| section.diff_key() == updated_section.diff_key())
            else {
                continue;
            };

            for change in diff(existing_section.items(), updated_section.items()) {
                match change {
                    Change::Insert(insert) => {
                        inserts.push(ItemPosition::new(section_index, insert.index));
                    }
                    Change::Delete(delete) => {
                        deletes.push(ItemPosition::new(section_index, delete.index));
                    }
                    Change::Replace(replace) => {
                        replaces.push(ItemPosition::new(section_index, replace.index));
                    }
                    Change::Move(relocation) => {
                        moves.push(ItemMove {
                            from: ItemPosition::new(section_index, relocation.from_index),
                            to: ItemPosition::new(section_index, relocation.to_index),
                        });
                    }
                }
            }
        }

        let patch = Self {
            section_inserts,
            section_deletes,
            inserts,
            deletes,
            replaces,
            moves,
        };
        tracing::trace!(
            target: "horizon_sift::changeset",
            operations = patch.operation_count(),
            "computed section patch"
        );
        patch
    }

    /// Returns `true` when the patch carries no operations at all.
    pub fn is_empty(&self) -> bool {
        self.operation_count() == 0
    }

    /// Total number of operations across both levels.
    pub fn operation_count(&self) -> usize {
        self.section_inserts.len()
            + self.section_deletes.len()
            + self.inserts.len()
            + self.deletes.len()
            + self.replaces.len()
            + self.moves.len()
    }
}
