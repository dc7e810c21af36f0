//! Applying a computed patch to a view sink.
//!
//! [`ViewSink`] is the boundary to the rendering toolkit: a batch-update
//! acceptor addressed with the same `(section, item)` positions the
//! translator emits. [`apply_patch`] drives it with a fixed operation order
//! so index semantics stay consistent with how the patch was computed.

use std::collections::BTreeSet;

use crate::changeset::{ItemPosition, SectionPatch};
use crate::error::{Result, SiftError};

/// A rendering-toolkit view that accepts batched structural updates.
///
/// Implementations translate these calls into whatever their toolkit's
/// batch-update primitive looks like. Within a batch, deletions address
/// pre-update indices and insertions post-update indices, the standard
/// batch-update convention.
///
/// `end_batch` must invoke `on_complete` exactly once — synchronously or
/// later, from any thread — passing `false` if the view rejected the batch
/// as inconsistent. The pipeline's cycle lock is held until that call.
pub trait ViewSink {
    /// Opens an atomic batch. Operations until [`end_batch`](Self::end_batch)
    /// commit together.
    fn begin_batch(&mut self);

    /// Removes whole sections, addressed by pre-update section index.
    fn delete_sections(&mut self, indices: &BTreeSet<usize>);

    /// Inserts whole sections, addressed by post-update section index.
    fn insert_sections(&mut self, indices: &BTreeSet<usize>);

    /// Removes items at the given positions.
    fn delete_items(&mut self, positions: &[ItemPosition]);

    /// Inserts items at the given positions.
    fn insert_items(&mut self, positions: &[ItemPosition]);

    /// Relocates a single item.
    fn move_item(&mut self, from: ItemPosition, to: ItemPosition);

    /// Reloads item content in place. Only ever called outside a batch.
    fn reload_items(&mut self, positions: &[ItemPosition]);

    /// Closes the batch and triggers the toolkit's commit/animation
    /// machinery, reporting completion through `on_complete`.
    fn end_batch(&mut self, on_complete: Box<dyn FnOnce(bool) + Send>);
}

/// Applies `patch` to `sink` as one atomic batch.
///
/// `commit_model` runs first inside the batch, so the sink's subsequent
/// section/row count queries reflect the updated model. The structural
/// operations follow in fixed order — section deletes, section inserts,
/// item deletes, item inserts, then each move individually — and empty
/// operation sets are not issued at all. Reloads for `patch.replaces` are
/// issued after the batch is closed; mixing reloads with structural
/// operations in one batch is rejected by common sinks.
///
/// `on_complete` receives `Err(SiftError::SinkInconsistency)` when the sink
/// reports a failed batch. That error is fatal for the cycle and is not
/// recovered from here; see [`SiftError::SinkInconsistency`].
pub fn apply_patch<V, F, C>(sink: &mut V, patch: &SectionPatch, commit_model: F, on_complete: C)
where
    V: ViewSink + ?Sized,
    F: FnOnce(),
    C: FnOnce(Result<()>) + Send + 'static,
{
    tracing::debug!(
        target: "horizon_sift::apply",
        section_deletes = ?patch.section_deletes,
        section_inserts = ?patch.section_inserts,
        deletes = ?patch.deletes,
        inserts = ?patch.inserts,
        replaces = ?patch.replaces,
        moves = patch.moves.len(),
        "applying section patch"
    );

    sink.begin_batch();
    commit_model();

    if !patch.section_deletes.is_empty() {
        sink.delete_sections(&patch.section_deletes);
    }
    if !patch.section_inserts.is_empty() {
        sink.insert_sections(&patch.section_inserts);
    }
    if !patch.deletes.is_empty() {
        sink.delete_items(&patch.deletes);
    }
    if !patch.inserts.is_empty() {
        sink.insert_items(&patch.inserts);
    }
    for relocation in &patch.moves {
        sink.move_item(relocation.from, relocation.to);
    }

    sink.end_batch(Box::new(move |finished| {
        if finished {
            on_complete(Ok(()));
        } else {
            tracing::error!(
                target: "horizon_sift::apply",
                "sink rejected batch update; model and view bookkeeping have diverged"
            );
            on_complete(Err(SiftError::SinkInconsistency));
        }
    }));

    // Reloads stay outside the batch.
    if !patch.replaces.is_empty() {
        sink.reload_items(&patch.replaces);
    }
}
