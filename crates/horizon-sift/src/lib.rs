//! Diff-driven batch updates for sectioned list and table views.
//!
//! Horizon Sift keeps a rendered list/table view in sync with an in-memory
//! sectioned model by computing minimal insert/delete/move/replace
//! operations between model versions and applying them as one animated
//! batch. The crate owns the two hard parts of that job:
//!
//! - **Hierarchical diff translation**: the flat sequence diff from
//!   `horizon-sift-diff` is applied at the section level and again per
//!   surviving section, and flattened into one `(section, item)`-addressed
//!   [`SectionPatch`] — with section moves normalized into delete+insert so
//!   item indices never cross a relocation
//! - **Update serialization**: [`UpdatePipeline`] computes patches on a
//!   dedicated diff thread but applies them strictly one at a time, in
//!   submission order, against the snapshot the view last committed
//!
//! Rendering stays with the host toolkit: it implements [`ViewSink`] (the
//! batch-update acceptor) and, for real UI threads, [`UpdateDispatcher`].
//!
//! # Data Flow
//!
//! ```text
//! producer ──> UpdatePipeline ──> SectionPatch ──> ViewSink
//!   submit      dedupe, lock,      translate         batch,
//!               diff thread        old vs. new       commit
//! ```
//!
//! # Diffing Synchronously
//!
//! ```
//! use horizon_sift::{KeyedSection, SectionPatch};
//!
//! let existing = vec![KeyedSection::new("fruit", vec!["apple", "banana"])];
//! let updated = vec![KeyedSection::new("fruit", vec!["banana", "cherry"])];
//!
//! let patch = SectionPatch::between(&existing, &updated);
//! assert_eq!(patch.deletes.len(), 1); // "apple"
//! assert_eq!(patch.inserts.len(), 1); // "cherry"
//! ```
//!
//! For the full pipeline — deduplication, background diffing, serialized
//! application, view-lifetime handling — see the [`pipeline`] module docs.

pub mod apply;
pub mod changeset;
mod error;
pub mod model;
pub mod pipeline;

pub use apply::{apply_patch, ViewSink};
pub use changeset::{ItemMove, ItemPosition, SectionPatch};
pub use error::{Result, SiftError};
pub use model::{KeyedSection, SectionModel};
pub use pipeline::{
    InlineDispatcher, UpdateDispatcher, UpdatePipeline, UpdatePipelineBuilder, ViewBinding,
};

// Re-export the diff primitive so hosts can implement `Diffable` and
// consume raw change lists without a separate dependency.
pub use horizon_sift_diff::{diff, Change, Delete, Diffable, Insert, Move, Replace};
