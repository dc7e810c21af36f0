//! Error types for Horizon Sift.

/// Result type alias for sift operations.
pub type Result<T> = std::result::Result<T, SiftError>;

/// Errors surfaced by the update pipeline.
///
/// Dropped view bindings and deduplicated submissions are normal lifecycle
/// events, not errors; they are absorbed silently (trace-level logs only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SiftError {
    /// The view sink reported that a batch update could not be applied.
    ///
    /// This usually means the model and the view's section/row bookkeeping
    /// have drifted, which points at an upstream modeling bug. The pipeline
    /// deliberately does not mask it with a full reload; the host should
    /// reset the view explicitly.
    #[error("view sink reported an inconsistent batch update")]
    SinkInconsistency,

    /// The pipeline has been stopped; the snapshot was not accepted.
    #[error("update pipeline has been stopped")]
    PipelineStopped,
}
