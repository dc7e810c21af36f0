//! The serialized update pipeline.
//!
//! `UpdatePipeline` turns a stream of model snapshots into batched view
//! updates. Snapshots may arrive from any thread and in rapid succession;
//! the pipeline guarantees that
//!
//! - consecutive value-equal snapshots are submitted only once
//! - each patch is computed on a dedicated diff thread, never the view's
//! - patches are applied strictly one at a time, in submission order
//! - a diff is always computed against the snapshot the view last
//!   committed, never a stale base
//!
//! The last two points are enforced by a cycle lock held from before the
//! committed snapshot is read until the sink reports batch completion.
//! Each cycle therefore runs `submit -> diff -> apply -> commit` end to end
//! before the next one starts; when submissions outpace cycles, intermediate
//! snapshots are superseded and dropped — only convergence to the newest
//! state matters.
//!
//! # Example
//!
//! ```no_run
//! use horizon_sift::{KeyedSection, UpdatePipeline, ViewBinding};
//! # use horizon_sift::{ItemPosition, ViewSink};
//! # use std::collections::BTreeSet;
//! # struct MySink;
//! # impl ViewSink for MySink {
//! #     fn begin_batch(&mut self) {}
//! #     fn delete_sections(&mut self, _: &BTreeSet<usize>) {}
//! #     fn insert_sections(&mut self, _: &BTreeSet<usize>) {}
//! #     fn delete_items(&mut self, _: &[ItemPosition]) {}
//! #     fn insert_items(&mut self, _: &[ItemPosition]) {}
//! #     fn move_item(&mut self, _: ItemPosition, _: ItemPosition) {}
//! #     fn reload_items(&mut self, _: &[ItemPosition]) {}
//! #     fn end_batch(&mut self, on_complete: Box<dyn FnOnce(bool) + Send>) { on_complete(true) }
//! # }
//!
//! let binding = ViewBinding::shared(Vec::new(), MySink);
//! let pipeline = UpdatePipeline::<KeyedSection<&str, &str>>::builder().build(&binding);
//!
//! // From the model producer, on any thread:
//! pipeline.submit(vec![KeyedSection::new("fruit", vec!["apple", "pear"])])?;
//! # Ok::<(), horizon_sift::SiftError>(())
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::{Condvar, Mutex};

use crate::apply::{apply_patch, ViewSink};
use crate::changeset::SectionPatch;
use crate::error::{Result, SiftError};
use crate::model::SectionModel;

/// Dispatches deferred work onto the view-owning execution context.
///
/// GUI hosts implement this by posting the invocation to their event loop;
/// everything the pipeline runs on the view side goes through here.
pub trait UpdateDispatcher: Send + Sync {
    /// Schedules `invocation` to run on the view-owning context.
    fn dispatch(&self, invocation: Box<dyn FnOnce() + Send>);
}

/// Runs invocations immediately on the calling thread.
///
/// The fallback for headless hosts and tests: application then happens on
/// the pipeline's diff thread, which is safe because the view binding is
/// lock-protected either way.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineDispatcher;

impl UpdateDispatcher for InlineDispatcher {
    fn dispatch(&self, invocation: Box<dyn FnOnce() + Send>) {
        invocation();
    }
}

static_assertions::assert_impl_all!(InlineDispatcher: Send, Sync);

/// The view-side state a pipeline drives: the last committed snapshot plus
/// the sink that renders it.
///
/// The host owns the binding behind `Arc<Mutex<_>>` and drops it when the
/// view goes away; the pipeline only keeps a weak reference, so in-flight
/// cycles detect the drop and abandon silently.
pub struct ViewBinding<S: SectionModel, V: ViewSink> {
    sections: Vec<S>,
    sink: V,
}

impl<S: SectionModel, V: ViewSink> ViewBinding<S, V> {
    /// Creates a shared binding over the initial sections and the sink.
    ///
    /// The initial sections must describe what the view currently renders
    /// (typically empty for a freshly created view).
    pub fn shared(sections: Vec<S>, sink: V) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self { sections, sink }))
    }

    /// The snapshot the view currently renders.
    pub fn sections(&self) -> &[S] {
        &self.sections
    }

    /// The underlying sink.
    pub fn sink(&self) -> &V {
        &self.sink
    }

    /// Mutable access to the underlying sink.
    pub fn sink_mut(&mut self) -> &mut V {
        &mut self.sink
    }
}

/// Serializes cycles: acquired before the committed snapshot is read,
/// released only after the sink reports completion or the cycle is
/// abandoned.
struct CycleGate {
    busy: Mutex<bool>,
    released: Condvar,
}

impl CycleGate {
    fn new() -> Self {
        Self {
            busy: Mutex::new(false),
            released: Condvar::new(),
        }
    }

    fn acquire(&self) {
        tracing::debug!(target: "horizon_sift::pipeline", "acquiring cycle lock");
        let mut busy = self.busy.lock();
        while *busy {
            self.released.wait(&mut busy);
        }
        *busy = true;
        tracing::debug!(target: "horizon_sift::pipeline", "cycle lock acquired");
    }

    fn release(&self) {
        *self.busy.lock() = false;
        self.released.notify_one();
        tracing::debug!(target: "horizon_sift::pipeline", "cycle lock released");
    }
}

static_assertions::assert_impl_all!(CycleGate: Send, Sync);

/// Handler invoked after every completed (not abandoned) cycle.
type CompletionHandler = Arc<dyn Fn(Result<()>) + Send + Sync>;

/// A task sent to the pipeline thread.
enum PipelineTask<S> {
    /// Diff and apply this snapshot.
    Update(Vec<S>),
    /// Shutdown signal.
    Shutdown,
}

/// State shared between the pipeline handle and its diff thread.
struct PipelineShared<S> {
    /// Whether the pipeline accepts submissions.
    running: AtomicBool,
    /// Serializes diff/apply cycles.
    gate: CycleGate,
    /// Last submitted snapshot, for consecutive-duplicate detection.
    last_submitted: Mutex<Option<Vec<S>>>,
    /// Whether the next submission is the to-be-absorbed baseline.
    baseline_pending: AtomicBool,
}

/// Builder for [`UpdatePipeline`] with custom configuration.
pub struct UpdatePipelineBuilder {
    thread_name: String,
    skip_initial_snapshot: bool,
    dispatcher: Arc<dyn UpdateDispatcher>,
    on_cycle_complete: Option<CompletionHandler>,
}

impl Default for UpdatePipelineBuilder {
    fn default() -> Self {
        Self {
            thread_name: "sift-pipeline".to_string(),
            skip_initial_snapshot: true,
            dispatcher: Arc::new(InlineDispatcher),
            on_cycle_complete: None,
        }
    }
}

impl UpdatePipelineBuilder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the diff thread's name.
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Whether the very first submission is absorbed as a baseline rather
    /// than diffed. Defaults to `true`: producers that replay their current
    /// state on subscription would otherwise trigger a spurious first diff.
    /// Turn off when the first emission is a genuine delta against the
    /// binding's initial sections.
    pub fn skip_initial_snapshot(mut self, skip: bool) -> Self {
        self.skip_initial_snapshot = skip;
        self
    }

    /// Sets the dispatcher that marshals patch application onto the
    /// view-owning context. Defaults to [`InlineDispatcher`].
    pub fn dispatcher(mut self, dispatcher: Arc<dyn UpdateDispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Installs a handler invoked after every completed cycle with the
    /// application outcome. Abandoned cycles (dropped view binding) do not
    /// report — destruction is lifecycle, not failure.
    pub fn on_cycle_complete<F>(mut self, handler: F) -> Self
    where
        F: Fn(Result<()>) + Send + Sync + 'static,
    {
        self.on_cycle_complete = Some(Arc::new(handler));
        self
    }

    /// Builds the pipeline and starts its diff thread.
    pub fn build<S, V>(self, binding: &Arc<Mutex<ViewBinding<S, V>>>) -> UpdatePipeline<S>
    where
        S: SectionModel + 'static,
        V: ViewSink + Send + 'static,
    {
        let (task_sender, task_receiver) = unbounded();
        let shared = Arc::new(PipelineShared {
            running: AtomicBool::new(true),
            gate: CycleGate::new(),
            last_submitted: Mutex::new(None),
            baseline_pending: AtomicBool::new(self.skip_initial_snapshot),
        });

        let thread_shared = shared.clone();
        let binding = Arc::downgrade(binding);
        let dispatcher = self.dispatcher;
        let on_cycle_complete = self.on_cycle_complete;

        let handle = thread::Builder::new()
            .name(self.thread_name)
            .spawn(move || {
                pipeline_loop(task_receiver, thread_shared, binding, dispatcher, on_cycle_complete);
            })
            .expect("Failed to spawn pipeline thread");

        UpdatePipeline {
            task_sender,
            shared,
            handle: Mutex::new(Some(handle)),
        }
    }
}

/// Serialized diff/apply pipeline between a model producer and one view.
///
/// Created with [`UpdatePipeline::builder`] against a [`ViewBinding`].
/// Submissions are accepted from any thread and never block; see the
/// [module docs](self) for the ordering guarantees.
///
/// Dropping the pipeline requests shutdown of its diff thread without
/// blocking; use [`stop_and_join`](Self::stop_and_join) for a deterministic
/// teardown.
pub struct UpdatePipeline<S: SectionModel + 'static> {
    task_sender: Sender<PipelineTask<S>>,
    shared: Arc<PipelineShared<S>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl<S: SectionModel + 'static> UpdatePipeline<S> {
    /// Returns a builder with default configuration.
    pub fn builder() -> UpdatePipelineBuilder {
        UpdatePipelineBuilder::new()
    }

    /// Submits a model snapshot for diffing and application.
    ///
    /// Never blocks. A snapshot value-equal to the immediately preceding
    /// submission is absorbed silently, as is the first submission when the
    /// pipeline was built with
    /// [`skip_initial_snapshot`](UpdatePipelineBuilder::skip_initial_snapshot).
    pub fn submit(&self, snapshot: Vec<S>) -> Result<()> {
        if !self.is_running() {
            return Err(SiftError::PipelineStopped);
        }

        {
            let mut last = self.shared.last_submitted.lock();
            if last.as_deref() == Some(snapshot.as_slice()) {
                tracing::trace!(
                    target: "horizon_sift::pipeline",
                    "duplicate snapshot ignored"
                );
                return Ok(());
            }
            *last = Some(snapshot.clone());
        }

        if self.shared.baseline_pending.swap(false, Ordering::AcqRel) {
            tracing::debug!(
                target: "horizon_sift::pipeline",
                "baseline snapshot absorbed"
            );
            return Ok(());
        }

        self.task_sender
            .send(PipelineTask::Update(snapshot))
            .map_err(|_| SiftError::PipelineStopped)
    }

    /// Whether the pipeline still accepts submissions.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Requests shutdown. Queued snapshots submitted before the request are
    /// still processed; new submissions are rejected. Non-blocking; pair
    /// with [`join`](Self::join) to wait.
    pub fn stop(&self) {
        self.shared.running.store(false, Ordering::Release);
        let _ = self.task_sender.send(PipelineTask::Shutdown);
    }

    /// Waits for the diff thread to finish. Returns `true` if it was joined
    /// by this call.
    pub fn join(&self) -> bool {
        let mut handle = self.handle.lock();
        if let Some(handle) = handle.take() {
            handle.join().is_ok()
        } else {
            false
        }
    }

    /// Equivalent to [`stop`](Self::stop) followed by [`join`](Self::join).
    pub fn stop_and_join(&self) -> bool {
        self.stop();
        self.join()
    }
}

impl<S: SectionModel + 'static> Drop for UpdatePipeline<S> {
    fn drop(&mut self) {
        self.stop();
        // Don't block in drop - just request shutdown
    }
}

/// The diff thread: takes the newest pending snapshot and runs one cycle
/// at a time.
fn pipeline_loop<S, V>(
    receiver: Receiver<PipelineTask<S>>,
    shared: Arc<PipelineShared<S>>,
    binding: Weak<Mutex<ViewBinding<S, V>>>,
    dispatcher: Arc<dyn UpdateDispatcher>,
    on_cycle_complete: Option<CompletionHandler>,
) where
    S: SectionModel + 'static,
    V: ViewSink + Send + 'static,
{
    loop {
        match receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(PipelineTask::Update(snapshot)) => {
                // Superseding backpressure: when submissions outpaced us,
                // only the newest pending snapshot is worth diffing.
                let mut snapshot = snapshot;
                let mut superseded = 0usize;
                let mut shutdown_after = false;
                loop {
                    match receiver.try_recv() {
                        Ok(PipelineTask::Update(newer)) => {
                            superseded += 1;
                            snapshot = newer;
                        }
                        Ok(PipelineTask::Shutdown) => {
                            shutdown_after = true;
                            break;
                        }
                        Err(_) => break,
                    }
                }
                if superseded > 0 {
                    tracing::debug!(
                        target: "horizon_sift::pipeline",
                        superseded,
                        "dropped superseded snapshots"
                    );
                }

                run_cycle(
                    &shared,
                    &binding,
                    &dispatcher,
                    on_cycle_complete.clone(),
                    snapshot,
                );

                if shutdown_after {
                    break;
                }
            }
            Ok(PipelineTask::Shutdown) => break,
            Err(RecvTimeoutError::Timeout) => {
                if !shared.running.load(Ordering::Acquire) {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// One cycle: lock, diff against the committed snapshot, hand off to the
/// view context, commit, unlock.
fn run_cycle<S, V>(
    shared: &Arc<PipelineShared<S>>,
    binding: &Weak<Mutex<ViewBinding<S, V>>>,
    dispatcher: &Arc<dyn UpdateDispatcher>,
    on_cycle_complete: Option<CompletionHandler>,
    snapshot: Vec<S>,
) where
    S: SectionModel + 'static,
    V: ViewSink + Send + 'static,
{
    shared.gate.acquire();

    let Some(bound) = binding.upgrade() else {
        tracing::trace!(
            target: "horizon_sift::pipeline",
            "view binding dropped before diffing; cycle abandoned"
        );
        shared.gate.release();
        return;
    };
    let existing = bound.lock().sections.clone();
    drop(bound);

    let patch = SectionPatch::between(&existing, &snapshot);
    tracing::debug!(
        target: "horizon_sift::pipeline",
        section_inserts = ?patch.section_inserts,
        section_deletes = ?patch.section_deletes,
        inserts = ?patch.inserts,
        deletes = ?patch.deletes,
        replaces = ?patch.replaces,
        moves = patch.moves.len(),
        "patch computed; handing off to view context"
    );

    let binding = binding.clone();
    let shared = shared.clone();
    dispatcher.dispatch(Box::new(move || {
        let Some(bound) = binding.upgrade() else {
            tracing::trace!(
                target: "horizon_sift::pipeline",
                "view binding dropped before applying; cycle abandoned"
            );
            shared.gate.release();
            return;
        };

        let mut guard = bound.lock();
        let ViewBinding { sections, sink } = &mut *guard;

        let completion_shared = shared.clone();
        apply_patch(
            sink,
            &patch,
            move || {
                tracing::trace!(target: "horizon_sift::pipeline", "committing model snapshot");
                *sections = snapshot;
            },
            move |outcome| {
                match &outcome {
                    Ok(()) => {
                        tracing::debug!(target: "horizon_sift::pipeline", "cycle committed");
                    }
                    Err(error) => {
                        tracing::error!(
                            target: "horizon_sift::pipeline",
                            %error,
                            "cycle failed to apply"
                        );
                    }
                }
                completion_shared.gate.release();
                if let Some(handler) = &on_cycle_complete {
                    handler(outcome);
                }
            },
        );
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changeset::ItemPosition;
    use crate::model::KeyedSection;
    use crossbeam_channel::Sender as EventSender;
    use std::collections::BTreeSet;

    type Section = KeyedSection<&'static str, i32>;

    /// Counts batches and forwards cycle outcomes; always succeeds.
    struct CountingSink {
        batches: usize,
    }

    impl ViewSink for CountingSink {
        fn begin_batch(&mut self) {}

        fn delete_sections(&mut self, _indices: &BTreeSet<usize>) {}

        fn insert_sections(&mut self, _indices: &BTreeSet<usize>) {}

        fn delete_items(&mut self, _positions: &[ItemPosition]) {}

        fn insert_items(&mut self, _positions: &[ItemPosition]) {}

        fn move_item(&mut self, _from: ItemPosition, _to: ItemPosition) {}

        fn reload_items(&mut self, _positions: &[ItemPosition]) {}

        fn end_batch(&mut self, on_complete: Box<dyn FnOnce(bool) + Send>) {
            self.batches += 1;
            on_complete(true);
        }
    }

    fn completion_channel() -> (EventSender<Result<()>>, crossbeam_channel::Receiver<Result<()>>) {
        crossbeam_channel::unbounded()
    }

    fn wait_for_cycle(events: &crossbeam_channel::Receiver<Result<()>>) -> Result<()> {
        events
            .recv_timeout(Duration::from_secs(2))
            .expect("cycle completion within timeout")
    }

    fn sections(keys: &[(&'static str, &[i32])]) -> Vec<Section> {
        keys.iter()
            .map(|(key, items)| KeyedSection::new(*key, items.to_vec()))
            .collect()
    }

    #[test]
    fn test_duplicate_snapshot_is_absorbed() {
        let binding = ViewBinding::shared(Vec::<Section>::new(), CountingSink { batches: 0 });
        let (events, completions) = completion_channel();
        let pipeline = UpdatePipeline::<Section>::builder()
            .skip_initial_snapshot(false)
            .on_cycle_complete(move |outcome| {
                let _ = events.send(outcome);
            })
            .build(&binding);

        let snapshot = sections(&[("a", &[1, 2])]);
        pipeline.submit(snapshot.clone()).unwrap();
        assert!(wait_for_cycle(&completions).is_ok());

        // Value-equal resubmission: no new cycle.
        pipeline.submit(snapshot.clone()).unwrap();
        let next = sections(&[("a", &[1, 2, 3])]);
        pipeline.submit(next.clone()).unwrap();
        assert!(wait_for_cycle(&completions).is_ok());

        assert_eq!(binding.lock().sink().batches, 2);
        assert_eq!(binding.lock().sections(), next.as_slice());
        pipeline.stop_and_join();
    }

    #[test]
    fn test_baseline_snapshot_is_absorbed_when_configured() {
        let binding = ViewBinding::shared(Vec::<Section>::new(), CountingSink { batches: 0 });
        let (events, completions) = completion_channel();
        let pipeline = UpdatePipeline::<Section>::builder()
            .on_cycle_complete(move |outcome| {
                let _ = events.send(outcome);
            })
            .build(&binding);

        pipeline.submit(sections(&[("a", &[1])])).unwrap();
        pipeline.submit(sections(&[("a", &[1, 2])])).unwrap();
        assert!(wait_for_cycle(&completions).is_ok());

        // Only the second submission triggered a cycle.
        assert_eq!(binding.lock().sink().batches, 1);
        pipeline.stop_and_join();
    }

    #[test]
    fn test_submit_after_stop_is_rejected() {
        let binding = ViewBinding::shared(Vec::<Section>::new(), CountingSink { batches: 0 });
        let pipeline = UpdatePipeline::<Section>::builder().build(&binding);
        pipeline.stop_and_join();

        assert_eq!(
            pipeline.submit(sections(&[("a", &[1])])),
            Err(SiftError::PipelineStopped)
        );
    }

    #[test]
    fn test_dropped_binding_abandons_cycles_without_wedging() {
        let binding = ViewBinding::shared(Vec::<Section>::new(), CountingSink { batches: 0 });
        let pipeline = UpdatePipeline::<Section>::builder()
            .skip_initial_snapshot(false)
            .build(&binding);

        drop(binding);

        // Both cycles must abandon and release the cycle lock; a leaked
        // lock would wedge the second cycle and hang the join below.
        pipeline.submit(sections(&[("a", &[1])])).unwrap();
        pipeline.submit(sections(&[("a", &[1, 2])])).unwrap();

        assert!(pipeline.stop_and_join());
    }

    // Send + Sync so hosts can submit from any thread.
    static_assertions::assert_impl_all!(
        UpdatePipeline<KeyedSection<String, String>>: Send, Sync
    );
}
