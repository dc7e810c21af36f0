//! Drives a console-rendered table from a stream of model snapshots.
//!
//! Run with `RUST_LOG=horizon_sift=debug cargo run --example feed` to watch
//! the pipeline's cycle-lock and patch logs alongside the batch output.

use std::collections::BTreeSet;
use std::thread;
use std::time::Duration;

use horizon_sift::{ItemPosition, KeyedSection, UpdatePipeline, ViewBinding, ViewSink};

type Section = KeyedSection<&'static str, String>;

/// Prints each batch operation instead of animating it.
struct ConsoleSink;

impl ViewSink for ConsoleSink {
    fn begin_batch(&mut self) {
        println!("-- batch --");
    }

    fn delete_sections(&mut self, indices: &BTreeSet<usize>) {
        println!("   delete sections {indices:?}");
    }

    fn insert_sections(&mut self, indices: &BTreeSet<usize>) {
        println!("   insert sections {indices:?}");
    }

    fn delete_items(&mut self, positions: &[ItemPosition]) {
        for position in positions {
            println!("   delete item {position}");
        }
    }

    fn insert_items(&mut self, positions: &[ItemPosition]) {
        for position in positions {
            println!("   insert item {position}");
        }
    }

    fn move_item(&mut self, from: ItemPosition, to: ItemPosition) {
        println!("   move item {from} -> {to}");
    }

    fn reload_items(&mut self, positions: &[ItemPosition]) {
        for position in positions {
            println!("   reload item {position}");
        }
    }

    fn end_batch(&mut self, on_complete: Box<dyn FnOnce(bool) + Send>) {
        println!("-- committed --");
        on_complete(true);
    }
}

fn section(key: &'static str, items: &[&str]) -> Section {
    KeyedSection::new(key, items.iter().map(|item| item.to_string()).collect())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let binding = ViewBinding::shared(Vec::<Section>::new(), ConsoleSink);
    let pipeline = UpdatePipeline::<Section>::builder()
        .skip_initial_snapshot(false)
        .on_cycle_complete(|outcome| {
            if let Err(error) = outcome {
                eprintln!("cycle failed: {error}");
            }
        })
        .build(&binding);

    let snapshots = vec![
        vec![section("inbox", &["welcome", "invoice", "newsletter"])],
        vec![section("inbox", &["invoice", "welcome"])],
        vec![
            section("pinned", &["invoice"]),
            section("inbox", &["welcome", "receipt"]),
        ],
    ];

    for snapshot in snapshots {
        pipeline.submit(snapshot).expect("pipeline accepts snapshots");
        thread::sleep(Duration::from_millis(50));
    }

    pipeline.stop_and_join();

    let guard = binding.lock();
    println!("final sections:");
    for section in guard.sections() {
        println!("   [{}] {:?}", section.key, section.items);
    }
}
