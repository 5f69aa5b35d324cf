//! Benchmarks for merge-heavy edit bursts and state jumps.
//!
//! A gizmo drag produces one position edit per frame; the history should fold
//! them into a single entry at constant cost per edit. Jumps across a long
//! history should cost one undo per step with a single notification.
//!
//! Run with: cargo bench -p fedit-history --bench history_bench
//!
//! Expected results:
//!
//! | Scenario                 | Entries after | historyChanged |
//! |--------------------------|---------------|----------------|
//! | 1000 merged edits        | 1             | 1000           |
//! | 1000 distinct edits      | 1000          | 1000           |
//! | go_to_state(0) over 1000 | 0 applied     | 1              |

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::any::Any;
use std::hint::black_box;
use std::time::Duration;

use fedit_core::{ObjectId, SignalBus};
use fedit_history::{
    Command, CommandMetadata, CommandResult, History, HistoryConfig, MergeKey, Session,
    make_composite,
};
use web_time::Instant;

// ============================================================================
// Setup helpers
// ============================================================================

struct Slots {
    values: Vec<f64>,
    signals: SignalBus,
}

impl Session for Slots {
    fn signals(&self) -> &SignalBus {
        &self.signals
    }
}

struct Nudge {
    slot: usize,
    old: f64,
    new: f64,
    metadata: CommandMetadata,
}

impl Nudge {
    fn boxed(slots: &Slots, slot: usize, value: f64) -> Box<dyn Command<Slots>> {
        Box::new(Self {
            slot,
            old: slots.values[slot],
            new: value,
            metadata: CommandMetadata::new("Nudge"),
        })
    }
}

impl Command<Slots> for Nudge {
    fn kind(&self) -> &'static str {
        "Nudge"
    }

    fn metadata(&self) -> &CommandMetadata {
        &self.metadata
    }

    fn execute(&mut self, slots: &mut Slots) -> CommandResult {
        slots.values[self.slot] = self.new;
        Ok(())
    }

    fn undo(&mut self, slots: &mut Slots) -> CommandResult {
        slots.values[self.slot] = self.old;
        Ok(())
    }

    fn updatable(&self) -> bool {
        true
    }

    fn merge_key(&self) -> Option<MergeKey> {
        Some(MergeKey::new("Nudge", ObjectId(self.slot as u64)))
    }

    fn update(&mut self, other: &dyn Command<Slots>) -> bool {
        match other.as_any().downcast_ref::<Self>() {
            Some(other) => {
                self.new = other.new;
                true
            }
            None => false,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn slots(n: usize) -> Slots {
    Slots {
        values: vec![0.0; n],
        signals: SignalBus::new(),
    }
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_merged_burst(c: &mut Criterion) {
    let mut group = c.benchmark_group("history/merged_burst");
    for n in [100usize, 1_000] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let mut slots = slots(1);
                let mut history = History::new(HistoryConfig::default());
                let start = Instant::now();
                for i in 0..n {
                    let cmd = Nudge::boxed(&slots, 0, i as f64);
                    let at = start + Duration::from_millis(i as u64);
                    history.execute_at(cmd, &mut slots, at).unwrap();
                }
                black_box(history.undo_depth())
            });
        });
    }
    group.finish();
}

fn bench_distinct_pushes(c: &mut Criterion) {
    let mut group = c.benchmark_group("history/distinct_pushes");
    for n in [100usize, 1_000] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let mut slots = slots(n);
                let mut history = History::new(HistoryConfig::default());
                for i in 0..n {
                    let cmd = Nudge::boxed(&slots, i, 1.0);
                    history.execute(cmd, &mut slots).unwrap();
                }
                black_box(history.undo_depth())
            });
        });
    }
    group.finish();
}

fn bench_go_to_start(c: &mut Criterion) {
    c.bench_function("history/go_to_state_0_over_1000", |b| {
        b.iter(|| {
            let mut slots = slots(1_000);
            let mut history = History::new(HistoryConfig::default());
            for i in 0..1_000 {
                let cmd = Nudge::boxed(&slots, i, 1.0);
                history.execute(cmd, &mut slots).unwrap();
            }
            black_box(history.go_to_state(0, &mut slots).unwrap())
        });
    });
}

fn bench_composite_execute(c: &mut Criterion) {
    c.bench_function("history/composite_100_children", |b| {
        b.iter(|| {
            let mut slots = slots(100);
            let mut history = History::new(HistoryConfig::default());
            let children: Vec<_> = (0..100).map(|i| Nudge::boxed(&slots, i, 2.0)).collect();
            let composite = make_composite("Batch", children, &mut slots);
            history.execute(composite, &mut slots).unwrap();
            black_box(history.undo(&mut slots).unwrap())
        });
    });
}

criterion_group!(
    benches,
    bench_merged_burst,
    bench_distinct_pushes,
    bench_go_to_start,
    bench_composite_execute,
);
criterion_main!(benches);
