//! End-to-end PPCT scenarios: scripted assignment sequences and concurrent
//! decision accounting.

use std::collections::VecDeque;
use std::time::Duration;

use dfuzz_core::{
    DelayInjector, ExplorationStrategy, PpctConfig, PpctStrategy, Priority, RandomSource,
    SeededRandom, UnitId, UnitScope, thread_identity,
};

/// Random source replaying a fixed script.
struct Scripted {
    doubles: VecDeque<f64>,
    ints: VecDeque<u32>,
}

impl Scripted {
    fn boxed(doubles: &[f64], ints: &[u32]) -> Box<dyn RandomSource> {
        Box::new(Self {
            doubles: doubles.iter().copied().collect(),
            ints: ints.iter().copied().collect(),
        })
    }
}

impl RandomSource for Scripted {
    fn next_double(&mut self) -> f64 {
        self.doubles.pop_front().expect("double script exhausted")
    }

    fn next_int(&mut self, bound: u32) -> u32 {
        let v = self.ints.pop_front().expect("int script exhausted");
        assert!(v < bound, "scripted int {v} out of bound {bound}");
        v
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn decide_as(strategy: &PpctStrategy, unit: u64) -> (Priority, u32) {
    let _scope = UnitScope::enter(unit);
    let decision = strategy.decide().expect("unit is registered");
    (decision.priority, decision.delay)
}

#[test]
fn five_units_one_iteration_exact_sequence() {
    init_tracing();
    // Epoch length 500 / 100 = 5. First iteration runs at p = 0.1, so a low
    // unit gets 50 + 5 * k.
    let mut strategy = PpctStrategy::new(
        PpctConfig::default(),
        Scripted::boxed(&[0.05, 0.50, 0.09, 0.90, 0.30, 0.01], &[3, 7, 0, 9]),
        thread_identity(),
    )
    .expect("valid config");
    assert_eq!(strategy.epoch_length(), 5);
    assert!(strategy.initialize_next_iteration(0));
    assert_eq!(strategy.low_priority_probability(), 0.1);

    let observed: Vec<(Priority, u32)> = (1..=5).map(|unit| decide_as(&strategy, unit)).collect();
    assert_eq!(
        observed,
        vec![
            (Priority::Low, 65),
            (Priority::High, 0),
            (Priority::Low, 85),
            (Priority::High, 0),
            // Step 5 is an epoch boundary: sets cleared before unit 5 rolls.
            (Priority::High, 0),
        ]
    );
    assert_eq!(strategy.step_count(), 5);

    // Units 1..=4 were forgotten at the boundary; only unit 5 is assigned.
    for unit in 1..=4 {
        assert_eq!(strategy.priority_of(UnitId(unit)), None);
    }
    assert_eq!(strategy.priority_of(UnitId(5)), Some(Priority::High));

    // Unit 1 re-rolls (0.01 < 0.1 → low), then keeps its membership.
    assert_eq!(decide_as(&strategy, 1), (Priority::Low, 50));
    assert_eq!(decide_as(&strategy, 1), (Priority::Low, 95));
    assert_eq!(strategy.step_count(), 7);
}

#[test]
fn unidentified_decisions_interleaved_with_identified() {
    init_tracing();
    let mut strategy = PpctStrategy::new(
        PpctConfig::default(),
        Scripted::boxed(&[0.99], &[]),
        thread_identity(),
    )
    .expect("valid config");
    strategy.initialize_next_iteration(0);

    assert_eq!(strategy.next_delay(10), Some(0));
    assert_eq!(strategy.step_count(), 0);
    {
        let _scope = UnitScope::enter(1u64);
        assert_eq!(strategy.next_delay(10), Some(0));
    }
    let before = strategy.priority_of(UnitId(1));
    assert_eq!(before, Some(Priority::High));

    assert_eq!(strategy.next_delay(10), Some(0));
    assert!(strategy.decide().is_none());
    assert_eq!(strategy.step_count(), 1);
    assert_eq!(strategy.priority_of(UnitId(1)), before);
    assert_eq!(strategy.low_priority_probability(), 0.1);
}

#[test]
fn concurrent_decisions_are_counted_exactly_once() {
    init_tracing();
    const THREADS: u64 = 8;
    const DECISIONS: u64 = 250;

    let mut strategy = PpctStrategy::new(
        PpctConfig::default().with_max_delay_steps(1_000),
        Box::new(SeededRandom::new(0xC0FFEE)),
        thread_identity(),
    )
    .expect("valid config");

    for iteration in 0..3 {
        assert!(strategy.initialize_next_iteration(iteration));
        let injector = DelayInjector::new(&strategy).with_tick(Duration::ZERO);
        std::thread::scope(|s| {
            for unit in 0..THREADS {
                let injector = &injector;
                s.spawn(move || {
                    let _scope = UnitScope::enter(unit);
                    for _ in 0..DECISIONS {
                        let delay = injector.yield_point("shared_counter");
                        assert!(delay <= 95 && delay % 5 == 0, "bad delay {delay}");
                    }
                });
            }
        });
        assert_eq!(strategy.step_count(), THREADS * DECISIONS);
    }
}

#[test]
fn same_seed_reproduces_sequence() {
    fn run(seed: u64) -> Vec<(u64, Priority, u32)> {
        let mut strategy = PpctStrategy::new(
            PpctConfig::default(),
            Box::new(SeededRandom::new(seed)),
            thread_identity(),
        )
        .expect("valid config");
        let mut out = Vec::new();
        for iteration in 0..9 {
            strategy.initialize_next_iteration(iteration);
            for step in 0..40u64 {
                let unit = step % 6;
                let _scope = UnitScope::enter(unit);
                let d = strategy.decide().expect("registered");
                out.push((unit, d.priority, d.delay));
            }
        }
        out
    }

    assert_eq!(run(1234), run(1234));
    assert_ne!(run(1234), run(4321));
}
