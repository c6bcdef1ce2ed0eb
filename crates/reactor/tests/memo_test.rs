//! Integration tests for memos: cached, dependency-tracked derived values.

use reactor::prelude::*;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[test]
fn test_memo_computes_once_on_creation() {
    let store = Store::new();
    let (read, _write) = store.signal(3);
    let compute_calls = Rc::new(Cell::new(0));
    let calls = compute_calls.clone();

    let doubled = store
        .memo(move || {
            calls.set(calls.get() + 1);
            read.get() * 2
        })
        .unwrap();

    assert_eq!(doubled.get(), 6);
    assert_eq!(compute_calls.get(), 1);
}

#[test]
fn test_memo_skips_recompute_notification_for_unchanged_output() {
    let store = Store::new();
    let (source_read, source_write) = store.signal(1);
    let compute_calls = Rc::new(Cell::new(0));
    let calls = compute_calls.clone();

    // `is_even` only changes value on every other write, even though the source changes
    // every time — downstream consumers should only be notified when it actually flips.
    let is_even = store
        .memo(move || {
            calls.set(calls.get() + 1);
            source_read.get() % 2 == 0
        })
        .unwrap();

    let observed = Rc::new(Cell::new(0));
    let seen = observed.clone();
    store
        .effect(move |_ctx| {
            seen.set(seen.get() + 1);
            let _ = is_even.get();
            Ok(())
        })
        .unwrap();

    assert_eq!(observed.get(), 1, "effect runs once on creation");

    source_write.set(2).unwrap();
    assert_eq!(compute_calls.get(), 2, "memo recomputes on every source change");
    assert_eq!(observed.get(), 2, "output flipped from false to true");

    source_write.set(4).unwrap();
    assert_eq!(compute_calls.get(), 3, "memo recomputes again");
    assert_eq!(observed.get(), 2, "output stayed true, so the effect must not re-run");
}

#[test]
fn test_memo_chain_propagates_through_multiple_levels() {
    let store = Store::new();
    let (read, write) = store.signal(1);
    let doubled = store.memo(move || read.get() * 2).unwrap();
    let doubled_for_quad = doubled.clone();
    let quadrupled = store.memo(move || doubled_for_quad.get() * 2).unwrap();

    assert_eq!(quadrupled.get(), 4);
    write.set(2).unwrap();
    assert_eq!(quadrupled.get(), 8);
}

#[test]
fn test_effect_sees_sibling_memos_only_after_both_have_recomputed() {
    let store = Store::new();
    let (source_read, source_write) = store.signal(1);

    let read_for_m1 = source_read.clone();
    let doubled = store.memo(move || read_for_m1.get() * 2).unwrap();
    let read_for_m2 = source_read.clone();
    let tripled = store.memo(move || read_for_m2.get() * 3).unwrap();

    let observed = Rc::new(RefCell::new(Vec::new()));
    let observed_clone = observed.clone();
    let doubled_for_effect = doubled.clone();
    let tripled_for_effect = tripled.clone();
    store
        .effect(move |_ctx| {
            observed_clone.borrow_mut().push((doubled_for_effect.get(), tripled_for_effect.get()));
            Ok(())
        })
        .unwrap();
    assert_eq!(*observed.borrow(), vec![(2, 3)]);

    source_write.set(10).unwrap();
    assert_eq!(
        *observed.borrow(),
        vec![(2, 3), (20, 30)],
        "the effect must run exactly once per write and only ever see both sibling memos \
         fully recomputed together, never a torn (20, 3) or (2, 30) intermediate"
    );
}

#[test]
fn test_memo_with_custom_equality_collapses_near_duplicates() {
    let store = Store::new();
    let (read, write) = store.signal(1.0_f64);
    let within_epsilon: EqualityFn<f64> = std::rc::Rc::new(|a: &f64, b: &f64| (a - b).abs() < 0.01);

    let rounded = store
        .memo_with_options(
            move || read.get(),
            MemoOptions { equals: Some(within_epsilon), abort: None },
        )
        .unwrap();

    let runs = Rc::new(Cell::new(0));
    let run_count = runs.clone();
    let rounded_for_effect = rounded.clone();
    store
        .effect(move |_ctx| {
            run_count.set(run_count.get() + 1);
            let _ = rounded_for_effect.get();
            Ok(())
        })
        .unwrap();

    assert_eq!(runs.get(), 1);
    write.set(1.001).unwrap();
    assert_eq!(runs.get(), 1, "a change within epsilon must not notify");
    write.set(2.0).unwrap();
    assert_eq!(runs.get(), 2);
}
