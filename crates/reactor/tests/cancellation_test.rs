//! Integration tests for cooperative cancellation: handles, abort tokens, and
//! `Store::unlink`.

use reactor::prelude::*;
use std::cell::Cell;
use std::rc::Rc;

#[test]
fn test_handle_cancel_stops_reruns_and_is_idempotent() {
    let store = Store::new();
    let (read, write) = store.signal(0);
    let runs = Rc::new(Cell::new(0));
    let run_count = runs.clone();

    let handle = store
        .effect(move |_ctx| {
            run_count.set(run_count.get() + 1);
            let _ = read.get();
            Ok(())
        })
        .unwrap();

    assert!(!handle.is_cancelled());
    handle.cancel();
    assert!(handle.is_cancelled());
    handle.cancel();
    assert!(handle.is_cancelled(), "cancelling twice must stay cancelled, not error");

    write.set(1).unwrap();
    assert_eq!(runs.get(), 1);
}

#[test]
fn test_external_abort_token_shared_via_options_cancels_the_effect() {
    let store = Store::new();
    let (read, write) = store.signal(0);
    let token = AbortToken::new();
    let runs = Rc::new(Cell::new(0));
    let run_count = runs.clone();

    store
        .effect_with_options(
            move |_ctx| {
                run_count.set(run_count.get() + 1);
                let _ = read.get();
                Ok(())
            },
            EffectOptions { abort: Some(token.clone()) },
        )
        .unwrap();

    assert_eq!(runs.get(), 1);
    write.set(1).unwrap();
    assert_eq!(runs.get(), 2);

    token.cancel();
    write.set(2).unwrap();
    assert_eq!(runs.get(), 2, "the externally-cancelled token must stop further runs");
}

#[test]
fn test_store_unlink_tears_down_every_live_effect() {
    let store = Store::new();
    let (read_a, write_a) = store.signal(0);
    let (read_b, write_b) = store.signal(0);
    let runs = Rc::new(Cell::new(0));

    let runs_a = runs.clone();
    store
        .effect(move |_ctx| {
            runs_a.set(runs_a.get() + 1);
            let _ = read_a.get();
            Ok(())
        })
        .unwrap();
    let runs_b = runs.clone();
    store
        .effect(move |_ctx| {
            runs_b.set(runs_b.get() + 1);
            let _ = read_b.get();
            Ok(())
        })
        .unwrap();

    assert_eq!(runs.get(), 2);
    store.unlink();

    write_a.set(1).unwrap();
    write_b.set(1).unwrap();
    assert_eq!(runs.get(), 2, "no effect should observe writes after unlink");
}
