//! Ambient, thread-local default store. Mirrors the module-level `create_signal` /
//! `create_effect` free functions a single-threaded reactive runtime typically exposes, for
//! callers who don't need more than one isolated reactive universe per thread.

use std::cell::RefCell;

use crate::effect::{Effect, EffectContext, EffectHandle, EffectOptions, EffectResult};
use crate::error::{BodyError, ReactorError};
use crate::memo::MemoOptions;
use crate::signal::{ReadSignal, SignalOptions, WriteSignal};
use crate::store::Store;

thread_local! {
    static DEFAULT_STORE: RefCell<Store> = RefCell::new(Store::new());
}

fn with_default<R>(f: impl FnOnce(&Store) -> R) -> R {
    DEFAULT_STORE.with(|store| f(&store.borrow()))
}

/// Create a signal on the default store.
pub fn signal<T: Clone + PartialEq + 'static>(initial: T) -> (ReadSignal<T>, WriteSignal<T>) {
    with_default(|store| store.signal(initial))
}

/// Create a signal on the default store with explicit [`SignalOptions`].
pub fn signal_with_options<T: Clone + PartialEq + 'static>(
    initial: T,
    options: SignalOptions<T>,
) -> (ReadSignal<T>, WriteSignal<T>) {
    with_default(|store| store.signal_with_options(initial, options))
}

/// Create a memo on the default store.
pub fn memo<T: Clone + PartialEq + 'static>(
    compute: impl FnMut() -> T + 'static,
) -> Result<ReadSignal<T>, ReactorError> {
    with_default(|store| store.memo(compute))
}

/// Create a memo on the default store with explicit [`MemoOptions`].
pub fn memo_with_options<T: Clone + PartialEq + 'static>(
    compute: impl FnMut() -> T + 'static,
    options: MemoOptions<T>,
) -> Result<ReadSignal<T>, ReactorError> {
    with_default(|store| store.memo_with_options(compute, options))
}

/// Create an effect on the default store.
pub fn effect(
    body: impl FnMut(&EffectContext) -> EffectResult + 'static,
) -> Result<EffectHandle, ReactorError> {
    with_default(|store| store.effect(body))
}

/// Create an effect on the default store with explicit [`EffectOptions`].
pub fn effect_with_options(
    body: impl FnMut(&EffectContext) -> EffectResult + 'static,
    options: EffectOptions,
) -> Result<EffectHandle, ReactorError> {
    with_default(|store| store.effect_with_options(body, options))
}

/// Defer flushing on the default store until `f` returns.
pub fn batch<T>(f: impl FnOnce() -> T) -> Result<T, ReactorError> {
    with_default(|store| store.batch(f))
}

/// Read signals inside `reader` without tracking, on the default store.
pub fn untracked<T>(reader: impl FnOnce() -> T) -> T {
    with_default(|store| store.untracked(reader))
}

/// Register a cleanup on whichever effect is currently running on the default store. A
/// no-op if called outside any effect body.
pub fn on_cleanup(cleanup: impl FnOnce() -> Result<(), BodyError> + 'static) {
    with_default(|store| {
        if let Some(running) = store.inner.running_effect() {
            Effect::register_cleanup(&running, Box::new(cleanup));
        }
    });
}

/// Tear down every effect on the default store. Mainly useful in tests, to reset state
/// between cases without swapping the whole thread-local out.
pub fn reset() {
    DEFAULT_STORE.with(|store| {
        store.borrow().unlink();
        *store.borrow_mut() = Store::new();
    });
}
