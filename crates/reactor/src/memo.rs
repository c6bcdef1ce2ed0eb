//! Memos: read-only signals whose value is recomputed from other signals and cached until a
//! dependency actually changes its output.

use std::cell::RefCell;
use std::rc::Rc;

use crate::effect::{AbortToken, Effect, EffectKind, EffectOptions};
use crate::error::ReactorError;
use crate::signal::{EqualityFn, Signal, SignalOptions, SignalWrite as _};
use crate::signal::{ReadSignal, WriteSignal};
use crate::store::StoreInner;

/// Options controlling memo creation.
pub struct MemoOptions<T> {
    /// Equality used to decide whether a recompute actually changed the memo's value.
    /// Defaults to `PartialEq::eq`.
    pub equals: Option<EqualityFn<T>>,
    pub abort: Option<AbortToken>,
}

impl<T> Default for MemoOptions<T> {
    fn default() -> Self {
        Self { equals: None, abort: None }
    }
}

/// Build a memo: a hidden signal holding the last computed value, kept current by a
/// memo-kind effect that recomputes and writes into it. The memo-kind effect is flushed
/// ahead of plain effects, so an effect that reads this memo always observes the value for
/// the current round of changes, never a stale one.
///
/// `compute` is invoked exactly once to seed the memo: on the effect's mandatory first run,
/// which is also the run that records its dependencies. There is no separate untracked call
/// to obtain an initial value ahead of that — the hidden signal itself is only allocated once
/// that first run has produced a real value, via `signal_slot` below, rather than being seeded
/// with a placeholder and immediately overwritten.
pub(crate) fn create_memo<T: Clone + PartialEq + 'static>(
    store: Rc<StoreInner>,
    mut compute: impl FnMut() -> T + 'static,
    options: MemoOptions<T>,
) -> Result<ReadSignal<T>, ReactorError> {
    let equals = options.equals;
    let store_for_body = store.clone();
    let signal_slot: Rc<RefCell<Option<(ReadSignal<T>, WriteSignal<T>)>>> =
        Rc::new(RefCell::new(None));
    let slot_for_body = signal_slot.clone();

    let effect_options = EffectOptions { abort: options.abort };
    Effect::create(
        store,
        EffectKind::Memo,
        move |_ctx| {
            let value = compute();
            let mut slot = slot_for_body.borrow_mut();
            match slot.as_ref() {
                Some((_, write)) => write.set(value)?,
                None => {
                    let signal_options = SignalOptions { equals: equals.clone() };
                    let (read, write) =
                        Signal::create(store_for_body.clone(), value, signal_options);
                    *slot = Some((read, write));
                }
            }
            Ok(())
        },
        effect_options,
    )?;

    let read = signal_slot
        .borrow()
        .as_ref()
        .expect("the memo-kind effect's first run always populates the hidden signal")
        .0
        .clone();
    Ok(read)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::SignalRead as _;
    use crate::store::Store;
    use std::cell::Cell;

    #[test]
    fn memo_recomputes_only_when_a_dependency_changes() {
        let store = Store::new();
        let (source_read, source_write) = store.signal(1);
        let compute_calls = Rc::new(Cell::new(0));
        let calls = compute_calls.clone();
        let doubled = store
            .memo(move || {
                calls.set(calls.get() + 1);
                source_read.get() * 2
            })
            .unwrap();
        assert_eq!(doubled.get(), 2);
        assert_eq!(compute_calls.get(), 1);

        source_write.set(1).unwrap();
        assert_eq!(compute_calls.get(), 1, "equal write must not trigger a recompute");

        source_write.set(5).unwrap();
        assert_eq!(compute_calls.get(), 2);
        assert_eq!(doubled.get(), 10);
    }

    #[test]
    fn memo_flushes_before_dependent_plain_effects() {
        let store = Store::new();
        let (source_read, source_write) = store.signal(1);
        let doubled = store.memo(move || source_read.get() * 2).unwrap();

        let observed = Rc::new(RefCell::new(Vec::new()));
        let observed_clone = observed.clone();
        let doubled_for_effect = doubled.clone();
        store
            .effect(move |_ctx| {
                observed_clone.borrow_mut().push(doubled_for_effect.get());
                Ok(())
            })
            .unwrap();
        assert_eq!(*observed.borrow(), vec![2]);

        source_write.set(3).unwrap();
        assert_eq!(*observed.borrow(), vec![2, 6], "effect must see the recomputed memo value");
    }
}
