//! The scheduler: observer stack, pending-effect set, batch depth, and the two-phase flush.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

use crate::effect::{Effect, EffectContext, EffectHandle, EffectInner, EffectKind, EffectOptions};
use crate::error::ReactorError;
use crate::memo::{self, MemoOptions};
use crate::signal::{ReadSignal, Signal, SignalOptions, WriteSignal};

/// Identity of an effect within its owning [`Store`]. Never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(u64);

impl EffectId {
    pub(crate) fn next() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn get(self) -> u64 {
        self.0
    }
}

/// The deduplicated, insertion-ordered queue of effects awaiting a flush.
#[derive(Default)]
pub(crate) struct PendingSet {
    order: VecDeque<EffectId>,
    items: HashMap<EffectId, Rc<EffectInner>>,
}

impl PendingSet {
    fn insert(&mut self, effect: Rc<EffectInner>) {
        let id = effect.id;
        if !self.items.contains_key(&id) {
            self.order.push_back(id);
        }
        self.items.insert(id, effect);
    }

    /// Remove and return, in first-pended order, every pending effect of `kind`.
    fn drain_matching(&mut self, kind: EffectKind) -> Vec<Rc<EffectInner>> {
        let mut taken = Vec::new();
        let mut remaining = VecDeque::with_capacity(self.order.len());
        for id in self.order.drain(..) {
            match self.items.remove(&id) {
                Some(eff) if eff.kind == kind => taken.push(eff),
                Some(eff) => {
                    remaining.push_back(id);
                    self.items.insert(id, eff);
                }
                None => {}
            }
        }
        self.order = remaining;
        taken
    }

    fn drain_all(&mut self) -> Vec<Rc<EffectInner>> {
        let order = std::mem::take(&mut self.order);
        let mut items = std::mem::take(&mut self.items);
        order.into_iter().filter_map(|id| items.remove(&id)).collect()
    }
}

/// Internal, shared scheduler state. All fields are process-private and accessed only
/// through [`Store`]'s methods and the [`Signal`]/[`Effect`] types that hold an `Rc` back
/// to it.
pub(crate) struct StoreInner {
    /// LIFO of currently-executing effects. Non-empty iff some effect body is running.
    /// Doubles as the cyclic-dependency check: an effect already present here is mid-run.
    pub(crate) observer_stack: RefCell<Vec<Rc<EffectInner>>>,
    pending: RefCell<PendingSet>,
    batch_depth: Cell<u32>,
    /// True only while the memo phase of a `flush` is draining. Guards against a memo's own
    /// write recursing into `flush` and running the plain-effect phase, or a sibling memo's
    /// phase-2 loop, while this call's memo phase is still mid-drain.
    updating: Cell<bool>,
    tracking: Cell<bool>,
    /// Registry of every live effect, keyed by id, for `Store::unlink`.
    registry: RefCell<HashMap<EffectId, std::rc::Weak<EffectInner>>>,
}

impl StoreInner {
    pub(crate) fn new() -> Self {
        Self {
            observer_stack: RefCell::new(Vec::new()),
            pending: RefCell::new(PendingSet::default()),
            batch_depth: Cell::new(0),
            updating: Cell::new(false),
            tracking: Cell::new(true),
            registry: RefCell::new(HashMap::new()),
        }
    }

    pub(crate) fn current_observer(&self) -> Option<Rc<EffectInner>> {
        if !self.tracking.get() {
            return None;
        }
        self.observer_stack.borrow().last().cloned()
    }

    /// The effect currently running, ignoring the tracking flag. Used for cleanup
    /// registration, which is not a dependency-tracked read and must work even inside
    /// `Store::untracked`.
    pub(crate) fn running_effect(&self) -> Option<Rc<EffectInner>> {
        self.observer_stack.borrow().last().cloned()
    }

    pub(crate) fn schedule(&self, effect: Rc<EffectInner>) {
        self.pending.borrow_mut().insert(effect);
    }

    pub(crate) fn register(&self, effect: &Rc<EffectInner>) {
        self.registry.borrow_mut().insert(effect.id, Rc::downgrade(effect));
    }

    pub(crate) fn unregister(&self, id: EffectId) {
        self.registry.borrow_mut().remove(&id);
    }

    pub(crate) fn is_running(&self, effect: &Rc<EffectInner>) -> bool {
        self.observer_stack.borrow().iter().any(|e| Rc::ptr_eq(e, effect))
    }

    pub(crate) fn push_observer(&self, effect: Rc<EffectInner>) {
        self.observer_stack.borrow_mut().push(effect);
    }

    pub(crate) fn pop_observer(&self) {
        self.observer_stack.borrow_mut().pop();
    }

    /// Drain the pending set in two phases: memo-kind effects first, then plain effects.
    /// Memos always recompute, even inside a batch, so reads during the batch see fresh
    /// derived values; plain effects wait for the outermost batch to close. True cyclic
    /// re-entry is caught by [`StoreInner::is_running`] inside [`Effect::run`], not here.
    ///
    /// A memo's write can itself call back into `flush` (its hidden signal has subscribers
    /// of its own). If that nested call were allowed to run the plain-effect phase, an
    /// effect depending on several sibling memos could run after only some of them had
    /// recomputed — a torn read. `updating` guards against that: a nested call made while
    /// the memo phase is draining returns immediately, leaving the effects it scheduled for
    /// this call's own loop to pick up, so every pending memo is recomputed before any plain
    /// effect runs.
    pub(crate) fn flush(&self) -> Result<(), ReactorError> {
        if self.updating.get() {
            return Ok(());
        }
        self.updating.set(true);
        let mut memo_result = Ok(());
        loop {
            let memos = self.pending.borrow_mut().drain_matching(EffectKind::Memo);
            if memos.is_empty() {
                break;
            }
            if let Err(err) = run_all(&memos) {
                memo_result = Err(err);
                break;
            }
        }
        self.updating.set(false);
        memo_result?;

        if self.batch_depth.get() > 0 {
            return Ok(());
        }

        let plain = self.pending.borrow_mut().drain_all();
        run_all(&plain)
    }

    fn begin_batch(&self) {
        self.batch_depth.set(self.batch_depth.get() + 1);
    }

    /// Decrements the batch depth and, if it has returned to zero, flushes. Returns any
    /// error the flush produced.
    fn end_batch(&self) -> Result<(), ReactorError> {
        let depth = self.batch_depth.get().saturating_sub(1);
        self.batch_depth.set(depth);
        if depth == 0 {
            self.flush()
        } else {
            Ok(())
        }
    }
}

fn run_all(effects: &[Rc<EffectInner>]) -> Result<(), ReactorError> {
    for effect in effects {
        Effect::run(effect)?;
    }
    Ok(())
}

/// RAII guard backing [`Store::batch`]. Ensures the batch depth is decremented — and the
/// outermost-exit flush still invoked — even if the batched closure panics. The common,
/// non-panicking path calls [`BatchGuard::disarm`] and performs the decrement/flush itself
/// so it can surface the flush's `Result`; a flush error encountered while unwinding has no
/// live caller to propagate to and is logged instead.
struct BatchGuard {
    store: Rc<StoreInner>,
    active: bool,
}

impl BatchGuard {
    fn disarm(mut self) {
        self.active = false;
    }
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        if self.active {
            if let Err(err) = self.store.end_batch() {
                log::error!("error flushing effects after batch unwound: {err}");
            }
        }
    }
}

/// An isolated reactive universe. Effects created through one `Store` never respond to
/// signals created through another.
#[derive(Clone)]
pub struct Store {
    pub(crate) inner: Rc<StoreInner>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Create a fresh, independent store.
    pub fn new() -> Self {
        Self { inner: Rc::new(StoreInner::new()) }
    }

    /// Create a new signal, returning `(read, update)` handles over the same cell.
    pub fn signal<T: Clone + PartialEq + 'static>(
        &self,
        initial: T,
    ) -> (ReadSignal<T>, WriteSignal<T>) {
        Signal::create(self.inner.clone(), initial, SignalOptions::default())
    }

    /// Create a new signal with explicit [`SignalOptions`] (e.g. a custom `equals`).
    pub fn signal_with_options<T: Clone + PartialEq + 'static>(
        &self,
        initial: T,
        options: SignalOptions<T>,
    ) -> (ReadSignal<T>, WriteSignal<T>) {
        Signal::create(self.inner.clone(), initial, options)
    }

    /// Create a memo: a read-only derived signal recomputed whenever a tracked dependency
    /// changes, short-circuited by its equality predicate.
    pub fn memo<T: Clone + PartialEq + 'static>(
        &self,
        compute: impl FnMut() -> T + 'static,
    ) -> Result<ReadSignal<T>, ReactorError> {
        memo::create_memo(self.inner.clone(), compute, MemoOptions::default())
    }

    /// Create a memo with explicit [`MemoOptions`] (custom equality, abort token).
    pub fn memo_with_options<T: Clone + PartialEq + 'static>(
        &self,
        compute: impl FnMut() -> T + 'static,
        options: MemoOptions<T>,
    ) -> Result<ReadSignal<T>, ReactorError> {
        memo::create_memo(self.inner.clone(), compute, options)
    }

    /// Create an effect: runs `body` once immediately, then again whenever a signal it read
    /// changes. Returns a cancel handle.
    pub fn effect(
        &self,
        body: impl FnMut(&EffectContext) -> crate::effect::EffectResult + 'static,
    ) -> Result<EffectHandle, ReactorError> {
        Effect::create(self.inner.clone(), EffectKind::Plain, body, EffectOptions::default())
    }

    /// Create an effect with explicit [`EffectOptions`] (e.g. an abort token).
    pub fn effect_with_options(
        &self,
        body: impl FnMut(&EffectContext) -> crate::effect::EffectResult + 'static,
        options: EffectOptions,
    ) -> Result<EffectHandle, ReactorError> {
        Effect::create(self.inner.clone(), EffectKind::Plain, body, options)
    }

    /// Defer flushing until the outermost `batch` call returns. Nested batches collapse:
    /// only the outermost exit flushes.
    pub fn batch<T>(&self, f: impl FnOnce() -> T) -> Result<T, ReactorError> {
        self.inner.begin_batch();
        let guard = BatchGuard { store: self.inner.clone(), active: true };
        let result = f();
        guard.disarm();
        self.inner.end_batch()?;
        Ok(result)
    }

    /// Run `reader` without installing any dependency edges for the signal reads it
    /// performs, then restore the previous tracking state (even if `reader` panics).
    pub fn untracked<T>(&self, reader: impl FnOnce() -> T) -> T {
        let previous = self.inner.tracking.replace(false);
        struct RestoreTracking<'a>(&'a Cell<bool>, bool);
        impl Drop for RestoreTracking<'_> {
            fn drop(&mut self) {
                self.0.set(self.1);
            }
        }
        let _restore = RestoreTracking(&self.inner.tracking, previous);
        reader()
    }

    /// Tear down every live effect in the store. Safe to call at any time; afterward,
    /// signals remain usable as plain storage with no observers.
    pub fn unlink(&self) {
        let weak_effects: Vec<_> = self.inner.registry.borrow().values().cloned().collect();
        for weak in weak_effects {
            if let Some(effect) = weak.upgrade() {
                Effect::cancel(&effect);
            }
        }
        self.inner.registry.borrow_mut().clear();
    }
}
