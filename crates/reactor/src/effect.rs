//! Effects: closures that run once immediately and then re-run whenever a signal they read
//! during their last run changes.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::error::{BodyError, ReactorError};
use crate::store::{EffectId, StoreInner};

/// A cleanup registered via [`EffectContext::on_cleanup`]. Runs before the effect's next run
/// and on cancellation. A cleanup that fails is logged, never propagated — there is no live
/// caller to propagate to by the time it runs.
pub type Cleanup = Box<dyn FnOnce() -> Result<(), BodyError>>;

/// What an effect body returns: nothing on success, or an error that aborts this run, tears
/// the effect down, and surfaces to whoever triggered it (a direct `Store::effect` call, a
/// signal write, or a batch).
pub type EffectResult = Result<(), BodyError>;

type Body = Box<dyn FnMut(&EffectContext) -> EffectResult>;

/// Distinguishes a user-visible effect from the internal effect that backs a memo, so the
/// scheduler can flush memos before plain effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
    Plain,
    Memo,
}

/// A synchronous, idempotent cancellation flag. Shared between an effect's internal state,
/// the [`EffectContext`] passed to its body, and any external token supplied through
/// [`EffectOptions::abort`] — cancelling any one of them cancels them all.
#[derive(Clone, Default)]
pub struct AbortToken {
    cancelled: Rc<Cell<bool>>,
}

impl AbortToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

/// Passed to a running effect body. Lets the body register a cleanup, check whether it has
/// been cancelled, or cancel its own future re-runs.
pub struct EffectContext {
    effect: Weak<EffectInner>,
    abort: AbortToken,
}

impl EffectContext {
    fn new(effect: &Rc<EffectInner>) -> Self {
        Self { effect: Rc::downgrade(effect), abort: effect.abort.clone() }
    }

    /// Stop this effect from re-running after the current run finishes. Does not affect
    /// this run's own return value: a cleanup registered before calling `cancel` still
    /// fires, and an error this run returns is still raised.
    pub fn cancel(&self) {
        self.abort.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.abort.is_cancelled()
    }

    /// Register `cleanup` to run before this effect's next run, or on cancellation,
    /// whichever comes first. May be called more than once per run; all registered
    /// cleanups run, in registration order, before the next run's body.
    pub fn on_cleanup(&self, cleanup: impl FnOnce() -> Result<(), BodyError> + 'static) {
        if let Some(effect) = self.effect.upgrade() {
            effect.cleanups.borrow_mut().push(Box::new(cleanup));
        }
    }
}

/// Options controlling effect (and, transitively, memo) creation.
#[derive(Default)]
pub struct EffectOptions {
    /// Share this effect's cancellation with an externally-held token.
    pub abort: Option<AbortToken>,
}

/// A closure that, when called, removes this effect from one signal's subscriber list.
/// Re-collected on every run so a branch the body stops reading is dropped as a dependency.
type DependencyUnlinker = Box<dyn Fn()>;

pub(crate) struct EffectInner {
    pub(crate) id: EffectId,
    pub(crate) kind: EffectKind,
    store: Rc<StoreInner>,
    body: RefCell<Body>,
    abort: AbortToken,
    valid: Cell<bool>,
    cleanups: RefCell<Vec<Cleanup>>,
    dependencies: RefCell<Vec<DependencyUnlinker>>,
}

impl EffectInner {
    #[cfg(test)]
    pub(crate) fn new_for_test(
        id: EffectId,
        kind: EffectKind,
        store: Rc<StoreInner>,
        body: impl FnMut(&EffectContext) -> EffectResult + 'static,
    ) -> Self {
        Self {
            id,
            kind,
            store,
            body: RefCell::new(Box::new(body)),
            abort: AbortToken::new(),
            valid: Cell::new(true),
            cleanups: RefCell::new(Vec::new()),
            dependencies: RefCell::new(Vec::new()),
        }
    }
}

/// A handle to a created effect. Does not own the effect's lifetime: the effect keeps
/// running (reachable from the store's registry and from every signal it reads) until
/// cancelled through this handle or torn down by [`crate::Store::unlink`].
#[derive(Clone)]
pub struct EffectHandle {
    inner: Rc<EffectInner>,
}

impl EffectHandle {
    /// Tear the effect down: run its pending cleanups, drop its dependency edges, and
    /// remove it from the store registry. Idempotent.
    pub fn cancel(&self) {
        Effect::cancel(&self.inner);
    }

    pub fn is_cancelled(&self) -> bool {
        !self.inner.valid.get()
    }
}

/// Namespace for effect lifecycle operations. Effects have no public constructor other than
/// [`crate::Store::effect`] and [`crate::Store::memo`].
pub(crate) struct Effect;

impl Effect {
    pub(crate) fn create(
        store: Rc<StoreInner>,
        kind: EffectKind,
        body: impl FnMut(&EffectContext) -> EffectResult + 'static,
        options: EffectOptions,
    ) -> Result<EffectHandle, ReactorError> {
        let inner = Rc::new(EffectInner {
            id: EffectId::next(),
            kind,
            store: store.clone(),
            body: RefCell::new(Box::new(body)),
            abort: options.abort.unwrap_or_default(),
            valid: Cell::new(true),
            cleanups: RefCell::new(Vec::new()),
            dependencies: RefCell::new(Vec::new()),
        });
        store.register(&inner);
        Effect::run(&inner)?;
        Ok(EffectHandle { inner })
    }

    /// Run (or re-run) `effect`: runs any cleanups left over from its previous run, installs
    /// it as the current observer (so any signal read during the body records a dependency
    /// edge back to it), then invokes the body. An effect found already on the observer
    /// stack is a direct or transitive cyclic dependency.
    pub(crate) fn run(effect: &Rc<EffectInner>) -> Result<(), ReactorError> {
        if !effect.valid.get() || effect.abort.is_cancelled() {
            return Ok(());
        }
        if effect.store.is_running(effect) {
            return Err(ReactorError::CyclicDependency { effect_id: effect.id.get() });
        }

        run_cleanups(effect);
        unlink_dependencies(effect);

        effect.store.push_observer(effect.clone());
        let ctx = EffectContext::new(effect);
        let result = (effect.body.borrow_mut())(&ctx);
        effect.store.pop_observer();

        match result {
            Ok(()) => {
                if effect.abort.is_cancelled() {
                    Effect::cancel(effect);
                }
                Ok(())
            }
            Err(source) => {
                Effect::cancel(effect);
                // A `ReactorError` that escaped a nested scheduler call (most commonly a
                // `CyclicDependency` raised by a write the body made into one of its own
                // dependencies) is unwrapped and re-raised as itself rather than buried
                // inside `BodyFailure` — only a genuine user error gets wrapped.
                match source.downcast::<ReactorError>() {
                    Ok(reactor_err) => Err(*reactor_err),
                    Err(source) => Err(ReactorError::BodyFailure { source }),
                }
            }
        }
    }

    /// Mark `effect` invalid, run its pending cleanups, and drop it from the store registry.
    /// Idempotent: cancelling an already-cancelled effect does nothing.
    pub(crate) fn cancel(effect: &Rc<EffectInner>) {
        if !effect.valid.get() {
            return;
        }
        effect.valid.set(false);
        effect.abort.cancel();
        run_cleanups(effect);
        unlink_dependencies(effect);
        effect.store.unregister(effect.id);
    }

    /// Queue `effect` for the next flush, unless it has already been cancelled.
    pub(crate) fn schedule(effect: &Rc<EffectInner>) {
        if effect.valid.get() {
            effect.store.schedule(effect.clone());
        }
    }

    /// Register a cleanup on `effect` from outside its own body — used by the default
    /// store's free `on_cleanup` function, which has no `EffectContext` in hand.
    pub(crate) fn register_cleanup(effect: &Rc<EffectInner>, cleanup: Cleanup) {
        effect.cleanups.borrow_mut().push(cleanup);
    }

    /// Record that `unlinker` must run to detach `effect` from a signal it has just read.
    /// Called by [`crate::signal`] the first time a given signal is read during a run.
    pub(crate) fn add_dependency_unlinker(effect: &Rc<EffectInner>, unlinker: DependencyUnlinker) {
        effect.dependencies.borrow_mut().push(unlinker);
    }
}

fn run_cleanups(effect: &Rc<EffectInner>) {
    let pending: Vec<Cleanup> = effect.cleanups.borrow_mut().drain(..).collect();
    for cleanup in pending {
        if let Err(err) = cleanup() {
            log::error!("cleanup for effect {} failed: {err}", effect.id.get());
        }
    }
}

/// Detach `effect` from every signal it read on its previous run, so a run that stops
/// reading a branch drops that dependency instead of leaving a stale subscription behind.
fn unlink_dependencies(effect: &Rc<EffectInner>) {
    let stale: Vec<DependencyUnlinker> = effect.dependencies.borrow_mut().drain(..).collect();
    for unlink in stale {
        unlink();
    }
}
