//! Signals: the mutable reactive cells that effects and memos observe.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::effect::{Effect, EffectInner};
use crate::error::ReactorError;
use crate::store::StoreInner;

/// A shared equality predicate deciding whether a write actually changed the value (and so
/// whether subscribers are notified at all).
pub type EqualityFn<T> = Rc<dyn Fn(&T, &T) -> bool>;

/// Options controlling signal creation. The default equality is `PartialEq::eq`; supply a
/// custom `equals` — e.g. backed by [`reactor_core::deep_equal`] — to opt into structural or
/// any other notion of sameness.
pub struct SignalOptions<T> {
    pub equals: Option<EqualityFn<T>>,
}

impl<T> Default for SignalOptions<T> {
    fn default() -> Self {
        Self { equals: None }
    }
}

impl<T> Clone for SignalOptions<T> {
    fn clone(&self) -> Self {
        Self { equals: self.equals.clone() }
    }
}

pub(crate) struct SignalInner<T> {
    value: RefCell<T>,
    equals: EqualityFn<T>,
    subscribers: RefCell<Vec<Weak<EffectInner>>>,
    store: Rc<StoreInner>,
}

impl<T: 'static> SignalInner<T> {
    /// Schedule every live subscriber for the next flush, pruning dead ones in the process.
    fn notify(&self) {
        let mut subscribers = self.subscribers.borrow_mut();
        subscribers.retain(|weak| weak.upgrade().is_some());
        let live: Vec<Rc<EffectInner>> =
            subscribers.iter().filter_map(|weak| weak.upgrade()).collect();
        drop(subscribers);
        for effect in live {
            Effect::schedule(&effect);
        }
    }
}

/// Record a dependency edge from the currently-running effect, if any, to `signal`, and
/// register the matching unlinker on the effect so a later run that stops reading `signal`
/// drops the edge instead of leaving a stale subscription behind. A no-op outside any
/// effect, and inside [`crate::Store::untracked`].
fn track<T: 'static>(signal: &Rc<SignalInner<T>>) {
    let Some(observer) = signal.store.current_observer() else {
        return;
    };
    let already = {
        let subscribers = signal.subscribers.borrow();
        subscribers
            .iter()
            .any(|weak| weak.upgrade().is_some_and(|existing| Rc::ptr_eq(&existing, &observer)))
    };
    if already {
        return;
    }
    signal.subscribers.borrow_mut().push(Rc::downgrade(&observer));

    let signal_for_unlink = signal.clone();
    let observer_for_unlink = Rc::downgrade(&observer);
    Effect::add_dependency_unlinker(
        &observer,
        Box::new(move || {
            let Some(observer) = observer_for_unlink.upgrade() else {
                return;
            };
            signal_for_unlink
                .subscribers
                .borrow_mut()
                .retain(|weak| !weak.upgrade().is_some_and(|e| Rc::ptr_eq(&e, &observer)));
        }),
    );
}

/// The read half of a signal. Reading installs a dependency edge on the currently-running
/// effect, if any.
pub struct ReadSignal<T> {
    inner: Rc<SignalInner<T>>,
}

impl<T> Clone for ReadSignal<T> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

/// The write half of a signal.
pub struct WriteSignal<T> {
    inner: Rc<SignalInner<T>>,
}

impl<T> Clone for WriteSignal<T> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

/// Read access to a signal, named so call sites can write `signal.get()` without importing
/// [`ReadSignal`] by name.
pub trait SignalRead<T> {
    /// Read the current value, tracking this access if called from within an effect body.
    fn get(&self) -> T;
    /// Read the current value without tracking, regardless of the ambient tracking state.
    fn get_untracked(&self) -> T;
}

/// Write access to a signal. Both methods run the equality check, and — if the value
/// changed — synchronously flush memos and (outside a batch) plain effects, surfacing any
/// resulting cyclic-dependency or body error to the caller.
pub trait SignalWrite<T> {
    fn set(&self, value: T) -> Result<(), ReactorError>;
    fn update(&self, f: impl FnOnce(&T) -> T) -> Result<(), ReactorError>;
}

pub(crate) struct Signal;

impl Signal {
    pub(crate) fn create<T: Clone + PartialEq + 'static>(
        store: Rc<StoreInner>,
        initial: T,
        options: SignalOptions<T>,
    ) -> (ReadSignal<T>, WriteSignal<T>) {
        let equals =
            options.equals.unwrap_or_else(|| Rc::new(|a: &T, b: &T| a == b) as EqualityFn<T>);
        let inner = Rc::new(SignalInner {
            value: RefCell::new(initial),
            equals,
            subscribers: RefCell::new(Vec::new()),
            store,
        });
        (ReadSignal { inner: inner.clone() }, WriteSignal { inner })
    }
}

impl<T: Clone + 'static> SignalRead<T> for ReadSignal<T> {
    fn get(&self) -> T {
        track(&self.inner);
        self.inner.value.borrow().clone()
    }

    fn get_untracked(&self) -> T {
        self.inner.value.borrow().clone()
    }
}

impl<T: Clone + 'static> SignalWrite<T> for WriteSignal<T> {
    fn set(&self, value: T) -> Result<(), ReactorError> {
        let changed = {
            let mut current = self.inner.value.borrow_mut();
            let changed = !(self.inner.equals)(&current, &value);
            if changed {
                *current = value;
            }
            changed
        };
        if changed {
            self.inner.notify();
            self.inner.store.flush()?;
        }
        Ok(())
    }

    fn update(&self, f: impl FnOnce(&T) -> T) -> Result<(), ReactorError> {
        let next = {
            let current = self.inner.value.borrow();
            f(&current)
        };
        self.set(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[test]
    fn default_equality_skips_notification_for_equal_values() {
        let store = Store::new();
        let (_read, write) = store.signal(1);
        let effect_runs = Rc::new(std::cell::Cell::new(0));
        let runs = effect_runs.clone();
        let (read2, write2) = store.signal(1);
        store
            .effect(move |_ctx| {
                runs.set(runs.get() + 1);
                let _ = read2.get();
                Ok(())
            })
            .unwrap();
        assert_eq!(effect_runs.get(), 1);
        write2.set(1).unwrap();
        assert_eq!(effect_runs.get(), 1, "setting an equal value must not notify");
        write2.set(2).unwrap();
        assert_eq!(effect_runs.get(), 2);
        write.set(99).unwrap();
    }

    #[test]
    fn custom_equality_can_treat_distinct_values_as_equal() {
        let store = Store::new();
        let always_equal: EqualityFn<i32> = Rc::new(|_a, _b| true);
        let (read, write) =
            store.signal_with_options(0, SignalOptions { equals: Some(always_equal) });
        let runs = Rc::new(std::cell::Cell::new(0));
        let runs_clone = runs.clone();
        store
            .effect(move |_ctx| {
                runs_clone.set(runs_clone.get() + 1);
                let _ = read.get();
                Ok(())
            })
            .unwrap();
        write.set(1).unwrap();
        assert_eq!(runs.get(), 1, "custom equals always reports equal, so no re-run");
    }

    #[test]
    fn get_untracked_does_not_install_a_dependency_edge() {
        let store = Store::new();
        let (read, write) = store.signal(0);
        let runs = Rc::new(std::cell::Cell::new(0));
        let runs_clone = runs.clone();
        store
            .effect(move |_ctx| {
                runs_clone.set(runs_clone.get() + 1);
                let _ = read.get_untracked();
                Ok(())
            })
            .unwrap();
        write.set(1).unwrap();
        assert_eq!(runs.get(), 1, "untracked read must not subscribe the effect");
    }
}
