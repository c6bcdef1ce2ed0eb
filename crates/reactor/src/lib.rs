//! A framework-agnostic, fine-grained reactive state management core: signals, memos, and
//! effects with automatic dependency tracking, a two-phase flush, batching, untracked reads,
//! cyclic-dependency detection, and cooperative cancellation.
//!
//! Everything here is single-threaded (`!Send`, `!Sync`): a [`Store`] and the signals and
//! effects it creates are meant to live and run on one thread, the way the reactive runtimes
//! this crate is modeled on do.
//!
//! Most applications only need one reactive universe per thread; [`default_store`] provides
//! free functions (`signal`, `memo`, `effect`, `batch`, `untracked`, `on_cleanup`) over a
//! thread-local [`Store`] for that case. Anything needing more than one isolated universe —
//! tests that must not see each other's effects, for instance — should construct its own
//! [`Store`] directly.

pub mod default_store;
pub mod effect;
pub mod error;
pub mod memo;
pub mod signal;
pub mod store;

pub mod prelude;

pub use effect::{AbortToken, EffectContext, EffectHandle, EffectOptions, EffectResult};
pub use error::{BodyError, ReactorError};
pub use memo::MemoOptions;
pub use signal::{EqualityFn, ReadSignal, SignalOptions, SignalRead, SignalWrite, WriteSignal};
pub use store::Store;

pub use default_store::{
    batch, effect as create_effect, effect_with_options as create_effect_with_options,
    memo as create_memo, memo_with_options as create_memo_with_options, on_cleanup,
    signal as create_signal, signal_with_options as create_signal_with_options, untracked,
};

pub use reactor_core::{deep_equal, shallow_equal, DeepEqualOptions, PrimitiveComparator, Value};
