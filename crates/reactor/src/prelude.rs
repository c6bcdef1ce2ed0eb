//! Convenience re-export of the types and free functions most call sites need.
//!
//! ```
//! use reactor::prelude::*;
//! ```

pub use crate::default_store::{
    batch, effect, memo, on_cleanup, signal, signal_with_options, untracked,
};
pub use crate::effect::{AbortToken, EffectContext, EffectHandle, EffectOptions};
pub use crate::error::ReactorError;
pub use crate::memo::MemoOptions;
pub use crate::signal::{EqualityFn, ReadSignal, SignalOptions, SignalRead, SignalWrite, WriteSignal};
pub use crate::store::Store;
