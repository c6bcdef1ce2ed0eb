//! Error types returned from the reactive scheduler's fallible entry points.

use std::fmt;

/// A boxed error raised by a user effect body.
pub type BodyError = Box<dyn std::error::Error>;

/// Errors that can surface from [`crate::Store::effect`], [`crate::Signal::update`], and
/// [`crate::Store::batch`].
#[derive(thiserror::Error)]
pub enum ReactorError {
    /// An effect would have re-entered itself, directly or transitively, during its own
    /// run. The offending effect's dependency edges are cleaned up before this is raised.
    #[error("cyclic dependency detected while running effect {effect_id}")]
    CyclicDependency {
        /// Identity of the effect whose re-entry was detected.
        effect_id: u64,
    },

    /// A user effect body returned an error. Its dependency edges are cleaned up (no
    /// partial dependency state is left behind) before this is raised.
    #[error("effect body failed: {source}")]
    BodyFailure {
        #[source]
        source: BodyError,
    },
}

impl fmt::Debug for ReactorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CyclicDependency { effect_id } => {
                f.debug_struct("CyclicDependency").field("effect_id", effect_id).finish()
            }
            Self::BodyFailure { source } => {
                f.debug_struct("BodyFailure").field("source", source).finish()
            }
        }
    }
}
