//! The error taxonomy of the crate.
//!
//! Structural and parameter errors surface immediately and leave the engine
//! untouched. Statistical convergence problems are not errors: they are
//! reported on the `log` channel and the best-effort result is returned.

use thiserror::Error;

/// Everything that can go wrong when configuring or running an integration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A component was registered whose input dimension does not match the
    /// number of walker dimensions the engine was created with.
    #[error("dimension mismatch: component has {found} dimensions, engine runs {expected}")]
    DimensionMismatch {
        /// The engine's number of walker dimensions.
        expected: usize,
        /// The dimension reported by the offending component.
        found: usize,
    },

    /// `integrate` was called on an infinite domain without any sampling
    /// function; uniform sampling requires a finite volume.
    #[error("integrating over an infinite domain requires a sampling function")]
    InfiniteDomainWithoutPdf,

    /// An accumulator operation was invoked outside its lifecycle contract,
    /// e.g. estimating before `finalize`.
    #[error("accumulator used outside its lifecycle: {0}")]
    AccumulatorState(&'static str),

    /// A configuration parameter is invalid in context.
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
