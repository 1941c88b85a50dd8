//! The core module: walker state, domains, proto values, contracts for
//! sampling functions, trial moves and observables, the accumulator and
//! estimator machinery, and the run result type.

pub mod accumulators;
pub mod domain;
pub mod errors;
pub mod estimators;
pub mod moves;
pub mod observables;
pub mod proto;
pub mod sampling;
pub mod walker;

mod container;

pub use self::accumulators::{
    Accumulator, BlockAccumulator, FullAccumulator, SimpleAccumulator,
};
pub use self::container::ObservableContainer;
pub use self::domain::{Domain, OrthoPeriodicDomain, UnboundedDomain};
pub use self::errors::{Error, Result};
pub use self::estimators::EstimatorType;
pub use self::moves::{GaussianAllMove, TrialMove, UniformAllMove, UniformSingleMove};
pub use self::observables::ObservableFunction;
pub use self::proto::ProtoValues;
pub use self::sampling::{PdfContainer, SamplingFunction};
pub use self::walker::WalkerState;

use serde::{Deserialize, Serialize};

/// The result of one integration run: per observable dimension the
/// estimated average and its standard error.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Estimate {
    average: Vec<f64>,
    error: Vec<f64>,
}

impl Estimate {
    /// Bundles matching average and error vectors.
    pub fn new(average: Vec<f64>, error: Vec<f64>) -> Self {
        debug_assert_eq!(average.len(), error.len());
        Self { average, error }
    }

    /// The estimated averages, one entry per observable dimension.
    pub fn average(&self) -> &[f64] {
        &self.average
    }

    /// The standard errors matching [`average`](Self::average).
    pub fn error(&self) -> &[f64] {
        &self.error
    }

    /// Total observable dimension.
    pub fn nobsdim(&self) -> usize {
        self.average.len()
    }

    /// Scales averages and errors by `factor` (used for the volume scaling
    /// of uniform-sampling runs).
    pub(crate) fn scale(&mut self, factor: f64) {
        for a in &mut self.average {
            *a *= factor;
        }
        for e in &mut self.error {
            *e *= factor;
        }
    }
}

/// Combines the estimates of independent engine instances: averages are
/// averaged arithmetically, errors are combined as `sqrt(sum err^2) / N`
/// elementwise.
///
/// All estimates must have the same dimension and `estimates` must not be
/// empty.
pub fn reduce(estimates: &[Estimate]) -> Estimate {
    assert!(!estimates.is_empty());
    let nobsdim = estimates[0].nobsdim();
    let n = estimates.len() as f64;

    let mut average = vec![0.; nobsdim];
    let mut error = vec![0.; nobsdim];
    for est in estimates {
        debug_assert_eq!(est.nobsdim(), nobsdim);
        for (a, &v) in average.iter_mut().zip(est.average()) {
            *a += v;
        }
        for (e, &v) in error.iter_mut().zip(est.error()) {
            *e += v * v;
        }
    }
    for a in &mut average {
        *a /= n;
    }
    for e in &mut error {
        *e = e.sqrt() / n;
    }

    Estimate::new(average, error)
}
