//! The ordered collection of observables the engine samples.

use super::accumulators::Accumulator;
use super::errors::{Error, Result};
use super::estimators::EstimatorType;
use super::observables::ObservableFunction;
use super::walker::WalkerState;

struct Entry {
    accu: Box<dyn Accumulator>,
    estimator: EstimatorType,
    flag_equil: bool,
    flag_pdf: bool,
}

/// Paired accumulators and estimators, in registration order.
///
/// The container orchestrates the per-step work of all observables and the
/// final statistical reduction; results are laid out contiguously, entry
/// `i` occupying `nobs_i` slots starting at the sum of its predecessors'.
pub struct ObservableContainer {
    entries: Vec<Entry>,
    nobsdim: usize,
}

impl Default for ObservableContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl ObservableContainer {
    /// Creates an empty container.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            nobsdim: 0,
        }
    }

    /// Appends an accumulator/estimator pair. `flag_equil` opts the
    /// observable into automatic equilibration, `flag_pdf` declares that it
    /// reads the sampling density when evaluated.
    pub fn push(
        &mut self,
        accu: Box<dyn Accumulator>,
        estimator: EstimatorType,
        flag_equil: bool,
        flag_pdf: bool,
    ) {
        self.nobsdim += accu.nobs();
        self.entries.push(Entry {
            accu,
            estimator,
            flag_equil,
            flag_pdf,
        });
    }

    /// Removes the most recently added observable and hands it back.
    pub fn pop(&mut self) -> Option<Box<dyn ObservableFunction>> {
        self.entries.pop().map(|entry| {
            self.nobsdim -= entry.accu.nobs();
            entry.accu.into_observable()
        })
    }

    /// Number of registered observables.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no observable is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total result dimension, the sum of all observables' `nobs`.
    pub fn nobsdim(&self) -> usize {
        self.nobsdim
    }

    /// The registered observable `i`.
    pub fn observable(&self, i: usize) -> &dyn ObservableFunction {
        self.entries[i].accu.observable()
    }

    /// The estimator paired with observable `i`.
    pub fn estimator(&self, i: usize) -> EstimatorType {
        self.entries[i].estimator
    }

    /// Whether observable `i` participates in automatic equilibration.
    pub fn flag_equil(&self, i: usize) -> bool {
        self.entries[i].flag_equil
    }

    /// The stride of observable `i`.
    pub fn nskip(&self, i: usize) -> usize {
        self.entries[i].accu.nskip()
    }

    /// Whether any registered observable reads the sampling density.
    pub fn depends_on_pdf(&self) -> bool {
        self.entries.iter().any(|e| e.flag_pdf)
    }

    /// Common stride divisor of the PDF-reading observables (the gcd of
    /// their `nskip` values), or 0 when there are none.
    pub fn nskip_pdf(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.flag_pdf)
            .fold(0, |acc, e| gcd(acc, e.accu.nskip()))
    }

    /// Allocates every accumulator for a run of `nmc` steps.
    pub fn allocate(&mut self, nmc: usize) -> Result<()> {
        for entry in &mut self.entries {
            entry.accu.allocate(nmc)?;
        }
        Ok(())
    }

    /// Feeds the walker step to every accumulator.
    pub fn accumulate(&mut self, wlk: &WalkerState) {
        for entry in &mut self.entries {
            entry.accu.accumulate(wlk);
        }
    }

    /// Finalizes every accumulator.
    pub fn finalize(&mut self) -> Result<()> {
        for entry in &mut self.entries {
            entry.accu.finalize()?;
        }
        Ok(())
    }

    /// Runs every estimator on its finalized data, filling `average` and
    /// `error` (both of length [`nobsdim`](Self::nobsdim)).
    pub fn estimate(&self, average: &mut [f64], error: &mut [f64]) -> Result<()> {
        debug_assert_eq!(average.len(), self.nobsdim);
        debug_assert_eq!(error.len(), self.nobsdim);
        let mut offset = 0;
        for entry in &self.entries {
            if entry.accu.is_allocated() && !entry.accu.is_finalized() {
                return Err(Error::AccumulatorState(
                    "estimator called before finalize",
                ));
            }
            let nobs = entry.accu.nobs();
            entry.estimator.estimate(
                entry.accu.data(),
                nobs,
                &mut average[offset..offset + nobs],
                &mut error[offset..offset + nobs],
            );
            offset += nobs;
        }
        Ok(())
    }

    /// Resets every accumulator for a fresh accumulation.
    pub fn reset(&mut self) {
        for entry in &mut self.entries {
            entry.accu.reset();
        }
    }

    /// Releases every accumulator's data buffer.
    pub fn deallocate(&mut self) {
        for entry in &mut self.entries {
            entry.accu.deallocate();
        }
    }

    /// The most recently evaluated values of every observable, in
    /// registration order.
    pub fn obs_values(&self) -> impl Iterator<Item = &[f64]> + '_ {
        self.entries.iter().map(|e| e.accu.obs_values())
    }
}

fn gcd(a: usize, b: usize) -> usize {
    if a == 0 {
        b
    } else {
        gcd(b % a, a)
    }
}
