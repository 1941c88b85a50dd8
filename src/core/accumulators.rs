//! Per-step buffering of observable values.
//!
//! An accumulator owns one observable and is the engine's communication
//! partner during sampling: it decides when the observable is evaluated
//! (honoring the `nskip` stride and the selective-update optimization) and
//! how the evaluations are stored. The three variants differ only in
//! storage: a single running sum, per-block sums, or the full history.
//!
//! Lifecycle: `allocate -> accumulate.. -> finalize -> data (-> reset ->
//! accumulate..) -> deallocate`, with `reset` and `deallocate` valid in any
//! state.

use super::errors::{Error, Result};
use super::observables::ObservableFunction;
use super::walker::WalkerState;

/// State and step-driver logic shared by all accumulator variants.
pub struct AccumulatorCore {
    obs: Box<dyn ObservableFunction>,
    flag_updobs: bool,
    nobs: usize,
    xndim: usize,
    nskip: usize,
    obs_values: Vec<f64>,
    flags_xchanged: Vec<bool>,
    nchanged: usize,
    nsteps: usize,
    data: Vec<f64>,
    stepidx: usize,
    skipidx: usize,
    flag_final: bool,
}

impl AccumulatorCore {
    fn new(obs: Box<dyn ObservableFunction>, nskip: usize) -> Self {
        let nobs = obs.nobs();
        let xndim = obs.ndim();
        let flag_updobs = obs.supports_update();
        let mut core = Self {
            obs,
            flag_updobs,
            nobs,
            xndim,
            nskip: nskip.max(1),
            obs_values: vec![0.; nobs],
            flags_xchanged: vec![false; xndim],
            nchanged: 0,
            nsteps: 0,
            data: Vec::new(),
            stepidx: 0,
            skipidx: 0,
            flag_final: false,
        };
        core.reset_state();
        core
    }

    fn naccu(&self) -> usize {
        if self.nsteps > 0 {
            1 + (self.nsteps - 1) / self.nskip
        } else {
            0
        }
    }

    /// Clears counters and pending values. A fresh accumulator marks every
    /// coordinate changed so the first accumulated step evaluates the
    /// observable in full.
    fn reset_state(&mut self) {
        self.stepidx = 0;
        self.skipidx = 0;
        self.flag_final = false;
        for v in &mut self.obs_values {
            *v = 0.;
        }
        for v in &mut self.data {
            *v = 0.;
        }
        for f in &mut self.flags_xchanged {
            *f = true;
        }
        self.nchanged = self.xndim;
    }

    /// Processes one walker step. Accumulates the change-set, evaluates the
    /// observable when the stride is due (selectively when possible, reusing
    /// the previous values when nothing changed) and returns the evaluation
    /// index to store at, or `None` for skipped steps.
    fn process(&mut self, wlk: &WalkerState) -> Option<usize> {
        debug_assert!(self.nsteps > 0 && self.stepidx < self.nsteps);
        debug_assert!(!self.flag_final);

        if wlk.accepted {
            if wlk.nchanged < self.xndim {
                for &i in &wlk.changed_idx[..wlk.nchanged] {
                    if !self.flags_xchanged[i] {
                        self.flags_xchanged[i] = true;
                        self.nchanged += 1;
                    }
                }
            } else {
                for f in &mut self.flags_xchanged {
                    *f = true;
                }
                self.nchanged = self.xndim;
            }
        }

        let stored = if self.skipidx == 0 {
            if self.nchanged > 0 {
                if self.flag_updobs && self.nchanged < self.xndim {
                    self.obs.updated_observable(
                        &wlk.xnew,
                        self.nchanged,
                        &self.flags_xchanged,
                        &mut self.obs_values,
                    );
                } else {
                    self.obs.observable_function(&wlk.xnew, &mut self.obs_values);
                }
                for f in &mut self.flags_xchanged {
                    *f = false;
                }
                self.nchanged = 0;
            }
            // an unchanged position reuses the previous values as they are
            Some(self.stepidx / self.nskip)
        } else {
            None
        };

        self.skipidx += 1;
        if self.skipidx == self.nskip {
            self.skipidx = 0;
        }
        self.stepidx += 1;
        stored
    }
}

/// The common interface of the accumulator variants.
///
/// Variants implement the storage hooks ([`n_store`](Self::n_store),
/// [`store`](Self::store), [`normalize`](Self::normalize),
/// [`on_allocate`](Self::on_allocate)); the lifecycle driver is provided.
pub trait Accumulator {
    /// Shared state, read access.
    fn core(&self) -> &AccumulatorCore;

    /// Shared state, write access.
    fn core_mut(&mut self) -> &mut AccumulatorCore;

    /// Number of stored observable vectors (0 when deallocated).
    fn n_store(&self) -> usize;

    /// Writes the current observable values at evaluation index `accuidx`.
    fn store(&mut self, accuidx: usize);

    /// Applies the finalization normalization to the stored data.
    fn normalize(&mut self);

    /// Variant hook run at the end of [`allocate`](Self::allocate).
    fn on_allocate(&mut self) -> Result<()> {
        Ok(())
    }

    /// Prepares the accumulator for a run of `nsteps` accumulation calls,
    /// releasing any previous allocation.
    fn allocate(&mut self, nsteps: usize) -> Result<()> {
        self.deallocate();
        if nsteps == 0 {
            return Err(Error::InvalidParameter(
                "accumulators must be allocated for at least one step",
            ));
        }
        self.core_mut().nsteps = nsteps;
        self.on_allocate()?;
        let ndata = self.n_store() * self.core().nobs;
        self.core_mut().data = vec![0.; ndata];
        Ok(())
    }

    /// Processes one sampling step described by the walker state.
    fn accumulate(&mut self, wlk: &WalkerState) {
        if let Some(accuidx) = self.core_mut().process(wlk) {
            self.store(accuidx);
        }
    }

    /// Normalizes the stored data. A no-op when deallocated or already
    /// finalized; an error when nothing has been accumulated yet.
    fn finalize(&mut self) -> Result<()> {
        if !self.is_allocated() || self.is_finalized() {
            return Ok(());
        }
        if self.is_clean() {
            return Err(Error::AccumulatorState(
                "finalize called before any accumulation",
            ));
        }
        self.normalize();
        self.core_mut().flag_final = true;
        Ok(())
    }

    /// Clears counters and data for a fresh accumulation, keeping the
    /// allocation. Valid in the deallocated state as well.
    fn reset(&mut self) {
        self.core_mut().reset_state();
    }

    /// Releases the data buffer and returns to the deallocated state.
    fn deallocate(&mut self) {
        self.reset();
        let core = self.core_mut();
        core.data = Vec::new();
        core.nsteps = 0;
    }

    /// The stored data, `n_store * nobs` values in row-major order.
    fn data(&self) -> &[f64] {
        &self.core().data
    }

    /// Total length of the stored data.
    fn n_data(&self) -> usize {
        self.n_store() * self.core().nobs
    }

    /// Dimension of the bound observable.
    fn nobs(&self) -> usize {
        self.core().nobs
    }

    /// Dimension of the walker positions.
    fn ndim(&self) -> usize {
        self.core().xndim
    }

    /// The evaluation stride.
    fn nskip(&self) -> usize {
        self.core().nskip
    }

    /// The planned number of accumulation calls (0 when deallocated).
    fn nsteps(&self) -> usize {
        self.core().nsteps
    }

    /// Number of observable evaluations in a full run.
    fn naccu(&self) -> usize {
        self.core().naccu()
    }

    /// The running step index.
    fn step_index(&self) -> usize {
        self.core().stepidx
    }

    /// Whether a data buffer is allocated.
    fn is_allocated(&self) -> bool {
        self.core().nsteps > 0
    }

    /// Whether no step has been accumulated since the last reset.
    fn is_clean(&self) -> bool {
        self.core().stepidx == 0
    }

    /// Whether `finalize` has completed on the current accumulation.
    fn is_finalized(&self) -> bool {
        self.core().flag_final
    }

    /// Whether the bound observable supports selective updates.
    fn is_updateable(&self) -> bool {
        self.core().flag_updobs
    }

    /// The most recently evaluated observable values.
    fn obs_values(&self) -> &[f64] {
        &self.core().obs_values
    }

    /// The bound observable.
    fn observable(&self) -> &dyn ObservableFunction {
        &*self.core().obs
    }

    /// Consumes the accumulator and hands the observable back.
    fn into_observable(self: Box<Self>) -> Box<dyn ObservableFunction>;
}

/// Accumulates everything into one running sum; finalize divides by the
/// number of evaluations. Stores a single observable vector.
pub struct SimpleAccumulator {
    core: AccumulatorCore,
}

impl SimpleAccumulator {
    /// Binds `obs`, evaluating it on every `nskip`-th step.
    pub fn new(obs: Box<dyn ObservableFunction>, nskip: usize) -> Self {
        Self {
            core: AccumulatorCore::new(obs, nskip),
        }
    }
}

impl Accumulator for SimpleAccumulator {
    fn core(&self) -> &AccumulatorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AccumulatorCore {
        &mut self.core
    }

    fn n_store(&self) -> usize {
        if self.core.nsteps > 0 {
            1
        } else {
            0
        }
    }

    fn store(&mut self, _accuidx: usize) {
        for (d, v) in self.core.data.iter_mut().zip(&self.core.obs_values) {
            *d += v;
        }
    }

    fn normalize(&mut self) {
        let norm = self.core.naccu() as f64;
        for d in &mut self.core.data {
            *d /= norm;
        }
    }

    fn into_observable(self: Box<Self>) -> Box<dyn ObservableFunction> {
        self.core.obs
    }
}

/// Accumulates into `nblocks` consecutive blocks; finalize divides each
/// block by its length. Evaluations beyond `nblocks * blocklen` are dropped
/// so a non-dividing step count cannot skew the block means.
pub struct BlockAccumulator {
    core: AccumulatorCore,
    nblocks: usize,
    blocklen: usize,
}

impl BlockAccumulator {
    /// Binds `obs` with `nblocks` storage blocks, evaluating it on every
    /// `nskip`-th step.
    pub fn new(obs: Box<dyn ObservableFunction>, nskip: usize, nblocks: usize) -> Self {
        Self {
            core: AccumulatorCore::new(obs, nskip),
            nblocks,
            blocklen: 0,
        }
    }

    /// The number of storage blocks.
    pub fn nblocks(&self) -> usize {
        self.nblocks
    }
}

impl Accumulator for BlockAccumulator {
    fn core(&self) -> &AccumulatorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AccumulatorCore {
        &mut self.core
    }

    fn n_store(&self) -> usize {
        if self.core.nsteps > 0 {
            self.nblocks
        } else {
            0
        }
    }

    fn on_allocate(&mut self) -> Result<()> {
        if self.nblocks == 0 || self.nblocks > self.core.naccu() {
            self.core.nsteps = 0;
            return Err(Error::InvalidParameter(
                "block accumulator needs between 1 and n-evaluations blocks",
            ));
        }
        self.blocklen = self.core.naccu() / self.nblocks;
        Ok(())
    }

    fn store(&mut self, accuidx: usize) {
        let bidx = accuidx / self.blocklen;
        if bidx < self.nblocks {
            let offset = bidx * self.core.nobs;
            for (d, v) in self.core.data[offset..offset + self.core.nobs]
                .iter_mut()
                .zip(&self.core.obs_values)
            {
                *d += v;
            }
        }
    }

    fn normalize(&mut self) {
        let norm = self.blocklen as f64;
        for d in &mut self.core.data {
            *d /= norm;
        }
    }

    fn into_observable(self: Box<Self>) -> Box<dyn ObservableFunction> {
        self.core.obs
    }
}

/// Stores every evaluation in insertion order; finalize is the identity.
pub struct FullAccumulator {
    core: AccumulatorCore,
}

impl FullAccumulator {
    /// Binds `obs`, evaluating it on every `nskip`-th step.
    pub fn new(obs: Box<dyn ObservableFunction>, nskip: usize) -> Self {
        Self {
            core: AccumulatorCore::new(obs, nskip),
        }
    }
}

impl Accumulator for FullAccumulator {
    fn core(&self) -> &AccumulatorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AccumulatorCore {
        &mut self.core
    }

    fn n_store(&self) -> usize {
        self.core.naccu()
    }

    fn store(&mut self, accuidx: usize) {
        let offset = accuidx * self.core.nobs;
        self.core.data[offset..offset + self.core.nobs].copy_from_slice(&self.core.obs_values);
    }

    fn normalize(&mut self) {}

    fn into_observable(self: Box<Self>) -> Box<dyn ObservableFunction> {
        self.core.obs
    }
}
