//! The Metropolis integration engine.

use rand::Rng;
use rand::SeedableRng;
use rand_pcg::Pcg64;

use crate::callbacks::{Callback, StepInfo};
use crate::core::accumulators::{
    Accumulator, BlockAccumulator, FullAccumulator, SimpleAccumulator,
};
use crate::core::domain::{Domain, UnboundedDomain};
use crate::core::errors::{Error, Result};
use crate::core::estimators::EstimatorType;
use crate::core::moves::{TrialMove, UniformAllMove};
use crate::core::observables::ObservableFunction;
use crate::core::sampling::{PdfContainer, SamplingFunction};
use crate::core::walker::WalkerState;
use crate::core::{Estimate, ObservableContainer};
use crate::sinks::{SinkConfig, StepWriter};

/// Default number of step-size tuning iterations (negative: automatic with
/// the absolute value as cap).
const DEFAULT_FIND_STEP_ITERATIONS: i32 = -50;
/// Default number of burn-in steps (negative: automatic with the absolute
/// value as cap).
const DEFAULT_DECORRELATION_STEPS: i64 = -10_000;
/// Default initial step size of the default trial move.
const DEFAULT_STEP_SIZE: f64 = 0.05;

/// The Metropolis Monte Carlo integrator.
///
/// Estimates integrals of the form `int g(x) p(x) dx` over the configured
/// domain, where `p` is the product of the registered sampling functions
/// driving a Metropolis random walk, and `g` covers the registered
/// observables. Without sampling functions the engine draws uniformly from
/// the (then necessarily finite) domain and scales results by its volume.
///
/// The engine owns its domain, trial move, sampling functions, observables
/// and RNG across [`integrate`](Self::integrate) calls; component setters
/// consume the new part and hand the displaced one back.
pub struct Metropolis<R: Rng> {
    ndim: usize,
    rgen: R,
    wlkstate: WalkerState,
    domain: Box<dyn Domain>,
    trial_move: Box<dyn TrialMove<R>>,
    pdfcont: PdfContainer,
    obscont: ObservableContainer,
    target_acc_rate: f64,
    n_find_step_iterations: i32,
    n_decorrelation_steps: i64,
    callback: Option<Box<dyn Callback>>,
    position_sink: Option<SinkConfig>,
    value_sink: Option<SinkConfig>,
    acc: u64,
    rej: u64,
    ridx: u64,
}

impl Metropolis<Pcg64> {
    /// Creates an engine for `ndim`-dimensional walkers with a [`Pcg64`]
    /// seeded from `seed`.
    pub fn with_seed(ndim: usize, seed: u64) -> Self {
        Self::new(ndim, Pcg64::seed_from_u64(seed))
    }
}

impl<R: Rng> Metropolis<R> {
    /// Creates an engine for `ndim`-dimensional walkers driven by `rgen`.
    ///
    /// Starts with an unbounded domain, a uniform all-dimensions trial move
    /// and automatic tuning/burn-in defaults.
    pub fn new(ndim: usize, rgen: R) -> Self {
        Self {
            ndim,
            rgen,
            wlkstate: WalkerState::new(ndim),
            domain: Box::new(UnboundedDomain::new(ndim)),
            trial_move: Box::new(UniformAllMove::new(ndim, DEFAULT_STEP_SIZE)),
            pdfcont: PdfContainer::new(),
            obscont: ObservableContainer::new(),
            target_acc_rate: 0.5,
            n_find_step_iterations: DEFAULT_FIND_STEP_ITERATIONS,
            n_decorrelation_steps: DEFAULT_DECORRELATION_STEPS,
            callback: None,
            position_sink: None,
            value_sink: None,
            acc: 0,
            rej: 0,
            ridx: 0,
        }
    }

    // --- Introspection

    /// Number of walker dimensions.
    pub fn ndim(&self) -> usize {
        self.ndim
    }

    /// Whether any sampling function is registered.
    pub fn has_pdf(&self) -> bool {
        self.pdfcont.has_pdf()
    }

    /// Total observable dimension of the registered observables.
    pub fn nobsdim(&self) -> usize {
        self.obscont.nobsdim()
    }

    /// The acceptance rate of the current (or last) sampling run; 0 before
    /// the first accepted step.
    pub fn acceptance_rate(&self) -> f64 {
        if self.acc > 0 {
            self.acc as f64 / (self.acc + self.rej) as f64
        } else {
            0.
        }
    }

    /// The walker position.
    pub fn position(&self) -> &[f64] {
        &self.wlkstate.xold
    }

    // --- Configuration

    /// Re-seeds the engine's RNG.
    pub fn set_seed(&mut self, seed: u64)
    where
        R: SeedableRng,
    {
        self.rgen = R::seed_from_u64(seed);
    }

    /// Sets the acceptance rate targeted by step-size tuning; must lie
    /// strictly between 0 and 1.
    pub fn set_target_acceptance_rate(&mut self, rate: f64) -> Result<()> {
        if rate <= 0. || rate >= 1. {
            return Err(Error::InvalidParameter(
                "target acceptance rate must lie strictly between 0 and 1",
            ));
        }
        self.target_acc_rate = rate;
        Ok(())
    }

    /// Sets the number of step-size tuning iterations: positive runs
    /// exactly that many, negative runs automatically with the absolute
    /// value as cap.
    pub fn set_find_step_iterations(&mut self, iterations: i32) {
        self.n_find_step_iterations = iterations;
    }

    /// Sets the number of burn-in steps: positive samples exactly that
    /// many, negative equilibrates the opted-in observables automatically
    /// with the absolute value as step cap, zero disables burn-in.
    pub fn set_decorrelation_steps(&mut self, steps: i64) {
        self.n_decorrelation_steps = steps;
    }

    /// Installs the per-step callback.
    pub fn set_callback(&mut self, callback: Box<dyn Callback>) {
        self.callback = Some(callback);
    }

    /// Removes the per-step callback.
    pub fn clear_callback(&mut self) {
        self.callback = None;
    }

    /// Writes the walker position to `path` every `freq`-th step of the
    /// next main sampling runs.
    pub fn store_positions_in(&mut self, path: impl AsRef<std::path::Path>, freq: u64) {
        self.position_sink = Some(SinkConfig::new(path, freq));
    }

    /// Stops writing walker positions.
    pub fn clear_position_sink(&mut self) {
        self.position_sink = None;
    }

    /// Writes the observable values to `path` every `freq`-th step of the
    /// next main sampling runs.
    pub fn store_values_in(&mut self, path: impl AsRef<std::path::Path>, freq: u64) {
        self.value_sink = Some(SinkConfig::new(path, freq));
    }

    /// Stops writing observable values.
    pub fn clear_value_sink(&mut self) {
        self.value_sink = None;
    }

    // --- Components

    /// Installs `domain`, returning the displaced one. The walker position
    /// is folded into the new domain.
    pub fn set_domain(&mut self, domain: Box<dyn Domain>) -> Result<Box<dyn Domain>> {
        if domain.ndim() != self.ndim {
            return Err(Error::DimensionMismatch {
                expected: self.ndim,
                found: domain.ndim(),
            });
        }
        let old = std::mem::replace(&mut self.domain, domain);
        self.domain.apply(&mut self.wlkstate.xold);
        Ok(old)
    }

    /// Reverts to the unbounded domain, returning the displaced one.
    pub fn reset_domain(&mut self) -> Box<dyn Domain> {
        std::mem::replace(
            &mut self.domain,
            Box::new(UnboundedDomain::new(self.ndim)),
        )
    }

    /// Installs `tmove`, returning the displaced one.
    pub fn set_trial_move(
        &mut self,
        tmove: Box<dyn TrialMove<R>>,
    ) -> Result<Box<dyn TrialMove<R>>> {
        if tmove.ndim() != self.ndim {
            return Err(Error::DimensionMismatch {
                expected: self.ndim,
                found: tmove.ndim(),
            });
        }
        Ok(std::mem::replace(&mut self.trial_move, tmove))
    }

    /// Registers a sampling function; the sampled density is the product of
    /// all registered ones.
    pub fn add_sampling_function(&mut self, pdf: Box<dyn SamplingFunction>) -> Result<()> {
        if pdf.ndim() != self.ndim {
            return Err(Error::DimensionMismatch {
                expected: self.ndim,
                found: pdf.ndim(),
            });
        }
        self.pdfcont.push(pdf);
        Ok(())
    }

    /// Removes and returns the most recently added sampling function.
    pub fn pop_sampling_function(&mut self) -> Option<Box<dyn SamplingFunction>> {
        self.pdfcont.pop()
    }

    /// Registers `obs` with `nblocks` storage blocks (0: no error bar, 1:
    /// full history, >1: pre-averaged blocks), evaluating every `nskip`-th
    /// step. `flag_equil` opts into automatic burn-in, `correlated` selects
    /// the autocorrelation-aware estimator.
    pub fn add_observable(
        &mut self,
        obs: Box<dyn ObservableFunction>,
        nblocks: usize,
        nskip: usize,
        flag_equil: bool,
        correlated: bool,
    ) -> Result<()> {
        let estimator = EstimatorType::select(correlated, nblocks);
        self.add_observable_with_estimator(obs, nblocks, nskip, flag_equil, estimator)
    }

    /// Like [`add_observable`](Self::add_observable) with an explicitly
    /// chosen estimator.
    pub fn add_observable_with_estimator(
        &mut self,
        obs: Box<dyn ObservableFunction>,
        nblocks: usize,
        nskip: usize,
        flag_equil: bool,
        estimator: EstimatorType,
    ) -> Result<()> {
        if obs.ndim() != self.ndim {
            return Err(Error::DimensionMismatch {
                expected: self.ndim,
                found: obs.ndim(),
            });
        }
        if flag_equil && !estimator.computes_error() {
            return Err(Error::InvalidParameter(
                "automatic equilibration requires an estimator with error calculation",
            ));
        }
        if estimator.computes_error() && nblocks == 0 {
            return Err(Error::InvalidParameter(
                "estimators with error calculation need at least one storage block",
            ));
        }
        let nskip = nskip.max(1);
        let flag_pdf = obs.depends_on_pdf();
        let accu: Box<dyn Accumulator> = match estimator {
            EstimatorType::Noop => Box::new(SimpleAccumulator::new(obs, nskip)),
            EstimatorType::FixedBlock => Box::new(BlockAccumulator::new(obs, nskip, nblocks)),
            EstimatorType::Uncorrelated => {
                if nblocks > 1 {
                    Box::new(BlockAccumulator::new(obs, nskip, nblocks))
                } else {
                    Box::new(FullAccumulator::new(obs, nskip))
                }
            }
            // blocking needs the raw per-step history: pre-averaged blocks
            // would destroy the levels the pair-averaging iterates over
            EstimatorType::Correlated => Box::new(FullAccumulator::new(obs, nskip)),
        };
        self.obscont.push(accu, estimator, flag_equil, flag_pdf);
        Ok(())
    }

    /// Removes the most recently added observable and hands it back.
    pub fn pop_observable(&mut self) -> Option<Box<dyn ObservableFunction>> {
        self.obscont.pop()
    }

    // --- Walker helpers

    /// Places the walker at `x` (folded into the domain).
    pub fn set_position(&mut self, x: &[f64]) -> Result<()> {
        if x.len() != self.ndim {
            return Err(Error::DimensionMismatch {
                expected: self.ndim,
                found: x.len(),
            });
        }
        self.wlkstate.xold.copy_from_slice(x);
        self.domain.apply(&mut self.wlkstate.xold);
        Ok(())
    }

    /// Draws a fresh uniform position within a finite domain (or the unit
    /// cube on an unbounded one).
    pub fn new_random_position(&mut self) {
        for x in &mut self.wlkstate.xnew {
            *x = self.rgen.gen();
        }
        self.domain.scale_to_domain(&mut self.wlkstate.xnew);
        self.wlkstate.mark_all_changed();
        self.wlkstate.new_to_old();
    }

    /// Applies one manual trial move to the stored position.
    pub fn move_position(&mut self) {
        self.wlkstate.initialize();
        self.trial_move
            .compute_trial_move(&mut self.wlkstate, &mut self.rgen);
        if self.wlkstate.nchanged < self.ndim {
            self.domain.apply_walker(&mut self.wlkstate);
        } else {
            self.domain.apply(&mut self.wlkstate.xnew);
        }
        self.wlkstate.new_to_old();
    }

    // --- Step sizes

    /// Sets every adjustable step size to `value`.
    pub fn set_step_size(&mut self, value: f64) {
        for i in 0..self.trial_move.n_step_sizes() {
            self.trial_move.set_step_size(i, value);
        }
    }

    /// Sets step size `i`; warns on a non-existing index.
    pub fn set_step_size_at(&mut self, i: usize, value: f64) {
        if i < self.trial_move.n_step_sizes() {
            self.trial_move.set_step_size(i, value);
        } else {
            log::warn!("tried to set non-existing step size index {}", i);
        }
    }

    /// Step size `i`, or 0 for a non-existing index.
    pub fn step_size(&self, i: usize) -> f64 {
        if i < self.trial_move.n_step_sizes() {
            self.trial_move.step_size(i)
        } else {
            0.
        }
    }

    // --- Integration

    /// Estimates the integral with `nmc` Monte Carlo steps.
    ///
    /// When a sampling function is registered, `do_tune_step` first tunes
    /// the trial-move step sizes towards the target acceptance rate and
    /// `do_decorrelate` runs burn-in. Requires a sampling function or a
    /// finite domain. Accumulator buffers live only for the duration of the
    /// call; they are released on every exit path.
    pub fn integrate(
        &mut self,
        nmc: usize,
        do_tune_step: bool,
        do_decorrelate: bool,
    ) -> Result<Estimate> {
        if !self.pdfcont.has_pdf() && !self.domain.is_finite() {
            return Err(Error::InfiniteDomainWithoutPdf);
        }

        if self.pdfcont.has_pdf() {
            if do_tune_step {
                self.find_step_sizes();
            }
            if do_decorrelate {
                self.initial_decorrelation()?;
            }
        }

        if nmc == 0 {
            return Ok(Estimate::new(Vec::new(), Vec::new()));
        }

        // the container is moved out for the duration of the run so the
        // sampling loop can borrow both it and the engine
        let mut container = std::mem::take(&mut self.obscont);
        let result = self.run_and_estimate(nmc, &mut container);
        container.deallocate();
        self.obscont = container;
        result
    }

    fn run_and_estimate(
        &mut self,
        nmc: usize,
        container: &mut ObservableContainer,
    ) -> Result<Estimate> {
        container.allocate(nmc)?;

        let mut psink = self.position_sink.as_ref().and_then(SinkConfig::open);
        let mut vsink = self.value_sink.as_ref().and_then(SinkConfig::open);
        self.sample_observed(nmc, container, &mut psink, &mut vsink)?;
        if let Some(w) = psink.as_mut() {
            w.flush();
        }
        if let Some(w) = vsink.as_mut() {
            w.flush();
        }

        let mut average = vec![0.; container.nobsdim()];
        let mut error = vec![0.; container.nobsdim()];
        container.estimate(&mut average, &mut error)?;

        let mut estimate = Estimate::new(average, error);
        if !self.pdfcont.has_pdf() {
            estimate.scale(self.domain.volume());
        }
        Ok(estimate)
    }

    // --- Step-size tuning

    /// Scales the trial-move step sizes until the acceptance rate meets the
    /// target. A no-op for moves without adjustable step sizes.
    fn find_step_sizes(&mut self) {
        if !self.trial_move.has_step_sizes() {
            return;
        }

        const MIN_CONS: usize = 5;
        const TOLERANCE: f64 = 0.05;
        let min_stat = (100f64).max((40_000. * self.ndim as f64).sqrt()) as usize;
        let smallest_step = f64::from(f32::MIN_POSITIVE);

        let n_step_sizes = self.trial_move.n_step_sizes();
        let mut dim_sizes = vec![0.; self.ndim];
        self.domain.sizes(&mut dim_sizes);
        let step_idx: Vec<usize> = (0..self.ndim)
            .map(|i| self.trial_move.step_size_index(i))
            .collect();

        let mut cons_count = 0;
        let mut counter = 0;
        while (self.n_find_step_iterations < 0 && cons_count < MIN_CONS)
            || counter < self.n_find_step_iterations
        {
            self.sample_plain(min_stat);
            let rate = self.acceptance_rate();

            let factor = (rate / self.target_acc_rate).max(0.5).min(2.);
            self.trial_move.scale_step_sizes(factor);

            // keep large steps within half the domain extent and small ones
            // representable
            for i in 0..self.ndim {
                if self.trial_move.step_size(step_idx[i]) > 0.5 * dim_sizes[i] {
                    self.trial_move.set_step_size(step_idx[i], 0.5 * dim_sizes[i]);
                }
            }
            for j in 0..n_step_sizes {
                if self.trial_move.step_size(j) < smallest_step {
                    self.trial_move.set_step_size(j, smallest_step);
                }
            }

            if (rate - self.target_acc_rate).abs() < TOLERANCE {
                cons_count += 1;
            } else {
                cons_count = 0;
            }

            counter += 1;
            if self.n_find_step_iterations < 0
                && counter >= self.n_find_step_iterations.abs()
            {
                break;
            }
        }
    }

    // --- Burn-in

    /// Removes the dependence on the initial walker position: either a
    /// fixed number of discarded steps, or automatic equilibration of the
    /// opted-in observables.
    fn initial_decorrelation(&mut self) -> Result<()> {
        if self.n_decorrelation_steps > 0 {
            self.sample_plain(self.n_decorrelation_steps as usize);
            return Ok(());
        }
        if self.n_decorrelation_steps == 0 {
            return Ok(());
        }

        // automatic: watch clones of the opted-in observables until their
        // averages stop drifting
        let mut equil = ObservableContainer::new();
        for i in 0..self.obscont.len() {
            if self.obscont.flag_equil(i) {
                let obs = self.obscont.observable(i).duplicate();
                equil.push(
                    Box::new(FullAccumulator::new(obs, 1)),
                    EstimatorType::Correlated,
                    true,
                    false,
                );
            }
        }
        if equil.is_empty() {
            return Ok(());
        }

        let nobsdim = equil.nobsdim();
        let min_nmc = (100f64).max((40_000. * self.ndim as f64).sqrt()) as usize;
        let step_cap = self.n_decorrelation_steps.abs() as usize;
        equil.allocate(min_nmc)?;

        let mut old_avg = vec![0.; nobsdim];
        let mut old_err = vec![0.; nobsdim];
        let mut new_avg = vec![0.; nobsdim];
        let mut new_err = vec![0.; nobsdim];

        self.sample_observed(min_nmc, &mut equil, &mut None, &mut None)?;
        equil.estimate(&mut old_avg, &mut old_err)?;

        let mut count = 0;
        loop {
            self.sample_observed(min_nmc, &mut equil, &mut None, &mut None)?;
            count += min_nmc;
            if count >= step_cap {
                log::warn!(
                    "initial decorrelation: step cap of {} reached without equilibration",
                    step_cap
                );
                break;
            }

            equil.estimate(&mut new_avg, &mut new_err)?;
            let drifting = old_avg
                .iter()
                .zip(&new_avg)
                .zip(old_err.iter().zip(&new_err))
                .any(|((oa, na), (oe, ne))| {
                    (oa - na).abs() > 2. * (oe * oe + ne * ne).sqrt()
                });
            if !drifting {
                break;
            }
            old_avg.copy_from_slice(&new_avg);
            old_err.copy_from_slice(&new_err);
        }
        Ok(())
    }

    // --- Sampling loops

    fn initialize_sampling(&mut self, container: Option<&mut ObservableContainer>) {
        self.acc = 0;
        self.rej = 0;
        self.ridx = 0;

        self.wlkstate.initialize();
        self.pdfcont.initialize_proto_values(&self.wlkstate.xold);
        self.trial_move.initialize_proto_values(&self.wlkstate.xold);

        self.invoke_callback();
        if let Some(cont) = container {
            cont.reset();
        }
    }

    /// Samples `npoints` steps without observables; used by tuning and
    /// fixed-length burn-in.
    fn sample_plain(&mut self, npoints: usize) {
        self.initialize_sampling(None);
        let flagpdf = self.pdfcont.has_pdf();
        for i in 0..npoints {
            self.ridx = i as u64;
            if flagpdf {
                self.do_step_mrt2();
            } else {
                self.do_step_random();
            }
        }
    }

    /// Samples `npoints` steps, accumulating into `container` and feeding
    /// the optional sinks; finalizes the container afterwards.
    fn sample_observed(
        &mut self,
        npoints: usize,
        container: &mut ObservableContainer,
        psink: &mut Option<StepWriter>,
        vsink: &mut Option<StepWriter>,
    ) -> Result<()> {
        self.initialize_sampling(Some(container));
        let flagpdf = self.pdfcont.has_pdf();
        let nskip_pdf = container.nskip_pdf() as u64;
        let mut flag_callback_pdf = container.depends_on_pdf();

        for i in 0..npoints {
            self.ridx = i as u64;
            if flagpdf {
                self.do_step_mrt2();

                // keep the density's cached values in sync with the walker
                // whenever a PDF-reading observable is due
                let flag_pdf_obs = nskip_pdf != 0 && self.ridx % nskip_pdf == 0;
                if (flag_callback_pdf || self.wlkstate.accepted) && flag_pdf_obs {
                    self.pdfcont.prepare_observation(&self.wlkstate.xnew);
                    flag_callback_pdf = false;
                } else if self.wlkstate.accepted {
                    flag_callback_pdf = true;
                }
            } else {
                self.do_step_random();
            }

            container.accumulate(&self.wlkstate);

            if let Some(w) = psink.as_mut() {
                if w.due(self.ridx) {
                    w.write_values(self.ridx, std::iter::once(&self.wlkstate.xold[..]));
                }
            }
            if let Some(w) = vsink.as_mut() {
                if w.due(self.ridx) {
                    w.write_values(self.ridx, container.obs_values());
                }
            }
        }

        container.finalize()
    }

    /// One Metropolis accept/reject cycle sampling from the product PDF.
    fn do_step_mrt2(&mut self) {
        let move_acc = self
            .trial_move
            .compute_trial_move(&mut self.wlkstate, &mut self.rgen);

        if self.wlkstate.nchanged < self.ndim {
            self.domain.apply_walker(&mut self.wlkstate);
        } else {
            self.domain.apply(&mut self.wlkstate.xnew);
        }

        let pdf_acc = self.pdfcont.compute_acceptance(&self.wlkstate);

        self.wlkstate.accepted = self.rgen.gen::<f64>() <= pdf_acc * move_acc;
        if self.wlkstate.accepted {
            self.acc += 1;
        } else {
            self.rej += 1;
        }

        self.invoke_callback();

        if self.wlkstate.accepted {
            self.pdfcont.new_to_old();
            self.trial_move.new_to_old();
            self.wlkstate.new_to_old();
        } else {
            self.pdfcont.old_to_new();
            self.trial_move.old_to_new();
            self.wlkstate.old_to_new();
        }
    }

    /// One uniform random step within the domain; always accepted.
    fn do_step_random(&mut self) {
        for x in &mut self.wlkstate.xnew {
            *x = self.rgen.gen();
        }
        self.domain.scale_to_domain(&mut self.wlkstate.xnew);
        self.wlkstate.mark_all_changed();

        self.wlkstate.accepted = true;
        self.acc += 1;

        self.invoke_callback();
        self.wlkstate.new_to_old();
    }

    fn invoke_callback(&mut self) {
        if let Some(cb) = self.callback.as_mut() {
            cb.call(&StepInfo {
                walker: &self.wlkstate,
                ridx: self.ridx,
                acc: self.acc,
                rej: self.rej,
            });
        }
    }
}
