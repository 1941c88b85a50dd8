//! Shared fixtures: a reference Metropolis walk with known statistics plus
//! the sampling functions and observables used across the test suite.
#![allow(dead_code)] // each test binary uses its own subset

use metrint::core::{ObservableFunction, SamplingFunction, WalkerState};

use rand::Rng;
use rand::SeedableRng;
use rand_pcg::Pcg64;

/// A pre-generated Metropolis walk: positions row-major (`nmc * ndim`),
/// per-step acceptance flags and change-sets.
pub struct WalkData {
    pub nmc: usize,
    pub ndim: usize,
    pub x: Vec<f64>,
    pub accepted: Vec<bool>,
    pub nchanged: Vec<usize>,
    pub changed_idx: Vec<usize>,
    pub acceptance_rate: f64,
}

impl WalkData {
    /// Per-dimension mean of all stored positions.
    pub fn reference_average(&self) -> Vec<f64> {
        let mut avg = vec![0.; self.ndim];
        for row in self.x.chunks_exact(self.ndim) {
            for (a, &v) in avg.iter_mut().zip(row) {
                *a += v;
            }
        }
        for a in &mut avg {
            *a /= self.nmc as f64;
        }
        avg
    }

    /// Drives `f` once per step with a walker describing that step, the way
    /// the engine hands steps to its accumulators.
    pub fn drive(&self, mut f: impl FnMut(&WalkerState)) {
        let mut wlk = WalkerState::new(self.ndim);
        for i in 0..self.nmc {
            wlk.xnew
                .copy_from_slice(&self.x[i * self.ndim..(i + 1) * self.ndim]);
            wlk.nchanged = self.nchanged[i];
            wlk.changed_idx
                .copy_from_slice(&self.changed_idx[i * self.ndim..(i + 1) * self.ndim]);
            wlk.accepted = self.accepted[i];
            f(&wlk);
        }
    }
}

/// Generates a single-particle-at-a-time Metropolis walk of `nmc` steps in
/// `ndim` independent Gaussian orbitals of width `sigma`, with uniform
/// proposals of half-width `sigma_prop`. Stationary distribution per
/// dimension: `N(0, sigma^2)`.
pub fn gaussian_walk(
    seed: u64,
    nmc: usize,
    ndim: usize,
    sigma_prop: f64,
    sigma: f64,
) -> WalkData {
    let mut rng = Pcg64::seed_from_u64(seed);
    let mut x = vec![0.; nmc * ndim];
    let mut accepted = vec![false; nmc];
    let mut nchanged = vec![0usize; nmc];
    let mut changed_idx = vec![0usize; nmc * ndim];
    let mut acc = 0usize;

    // initial position, counted as a fully changed accepted step
    for j in 0..ndim {
        x[j] = rng.gen::<f64>() - 0.5;
        changed_idx[j] = j;
    }
    accepted[0] = true;
    nchanged[0] = ndim;
    acc += 1;

    let logp = |v: f64| -v * v / (2. * sigma * sigma);
    for i in 1..nmc {
        let (prev, cur) = x.split_at_mut(i * ndim);
        let prev = &prev[(i - 1) * ndim..];
        cur[..ndim].copy_from_slice(&prev[..ndim]);

        // move one particle per step, round-robin
        let dim = (i - 1) % ndim;
        let proposal = prev[dim] + sigma_prop * (2. * rng.gen::<f64>() - 1.);
        let ratio = (logp(proposal) - logp(prev[dim])).exp();
        if rng.gen::<f64>() <= ratio {
            cur[dim] = proposal;
            accepted[i] = true;
            acc += 1;
        }
        nchanged[i] = 1;
        changed_idx[i * ndim] = dim;
    }

    WalkData {
        nmc,
        ndim,
        x,
        accepted,
        nchanged,
        changed_idx,
        acceptance_rate: acc as f64 / nmc as f64,
    }
}

// --- Sampling functions

/// `exp(-|x|^2)` in three dimensions, with a selective update path.
pub struct ThreeDimGaussianPdf;

impl SamplingFunction for ThreeDimGaussianPdf {
    fn ndim(&self) -> usize {
        3
    }

    fn nproto(&self) -> usize {
        1
    }

    fn proto_function(&self, x: &[f64], protov: &mut [f64]) {
        protov[0] = x[0] * x[0] + x[1] * x[1] + x[2] * x[2];
    }

    fn sampling_function(&self, protov: &[f64]) -> f64 {
        (-protov[0]).exp()
    }

    fn acceptance_function(&self, proto_old: &[f64], proto_new: &[f64]) -> f64 {
        (proto_old[0] - proto_new[0]).exp()
    }

    fn supports_update(&self) -> bool {
        true
    }

    fn updated_acceptance(
        &self,
        wlk: &WalkerState,
        proto_old: &[f64],
        proto_new: &mut [f64],
    ) -> f64 {
        // not worth it in three dimensions, but it exercises the path
        proto_new[0] = proto_old[0];
        for &i in &wlk.changed_idx[..wlk.nchanged] {
            proto_new[0] += wlk.xnew[i] * wlk.xnew[i] - wlk.xold[i] * wlk.xold[i];
        }
        (proto_old[0] - proto_new[0]).exp()
    }

    fn duplicate(&self) -> Box<dyn SamplingFunction> {
        Box::new(Self)
    }
}

/// `exp(-sum x_i^2)` in any dimension, one proto value per dimension.
pub struct GaussPdf {
    pub ndim: usize,
}

impl SamplingFunction for GaussPdf {
    fn ndim(&self) -> usize {
        self.ndim
    }

    fn nproto(&self) -> usize {
        self.ndim
    }

    fn proto_function(&self, x: &[f64], protov: &mut [f64]) {
        for (p, &v) in protov.iter_mut().zip(x) {
            *p = v * v;
        }
    }

    fn sampling_function(&self, protov: &[f64]) -> f64 {
        (-protov.iter().sum::<f64>()).exp()
    }

    fn acceptance_function(&self, proto_old: &[f64], proto_new: &[f64]) -> f64 {
        (proto_old.iter().sum::<f64>() - proto_new.iter().sum::<f64>()).exp()
    }

    fn supports_update(&self) -> bool {
        true
    }

    fn updated_acceptance(
        &self,
        wlk: &WalkerState,
        proto_old: &[f64],
        proto_new: &mut [f64],
    ) -> f64 {
        let mut expf = 0.;
        for &i in &wlk.changed_idx[..wlk.nchanged] {
            proto_new[i] = wlk.xnew[i] * wlk.xnew[i];
            expf += proto_new[i] - proto_old[i];
        }
        (-expf).exp()
    }

    fn duplicate(&self) -> Box<dyn SamplingFunction> {
        Box::new(Self { ndim: self.ndim })
    }
}

/// `exp(-|x|)` in one dimension.
pub struct Exp1dPdf;

impl SamplingFunction for Exp1dPdf {
    fn ndim(&self) -> usize {
        1
    }

    fn nproto(&self) -> usize {
        1
    }

    fn proto_function(&self, x: &[f64], protov: &mut [f64]) {
        protov[0] = x[0].abs();
    }

    fn sampling_function(&self, protov: &[f64]) -> f64 {
        (-protov[0]).exp()
    }

    fn acceptance_function(&self, proto_old: &[f64], proto_new: &[f64]) -> f64 {
        (proto_old[0] - proto_new[0]).exp()
    }

    fn duplicate(&self) -> Box<dyn SamplingFunction> {
        Box::new(Self)
    }
}

// --- Observables

/// `x_0^2` of a three-dimensional walker.
pub struct XSquared;

impl ObservableFunction for XSquared {
    fn ndim(&self) -> usize {
        3
    }

    fn nobs(&self) -> usize {
        1
    }

    fn observable_function(&self, x: &[f64], out: &mut [f64]) {
        out[0] = x[0] * x[0];
    }

    fn duplicate(&self) -> Box<dyn ObservableFunction> {
        Box::new(Self)
    }
}

/// The position of a one-dimensional walker.
pub struct X1d;

impl ObservableFunction for X1d {
    fn ndim(&self) -> usize {
        1
    }

    fn nobs(&self) -> usize {
        1
    }

    fn observable_function(&self, x: &[f64], out: &mut [f64]) {
        out[0] = x[0];
    }

    fn duplicate(&self) -> Box<dyn ObservableFunction> {
        Box::new(Self)
    }
}

/// The constant 1.3, any dimension.
pub struct Constval {
    pub ndim: usize,
}

impl ObservableFunction for Constval {
    fn ndim(&self) -> usize {
        self.ndim
    }

    fn nobs(&self) -> usize {
        1
    }

    fn observable_function(&self, _x: &[f64], out: &mut [f64]) {
        out[0] = 1.3;
    }

    fn duplicate(&self) -> Box<dyn ObservableFunction> {
        Box::new(Self { ndim: self.ndim })
    }
}

/// The full walker position, with a selective update path.
pub struct Position {
    pub ndim: usize,
}

impl ObservableFunction for Position {
    fn ndim(&self) -> usize {
        self.ndim
    }

    fn nobs(&self) -> usize {
        self.ndim
    }

    fn observable_function(&self, x: &[f64], out: &mut [f64]) {
        out.copy_from_slice(x);
    }

    fn supports_update(&self) -> bool {
        true
    }

    fn updated_observable(
        &self,
        x: &[f64],
        _nchanged: usize,
        changed_flags: &[bool],
        out: &mut [f64],
    ) {
        for (i, &flag) in changed_flags.iter().enumerate() {
            if flag {
                out[i] = x[i];
            }
        }
    }

    fn duplicate(&self) -> Box<dyn ObservableFunction> {
        Box::new(Self { ndim: self.ndim })
    }
}

/// Like [`Position`] but without the selective capability; lets tests
/// compare the two accumulation paths.
pub struct PlainPosition {
    pub ndim: usize,
}

impl ObservableFunction for PlainPosition {
    fn ndim(&self) -> usize {
        self.ndim
    }

    fn nobs(&self) -> usize {
        self.ndim
    }

    fn observable_function(&self, x: &[f64], out: &mut [f64]) {
        out.copy_from_slice(x);
    }

    fn duplicate(&self) -> Box<dyn ObservableFunction> {
        Box::new(Self { ndim: self.ndim })
    }
}
