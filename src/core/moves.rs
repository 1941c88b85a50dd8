//! The trial-move contract and the built-in move generators.

use rand::Rng;
use rand_distr::StandardNormal;

use super::walker::WalkerState;

/// A proposal generator for the Metropolis walk.
///
/// A trial move steps `xnew` away from `xold`, records the touched
/// coordinates in the walker's change-set and returns its proposal
/// acceptance factor: `1` for symmetric proposals, the quotient
/// `q(x' -> x) / q(x -> x')` otherwise.
///
/// Moves expose their adjustable step sizes so the engine can tune them
/// towards a target acceptance rate. Several walker dimensions may share one
/// step size ("types", e.g. particle species);
/// [`step_size_index`](Self::step_size_index) maps a walker dimension to the
/// step size governing it.
///
/// The RNG is owned by the engine and lent to the move for each proposal.
pub trait TrialMove<R: Rng> {
    /// Dimension of the walker positions this move steps.
    fn ndim(&self) -> usize;

    /// Proposes a new position, stepping `wlk.xnew` away from `wlk.xold`
    /// and filling the change-set. Returns the move acceptance factor.
    fn compute_trial_move(&mut self, wlk: &mut WalkerState, rng: &mut R) -> f64;

    /// Number of adjustable step sizes.
    fn n_step_sizes(&self) -> usize;

    /// The `i`-th step size.
    fn step_size(&self, i: usize) -> f64;

    /// Sets the `i`-th step size.
    fn set_step_size(&mut self, i: usize, value: f64);

    /// Multiplies every step size by `factor`, preserving proportions.
    fn scale_step_sizes(&mut self, factor: f64) {
        for i in 0..self.n_step_sizes() {
            let scaled = self.step_size(i) * factor;
            self.set_step_size(i, scaled);
        }
    }

    /// Index of the step size that governs walker dimension `dim`.
    fn step_size_index(&self, dim: usize) -> usize;

    /// Whether the move has adjustable step sizes at all.
    fn has_step_sizes(&self) -> bool {
        self.n_step_sizes() > 0
    }

    /// Seeds any cached per-position temporaries at `x`. Moves without
    /// caches ignore this.
    fn initialize_proto_values(&mut self, x: &[f64]) {
        let _ = x;
    }

    /// Commits cached temporaries on acceptance. No-op by default.
    fn new_to_old(&mut self) {}

    /// Rolls cached temporaries back on rejection. No-op by default.
    fn old_to_new(&mut self) {}

    /// Returns an owned copy of this move.
    fn duplicate(&self) -> Box<dyn TrialMove<R>>;
}

/// Step sizes shared by groups of walker dimensions.
///
/// `type_ends` holds the exclusive end index of each group; dimensions
/// `[0, type_ends[0])` use step size 0, `[type_ends[0], type_ends[1])` step
/// size 1, and so on. The last entry must equal `ndim`.
#[derive(Debug, Clone)]
struct TypedStepSizes {
    sizes: Vec<f64>,
    type_of_dim: Vec<usize>,
}

impl TypedStepSizes {
    fn new(ndim: usize, type_ends: &[usize], initial: f64) -> Self {
        assert!(!type_ends.is_empty());
        assert_eq!(*type_ends.last().unwrap(), ndim);
        let mut type_of_dim = Vec::with_capacity(ndim);
        let mut ty = 0;
        for dim in 0..ndim {
            while dim >= type_ends[ty] {
                ty += 1;
            }
            type_of_dim.push(ty);
        }
        Self {
            sizes: vec![initial; type_ends.len()],
            type_of_dim,
        }
    }

    fn single(ndim: usize, initial: f64) -> Self {
        Self::new(ndim, &[ndim], initial)
    }
}

/// Uniform displacement of every coordinate at once: `x'_i = x_i + s_t(i) *
/// u`, `u` uniform in `[-1, 1)`. Symmetric, so the acceptance factor is 1.
#[derive(Debug, Clone)]
pub struct UniformAllMove {
    steps: TypedStepSizes,
}

impl UniformAllMove {
    /// One shared step size, initialized to `initial_step`.
    pub fn new(ndim: usize, initial_step: f64) -> Self {
        Self {
            steps: TypedStepSizes::single(ndim, initial_step),
        }
    }

    /// One step size per dimension group; see [`TrialMove::step_size_index`].
    pub fn with_types(ndim: usize, type_ends: &[usize], initial_step: f64) -> Self {
        Self {
            steps: TypedStepSizes::new(ndim, type_ends, initial_step),
        }
    }
}

impl<R: Rng> TrialMove<R> for UniformAllMove {
    fn ndim(&self) -> usize {
        self.steps.type_of_dim.len()
    }

    fn compute_trial_move(&mut self, wlk: &mut WalkerState, rng: &mut R) -> f64 {
        for i in 0..wlk.ndim() {
            let step = self.steps.sizes[self.steps.type_of_dim[i]];
            wlk.xnew[i] = wlk.xold[i] + step * (2. * rng.gen::<f64>() - 1.);
        }
        wlk.mark_all_changed();
        1.
    }

    fn n_step_sizes(&self) -> usize {
        self.steps.sizes.len()
    }

    fn step_size(&self, i: usize) -> f64 {
        self.steps.sizes[i]
    }

    fn set_step_size(&mut self, i: usize, value: f64) {
        self.steps.sizes[i] = value;
    }

    fn step_size_index(&self, dim: usize) -> usize {
        self.steps.type_of_dim[dim]
    }

    fn duplicate(&self) -> Box<dyn TrialMove<R>> {
        Box::new(self.clone())
    }
}

/// Uniform displacement of a single, randomly picked coordinate per step.
///
/// Changes exactly one walker dimension, which makes the selective-update
/// paths of domains, sampling functions and observables kick in.
#[derive(Debug, Clone)]
pub struct UniformSingleMove {
    steps: TypedStepSizes,
}

impl UniformSingleMove {
    /// One shared step size, initialized to `initial_step`.
    pub fn new(ndim: usize, initial_step: f64) -> Self {
        Self {
            steps: TypedStepSizes::single(ndim, initial_step),
        }
    }

    /// One step size per dimension group.
    pub fn with_types(ndim: usize, type_ends: &[usize], initial_step: f64) -> Self {
        Self {
            steps: TypedStepSizes::new(ndim, type_ends, initial_step),
        }
    }
}

impl<R: Rng> TrialMove<R> for UniformSingleMove {
    fn ndim(&self) -> usize {
        self.steps.type_of_dim.len()
    }

    fn compute_trial_move(&mut self, wlk: &mut WalkerState, rng: &mut R) -> f64 {
        let dim = rng.gen_range(0..wlk.ndim());
        let step = self.steps.sizes[self.steps.type_of_dim[dim]];
        wlk.xnew[dim] = wlk.xold[dim] + step * (2. * rng.gen::<f64>() - 1.);
        wlk.nchanged = 1;
        wlk.changed_idx[0] = dim;
        1.
    }

    fn n_step_sizes(&self) -> usize {
        self.steps.sizes.len()
    }

    fn step_size(&self, i: usize) -> f64 {
        self.steps.sizes[i]
    }

    fn set_step_size(&mut self, i: usize, value: f64) {
        self.steps.sizes[i] = value;
    }

    fn step_size_index(&self, dim: usize) -> usize {
        self.steps.type_of_dim[dim]
    }

    fn duplicate(&self) -> Box<dyn TrialMove<R>> {
        Box::new(self.clone())
    }
}

/// Gaussian displacement of every coordinate: `x'_i = x_i + sigma_t(i) * g`,
/// `g` standard normal. Symmetric. The step sizes are the per-group sigmas.
#[derive(Debug, Clone)]
pub struct GaussianAllMove {
    sigmas: TypedStepSizes,
}

impl GaussianAllMove {
    /// One shared sigma, initialized to `initial_sigma`.
    pub fn new(ndim: usize, initial_sigma: f64) -> Self {
        Self {
            sigmas: TypedStepSizes::single(ndim, initial_sigma),
        }
    }

    /// One sigma per dimension group.
    pub fn with_types(ndim: usize, type_ends: &[usize], initial_sigma: f64) -> Self {
        Self {
            sigmas: TypedStepSizes::new(ndim, type_ends, initial_sigma),
        }
    }
}

impl<R: Rng> TrialMove<R> for GaussianAllMove {
    fn ndim(&self) -> usize {
        self.sigmas.type_of_dim.len()
    }

    fn compute_trial_move(&mut self, wlk: &mut WalkerState, rng: &mut R) -> f64 {
        for i in 0..wlk.ndim() {
            let sigma = self.sigmas.sizes[self.sigmas.type_of_dim[i]];
            let g: f64 = rng.sample(StandardNormal);
            wlk.xnew[i] = wlk.xold[i] + sigma * g;
        }
        wlk.mark_all_changed();
        1.
    }

    fn n_step_sizes(&self) -> usize {
        self.sigmas.sizes.len()
    }

    fn step_size(&self, i: usize) -> f64 {
        self.sigmas.sizes[i]
    }

    fn set_step_size(&mut self, i: usize, value: f64) {
        self.sigmas.sizes[i] = value;
    }

    fn step_size_index(&self, dim: usize) -> usize {
        self.sigmas.type_of_dim[dim]
    }

    fn duplicate(&self) -> Box<dyn TrialMove<R>> {
        Box::new(self.clone())
    }
}
