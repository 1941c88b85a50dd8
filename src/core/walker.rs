//! The walker: the pair of positions a Metropolis step works on.

/// State of the random walker during sampling.
///
/// `xold` always holds the last accepted position. A trial move writes the
/// proposal into `xnew` and records which coordinates it touched in
/// `changed_idx[..nchanged]`. After the acceptance decision the engine calls
/// [`new_to_old`](Self::new_to_old) (commit) or [`old_to_new`](Self::old_to_new)
/// (rollback); both leave `xnew == xold`. The change-set and the `accepted`
/// flag survive the copy so that accumulators can still inspect the step;
/// the next trial move overwrites them.
#[derive(Debug, Clone)]
pub struct WalkerState {
    /// Last accepted position.
    pub xold: Vec<f64>,
    /// Proposed (and, after commit/rollback, again current) position.
    pub xnew: Vec<f64>,
    /// Number of leading valid entries in `changed_idx`.
    pub nchanged: usize,
    /// Indices of the coordinates in which `xnew` differs from `xold`.
    pub changed_idx: Vec<usize>,
    /// Outcome of the acceptance test for the present step.
    pub accepted: bool,
}

impl WalkerState {
    /// Creates a walker of dimension `ndim`, at the origin.
    pub fn new(ndim: usize) -> Self {
        Self {
            xold: vec![0.; ndim],
            xnew: vec![0.; ndim],
            nchanged: 0,
            changed_idx: vec![0; ndim],
            accepted: false,
        }
    }

    /// Number of walker dimensions.
    pub fn ndim(&self) -> usize {
        self.xold.len()
    }

    /// Brings the walker to the quiescent point: `xnew` mirrors `xold`, no
    /// pending changes, nothing accepted. Called once before a sampling run.
    pub fn initialize(&mut self) {
        self.xnew.copy_from_slice(&self.xold);
        self.nchanged = 0;
        self.accepted = false;
    }

    /// Commits the proposal: copies the changed coordinates of `xnew` into
    /// `xold` (all of them when every coordinate moved).
    pub fn new_to_old(&mut self) {
        if self.nchanged < self.ndim() {
            for &i in &self.changed_idx[..self.nchanged] {
                self.xold[i] = self.xnew[i];
            }
        } else {
            self.xold.copy_from_slice(&self.xnew);
        }
    }

    /// Rolls the proposal back: restores the changed coordinates of `xnew`
    /// from `xold`.
    pub fn old_to_new(&mut self) {
        if self.nchanged < self.ndim() {
            for &i in &self.changed_idx[..self.nchanged] {
                self.xnew[i] = self.xold[i];
            }
        } else {
            self.xnew.copy_from_slice(&self.xold);
        }
    }

    /// Records a proposal that moved every coordinate.
    pub fn mark_all_changed(&mut self) {
        self.nchanged = self.ndim();
        for (i, idx) in self.changed_idx.iter_mut().enumerate() {
            *idx = i;
        }
    }
}
