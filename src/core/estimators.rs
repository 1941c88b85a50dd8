//! Statistical reduction of accumulated data to means and errors of the
//! mean.
//!
//! Every estimator takes `N` samples of dimension `nobs` in row-major order
//! and fills `average` and `error` slices of length `nobs`. The functions
//! are generic over the float type; the engine drives them with `f64`.

use num_traits::{Float, FromPrimitive};
use serde::{Deserialize, Serialize};

/// Writes the per-dimension mean of `data` into `average`.
fn mean<T: Float + FromPrimitive>(data: &[T], nobs: usize, average: &mut [T]) {
    let n = data.len() / nobs;
    for a in average.iter_mut() {
        *a = T::zero();
    }
    if n == 0 {
        return;
    }
    for row in data.chunks_exact(nobs) {
        for (a, &v) in average.iter_mut().zip(row) {
            *a = *a + v;
        }
    }
    let norm = T::from_usize(n).unwrap();
    for a in average.iter_mut() {
        *a = *a / norm;
    }
}

/// Mean and standard error of the mean assuming uncorrelated samples.
///
/// The variance is computed in two passes around the mean, so constant input
/// yields exactly zero error. The divisor is `N - 1`; a single sample has
/// zero error by definition.
pub fn uncorrelated_estimate<T: Float + FromPrimitive>(
    data: &[T],
    nobs: usize,
    average: &mut [T],
    error: &mut [T],
) {
    let n = data.len() / nobs;
    mean(data, nobs, average);

    for e in error.iter_mut() {
        *e = T::zero();
    }
    if n < 2 {
        return;
    }
    for row in data.chunks_exact(nobs) {
        for ((e, &v), &a) in error.iter_mut().zip(row).zip(average.iter()) {
            let d = v - a;
            *e = *e + d * d;
        }
    }
    let nf = T::from_usize(n).unwrap();
    let nm1 = T::from_usize(n - 1).unwrap();
    for e in error.iter_mut() {
        *e = (*e / nm1 / nf).sqrt();
    }
}

/// Fixed-block estimate: reshapes the samples into `nblocks` consecutive
/// blocks of `N / nblocks` samples (a non-dividing tail is dropped), then
/// applies [`uncorrelated_estimate`] to the block means.
pub fn block_estimate<T: Float + FromPrimitive>(
    data: &[T],
    nobs: usize,
    nblocks: usize,
    average: &mut [T],
    error: &mut [T],
) {
    let n = data.len() / nobs;
    let blocklen = n / nblocks;
    debug_assert!(blocklen > 0);

    let norm = T::from_usize(blocklen).unwrap();
    let mut blockmeans = vec![T::zero(); nblocks * nobs];
    for (b, rows) in data
        .chunks_exact(blocklen * nobs)
        .take(nblocks)
        .enumerate()
    {
        let out = &mut blockmeans[b * nobs..(b + 1) * nobs];
        for row in rows.chunks_exact(nobs) {
            for (o, &v) in out.iter_mut().zip(row) {
                *o = *o + v;
            }
        }
        for o in out.iter_mut() {
            *o = *o / norm;
        }
    }

    uncorrelated_estimate(&blockmeans, nobs, average, error);
}

/// The Flyvbjerg–Petersen blocking kernel shared by the correlated
/// estimators.
///
/// Starting from the raw samples, adjacent pairs are averaged repeatedly; at
/// each level with at least two blocks left, the naive standard error of the
/// mean is recorded. Autocorrelated data make that series rise to a plateau;
/// the maximum over the levels is reported as the plateau surrogate. Sample
/// counts that are not powers of two lose the odd trailing block at each
/// pairing level; the reported mean is always taken from the untruncated
/// raw samples.
fn blocking_kernel<T: Float + FromPrimitive>(
    data: &[T],
    nobs: usize,
    average: &mut [T],
    error: &mut [T],
) {
    mean(data, nobs, average);
    for e in error.iter_mut() {
        *e = T::zero();
    }

    let mut work = data.to_vec();
    let mut n = data.len() / nobs;
    let mut levelavg = vec![T::zero(); nobs];
    let mut levelerr = vec![T::zero(); nobs];
    let two = T::from_usize(2).unwrap();
    while n >= 2 {
        uncorrelated_estimate(&work[..n * nobs], nobs, &mut levelavg, &mut levelerr);
        for (e, &le) in error.iter_mut().zip(levelerr.iter()) {
            if le > *e {
                *e = le;
            }
        }

        // pair-average adjacent samples, dropping an odd tail
        let half = n / 2;
        for i in 0..half {
            for j in 0..nobs {
                work[i * nobs + j] =
                    (work[2 * i * nobs + j] + work[(2 * i + 1) * nobs + j]) / two;
            }
        }
        n = half;
    }
}

/// Autocorrelation-aware error of the mean, one dimension at a time.
///
/// Runs the blocking kernel on each dimension separately.
pub fn fc_blocker_estimate<T: Float + FromPrimitive>(
    data: &[T],
    nobs: usize,
    average: &mut [T],
    error: &mut [T],
) {
    let n = data.len() / nobs;
    let mut column = vec![T::zero(); n];
    for j in 0..nobs {
        for (c, row) in column.iter_mut().zip(data.chunks_exact(nobs)) {
            *c = row[j];
        }
        blocking_kernel(&column, 1, &mut average[j..=j], &mut error[j..=j]);
    }
}

/// Multi-dimensional autocorrelation-aware error of the mean.
///
/// One pass of the blocking kernel over all dimensions at once; per
/// dimension the arithmetic is the same as [`fc_blocker_estimate`], so the
/// two agree exactly.
pub fn mj_blocker_estimate<T: Float + FromPrimitive>(
    data: &[T],
    nobs: usize,
    average: &mut [T],
    error: &mut [T],
) {
    blocking_kernel(data, nobs, average, error);
}

/// Computes only the mean and zeroes the error.
pub fn noop_estimate<T: Float + FromPrimitive>(
    data: &[T],
    nobs: usize,
    average: &mut [T],
    error: &mut [T],
) {
    mean(data, nobs, average);
    for e in error.iter_mut() {
        *e = T::zero();
    }
}

/// The statistical treatment paired with an accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EstimatorType {
    /// Mean only, no error bar. Pairs with a running-sum accumulator.
    Noop,
    /// Mean and naive standard error over the full history.
    Uncorrelated,
    /// Mean and naive standard error over pre-averaged blocks.
    FixedBlock,
    /// Mean and blocking (Flyvbjerg–Petersen) error over the history.
    Correlated,
}

impl EstimatorType {
    /// Picks the estimator for an observable added with `nblocks` storage
    /// blocks (`0` meaning "no error wanted", `1` meaning "keep every
    /// sample") and the `correlated` flag.
    pub fn select(correlated: bool, nblocks: usize) -> Self {
        if nblocks == 0 {
            Self::Noop
        } else if correlated {
            Self::Correlated
        } else if nblocks > 1 {
            Self::FixedBlock
        } else {
            Self::Uncorrelated
        }
    }

    /// Whether this estimator produces a meaningful error bar.
    pub fn computes_error(self) -> bool {
        self != Self::Noop
    }

    /// Runs the estimator on `data`.
    pub fn estimate<T: Float + FromPrimitive>(
        self,
        data: &[T],
        nobs: usize,
        average: &mut [T],
        error: &mut [T],
    ) {
        match self {
            // fixed-block data arrive pre-averaged per block, so the
            // uncorrelated reduction is the block estimate
            Self::Uncorrelated | Self::FixedBlock => {
                uncorrelated_estimate(data, nobs, average, error);
            }
            Self::Correlated => mj_blocker_estimate(data, nobs, average, error),
            Self::Noop => noop_estimate(data, nobs, average, error),
        }
    }
}
