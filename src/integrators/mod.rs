//! The integrators provided by this crate.

pub mod metropolis;

pub use self::metropolis::Metropolis;

use rand::Rng;

use crate::core::{reduce, Estimate, Result};

/// Runs `n_instances` independent engines on scoped threads and reduces
/// their results.
///
/// `build(i)` constructs the `i`-th engine; it must seed every instance
/// distinctly, otherwise the instances random-walk in lockstep and the
/// combined error is meaningless. No state is shared between instances;
/// the reduction averages the averages and combines the errors as
/// `sqrt(sum err^2) / N`.
pub fn integrate_parallel<R, F>(
    n_instances: usize,
    build: F,
    nmc: usize,
    do_tune_step: bool,
    do_decorrelate: bool,
) -> Result<Estimate>
where
    R: Rng + 'static,
    F: Fn(usize) -> Metropolis<R> + Sync,
{
    assert!(n_instances > 0);

    let collected = crossbeam::thread::scope(|s| {
        let handles: Vec<_> = (0..n_instances)
            .map(|i| {
                let build = &build;
                s.spawn(move |_| {
                    let mut engine = build(i);
                    engine.integrate(nmc, do_tune_step, do_decorrelate)
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect::<Result<Vec<_>>>()
    })
    .unwrap();

    collected.map(|estimates| reduce(&estimates))
}
