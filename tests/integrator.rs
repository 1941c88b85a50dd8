//! End-to-end integration runs: known integrals with and without a sampling
//! density, step-size tuning, burn-in, callbacks, sinks and the parallel
//! reduction boundary.

mod common;

use common::{Constval, Exp1dPdf, GaussPdf, Position, ThreeDimGaussianPdf, X1d, XSquared};

use metrint::callbacks::{Callback, StepInfo};
use metrint::core::{ObservableFunction, OrthoPeriodicDomain};
use metrint::{integrate_parallel, Metropolis};

use assert_approx_eq::assert_approx_eq;
use std::cell::Cell;
use std::fs::read_to_string;
use std::rc::Rc;

const NMC: usize = 32_768;

#[test]
fn gaussian_3d_x_squared_hits_the_analytic_value() {
    // <x_0^2> under exp(-|x|^2) is 0.5
    let mut engine = Metropolis::with_seed(3, 1337);
    engine
        .add_sampling_function(Box::new(ThreeDimGaussianPdf))
        .unwrap();
    engine
        .add_observable(Box::new(XSquared), 1, 1, true, true)
        .unwrap();

    let est = engine.integrate(NMC, true, true).unwrap();
    assert_eq!(est.nobsdim(), 1);
    let (avg, err) = (est.average()[0], est.error()[0]);
    assert!(err > 0.);
    assert!(err < 0.05);
    assert!((avg - 0.5).abs() < 3. * err);
}

#[test]
fn exponential_1d_position_averages_to_zero() {
    // <x> under exp(-|x|)/2 is 0
    let mut engine = Metropolis::with_seed(1, 1337);
    engine.add_sampling_function(Box::new(Exp1dPdf)).unwrap();
    engine
        .add_observable(Box::new(X1d), 1, 1, false, true)
        .unwrap();

    let est = engine.integrate(NMC, true, true).unwrap();
    let (avg, err) = (est.average()[0], est.error()[0]);
    assert!(err > 0.);
    assert!(avg.abs() < 3. * err);
}

#[test]
fn uniform_sampling_scales_by_the_volume() {
    // constant 1.3 over [-1, 1]^3: integral 1.3 * 8, exactly
    let mut engine = Metropolis::with_seed(3, 1337);
    engine
        .set_domain(Box::new(OrthoPeriodicDomain::cubic(3, -1., 1.)))
        .unwrap();
    // no error bar requested: the error stays a hard zero
    engine
        .add_observable(Box::new(Constval { ndim: 3 }), 0, 1, false, false)
        .unwrap();

    let est = engine.integrate(8192, false, false).unwrap();
    assert_approx_eq!(est.average()[0], 1.3 * 8., 1e-10);
    assert_eq!(est.error()[0], 0.);
}

#[test]
fn step_size_tuning_reaches_the_target_rate() {
    let mut engine = Metropolis::with_seed(3, 1337);
    engine
        .add_sampling_function(Box::new(GaussPdf { ndim: 3 }))
        .unwrap();
    engine.set_step_size(1.0);
    engine.set_find_step_iterations(-50);

    // Nmc = 0 runs only the requested tuning phase
    let est = engine.integrate(0, true, false).unwrap();
    assert_eq!(est.nobsdim(), 0);

    let rate = engine.acceptance_rate();
    assert!(rate >= 0.45 && rate <= 0.55, "tuned rate {}", rate);
    assert!(engine.step_size(0) > 0.);
}

struct BookkeepingCallback {
    calls: Rc<Cell<u64>>,
}

impl Callback for BookkeepingCallback {
    fn call(&mut self, info: &StepInfo<'_>) {
        self.calls.set(self.calls.get() + 1);
        // the counters cover every step up to and including the current one
        if info.acc + info.rej > 0 {
            assert_eq!(info.acc + info.rej, info.ridx + 1);
        }
    }
}

#[test]
fn callback_runs_once_per_step_plus_initialization() {
    let calls = Rc::new(Cell::new(0));
    let mut engine = Metropolis::with_seed(2, 99);
    engine
        .add_sampling_function(Box::new(GaussPdf { ndim: 2 }))
        .unwrap();
    engine
        .add_observable(Box::new(Position { ndim: 2 }), 0, 1, false, false)
        .unwrap();
    engine.set_callback(Box::new(BookkeepingCallback {
        calls: Rc::clone(&calls),
    }));

    let nmc = 1000;
    engine.integrate(nmc, false, false).unwrap();
    assert_eq!(calls.get(), nmc as u64 + 1);
}

#[test]
fn sinks_receive_one_line_per_due_step() {
    let dir = tempfile::tempdir().unwrap();
    let wlkpath = dir.path().join("walk.txt");
    let obspath = dir.path().join("obs.txt");

    let mut engine = Metropolis::with_seed(3, 21);
    engine
        .set_domain(Box::new(OrthoPeriodicDomain::cubic(3, -1., 1.)))
        .unwrap();
    engine
        .add_observable(Box::new(Constval { ndim: 3 }), 1, 1, false, false)
        .unwrap();
    engine.store_positions_in(&wlkpath, 16);
    engine.store_values_in(&obspath, 32);

    engine.integrate(256, false, false).unwrap();

    let walk = read_to_string(&wlkpath).unwrap();
    let lines: Vec<&str> = walk.lines().collect();
    assert_eq!(lines.len(), 256 / 16);
    for line in &lines {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        assert_eq!(tokens.len(), 1 + 3);
        for x in &tokens[1..] {
            let x: f64 = x.parse().unwrap();
            assert!(x >= -1. && x < 1.);
        }
    }

    let obs = read_to_string(&obspath).unwrap();
    let lines: Vec<&str> = obs.lines().collect();
    assert_eq!(lines.len(), 256 / 32);
    for line in &lines {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        assert_eq!(tokens.len(), 1 + 1);
        assert_eq!(tokens[1].parse::<f64>().unwrap(), 1.3);
    }

    // the sinks only apply to main runs and can be cleared
    engine.clear_position_sink();
    engine.clear_value_sink();
    engine.integrate(64, false, false).unwrap();
    assert_eq!(read_to_string(&wlkpath).unwrap(), walk);
}

#[test]
fn parallel_instances_reduce_to_the_same_constant() {
    let est = integrate_parallel(
        4,
        |i| {
            let mut engine = Metropolis::with_seed(3, 1000 + i as u64);
            engine
                .set_domain(Box::new(OrthoPeriodicDomain::cubic(3, -1., 1.)))
                .unwrap();
            engine
                .add_observable(Box::new(Constval { ndim: 3 }), 0, 1, false, false)
                .unwrap();
            engine
        },
        4096,
        false,
        false,
    )
    .unwrap();

    assert_approx_eq!(est.average()[0], 10.4, 1e-10);
    assert_eq!(est.error()[0], 0.);
}

/// A position observable that declares it reads the sampling density, so
/// the engine keeps the density's cached values in sync.
struct PdfBoundX1d;

impl ObservableFunction for PdfBoundX1d {
    fn ndim(&self) -> usize {
        1
    }

    fn nobs(&self) -> usize {
        1
    }

    fn observable_function(&self, x: &[f64], out: &mut [f64]) {
        out[0] = x[0];
    }

    fn depends_on_pdf(&self) -> bool {
        true
    }

    fn duplicate(&self) -> Box<dyn ObservableFunction> {
        Box::new(Self)
    }
}

#[test]
fn pdf_observing_bookkeeping_does_not_change_the_walk() {
    let run = |obs: Box<dyn ObservableFunction>| {
        let mut engine = Metropolis::with_seed(1, 4242);
        engine.add_sampling_function(Box::new(Exp1dPdf)).unwrap();
        engine.add_observable(obs, 1, 2, false, false).unwrap();
        engine.integrate(4096, false, false).unwrap()
    };

    // re-preparing the density's proto values consumes no randomness, so
    // the flagged run reproduces the plain run exactly
    let plain = run(Box::new(X1d));
    let flagged = run(Box::new(PdfBoundX1d));
    assert_eq!(plain, flagged);
}

#[test]
fn correlated_estimator_keeps_the_full_history_regardless_of_nblocks() {
    let run = |nblocks: usize, correlated: bool| {
        let mut engine = Metropolis::with_seed(1, 2024);
        engine.add_sampling_function(Box::new(Exp1dPdf)).unwrap();
        engine
            .add_observable(Box::new(X1d), nblocks, 1, false, correlated)
            .unwrap();
        engine.integrate(8192, false, false).unwrap()
    };

    // blocking runs on the raw per-step history, so the block count of the
    // registration must not change the result: pre-averaged storage would
    // destroy the levels the pair-averaging iterates over
    let blocked = run(16, true);
    let full = run(1, true);
    assert_eq!(blocked, full);
    assert!(blocked.error()[0] > 0.);

    // and its error cannot undercut the naive one, since the first
    // blocking level is exactly the uncorrelated estimate
    let naive = run(1, false);
    assert_eq!(blocked.average()[0], naive.average()[0]);
    assert!(blocked.error()[0] >= naive.error()[0]);
}

#[test]
fn fixed_burn_in_and_repeated_runs() {
    let mut engine = Metropolis::with_seed(3, 7);
    engine
        .add_sampling_function(Box::new(GaussPdf { ndim: 3 }))
        .unwrap();
    engine
        .add_observable(Box::new(Position { ndim: 3 }), 16, 1, false, false)
        .unwrap();
    engine.set_decorrelation_steps(500);

    let first = engine.integrate(8192, true, true).unwrap();
    assert_eq!(first.nobsdim(), 3);
    for i in 0..3 {
        assert!(first.average()[i].abs() < 3. * first.error()[i].max(0.05));
    }

    // the engine survives the run and can integrate again
    let second = engine.integrate(8192, false, false).unwrap();
    assert_eq!(second.nobsdim(), 3);
}

#[test]
fn zero_steps_run_only_the_requested_phases() {
    let mut engine = Metropolis::with_seed(2, 3);
    engine
        .add_sampling_function(Box::new(GaussPdf { ndim: 2 }))
        .unwrap();
    let est = engine.integrate(0, false, false).unwrap();
    assert_eq!(est.nobsdim(), 0);
    assert!(est.average().is_empty());
    assert!(est.error().is_empty());
}

#[test]
fn estimates_serialize_for_the_reduction_boundary() {
    let mut engine = Metropolis::with_seed(3, 1337);
    engine
        .set_domain(Box::new(OrthoPeriodicDomain::cubic(3, -1., 1.)))
        .unwrap();
    engine
        .add_observable(Box::new(Constval { ndim: 3 }), 1, 1, false, false)
        .unwrap();
    let est = engine.integrate(1024, false, false).unwrap();

    let json = serde_json::to_string(&est).unwrap();
    let back: metrint::Estimate = serde_json::from_str(&json).unwrap();
    assert_eq!(est, back);
}
