//! Estimates `<x_0^2>` under the density `exp(-|x|^2)` in three dimensions.
//! The analytic value is 0.5.

use metrint::core::{ObservableFunction, SamplingFunction};
use metrint::Metropolis;

struct ThreeDimGaussianPdf;

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

    fn duplicate(&self) -> Box<dyn SamplingFunction> {
        Box::new(Self)
    }
}

struct XSquared;

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

fn main() {
    let mut engine = Metropolis::with_seed(3, 5649871);
    engine
        .add_sampling_function(Box::new(ThreeDimGaussianPdf))
        .expect("matching dimensions");
    engine
        .add_observable(Box::new(XSquared), 1, 1, true, true)
        .expect("matching dimensions");

    let est = engine
        .integrate(100_000, true, true)
        .expect("a sampling function is registered");

    println!(
        "<x_0^2> = {} \u{b1} {}   (analytic: 0.5)",
        est.average()[0],
        est.error()[0]
    );
    println!("acceptance rate: {:.3}", engine.acceptance_rate());
}
