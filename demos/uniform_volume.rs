//! Integrates `x^2 + y^2 + z^2` over the box `[-1, 1]^3` by uniform
//! sampling. The analytic value is 8.

use metrint::core::{ObservableFunction, OrthoPeriodicDomain};
use metrint::Metropolis;

struct RadiusSquared;

impl ObservableFunction for RadiusSquared {
    fn ndim(&self) -> usize {
        3
    }

    fn nobs(&self) -> usize {
        1
    }

    fn observable_function(&self, x: &[f64], out: &mut [f64]) {
        out[0] = x.iter().map(|v| v * v).sum();
    }

    fn duplicate(&self) -> Box<dyn ObservableFunction> {
        Box::new(Self)
    }
}

fn main() {
    let mut engine = Metropolis::with_seed(3, 187201);
    engine
        .set_domain(Box::new(OrthoPeriodicDomain::cubic(3, -1., 1.)))
        .expect("matching dimensions");
    engine
        .add_observable(Box::new(RadiusSquared), 1, 1, false, false)
        .expect("matching dimensions");

    let est = engine
        .integrate(1_000_000, false, false)
        .expect("the domain is finite");

    println!(
        "integral = {} \u{b1} {}   (analytic: 8)",
        est.average()[0],
        est.error()[0]
    );
}
