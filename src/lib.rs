#![warn(clippy::all, clippy::cargo, clippy::nursery, clippy::pedantic)]
#![warn(missing_docs)]

//! The crate `metrint` provides Metropolis [Monte Carlo integration]: it
//! estimates multi-dimensional [integrals] of the form
//!
//! $$ I = \int_\Omega g(x)\, p(x)\, \mathrm{d}x $$
//!
//! over a configured domain $\Omega$, where the sampling density $p$ drives
//! a Metropolis random walk and the observables $g$ are evaluated along it.
//! Without a sampling density the engine samples uniformly from a finite
//! domain and scales the result by its volume. Alongside the averages, the
//! engine produces statistical error estimates, including
//! autocorrelation-aware ones obtained by iterative blocking.
//!
//! # Features
//!
//! This library was designed with the following features as essential in
//! mind:
//!
//! - **Generic random number generator**. Every random number generator that
//! implements the `Rng` trait from the `rand` crate can drive the engine;
//! results depend only on the generator and the chosen seed.
//! - **Pluggable components**. Domains, trial moves, sampling functions and
//! observables are trait objects behind narrow contracts, so user types mix
//! freely with the built-in ones.
//! - **Cheap partial moves**. Sampling functions and observables may opt
//! into selective updating: when a trial move touches only a few walker
//! coordinates, only the affected cached values are recomputed, and a
//! rejected proposal rolls back without recomputation.
//! - **Honest error bars**. Accumulated data can be reduced with naive,
//! fixed-block or Flyvbjerg–Petersen blocking estimators; the latter follow
//! the autocorrelation of the walk up to its plateau.
//! - **Self-tuning sampling**. Trial-move step sizes are adjusted
//! automatically towards a target acceptance rate, and burn-in can either be
//! a fixed number of discarded steps or run until the monitored observables
//! stop drifting.
//!
//! # What is ...?
//!
//! This section is a dictionary of terms that are used in this
//! documentation:
//!
//! - an *MRT2 step* is one accept/reject cycle of the
//! Metropolis(-Rosenbluth-Teller) algorithm;
//! - the *walker* is the point in the integration domain that performs the
//! random walk; its dimension is the number of integration variables;
//! - *proto values* are cached temporaries computed by a sampling function
//! (e.g. the summands of an exponent) that make partial updates and
//! rollback cheap;
//! - an *observable* is a function of the walker position whose expectation
//! value under the sampling density is being estimated;
//! - *nskip* is the stride at which an observable is evaluated during
//! sampling;
//! - *burn-in* (or *equilibration*) is preliminary sampling discarded to
//! remove the dependence on the initial walker position;
//! - *blocking* is the iterative pair-averaging of samples used to estimate
//! the standard error of the mean in the presence of autocorrelation.
//!
//! [Monte Carlo integration]: https://en.wikipedia.org/wiki/Monte_Carlo_integration
//! [integrals]: https://en.wikipedia.org/wiki/Integral

pub mod callbacks;
pub mod core;
pub mod integrators;

mod sinks;

pub use crate::core::*;
pub use crate::integrators::{integrate_parallel, Metropolis};
