//! Per-step callbacks invoked by the sampling loop.

use crate::core::WalkerState;

/// A view of the engine's state handed to the callback on every step,
/// accepted or not, right before commit/rollback.
#[derive(Debug, Clone, Copy)]
pub struct StepInfo<'a> {
    /// The walker, including the proposal and the acceptance flag.
    pub walker: &'a WalkerState,
    /// Running step index of the current sampling run.
    pub ridx: u64,
    /// Accepted steps so far in the current run.
    pub acc: u64,
    /// Rejected steps so far in the current run.
    pub rej: u64,
}

impl StepInfo<'_> {
    /// The running acceptance rate, 0 before the first accepted step.
    pub fn acceptance_rate(&self) -> f64 {
        if self.acc > 0 {
            self.acc as f64 / (self.acc + self.rej) as f64
        } else {
            0.
        }
    }
}

/// Trait for observing the sampling loop.
///
/// The callback runs once per step (plus once at sampling initialization,
/// before the first step); it must not block and has no way to mutate the
/// walker.
pub trait Callback {
    /// Called with the state of the current step.
    fn call(&mut self, info: &StepInfo<'_>);
}

/// A callback that does nothing.
pub struct SinkCallback {}

impl Callback for SinkCallback {
    fn call(&mut self, _: &StepInfo<'_>) {}
}

/// A callback that prints the running acceptance rate every `freq` steps.
pub struct ProgressCallback {
    /// Print period in steps.
    pub freq: u64,
}

impl Callback for ProgressCallback {
    fn call(&mut self, info: &StepInfo<'_>) {
        if info.ridx > 0 && info.ridx % self.freq == 0 {
            println!(
                "step {}: acceptance rate {:.3}",
                info.ridx,
                info.acceptance_rate()
            );
        }
    }
}

/// Counts how often it was called; handy in tests and sanity checks.
#[derive(Default)]
pub struct CountingCallback {
    /// Number of invocations so far.
    pub calls: u64,
    /// Number of invocations with the accepted flag set.
    pub accepted: u64,
}

impl Callback for CountingCallback {
    fn call(&mut self, info: &StepInfo<'_>) {
        self.calls += 1;
        if info.walker.accepted {
            self.accepted += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acceptance_rate_handles_the_empty_run() {
        let wlk = WalkerState::new(1);
        let info = StepInfo {
            walker: &wlk,
            ridx: 0,
            acc: 0,
            rej: 5,
        };
        assert_eq!(info.acceptance_rate(), 0.);

        let info = StepInfo {
            walker: &wlk,
            ridx: 0,
            acc: 3,
            rej: 1,
        };
        assert_eq!(info.acceptance_rate(), 0.75);
    }
}
