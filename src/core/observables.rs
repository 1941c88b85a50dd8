//! The observable contract: the functions whose expectation values the
//! engine estimates.

/// A user function `x -> (v_0, .., v_{nobs-1})` evaluated along the walk.
///
/// Implementors with cheap partial re-evaluation can additionally opt into
/// the selective-update path by returning `true` from
/// [`supports_update`](Self::supports_update) and overriding
/// [`updated_observable`](Self::updated_observable); accumulators fall back
/// to full recomputation transparently for everyone else.
pub trait ObservableFunction {
    /// Dimension of the walker positions this observable accepts.
    fn ndim(&self) -> usize;

    /// Number of values the observable produces per evaluation.
    fn nobs(&self) -> usize;

    /// Evaluates the observable at `x`, writing all `nobs` values to `out`.
    fn observable_function(&self, x: &[f64], out: &mut [f64]);

    /// Whether [`updated_observable`](Self::updated_observable) is usable.
    fn supports_update(&self) -> bool {
        false
    }

    /// Whether the observable reads the sampling density when evaluated.
    /// The engine then keeps the density's cached values in sync with the
    /// walker position on the steps where this observable is due.
    fn depends_on_pdf(&self) -> bool {
        false
    }

    /// Re-evaluates only the components affected by the changed coordinates.
    ///
    /// `changed_flags[i]` is set for every coordinate that changed since the
    /// last evaluation (`nchanged` of them in total) and `out` holds the
    /// values of that last evaluation; the implementation overwrites the
    /// affected entries. The default recomputes everything.
    fn updated_observable(
        &self,
        x: &[f64],
        nchanged: usize,
        changed_flags: &[bool],
        out: &mut [f64],
    ) {
        let _ = (nchanged, changed_flags);
        self.observable_function(x, out);
    }

    /// Returns an owned copy of this observable.
    fn duplicate(&self) -> Box<dyn ObservableFunction>;
}
