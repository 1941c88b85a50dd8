//! Paired `new`/`old` buffers for cached intermediate values.
//!
//! Sampling functions (and any other component that caches per-position
//! temporaries) evaluate the proposed position into the `new` buffer while
//! the `old` buffer keeps the values of the last accepted position. Commit
//! and rollback are plain buffer copies, so a rejected proposal leaves no
//! trace and an accepted one becomes the new reference.

/// A pair of equally sized proto-value buffers.
#[derive(Debug, Clone, Default)]
pub struct ProtoValues {
    new: Vec<f64>,
    old: Vec<f64>,
}

impl ProtoValues {
    /// Creates a zero-initialized pair of length `nproto`.
    pub fn new(nproto: usize) -> Self {
        Self {
            new: vec![0.; nproto],
            old: vec![0.; nproto],
        }
    }

    /// Buffer length.
    pub fn len(&self) -> usize {
        self.old.len()
    }

    /// Whether the pair holds no values at all.
    pub fn is_empty(&self) -> bool {
        self.old.is_empty()
    }

    /// Read access to the values of the proposed position.
    pub fn new_values(&self) -> &[f64] {
        &self.new
    }

    /// Read access to the values of the last accepted position.
    pub fn old_values(&self) -> &[f64] {
        &self.old
    }

    /// The old buffer for reading together with the new buffer for writing,
    /// as needed by selective update paths.
    pub fn split_mut(&mut self) -> (&[f64], &mut [f64]) {
        (&self.old, &mut self.new)
    }

    /// Write access to the new buffer.
    pub fn new_values_mut(&mut self) -> &mut [f64] {
        &mut self.new
    }

    /// Seeds both buffers with the values computed by `f`, establishing the
    /// invariant `new == old` at the start of a sampling run.
    pub fn init_with(&mut self, f: impl FnOnce(&mut [f64])) {
        f(&mut self.old);
        self.new.copy_from_slice(&self.old);
    }

    /// Commit: the proposed values become the reference values.
    pub fn new_to_old(&mut self) {
        self.old.copy_from_slice(&self.new);
    }

    /// Rollback: the proposed values are discarded.
    pub fn old_to_new(&mut self) {
        self.new.copy_from_slice(&self.old);
    }
}
