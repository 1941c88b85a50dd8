//! The sampling-function contract and the product-PDF container.

use super::proto::ProtoValues;
use super::walker::WalkerState;

/// One component of the sampling density.
///
/// A sampling function never stores per-position state itself; it computes
/// proto values (cached temporaries, e.g. the summands of an exponent) into
/// buffers owned by the [`PdfContainer`], which also handles commit and
/// rollback. The density sampled by the engine is the pointwise product of
/// all registered components.
pub trait SamplingFunction {
    /// Dimension of the walker positions this PDF accepts.
    fn ndim(&self) -> usize;

    /// Number of proto values this PDF computes per position.
    fn nproto(&self) -> usize;

    /// Computes the proto values of position `x` into `protov`.
    fn proto_function(&self, x: &[f64], protov: &mut [f64]);

    /// The density value reconstructed from proto values; must be `>= 0`.
    fn sampling_function(&self, protov: &[f64]) -> f64;

    /// The acceptance ratio `p(new)/p(old)` from the two proto-value sets.
    fn acceptance_function(&self, proto_old: &[f64], proto_new: &[f64]) -> f64;

    /// Whether [`updated_acceptance`](Self::updated_acceptance) is usable.
    fn supports_update(&self) -> bool {
        false
    }

    /// Selective form of the acceptance ratio for partial moves.
    ///
    /// Receives the walker (with its change-set describing how `xnew`
    /// differs from `xold`) and the old proto values; writes the proto
    /// values of `xnew` into `proto_new` (it may leave untouched entries to
    /// their previous, still valid contents) and returns `p(new)/p(old)`.
    ///
    /// The default recomputes from scratch.
    fn updated_acceptance(
        &self,
        wlk: &WalkerState,
        proto_old: &[f64],
        proto_new: &mut [f64],
    ) -> f64 {
        self.proto_function(&wlk.xnew, proto_new);
        self.acceptance_function(proto_old, proto_new)
    }

    /// Returns an owned copy of this sampling function.
    fn duplicate(&self) -> Box<dyn SamplingFunction>;
}

/// The product of all registered sampling functions, together with their
/// proto-value caches.
#[derive(Default)]
pub struct PdfContainer {
    pdfs: Vec<(Box<dyn SamplingFunction>, ProtoValues)>,
}

impl PdfContainer {
    /// Creates an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any sampling function is registered.
    pub fn has_pdf(&self) -> bool {
        !self.pdfs.is_empty()
    }

    /// Number of registered components.
    pub fn len(&self) -> usize {
        self.pdfs.len()
    }

    /// Whether the container is empty.
    pub fn is_empty(&self) -> bool {
        self.pdfs.is_empty()
    }

    /// Moves `pdf` into the container, allocating its proto-value cache.
    pub fn push(&mut self, pdf: Box<dyn SamplingFunction>) {
        let protov = ProtoValues::new(pdf.nproto());
        self.pdfs.push((pdf, protov));
    }

    /// Removes and returns the most recently added component.
    pub fn pop(&mut self) -> Option<Box<dyn SamplingFunction>> {
        self.pdfs.pop().map(|(pdf, _)| pdf)
    }

    /// Seeds every component's proto values at position `x`, establishing
    /// `new == old` across the container.
    pub fn initialize_proto_values(&mut self, x: &[f64]) {
        for (pdf, protov) in &mut self.pdfs {
            protov.init_with(|out| pdf.proto_function(x, out));
        }
    }

    /// Re-evaluates every component's reference proto values at `x`.
    ///
    /// Used right before a PDF-dependent observable reads the density, to
    /// make the cached values reflect the current walker position.
    pub fn prepare_observation(&mut self, x: &[f64]) {
        self.initialize_proto_values(x);
    }

    /// The product density at the last prepared position.
    pub fn density(&self) -> f64 {
        self.pdfs
            .iter()
            .map(|(pdf, protov)| pdf.sampling_function(protov.old_values()))
            .product()
    }

    /// The product acceptance factor `prod_i p_i(new)/p_i(old)` for the
    /// proposed move described by `wlk`.
    ///
    /// Components supporting selective updates get the cheap path whenever
    /// the move touched fewer than all coordinates; everyone else has their
    /// new proto values recomputed from scratch.
    pub fn compute_acceptance(&mut self, wlk: &WalkerState) -> f64 {
        let selective = wlk.nchanged < wlk.ndim();
        let mut acceptance = 1.;
        for (pdf, protov) in &mut self.pdfs {
            let (proto_old, proto_new) = protov.split_mut();
            acceptance *= if selective && pdf.supports_update() {
                pdf.updated_acceptance(wlk, proto_old, proto_new)
            } else {
                pdf.proto_function(&wlk.xnew, proto_new);
                pdf.acceptance_function(proto_old, proto_new)
            };
        }
        acceptance
    }

    /// Commits the proposed proto values of every component.
    pub fn new_to_old(&mut self) {
        for (_, protov) in &mut self.pdfs {
            protov.new_to_old();
        }
    }

    /// Rolls the proposed proto values of every component back.
    pub fn old_to_new(&mut self) {
        for (_, protov) in &mut self.pdfs {
            protov.old_to_new();
        }
    }

    /// Checks `new == old` for every component; used by tests and debug
    /// assertions after commit/rollback.
    pub fn proto_values_agree(&self) -> bool {
        self.pdfs
            .iter()
            .all(|(_, protov)| protov.new_values() == protov.old_values())
    }
}
