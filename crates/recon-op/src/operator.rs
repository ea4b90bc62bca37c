// ─────────────────────────────────────────────────────────────────────
// SCPN Recon Core — Operator Contract
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! The linear-operator contract.
//!
//! An [`Operator`] maps between two fixed-shape complex-array spaces. The
//! defining invariant is adjoint duality: `⟨A·x, y⟩ = ⟨x, A†·y⟩` for all
//! conforming `x`, `y`. Every combinator in [`crate::algebra`] preserves it.
//!
//! Operators are immutable and reentrant after construction: concurrent
//! `forward`/`adjoint` calls against a shared instance are safe, and any
//! precomputation (FFT plans, kernel tables) happens in constructors.

use ndarray::{ArrayD, IxDyn};
use num_complex::Complex64;
use recon_types::error::{ReconError, ReconResult};

/// A linear map between two fixed-shape complex-array spaces.
pub trait Operator: Send + Sync {
    /// Shape every `forward` input and `adjoint` output must conform to.
    fn input_shape(&self) -> &[usize];

    /// Shape every `forward` output and `adjoint` input must conform to.
    fn output_shape(&self) -> &[usize];

    /// Apply the operator. Fails with [`ReconError::ShapeMismatch`] before
    /// touching data if `x` does not conform to the input shape.
    fn forward(&self, x: &ArrayD<Complex64>) -> ReconResult<ArrayD<Complex64>>;

    /// Apply the adjoint. Symmetric contract to [`Operator::forward`].
    fn adjoint(&self, y: &ArrayD<Complex64>) -> ReconResult<ArrayD<Complex64>>;

    /// `A†A` in one call.
    ///
    /// Defaults to the naive composition. Implementations with a precomputed
    /// transform-domain kernel may override this with a single pointwise
    /// multiply; the result must agree with the naive composition up to
    /// floating-point rounding.
    fn adjoint_forward(&self, x: &ArrayD<Complex64>) -> ReconResult<ArrayD<Complex64>> {
        self.adjoint(&self.forward(x)?)
    }
}

/// Check an array against a declared shape.
pub fn check_shape(expected: &[usize], x: &ArrayD<Complex64>) -> ReconResult<()> {
    if x.shape() != expected {
        return Err(ReconError::ShapeMismatch {
            expected: expected.to_vec(),
            got: x.shape().to_vec(),
        });
    }
    Ok(())
}

// ───────────────────────── BLAS-like helpers ─────────────────────────

/// Complex inner product `⟨a, b⟩ = Σ conj(aᵢ)·bᵢ`.
#[inline]
pub fn cdot(a: &ArrayD<Complex64>, b: &ArrayD<Complex64>) -> Complex64 {
    a.iter().zip(b.iter()).map(|(x, y)| x.conj() * y).sum()
}

/// Euclidean (L2) norm.
#[inline]
pub fn norm2(a: &ArrayD<Complex64>) -> f64 {
    a.iter().map(|z| z.norm_sqr()).sum::<f64>().sqrt()
}

/// Total element count of a shape.
#[inline]
pub fn num_elements(shape: &[usize]) -> usize {
    shape.iter().product()
}

// ─────────────────────────── identity ───────────────────────────────

/// The trivial operator: forward = adjoint = copy.
#[derive(Debug, Clone)]
pub struct Identity {
    shape: Vec<usize>,
}

impl Identity {
    pub fn new(shape: &[usize]) -> Self {
        Identity {
            shape: shape.to_vec(),
        }
    }
}

impl Operator for Identity {
    fn input_shape(&self) -> &[usize] {
        &self.shape
    }

    fn output_shape(&self) -> &[usize] {
        &self.shape
    }

    fn forward(&self, x: &ArrayD<Complex64>) -> ReconResult<ArrayD<Complex64>> {
        check_shape(&self.shape, x)?;
        Ok(x.clone())
    }

    fn adjoint(&self, y: &ArrayD<Complex64>) -> ReconResult<ArrayD<Complex64>> {
        check_shape(&self.shape, y)?;
        Ok(y.clone())
    }
}

/// Build a complex array from a flat `f64` slice (test and example helper).
pub fn from_reals(shape: &[usize], values: &[f64]) -> ArrayD<Complex64> {
    let data: Vec<Complex64> = values.iter().map(|&v| Complex64::new(v, 0.0)).collect();
    ArrayD::from_shape_vec(IxDyn(shape), data).expect("value count matches shape")
}
