//! Frequency-domain diagonal kernel operator.
//!
//! `FreqDiag` applies `F⁻¹ · diag(k) · F` to a flat vector, where `F` is the
//! unnormalized DFT and the inverse carries the 1/n factor. This is the
//! algebraic skeleton of convolution-style system operators: the adjoint is
//! the same sandwich with the conjugate kernel, and `adjoint_forward`
//! collapses to a single round trip through `diag(|k|²)` — one transform
//! pair instead of two operator applications.

use std::sync::Arc;

use ndarray::{ArrayD, IxDyn};
use num_complex::Complex64;
use recon_types::error::{ReconError, ReconResult};
use rustfft::{Fft, FftPlanner};

use crate::operator::{check_shape, Operator};

pub struct FreqDiag {
    kernel: Vec<Complex64>,
    gram: Vec<Complex64>,
    fft: Arc<dyn Fft<f64>>,
    ifft: Arc<dyn Fft<f64>>,
    shape: Vec<usize>,
}

impl FreqDiag {
    /// Build from a transform-domain diagonal. Plans are created once here;
    /// the operator is immutable and reentrant afterwards.
    pub fn new(kernel: Vec<Complex64>) -> ReconResult<Self> {
        let n = kernel.len();
        if n == 0 {
            return Err(ReconError::Incompatible(
                "FreqDiag kernel must be non-empty".into(),
            ));
        }
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(n);
        let ifft = planner.plan_fft_inverse(n);
        let gram: Vec<Complex64> = kernel
            .iter()
            .map(|k| Complex64::new(k.norm_sqr(), 0.0))
            .collect();
        Ok(FreqDiag {
            kernel,
            gram,
            fft,
            ifft,
            shape: vec![n],
        })
    }

    fn sandwich(&self, x: &ArrayD<Complex64>, diag: &[Complex64]) -> ArrayD<Complex64> {
        let n = diag.len();
        let mut buf: Vec<Complex64> = x.iter().cloned().collect();
        self.fft.process(&mut buf);
        for (b, k) in buf.iter_mut().zip(diag.iter()) {
            *b *= *k;
        }
        self.ifft.process(&mut buf);
        let norm = 1.0 / n as f64;
        for b in buf.iter_mut() {
            *b *= norm;
        }
        ArrayD::from_shape_vec(IxDyn(&self.shape), buf).expect("transform preserves length")
    }
}

impl Operator for FreqDiag {
    fn input_shape(&self) -> &[usize] {
        &self.shape
    }

    fn output_shape(&self) -> &[usize] {
        &self.shape
    }

    fn forward(&self, x: &ArrayD<Complex64>) -> ReconResult<ArrayD<Complex64>> {
        check_shape(&self.shape, x)?;
        Ok(self.sandwich(x, &self.kernel))
    }

    fn adjoint(&self, y: &ArrayD<Complex64>) -> ReconResult<ArrayD<Complex64>> {
        check_shape(&self.shape, y)?;
        let conj: Vec<Complex64> = self.kernel.iter().map(|k| k.conj()).collect();
        Ok(self.sandwich(y, &conj))
    }

    fn adjoint_forward(&self, x: &ArrayD<Complex64>) -> ReconResult<ArrayD<Complex64>> {
        check_shape(&self.shape, x)?;
        Ok(self.sandwich(x, &self.gram))
    }
}
