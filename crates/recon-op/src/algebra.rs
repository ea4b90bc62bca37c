// ─────────────────────────────────────────────────────────────────────
// SCPN Recon Core — Composition Algebra
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Combinators that build larger operators from smaller ones.
//!
//! Children are held as `Arc<dyn Operator>`: shared, immutable, alive for
//! the lifetime of the longest-held composite. Shape compatibility is
//! validated at construction so a malformed composition fails before any
//! solver state exists.
//!
//! [`VStack`] and [`DStack`] work on flat concatenations: stacking two
//! operators with output lengths m₁ and m₂ yields a 1-D output of shape
//! `[m₁ + m₂]`, with the children's outputs laid out in order.

use std::sync::Arc;

use ndarray::{ArrayD, IxDyn};
use num_complex::Complex64;
use recon_types::error::{ReconError, ReconResult};

use crate::operator::{check_shape, num_elements, Operator};

// ─────────────────────── flat stacking helpers ──────────────────────

fn concat_flat(a: &ArrayD<Complex64>, b: &ArrayD<Complex64>) -> ArrayD<Complex64> {
    let mut data = Vec::with_capacity(a.len() + b.len());
    data.extend(a.iter().cloned());
    data.extend(b.iter().cloned());
    let total = data.len();
    ArrayD::from_shape_vec(IxDyn(&[total]), data)
        .expect("concatenation length is the sum of the parts")
}

fn split_flat(
    y: &ArrayD<Complex64>,
    first: &[usize],
    second: &[usize],
) -> (ArrayD<Complex64>, ArrayD<Complex64>) {
    let na = num_elements(first);
    let head: Vec<Complex64> = y.iter().take(na).cloned().collect();
    let tail: Vec<Complex64> = y.iter().skip(na).cloned().collect();
    (
        ArrayD::from_shape_vec(IxDyn(first), head).expect("partition length matches shape"),
        ArrayD::from_shape_vec(IxDyn(second), tail).expect("partition length matches shape"),
    )
}

// ─────────────────────────── Multiply ────────────────────────────────

/// Sequential composition. `ops[0]` is the outermost factor:
/// `forward(x) = ops[0]·(ops[1]·(… x))`.
pub struct Multiply {
    ops: Vec<Arc<dyn Operator>>,
    in_shape: Vec<usize>,
    out_shape: Vec<usize>,
}

impl std::fmt::Debug for Multiply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Multiply")
            .field("in_shape", &self.in_shape)
            .field("out_shape", &self.out_shape)
            .field("ops", &self.ops.len())
            .finish()
    }
}

impl Multiply {
    pub fn new(ops: Vec<Arc<dyn Operator>>) -> ReconResult<Self> {
        if ops.is_empty() {
            return Err(ReconError::Incompatible(
                "Multiply needs at least one operator".into(),
            ));
        }
        for pair in ops.windows(2) {
            if pair[0].input_shape() != pair[1].output_shape() {
                return Err(ReconError::Incompatible(format!(
                    "Multiply chain break: {:?} feeds {:?}",
                    pair[1].output_shape(),
                    pair[0].input_shape()
                )));
            }
        }
        let in_shape = ops.last().expect("non-empty").input_shape().to_vec();
        let out_shape = ops.first().expect("non-empty").output_shape().to_vec();
        Ok(Multiply {
            ops,
            in_shape,
            out_shape,
        })
    }
}

impl Operator for Multiply {
    fn input_shape(&self) -> &[usize] {
        &self.in_shape
    }

    fn output_shape(&self) -> &[usize] {
        &self.out_shape
    }

    fn forward(&self, x: &ArrayD<Complex64>) -> ReconResult<ArrayD<Complex64>> {
        check_shape(&self.in_shape, x)?;
        let mut cur = x.clone();
        for op in self.ops.iter().rev() {
            cur = op.forward(&cur)?;
        }
        Ok(cur)
    }

    fn adjoint(&self, y: &ArrayD<Complex64>) -> ReconResult<ArrayD<Complex64>> {
        check_shape(&self.out_shape, y)?;
        let mut cur = y.clone();
        for op in self.ops.iter() {
            cur = op.adjoint(&cur)?;
        }
        Ok(cur)
    }
}

// ──────────────────────────── VStack ─────────────────────────────────

/// Vertical stack: both children consume the same input; outputs are
/// concatenated. The adjoint sums the two adjoint contributions.
pub struct VStack {
    a: Arc<dyn Operator>,
    b: Arc<dyn Operator>,
    in_shape: Vec<usize>,
    out_shape: Vec<usize>,
}

impl std::fmt::Debug for VStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VStack")
            .field("in_shape", &self.in_shape)
            .field("out_shape", &self.out_shape)
            .finish()
    }
}

impl VStack {
    pub fn new(a: Arc<dyn Operator>, b: Arc<dyn Operator>) -> ReconResult<Self> {
        if a.input_shape() != b.input_shape() {
            return Err(ReconError::Incompatible(format!(
                "VStack children disagree on input shape: {:?} vs {:?}",
                a.input_shape(),
                b.input_shape()
            )));
        }
        let in_shape = a.input_shape().to_vec();
        let out_shape = vec![num_elements(a.output_shape()) + num_elements(b.output_shape())];
        Ok(VStack {
            a,
            b,
            in_shape,
            out_shape,
        })
    }
}

impl Operator for VStack {
    fn input_shape(&self) -> &[usize] {
        &self.in_shape
    }

    fn output_shape(&self) -> &[usize] {
        &self.out_shape
    }

    fn forward(&self, x: &ArrayD<Complex64>) -> ReconResult<ArrayD<Complex64>> {
        check_shape(&self.in_shape, x)?;
        let ya = self.a.forward(x)?;
        let yb = self.b.forward(x)?;
        Ok(concat_flat(&ya, &yb))
    }

    fn adjoint(&self, y: &ArrayD<Complex64>) -> ReconResult<ArrayD<Complex64>> {
        check_shape(&self.out_shape, y)?;
        let (ya, yb) = split_flat(y, self.a.output_shape(), self.b.output_shape());
        let xa = self.a.adjoint(&ya)?;
        let xb = self.b.adjoint(&yb)?;
        Ok(xa + xb)
    }
}

// ──────────────────────────── DStack ─────────────────────────────────

/// Block-diagonal stack: each child acts on its own partition of a
/// concatenated input vector, producing its own partition of the output.
pub struct DStack {
    a: Arc<dyn Operator>,
    b: Arc<dyn Operator>,
    in_shape: Vec<usize>,
    out_shape: Vec<usize>,
}

impl DStack {
    pub fn new(a: Arc<dyn Operator>, b: Arc<dyn Operator>) -> Self {
        let in_shape = vec![num_elements(a.input_shape()) + num_elements(b.input_shape())];
        let out_shape = vec![num_elements(a.output_shape()) + num_elements(b.output_shape())];
        DStack {
            a,
            b,
            in_shape,
            out_shape,
        }
    }
}

impl Operator for DStack {
    fn input_shape(&self) -> &[usize] {
        &self.in_shape
    }

    fn output_shape(&self) -> &[usize] {
        &self.out_shape
    }

    fn forward(&self, x: &ArrayD<Complex64>) -> ReconResult<ArrayD<Complex64>> {
        check_shape(&self.in_shape, x)?;
        let (xa, xb) = split_flat(x, self.a.input_shape(), self.b.input_shape());
        let ya = self.a.forward(&xa)?;
        let yb = self.b.forward(&xb)?;
        Ok(concat_flat(&ya, &yb))
    }

    fn adjoint(&self, y: &ArrayD<Complex64>) -> ReconResult<ArrayD<Complex64>> {
        check_shape(&self.out_shape, y)?;
        let (ya, yb) = split_flat(y, self.a.output_shape(), self.b.output_shape());
        let xa = self.a.adjoint(&ya)?;
        let xb = self.b.adjoint(&yb)?;
        Ok(concat_flat(&xa, &xb))
    }
}

// ─────────────────────── diagonal scalings ──────────────────────────

/// Scaling by a fixed real scalar. Self-adjoint.
#[derive(Debug, Clone)]
pub struct DiagScale {
    shape: Vec<usize>,
    factor: f64,
}

impl DiagScale {
    pub fn new(shape: &[usize], factor: f64) -> Self {
        DiagScale {
            shape: shape.to_vec(),
            factor,
        }
    }
}

impl Operator for DiagScale {
    fn input_shape(&self) -> &[usize] {
        &self.shape
    }

    fn output_shape(&self) -> &[usize] {
        &self.shape
    }

    fn forward(&self, x: &ArrayD<Complex64>) -> ReconResult<ArrayD<Complex64>> {
        check_shape(&self.shape, x)?;
        Ok(x.mapv(|z| z * self.factor))
    }

    fn adjoint(&self, y: &ArrayD<Complex64>) -> ReconResult<ArrayD<Complex64>> {
        self.forward(y)
    }
}

/// Elementwise scaling by a real weight vector tiled `reps` times along a
/// flat input of length `weights.len() · reps`. Self-adjoint.
#[derive(Debug, Clone)]
pub struct DiagRep {
    weights: Vec<f64>,
    shape: Vec<usize>,
}

impl DiagRep {
    pub fn new(weights: Vec<f64>, reps: usize) -> ReconResult<Self> {
        if weights.is_empty() || reps == 0 {
            return Err(ReconError::Incompatible(
                "DiagRep needs a non-empty weight vector and reps >= 1".into(),
            ));
        }
        let shape = vec![weights.len() * reps];
        Ok(DiagRep { weights, shape })
    }

    fn scale(&self, x: &ArrayD<Complex64>) -> ArrayD<Complex64> {
        let k = self.weights.len();
        let data: Vec<Complex64> = x
            .iter()
            .enumerate()
            .map(|(i, &z)| z * self.weights[i % k])
            .collect();
        ArrayD::from_shape_vec(IxDyn(&self.shape), data).expect("scaling preserves length")
    }
}

impl Operator for DiagRep {
    fn input_shape(&self) -> &[usize] {
        &self.shape
    }

    fn output_shape(&self) -> &[usize] {
        &self.shape
    }

    fn forward(&self, x: &ArrayD<Complex64>) -> ReconResult<ArrayD<Complex64>> {
        check_shape(&self.shape, x)?;
        Ok(self.scale(x))
    }

    fn adjoint(&self, y: &ArrayD<Complex64>) -> ReconResult<ArrayD<Complex64>> {
        self.forward(y)
    }
}

// ═══════════════════════════════ tests ═══════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::{cdot, from_reals, Identity};

    #[test]
    fn test_vstack_of_identities() {
        // VStack of two identities on a length-3 vector: forward is [x; x],
        // adjoint of [y1; y2] is y1 + y2.
        let stack = VStack::new(
            Arc::new(Identity::new(&[3])),
            Arc::new(Identity::new(&[3])),
        )
        .unwrap();
        assert_eq!(stack.output_shape(), &[6]);

        let x = from_reals(&[3], &[1.0, 2.0, 3.0]);
        let y = stack.forward(&x).unwrap();
        let expected = from_reals(&[6], &[1.0, 2.0, 3.0, 1.0, 2.0, 3.0]);
        assert_eq!(y, expected);

        let y2 = from_reals(&[6], &[1.0, 1.0, 1.0, 10.0, 20.0, 30.0]);
        let back = stack.adjoint(&y2).unwrap();
        let summed = from_reals(&[3], &[11.0, 21.0, 31.0]);
        assert_eq!(back, summed);
    }

    #[test]
    fn test_vstack_rejects_mismatched_inputs() {
        let err = VStack::new(
            Arc::new(Identity::new(&[3])),
            Arc::new(Identity::new(&[4])),
        )
        .unwrap_err();
        assert!(matches!(err, ReconError::Incompatible(_)));
    }

    #[test]
    fn test_dstack_partitions() {
        let stack = DStack::new(
            Arc::new(DiagScale::new(&[2], 2.0)),
            Arc::new(DiagScale::new(&[3], -1.0)),
        );
        assert_eq!(stack.input_shape(), &[5]);
        assert_eq!(stack.output_shape(), &[5]);

        let x = from_reals(&[5], &[1.0, 2.0, 3.0, 4.0, 5.0]);
        let y = stack.forward(&x).unwrap();
        let expected = from_reals(&[5], &[2.0, 4.0, -3.0, -4.0, -5.0]);
        assert_eq!(y, expected);
    }

    #[test]
    fn test_multiply_chains_right_to_left() {
        // forward = DiagScale(3) ∘ DiagScale(2)
        let chain = Multiply::new(vec![
            Arc::new(DiagScale::new(&[2], 3.0)) as Arc<dyn Operator>,
            Arc::new(DiagScale::new(&[2], 2.0)),
        ])
        .unwrap();
        let x = from_reals(&[2], &[1.0, -1.0]);
        let y = chain.forward(&x).unwrap();
        assert_eq!(y, from_reals(&[2], &[6.0, -6.0]));
    }

    #[test]
    fn test_multiply_rejects_shape_break() {
        let err = Multiply::new(vec![
            Arc::new(Identity::new(&[2])) as Arc<dyn Operator>,
            Arc::new(Identity::new(&[3])),
        ])
        .unwrap_err();
        assert!(matches!(err, ReconError::Incompatible(_)));
    }

    #[test]
    fn test_diag_rep_tiles_weights() {
        let op = DiagRep::new(vec![1.0, 10.0], 2).unwrap();
        assert_eq!(op.input_shape(), &[4]);
        let x = from_reals(&[4], &[1.0, 1.0, 2.0, 2.0]);
        let y = op.forward(&x).unwrap();
        assert_eq!(y, from_reals(&[4], &[1.0, 10.0, 2.0, 20.0]));
    }

    #[test]
    fn test_nested_composite_adjoint_duality() {
        // Multiply(VStack(I, 2I), then scale) against random-ish vectors.
        let inner: Arc<dyn Operator> = Arc::new(
            VStack::new(
                Arc::new(Identity::new(&[3])),
                Arc::new(DiagScale::new(&[3], 2.0)),
            )
            .unwrap(),
        );
        let op = Multiply::new(vec![
            Arc::new(DiagScale::new(&[6], 0.5)) as Arc<dyn Operator>,
            inner,
        ])
        .unwrap();

        let x = from_reals(&[3], &[0.3, -1.7, 2.2]);
        let y = from_reals(&[6], &[1.0, 0.0, -2.0, 0.5, 3.0, -0.25]);
        let lhs = cdot(&op.forward(&x).unwrap(), &y);
        let rhs = cdot(&x, &op.adjoint(&y).unwrap());
        assert!(
            (lhs - rhs).norm() < 1e-12,
            "⟨Ax,y⟩ = {} vs ⟨x,A'y⟩ = {}",
            lhs,
            rhs
        );
    }
}
