// ─────────────────────────────────────────────────────────────────────
// SCPN Recon Core — Zero Pad
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Centered zero-padding with crop adjoint.
//!
//! Forward embeds the input at the centre of a larger array (oversampled
//! grids, apodization margins); the adjoint crops the same region back out.

use ndarray::{ArrayD, IxDyn, SliceInfoElem};
use num_complex::Complex64;
use recon_types::error::{ReconError, ReconResult};

use crate::operator::{check_shape, Operator};

pub struct ZeroPad {
    in_shape: Vec<usize>,
    out_shape: Vec<usize>,
    left: Vec<usize>,
}

impl ZeroPad {
    pub fn new(in_shape: &[usize], out_shape: &[usize]) -> ReconResult<Self> {
        if in_shape.len() != out_shape.len() {
            return Err(ReconError::Incompatible(format!(
                "ZeroPad rank mismatch: {:?} vs {:?}",
                in_shape, out_shape
            )));
        }
        for (&small, &big) in in_shape.iter().zip(out_shape.iter()) {
            if small == 0 || big < small {
                return Err(ReconError::Incompatible(format!(
                    "ZeroPad output {:?} must dominate input {:?}",
                    out_shape, in_shape
                )));
            }
        }
        // Centre offset; odd margins favour the left, matching the
        // oversampled-grid convention.
        let left: Vec<usize> = in_shape
            .iter()
            .zip(out_shape.iter())
            .map(|(&small, &big)| (big - small + 1) / 2)
            .collect();
        Ok(ZeroPad {
            in_shape: in_shape.to_vec(),
            out_shape: out_shape.to_vec(),
            left,
        })
    }

    fn window(&self) -> Vec<SliceInfoElem> {
        self.left
            .iter()
            .zip(self.in_shape.iter())
            .map(|(&l, &n)| SliceInfoElem::Slice {
                start: l as isize,
                end: Some((l + n) as isize),
                step: 1,
            })
            .collect()
    }
}

impl Operator for ZeroPad {
    fn input_shape(&self) -> &[usize] {
        &self.in_shape
    }

    fn output_shape(&self) -> &[usize] {
        &self.out_shape
    }

    fn forward(&self, x: &ArrayD<Complex64>) -> ReconResult<ArrayD<Complex64>> {
        check_shape(&self.in_shape, x)?;
        let mut y = ArrayD::zeros(IxDyn(&self.out_shape));
        let window = self.window();
        y.slice_mut(window.as_slice()).assign(x);
        Ok(y)
    }

    fn adjoint(&self, y: &ArrayD<Complex64>) -> ReconResult<ArrayD<Complex64>> {
        check_shape(&self.out_shape, y)?;
        let window = self.window();
        Ok(y.slice(window.as_slice()).to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::{cdot, from_reals};

    #[test]
    fn test_pad_centres_input() {
        let pad = ZeroPad::new(&[2], &[5]).unwrap();
        let x = from_reals(&[2], &[1.0, 2.0]);
        let y = pad.forward(&x).unwrap();
        // margin 3 → left offset (3+1)/2 = 2
        assert_eq!(y, from_reals(&[5], &[0.0, 0.0, 1.0, 2.0, 0.0]));
    }

    #[test]
    fn test_adjoint_crops_same_window() {
        let pad = ZeroPad::new(&[2, 2], &[4, 4]).unwrap();
        let x = from_reals(&[2, 2], &[1.0, 2.0, 3.0, 4.0]);
        let y = pad.forward(&x).unwrap();
        let back = pad.adjoint(&y).unwrap();
        assert_eq!(back, x);
    }

    #[test]
    fn test_pad_adjoint_duality() {
        let pad = ZeroPad::new(&[3], &[7]).unwrap();
        let x = from_reals(&[3], &[1.5, -2.0, 0.25]);
        let y = from_reals(&[7], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        let lhs = cdot(&pad.forward(&x).unwrap(), &y);
        let rhs = cdot(&x, &pad.adjoint(&y).unwrap());
        assert!((lhs - rhs).norm() < 1e-12);
    }

    #[test]
    fn test_pad_rejects_shrinking() {
        assert!(ZeroPad::new(&[5], &[3]).is_err());
        assert!(ZeroPad::new(&[2, 2], &[4]).is_err());
    }

    #[test]
    fn test_pad_identity_when_shapes_equal() {
        let pad = ZeroPad::new(&[3], &[3]).unwrap();
        let x = from_reals(&[3], &[1.0, 2.0, 3.0]);
        assert_eq!(pad.forward(&x).unwrap(), x);
        assert_eq!(pad.adjoint(&x).unwrap(), x);
    }
}
