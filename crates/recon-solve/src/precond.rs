// ─────────────────────────────────────────────────────────────────────
// SCPN Recon Core — Preconditioner
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Left-preconditioner contract for the LSMR solver.

use ndarray::{ArrayD, Zip};
use num_complex::Complex64;

/// An approximate inverse of the measurement-domain Gram operator.
///
/// Must be shape-preserving; absence of a preconditioner means identity.
pub trait Preconditioner: Send + Sync {
    fn apply(&self, y: &ArrayD<Complex64>) -> ArrayD<Complex64>;
}

/// Fixed real weights applied elementwise. The weights array must match the
/// measurement shape.
#[derive(Debug, Clone)]
pub struct DiagPrecond {
    weights: ArrayD<f64>,
}

impl DiagPrecond {
    pub fn new(weights: ArrayD<f64>) -> Self {
        DiagPrecond { weights }
    }
}

impl Preconditioner for DiagPrecond {
    fn apply(&self, y: &ArrayD<Complex64>) -> ArrayD<Complex64> {
        let mut out = y.clone();
        Zip::from(&mut out)
            .and(&self.weights)
            .for_each(|o, &w| *o = *o * w);
        out
    }
}
