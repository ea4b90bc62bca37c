// ─────────────────────────────────────────────────────────────────────
// SCPN Recon Core — Reconstruction Pipeline Tests
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! End-to-end reconstruction on composed operators: a padded frequency-
//! domain system solved with LSMR, and a sparse deconvolution solved with
//! ADMM plus soft thresholding. Exercises the same composition paths a
//! gridding-based reconstruction would use, with synthetic kernels standing
//! in for the physics.

use std::sync::Arc;

use ndarray::{ArrayD, IxDyn};
use num_complex::Complex64;
use recon_op::{norm2, FreqDiag, Identity, Multiply, Operator, ZeroPad};
use recon_solve::{admm, lsmr, AdmmReg, LsmrOptions, SoftThreshold};
use recon_types::config::{AdmmConfig, LsmrConfig};

fn spike_signal(n: usize, spikes: &[(usize, f64)]) -> ArrayD<Complex64> {
    let mut data = vec![Complex64::new(0.0, 0.0); n];
    for &(idx, height) in spikes {
        data[idx] = Complex64::new(height, 0.0);
    }
    ArrayD::from_shape_vec(IxDyn(&[n]), data).unwrap()
}

fn smooth_kernel(n: usize) -> Vec<Complex64> {
    // Bounded away from zero so the system stays invertible.
    (0..n)
        .map(|i| {
            let t = i as f64 / n as f64;
            Complex64::new(1.0 + 0.5 * (2.0 * std::f64::consts::PI * t).cos(), 0.2 * t)
        })
        .collect()
}

#[test]
fn test_lsmr_inverts_padded_convolution() {
    // A = FreqDiag ∘ ZeroPad: image domain [12] embedded into an
    // oversampled grid [16], then convolved.
    let n = 12;
    let m = 16;
    let pad: Arc<dyn Operator> = Arc::new(ZeroPad::new(&[n], &[m]).unwrap());
    let freq: Arc<dyn Operator> = Arc::new(FreqDiag::new(smooth_kernel(m)).unwrap());
    let op = Multiply::new(vec![freq, pad]).unwrap();

    let x_true = spike_signal(n, &[(1, 2.0), (5, -1.5), (9, 0.75)]);
    let b = op.forward(&x_true).unwrap();

    let config = LsmrConfig {
        max_its: 64,
        atol: 1e-10,
        btol: 1e-10,
        ctol: 1e-10,
    };
    let result = lsmr(&op, &b, LsmrOptions::default(), &config).unwrap();

    assert!(result.converged, "Reason: {}", result.reason);
    let err = norm2(&(&result.x - &x_true));
    assert!(err < 1e-6, "Padded deconvolution error {}", err);
}

#[test]
fn test_admm_recovers_sparse_signal() {
    let n = 32;
    let op: Arc<dyn Operator> = Arc::new(FreqDiag::new(smooth_kernel(n)).unwrap());
    let x_true = spike_signal(n, &[(3, 2.5), (17, 1.8), (28, -2.2)]);
    let b = op.forward(&x_true).unwrap();

    let reg = AdmmReg {
        transform: Arc::new(Identity::new(&[n])),
        prox: Arc::new(SoftThreshold { lambda: 1e-3 }),
    };
    let config = AdmmConfig {
        outer_its: 40,
        inner_its0: 32,
        inner_its1: 8,
        rho: 1.0,
        abstol: 1e-6,
        reltol: 1e-6,
        ..AdmmConfig::default()
    };

    let result = admm(op, &b, &[reg], &config).unwrap();

    // A tiny ℓ₁ weight leaves the well-posed solution essentially intact.
    let err = norm2(&(&result.x - &x_true));
    assert!(
        err < 0.05 * norm2(&x_true),
        "Sparse recovery error {} (converged: {}, iterations: {})",
        err,
        result.converged,
        result.iterations
    );
}

#[test]
fn test_concurrent_solves_share_one_operator() {
    // Operators are immutable and reentrant; independent solves against the
    // same instance from different threads must agree with a serial run.
    let n = 16;
    let op = Arc::new(FreqDiag::new(smooth_kernel(n)).unwrap());

    let x1 = spike_signal(n, &[(2, 1.0), (9, -2.0)]);
    let x2 = spike_signal(n, &[(5, 3.0)]);
    let b1 = op.forward(&x1).unwrap();
    let b2 = op.forward(&x2).unwrap();

    let config = LsmrConfig::default();
    let serial1 = lsmr(op.as_ref(), &b1, LsmrOptions::default(), &config).unwrap();
    let serial2 = lsmr(op.as_ref(), &b2, LsmrOptions::default(), &config).unwrap();

    let (parallel1, parallel2) = {
        let op1 = op.clone();
        let op2 = op.clone();
        let c1 = config.clone();
        let c2 = config.clone();
        let b1c = b1.clone();
        let b2c = b2.clone();
        let h1 = std::thread::spawn(move || {
            lsmr(op1.as_ref(), &b1c, LsmrOptions::default(), &c1).unwrap()
        });
        let h2 = std::thread::spawn(move || {
            lsmr(op2.as_ref(), &b2c, LsmrOptions::default(), &c2).unwrap()
        });
        (h1.join().unwrap(), h2.join().unwrap())
    };

    assert_eq!(serial1.x, parallel1.x);
    assert_eq!(serial2.x, parallel2.x);
}
