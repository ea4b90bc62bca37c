// ─────────────────────────────────────────────────────────────────────
// SCPN Recon Core — LSMR
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Regularized LSMR least-squares solver.
//!
//! Solves `min_x ‖Ax − b‖² + λ‖x − x_r‖²` over an abstract [`Operator`]
//! via Golub–Kahan bidiagonalization. The regularization enters the
//! bidiagonalization itself through a ghost residual component, so the
//! damping is exact rather than approximate, and an arbitrary center `x_r`
//! and warm start `x0` are supported. [`lsmr_damp`] is the reduced form for
//! pure Tikhonov damping (no reference vector), where λ is folded in with an
//! extra plane rotation per step.
//!
//! No explicit residual vector is ever formed: the residual norm, the
//! operator-norm bound and the condition-number bound are all carried
//! through the accumulated rotation scalars. This is the memory-efficiency
//! property that separates LSMR from normal-equation CG.
//!
//! Reference: Fong & Saunders, "LSMR: An iterative algorithm for sparse
//! least-squares problems", SISC 2011.

use ndarray::{ArrayD, IxDyn, Zip};
use num_complex::Complex64;
use recon_op::{cdot, check_shape, norm2, Operator};
use recon_types::config::LsmrConfig;
use recon_types::error::ReconResult;

use crate::precond::Preconditioner;

// ──────────────────── stable rotation construction ───────────────────

/// Stable Givens rotation: returns `(c, s, r)` with `r = hypot(a, b)`,
/// branching on the larger operand instead of forming `a² + b²`.
pub fn stable_givens(a: f64, b: f64) -> (f64, f64, f64) {
    if b == 0.0 {
        if a == 0.0 {
            (1.0, 0.0, 0.0)
        } else {
            (1.0f64.copysign(a), 0.0, a.abs())
        }
    } else if a == 0.0 {
        (0.0, 1.0f64.copysign(b), b.abs())
    } else if b.abs() > a.abs() {
        let tau = a / b;
        let s = (1.0 / (1.0 + tau * tau).sqrt()).copysign(b);
        let c = s * tau;
        (c, s, b / s)
    } else {
        let tau = b / a;
        let c = (1.0 / (1.0 + tau * tau).sqrt()).copysign(a);
        let s = c * tau;
        (c, s, a / c)
    }
}

// ─────────────────────────── diagnostics ─────────────────────────────

/// Why the iteration loop stopped. Every variant except [`IterationLimit`]
/// counts as convergence; degeneracy is a successful early stop, not a
/// fault.
///
/// [`IterationLimit`]: StopReason::IterationLimit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// cond(A) reached floating-point precision.
    ConditionMachine,
    /// 1/cond(A) fell below `ctol`.
    ConditionLimit,
    /// ‖A'r‖/(‖A‖‖r‖) reached floating-point precision.
    NormalMachine,
    /// ‖A'r‖/(‖A‖‖r‖) fell below `atol`.
    NormalTol,
    /// ‖r‖ fell below `btol·‖b‖ + atol·‖A‖‖x‖`.
    ResidualTol,
    /// ‖r‖ reached floating-point precision.
    ResidualMachine,
    /// The bidiagonalization produced a zero pivot; the iterate cannot be
    /// improved further.
    Breakdown,
    /// Iteration cap reached; the result is the best estimate so far.
    IterationLimit,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            StopReason::ConditionMachine => "cond(A) is very large",
            StopReason::ConditionLimit => "cond(A) has exceeded limit",
            StopReason::NormalMachine => "least-squares solution reached machine precision",
            StopReason::NormalTol => "least-squares residual below atol",
            StopReason::ResidualTol => "residual below atol/btol",
            StopReason::ResidualMachine => "residual reached machine precision",
            StopReason::Breakdown => "bidiagonalization breakdown",
            StopReason::IterationLimit => "iteration limit reached",
        };
        write!(f, "{}", msg)
    }
}

/// Result of an LSMR solve. The estimates are the recurrence values at the
/// stopping iteration, rescaled where they depend on ‖b‖.
#[derive(Debug, Clone)]
pub struct LsmrResult {
    /// Solution estimate.
    pub x: ArrayD<Complex64>,
    /// Bidiagonalization iterations taken.
    pub iterations: usize,
    /// Residual-norm estimate ‖Ax − b‖ (including the damping component).
    pub residual: f64,
    /// Normal-equation residual estimate ‖A'r‖.
    pub normal_residual: f64,
    /// Frobenius-style lower bound on ‖A‖.
    pub norm_a: f64,
    /// Running condition-number bound.
    pub cond_a: f64,
    /// False only when the iteration cap was exhausted.
    pub converged: bool,
    pub reason: StopReason,
}

/// Iteration snapshot handed to the debug hook.
pub struct LsmrTrace<'a> {
    pub x: &'a ArrayD<Complex64>,
    pub u: &'a ArrayD<Complex64>,
    pub v: &'a ArrayD<Complex64>,
}

/// Per-iteration debug hook. Diagnostic capture only: solver output must be
/// identical whether or not one is installed.
pub type DebugHook<'a> = dyn FnMut(usize, &LsmrTrace<'_>) + 'a;

/// Optional inputs to [`lsmr`]. The defaults solve the plain least-squares
/// problem from a zero start.
#[derive(Default)]
pub struct LsmrOptions<'a> {
    /// Warm-start estimate (default: zero).
    pub x0: Option<&'a ArrayD<Complex64>>,
    /// Regularization center `x_r` (default: zero).
    pub xr: Option<&'a ArrayD<Complex64>>,
    /// Tikhonov weight λ.
    pub lambda: f64,
    /// Left preconditioner (default: identity).
    pub precond: Option<&'a dyn Preconditioner>,
    pub debug: Option<&'a mut DebugHook<'a>>,
}

fn apply_precond(m: Option<&dyn Preconditioner>, y: &ArrayD<Complex64>) -> ArrayD<Complex64> {
    match m {
        Some(m) => m.apply(y),
        None => y.clone(),
    }
}

fn early_result(
    x: ArrayD<Complex64>,
    scale: f64,
    residual: f64,
) -> LsmrResult {
    LsmrResult {
        x: x.mapv(|z| z * scale),
        iterations: 0,
        residual,
        normal_residual: 0.0,
        norm_a: 0.0,
        cond_a: 1.0,
        converged: true,
        reason: StopReason::Breakdown,
    }
}

// ──────────────────────── regularized solver ─────────────────────────

/// Solve `min_x ‖Ax − b‖² + λ‖x − x_r‖²`.
///
/// `b` is normalized by its norm on entry and the solution rescaled on exit;
/// a zero `‖b‖` falls back to unit scale so a pure-regularization solve
/// stays finite. Non-convergence within `config.max_its` is a normal
/// outcome: inspect [`LsmrResult::converged`] and the diagnostics.
pub fn lsmr(
    op: &dyn Operator,
    b: &ArrayD<Complex64>,
    mut opts: LsmrOptions<'_>,
    config: &LsmrConfig,
) -> ReconResult<LsmrResult> {
    let in_shape = op.input_shape().to_vec();
    let out_shape = op.output_shape().to_vec();
    check_shape(&out_shape, b)?;
    if let Some(x0) = opts.x0 {
        check_shape(&in_shape, x0)?;
    }
    if let Some(xr) = opts.xr {
        check_shape(&in_shape, xr)?;
    }

    let normb_raw = norm2(b);
    let scale = if normb_raw > 0.0 { normb_raw } else { 1.0 };
    let sl = opts.lambda.max(0.0).sqrt();

    let mut x: ArrayD<Complex64> = match opts.x0 {
        Some(x0) => x0.mapv(|z| z / scale),
        None => ArrayD::zeros(IxDyn(&in_shape)),
    };
    let mut mu: ArrayD<Complex64> = {
        let mut m = b.mapv(|z| z / scale);
        if opts.x0.is_some() {
            let ax = op.forward(&x)?;
            Zip::from(&mut m).and(&ax).for_each(|mi, &ai| *mi -= ai);
        }
        m
    };
    let mut u = apply_precond(opts.precond, &mu);
    let mut ur: ArrayD<Complex64> = match opts.xr {
        Some(xr) => {
            let mut r = xr.mapv(|z| z * (sl / scale));
            Zip::from(&mut r).and(&x).for_each(|ri, &xi| *ri -= xi * sl);
            r
        }
        None => x.mapv(|z| -z * sl),
    };

    let mut beta = (cdot(&mu, &u).re + cdot(&ur, &ur).re).sqrt();
    if beta > 0.0 {
        mu.mapv_inplace(|z| z / beta);
        u.mapv_inplace(|z| z / beta);
        ur.mapv_inplace(|z| z / beta);
    } else {
        // b − A·x0 and the regularization component both vanish: x0 is exact.
        log::info!("LSMR: initial residual is zero");
        return Ok(early_result(x, scale, 0.0));
    }

    let mut v = op.adjoint(&u)?;
    Zip::from(&mut v).and(&ur).for_each(|vi, &ri| *vi += ri * sl);
    let mut alpha = norm2(&v);
    if alpha > 0.0 {
        v.mapv_inplace(|z| z / alpha);
    } else {
        log::info!("LSMR: A'u vanished at initialization");
        return Ok(early_result(x, scale, beta * scale));
    }

    let mut h = v.clone();
    let mut hbar: ArrayD<Complex64> = ArrayD::zeros(IxDyn(&in_shape));

    // Transformation variables. There are a lot.
    let mut zetabar = alpha * beta;
    let mut alphabar = alpha;
    let mut rho = 1.0_f64;
    let mut rhobar = 1.0_f64;
    let mut cbar = 1.0_f64;
    let mut sbar = 0.0_f64;

    // Variables for the ‖r‖ recurrence
    let mut betadd = beta;
    let mut betad = 0.0_f64;
    let mut rhodold = 1.0_f64;
    let mut tautildeold = 0.0_f64;
    let mut thetatilde = 0.0_f64;
    let mut zeta = 0.0_f64;

    // Variables for the ‖A‖ and cond(A) estimates
    let mut norm_a2 = alpha * alpha;
    let mut max_rhobar = 0.0_f64;
    let mut min_rhobar = f64::MAX;
    let normb = beta;

    log::info!(
        "Starting regularized LSMR: scale {:.3e} lambda {:.3e} atol {:.1e} btol {:.1e} ctol {:.1e} initial residual {:.3e}",
        scale,
        opts.lambda,
        config.atol,
        config.btol,
        config.ctol,
        normb
    );

    let mut reason = StopReason::IterationLimit;
    let mut iterations = 0;
    let mut normr = beta;
    let mut normar = alpha * beta;
    let mut norm_a = alpha;
    let mut cond_a = 1.0;

    for ii in 0..config.max_its {
        iterations = ii + 1;

        // Bidiagonalization step; the damping term rides along in ur so the
        // joint norm keeps u orthonormal in the augmented space.
        let av = op.forward(&v)?;
        Zip::from(&mut mu)
            .and(&av)
            .for_each(|mi, &ai| *mi = ai - *mi * alpha);
        u = apply_precond(opts.precond, &mu);
        Zip::from(&mut ur)
            .and(&v)
            .for_each(|ri, &vi| *ri = vi * sl - *ri * alpha);
        beta = (cdot(&mu, &u).re + cdot(&ur, &ur).re).sqrt();
        if beta > 0.0 {
            mu.mapv_inplace(|z| z / beta);
            u.mapv_inplace(|z| z / beta);
            ur.mapv_inplace(|z| z / beta);
        }

        let atu = op.adjoint(&u)?;
        Zip::from(&mut v)
            .and(&atu)
            .and(&ur)
            .for_each(|vi, &ai, &ri| *vi = ai + ri * sl - *vi * beta);
        alpha = norm2(&v);
        if alpha > 0.0 {
            v.mapv_inplace(|z| z / alpha);
        }

        // Construct rotation
        let rhoold = rho;
        let (c, s, rho_next) = stable_givens(alphabar, beta);
        rho = rho_next;
        let thetanew = s * alpha;
        alphabar = c * alpha;

        // Plane rotation Q̄ᵢ turning Rᵢᵀ into R̄ᵢ
        let rhobarold = rhobar;
        let zetaold = zeta;
        let thetabar = sbar * rho;
        let rhotemp = cbar * rho;
        let (cbar_next, sbar_next, rhobar_next) = stable_givens(cbar * rho, thetanew);
        cbar = cbar_next;
        sbar = sbar_next;
        rhobar = rhobar_next;
        if rho == 0.0 || rhobar == 0.0 {
            log::debug!("LSMR {}: zero rotation pivot", ii);
            reason = StopReason::Breakdown;
            break;
        }
        zeta = cbar * zetabar;
        zetabar = -sbar * zetabar;

        // Update h, h̄, x
        let w_hbar = thetabar * rho / (rhoold * rhobarold);
        Zip::from(&mut hbar)
            .and(&h)
            .for_each(|hb, &hi| *hb = hi - *hb * w_hbar);
        let w_x = zeta / (rho * rhobar);
        Zip::from(&mut x)
            .and(&hbar)
            .for_each(|xi, &hb| *xi += hb * w_x);
        let w_h = thetanew / rho;
        Zip::from(&mut h)
            .and(&v)
            .for_each(|hi, &vi| *hi = vi - *hi * w_h);

        if let Some(hook) = opts.debug.as_mut() {
            hook(ii, &LsmrTrace { x: &x, u: &u, v: &v });
        }

        // Estimate ‖r‖: apply rotation P_{k-1} ...
        let betahat = c * betadd;
        betadd = -s * betadd;

        // ... then rotation Q̃_{k-1}
        let thetatildeold = thetatilde;
        let (ctildeold, stildeold, rhotildeold) = stable_givens(rhodold, thetabar);
        thetatilde = stildeold * rhobar;
        rhodold = ctildeold * rhobar;
        betad = -stildeold * betad + ctildeold * betahat;

        tautildeold = (zetaold - thetatildeold * tautildeold) / rhotildeold;
        let taud = (zeta - thetatilde * tautildeold) / rhodold;
        normr = ((betad - taud).powi(2) + betadd * betadd).sqrt();

        // Estimate ‖A‖
        norm_a2 += beta * beta;
        norm_a = norm_a2.sqrt();
        norm_a2 += alpha * alpha;

        // Estimate cond(A)
        max_rhobar = max_rhobar.max(rhobarold);
        if ii > 1 {
            min_rhobar = min_rhobar.min(rhobarold);
        }
        cond_a = max_rhobar.max(rhotemp) / min_rhobar.min(rhotemp);

        log::debug!(
            "LSMR {}: residual {:.3e} cond(A) {:.3e} alpha {:.3e} beta {:.3e}",
            ii,
            normr,
            cond_a,
            alpha,
            beta
        );

        // Convergence tests: pairs checking machine precision first, then
        // the user tolerance. The pair order decides which reason is
        // reported when several criteria trigger in the same iteration.
        normar = zetabar.abs();
        let normx = norm2(&x);

        if 1.0 + 1.0 / cond_a <= 1.0 {
            reason = StopReason::ConditionMachine;
            break;
        }
        if 1.0 / cond_a <= config.ctol {
            reason = StopReason::ConditionLimit;
            break;
        }

        if 1.0 + normar / (norm_a * normr) <= 1.0 {
            reason = StopReason::NormalMachine;
            break;
        }
        if normar / (norm_a * normr) <= config.atol {
            reason = StopReason::NormalTol;
            break;
        }

        if normr <= config.btol * normb + config.atol * norm_a * normx {
            reason = StopReason::ResidualTol;
            break;
        }
        if 1.0 + normr / (normb + norm_a * normx) <= 1.0 {
            reason = StopReason::ResidualMachine;
            break;
        }
    }

    let converged = reason != StopReason::IterationLimit;
    log::info!("LSMR stopped after {} iterations: {}", iterations, reason);

    Ok(LsmrResult {
        x: x.mapv(|z| z * scale),
        iterations,
        residual: normr * scale,
        normal_residual: normar * scale,
        norm_a,
        cond_a,
        converged,
        reason,
    })
}

// ─────────────────────── pure damping variant ────────────────────────

/// Solve `min_x ‖Ax − b‖² + λ‖x‖²` from a zero start.
///
/// Reduced form of the same state machine: the damping enters through an
/// extra plane rotation per iteration instead of the ghost residual
/// component, with the `d` accumulator folding the damped rows into the
/// residual estimate. With `λ = 0` this matches [`lsmr`] exactly.
pub fn lsmr_damp(
    op: &dyn Operator,
    b: &ArrayD<Complex64>,
    lambda: f64,
    precond: Option<&dyn Preconditioner>,
    config: &LsmrConfig,
) -> ReconResult<LsmrResult> {
    let in_shape = op.input_shape().to_vec();
    let out_shape = op.output_shape().to_vec();
    check_shape(&out_shape, b)?;

    let normb_raw = norm2(b);
    let scale = if normb_raw > 0.0 { normb_raw } else { 1.0 };

    let mut mu = b.mapv(|z| z / scale);
    let mut u = apply_precond(precond, &mu);
    let mut beta = cdot(&mu, &u).re.sqrt();
    if beta > 0.0 {
        mu.mapv_inplace(|z| z / beta);
        u.mapv_inplace(|z| z / beta);
    } else {
        log::info!("LSMR: b is zero, returning zero solution");
        return Ok(early_result(ArrayD::zeros(IxDyn(&in_shape)), scale, 0.0));
    }

    let mut v = op.adjoint(&u)?;
    let mut alpha = norm2(&v);
    if alpha > 0.0 {
        v.mapv_inplace(|z| z / alpha);
    } else {
        log::info!("LSMR: A'u vanished at initialization");
        return Ok(early_result(
            ArrayD::zeros(IxDyn(&in_shape)),
            scale,
            beta * scale,
        ));
    }

    let mut h = v.clone();
    let mut hbar: ArrayD<Complex64> = ArrayD::zeros(IxDyn(&in_shape));
    let mut x: ArrayD<Complex64> = ArrayD::zeros(IxDyn(&in_shape));

    let mut zetabar = alpha * beta;
    let mut alphabar = alpha;
    let mut rho = 1.0_f64;
    let mut rhobar = 1.0_f64;
    let mut cbar = 1.0_f64;
    let mut sbar = 0.0_f64;

    let mut betadd = beta;
    let mut betad = 0.0_f64;
    let mut rhodold = 1.0_f64;
    let mut tautildeold = 0.0_f64;
    let mut thetatilde = 0.0_f64;
    let mut zeta = 0.0_f64;
    let mut d = 0.0_f64;

    let mut norm_a2 = alpha * alpha;
    let mut max_rhobar = 0.0_f64;
    let mut min_rhobar = f64::MAX;
    let normb = beta;

    log::info!(
        "Starting LSMR: scale {:.3e} lambda {:.3e} atol {:.1e} btol {:.1e} ctol {:.1e} initial residual {:.3e}",
        scale,
        lambda,
        config.atol,
        config.btol,
        config.ctol,
        normb
    );

    let mut reason = StopReason::IterationLimit;
    let mut iterations = 0;
    let mut normr = beta;
    let mut normar = alpha * beta;
    let mut norm_a = alpha;
    let mut cond_a = 1.0;

    for ii in 0..config.max_its {
        iterations = ii + 1;

        // Bidiagonalization step
        let av = op.forward(&v)?;
        Zip::from(&mut mu)
            .and(&av)
            .for_each(|mi, &ai| *mi = ai - *mi * alpha);
        u = apply_precond(precond, &mu);
        beta = cdot(&mu, &u).re.sqrt();
        if beta > 0.0 {
            mu.mapv_inplace(|z| z / beta);
            u.mapv_inplace(|z| z / beta);
        }

        let atu = op.adjoint(&u)?;
        Zip::from(&mut v)
            .and(&atu)
            .for_each(|vi, &ai| *vi = ai - *vi * beta);
        alpha = norm2(&v);
        if alpha > 0.0 {
            v.mapv_inplace(|z| z / alpha);
        }

        // Fold the damping row in, then construct the main rotation
        let (chat, shat, alphahat) = stable_givens(alphabar, lambda);

        let rhoold = rho;
        let (c, s, rho_next) = stable_givens(alphahat, beta);
        rho = rho_next;
        let thetanew = s * alpha;
        alphabar = c * alpha;

        // Plane rotation Q̄ᵢ turning Rᵢᵀ into R̄ᵢ
        let rhobarold = rhobar;
        let zetaold = zeta;
        let thetabar = sbar * rho;
        let rhotemp = cbar * rho;
        let (cbar_next, sbar_next, rhobar_next) = stable_givens(cbar * rho, thetanew);
        cbar = cbar_next;
        sbar = sbar_next;
        rhobar = rhobar_next;
        if rho == 0.0 || rhobar == 0.0 {
            log::debug!("LSMR {}: zero rotation pivot", ii);
            reason = StopReason::Breakdown;
            break;
        }
        zeta = cbar * zetabar;
        zetabar = -sbar * zetabar;

        // Update h, h̄, x
        let w_hbar = thetabar * rho / (rhoold * rhobarold);
        Zip::from(&mut hbar)
            .and(&h)
            .for_each(|hb, &hi| *hb = hi - *hb * w_hbar);
        let w_x = zeta / (rho * rhobar);
        Zip::from(&mut x)
            .and(&hbar)
            .for_each(|xi, &hb| *xi += hb * w_x);
        let w_h = thetanew / rho;
        Zip::from(&mut h)
            .and(&v)
            .for_each(|hi, &vi| *hi = vi - *hi * w_h);

        // Estimate ‖r‖: apply the damping rotation P̂_{k-1} ...
        let betaacute = chat * betadd;
        let betacheck = -shat * betadd;

        // ... then rotation P_{k-1}
        let betahat = c * betaacute;
        betadd = -s * betaacute;

        // ... then rotation Q̃_{k-1}
        let thetatildeold = thetatilde;
        let (ctildeold, stildeold, rhotildeold) = stable_givens(rhodold, thetabar);
        thetatilde = stildeold * rhobar;
        rhodold = ctildeold * rhobar;
        betad = -stildeold * betad + ctildeold * betahat;

        tautildeold = (zetaold - thetatildeold * tautildeold) / rhotildeold;
        let taud = (zeta - thetatilde * tautildeold) / rhodold;
        d += betacheck * betacheck;
        normr = (d + (betad - taud).powi(2) + betadd * betadd).sqrt();

        // Estimate ‖A‖
        norm_a2 += beta * beta;
        norm_a = norm_a2.sqrt();
        norm_a2 += alpha * alpha;

        // Estimate cond(A)
        max_rhobar = max_rhobar.max(rhobarold);
        if ii > 1 {
            min_rhobar = min_rhobar.min(rhobarold);
        }
        cond_a = max_rhobar.max(rhotemp) / min_rhobar.min(rhotemp);

        log::debug!(
            "LSMR {}: residual {:.3e} cond(A) {:.3e} alpha {:.3e} beta {:.3e}",
            ii,
            normr,
            cond_a,
            alpha,
            beta
        );

        normar = zetabar.abs();
        let normx = norm2(&x);

        if 1.0 + 1.0 / cond_a <= 1.0 {
            reason = StopReason::ConditionMachine;
            break;
        }
        if 1.0 / cond_a <= config.ctol {
            reason = StopReason::ConditionLimit;
            break;
        }

        if 1.0 + normar / (norm_a * normr) <= 1.0 {
            reason = StopReason::NormalMachine;
            break;
        }
        if normar / (norm_a * normr) <= config.atol {
            reason = StopReason::NormalTol;
            break;
        }

        if normr <= config.btol * normb + config.atol * norm_a * normx {
            reason = StopReason::ResidualTol;
            break;
        }
        if 1.0 + normr / (normb + norm_a * normx) <= 1.0 {
            reason = StopReason::ResidualMachine;
            break;
        }
    }

    let converged = reason != StopReason::IterationLimit;
    log::info!("LSMR stopped after {} iterations: {}", iterations, reason);

    Ok(LsmrResult {
        x: x.mapv(|z| z * scale),
        iterations,
        residual: normr * scale,
        normal_residual: normar * scale,
        norm_a,
        cond_a,
        converged,
        reason,
    })
}

// ═══════════════════════════════ tests ═══════════════════════════════
