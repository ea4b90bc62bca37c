// ─────────────────────────────────────────────────────────────────────
// SCPN Recon Core — Config
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Solver configuration surface.
//!
//! Every iteration cap and tolerance the solvers consume lives here, with
//! serde derives so a reconstruction job can be described by a JSON file.
//! The solvers never retry or adapt these values internally.

use serde::{Deserialize, Serialize};

/// Configuration for the LSMR least-squares solver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LsmrConfig {
    /// Maximum bidiagonalization iterations (default: 64).
    #[serde(default = "default_max_its")]
    pub max_its: usize,
    /// Tolerance on the relative normal-equation residual ‖A'r‖/(‖A‖‖r‖)
    /// (default: 1e-6).
    #[serde(default = "default_tol")]
    pub atol: f64,
    /// Tolerance on the residual relative to ‖b‖ (default: 1e-6).
    #[serde(default = "default_tol")]
    pub btol: f64,
    /// Reciprocal ceiling on the condition-number estimate; the solve stops
    /// once 1/cond(A) falls below this (default: 1e-6).
    #[serde(default = "default_tol")]
    pub ctol: f64,
}

fn default_max_its() -> usize {
    64
}
fn default_tol() -> f64 {
    1e-6
}

impl Default for LsmrConfig {
    fn default() -> Self {
        LsmrConfig {
            max_its: default_max_its(),
            atol: default_tol(),
            btol: default_tol(),
            ctol: default_tol(),
        }
    }
}

/// Configuration for the ADMM outer loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmmConfig {
    /// Maximum outer iterations (default: 20).
    #[serde(default = "default_outer_its")]
    pub outer_its: usize,
    /// Inner LSMR iteration budget for the first, cold-started x-update
    /// (default: 32).
    #[serde(default = "default_inner_its0")]
    pub inner_its0: usize,
    /// Inner LSMR iteration budget for warm-started x-updates (default: 8).
    #[serde(default = "default_inner_its1")]
    pub inner_its1: usize,
    /// Augmented-Lagrangian penalty ρ (default: 0.1).
    #[serde(default = "default_rho")]
    pub rho: f64,
    /// Absolute residual tolerance, scaled by √(problem size) (default: 1e-3).
    #[serde(default = "default_admm_tol")]
    pub abstol: f64,
    /// Relative residual tolerance (default: 1e-3).
    #[serde(default = "default_admm_tol")]
    pub reltol: f64,
    /// Tolerances for the inner LSMR solves. `inner.max_its` is superseded by
    /// `inner_its0`/`inner_its1` each outer iteration.
    #[serde(default)]
    pub inner: LsmrConfig,
}

fn default_outer_its() -> usize {
    20
}
fn default_inner_its0() -> usize {
    32
}
fn default_inner_its1() -> usize {
    8
}
fn default_rho() -> f64 {
    0.1
}
fn default_admm_tol() -> f64 {
    1e-3
}

impl Default for AdmmConfig {
    fn default() -> Self {
        AdmmConfig {
            outer_its: default_outer_its(),
            inner_its0: default_inner_its0(),
            inner_its1: default_inner_its1(),
            rho: default_rho(),
            abstol: default_admm_tol(),
            reltol: default_admm_tol(),
            inner: LsmrConfig::default(),
        }
    }
}

/// Top-level reconstruction job configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconConfig {
    #[serde(default)]
    pub lsmr: LsmrConfig,
    #[serde(default)]
    pub admm: AdmmConfig,
}

impl ReconConfig {
    /// Load from a JSON file. Missing fields fall back to defaults.
    pub fn from_file(path: &str) -> crate::error::ReconResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        Ok(config)
    }
}
