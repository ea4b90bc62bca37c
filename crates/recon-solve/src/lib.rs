//! Iterative solvers for regularized linear inverse problems.
//!
//! [`lsmr`] solves damped least-squares problems over an abstract operator;
//! [`admm`] wraps it in an alternating-direction outer loop with proximal
//! regularizers. Solver state lives on the stack of one call; operators are
//! shared, immutable and reentrant.

pub mod admm;
pub mod lsmr;
pub mod precond;
pub mod prox;

pub use admm::{admm, AdmmReg, AdmmResult};
pub use lsmr::{lsmr, lsmr_damp, stable_givens, LsmrOptions, LsmrResult, LsmrTrace, StopReason};
pub use precond::{DiagPrecond, Preconditioner};
pub use prox::{Entropy, Prox, SoftThreshold};
