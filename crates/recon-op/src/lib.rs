//! Linear operators over fixed-shape complex arrays.
//!
//! The solver core never sees gridding, coil maps or trajectories; it sees
//! opaque linear maps with declared input/output shapes and an adjoint.
//! This crate defines that contract ([`Operator`]), the combinators that
//! build larger maps out of smaller ones, and two concrete operators
//! (centered zero-padding and a frequency-domain diagonal kernel) that the
//! solvers and tests exercise.

pub mod algebra;
pub mod freq;
pub mod operator;
pub mod pad;

pub use algebra::{DStack, DiagRep, DiagScale, Multiply, VStack};
pub use freq::FreqDiag;
pub use operator::{cdot, check_shape, norm2, num_elements, Identity, Operator};
pub use pad::ZeroPad;
