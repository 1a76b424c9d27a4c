//! Standalone dense QP engine built on an operator-splitting iteration
//! with working-set accounting.
//!
//! The engine minimizes `½xᵀHx + gᵀx` subject to box bounds on `x` and,
//! for the general variant, box bounds on `Ax`.  It keeps its iterates and
//! factorization alive between calls so that a sequence of related
//! problems can be hot-started, and it reports termination through plain
//! numeric return codes in the manner of a wrapped native library.  The
//! facade layer in [`crate::qpsol`] owns the translation of those codes
//! into errors.

mod splitqp;
pub use splitqp::*;
