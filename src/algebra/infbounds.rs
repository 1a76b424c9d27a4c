use crate::algebra::atomic::{AtomicF64, Ordering};
use lazy_static::lazy_static;

/// Default magnitude above which a bound is treated as infinite.
const INFINITY_DEFAULT: f64 = 1e20;

lazy_static! {
    static ref INFINITY: AtomicF64 = AtomicF64::new(INFINITY_DEFAULT);
}

/// Revert the internal infinity threshold to its default value.
pub fn default_infinity() {
    INFINITY.store(INFINITY_DEFAULT, Ordering::Relaxed);
}
/// Set the internal infinity threshold to a new value.
///
/// Bound entries whose magnitude reaches this threshold are treated as
/// absent by the QP engine and its adapters.
pub fn set_infinity(v: f64) {
    INFINITY.store(v, Ordering::Relaxed);
}
/// Current value of the internal infinity threshold.
pub fn get_infinity() -> f64 {
    INFINITY.load(Ordering::Relaxed)
}
