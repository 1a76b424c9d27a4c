//! Builtin linear solver backends.

pub(crate) mod denselu;
pub(crate) mod sldl;

cfg_if::cfg_if! {
    if #[cfg(feature = "faer-sparse")] {
        pub(crate) mod faer_llt;
    }
}
