//! Numeric foundations shared by the solver facades and backends: scalar
//! traits, slice math, sparsity patterns and the sparse/dense bridge.

mod atomic;
mod dense;
mod densify;
mod floats;
mod infbounds;
mod sparsity;
mod vecmath;

pub use dense::*;
pub use densify::*;
pub use floats::*;
pub use infbounds::*;
pub use sparsity::*;
pub use vecmath::*;
