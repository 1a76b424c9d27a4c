//! __Portico__ is a plugin-dispatch layer for interchangeable numerical
//! solvers: one typed facade per solver class, hiding heterogeneous and
//! stateful backends behind a uniform contract for registration, option
//! validation, per-instance state and error translation.
//!
//! Three solver classes are provided:
//!
//! * __Linear systems__ ([`linsol`]): bind a square sparsity pattern once,
//!   then factorize and solve against many right-hand sides, with
//!   transposed solves and Cholesky-factor access on capable backends.
//!   A dense LU backend and a sparse LDLᵀ backend with AMD ordering are
//!   built in; the `faer-sparse` feature adds a backend over the
//!   [faer](https://crates.io/crates/faer) sparse Cholesky.
//!
//! * __Quadratic programs__ ([`qpsol`]): minimize `½xᵀHx + gᵀx` under box
//!   bounds on the variables and on `Ax`.  The built-in backend adapts
//!   the in-tree [`splitqp`] engine and hot-starts it across
//!   evaluations.
//!
//! * __Nonlinear programs__ ([`nlpsol`]): the same surface one level up,
//!   fed by evaluation callbacks through an oracle trait.  No NLP backend
//!   is built in.
//!
//! Every backend enters through a [`plugin::PluginRecord`] carrying its
//! option schema, capability tags and a factory.  Lookup consults
//! explicit registrations first and falls back to the built-in manifest,
//! so test doubles and out-of-tree solvers can shadow or extend what
//! ships with the crate.

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod algebra;
pub mod error;
pub mod linsol;
pub mod nlpsol;
pub mod options;
pub mod plugin;
pub mod qpsol;
pub mod splitqp;
