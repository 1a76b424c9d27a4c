use crate::algebra::{FloatT, SparsityPattern};
use crate::error::SolverError;
use crate::options::ResolvedOptions;
use crate::plugin::PluginRegistry;

/// Numeric interface implemented by every linear solver backend.
///
/// A backend is created by its factory against a fixed sparsity pattern and
/// a resolved option set; structural analysis happens there.  Afterwards the
/// facade drives it through repeated `factorize`/`solve` rounds, always with
/// values laid out in the order of the bound pattern's `rowval`.
///
/// Right-hand sides are stored as `nrhs` consecutive length-n columns.
pub trait LinsolBackend<T: FloatT> {
    /// Compute a numeric factorization from the nonzero values of A.
    fn factorize(&mut self, values: &[T]) -> Result<(), SolverError>;

    /// Solve A X = B (or A' X = B) in place against the current
    /// factorization.  The facade guarantees a successful `factorize`
    /// happened first and that `x.len() == n * nrhs`.
    fn solve(&mut self, x: &mut [T], nrhs: usize, transpose: bool) -> Result<(), SolverError>;

    /// Downcast hook for backends that can expose a Cholesky factor.
    /// The default backend has no such capability.
    fn cholesky(&mut self) -> Option<&mut dyn CholeskyCapable<T>> {
        None
    }
}

/// Extra surface for backends whose factorization is (or contains) a
/// Cholesky factor L with A = L L'.
///
/// Backends that reorder the matrix report the factor in permuted
/// coordinates; `ordering` recovers the permutation, with `ordering()[k]`
/// giving the original index that ends up in position k.
pub trait CholeskyCapable<T: FloatT> {
    /// Pattern of L (or L' with `transpose` set).  Available from
    /// construction on; independent of numeric values.
    fn cholesky_sparsity(&self, transpose: bool) -> SparsityPattern;

    /// Pattern and values of the current factor.  Requires a successful
    /// `factorize`; fails with a numeric error when the factored matrix
    /// turned out not to be positive definite.
    fn cholesky_factor(&mut self, transpose: bool)
        -> Result<(SparsityPattern, Vec<T>), SolverError>;

    /// Solve L X = B (or L' X = B) in place, in the factor's own
    /// coordinates.
    fn solve_cholesky(&mut self, x: &mut [T], nrhs: usize, transpose: bool)
        -> Result<(), SolverError>;

    /// Fill-reducing permutation applied by the backend.
    fn ordering(&self) -> &[usize];
}

/// Backends travel as boxed trait objects so facades can hold any plugin
/// behind one field and still move between threads.
pub type BoxedLinsolBackend<T> = Box<dyn LinsolBackend<T> + Send>;

/// Factory signature stored in linear solver plugin records.
pub type LinsolFactory<T> =
    fn(&SparsityPattern, &ResolvedOptions) -> Result<BoxedLinsolBackend<T>, SolverError>;

/// Registry specialization for the linear solver class.
pub type LinsolRegistry<T> = PluginRegistry<LinsolFactory<T>>;
