//! Linear solver facade with interchangeable backends.
//!
//! A [`Linsol`] is bound at construction to one backend (chosen by plugin
//! name through a [`LinsolRegistry`]) and one sparsity pattern, then cycles
//! through `factorize`/`solve` rounds with numeric values only.  Structural
//! validation happens here once, never in the backends: the pattern must be
//! square with no empty row or column.
//!
//! Backends advertise optional capabilities.  Transposed solves and the
//! Cholesky surface (`cholesky_sparsity`, `cholesky_factor`,
//! `solve_cholesky`, `cholesky_ordering`) fail with
//! [`SolverError::UnsupportedOperation`] on backends without them.

pub mod backend;
pub(crate) mod backends;

pub use backend::{
    BoxedLinsolBackend, CholeskyCapable, LinsolBackend, LinsolFactory, LinsolRegistry,
};

use lazy_static::lazy_static;

use crate::algebra::{FloatT, SparsityPattern};
use crate::error::SolverError;
use crate::options::OptionMap;
use crate::plugin::PluginRecord;

/// Capability tag of backends exposing a Cholesky factor.
pub const CAP_CHOLESKY: &str = "cholesky";
/// Capability tag of backends supporting transposed solves.
pub const CAP_TRANSPOSE: &str = "transpose";

/// Input slots of the combined solve call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinsolIn {
    /// matrix values
    A,
    /// right-hand side
    B,
}

/// Output slots of the combined solve call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinsolOut {
    /// solution
    X,
}

impl LinsolIn {
    pub fn name(self) -> &'static str {
        match self {
            LinsolIn::A => "a",
            LinsolIn::B => "b",
        }
    }
}

impl LinsolOut {
    pub fn name(self) -> &'static str {
        match self {
            LinsolOut::X => "x",
        }
    }
}

type RecordFn<T> = fn() -> PluginRecord<LinsolFactory<T>>;

fn builtins<T: FloatT>() -> Vec<(&'static str, RecordFn<T>)> {
    let mut list: Vec<(&'static str, RecordFn<T>)> = vec![
        ("denselu", backends::denselu::record::<T>),
        ("sldl", backends::sldl::record::<T>),
    ];
    #[cfg(feature = "faer-sparse")]
    list.push(("faer", backends::faer_llt::record::<T>));
    list
}

/// Fresh registry seeded with the builtin manifest, for callers managing
/// their own plugin namespace (tests, embedded setups).
pub fn registry<T: FloatT>() -> LinsolRegistry<T> {
    LinsolRegistry::with_manifest("linsol", builtins())
}

lazy_static! {
    static ref GLOBAL: LinsolRegistry<f64> = registry();
}

/// The process-wide registry consulted by [`Linsol::new`].
pub fn global_registry() -> &'static LinsolRegistry<f64> {
    &GLOBAL
}

fn unsupported(what: &str, plugin: &str) -> SolverError {
    SolverError::UnsupportedOperation(format!(
        "{what} is not supported by linear solver plugin \"{plugin}\""
    ))
}

/// One bound linear solver instance.
///
/// # Example
/// ```
/// use portico::algebra::SparsityPattern;
/// use portico::linsol::Linsol;
/// use portico::options::OptionMap;
///
/// let sp = SparsityPattern::identity(2);
/// let mut solver = Linsol::new("diag", "denselu", sp, &OptionMap::new()).unwrap();
/// let x = solver.eval(&[2.0, 4.0], &[2.0, 8.0], false).unwrap();
/// assert_eq!(x, vec![1.0, 2.0]);
/// ```
pub struct Linsol<T = f64> {
    instance: String,
    plugin: &'static str,
    pattern: SparsityPattern,
    transposable: bool,
    backend: BoxedLinsolBackend<T>,
    factorized: bool,
}

impl Linsol<f64> {
    /// Construct an instance through the process-wide registry.
    pub fn new(
        instance: &str,
        plugin: &str,
        pattern: SparsityPattern,
        options: &OptionMap,
    ) -> Result<Self, SolverError> {
        Self::with_registry(global_registry(), instance, plugin, pattern, options)
    }
}

impl<T: FloatT> Linsol<T> {
    /// Construct an instance through an explicit registry.
    pub fn with_registry(
        registry: &LinsolRegistry<T>,
        instance: &str,
        plugin: &str,
        pattern: SparsityPattern,
        options: &OptionMap,
    ) -> Result<Self, SolverError> {
        let record = registry.record(plugin)?;
        let resolved = record.schema.resolve(options)?;

        pattern.check_format()?;
        if !pattern.is_square() {
            return Err(SolverError::Configuration(format!(
                "linear solve requires a square matrix, got {}x{}",
                pattern.nrows, pattern.ncols
            )));
        }
        if let Some(c) = pattern.first_empty_column() {
            return Err(SolverError::Configuration(format!(
                "matrix is structurally singular: column {c} has no entries"
            )));
        }
        if let Some(r) = pattern.first_empty_row() {
            return Err(SolverError::Configuration(format!(
                "matrix is structurally singular: row {r} has no entries"
            )));
        }

        let backend = (record.factory)(&pattern, &resolved)?;
        Ok(Self {
            instance: instance.to_owned(),
            plugin: record.name,
            pattern,
            transposable: record.has_cap(CAP_TRANSPOSE),
            backend,
            factorized: false,
        })
    }

    /// Caller-supplied label for this instance.
    pub fn instance_name(&self) -> &str {
        &self.instance
    }

    /// Name of the backend chosen at construction.
    pub fn plugin_name(&self) -> &'static str {
        self.plugin
    }

    /// The pattern this instance is bound to.
    pub fn sparsity(&self) -> &SparsityPattern {
        &self.pattern
    }

    /// Compute a numeric factorization from the matrix values, ordered to
    /// match the bound pattern.
    pub fn factorize(&mut self, values: &[T]) -> Result<(), SolverError> {
        if values.len() != self.pattern.nnz() {
            return Err(SolverError::Configuration(format!(
                "expected {} matrix values, got {}",
                self.pattern.nnz(),
                values.len()
            )));
        }
        self.factorized = false;
        self.backend.factorize(values)?;
        self.factorized = true;
        Ok(())
    }

    /// Solve A X = B (or A' X = B) in place against the current
    /// factorization.  `x` holds `nrhs` consecutive length-n columns.
    pub fn solve_in_place(
        &mut self,
        x: &mut [T],
        nrhs: usize,
        transpose: bool,
    ) -> Result<(), SolverError> {
        if !self.factorized {
            return Err(SolverError::State(
                "solve called before a successful factorize".into(),
            ));
        }
        if transpose && !self.transposable {
            return Err(unsupported("transposed solve", self.plugin));
        }
        let n = self.pattern.nrows;
        if x.len() != n * nrhs {
            return Err(SolverError::Configuration(format!(
                "right-hand side holds {} values, expected {} for {nrhs} columns of length {n}",
                x.len(),
                n * nrhs
            )));
        }
        self.backend.solve(x, nrhs, transpose)
    }

    /// Factorize-and-solve in one call.
    ///
    /// Every call refactorizes from `a_values`.  When one matrix serves many
    /// right-hand sides this is strictly more expensive than a single
    /// [`Linsol::factorize`] followed by repeated
    /// [`Linsol::solve_in_place`] calls.
    pub fn eval(&mut self, a_values: &[T], b: &[T], transpose: bool) -> Result<Vec<T>, SolverError> {
        let n = self.pattern.nrows;
        if n != 0 && b.len() % n != 0 {
            return Err(SolverError::Configuration(format!(
                "right-hand side of length {} is not a whole number of columns of length {n}",
                b.len()
            )));
        }
        let nrhs = if n == 0 { 0 } else { b.len() / n };
        self.factorize(a_values)?;
        let mut x = b.to_vec();
        self.solve_in_place(&mut x, nrhs, transpose)?;
        Ok(x)
    }

    /// Record a solve against a right-hand side of pattern `b` without
    /// evaluating anything.
    pub fn solve_deferred(
        &self,
        b: &SparsityPattern,
        transpose: bool,
    ) -> Result<DeferredSolve, SolverError> {
        if b.nrows != self.pattern.nrows {
            return Err(SolverError::Configuration(format!(
                "right-hand side has {} rows, expected {}",
                b.nrows, self.pattern.nrows
            )));
        }
        Ok(DeferredSolve {
            n: b.nrows,
            nrhs: b.ncols,
            transpose,
        })
    }

    /// Pattern of the backend's Cholesky factor, available from
    /// construction on.
    pub fn cholesky_sparsity(&mut self, transpose: bool) -> Result<SparsityPattern, SolverError> {
        let plugin = self.plugin;
        match self.backend.cholesky() {
            Some(chol) => Ok(chol.cholesky_sparsity(transpose)),
            None => Err(unsupported("cholesky_sparsity", plugin)),
        }
    }

    /// Pattern and values of the backend's current Cholesky factor.
    pub fn cholesky_factor(
        &mut self,
        transpose: bool,
    ) -> Result<(SparsityPattern, Vec<T>), SolverError> {
        if !self.factorized {
            return Err(SolverError::State(
                "cholesky factor requested before a successful factorize".into(),
            ));
        }
        let plugin = self.plugin;
        match self.backend.cholesky() {
            Some(chol) => chol.cholesky_factor(transpose),
            None => Err(unsupported("cholesky_factor", plugin)),
        }
    }

    /// Solve L X = B (or L' X = B) against the Cholesky factor, in the
    /// factor's own coordinates.
    pub fn solve_cholesky(
        &mut self,
        x: &mut [T],
        nrhs: usize,
        transpose: bool,
    ) -> Result<(), SolverError> {
        if !self.factorized {
            return Err(SolverError::State(
                "cholesky solve requested before a successful factorize".into(),
            ));
        }
        let n = self.pattern.nrows;
        if x.len() != n * nrhs {
            return Err(SolverError::Configuration(format!(
                "right-hand side holds {} values, expected {} for {nrhs} columns of length {n}",
                x.len(),
                n * nrhs
            )));
        }
        let plugin = self.plugin;
        match self.backend.cholesky() {
            Some(chol) => chol.solve_cholesky(x, nrhs, transpose),
            None => Err(unsupported("solve_cholesky", plugin)),
        }
    }

    /// Fill-reducing permutation used by the backend's Cholesky factor.
    pub fn cholesky_ordering(&mut self) -> Result<Vec<usize>, SolverError> {
        let plugin = self.plugin;
        match self.backend.cholesky() {
            Some(chol) => Ok(chol.ordering().to_vec()),
            None => Err(unsupported("cholesky_ordering", plugin)),
        }
    }
}

/// A recorded solve whose numeric inputs arrive later.
///
/// Stands in for embedding the call in an expression graph: the shape is
/// validated and fixed when the solve is recorded, numbers flow only at
/// [`DeferredSolve::eval`] time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferredSolve {
    n: usize,
    nrhs: usize,
    transpose: bool,
}

impl DeferredSolve {
    /// Shape of the solution, matching the recorded right-hand side.
    pub fn shape(&self) -> (usize, usize) {
        (self.n, self.nrhs)
    }

    pub fn is_transposed(&self) -> bool {
        self.transpose
    }

    /// Run the recorded solve: factorize from `a_values`, then solve for
    /// `b`, which must hold the recorded number of columns.
    pub fn eval<T: FloatT>(
        &self,
        solver: &mut Linsol<T>,
        a_values: &[T],
        b: &[T],
    ) -> Result<Vec<T>, SolverError> {
        if solver.pattern.nrows != self.n {
            return Err(SolverError::Configuration(format!(
                "deferred solve was recorded for systems of size {}, solver is bound to size {}",
                self.n, solver.pattern.nrows
            )));
        }
        solver.factorize(a_values)?;
        let mut x = b.to_vec();
        solver.solve_in_place(&mut x, self.nrhs, self.transpose)?;
        Ok(x)
    }
}
