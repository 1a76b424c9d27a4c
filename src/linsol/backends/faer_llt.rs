//! Sparse LL' backend through the `faer` crate, compiled behind the
//! `faer-sparse` feature.
//!
//! The supernodal factorization runs in f64 internally; other scalar types
//! convert at the interface boundary.  Requires a structurally symmetric,
//! positive definite matrix.

use faer::linalg::solvers::Solve;
use faer::sparse::linalg::solvers::{Llt, SymbolicLlt};
use faer::sparse::{SparseColMat, Triplet};
use faer::Side;

use crate::algebra::{AsFloatT, FloatT, SparsityPattern};
use crate::error::SolverError;
use crate::linsol::backend::{BoxedLinsolBackend, LinsolBackend, LinsolFactory};
use crate::linsol::CAP_TRANSPOSE;
use crate::options::{OptionSchema, ResolvedOptions};
use crate::plugin::{PluginRecord, PLUGIN_API_VERSION};

struct FaerLltBackend {
    n: usize,
    pattern: SparsityPattern,
    factorization: Option<Llt<usize, f64>>,
}

pub(crate) fn record<T: FloatT>() -> PluginRecord<LinsolFactory<T>> {
    PluginRecord {
        name: "faer",
        doc: "Sparse LL' via faer; requires a symmetric positive definite matrix.",
        api_version: PLUGIN_API_VERSION,
        caps: &[CAP_TRANSPOSE],
        schema: OptionSchema::new("faer"),
        factory: factory::<T>,
    }
}

fn factory<T: FloatT>(
    pattern: &SparsityPattern,
    _opts: &ResolvedOptions,
) -> Result<BoxedLinsolBackend<T>, SolverError> {
    if !pattern.is_symmetric() {
        return Err(SolverError::Configuration(
            "faer backend requires a structurally symmetric matrix".into(),
        ));
    }
    Ok(Box::new(FaerLltBackend {
        n: pattern.nrows,
        pattern: pattern.clone(),
        factorization: None,
    }))
}

impl FaerLltBackend {
    fn triplets<T: FloatT>(&self, values: &[T]) -> Vec<Triplet<usize, usize, f64>> {
        let mut triplets = Vec::with_capacity(values.len());
        for c in 0..self.pattern.ncols {
            for idx in self.pattern.colptr[c]..self.pattern.colptr[c + 1] {
                triplets.push(Triplet {
                    row: self.pattern.rowval[idx],
                    col: c,
                    val: values[idx].to_f64().unwrap(),
                });
            }
        }
        triplets
    }
}

impl<T: FloatT> LinsolBackend<T> for FaerLltBackend {
    fn factorize(&mut self, values: &[T]) -> Result<(), SolverError> {
        self.factorization = None;
        if self.n == 0 {
            return Ok(());
        }

        let triplets = self.triplets(values);
        let csc = SparseColMat::try_new_from_triplets(self.n, self.n, &triplets)
            .map_err(|e| SolverError::Configuration(format!("faer matrix assembly failed: {e:?}")))?;

        let symbolic = SymbolicLlt::try_new(csc.symbolic().as_ref(), Side::Upper)
            .map_err(|e| SolverError::Numeric(format!("faer symbolic analysis failed: {e:?}")))?;
        let llt = Llt::try_new_with_symbolic(symbolic, csc.as_ref(), Side::Upper).map_err(|e| {
            SolverError::Numeric(format!("faer cholesky factorization failed: {e:?}"))
        })?;

        self.factorization = Some(llt);
        Ok(())
    }

    // transpose is accepted but has no effect: the matrix is symmetric
    fn solve(&mut self, x: &mut [T], nrhs: usize, _transpose: bool) -> Result<(), SolverError> {
        let Some(llt) = &self.factorization else {
            return Err(SolverError::State(
                "solve called before a successful factorize".into(),
            ));
        };
        let n = self.n;
        if n == 0 {
            return Ok(());
        }

        let rhs = faer::Mat::from_fn(n, nrhs, |i, j| x[j * n + i].to_f64().unwrap());
        let sol = llt.solve(&rhs);
        for j in 0..nrhs {
            for i in 0..n {
                x[j * n + i] = sol[(i, j)].as_T();
            }
        }
        Ok(())
    }
}
