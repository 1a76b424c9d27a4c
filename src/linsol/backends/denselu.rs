use crate::algebra::{densify, DenseLU, FloatT, SparsityPattern};
use crate::error::SolverError;
use crate::linsol::backend::{BoxedLinsolBackend, LinsolFactory};
use crate::linsol::CAP_TRANSPOSE;
use crate::options::{OptionSchema, ResolvedOptions};
use crate::plugin::{PluginRecord, PLUGIN_API_VERSION};

/// Reference backend: scatter into a dense row-major buffer and run the
/// in-tree LU kernel.  No structural requirements beyond what the facade
/// already enforces, which makes it the fallback for patterns the sparse
/// backends refuse.
struct DenseLuBackend<T = f64> {
    n: usize,
    pattern: SparsityPattern,
    dense: Vec<T>,
    factors: Option<DenseLU<T>>,
}

pub(crate) fn record<T: FloatT>() -> PluginRecord<LinsolFactory<T>> {
    PluginRecord {
        name: "denselu",
        doc: "Dense LU with partial pivoting; works on any square pattern.",
        api_version: PLUGIN_API_VERSION,
        caps: &[CAP_TRANSPOSE],
        schema: OptionSchema::new("denselu"),
        factory: factory::<T>,
    }
}

fn factory<T: FloatT>(
    pattern: &SparsityPattern,
    _opts: &ResolvedOptions,
) -> Result<BoxedLinsolBackend<T>, SolverError> {
    let n = pattern.nrows;
    Ok(Box::new(DenseLuBackend {
        n,
        pattern: pattern.clone(),
        dense: vec![T::zero(); n * n],
        factors: None,
    }))
}

impl<T: FloatT> crate::linsol::backend::LinsolBackend<T> for DenseLuBackend<T> {
    fn factorize(&mut self, values: &[T]) -> Result<(), SolverError> {
        densify(values, &self.pattern, &mut self.dense, false);
        self.factors = Some(DenseLU::factor(&self.dense, self.n)?);
        Ok(())
    }

    fn solve(&mut self, x: &mut [T], nrhs: usize, transpose: bool) -> Result<(), SolverError> {
        let Some(factors) = &self.factors else {
            return Err(SolverError::State(
                "solve called before a successful factorize".into(),
            ));
        };
        factors.solve(x, nrhs, transpose);
        Ok(())
    }
}
