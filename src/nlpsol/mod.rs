//! Nonlinear programming facade.
//!
//! Solves problems of the form
//!
//! ```text
//! minimize   f(x)
//! subject to lbx ≤  x   ≤ ubx
//!            lbg ≤ g(x) ≤ ubg
//! ```
//!
//! The surface mirrors [`crate::qpsol`] one level up: problems arrive as
//! an [`NlpOracle`] supplying evaluation callbacks instead of matrices.
//! No NLP backend ships with the crate; the builtin manifest is empty and
//! solvers arrive through [`PluginRegistry::register`].

use lazy_static::lazy_static;

use crate::algebra::{FloatT, SparsityPattern};
use crate::error::SolverError;
use crate::options::{OptionMap, ResolvedOptions};
use crate::plugin::{PluginRecord, PluginRegistry};

/// Input slots of an NLP solve, in documented order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NlpIn {
    X0,
    Lbx,
    Ubx,
    Lbg,
    Ubg,
}

impl NlpIn {
    pub fn name(self) -> &'static str {
        match self {
            NlpIn::X0 => "x0",
            NlpIn::Lbx => "lbx",
            NlpIn::Ubx => "ubx",
            NlpIn::Lbg => "lbg",
            NlpIn::Ubg => "ubg",
        }
    }

    pub fn all() -> [NlpIn; 5] {
        [NlpIn::X0, NlpIn::Lbx, NlpIn::Ubx, NlpIn::Lbg, NlpIn::Ubg]
    }
}

/// Output slots of an NLP solve, in documented order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NlpOut {
    X,
    F,
    LamX,
    LamG,
}

impl NlpOut {
    pub fn name(self) -> &'static str {
        match self {
            NlpOut::X => "x",
            NlpOut::F => "f",
            NlpOut::LamX => "lam_x",
            NlpOut::LamG => "lam_g",
        }
    }

    pub fn all() -> [NlpOut; 4] {
        [NlpOut::X, NlpOut::F, NlpOut::LamX, NlpOut::LamG]
    }
}

/// Callback bundle describing one NLP instance.
///
/// A backend queries dimensions and the constraint Jacobian pattern once,
/// then calls the four evaluation callbacks as often as its iteration
/// needs.  Evaluations may fail, a point outside the domain say, and
/// report through [`SolverError`].
pub trait NlpOracle<T: FloatT>: Send {
    /// number of decision variables
    fn nx(&self) -> usize;

    /// number of constraint rows
    fn ng(&self) -> usize;

    /// pattern of the constraint Jacobian, `ng × nx`
    fn jacobian_sparsity(&self) -> SparsityPattern;

    /// objective value at `x`
    fn objective(&self, x: &[T]) -> Result<T, SolverError>;

    /// objective gradient at `x`, written into `grad` (length `nx`)
    fn gradient(&self, x: &[T], grad: &mut [T]) -> Result<(), SolverError>;

    /// constraint values at `x`, written into `g` (length `ng`)
    fn constraints(&self, x: &[T], g: &mut [T]) -> Result<(), SolverError>;

    /// Jacobian values at `x`, in the order of [`Self::jacobian_sparsity`]
    fn jacobian(&self, x: &[T], values: &mut [T]) -> Result<(), SolverError>;
}

/// Numeric inputs of one solve.  Absent bounds mean unbounded; an absent
/// initial guess means the origin.
#[derive(Debug, Clone, Copy)]
pub struct NlpInputs<'a, T = f64> {
    pub x0: Option<&'a [T]>,
    pub lbx: Option<&'a [T]>,
    pub ubx: Option<&'a [T]>,
    pub lbg: Option<&'a [T]>,
    pub ubg: Option<&'a [T]>,
}

impl<T> Default for NlpInputs<'_, T> {
    fn default() -> Self {
        Self {
            x0: None,
            lbx: None,
            ubx: None,
            lbg: None,
            ubg: None,
        }
    }
}

/// Solution of an NLP solve, with multipliers following the same sign
/// convention as the QP facade.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NlpSolution<T = f64> {
    /// primal point, length `nx`
    pub x: Vec<T>,
    /// objective value at `x`
    pub f: T,
    /// multipliers of the variable bounds, length `nx`
    pub lam_x: Vec<T>,
    /// multipliers of the constraint rows, length `ng`
    pub lam_g: Vec<T>,
}

/// Interface implemented by NLP backends.  Both methods carry refusing
/// default bodies, as in the QP base.
pub trait NlpsolBackend<T: FloatT> {
    /// Size the backend against an oracle.  Called exactly once, by the
    /// facade constructor.
    fn init(&mut self, oracle: &dyn NlpOracle<T>) -> Result<(), SolverError> {
        let _ = oracle;
        Err(SolverError::UnsupportedOperation(
            "structural initialization is not implemented by this NLP backend".into(),
        ))
    }

    /// Run one solve against the oracle given to `init`.
    fn solve(
        &mut self,
        oracle: &dyn NlpOracle<T>,
        inputs: &NlpInputs<T>,
    ) -> Result<NlpSolution<T>, SolverError> {
        let _ = (oracle, inputs);
        Err(SolverError::UnsupportedOperation(
            "solving is not implemented by this NLP backend".into(),
        ))
    }
}

pub type BoxedNlpsolBackend<T> = Box<dyn NlpsolBackend<T> + Send>;

pub type NlpsolFactory<T> = fn(&ResolvedOptions) -> Result<BoxedNlpsolBackend<T>, SolverError>;

pub type NlpsolRegistry<T> = PluginRegistry<NlpsolFactory<T>>;

type RecordFn<T> = fn() -> PluginRecord<NlpsolFactory<T>>;

fn builtins<T: FloatT>() -> Vec<(&'static str, RecordFn<T>)> {
    // no interior-point backend ships with the crate
    Vec::new()
}

/// A fresh registry for NLP backends.  Empty until callers register one.
pub fn registry<T: FloatT>() -> NlpsolRegistry<T> {
    NlpsolRegistry::with_manifest("nlpsol", builtins())
}

lazy_static! {
    static ref GLOBAL: NlpsolRegistry<f64> = registry();
}

/// The process-wide registry consulted by [`Nlpsol::new`].
pub fn global_registry() -> &'static NlpsolRegistry<f64> {
    &GLOBAL
}

fn expect_len(what: &str, got: usize, want: usize) -> Result<(), SolverError> {
    if got == want {
        Ok(())
    } else {
        Err(SolverError::Configuration(format!(
            "{what} holds {got} values, expected {want}"
        )))
    }
}

/// An NLP solver bound to one backend plugin and one oracle.
pub struct Nlpsol<T = f64> {
    instance: String,
    plugin: &'static str,
    oracle: Box<dyn NlpOracle<T>>,
    backend: BoxedNlpsolBackend<T>,
}

impl Nlpsol<f64> {
    /// Create a solver through the process-wide registry.
    pub fn new(
        instance: &str,
        plugin: &str,
        oracle: Box<dyn NlpOracle<f64>>,
        options: &OptionMap,
    ) -> Result<Self, SolverError> {
        Self::with_registry(global_registry(), instance, plugin, oracle, options)
    }
}

impl<T: FloatT> Nlpsol<T> {
    /// Create a solver through an explicit registry.
    pub fn with_registry(
        registry: &NlpsolRegistry<T>,
        instance: &str,
        plugin: &str,
        oracle: Box<dyn NlpOracle<T>>,
        options: &OptionMap,
    ) -> Result<Self, SolverError> {
        let record = registry.record(plugin)?;
        let resolved = record.schema.resolve(options)?;

        let jac = oracle.jacobian_sparsity();
        jac.check_format()?;
        if jac.shape() != (oracle.ng(), oracle.nx()) {
            return Err(SolverError::Configuration(format!(
                "constraint Jacobian pattern is {}x{}, expected {}x{}",
                jac.nrows,
                jac.ncols,
                oracle.ng(),
                oracle.nx()
            )));
        }

        let mut backend = (record.factory)(&resolved)?;
        backend.init(oracle.as_ref())?;

        Ok(Self {
            instance: instance.to_owned(),
            plugin: record.name,
            oracle,
            backend,
        })
    }

    pub fn instance_name(&self) -> &str {
        &self.instance
    }

    pub fn plugin_name(&self) -> &'static str {
        self.plugin
    }

    pub fn nx(&self) -> usize {
        self.oracle.nx()
    }

    pub fn ng(&self) -> usize {
        self.oracle.ng()
    }

    /// Run one solve.  Input lengths are checked against the oracle's
    /// dimensions before the backend runs.
    pub fn solve(&mut self, inputs: &NlpInputs<T>) -> Result<NlpSolution<T>, SolverError> {
        let nx = self.oracle.nx();
        let ng = self.oracle.ng();

        if let Some(x0) = inputs.x0 {
            expect_len("initial guess", x0.len(), nx)?;
        }
        if let Some(lbx) = inputs.lbx {
            expect_len("lower variable bound", lbx.len(), nx)?;
        }
        if let Some(ubx) = inputs.ubx {
            expect_len("upper variable bound", ubx.len(), nx)?;
        }
        if let Some(lbg) = inputs.lbg {
            expect_len("lower constraint bound", lbg.len(), ng)?;
        }
        if let Some(ubg) = inputs.ubg {
            expect_len("upper constraint bound", ubg.len(), ng)?;
        }

        self.backend.solve(self.oracle.as_ref(), inputs)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::options::OptionSchema;
    use crate::plugin::PLUGIN_API_VERSION;

    struct QuadraticOracle {
        nx: usize,
    }

    impl NlpOracle<f64> for QuadraticOracle {
        fn nx(&self) -> usize {
            self.nx
        }
        fn ng(&self) -> usize {
            0
        }
        fn jacobian_sparsity(&self) -> SparsityPattern {
            SparsityPattern::new(0, self.nx, vec![0; self.nx + 1], vec![]).unwrap()
        }
        fn objective(&self, x: &[f64]) -> Result<f64, SolverError> {
            Ok(x.iter().map(|&v| 0.5 * v * v).sum())
        }
        fn gradient(&self, x: &[f64], grad: &mut [f64]) -> Result<(), SolverError> {
            grad.copy_from_slice(x);
            Ok(())
        }
        fn constraints(&self, _x: &[f64], _g: &mut [f64]) -> Result<(), SolverError> {
            Ok(())
        }
        fn jacobian(&self, _x: &[f64], _values: &mut [f64]) -> Result<(), SolverError> {
            Ok(())
        }
    }

    // projects the initial guess into the box and reports the objective
    // there; enough backend to exercise the facade plumbing
    #[derive(Default)]
    struct ClampSolver;

    impl NlpsolBackend<f64> for ClampSolver {
        fn init(&mut self, _oracle: &dyn NlpOracle<f64>) -> Result<(), SolverError> {
            Ok(())
        }

        fn solve(
            &mut self,
            oracle: &dyn NlpOracle<f64>,
            inputs: &NlpInputs<f64>,
        ) -> Result<NlpSolution<f64>, SolverError> {
            let nx = oracle.nx();
            let mut x = vec![0.0; nx];
            if let Some(x0) = inputs.x0 {
                x.copy_from_slice(x0);
            }
            if let Some(lbx) = inputs.lbx {
                for (xi, &l) in x.iter_mut().zip(lbx) {
                    *xi = xi.max(l);
                }
            }
            if let Some(ubx) = inputs.ubx {
                for (xi, &u) in x.iter_mut().zip(ubx) {
                    *xi = xi.min(u);
                }
            }
            let f = oracle.objective(&x)?;
            Ok(NlpSolution {
                x,
                f,
                lam_x: vec![0.0; nx],
                lam_g: vec![0.0; oracle.ng()],
            })
        }
    }

    fn clamp_factory(_opts: &ResolvedOptions) -> Result<BoxedNlpsolBackend<f64>, SolverError> {
        Ok(Box::new(ClampSolver))
    }

    fn clamp_record() -> PluginRecord<NlpsolFactory<f64>> {
        PluginRecord {
            name: "clamp",
            doc: "projects the initial guess into the variable box",
            api_version: PLUGIN_API_VERSION,
            caps: &[],
            schema: OptionSchema::new("clamp"),
            factory: clamp_factory,
        }
    }

    struct SolveOnly;

    impl NlpsolBackend<f64> for SolveOnly {
        fn solve(
            &mut self,
            oracle: &dyn NlpOracle<f64>,
            _inputs: &NlpInputs<f64>,
        ) -> Result<NlpSolution<f64>, SolverError> {
            Ok(NlpSolution {
                x: vec![0.0; oracle.nx()],
                f: 0.0,
                lam_x: vec![0.0; oracle.nx()],
                lam_g: vec![0.0; oracle.ng()],
            })
        }
    }

    fn solve_only_factory(_opts: &ResolvedOptions) -> Result<BoxedNlpsolBackend<f64>, SolverError> {
        Ok(Box::new(SolveOnly))
    }

    #[test]
    fn slot_names_in_order() {
        let names: Vec<_> = NlpIn::all().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["x0", "lbx", "ubx", "lbg", "ubg"]);
        let names: Vec<_> = NlpOut::all().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["x", "f", "lam_x", "lam_g"]);
    }

    #[test]
    fn no_backend_ships_builtin() {
        let reg = registry::<f64>();
        assert!(reg.names().is_empty());
        let err = reg.record("ipopt").err().unwrap();
        match err {
            SolverError::PluginNotFound(name) => assert_eq!(name, "ipopt"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn registered_double_solves_through_the_facade() {
        let reg = registry::<f64>();
        reg.register(clamp_record()).unwrap();

        let oracle = Box::new(QuadraticOracle { nx: 2 });
        let mut solver = Nlpsol::with_registry(&reg, "demo", "clamp", oracle, &OptionMap::new())
            .unwrap();
        assert_eq!(solver.plugin_name(), "clamp");
        assert_eq!((solver.nx(), solver.ng()), (2, 0));

        let sol = solver
            .solve(&NlpInputs {
                x0: Some(&[2.0, -3.0]),
                lbx: Some(&[0.0, 0.0]),
                ubx: Some(&[1.0, 1.0]),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(sol.x, vec![1.0, 0.0]);
        assert!((sol.f - 0.5).abs() < 1e-14);
    }

    #[test]
    fn partial_backend_is_rejected_at_construction() {
        let reg = registry::<f64>();
        let mut record = clamp_record();
        record.name = "solve-only";
        record.factory = solve_only_factory;
        reg.register(record).unwrap();

        let oracle = Box::new(QuadraticOracle { nx: 1 });
        let err = Nlpsol::with_registry(&reg, "demo", "solve-only", oracle, &OptionMap::new())
            .err()
            .unwrap();
        assert!(matches!(err, SolverError::UnsupportedOperation(_)));
    }

    #[test]
    fn solve_checks_input_lengths() {
        let reg = registry::<f64>();
        reg.register(clamp_record()).unwrap();

        let oracle = Box::new(QuadraticOracle { nx: 2 });
        let mut solver = Nlpsol::with_registry(&reg, "demo", "clamp", oracle, &OptionMap::new())
            .unwrap();
        let err = solver
            .solve(&NlpInputs {
                x0: Some(&[1.0]),
                ..Default::default()
            })
            .err()
            .unwrap();
        assert!(matches!(err, SolverError::Configuration(_)));
    }
}
