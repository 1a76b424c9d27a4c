//! Quadratic programming facade with interchangeable backends.
//!
//! Solves problems of the form
//!
//! ```text
//! minimize   ½ xᵀHx + gᵀx
//! subject to lbx ≤  x ≤ ubx
//!            lba ≤ Ax ≤ uba
//! ```
//!
//! A [`Qpsol`] instance is bound at construction to a backend plugin and a
//! [`QpStructure`] fixing the Hessian and constraint patterns; every
//! subsequent [`Qpsol::eval`] reuses that signature with fresh numeric
//! data.  Backends advertising [`CAP_WARM_START`] carry their internal
//! state across evaluations.

pub(crate) mod backends;

use lazy_static::lazy_static;

use crate::algebra::{FloatT, SparsityPattern};
use crate::error::SolverError;
use crate::options::{OptionMap, ResolvedOptions};
use crate::plugin::{PluginRecord, PluginRegistry};

pub use backends::splitqp::SplitqpInterface;

/// Capability tag of backends that reuse solver state across evaluations.
pub const CAP_WARM_START: &str = "warm_start";

/// Input slots of a QP evaluation, in documented order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QpIn {
    H,
    G,
    A,
    Lbx,
    Ubx,
    Lba,
    Uba,
}

impl QpIn {
    pub fn name(self) -> &'static str {
        match self {
            QpIn::H => "h",
            QpIn::G => "g",
            QpIn::A => "a",
            QpIn::Lbx => "lbx",
            QpIn::Ubx => "ubx",
            QpIn::Lba => "lba",
            QpIn::Uba => "uba",
        }
    }

    pub fn all() -> [QpIn; 7] {
        [
            QpIn::H,
            QpIn::G,
            QpIn::A,
            QpIn::Lbx,
            QpIn::Ubx,
            QpIn::Lba,
            QpIn::Uba,
        ]
    }
}

/// Output slots of a QP evaluation, in documented order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QpOut {
    X,
    Cost,
    LamX,
    LamA,
}

impl QpOut {
    pub fn name(self) -> &'static str {
        match self {
            QpOut::X => "x",
            QpOut::Cost => "cost",
            QpOut::LamX => "lam_x",
            QpOut::LamA => "lam_a",
        }
    }

    pub fn all() -> [QpOut; 4] {
        [QpOut::X, QpOut::Cost, QpOut::LamX, QpOut::LamA]
    }
}

/// Structural signature of a QP.  The Hessian pattern fixes the variable
/// count and the constraint pattern fixes the row count; both are
/// immutable for the lifetime of a solver bound to them.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QpStructure {
    /// Hessian pattern, `nv × nv`.  Only entries present here are read
    /// from the value stream at evaluation time.
    pub h: SparsityPattern,
    /// constraint matrix pattern, `nc × nv`
    pub a: SparsityPattern,
    /// Legacy gradient pattern slot.  Never consulted; present so older
    /// callers constructing the full record keep compiling.
    pub g: Option<SparsityPattern>,
}

impl QpStructure {
    pub fn new(h: SparsityPattern, a: SparsityPattern) -> Self {
        Self { h, a, g: None }
    }

    /// Signature of a bound-constrained problem with no general rows.
    pub fn bound_only(h: SparsityPattern) -> Self {
        let nv = h.ncols;
        let a = SparsityPattern {
            nrows: 0,
            ncols: nv,
            colptr: vec![0; nv + 1],
            rowval: Vec::new(),
        };
        Self { h, a, g: None }
    }

    /// number of decision variables
    pub fn nv(&self) -> usize {
        self.h.ncols
    }

    /// number of general constraint rows
    pub fn nc(&self) -> usize {
        self.a.nrows
    }
}

/// Numeric inputs of one evaluation.  Matrix values follow the order of
/// the corresponding structure pattern; an absent bound slice means
/// unbounded on that side.
#[derive(Debug, Clone, Copy)]
pub struct QpInputs<'a, T = f64> {
    /// Hessian values, one per entry of the structure's `h` pattern
    pub h: &'a [T],
    /// linear cost term, length `nv`
    pub g: &'a [T],
    /// constraint values, one per entry of the structure's `a` pattern
    pub a: &'a [T],
    pub lbx: Option<&'a [T]>,
    pub ubx: Option<&'a [T]>,
    pub lba: Option<&'a [T]>,
    pub uba: Option<&'a [T]>,
}

/// Solution of a QP evaluation.
///
/// Multipliers follow the sign convention of the facade: negative where a
/// lower bound is active, positive where an upper bound is active.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QpSolution<T = f64> {
    /// primal point, length `nv`
    pub x: Vec<T>,
    /// objective value at `x`
    pub cost: T,
    /// multipliers of the variable bounds, length `nv`
    pub lam_x: Vec<T>,
    /// multipliers of the constraint rows, length `nc`
    pub lam_a: Vec<T>,
}

/// Interface implemented by QP backends.
///
/// Both methods carry refusing default bodies so that a backend can be
/// registered for documentation and capability queries before its solve
/// path exists; concrete backends override both.
pub trait QpsolBackend<T: FloatT> {
    /// Size the backend against a structural signature.  Called exactly
    /// once, by the facade constructor.
    fn init(&mut self, structure: &QpStructure) -> Result<(), SolverError> {
        let _ = structure;
        Err(SolverError::UnsupportedOperation(
            "structural initialization is not implemented by this QP backend".into(),
        ))
    }

    /// Solve one problem instance against the structure given to `init`.
    fn eval(&mut self, inputs: &QpInputs<T>) -> Result<QpSolution<T>, SolverError> {
        let _ = inputs;
        Err(SolverError::UnsupportedOperation(
            "evaluation is not implemented by this QP backend".into(),
        ))
    }
}

pub type BoxedQpsolBackend<T> = Box<dyn QpsolBackend<T> + Send>;

/// Constructor signature registered by each QP plugin.  Structural data
/// arrives afterwards through [`QpsolBackend::init`].
pub type QpsolFactory<T> = fn(&ResolvedOptions) -> Result<BoxedQpsolBackend<T>, SolverError>;

pub type QpsolRegistry<T> = PluginRegistry<QpsolFactory<T>>;

type RecordFn<T> = fn() -> PluginRecord<QpsolFactory<T>>;

fn builtins<T: FloatT>() -> Vec<(&'static str, RecordFn<T>)> {
    vec![("splitqp", backends::splitqp::record::<T>)]
}

/// A fresh registry holding the built-in QP backends.
pub fn registry<T: FloatT>() -> QpsolRegistry<T> {
    QpsolRegistry::with_manifest("qpsol", builtins())
}

lazy_static! {
    static ref GLOBAL: QpsolRegistry<f64> = registry();
}

/// The process-wide registry consulted by [`Qpsol::new`].
pub fn global_registry() -> &'static QpsolRegistry<f64> {
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

/// A QP solver bound to one backend plugin and one structural signature.
///
/// # Example
/// ```
/// use portico::algebra::SparsityPattern;
/// use portico::options::OptionMap;
/// use portico::qpsol::{QpInputs, QpStructure, Qpsol};
///
/// // minimize ½xᵀHx + gᵀx over the unit box; the optimum sits at the origin
/// let structure = QpStructure::bound_only(SparsityPattern::dense(2, 2));
/// let mut solver = Qpsol::new("box", "splitqp", structure, &OptionMap::new()).unwrap();
/// let solution = solver
///     .eval(&QpInputs {
///         h: &[4.0, 1.0, 1.0, 2.0],
///         g: &[1.0, 1.0],
///         a: &[],
///         lbx: Some(&[0.0, 0.0]),
///         ubx: Some(&[1.0, 1.0]),
///         lba: None,
///         uba: None,
///     })
///     .unwrap();
/// assert!(solution.x.iter().all(|&v| v.abs() < 1e-6));
/// ```
pub struct Qpsol<T = f64> {
    instance: String,
    plugin: &'static str,
    structure: QpStructure,
    backend: BoxedQpsolBackend<T>,
}

impl Qpsol<f64> {
    /// Create a solver through the process-wide registry.
    pub fn new(
        instance: &str,
        plugin: &str,
        structure: QpStructure,
        options: &OptionMap,
    ) -> Result<Self, SolverError> {
        Self::with_registry(global_registry(), instance, plugin, structure, options)
    }
}

impl<T: FloatT> Qpsol<T> {
    /// Create a solver through an explicit registry.
    pub fn with_registry(
        registry: &QpsolRegistry<T>,
        instance: &str,
        plugin: &str,
        structure: QpStructure,
        options: &OptionMap,
    ) -> Result<Self, SolverError> {
        let record = registry.record(plugin)?;
        let resolved = record.schema.resolve(options)?;

        structure.h.check_format()?;
        structure.a.check_format()?;
        if !structure.h.is_square() {
            return Err(SolverError::Configuration(format!(
                "Hessian pattern must be square, got {}x{}",
                structure.h.nrows, structure.h.ncols
            )));
        }
        if structure.a.ncols != structure.h.ncols {
            return Err(SolverError::Configuration(format!(
                "constraint pattern has {} columns for {} variables",
                structure.a.ncols,
                structure.h.ncols
            )));
        }

        let mut backend = (record.factory)(&resolved)?;
        backend.init(&structure)?;

        Ok(Self {
            instance: instance.to_owned(),
            plugin: record.name,
            structure,
            backend,
        })
    }

    pub fn instance_name(&self) -> &str {
        &self.instance
    }

    pub fn plugin_name(&self) -> &'static str {
        self.plugin
    }

    pub fn structure(&self) -> &QpStructure {
        &self.structure
    }

    pub fn nv(&self) -> usize {
        self.structure.nv()
    }

    pub fn nc(&self) -> usize {
        self.structure.nc()
    }

    /// Solve one instance.  Input lengths are checked against the bound
    /// structure before the backend runs.
    pub fn eval(&mut self, inputs: &QpInputs<T>) -> Result<QpSolution<T>, SolverError> {
        let nv = self.structure.nv();
        let nc = self.structure.nc();

        expect_len("hessian value stream", inputs.h.len(), self.structure.h.nnz())?;
        expect_len("gradient", inputs.g.len(), nv)?;
        expect_len(
            "constraint value stream",
            inputs.a.len(),
            self.structure.a.nnz(),
        )?;
        if let Some(lbx) = inputs.lbx {
            expect_len("lower variable bound", lbx.len(), nv)?;
        }
        if let Some(ubx) = inputs.ubx {
            expect_len("upper variable bound", ubx.len(), nv)?;
        }
        if let Some(lba) = inputs.lba {
            expect_len("lower constraint bound", lba.len(), nc)?;
        }
        if let Some(uba) = inputs.uba {
            expect_len("upper constraint bound", uba.len(), nc)?;
        }

        self.backend.eval(inputs)
    }
}
