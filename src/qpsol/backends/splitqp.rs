//! Bridge from the QP facade onto the in-tree splitting engine.

#![allow(clippy::too_many_arguments)]

use enum_dispatch::*;

use crate::algebra::{densify, get_infinity, AsFloatT, FloatT, VectorMath};
use crate::error::SolverError;
use crate::options::{OptionMap, OptionSchema, OptionType, ResolvedOptions};
use crate::plugin::{PluginRecord, PLUGIN_API_VERSION};
use crate::qpsol::{
    BoxedQpsolBackend, QpInputs, QpSolution, QpStructure, QpsolBackend, QpsolFactory,
    CAP_WARM_START,
};
use crate::splitqp::{
    BoundedQp, GeneralQp, Options, OptionsBuilder, PrintLevel, ReturnCode, SolveLimits,
};

pub(crate) fn record<T: FloatT>() -> PluginRecord<QpsolFactory<T>> {
    PluginRecord {
        name: "splitqp",
        doc: "Dense QP solving through the in-tree splitting engine, \
              with hot starts across evaluations.",
        api_version: PLUGIN_API_VERSION,
        caps: &[CAP_WARM_START],
        schema: schema(),
        factory: factory::<T>,
    }
}

fn factory<T: FloatT>(opts: &ResolvedOptions) -> Result<BoxedQpsolBackend<T>, SolverError> {
    Ok(Box::new(SplitqpInterface::<T>::from_options(opts)?))
}

fn print_level_token(level: PrintLevel) -> &'static str {
    match level {
        PrintLevel::None => "none",
        PrintLevel::Low => "low",
        PrintLevel::Medium => "medium",
        PrintLevel::High => "high",
    }
}

// Engine option defaults are queried from the engine itself so the
// declared schema cannot drift from the compiled-in values.
fn schema() -> OptionSchema {
    let defaults = Options::<f64>::default();
    OptionSchema::new("splitqp")
        .declare(
            "max_iter",
            OptionType::Int,
            None,
            "cap on working-set recalculations per call; defaults to 5*(nv + nc)",
        )
        .declare(
            "cpu_time",
            OptionType::Real,
            None,
            "wall-clock budget in seconds, strictly positive; unlimited when unset",
        )
        .declare(
            "inputs_check",
            OptionType::Bool,
            Some(true.into()),
            "reject NaN and crossing bounds before each solve",
        )
        .declare_enum(
            "print_level",
            Some(print_level_token(defaults.print_level)),
            "engine verbosity",
            &["none", "low", "medium", "high"],
        )
        .declare(
            "rho",
            OptionType::Real,
            Some(defaults.rho.into()),
            "splitting penalty applied to every constraint row",
        )
        .declare(
            "sigma",
            OptionType::Real,
            Some(defaults.sigma.into()),
            "regularization added to the quadratic term",
        )
        .declare(
            "alpha",
            OptionType::Real,
            Some(defaults.alpha.into()),
            "over-relaxation parameter, in (0, 2)",
        )
        .declare(
            "eps_abs",
            OptionType::Real,
            Some(defaults.eps_abs.into()),
            "absolute convergence tolerance",
        )
        .declare(
            "eps_rel",
            OptionType::Real,
            Some(defaults.eps_rel.into()),
            "relative convergence tolerance",
        )
        .declare(
            "check_interval",
            OptionType::Int,
            Some(i64::from(defaults.check_interval).into()),
            "sweeps between working-set and convergence checks",
        )
        .declare(
            "max_sweeps",
            OptionType::Int,
            Some(i64::from(defaults.max_sweeps).into()),
            "hard cap on splitting sweeps per call",
        )
        .declare(
            "polish",
            OptionType::Bool,
            Some(defaults.polish.into()),
            "refine a converged solution through an equality-constrained solve",
        )
}

/// Fixed translation from native return codes to messages.  Codes outside
/// the table produce a message carrying the numeric value.
fn status_message(code: i32) -> String {
    match code {
        0 => "converged to the requested tolerance".into(),
        1 => "working-set recalculation budget exhausted".into(),
        2 => "CPU time budget exhausted".into(),
        3 => "problem is infeasible".into(),
        4 => "problem is unbounded".into(),
        5 => "numerical breakdown in the engine".into(),
        6 => "problem data rejected by the engine".into(),
        7 => "hot start requested before a successful cold start".into(),
        _ => format!("unknown engine status code {code}"),
    }
}

fn checked_u32(name: &str, value: i64) -> Result<u32, SolverError> {
    u32::try_from(value).map_err(|_| {
        SolverError::Configuration(format!(
            "option '{name}' must be a nonnegative 32-bit integer, got {value}"
        ))
    })
}

/// Uniform view of the two engine variants.  The bound-only variant
/// ignores the row arguments.
#[enum_dispatch]
trait NativeQp<T>
where
    T: FloatT,
{
    fn cold_start(
        &mut self,
        h: &[T],
        g: &[T],
        a: &[T],
        lbx: &[T],
        ubx: &[T],
        lba: &[T],
        uba: &[T],
        limits: &SolveLimits,
    ) -> ReturnCode;

    fn hot_restart(
        &mut self,
        h: &[T],
        g: &[T],
        a: &[T],
        lbx: &[T],
        ubx: &[T],
        lba: &[T],
        uba: &[T],
        limits: &SolveLimits,
    ) -> ReturnCode;

    fn objective(&self) -> T;
    fn primal_into(&self, x: &mut [T]);
    fn dual_into(&self, lam: &mut [T]);
    fn working_set_recalcs(&self) -> u32;
}

impl<T> NativeQp<T> for BoundedQp<T>
where
    T: FloatT,
{
    fn cold_start(
        &mut self,
        h: &[T],
        g: &[T],
        _a: &[T],
        lbx: &[T],
        ubx: &[T],
        _lba: &[T],
        _uba: &[T],
        limits: &SolveLimits,
    ) -> ReturnCode {
        self.init(h, g, lbx, ubx, limits)
    }

    fn hot_restart(
        &mut self,
        h: &[T],
        g: &[T],
        _a: &[T],
        lbx: &[T],
        ubx: &[T],
        _lba: &[T],
        _uba: &[T],
        limits: &SolveLimits,
    ) -> ReturnCode {
        self.hot_start(h, g, lbx, ubx, limits)
    }

    fn objective(&self) -> T {
        self.objective()
    }
    fn primal_into(&self, x: &mut [T]) {
        self.primal_into(x);
    }
    fn dual_into(&self, lam: &mut [T]) {
        self.dual_into(lam);
    }
    fn working_set_recalcs(&self) -> u32 {
        self.working_set_recalcs()
    }
}

impl<T> NativeQp<T> for GeneralQp<T>
where
    T: FloatT,
{
    fn cold_start(
        &mut self,
        h: &[T],
        g: &[T],
        a: &[T],
        lbx: &[T],
        ubx: &[T],
        lba: &[T],
        uba: &[T],
        limits: &SolveLimits,
    ) -> ReturnCode {
        self.init(h, g, a, lbx, ubx, lba, uba, limits)
    }

    fn hot_restart(
        &mut self,
        h: &[T],
        g: &[T],
        a: &[T],
        lbx: &[T],
        ubx: &[T],
        lba: &[T],
        uba: &[T],
        limits: &SolveLimits,
    ) -> ReturnCode {
        self.hot_start(h, g, a, lbx, ubx, lba, uba, limits)
    }

    fn objective(&self) -> T {
        self.objective()
    }
    fn primal_into(&self, x: &mut [T]) {
        self.primal_into(x);
    }
    fn dual_into(&self, lam: &mut [T]) {
        self.dual_into(lam);
    }
    fn working_set_recalcs(&self) -> u32 {
        self.working_set_recalcs()
    }
}

#[enum_dispatch(NativeQp<T>)]
enum NativeProblem<T>
where
    T: FloatT,
{
    BoundedQp(BoundedQp<T>),
    GeneralQp(GeneralQp<T>),
}

struct EngineState<T: FloatT> {
    structure: QpStructure,
    limits: SolveLimits,
    prob: NativeProblem<T>,
    h_dense: Vec<T>,
    a_dense: Vec<T>,
    lbx: Vec<T>,
    ubx: Vec<T>,
    lba: Vec<T>,
    uba: Vec<T>,
}

fn fill_bound<T: FloatT>(dst: &mut [T], src: Option<&[T]>, absent: T) {
    match src {
        Some(v) => dst.copy_from_slice(v),
        None => {
            dst.set(absent);
        }
    }
}

fn check_bounds<T: FloatT>(what: &str, lb: &[T], ub: &[T]) -> Result<(), SolverError> {
    for (i, (&l, &u)) in lb.iter().zip(ub).enumerate() {
        if l.is_nan() || u.is_nan() {
            return Err(SolverError::Numeric(format!("{what} bound {i} is NaN")));
        }
        if l > u {
            return Err(SolverError::Numeric(format!(
                "{what} bounds cross at index {i}: lower {l} exceeds upper {u}"
            )));
        }
    }
    Ok(())
}

/// Native multipliers are positive at an active lower bound; the facade
/// convention is the opposite sign.
fn split_duals<T: FloatT>(mut duals: Vec<T>, nv: usize) -> (Vec<T>, Vec<T>) {
    duals.negate();
    let lam_a = duals.split_off(nv);
    (duals, lam_a)
}

/// [`QpsolBackend`] bridging onto the [`crate::splitqp`] engine.
///
/// One native engine object is owned per interface, sized at structural
/// initialization; whether it is the bound-only or the general variant is
/// decided there by the row count and never changes afterwards.  The
/// first successful evaluation cold-starts the engine and every later one
/// hot-starts it from the previous iterates.  A failed evaluation leaves
/// the interface usable; cold starts continue until one evaluation has
/// succeeded.
pub struct SplitqpInterface<T: FloatT = f64> {
    opts: Options<T>,
    max_iter: Option<u32>,
    cpu_time: Option<f64>,
    inputs_check: bool,
    state: Option<EngineState<T>>,
    solved_once: bool,
}

impl<T: FloatT> SplitqpInterface<T> {
    /// Construct directly against a structure, resolving `options`
    /// through the same schema the plugin registry serves.
    pub fn new(structure: &QpStructure, options: &OptionMap) -> Result<Self, SolverError> {
        let resolved = schema().resolve(options)?;
        let mut interface = Self::from_options(&resolved)?;
        QpsolBackend::init(&mut interface, structure)?;
        Ok(interface)
    }

    fn from_options(opts: &ResolvedOptions) -> Result<Self, SolverError> {
        let print_level: PrintLevel = opts
            .str("print_level")
            .parse()
            .map_err(SolverError::Configuration)?;

        let engine_opts = OptionsBuilder::default()
            .print_level(print_level)
            .rho(opts.real("rho").as_T())
            .sigma(opts.real("sigma").as_T())
            .alpha(opts.real("alpha").as_T())
            .eps_abs(opts.real("eps_abs").as_T())
            .eps_rel(opts.real("eps_rel").as_T())
            .check_interval(checked_u32("check_interval", opts.int("check_interval"))?)
            .max_sweeps(checked_u32("max_sweeps", opts.int("max_sweeps"))?)
            .polish(opts.bool("polish"))
            .build()
            .map_err(|e| SolverError::Configuration(e.to_string()))?;

        let max_iter = match opts.opt_int("max_iter") {
            Some(v) => Some(checked_u32("max_iter", v)?),
            None => None,
        };
        let cpu_time = opts.opt_real("cpu_time");
        if let Some(budget) = cpu_time {
            if budget <= 0.0 {
                return Err(SolverError::Configuration(format!(
                    "option 'cpu_time' must be strictly positive, got {budget}"
                )));
            }
        }

        Ok(Self {
            opts: engine_opts,
            max_iter,
            cpu_time,
            inputs_check: opts.bool("inputs_check"),
            state: None,
            solved_once: false,
        })
    }

    /// Whether evaluation routes through the bound-only engine variant.
    /// Decided by the row count at structural initialization; `false`
    /// before then.
    pub fn bound_only(&self) -> bool {
        matches!(
            self.state.as_ref().map(|s| &s.prob),
            Some(NativeProblem::BoundedQp(_))
        )
    }

    /// Working-set recalculations consumed by the latest evaluation.
    pub fn working_set_recalcs(&self) -> u32 {
        self.state
            .as_ref()
            .map_or(0, |s| s.prob.working_set_recalcs())
    }
}

impl<T: FloatT> QpsolBackend<T> for SplitqpInterface<T> {
    fn init(&mut self, structure: &QpStructure) -> Result<(), SolverError> {
        let nv = structure.nv();
        let nc = structure.nc();

        let default_budget = u32::try_from(5 * (nv + nc)).unwrap_or(u32::MAX);
        let limits = SolveLimits {
            max_recalcs: self.max_iter.unwrap_or(default_budget),
            cpu_time: self.cpu_time,
        };

        let prob = if nc == 0 {
            NativeProblem::BoundedQp(BoundedQp::new(nv, self.opts.clone()))
        } else {
            NativeProblem::GeneralQp(GeneralQp::new(nv, nc, self.opts.clone()))
        };

        self.state = Some(EngineState {
            structure: structure.clone(),
            limits,
            prob,
            h_dense: vec![T::zero(); nv * nv],
            a_dense: vec![T::zero(); nc * nv],
            lbx: vec![T::zero(); nv],
            ubx: vec![T::zero(); nv],
            lba: vec![T::zero(); nc],
            uba: vec![T::zero(); nc],
        });
        self.solved_once = false;
        Ok(())
    }

    fn eval(&mut self, inputs: &QpInputs<T>) -> Result<QpSolution<T>, SolverError> {
        let solved_once = self.solved_once;
        let inputs_check = self.inputs_check;
        let Some(state) = self.state.as_mut() else {
            return Err(SolverError::State(
                "eval called before structural initialization".into(),
            ));
        };
        let nv = state.structure.nv();
        let nc = state.structure.nc();

        // absent bounds fall back to the ambient infinity
        let inf: T = get_infinity().as_T();
        fill_bound(&mut state.lbx, inputs.lbx, -inf);
        fill_bound(&mut state.ubx, inputs.ubx, inf);
        fill_bound(&mut state.lba, inputs.lba, -inf);
        fill_bound(&mut state.uba, inputs.uba, inf);

        if inputs_check {
            check_bounds("variable", &state.lbx, &state.ubx)?;
            check_bounds("constraint", &state.lba, &state.uba)?;
        }

        densify(inputs.h, &state.structure.h, &mut state.h_dense, true);
        densify(inputs.a, &state.structure.a, &mut state.a_dense, false);

        let code = if solved_once {
            state.prob.hot_restart(
                &state.h_dense,
                inputs.g,
                &state.a_dense,
                &state.lbx,
                &state.ubx,
                &state.lba,
                &state.uba,
                &state.limits,
            )
        } else {
            state.prob.cold_start(
                &state.h_dense,
                inputs.g,
                &state.a_dense,
                &state.lbx,
                &state.ubx,
                &state.lba,
                &state.uba,
                &state.limits,
            )
        };

        if !code.is_acceptable() {
            return Err(SolverError::SolverFailure {
                backend: "splitqp",
                code: code.code(),
                message: status_message(code.code()),
            });
        }
        self.solved_once = true;

        let mut x = vec![T::zero(); nv];
        state.prob.primal_into(&mut x);
        let mut duals = vec![T::zero(); nv + nc];
        state.prob.dual_into(&mut duals);
        let (lam_x, lam_a) = split_duals(duals, nv);

        Ok(QpSolution {
            x,
            cost: state.prob.objective(),
            lam_x,
            lam_a,
        })
    }
}
