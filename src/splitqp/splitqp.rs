#![allow(non_snake_case)]
use crate::algebra::*;
use derive_builder::Builder;
use itertools::izip;
use std::time::Instant;

// penalty scaling applied to rows whose bounds coincide
const EQUALITY_RHO_SCALE: f64 = 1e3;
// regularization used in the refinement KKT system
const POLISH_REG: f64 = 1e-12;
// tolerance for the normalized infeasibility certificates
const CERT_TOL: f64 = 1e-6;

/// Progress reporting level.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PrintLevel {
    /// No output.
    None,
    /// Banner and a one-line termination summary.
    Low,
    /// Residual progress at every convergence check.
    Medium,
    /// Working-set changes and refinement outcomes as well.
    High,
}

impl Default for PrintLevel {
    fn default() -> Self {
        PrintLevel::None
    }
}

impl std::str::FromStr for PrintLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "none" => Ok(PrintLevel::None),
            "low" => Ok(PrintLevel::Low),
            "medium" => Ok(PrintLevel::Medium),
            "high" => Ok(PrintLevel::High),
            _ => Err(format!("unrecognized print level \"{s}\"")),
        }
    }
}

/// Status of the engine at termination of an `init` or `hot_start` call.

#[repr(i32)]
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum ReturnCode {
    /// Converged to the requested tolerance.
    Success = 0,
    /// Working-set recalculation or sweep budget exhausted.  The iterates
    /// are the best found so far and remain usable.
    IterationLimit = 1,
    /// Wall-clock budget exhausted.
    TimeLimit = 2,
    /// The constraints admit no feasible point.
    Infeasible = 3,
    /// The objective is unbounded below on the feasible set.
    Unbounded = 4,
    /// Factorization failure or non-finite iterates.
    NumericalIssue = 5,
    /// Problem data rejected before iterating.
    InvalidArguments = 6,
    /// `hot_start` was called before a successful `init`.
    NotInitialized = 7,
}

impl ReturnCode {
    /// The raw numeric code.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Whether the call produced usable iterates.
    pub fn is_acceptable(self) -> bool {
        matches!(self, ReturnCode::Success | ReturnCode::IterationLimit)
    }
}

impl std::fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Engine settings, fixed for the lifetime of a problem instance.

#[derive(Builder, Debug, Clone)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct Options<T: FloatT> {
    /// progress reporting level
    #[builder(default)]
    pub print_level: PrintLevel,

    /// splitting penalty applied to every constraint row
    #[builder(default = "(0.1).as_T()")]
    pub rho: T,

    /// regularization added to the quadratic term
    #[builder(default = "(1e-6).as_T()")]
    pub sigma: T,

    /// over-relaxation parameter, in (0, 2)
    #[builder(default = "(1.6).as_T()")]
    pub alpha: T,

    /// absolute convergence tolerance
    #[builder(default = "(1e-9).as_T()")]
    pub eps_abs: T,

    /// relative convergence tolerance
    #[builder(default = "(1e-9).as_T()")]
    pub eps_rel: T,

    /// sweeps between working-set and convergence checks
    #[builder(default = "25")]
    pub check_interval: u32,

    /// hard cap on splitting sweeps per call
    #[builder(default = "50_000")]
    pub max_sweeps: u32,

    /// refine a converged solution through an equality-constrained solve
    #[builder(default = "true")]
    pub polish: bool,
}

impl<T> Default for Options<T>
where
    T: FloatT,
{
    fn default() -> Options<T> {
        OptionsBuilder::<T>::default().build().unwrap()
    }
}

impl<T> OptionsBuilder<T>
where
    T: FloatT,
{
    fn validate(&self) -> Result<(), String> {
        if let Some(rho) = self.rho {
            if !(rho > T::zero()) {
                return Err("rho must be positive".into());
            }
        }
        if let Some(sigma) = self.sigma {
            if !(sigma > T::zero()) {
                return Err("sigma must be positive".into());
            }
        }
        if let Some(alpha) = self.alpha {
            if !(alpha > T::zero() && alpha < (2.0).as_T()) {
                return Err("alpha must lie in (0, 2)".into());
            }
        }
        if let Some(eps) = self.eps_abs {
            if !(eps >= T::zero()) {
                return Err("eps_abs must be nonnegative".into());
            }
        }
        if let Some(eps) = self.eps_rel {
            if !(eps >= T::zero()) {
                return Err("eps_rel must be nonnegative".into());
            }
        }
        if self.check_interval == Some(0) {
            return Err("check_interval must be at least 1".into());
        }
        if self.max_sweeps == Some(0) {
            return Err("max_sweeps must be at least 1".into());
        }
        Ok(())
    }
}

/// Per-call budgets, supplied with every `init` or `hot_start`.
#[derive(Debug, Clone, Copy)]
pub struct SolveLimits {
    /// maximum number of working-set recalculations before giving up
    pub max_recalcs: u32,
    /// wall-clock budget in seconds; unlimited when absent
    pub cpu_time: Option<f64>,
}

impl Default for SolveLimits {
    fn default() -> Self {
        Self {
            max_recalcs: u32::MAX,
            cpu_time: None,
        }
    }
}

fn clamp<T: FloatT>(v: T, lo: T, hi: T) -> T {
    v.max(lo).min(hi)
}

/// QP with bounds on the variables only.
///
/// A thin wrapper over the shared splitting core with the constraint
/// block fixed to the identity.
pub struct BoundedQp<T: FloatT = f64> {
    core: Admm<T>,
}

impl<T> BoundedQp<T>
where
    T: FloatT,
{
    pub fn new(nv: usize, opts: Options<T>) -> Self {
        Self {
            core: Admm::new(nv, 0, opts),
        }
    }

    /// Cold-start solve.  `H` is `nv × nv` row-major and only needs to be
    /// positive semidefinite; bound entries at or beyond the magnitude of
    /// [`get_infinity`] are treated as absent.
    pub fn init(&mut self, H: &[T], g: &[T], lb: &[T], ub: &[T], limits: &SolveLimits) -> ReturnCode {
        self.core.init(H, g, &[], lb, ub, &[], &[], limits)
    }

    /// Re-solve reusing the previous iterates and working set.  The
    /// factorization is refreshed only when `H` changed.
    pub fn hot_start(
        &mut self,
        H: &[T],
        g: &[T],
        lb: &[T],
        ub: &[T],
        limits: &SolveLimits,
    ) -> ReturnCode {
        self.core.hot_start(H, g, &[], lb, ub, &[], &[], limits)
    }

    pub fn nv(&self) -> usize {
        self.core.nv
    }
    pub fn status(&self) -> ReturnCode {
        self.core.status
    }
    pub fn objective(&self) -> T {
        self.core.objective()
    }
    pub fn primal_into(&self, x: &mut [T]) {
        self.core.primal_into(x)
    }
    /// Bound multipliers, positive where a lower bound is active.
    pub fn dual_into(&self, lam: &mut [T]) {
        self.core.dual_into(lam)
    }
    /// Working-set recalculations consumed by the most recent call.
    pub fn working_set_recalcs(&self) -> u32 {
        self.core.recalcs
    }
}

/// QP with bounds on the variables and on `Ax`.
pub struct GeneralQp<T: FloatT = f64> {
    core: Admm<T>,
}

impl<T> GeneralQp<T>
where
    T: FloatT,
{
    pub fn new(nv: usize, nc: usize, opts: Options<T>) -> Self {
        Self {
            core: Admm::new(nv, nc, opts),
        }
    }

    /// Cold-start solve.  `A` is `nc × nv` row-major.
    #[allow(clippy::too_many_arguments)]
    pub fn init(
        &mut self,
        H: &[T],
        g: &[T],
        A: &[T],
        lbx: &[T],
        ubx: &[T],
        lba: &[T],
        uba: &[T],
        limits: &SolveLimits,
    ) -> ReturnCode {
        self.core.init(H, g, A, lbx, ubx, lba, uba, limits)
    }

    /// Re-solve reusing the previous iterates and working set.  The
    /// factorization is refreshed only when `H` or `A` changed.
    #[allow(clippy::too_many_arguments)]
    pub fn hot_start(
        &mut self,
        H: &[T],
        g: &[T],
        A: &[T],
        lbx: &[T],
        ubx: &[T],
        lba: &[T],
        uba: &[T],
        limits: &SolveLimits,
    ) -> ReturnCode {
        self.core.hot_start(H, g, A, lbx, ubx, lba, uba, limits)
    }

    pub fn nv(&self) -> usize {
        self.core.nv
    }
    pub fn nc(&self) -> usize {
        self.core.nc
    }
    pub fn status(&self) -> ReturnCode {
        self.core.status
    }
    pub fn objective(&self) -> T {
        self.core.objective()
    }
    pub fn primal_into(&self, x: &mut [T]) {
        self.core.primal_into(x)
    }
    /// Stacked multipliers for the variable bounds followed by the row
    /// bounds, positive where a lower bound is active.
    pub fn dual_into(&self, lam: &mut [T]) {
        self.core.dual_into(lam)
    }
    /// Working-set recalculations consumed by the most recent call.
    pub fn working_set_recalcs(&self) -> u32 {
        self.core.recalcs
    }
}

// ---------------------------------
// shared splitting core
// ---------------------------------

// Solves min ½xᵀHx + gᵀx  s.t.  lb ≤ Cx ≤ ub with C = [I; A] using the
// relaxed splitting iteration
//
//   x̃  = (H + σI + CᵀΡC)⁻¹ (σx − g + Cᵀ(Ρz − y))
//   ẑ  = α Cx̃ + (1−α) z
//   z⁺ = Π[lb,ub](ẑ + Ρ⁻¹y)
//   y⁺ = y + Ρ(ẑ − z⁺)
//   x⁺ = α x̃ + (1−α) x
//
// where Ρ = diag(rho) with a stiffer penalty on rows whose bounds
// coincide.  The working set is read off the projection at fixed check
// intervals; each observed change consumes one unit of the caller's
// recalculation budget.
struct Admm<T: FloatT = f64> {
    nv: usize,
    nc: usize,
    opts: Options<T>,
    // problem data, dense row-major copies
    H: Vec<T>,
    g: Vec<T>,
    A: Vec<T>,
    lb: Vec<T>,
    ub: Vec<T>,
    rho: Vec<T>,
    kkt: Option<DenseCholesky<T>>,
    initialized: bool,
    // iterates, preserved across calls for hot starting
    x: Vec<T>,
    z: Vec<T>,
    y: Vec<T>,
    active: Vec<i8>,
    recalcs: u32,
    status: ReturnCode,
}

impl<T> Admm<T>
where
    T: FloatT,
{
    fn new(nv: usize, nc: usize, opts: Options<T>) -> Self {
        let m = nv + nc;
        Self {
            nv,
            nc,
            opts,
            H: vec![T::zero(); nv * nv],
            g: vec![T::zero(); nv],
            A: vec![T::zero(); nc * nv],
            lb: vec![T::zero(); m],
            ub: vec![T::zero(); m],
            rho: vec![T::zero(); m],
            kkt: None,
            initialized: false,
            x: vec![T::zero(); nv],
            z: vec![T::zero(); m],
            y: vec![T::zero(); m],
            active: vec![0; m],
            recalcs: 0,
            status: ReturnCode::NotInitialized,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn init(
        &mut self,
        H: &[T],
        g: &[T],
        A: &[T],
        lbx: &[T],
        ubx: &[T],
        lba: &[T],
        uba: &[T],
        limits: &SolveLimits,
    ) -> ReturnCode {
        self.recalcs = 0;
        if let Err(code) = self.load(H, g, A, lbx, ubx, lba, uba) {
            return self.finish(code);
        }
        self.compute_rho();
        if let Err(code) = self.refactor() {
            return self.finish(code);
        }
        self.initialized = true;

        // cold starting point: origin projected into the bounds
        let m = self.nv + self.nc;
        self.x.set(T::zero());
        self.y.set(T::zero());
        for i in 0..m {
            self.z[i] = clamp(T::zero(), self.lb[i], self.ub[i]);
        }
        for i in 0..m {
            self.active[i] = self.classify(i);
        }

        self.print_banner();
        let code = self.iterate(limits);
        self.print_summary(code);
        self.finish(code)
    }

    #[allow(clippy::too_many_arguments)]
    fn hot_start(
        &mut self,
        H: &[T],
        g: &[T],
        A: &[T],
        lbx: &[T],
        ubx: &[T],
        lba: &[T],
        uba: &[T],
        limits: &SolveLimits,
    ) -> ReturnCode {
        self.recalcs = 0;
        if !self.initialized {
            return self.finish(ReturnCode::NotInitialized);
        }
        let matrices_changed = match self.load(H, g, A, lbx, ubx, lba, uba) {
            Ok(changed) => changed,
            Err(code) => return self.finish(code),
        };
        if matrices_changed || self.kkt.is_none() {
            if let Err(code) = self.refactor() {
                return self.finish(code);
            }
        }

        // iterates carry over; the splitting variable must re-enter the
        // possibly updated bounds
        let m = self.nv + self.nc;
        for i in 0..m {
            self.z[i] = clamp(self.z[i], self.lb[i], self.ub[i]);
        }

        let code = self.iterate(limits);
        self.print_summary(code);
        self.finish(code)
    }

    fn finish(&mut self, code: ReturnCode) -> ReturnCode {
        self.status = code;
        code
    }

    // Validate and copy problem data.  Reports whether H or A changed,
    // which decides whether the factorization must be refreshed.
    #[allow(clippy::too_many_arguments)]
    fn load(
        &mut self,
        H: &[T],
        g: &[T],
        A: &[T],
        lbx: &[T],
        ubx: &[T],
        lba: &[T],
        uba: &[T],
    ) -> Result<bool, ReturnCode> {
        let (nv, nc) = (self.nv, self.nc);
        if H.len() != nv * nv
            || g.len() != nv
            || A.len() != nc * nv
            || lbx.len() != nv
            || ubx.len() != nv
            || lba.len() != nc
            || uba.len() != nc
        {
            return Err(ReturnCode::InvalidArguments);
        }
        if H.iter().chain(g).chain(A).any(|v| !v.is_finite()) {
            return Err(ReturnCode::InvalidArguments);
        }
        if lbx.iter().chain(ubx).chain(lba).chain(uba).any(|v| v.is_nan()) {
            return Err(ReturnCode::InvalidArguments);
        }
        if (0..nv).any(|i| lbx[i] > ubx[i]) || (0..nc).any(|i| lba[i] > uba[i]) {
            return Err(ReturnCode::Infeasible);
        }

        let changed = self.H.as_slice() != H || self.A.as_slice() != A;
        self.H.copy_from(H);
        self.g.copy_from(g);
        self.A.copy_from(A);
        self.lb[..nv].copy_from(lbx);
        self.lb[nv..].copy_from(lba);
        self.ub[..nv].copy_from(ubx);
        self.ub[nv..].copy_from(uba);
        Ok(changed)
    }

    // Penalty per constraint row, chosen once at initialization.  Rows
    // with coinciding bounds get a stiffer penalty so the projection
    // pins them early.
    fn compute_rho(&mut self) {
        let rho = self.opts.rho;
        let scale: T = EQUALITY_RHO_SCALE.as_T();
        for i in 0..self.rho.len() {
            self.rho[i] = if self.lb[i] == self.ub[i] { rho * scale } else { rho };
        }
    }

    fn refactor(&mut self) -> Result<(), ReturnCode> {
        let M = self.assemble_kkt();
        match DenseCholesky::factor(&M, self.nv) {
            Ok(f) => {
                self.kkt = Some(f);
                Ok(())
            }
            Err(_) => {
                self.kkt = None;
                Err(ReturnCode::NumericalIssue)
            }
        }
    }

    // M = H + σI + CᵀΡC with C = [I; A]
    fn assemble_kkt(&self) -> Vec<T> {
        let nv = self.nv;
        let mut M = self.H.clone();
        for i in 0..nv {
            M[i * nv + i] += self.opts.sigma + self.rho[i];
        }
        for r in 0..self.nc {
            let rr = self.rho[nv + r];
            for i in 0..nv {
                let ai = self.A[r * nv + i];
                if ai == T::zero() {
                    continue;
                }
                let s = rr * ai;
                for j in 0..nv {
                    M[i * nv + j] += s * self.A[r * nv + j];
                }
            }
        }
        M
    }

    fn classify(&self, i: usize) -> i8 {
        if self.z[i] == self.lb[i] {
            -1
        } else if self.z[i] == self.ub[i] {
            1
        } else {
            0
        }
    }

    fn iterate(&mut self, limits: &SolveLimits) -> ReturnCode {
        let start = Instant::now();
        let nv = self.nv;
        let m = nv + self.nc;
        let inf: T = get_infinity().as_T();
        let cert_tol: T = CERT_TOL.as_T();
        let alpha = self.opts.alpha;
        let beta = T::one() - alpha;
        let nrm_g = self.g.norm_inf();

        let mut xtilde = vec![T::zero(); nv];
        let mut work_m = vec![T::zero(); m];
        let mut cx = vec![T::zero(); m];
        let mut hx = vec![T::zero(); nv];
        let mut cty = vec![T::zero(); nv];
        let mut dir = vec![T::zero(); m.max(nv)];
        let mut dir_img = vec![T::zero(); m.max(nv)];

        // iterates at the previous check, for the divergence certificates
        let mut x_last = self.x.clone();
        let mut y_last = self.y.clone();

        let mut sweeps: u32 = 0;
        loop {
            // one splitting sweep
            for (w, &rho, &z, &y) in izip!(&mut work_m, &self.rho, &self.z, &self.y) {
                *w = rho * z - y;
            }
            self.mult_Ct(&work_m, &mut xtilde);
            for i in 0..nv {
                xtilde[i] += self.opts.sigma * self.x[i] - self.g[i];
            }
            let Some(kkt) = &self.kkt else {
                return ReturnCode::NotInitialized;
            };
            kkt.solve(&mut xtilde);
            self.mult_C(&xtilde, &mut work_m);
            for (&w, z, y, &rho, &lb, &ub) in izip!(
                &work_m,
                &mut self.z,
                &mut self.y,
                &self.rho,
                &self.lb,
                &self.ub
            ) {
                let zhat = alpha * w + beta * *z;
                let znew = clamp(zhat + *y / rho, lb, ub);
                *y += rho * (zhat - znew);
                *z = znew;
            }
            for i in 0..nv {
                self.x[i] = alpha * xtilde[i] + beta * self.x[i];
            }
            sweeps += 1;

            if sweeps % self.opts.check_interval == 0 {
                if let Some(budget) = limits.cpu_time {
                    if start.elapsed().as_secs_f64() > budget {
                        return ReturnCode::TimeLimit;
                    }
                }

                // working-set bookkeeping
                let mut changed = false;
                for i in 0..m {
                    let w = self.classify(i);
                    if w != self.active[i] {
                        self.active[i] = w;
                        changed = true;
                    }
                }
                if changed {
                    self.recalcs += 1;
                    if self.opts.print_level >= PrintLevel::High {
                        let nact = self.active.iter().filter(|w| **w != 0).count();
                        println!("working set changed at sweep {} ({} rows active)", sweeps, nact);
                    }
                    if self.recalcs > limits.max_recalcs {
                        return ReturnCode::IterationLimit;
                    }
                }

                // unscaled residuals
                self.mult_C(&self.x, &mut cx);
                self.mult_H(&self.x, &mut hx);
                self.mult_Ct(&self.y, &mut cty);
                let mut r_prim = T::zero();
                for i in 0..m {
                    r_prim = r_prim.max((cx[i] - self.z[i]).abs());
                }
                let mut r_dual = T::zero();
                for i in 0..nv {
                    r_dual = r_dual.max((hx[i] + self.g[i] + cty[i]).abs());
                }
                if !(r_prim.is_finite() && r_dual.is_finite()) {
                    return ReturnCode::NumericalIssue;
                }

                if self.opts.print_level >= PrintLevel::Medium {
                    println!(
                        "sweep {:>7}   rprim {:10.3e}   rdual {:10.3e}   recalcs {:>4}",
                        sweeps, r_prim, r_dual, self.recalcs
                    );
                }

                let eps_prim = self.opts.eps_abs
                    + self.opts.eps_rel * cx.norm_inf().max(self.z.norm_inf());
                let eps_dual = self.opts.eps_abs
                    + self.opts.eps_rel * hx.norm_inf().max(nrm_g).max(cty.norm_inf());
                if r_prim <= eps_prim && r_dual <= eps_dual {
                    if self.opts.polish {
                        self.polish();
                    }
                    return ReturnCode::Success;
                }

                // unboundedness certificate: the primal increment is a
                // descent direction in the recession cone
                let ndx = self.x.norm_inf_diff(&x_last);
                if ndx > T::zero() {
                    let recip = T::recip(ndx);
                    for i in 0..nv {
                        dir[i] = (self.x[i] - x_last[i]) * recip;
                    }
                    self.mult_H(&dir[..nv], &mut hx);
                    self.mult_C(&dir[..nv], &mut dir_img[..m]);
                    let mut cert = hx.norm_inf() <= cert_tol
                        && self.g.dot(&dir[..nv]) < -cert_tol;
                    if cert {
                        for i in 0..m {
                            if (self.ub[i] < inf && dir_img[i] > cert_tol)
                                || (self.lb[i] > -inf && dir_img[i] < -cert_tol)
                            {
                                cert = false;
                                break;
                            }
                        }
                    }
                    if cert {
                        return ReturnCode::Unbounded;
                    }
                }

                // infeasibility certificate: the dual increment separates
                // the constraint set
                let ndy = self.y.norm_inf_diff(&y_last);
                if ndy > T::zero() {
                    let recip = T::recip(ndy);
                    for i in 0..m {
                        dir[i] = (self.y[i] - y_last[i]) * recip;
                    }
                    self.mult_Ct(&dir[..m], &mut dir_img[..nv]);
                    let mut cert = dir_img[..nv].norm_inf() <= cert_tol;
                    if cert {
                        let mut support = T::zero();
                        for i in 0..m {
                            if dir[i] > cert_tol {
                                if self.ub[i] >= inf {
                                    cert = false;
                                    break;
                                }
                                support += self.ub[i] * dir[i];
                            } else if dir[i] < -cert_tol {
                                if self.lb[i] <= -inf {
                                    cert = false;
                                    break;
                                }
                                support += self.lb[i] * dir[i];
                            }
                        }
                        if cert && support < -cert_tol {
                            return ReturnCode::Infeasible;
                        }
                    }
                }

                // hard divergence guards
                if self.x.norm_inf() > inf {
                    return ReturnCode::Unbounded;
                }
                if self.y.norm_inf() > inf {
                    return ReturnCode::Infeasible;
                }

                x_last.copy_from(&self.x);
                y_last.copy_from(&self.y);
            }

            if sweeps >= self.opts.max_sweeps {
                return ReturnCode::IterationLimit;
            }
        }
    }

    // Equality-constrained refinement over the converged working set.
    // Solves the KKT system restricted to the active rows and keeps the
    // refined point only when it does not worsen the KKT residuals.
    fn polish(&mut self) {
        let nv = self.nv;
        let m = nv + self.nc;
        let inf: T = get_infinity().as_T();
        let reg: T = POLISH_REG.as_T();

        let mut rows: Vec<(usize, T)> = Vec::new();
        for i in 0..m {
            match self.active[i] {
                -1 if self.lb[i] > -inf => rows.push((i, self.lb[i])),
                1 if self.ub[i] < inf => rows.push((i, self.ub[i])),
                _ => {}
            }
        }
        let na = rows.len();
        let kn = nv + na;

        let mut K = vec![T::zero(); kn * kn];
        for r in 0..nv {
            for c in 0..nv {
                K[r * kn + c] = self.H[r * nv + c];
            }
            K[r * kn + r] += reg;
        }
        for (j, &(row, _)) in rows.iter().enumerate() {
            for c in 0..nv {
                let v = self.constraint_coeff(row, c);
                K[c * kn + (nv + j)] = v;
                K[(nv + j) * kn + c] = v;
            }
            K[(nv + j) * kn + (nv + j)] = -reg;
        }

        let Ok(lu) = DenseLU::factor(&K, kn) else {
            return;
        };
        let mut rhs = vec![T::zero(); kn];
        for i in 0..nv {
            rhs[i] = -self.g[i];
        }
        for (j, &(_, b)) in rows.iter().enumerate() {
            rhs[nv + j] = b;
        }
        lu.solve(&mut rhs, 1, false);

        let xp = &rhs[..nv];
        let mut yp = vec![T::zero(); m];
        for (j, &(row, _)) in rows.iter().enumerate() {
            yp[row] = rhs[nv + j];
        }

        let (rp_new, rd_new) = self.kkt_residuals(xp, &yp);
        let (rp_cur, rd_cur) = self.kkt_residuals(&self.x, &self.y);
        let accepted = rp_new.max(rd_new) <= rp_cur.max(rd_cur);
        if accepted {
            for i in 0..nv {
                self.x[i] = xp[i];
            }
            self.y.copy_from(&yp);
            let mut cxp = vec![T::zero(); m];
            self.mult_C(&self.x, &mut cxp);
            for i in 0..m {
                self.z[i] = clamp(cxp[i], self.lb[i], self.ub[i]);
            }
        }
        if self.opts.print_level >= PrintLevel::High {
            println!(
                "polish over {} active rows {}",
                na,
                if accepted { "accepted" } else { "discarded" }
            );
        }
    }

    // Bound violation and stationarity residuals for a candidate point.
    fn kkt_residuals(&self, x: &[T], y: &[T]) -> (T, T) {
        let nv = self.nv;
        let m = nv + self.nc;
        let mut cx = vec![T::zero(); m];
        self.mult_C(x, &mut cx);
        let mut rp = T::zero();
        for i in 0..m {
            rp = rp.max(self.lb[i] - cx[i]).max(cx[i] - self.ub[i]);
        }
        let mut hx = vec![T::zero(); nv];
        self.mult_H(x, &mut hx);
        let mut cty = vec![T::zero(); nv];
        self.mult_Ct(y, &mut cty);
        let mut rd = T::zero();
        for i in 0..nv {
            rd = rd.max((hx[i] + self.g[i] + cty[i]).abs());
        }
        (rp, rd)
    }

    fn constraint_coeff(&self, row: usize, col: usize) -> T {
        if row < self.nv {
            if row == col {
                T::one()
            } else {
                T::zero()
            }
        } else {
            self.A[(row - self.nv) * self.nv + col]
        }
    }

    // out = [x; Ax]
    fn mult_C(&self, x: &[T], out: &mut [T]) {
        let nv = self.nv;
        out[..nv].copy_from(x);
        for r in 0..self.nc {
            let mut s = T::zero();
            for c in 0..nv {
                s += self.A[r * nv + c] * x[c];
            }
            out[nv + r] = s;
        }
    }

    // out = v[..nv] + Aᵀ v[nv..]
    fn mult_Ct(&self, v: &[T], out: &mut [T]) {
        let nv = self.nv;
        out.copy_from(&v[..nv]);
        for r in 0..self.nc {
            let vr = v[nv + r];
            if vr == T::zero() {
                continue;
            }
            for c in 0..nv {
                out[c] += self.A[r * nv + c] * vr;
            }
        }
    }

    fn mult_H(&self, x: &[T], out: &mut [T]) {
        let nv = self.nv;
        for r in 0..nv {
            let mut s = T::zero();
            for c in 0..nv {
                s += self.H[r * nv + c] * x[c];
            }
            out[r] = s;
        }
    }

    fn objective(&self) -> T {
        let mut hx = vec![T::zero(); self.nv];
        self.mult_H(&self.x, &mut hx);
        let half: T = (0.5).as_T();
        half * self.x.dot(&hx) + self.g.dot(&self.x)
    }

    fn primal_into(&self, x: &mut [T]) {
        x.copy_from(&self.x);
    }

    // Multipliers in the sign convention of active-set codes: positive
    // where a lower bound is active, negative where an upper bound is.
    fn dual_into(&self, lam: &mut [T]) {
        for (out, y) in lam.iter_mut().zip(&self.y) {
            *out = -*y;
        }
    }

    fn print_banner(&self) {
        if self.opts.print_level < PrintLevel::Low {
            return;
        }
        println!("-----------------------------------------------------------");
        println!("         splitqp v{}  -  splitting QP engine", crate::VERSION);
        println!("-----------------------------------------------------------");
        println!(
            "problem:  variables = {}, constraint rows = {}",
            self.nv, self.nc
        );
    }

    fn print_summary(&self, code: ReturnCode) {
        if self.opts.print_level < PrintLevel::Low {
            return;
        }
        println!(
            "status = {}, recalcs = {}, objective = {:.6e}",
            code,
            self.recalcs,
            self.objective()
        );
    }
}

#[path = "test.rs"]
#[cfg(test)]
mod test;
