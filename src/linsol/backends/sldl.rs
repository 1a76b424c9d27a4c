#![allow(non_snake_case)]
//! Sparse LDL' backend for structurally symmetric matrices.
//!
//! Up-looking factorization over the upper triangle of the permuted matrix,
//! with the row pattern of each L row taken from the elimination tree.  The
//! permutation is AMD by default and can be disabled through the `ordering`
//! option.  When every pivot comes out positive the factor doubles as a
//! Cholesky factor, which this backend exposes through the Cholesky
//! capability surface.

use std::iter::zip;

use crate::algebra::{FloatT, SparsityPattern};
use crate::error::SolverError;
use crate::linsol::backend::{BoxedLinsolBackend, CholeskyCapable, LinsolBackend, LinsolFactory};
use crate::linsol::{CAP_CHOLESKY, CAP_TRANSPOSE};
use crate::options::{OptionSchema, ResolvedOptions};
use crate::plugin::{PluginRecord, PLUGIN_API_VERSION};

const NO_PARENT: usize = usize::MAX;

pub(crate) fn record<T: FloatT>() -> PluginRecord<LinsolFactory<T>> {
    PluginRecord {
        name: "sldl",
        doc: "Sparse LDL' for structurally symmetric matrices with a \
              fill-reducing ordering; Cholesky-capable when the matrix is \
              positive definite.",
        api_version: PLUGIN_API_VERSION,
        caps: &[CAP_CHOLESKY, CAP_TRANSPOSE],
        schema: OptionSchema::new("sldl").declare_enum(
            "ordering",
            Some("amd"),
            "fill-reducing ordering applied before factorization",
            &["natural", "amd"],
        ),
        factory: factory::<T>,
    }
}

fn factory<T: FloatT>(
    pattern: &SparsityPattern,
    opts: &ResolvedOptions,
) -> Result<BoxedLinsolBackend<T>, SolverError> {
    Ok(Box::new(SldlBackend::new(pattern, opts)?))
}

/// All factor data lives in the permuted coordinates fixed at construction;
/// `perm[k]` is the original index placed kth.  The symbolic phase (ordering,
/// permuted upper triangle, elimination tree, row placement) runs once here,
/// so repeated `factorize` calls only redo the numeric sweep.
struct SldlBackend<T = f64> {
    n: usize,
    perm: Vec<usize>,
    /// upper triangle of the permuted matrix
    Tp: SparsityPattern,
    /// original nonzero index -> slot in `Tx`
    amap: Vec<usize>,
    Tx: Vec<T>,
    /// unit lower triangular factor, strict lower part only
    Lp: Vec<usize>,
    Li: Vec<usize>,
    Lx: Vec<T>,
    D: Vec<T>,
    Dinv: Vec<T>,
    etree: Vec<usize>,
    // workspaces for the numeric phase and the solves
    y_idx: Vec<usize>,
    elim_buffer: Vec<usize>,
    next_colspace: Vec<usize>,
    y_markers: Vec<bool>,
    y_vals: Vec<T>,
    work: Vec<T>,
    factored: bool,
}

impl<T: FloatT> SldlBackend<T> {
    fn new(pattern: &SparsityPattern, opts: &ResolvedOptions) -> Result<Self, SolverError> {
        let n = pattern.nrows;
        if !pattern.is_symmetric() {
            return Err(SolverError::Configuration(
                "sldl requires a structurally symmetric matrix".into(),
            ));
        }
        for c in 0..n {
            let rows = &pattern.rowval[pattern.colptr[c]..pattern.colptr[c + 1]];
            if rows.binary_search(&c).is_err() {
                return Err(SolverError::Configuration(format!(
                    "sldl requires structural diagonal entries; column {c} has none"
                )));
            }
        }

        let perm: Vec<usize> = match opts.str("ordering") {
            "amd" if n > 0 => {
                let control = amd::Control::default();
                let (perm, _iperm, _info) =
                    amd::order(n, &pattern.colptr, &pattern.rowval, &control).map_err(|e| {
                        SolverError::Configuration(format!("AMD ordering failed: {e:?}"))
                    })?;
                perm
            }
            _ => (0..n).collect(),
        };
        let mut iperm = vec![0usize; n];
        for (k, &j) in perm.iter().enumerate() {
            iperm[j] = k;
        }

        // Upper triangle of P A P'.  Each original entry (r, c) lands at the
        // (min, max) permuted position, so both halves of a symmetric pair
        // map onto the same stored slot.
        let nnz = pattern.nnz();
        let mut entries: Vec<(usize, usize, usize)> = Vec::with_capacity(nnz);
        for c in 0..n {
            for idx in pattern.colptr[c]..pattern.colptr[c + 1] {
                let (pr, pc) = (iperm[pattern.rowval[idx]], iperm[c]);
                entries.push((pr.max(pc), pr.min(pc), idx));
            }
        }
        entries.sort_unstable();

        let mut colptr = vec![0usize; n + 1];
        let mut rowval = Vec::new();
        let mut amap = vec![0usize; nnz];
        let mut last = None;
        for &(c, r, idx) in &entries {
            if last != Some((c, r)) {
                colptr[c + 1] += 1;
                rowval.push(r);
                last = Some((c, r));
            }
            amap[idx] = rowval.len() - 1;
        }
        for c in 0..n {
            colptr[c + 1] += colptr[c];
        }
        let Tp = SparsityPattern {
            nrows: n,
            ncols: n,
            colptr,
            rowval,
        };

        // elimination tree and per-column factor counts
        let mut marker = vec![0usize; n];
        let mut Lnz = vec![0usize; n];
        let mut etree = vec![NO_PARENT; n];
        for j in 0..n {
            marker[j] = j;
            for &row in &Tp.rowval[Tp.colptr[j]..Tp.colptr[j + 1]] {
                let mut i = row;
                while marker[i] != j {
                    if etree[i] == NO_PARENT {
                        etree[i] = j;
                    }
                    Lnz[i] += 1;
                    marker[i] = j;
                    i = etree[i];
                }
            }
        }

        let mut Lp = vec![0usize; n + 1];
        for k in 0..n {
            Lp[k + 1] = Lp[k] + Lnz[k];
        }
        let lnnz = Lp[n];

        let tnnz = Tp.nnz();
        let mut backend = Self {
            n,
            perm,
            Tp,
            amap,
            Tx: vec![T::zero(); tnnz],
            Lp,
            Li: vec![0; lnnz],
            Lx: vec![T::zero(); lnnz],
            D: vec![T::zero(); n],
            Dinv: vec![T::zero(); n],
            etree,
            y_idx: vec![0; n],
            elim_buffer: vec![0; n],
            next_colspace: vec![0; n],
            y_markers: vec![false; n],
            y_vals: vec![T::zero(); n],
            work: vec![T::zero(); n],
            factored: false,
        };
        backend.place_rows();
        Ok(backend)
    }

    /// Pattern of row k of L, collected by walking the elimination tree from
    /// each off-diagonal entry of column k until a visited node stops the
    /// climb.  Fills `y_idx[..return]` and leaves those nodes marked.
    fn row_pattern(&mut self, k: usize) -> usize {
        let mut nnz_y = 0;
        for p in self.Tp.colptr[k]..self.Tp.colptr[k + 1] {
            let bidx = self.Tp.rowval[p];
            if bidx == k || self.y_markers[bidx] {
                continue;
            }
            self.y_markers[bidx] = true;
            self.elim_buffer[0] = bidx;
            let mut nnz_e = 1;
            let mut next_idx = self.etree[bidx];
            while next_idx != NO_PARENT && next_idx < k {
                if self.y_markers[next_idx] {
                    break;
                }
                self.y_markers[next_idx] = true;
                self.elim_buffer[nnz_e] = next_idx;
                nnz_e += 1;
                next_idx = self.etree[next_idx];
            }
            // reverse the climb so ancestors come first
            while nnz_e != 0 {
                nnz_e -= 1;
                self.y_idx[nnz_y] = self.elim_buffer[nnz_e];
                nnz_y += 1;
            }
        }
        nnz_y
    }

    /// Logical factorization: records the row indices of L without touching
    /// values, so the factor pattern is known from construction on.
    fn place_rows(&mut self) {
        self.y_markers.fill(false);
        self.next_colspace.copy_from_slice(&self.Lp[..self.n]);
        for k in 1..self.n {
            let nnz_y = self.row_pattern(k);
            for i in (0..nnz_y).rev() {
                let cidx = self.y_idx[i];
                let t = self.next_colspace[cidx];
                self.Li[t] = k;
                self.next_colspace[cidx] = t + 1;
                self.y_markers[cidx] = false;
            }
        }
    }

    fn factor_numeric(&mut self) -> Result<(), SolverError> {
        let n = self.n;
        if n == 0 {
            return Ok(());
        }
        self.y_markers.fill(false);
        self.y_vals.fill(T::zero());
        self.D.fill(T::zero());
        self.next_colspace.copy_from_slice(&self.Lp[..n]);

        // column 0 of the upper triangle holds only the diagonal
        self.D[0] = self.Tx[0];
        if self.D[0] == T::zero() {
            return Err(zero_pivot(0));
        }
        self.Dinv[0] = T::recip(self.D[0]);

        for k in 1..n {
            // scatter column k of the upper triangle: diagonal into D,
            // the rest as the right-hand side of the row solve
            for p in self.Tp.colptr[k]..self.Tp.colptr[k + 1] {
                let bidx = self.Tp.rowval[p];
                if bidx == k {
                    self.D[k] = self.Tx[p];
                } else {
                    self.y_vals[bidx] = self.Tx[p];
                }
            }
            let nnz_y = self.row_pattern(k);

            // sparse triangular solve for row k, walking the reached
            // columns in topological order
            for i in (0..nnz_y).rev() {
                let cidx = self.y_idx[i];
                let tmp_idx = self.next_colspace[cidx];
                let y_cidx = self.y_vals[cidx];

                for j in self.Lp[cidx]..tmp_idx {
                    let lij = self.Li[j];
                    self.y_vals[lij] -= self.Lx[j] * y_cidx;
                }

                self.Lx[tmp_idx] = y_cidx * self.Dinv[cidx];
                self.Li[tmp_idx] = k;
                self.D[k] -= y_cidx * self.Lx[tmp_idx];
                self.next_colspace[cidx] = tmp_idx + 1;

                self.y_vals[cidx] = T::zero();
                self.y_markers[cidx] = false;
            }

            if self.D[k] == T::zero() {
                return Err(zero_pivot(k));
            }
            self.Dinv[k] = T::recip(self.D[k]);
        }
        Ok(())
    }

    /// Pattern of L with the unit diagonal made explicit: the diagonal entry
    /// leads each column, followed by the stored strictly lower rows.
    fn chol_pattern(&self) -> SparsityPattern {
        let n = self.n;
        let mut colptr = vec![0usize; n + 1];
        let mut rowval = Vec::with_capacity(n + self.Li.len());
        for k in 0..n {
            rowval.push(k);
            rowval.extend_from_slice(&self.Li[self.Lp[k]..self.Lp[k + 1]]);
            colptr[k + 1] = rowval.len();
        }
        SparsityPattern {
            nrows: n,
            ncols: n,
            colptr,
            rowval,
        }
    }

    fn require_positive_definite(&self) -> Result<(), SolverError> {
        match (0..self.n).find(|&k| self.D[k] <= T::zero()) {
            None => Ok(()),
            Some(k) => Err(SolverError::Numeric(format!(
                "matrix is not positive definite: pivot {k} of the factor is not positive"
            ))),
        }
    }
}

fn zero_pivot(k: usize) -> SolverError {
    SolverError::Numeric(format!("zero pivot at position {k} of the factor"))
}

// Solves (L+I)x = b in place.
fn lsolve<T: FloatT>(Lp: &[usize], Li: &[usize], Lx: &[T], x: &mut [T]) {
    for i in 0..x.len() {
        let xi = x[i];
        for (&lij, &lxj) in zip(&Li[Lp[i]..Lp[i + 1]], &Lx[Lp[i]..Lp[i + 1]]) {
            x[lij] -= lxj * xi;
        }
    }
}

// Solves (L+I)'x = b in place.
fn ltsolve<T: FloatT>(Lp: &[usize], Li: &[usize], Lx: &[T], x: &mut [T]) {
    for i in (0..x.len()).rev() {
        let mut s = T::zero();
        for (&lij, &lxj) in zip(&Li[Lp[i]..Lp[i + 1]], &Lx[Lp[i]..Lp[i + 1]]) {
            s += lxj * x[lij];
        }
        x[i] -= s;
    }
}

impl<T: FloatT> LinsolBackend<T> for SldlBackend<T> {
    fn factorize(&mut self, values: &[T]) -> Result<(), SolverError> {
        assert_eq!(values.len(), self.amap.len());
        self.factored = false;
        for (idx, &v) in values.iter().enumerate() {
            self.Tx[self.amap[idx]] = v;
        }
        self.factor_numeric()?;
        self.factored = true;
        Ok(())
    }

    // transpose is accepted but has no effect: the matrix is symmetric
    fn solve(&mut self, x: &mut [T], nrhs: usize, _transpose: bool) -> Result<(), SolverError> {
        if !self.factored {
            return Err(SolverError::State(
                "solve called before a successful factorize".into(),
            ));
        }
        let n = self.n;
        debug_assert_eq!(x.len(), n * nrhs);
        for col in x.chunks_exact_mut(n) {
            for k in 0..n {
                self.work[k] = col[self.perm[k]];
            }
            lsolve(&self.Lp, &self.Li, &self.Lx, &mut self.work);
            for (w, &dinv) in zip(&mut self.work, &self.Dinv) {
                *w *= dinv;
            }
            ltsolve(&self.Lp, &self.Li, &self.Lx, &mut self.work);
            for k in 0..n {
                col[self.perm[k]] = self.work[k];
            }
        }
        Ok(())
    }

    fn cholesky(&mut self) -> Option<&mut dyn CholeskyCapable<T>> {
        Some(self)
    }
}

impl<T: FloatT> CholeskyCapable<T> for SldlBackend<T> {
    fn cholesky_sparsity(&self, transpose: bool) -> SparsityPattern {
        let pattern = self.chol_pattern();
        if transpose {
            pattern.transposed()
        } else {
            pattern
        }
    }

    fn cholesky_factor(
        &mut self,
        transpose: bool,
    ) -> Result<(SparsityPattern, Vec<T>), SolverError> {
        if !self.factored {
            return Err(SolverError::State(
                "cholesky factor requested before a successful factorize".into(),
            ));
        }
        self.require_positive_definite()?;

        // scale the unit columns by sqrt(D) to fold the diagonal in
        let pattern = self.chol_pattern();
        let mut values = Vec::with_capacity(pattern.nnz());
        for k in 0..self.n {
            let s = self.D[k].sqrt();
            values.push(s);
            for j in self.Lp[k]..self.Lp[k + 1] {
                values.push(self.Lx[j] * s);
            }
        }

        if transpose {
            let (pt, map) = pattern.transposed_with_map();
            let vt = map.iter().map(|&i| values[i]).collect();
            Ok((pt, vt))
        } else {
            Ok((pattern, values))
        }
    }

    fn solve_cholesky(
        &mut self,
        x: &mut [T],
        nrhs: usize,
        transpose: bool,
    ) -> Result<(), SolverError> {
        if !self.factored {
            return Err(SolverError::State(
                "cholesky solve requested before a successful factorize".into(),
            ));
        }
        self.require_positive_definite()?;
        let n = self.n;
        debug_assert_eq!(x.len(), n * nrhs);
        for col in x.chunks_exact_mut(n) {
            if transpose {
                for (c, &d) in zip(&mut *col, &self.D) {
                    *c /= d.sqrt();
                }
                ltsolve(&self.Lp, &self.Li, &self.Lx, col);
            } else {
                lsolve(&self.Lp, &self.Li, &self.Lx, col);
                for (c, &d) in zip(&mut *col, &self.D) {
                    *c /= d.sqrt();
                }
            }
        }
        Ok(())
    }

    fn ordering(&self) -> &[usize] {
        &self.perm
    }
}
