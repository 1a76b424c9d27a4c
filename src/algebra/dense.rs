use super::FloatT;
use thiserror::Error;

/// Error type returned by the dense factorization kernels.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DenseFactorizationError {
    /// Matrix dimension fields and data are incompatible
    #[error("matrix dimensions are incompatible")]
    IncompatibleDimension,
    /// A zero pivot was encountered during elimination
    #[error("zero pivot encountered at elimination step {0}")]
    ZeroPivot(usize),
    /// The matrix is not positive definite
    #[error("matrix is not positive definite (failed at pivot {0})")]
    NotPositiveDefinite(usize),
}

/// LU factorization with partial pivoting of a square row-major matrix.
///
/// Stores the unit lower triangular multipliers and the upper factor in a
/// single packed copy, LAPACK style, with the pivot sequence alongside.
/// Supports both plain and transposed solves against the same
/// factorization.
pub struct DenseLU<T = f64> {
    n: usize,
    lu: Vec<T>,
    piv: Vec<usize>,
}

impl<T: FloatT> DenseLU<T> {
    pub fn factor(a: &[T], n: usize) -> Result<Self, DenseFactorizationError> {
        if a.len() != n * n {
            return Err(DenseFactorizationError::IncompatibleDimension);
        }
        let mut lu = a.to_vec();
        let mut piv = vec![0usize; n];

        for k in 0..n {
            // pivot row with the largest magnitude in column k
            let mut p = k;
            let mut pmax = lu[k * n + k].abs();
            for i in (k + 1)..n {
                let v = lu[i * n + k].abs();
                if v > pmax {
                    pmax = v;
                    p = i;
                }
            }
            if pmax == T::zero() {
                return Err(DenseFactorizationError::ZeroPivot(k));
            }
            piv[k] = p;
            if p != k {
                for j in 0..n {
                    lu.swap(k * n + j, p * n + j);
                }
            }
            let pivinv = T::recip(lu[k * n + k]);
            for i in (k + 1)..n {
                let m = lu[i * n + k] * pivinv;
                lu[i * n + k] = m;
                for j in (k + 1)..n {
                    let u = lu[k * n + j];
                    lu[i * n + j] -= m * u;
                }
            }
        }
        Ok(Self { n, lu, piv })
    }

    /// Solve in place for `nrhs` right-hand sides stored as consecutive
    /// length-n columns.  With `transpose` set, solves against the
    /// transposed matrix using the same factorization.
    pub fn solve(&self, x: &mut [T], nrhs: usize, transpose: bool) {
        let n = self.n;
        assert_eq!(x.len(), n * nrhs);
        for col in x.chunks_exact_mut(n) {
            if transpose {
                self.solve_transposed_single(col);
            } else {
                self.solve_single(col);
            }
        }
    }

    // PA = LU, so solve LUx = Pb
    fn solve_single(&self, x: &mut [T]) {
        let n = self.n;
        for k in 0..n {
            if self.piv[k] != k {
                x.swap(k, self.piv[k]);
            }
        }
        // unit lower forward
        for i in 1..n {
            let mut s = x[i];
            for j in 0..i {
                s -= self.lu[i * n + j] * x[j];
            }
            x[i] = s;
        }
        // upper backward
        for i in (0..n).rev() {
            let mut s = x[i];
            for j in (i + 1)..n {
                s -= self.lu[i * n + j] * x[j];
            }
            x[i] = s / self.lu[i * n + i];
        }
    }

    // A' = U'L'P, so solve U'L'Px = b and unpermute last
    fn solve_transposed_single(&self, x: &mut [T]) {
        let n = self.n;
        // U' is lower triangular with the U diagonal
        for i in 0..n {
            let mut s = x[i];
            for j in 0..i {
                s -= self.lu[j * n + i] * x[j];
            }
            x[i] = s / self.lu[i * n + i];
        }
        // L' is unit upper triangular
        for i in (0..n).rev() {
            let mut s = x[i];
            for j in (i + 1)..n {
                s -= self.lu[j * n + i] * x[j];
            }
            x[i] = s;
        }
        for k in (0..n).rev() {
            if self.piv[k] != k {
                x.swap(k, self.piv[k]);
            }
        }
    }
}

/// Cholesky factorization of a symmetric positive definite row-major
/// matrix.  Only the lower triangle of the input is referenced.
pub struct DenseCholesky<T = f64> {
    n: usize,
    l: Vec<T>,
}

impl<T: FloatT> DenseCholesky<T> {
    pub fn factor(a: &[T], n: usize) -> Result<Self, DenseFactorizationError> {
        if a.len() != n * n {
            return Err(DenseFactorizationError::IncompatibleDimension);
        }
        let mut l = a.to_vec();
        for k in 0..n {
            let mut d = l[k * n + k];
            for j in 0..k {
                d -= l[k * n + j] * l[k * n + j];
            }
            if d <= T::zero() {
                return Err(DenseFactorizationError::NotPositiveDefinite(k));
            }
            let dkk = d.sqrt();
            l[k * n + k] = dkk;
            let dinv = T::recip(dkk);
            for i in (k + 1)..n {
                let mut s = l[i * n + k];
                for j in 0..k {
                    s -= l[i * n + j] * l[k * n + j];
                }
                l[i * n + k] = s * dinv;
            }
        }
        Ok(Self { n, l })
    }

    /// Solve in place for a single right-hand side.
    pub fn solve(&self, x: &mut [T]) {
        let n = self.n;
        assert_eq!(x.len(), n);
        for i in 0..n {
            let mut s = x[i];
            for j in 0..i {
                s -= self.l[i * n + j] * x[j];
            }
            x[i] = s / self.l[i * n + i];
        }
        for i in (0..n).rev() {
            let mut s = x[i];
            for j in (i + 1)..n {
                s -= self.l[j * n + i] * x[j];
            }
            x[i] = s / self.l[i * n + i];
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    // row-major y = A * x
    fn mat_vec(a: &[f64], n: usize, x: &[f64]) -> Vec<f64> {
        (0..n)
            .map(|i| (0..n).map(|j| a[i * n + j] * x[j]).sum())
            .collect()
    }

    fn assert_close(a: &[f64], b: &[f64], tol: f64) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() <= tol, "{:?} != {:?}", a, b);
        }
    }

    #[test]
    fn test_lu_solve() {
        let a = vec![0.0, 1.0, 2.0, 3.0];
        let lu = DenseLU::factor(&a, 2).unwrap();

        let mut x = vec![1.0, 2.0];
        lu.solve(&mut x, 1, false);
        assert_close(&mat_vec(&a, 2, &x), &[1.0, 2.0], 1e-14);

        let mut x = vec![1.0, 2.0];
        lu.solve(&mut x, 1, true);
        assert_close(&x, &[0.5, 0.5], 1e-14);
    }

    #[test]
    fn test_lu_multiple_rhs() {
        #[rustfmt::skip]
        let a = vec![
            2.0, 1.0, 0.0,
            1.0, 3.0, 1.0,
            0.0, 1.0, 4.0,
        ];
        let lu = DenseLU::factor(&a, 3).unwrap();

        let b = vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];
        let mut x = b.clone();
        lu.solve(&mut x, 3, false);
        for c in 0..3 {
            let xb = &x[c * 3..(c + 1) * 3];
            let ax = mat_vec(&a, 3, xb);
            assert_close(&ax, &b[c * 3..(c + 1) * 3], 1e-12);
        }
    }

    #[test]
    fn test_lu_transpose_residual() {
        #[rustfmt::skip]
        let a = vec![
            1.0, 4.0, 7.0,
            2.0, 5.0, 8.0,
            3.0, 6.0, 10.0,
        ];
        let at: Vec<f64> = (0..3)
            .flat_map(|i| (0..3).map(move |j| (i, j)))
            .map(|(i, j)| a[j * 3 + i])
            .collect();

        let lu = DenseLU::factor(&a, 3).unwrap();
        let b = vec![1.0, -2.0, 3.0];
        let mut x = b.clone();
        lu.solve(&mut x, 1, true);
        assert_close(&mat_vec(&at, 3, &x), &b, 1e-12);
    }

    #[test]
    fn test_lu_singular() {
        let a = vec![1.0, 1.0, 1.0, 1.0];
        assert_eq!(
            DenseLU::factor(&a, 2).err(),
            Some(DenseFactorizationError::ZeroPivot(1))
        );
    }

    #[test]
    fn test_cholesky_solve() {
        #[rustfmt::skip]
        let a = vec![
            4.0, 1.0, 0.0,
            1.0, 3.0, 1.0,
            0.0, 1.0, 2.0,
        ];
        let ch = DenseCholesky::factor(&a, 3).unwrap();
        let b = vec![1.0, 2.0, 3.0];
        let mut x = b.clone();
        ch.solve(&mut x);
        assert_close(&mat_vec(&a, 3, &x), &b, 1e-12);
    }

    #[test]
    fn test_cholesky_not_positive_definite() {
        let a = vec![1.0, 2.0, 2.0, 1.0];
        assert_eq!(
            DenseCholesky::factor(&a, 2).err(),
            Some(DenseFactorizationError::NotPositiveDefinite(1))
        );
    }
}
