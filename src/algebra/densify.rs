use super::{FloatT, SparsityPattern, VectorMath};

/// Scatter sparse values into a row-major dense buffer, zero-filling
/// structural gaps.
///
/// With `symmetric` set the given half is mirrored across the diagonal,
/// which requires a square pattern.  Buffer lengths are preconditions, not
/// error paths: `values` must match the pattern nonzero count and `out`
/// must hold the full dense shape.
pub fn densify<T: FloatT>(values: &[T], sp: &SparsityPattern, out: &mut [T], symmetric: bool) {
    assert_eq!(values.len(), sp.nnz());
    assert_eq!(out.len(), sp.nrows * sp.ncols);
    assert!(!symmetric || sp.is_square());

    out.set(T::zero());
    for c in 0..sp.ncols {
        for idx in sp.colptr[c]..sp.colptr[c + 1] {
            let r = sp.rowval[idx];
            out[r * sp.ncols + c] = values[idx];
            if symmetric {
                out[c * sp.ncols + r] = values[idx];
            }
        }
    }
}
