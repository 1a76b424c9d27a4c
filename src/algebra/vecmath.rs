use super::FloatT;
use std::iter::zip;

/// Elementwise operations on numeric slices.
///
/// Implemented directly on `[T]` so that the facades and engines can apply
/// copy/scale style utilities to raw buffers without wrapper types.
pub trait VectorMath {
    type T;

    /// copy values from `src`, which must have equal length
    fn copy_from(&mut self, src: &[Self::T]) -> &mut Self;

    /// set all values to the scalar `c`
    fn set(&mut self, c: Self::T) -> &mut Self;

    /// elementwise scale by the scalar `c`
    fn scale(&mut self, c: Self::T) -> &mut Self;

    /// elementwise negation
    fn negate(&mut self) -> &mut Self;

    fn dot(&self, y: &[Self::T]) -> Self::T;

    /// infinity norm
    fn norm_inf(&self) -> Self::T;

    /// infinity norm of the elementwise difference to `b`
    fn norm_inf_diff(&self, b: &[Self::T]) -> Self::T;
}

impl<T: FloatT> VectorMath for [T] {
    type T = T;

    fn copy_from(&mut self, src: &[T]) -> &mut Self {
        self.copy_from_slice(src);
        self
    }

    fn set(&mut self, c: T) -> &mut Self {
        for x in &mut *self {
            *x = c;
        }
        self
    }

    fn scale(&mut self, c: T) -> &mut Self {
        for x in &mut *self {
            *x *= c;
        }
        self
    }

    fn negate(&mut self) -> &mut Self {
        for x in &mut *self {
            *x = -*x;
        }
        self
    }

    fn dot(&self, y: &[T]) -> T {
        assert_eq!(self.len(), y.len());
        zip(self, y).fold(T::zero(), |acc, (&x, &y)| acc + x * y)
    }

    fn norm_inf(&self) -> T {
        self.iter().fold(T::zero(), |acc, &x| acc.max(x.abs()))
    }

    fn norm_inf_diff(&self, b: &[T]) -> T {
        assert_eq!(self.len(), b.len());
        zip(self, b).fold(T::zero(), |acc, (&x, &y)| acc.max((x - y).abs()))
    }
}

#[test]
fn test_vecmath_basic() {
    let mut x = vec![1.0, -2.0, 3.0];
    assert_eq!(x.norm_inf(), 3.0);
    assert_eq!(x.dot(&[1.0, 1.0, 1.0]), 2.0);

    x.scale(2.0);
    assert_eq!(x, [2.0, -4.0, 6.0]);

    x.negate();
    assert_eq!(x, [-2.0, 4.0, -6.0]);

    assert_eq!(x.norm_inf_diff(&[-2.0, 4.0, -5.0]), 1.0);

    x.set(0.0).copy_from(&[7.0, 8.0, 9.0]);
    assert_eq!(x, [7.0, 8.0, 9.0]);
}
