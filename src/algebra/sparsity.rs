use thiserror::Error;

/// Error type returned by sparsity pattern format checks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SparsityError {
    /// Matrix dimension fields and pattern data are incompatible
    #[error("dimension fields and pattern data are incompatible")]
    IncompatibleDimension,
    /// Column pointers are not monotonically nondecreasing
    #[error("column pointers are not monotonically nondecreasing")]
    BadColptr,
    /// Row indices within a column are out of bounds or out of order
    #[error("row indices in column {0} are out of bounds or out of order")]
    BadRowval(usize),
}

/// Structural signature of a sparse matrix in compressed sparse column
/// format: dimensions plus the set of structurally nonzero positions.
///
/// Numeric values never appear here; they travel separately as slices
/// ordered to match `rowval`.  Once a pattern is bound to a solver instance
/// the instance keeps its own copy, so the shape and nonzero set seen by
/// the backend never change for that instance's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SparsityPattern {
    /// number of rows
    pub nrows: usize,
    /// number of columns
    pub ncols: usize,
    /// CSC format column pointer (length `ncols + 1`)
    pub colptr: Vec<usize>,
    /// vector of row indices
    pub rowval: Vec<usize>,
}

impl SparsityPattern {
    /// Construct a pattern from its CSC parts, checking the format.
    ///
    /// # Example
    /// ```
    /// use portico::algebra::SparsityPattern;
    ///
    /// // pattern of [x 0 x]
    /// //            [0 x 0]
    /// let sp = SparsityPattern::new(2, 3, vec![0, 1, 2, 3], vec![0, 1, 0]).unwrap();
    /// assert_eq!(sp.nnz(), 3);
    /// ```
    pub fn new(
        nrows: usize,
        ncols: usize,
        colptr: Vec<usize>,
        rowval: Vec<usize>,
    ) -> Result<Self, SparsityError> {
        let sp = Self {
            nrows,
            ncols,
            colptr,
            rowval,
        };
        sp.check_format()?;
        Ok(sp)
    }

    /// Pattern with every position structurally nonzero.
    pub fn dense(nrows: usize, ncols: usize) -> Self {
        let colptr = (0..=ncols).map(|c| c * nrows).collect();
        let rowval = (0..ncols).flat_map(|_| 0..nrows).collect();
        Self {
            nrows,
            ncols,
            colptr,
            rowval,
        }
    }

    /// Pattern of the n x n identity.
    pub fn identity(n: usize) -> Self {
        Self {
            nrows: n,
            ncols: n,
            colptr: (0..=n).collect(),
            rowval: (0..n).collect(),
        }
    }

    /// Checks structural well-formedness: column pointer length and
    /// monotonicity, and strictly increasing in-range row indices within
    /// each column.
    pub fn check_format(&self) -> Result<(), SparsityError> {
        if self.colptr.len() != self.ncols + 1
            || self.colptr[0] != 0
            || self.colptr[self.ncols] != self.rowval.len()
        {
            return Err(SparsityError::IncompatibleDimension);
        }
        if self.colptr.windows(2).any(|c| c[0] > c[1]) {
            return Err(SparsityError::BadColptr);
        }
        for c in 0..self.ncols {
            let rows = &self.rowval[self.colptr[c]..self.colptr[c + 1]];
            let ordered = rows.windows(2).all(|r| r[0] < r[1]);
            if !ordered || rows.last().is_some_and(|&r| r >= self.nrows) {
                return Err(SparsityError::BadRowval(c));
            }
        }
        Ok(())
    }

    /// number of structural nonzeros
    pub fn nnz(&self) -> usize {
        self.colptr[self.ncols]
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    pub fn is_square(&self) -> bool {
        self.nrows == self.ncols
    }

    /// true if the nonzero set is symmetric about the diagonal
    pub fn is_symmetric(&self) -> bool {
        self.is_square() && *self == self.transposed()
    }

    /// First column with no structural nonzeros, if any.
    pub fn first_empty_column(&self) -> Option<usize> {
        (0..self.ncols).find(|&c| self.colptr[c] == self.colptr[c + 1])
    }

    /// First row with no structural nonzeros, if any.
    pub fn first_empty_row(&self) -> Option<usize> {
        let mut seen = vec![false; self.nrows];
        for &r in &self.rowval {
            seen[r] = true;
        }
        seen.iter().position(|&s| !s)
    }

    /// Pattern of the transpose.
    pub fn transposed(&self) -> Self {
        let (pattern, _map) = self.transposed_with_map();
        pattern
    }

    /// Pattern of the transpose, together with a map taking each transposed
    /// nonzero index to its source index in this pattern.
    pub fn transposed_with_map(&self) -> (Self, Vec<usize>) {
        let nnz = self.nnz();
        let mut colptr = vec![0; self.nrows + 1];
        let mut rowval = vec![0; nnz];
        let mut map = vec![0; nnz];

        // count entries per row, then cumulative sum
        for &r in &self.rowval {
            colptr[r + 1] += 1;
        }
        for r in 0..self.nrows {
            colptr[r + 1] += colptr[r];
        }

        let mut next = colptr.clone();
        for c in 0..self.ncols {
            for idx in self.colptr[c]..self.colptr[c + 1] {
                let r = self.rowval[idx];
                let dest = next[r];
                rowval[dest] = c;
                map[dest] = idx;
                next[r] += 1;
            }
        }

        (
            Self {
                nrows: self.ncols,
                ncols: self.nrows,
                colptr,
                rowval,
            },
            map,
        )
    }

    /// Upper triangular part of a square pattern, together with a map taking
    /// each retained nonzero index to its source index in this pattern.
    pub fn to_triu_with_map(&self) -> (Self, Vec<usize>) {
        assert!(self.is_square());
        let mut colptr = vec![0; self.ncols + 1];
        let mut rowval = Vec::new();
        let mut map = Vec::new();

        for c in 0..self.ncols {
            for idx in self.colptr[c]..self.colptr[c + 1] {
                let r = self.rowval[idx];
                if r <= c {
                    rowval.push(r);
                    map.push(idx);
                }
            }
            colptr[c + 1] = rowval.len();
        }

        (
            Self {
                nrows: self.nrows,
                ncols: self.ncols,
                colptr,
                rowval,
            },
            map,
        )
    }
}
