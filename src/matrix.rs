//! Dense matrices over the field of rational functions.
//!
//! Row reduction, nullspace and row space follow the conventions of the
//! computer-algebra routines the analysis was designed against: the
//! nullspace basis is ordered by ascending free column, with a unit entry
//! at the free column and pivot-row entries read off the reduced echelon
//! form. Attack extraction depends on this ordering.

use std::fmt;

use crate::error::{AnalysisError, Result};
use crate::expr::Expr;

#[derive(Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<Expr>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Matrix {
            rows,
            cols,
            data: vec![Expr::zero(); rows * cols],
        }
    }

    pub fn from_rows(rows: Vec<Vec<Expr>>) -> Result<Self> {
        let nrows = rows.len();
        let ncols = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut data = Vec::with_capacity(nrows * ncols);
        for row in rows {
            if row.len() != ncols {
                return Err(AnalysisError::InvalidDimension {
                    expected: ncols,
                    got: row.len(),
                });
            }
            data.extend(row);
        }
        Ok(Matrix {
            rows: nrows,
            cols: ncols,
            data,
        })
    }

    pub fn row_vector(entries: Vec<Expr>) -> Self {
        let cols = entries.len();
        Matrix {
            rows: 1,
            cols,
            data: entries,
        }
    }

    pub fn col_vector(entries: Vec<Expr>) -> Self {
        let rows = entries.len();
        Matrix {
            rows,
            cols: 1,
            data: entries,
        }
    }

    pub fn nrows(&self) -> usize {
        self.rows
    }

    pub fn ncols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, r: usize, c: usize) -> &Expr {
        &self.data[r * self.cols + c]
    }

    pub fn set(&mut self, r: usize, c: usize, value: Expr) {
        self.data[r * self.cols + c] = value;
    }

    pub fn row(&self, r: usize) -> &[Expr] {
        &self.data[r * self.cols..(r + 1) * self.cols]
    }

    pub fn rows_iter(&self) -> impl Iterator<Item = &[Expr]> {
        self.data.chunks(self.cols.max(1)).take(self.rows)
    }

    /// Flat entry access for vectors (row or column), in row-major order.
    pub fn entry(&self, i: usize) -> &Expr {
        &self.data[i]
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn transpose(&self) -> Matrix {
        let mut out = Matrix::zeros(self.cols, self.rows);
        for r in 0..self.rows {
            for c in 0..self.cols {
                out.set(c, r, self.get(r, c).clone());
            }
        }
        out
    }

    pub fn append_row(&self, row: Vec<Expr>) -> Result<Matrix> {
        if self.rows > 0 && row.len() != self.cols {
            return Err(AnalysisError::InvalidDimension {
                expected: self.cols,
                got: row.len(),
            });
        }
        let cols = if self.rows == 0 { row.len() } else { self.cols };
        let mut data = self.data.clone();
        data.extend(row);
        Ok(Matrix {
            rows: self.rows + 1,
            cols,
            data,
        })
    }

    pub fn append_col(&self, col: Vec<Expr>) -> Result<Matrix> {
        if col.len() != self.rows {
            return Err(AnalysisError::InvalidDimension {
                expected: self.rows,
                got: col.len(),
            });
        }
        let mut out = Matrix::zeros(self.rows, self.cols + 1);
        for r in 0..self.rows {
            for c in 0..self.cols {
                out.set(r, c, self.get(r, c).clone());
            }
            out.set(r, self.cols, col[r].clone());
        }
        Ok(out)
    }

    /// New matrix keeping only the rows whose index is absent from `drop`.
    pub fn without_rows(&self, drop: &[usize]) -> Matrix {
        let kept: Vec<usize> = (0..self.rows).filter(|r| !drop.contains(r)).collect();
        let mut data = Vec::with_capacity(kept.len() * self.cols);
        for &r in &kept {
            data.extend_from_slice(self.row(r));
        }
        Matrix {
            rows: kept.len(),
            cols: self.cols,
            data,
        }
    }

    /// New matrix keeping only the columns whose index is absent from `drop`.
    pub fn without_cols(&self, drop: &[usize]) -> Matrix {
        let kept: Vec<usize> = (0..self.cols).filter(|c| !drop.contains(c)).collect();
        let mut data = Vec::with_capacity(self.rows * kept.len());
        for r in 0..self.rows {
            for &c in &kept {
                data.push(self.get(r, c).clone());
            }
        }
        Matrix {
            rows: self.rows,
            cols: kept.len(),
            data,
        }
    }

    pub fn scale(&self, factor: &Expr) -> Matrix {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|e| e * factor).collect(),
        }
    }

    pub fn add(&self, other: &Matrix) -> Result<Matrix> {
        if self.rows != other.rows || self.cols != other.cols {
            return Err(AnalysisError::InvalidDimension {
                expected: self.rows * self.cols,
                got: other.rows * other.cols,
            });
        }
        Ok(Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self
                .data
                .iter()
                .zip(other.data.iter())
                .map(|(a, b)| a + b)
                .collect(),
        })
    }

    pub fn mul(&self, other: &Matrix) -> Result<Matrix> {
        if self.cols != other.rows {
            return Err(AnalysisError::InvalidDimension {
                expected: self.cols,
                got: other.rows,
            });
        }
        let mut out = Matrix::zeros(self.rows, other.cols);
        for r in 0..self.rows {
            for c in 0..other.cols {
                let mut acc = Expr::zero();
                for k in 0..self.cols {
                    acc = &acc + &(self.get(r, k) * other.get(k, c));
                }
                out.set(r, c, acc);
            }
        }
        Ok(out)
    }

    pub fn is_zero_matrix(&self) -> bool {
        self.data.iter().all(|e| e.is_zero())
    }

    /// Swaps two entries of a vector, or two rows of a wider matrix.
    pub fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        for c in 0..self.cols {
            self.data.swap(a * self.cols + c, b * self.cols + c);
        }
    }

    /// Reduced row echelon form together with the pivot columns.
    pub fn rref(&self) -> (Matrix, Vec<usize>) {
        let mut m = self.clone();
        let mut pivots = Vec::new();
        let mut lead = 0usize;
        for col in 0..m.cols {
            if lead >= m.rows {
                break;
            }
            let pivot_row = (lead..m.rows).find(|&r| !m.get(r, col).is_zero());
            let pivot_row = match pivot_row {
                Some(r) => r,
                None => continue,
            };
            m.swap_rows(lead, pivot_row);
            let pivot = m.get(lead, col).clone();
            for c in 0..m.cols {
                let v = m.get(lead, c) / &pivot;
                m.set(lead, c, v);
            }
            for r in 0..m.rows {
                if r != lead && !m.get(r, col).is_zero() {
                    let factor = m.get(r, col).clone();
                    for c in 0..m.cols {
                        let v = m.get(r, c) - &(&factor * m.get(lead, c));
                        m.set(r, c, v);
                    }
                }
            }
            pivots.push(col);
            lead += 1;
        }
        (m, pivots)
    }

    pub fn rank(&self) -> usize {
        self.rref().1.len()
    }

    /// Basis of the right nullspace, as column vectors ordered by ascending
    /// free column with a unit entry at the free column.
    pub fn nullspace(&self) -> Vec<Matrix> {
        let (reduced, pivots) = self.rref();
        let free: Vec<usize> = (0..self.cols).filter(|c| !pivots.contains(c)).collect();
        let mut basis = Vec::with_capacity(free.len());
        for &j in &free {
            let mut vec = vec![Expr::zero(); self.cols];
            vec[j] = Expr::one();
            for (i, &pc) in pivots.iter().enumerate() {
                vec[pc] = -reduced.get(i, j);
            }
            basis.push(Matrix::col_vector(vec));
        }
        basis
    }

    /// Nonzero rows of the reduced echelon form.
    pub fn rowspace(&self) -> Vec<Matrix> {
        let (reduced, pivots) = self.rref();
        (0..pivots.len())
            .map(|r| Matrix::row_vector(reduced.row(r).to_vec()))
            .collect()
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Matrix([")?;
        for r in 0..self.rows {
            if r > 0 {
                f.write_str(", ")?;
            }
            f.write_str("[")?;
            for c in 0..self.cols {
                if c > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", self.get(r, c))?;
            }
            f.write_str("]")?;
        }
        f.write_str("])")
    }
}

impl fmt::Debug for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parse_expr;

    fn e(s: &str) -> Expr {
        parse_expr(s).unwrap()
    }

    fn m(rows: &[&[&str]]) -> Matrix {
        Matrix::from_rows(
            rows.iter()
                .map(|r| r.iter().map(|s| e(s)).collect())
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_rref_identity() {
        let mat = m(&[&["1", "2"], &["3", "4"]]);
        let (r, pivots) = mat.rref();
        assert_eq!(pivots, vec![0, 1]);
        assert_eq!(r, m(&[&["1", "0"], &["0", "1"]]));
    }

    #[test]
    fn test_nullspace_basis_convention() {
        // x + 2y + 3z = 0 has free columns 1 and 2.
        let mat = m(&[&["1", "2", "3"]]);
        let ns = mat.nullspace();
        assert_eq!(ns.len(), 2);
        assert_eq!(ns[0].entry(0), &e("-2"));
        assert_eq!(ns[0].entry(1), &e("1"));
        assert_eq!(ns[0].entry(2), &e("0"));
        assert_eq!(ns[1].entry(0), &e("-3"));
        assert_eq!(ns[1].entry(2), &e("1"));
    }

    #[test]
    fn test_nullspace_symbolic() {
        let mat = m(&[&["b", "1"]]);
        let ns = mat.nullspace();
        assert_eq!(ns.len(), 1);
        assert_eq!(ns[0].entry(0), &e("-1/b"));
        assert_eq!(ns[0].entry(1), &e("1"));
        // The vector really is in the kernel.
        let prod = mat.mul(&ns[0]).unwrap();
        assert!(prod.is_zero_matrix());
    }

    #[test]
    fn test_rank_and_rowspace() {
        let mat = m(&[&["1", "2"], &["2", "4"], &["0", "1"]]);
        assert_eq!(mat.rank(), 2);
        assert_eq!(mat.rowspace().len(), 2);
    }

    #[test]
    fn test_row_col_removal() {
        let mat = m(&[&["1", "2", "3"], &["4", "5", "6"]]);
        let out = mat.without_rows(&[0]).without_cols(&[1]);
        assert_eq!(out, m(&[&["4", "6"]]));
    }
}
