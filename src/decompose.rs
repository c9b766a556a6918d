//! Decomposition of encodings over a discovered monomial basis.
//!
//! Every polynomial is split monomial by monomial into a known-variable
//! coefficient and an unknown-variable monomial (the "uvector" entry). The
//! basis is append-only: decomposing further polynomials against the same
//! basis never removes or reorders existing entries, so coefficient rows
//! emitted earlier stay valid and only need zero-padding to the final
//! width.

use num_rational::BigRational;

use crate::expr::{Expr, Monomial, Poly};
use crate::matrix::Matrix;
use crate::symbol::Symbol;

/// Ordered, deduplicated sequence of unknown-only monomials.
#[derive(Clone, Default, PartialEq)]
pub struct MonomialBasis {
    entries: Vec<Monomial>,
}

impl MonomialBasis {
    pub fn new() -> Self {
        MonomialBasis::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Monomial] {
        &self.entries
    }

    pub fn get(&self, i: usize) -> &Monomial {
        &self.entries[i]
    }

    pub fn position(&self, mono: &Monomial) -> Option<usize> {
        self.entries.iter().position(|m| m == mono)
    }

    /// Index of `mono`, appending it when absent.
    pub fn find_or_insert(&mut self, mono: Monomial) -> usize {
        match self.position(&mono) {
            Some(i) => i,
            None => {
                self.entries.push(mono);
                self.entries.len() - 1
            }
        }
    }

    /// Explicit caller-invoked reorder: moves `mono` to index 0, shifting
    /// the prefix right. Returns false (leaving the basis untouched) when
    /// the entry is absent.
    pub fn move_to_front(&mut self, mono: &Monomial) -> bool {
        match self.position(mono) {
            Some(0) => true,
            Some(i) => {
                let entry = self.entries.remove(i);
                self.entries.insert(0, entry);
                true
            }
            None => false,
        }
    }

    pub fn without_indices(&self, drop: &[usize]) -> MonomialBasis {
        MonomialBasis {
            entries: self
                .entries
                .iter()
                .enumerate()
                .filter(|(i, _)| !drop.contains(i))
                .map(|(_, m)| m.clone())
                .collect(),
        }
    }
}

impl std::fmt::Display for MonomialBasis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[")?;
        for (i, m) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{m}")?;
        }
        f.write_str("]")
    }
}

impl std::fmt::Debug for MonomialBasis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

/// Splits one monomial into its unknown part and the known coefficient
/// contribution.
fn split_monomial(
    mono: &Monomial,
    coeff: &BigRational,
    den: &[Poly],
    unknown: &[Symbol],
) -> (Monomial, Expr) {
    let mut known = Vec::new();
    let mut unk = Vec::new();
    for (sym, exp) in mono.powers() {
        if unknown.contains(sym) {
            unk.push((sym.clone(), exp));
        } else {
            known.push((sym.clone(), exp));
        }
    }
    let mut coeff_expr =
        Expr::from_poly(Poly::from_term(Monomial::from_powers(known), coeff.clone()));
    for factor in den {
        let factor_expr = Expr::from_poly(factor.clone());
        coeff_expr = &coeff_expr / &factor_expr;
    }
    (Monomial::from_powers(unk), coeff_expr)
}

/// Decomposes one polynomial against `basis`, extending it as needed.
/// The returned row satisfies `Σ row[j] * basis[j] == poly` exactly.
pub fn decompose_poly(poly: &Expr, basis: &mut MonomialBasis, unknown: &[Symbol]) -> Vec<Expr> {
    let mut row = vec![Expr::zero(); basis.len()];
    let den = poly.den_factors().to_vec();
    // Leading terms first; the traversal order fixes the basis order.
    for (mono, coeff) in poly.numerator().terms().rev() {
        let (unk, coeff_expr) = split_monomial(mono, coeff, &den, unknown);
        let idx = basis.find_or_insert(unk);
        if idx >= row.len() {
            row.resize(idx + 1, Expr::zero());
        }
        row[idx] = &row[idx] + &coeff_expr;
    }
    row.resize(basis.len(), Expr::zero());
    row
}

/// Decomposes a full encoding against a fresh basis; all rows are padded to
/// the final basis width.
pub fn decompose_encoding(encoding: &[Expr], unknown: &[Symbol]) -> (Vec<Vec<Expr>>, MonomialBasis) {
    let mut basis = MonomialBasis::new();
    let mut rows: Vec<Vec<Expr>> = encoding
        .iter()
        .map(|poly| decompose_poly(poly, &mut basis, unknown))
        .collect();
    for row in &mut rows {
        row.resize(basis.len(), Expr::zero());
    }
    (rows, basis)
}

pub fn rows_to_matrix(rows: Vec<Vec<Expr>>) -> Matrix {
    Matrix::from_rows(rows).expect("decomposition rows share the basis width")
}

/// Unknown-containing denominator factors across an encoding list,
/// deduplicated structurally.
pub fn collect_denoms(list: &[Expr], unknown: &[Symbol]) -> Vec<Poly> {
    let mut denoms: Vec<Poly> = Vec::new();
    for expr in list {
        for factor in expr.den_factors() {
            if factor.contains_any(unknown) && !denoms.contains(factor) {
                denoms.push(factor.clone());
            }
        }
    }
    denoms
}

pub fn denoms_prod(denoms: &[Poly]) -> Expr {
    let mut prod = Expr::one();
    for d in denoms {
        prod = &prod * &Expr::from_poly(d.clone());
    }
    prod
}

/// Multiplies every element through by `denomprod`, re-cancelling.
pub fn transform_encoding_list(denomprod: &Expr, list: &[Expr]) -> Vec<Expr> {
    list.iter().map(|p| p * denomprod).collect()
}

/// All pairwise products a generic-group attacker can form, in the fixed
/// order k*c, k*mpk, c*mpk, c*gp, k*gp.
pub fn gen_all_products(k: &[Expr], c: &[Expr], mpk: &[Expr], gp: &[Expr]) -> Vec<Expr> {
    let mut out = Vec::new();
    for i in k {
        for j in c {
            out.push(i * j);
        }
    }
    for i in k {
        for j in mpk {
            out.push(i * j);
        }
    }
    for i in c {
        for j in mpk {
            out.push(i * j);
        }
    }
    for i in c {
        for j in gp {
            out.push(i * j);
        }
    }
    for i in k {
        for j in gp {
            out.push(i * j);
        }
    }
    out
}

/// Result of the size-reduction pass over an attack matrix.
pub struct TrimResult {
    pub matrix: Matrix,
    pub basis: MonomialBasis,
    /// Deleted row indices of the input matrix, ascending. The last row
    /// (the appended target) is never deleted.
    pub dropped_rows: Vec<usize>,
    /// Deleted column indices of the input matrix, ascending.
    pub dropped_cols: Vec<usize>,
}

/// Removes every basis column touched by exactly one row, together with
/// that row. A single pass over the columns; fresh index sets are built
/// instead of deleting in place.
pub fn trim_matrix_and_basis(mat: &Matrix, basis: &MonomialBasis) -> TrimResult {
    let nr_rows = mat.nrows();
    let nr_cols = mat.ncols();
    let mut rows_to_delete: Vec<usize> = Vec::new();
    let mut cols_to_delete: Vec<usize> = Vec::new();
    for col in 0..nr_cols {
        let touching: Vec<usize> = (0..nr_rows)
            .filter(|&r| !mat.get(r, col).is_zero())
            .collect();
        if touching.len() == 1 {
            let row = touching[0];
            if !rows_to_delete.contains(&row) {
                rows_to_delete.push(row);
            }
            cols_to_delete.push(col);
        }
    }
    // The appended target row is exempt from deletion.
    let mut dropped_rows: Vec<usize> = rows_to_delete
        .into_iter()
        .filter(|&r| r + 1 != nr_rows)
        .collect();
    dropped_rows.sort_unstable();
    let matrix = mat.without_rows(&dropped_rows).without_cols(&cols_to_delete);
    let trimmed_basis = basis.without_indices(&cols_to_delete);
    TrimResult {
        matrix,
        basis: trimmed_basis,
        dropped_rows,
        dropped_cols: cols_to_delete,
    }
}

/// Order-preserving union of two expression lists.
pub fn merge_lists(a: &[Expr], b: &[Expr]) -> Vec<Expr> {
    let mut out: Vec<Expr> = Vec::new();
    for e in a.iter().chain(b.iter()) {
        if !out.contains(e) {
            out.push(e.clone());
        }
    }
    out
}

/// Distinct symbols occurring in a polynomial, in name order.
pub fn get_vars_polynomial(poly: &Expr) -> Vec<Symbol> {
    poly.symbols().into_iter().collect()
}

pub fn get_vars_list_polynomials(polys: &[Expr]) -> Vec<Symbol> {
    let mut out: Vec<Symbol> = Vec::new();
    for poly in polys {
        for sym in poly.symbols() {
            if !out.contains(&sym) {
                out.push(sym);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parse_expr;

    fn e(s: &str) -> Expr {
        parse_expr(s).unwrap()
    }

    fn syms(names: &[&str]) -> Vec<Symbol> {
        names.iter().map(|n| Symbol::new(n)).collect()
    }

    fn reconstruct(row: &[Expr], basis: &MonomialBasis) -> Expr {
        let mut acc = Expr::zero();
        for (coeff, mono) in row.iter().zip(basis.entries()) {
            acc = &acc + &(coeff * &Expr::from_monomial(mono.clone()));
        }
        acc
    }

    #[test]
    fn test_decompose_reconstructs() {
        let unknown = syms(&["alpha", "b", "r", "s"]);
        let polys = [e("alpha + r*b"), e("r*b + x*s"), e("s")];
        let (rows, basis) = decompose_encoding(&polys, &unknown);
        for (row, poly) in rows.iter().zip(polys.iter()) {
            assert_eq!(&reconstruct(row, &basis), poly);
        }
    }

    #[test]
    fn test_basis_append_only() {
        let unknown = syms(&["alpha", "r"]);
        let mut basis = MonomialBasis::new();
        decompose_poly(&e("alpha + r"), &mut basis, &unknown);
        let before: Vec<Monomial> = basis.entries().to_vec();
        decompose_poly(&e("r + alpha*r"), &mut basis, &unknown);
        assert_eq!(&basis.entries()[..before.len()], &before[..]);
        assert_eq!(basis.len(), 3);
    }

    #[test]
    fn test_known_coefficient_extraction() {
        let unknown = syms(&["s"]);
        let mut basis = MonomialBasis::new();
        let row = decompose_poly(&e("x2*b2*s"), &mut basis, &unknown);
        assert_eq!(basis.len(), 1);
        assert_eq!(basis.get(0), &Monomial::symbol(Symbol::new("s")));
        assert_eq!(row[0], e("x2*b2"));
    }

    #[test]
    fn test_collect_denoms_only_unknown() {
        let unknown = syms(&["b1"]);
        let list = [e("alpha/(b1 + x3)"), e("y/x1")];
        let denoms = collect_denoms(&list, &unknown);
        assert_eq!(denoms.len(), 1);
        assert_eq!(Expr::from_poly(denoms[0].clone()), e("b1 + x3"));
    }

    #[test]
    fn test_trim_single_touch_column() {
        let unknown = syms(&["a", "b", "t"]);
        let (rows, basis) = decompose_encoding(&[e("a + b"), e("b + t"), e("t")], &unknown);
        let mat = rows_to_matrix(rows);
        // Column "a" is touched only by row 0, so both disappear; the last
        // row is protected even though it is the only one touching nothing
        // new here.
        let trimmed = trim_matrix_and_basis(&mat, &basis);
        assert!(trimmed.dropped_cols.contains(&basis.position(&Monomial::symbol(Symbol::new("a"))).unwrap()));
        assert!(trimmed.dropped_rows.contains(&0));
        assert!(!trimmed.dropped_rows.contains(&2));
    }

    #[test]
    fn test_fully_known_monomial_hits_unit_entry() {
        let unknown = syms(&["s"]);
        let mut basis = MonomialBasis::new();
        let row = decompose_poly(&e("x1*x3"), &mut basis, &unknown);
        assert_eq!(basis.get(0), &Monomial::one());
        assert_eq!(row[0], e("x1*x3"));
    }
}
