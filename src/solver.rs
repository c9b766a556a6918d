//! The nullspace attack engine.
//!
//! Given a target value and the attacker-reachable products, the solver
//! clears unknown-containing denominators, decomposes everything over one
//! shared monomial basis, appends the target as an extra row and searches
//! the left nullspace for a vector with a nonzero entry at the target row.
//! The first such vector, rescaled so the target coefficient is one, is
//! the attack.

use tracing::debug;

use crate::decompose::{
    collect_denoms, decompose_encoding, decompose_poly, denoms_prod, rows_to_matrix,
    transform_encoding_list, trim_matrix_and_basis,
};
use crate::expr::Expr;
use crate::matrix::Matrix;
use crate::symbol::Symbol;

/// A successful linear reconstruction of the target.
#[derive(Clone, Debug)]
pub struct AttackSolution {
    /// Coefficient per kept product row, aligned with `kept_indices`.
    pub coefficients: Vec<Expr>,
    /// Indices into the original product list that survived trimming.
    pub kept_indices: Vec<usize>,
}

/// Symbols of the unknown set. Non-symbol unknown entries can never match
/// a monomial factor and are ignored.
pub fn unknown_symbols(unknown: &[Expr]) -> Vec<Symbol> {
    unknown.iter().filter_map(|e| e.as_symbol()).collect()
}

/// Searches for a linear combination of `products` equal to `target`.
///
/// Denominators containing unknowns are cleared by multiplying everything
/// with the squared product of collected denominator factors; products are
/// already pairwise products, so the square is what guarantees a
/// denominator-free matrix. Returns `None` when the target reaches outside
/// the attacker's monomial space or no qualifying nullspace vector exists.
pub fn solve_linear_attack(
    target: &Expr,
    products: &[Expr],
    unknown: &[Expr],
) -> Option<AttackSolution> {
    let unknown_syms = unknown_symbols(unknown);

    let denoms = collect_denoms(products, &unknown_syms);
    let dprod = denoms_prod(&denoms);
    let d2 = &dprod * &dprod;
    let cleared = transform_encoding_list(&d2, products);
    let cleared_target = target * &d2;

    let (rows, mut basis) = decompose_encoding(&cleared, &unknown_syms);
    let width_before = basis.len();
    let target_row = decompose_poly(&cleared_target, &mut basis, &unknown_syms);
    if basis.len() != width_before {
        // The target contains monomials unreachable from the products.
        debug!(
            new_monomials = basis.len() - width_before,
            "target outside the attacker's monomial space"
        );
        return None;
    }

    let mat = rows_to_matrix(rows);
    let mat2 = mat
        .append_row(target_row)
        .expect("target row has the shared basis width");

    let trimmed = trim_matrix_and_basis(&mat2, &basis);
    let reduced = trimmed.matrix;
    debug!(
        rows = reduced.nrows(),
        cols = reduced.ncols(),
        dropped_rows = trimmed.dropped_rows.len(),
        "attack matrix after trimming"
    );

    let nullspace = reduced.transpose().nullspace();
    let solution = first_attack_vector(&nullspace)?;

    // Soundness: the combination of kept product rows must reconstruct the
    // target row exactly.
    let target_idx = reduced.nrows() - 1;
    let mut check = vec![Expr::zero(); reduced.ncols()];
    for (i, coeff) in solution.iter().enumerate() {
        for (c, entry) in check.iter_mut().enumerate() {
            *entry = &*entry + &(coeff * reduced.get(i, c));
        }
    }
    let reconstructs = (0..reduced.ncols()).all(|c| &check[c] == reduced.get(target_idx, c));
    if !reconstructs {
        return None;
    }

    let kept_indices: Vec<usize> = (0..products.len())
        .filter(|i| !trimmed.dropped_rows.contains(i))
        .collect();
    Some(AttackSolution {
        coefficients: solution,
        kept_indices,
    })
}

/// First nullspace vector with a nonzero entry at the target (last)
/// position, normalized so the target coefficient is one and dropped from
/// the returned vector.
fn first_attack_vector(nullspace: &[Matrix]) -> Option<Vec<Expr>> {
    for vec in nullspace {
        let last = vec.len().checked_sub(1)?;
        let target_coeff = vec.entry(last);
        if !target_coeff.is_zero() {
            let sol = (0..last)
                .map(|i| &(-vec.entry(i)) / target_coeff)
                .collect();
            return Some(sol);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parse_expr;

    fn e(s: &str) -> Expr {
        parse_expr(s).unwrap()
    }

    fn unknowns(names: &[&str]) -> Vec<Expr> {
        names.iter().map(|n| e(n)).collect()
    }

    #[test]
    fn test_simple_reconstruction() {
        // k0 - b*k1 = alpha for k0 = alpha + r*b, k1 = r, with b known.
        let products = [e("alpha + r*b"), e("r")];
        let unknown = unknowns(&["alpha", "r"]);
        let sol = solve_linear_attack(&e("alpha"), &products, &unknown).unwrap();
        let mut acc = Expr::zero();
        for (i, &idx) in sol.kept_indices.iter().enumerate() {
            acc = &acc + &(&sol.coefficients[i] * &products[idx]);
        }
        assert_eq!(acc, e("alpha"));
    }

    #[test]
    fn test_unreachable_target() {
        let products = [e("r"), e("r*b")];
        let unknown = unknowns(&["alpha", "r", "b"]);
        assert!(solve_linear_attack(&e("alpha"), &products, &unknown).is_none());
    }

    #[test]
    fn test_empty_product_space() {
        let unknown = unknowns(&["alpha", "s"]);
        assert!(solve_linear_attack(&e("alpha*s"), &[], &unknown).is_none());
    }

    #[test]
    fn test_denominator_clearing() {
        // A fractional product space in the style of accountable-authority
        // schemes: the denominator b1 + x3 contains the unknown b1 and must
        // be cleared before decomposition.
        let products = [
            e("(alpha*s + x2*b2*s)/(b1 + x3)"),
            e("(alpha*s + x2*b2*s)*b1/(b1 + x3)"),
            e("x1*s*b2"),
        ];
        let unknown = unknowns(&["alpha", "b1", "b2", "s"]);
        let target = e("alpha*s");
        let sol = solve_linear_attack(&target, &products, &unknown).unwrap();
        let mut acc = Expr::zero();
        for (i, &idx) in sol.kept_indices.iter().enumerate() {
            acc = &acc + &(&sol.coefficients[i] * &products[idx]);
        }
        assert_eq!(acc, target);
    }
}
