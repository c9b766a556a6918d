//! Property tests for the decomposition invariants: exact reconstruction
//! and append-only basis growth.

use proptest::prelude::*;

use pairenc::decompose::{decompose_encoding, decompose_poly, MonomialBasis};
use pairenc::{Expr, Monomial, Symbol};

const POOL: [&str; 6] = ["alpha", "b", "r", "s", "x", "y"];

#[derive(Clone, Debug)]
struct RawTerm {
    coeff: i64,
    vars: Vec<usize>,
}

fn term_strategy() -> impl Strategy<Value = RawTerm> {
    (
        -5i64..=5,
        proptest::collection::vec(0..POOL.len(), 0..3),
    )
        .prop_map(|(coeff, vars)| RawTerm { coeff, vars })
}

fn poly_strategy() -> impl Strategy<Value = Vec<RawTerm>> {
    proptest::collection::vec(term_strategy(), 1..5)
}

fn build_expr(terms: &[RawTerm]) -> Expr {
    let mut acc = Expr::zero();
    for term in terms {
        let mut product = Expr::from_int(term.coeff);
        for &v in &term.vars {
            product = &product * &Expr::symbol(POOL[v]);
        }
        acc = &acc + &product;
    }
    acc
}

fn unknown_subset(mask: u8) -> Vec<Symbol> {
    POOL.iter()
        .enumerate()
        .filter(|(i, _)| mask & (1 << i) != 0)
        .map(|(_, name)| Symbol::new(name))
        .collect()
}

fn reconstruct(row: &[Expr], basis: &MonomialBasis) -> Expr {
    let mut acc = Expr::zero();
    for (coeff, mono) in row.iter().zip(basis.entries()) {
        acc = &acc + &(coeff * &Expr::from_monomial(mono.clone()));
    }
    acc
}

proptest! {
    #[test]
    fn prop_decomposition_reconstructs_exactly(
        polys in proptest::collection::vec(poly_strategy(), 1..4),
        mask in 0u8..64,
    ) {
        let encoding: Vec<Expr> = polys.iter().map(|t| build_expr(t)).collect();
        let unknown = unknown_subset(mask);
        let (rows, basis) = decompose_encoding(&encoding, &unknown);
        for (row, poly) in rows.iter().zip(encoding.iter()) {
            prop_assert_eq!(&reconstruct(row, &basis), poly);
        }
    }

    #[test]
    fn prop_basis_is_append_only(
        first in poly_strategy(),
        second in poly_strategy(),
        mask in 0u8..64,
    ) {
        let unknown = unknown_subset(mask);
        let mut basis = MonomialBasis::new();
        decompose_poly(&build_expr(&first), &mut basis, &unknown);
        let snapshot: Vec<Monomial> = basis.entries().to_vec();
        decompose_poly(&build_expr(&second), &mut basis, &unknown);
        prop_assert!(basis.len() >= snapshot.len());
        prop_assert_eq!(&basis.entries()[..snapshot.len()], &snapshot[..]);
    }

    #[test]
    fn prop_rows_padded_to_basis_width(
        polys in proptest::collection::vec(poly_strategy(), 1..4),
        mask in 0u8..64,
    ) {
        let encoding: Vec<Expr> = polys.iter().map(|t| build_expr(t)).collect();
        let unknown = unknown_subset(mask);
        let (rows, basis) = decompose_encoding(&encoding, &unknown);
        for row in &rows {
            prop_assert_eq!(row.len(), basis.len());
        }
    }
}
