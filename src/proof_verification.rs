//! Verification of generated proofs by symbolic evaluation.
//!
//! Every key and ciphertext polynomial is re-evaluated with its variables
//! replaced by the proof's substitution matrices and vectors. Operand
//! order matters: common-variable substitutions are matrices and apply on
//! the matrix side, non-lone substitutions on the vector side, so key
//! monomials evaluate as matrix times column vector and ciphertext
//! monomials as row vector times matrix. The proof verifies only if every
//! evaluation is the zero matrix and both distinguished vectors exist.

use crate::expr::{Expr, Monomial};
use crate::matrix::Matrix;
use crate::proof_generation::Proof;
use crate::symbol::Symbol;

enum Evaluated {
    Scalar(Expr),
    Mat(Matrix),
}

fn lookup<'a>(subs: &'a [(Expr, Matrix)], sym: &Symbol) -> Option<&'a Matrix> {
    let expr = Expr::from_symbol(sym.clone());
    subs.iter().find(|(v, _)| v == &expr).map(|(_, m)| m)
}

fn is_benc(benc: &[Expr], sym: &Symbol) -> bool {
    benc.contains(&Expr::from_symbol(sym.clone()))
}

/// Evaluates one monomial under the substitutions. At most two factors may
/// carry substitutions (the AC17 form guarantees this); the common
/// variable's matrix is placed on the matrix side according to the side of
/// the encoding.
fn eval_monomial(
    is_key_encoding: bool,
    mono: &Monomial,
    coeff: &Expr,
    subs: &[(Expr, Matrix)],
    benc: &[Expr],
) -> Option<Evaluated> {
    let mut scalar = coeff.clone();
    let mut substituted: Vec<(Symbol, &Matrix)> = Vec::new();
    for (sym, exp) in mono.powers() {
        match lookup(subs, sym) {
            Some(mat) => {
                if exp != 1 {
                    return None;
                }
                substituted.push((sym.clone(), mat));
            }
            None => {
                let factor = Expr::from_monomial(Monomial::from_powers([(sym.clone(), exp)]));
                scalar = &scalar * &factor;
            }
        }
    }
    match substituted.len() {
        0 => Some(Evaluated::Scalar(scalar)),
        1 => Some(Evaluated::Mat(substituted[0].1.scale(&scalar))),
        2 => {
            let (a, b) = (&substituted[0], &substituted[1]);
            let (first, second) = if is_key_encoding {
                // Matrix times column vector: the common variable leads.
                if is_benc(benc, &a.0) {
                    (a.1, b.1)
                } else {
                    (b.1, a.1)
                }
            } else {
                // Row vector times matrix: the common variable trails.
                if is_benc(benc, &a.0) {
                    (b.1, a.1)
                } else {
                    (a.1, b.1)
                }
            };
            first.mul(second).ok().map(|m| Evaluated::Mat(m.scale(&scalar)))
        }
        _ => None,
    }
}

/// Evaluates a full encoding polynomial; `None` on any shape mismatch.
fn eval_poly(
    is_key_encoding: bool,
    poly: &Expr,
    subs: &[(Expr, Matrix)],
    benc: &[Expr],
) -> Option<Matrix> {
    if !poly.is_polynomial() {
        return None;
    }
    let mut acc: Option<Matrix> = None;
    for (mono, coeff) in poly.numerator().terms() {
        let coeff = Expr::from_rational(coeff.clone());
        let term = eval_monomial(is_key_encoding, mono, &coeff, subs, benc)?;
        let mat = match term {
            Evaluated::Mat(m) => m,
            Evaluated::Scalar(_) => return None,
        };
        acc = Some(match acc {
            None => mat,
            Some(prev) => prev.add(&mat).ok()?,
        });
    }
    acc
}

/// Whether the encoding entry involves a common variable or a lone
/// variable, i.e. whether substitution produces a matrix identity to
/// check.
fn is_poly(entry: &Expr, benc: &[Expr], lones: &[(Expr, Matrix)]) -> bool {
    entry.symbols().iter().any(|sym| {
        let as_expr = Expr::from_symbol(sym.clone());
        benc.contains(&as_expr) || lones.iter().any(|(v, _)| v == &as_expr)
    })
}

/// Bare variables and constants are skipped; sums and products are
/// evaluated.
fn has_multiple_args(entry: &Expr) -> bool {
    if !entry.is_polynomial() {
        return true;
    }
    if entry.numerator().num_terms() > 1 {
        return true;
    }
    match entry.numerator().terms().next() {
        None => false,
        Some((mono, coeff)) => {
            use num_traits::One;
            let coeff_parts = usize::from(!coeff.is_one());
            mono.factor_count() + coeff_parts > 1
        }
    }
}

/// Checks whether the symbolic property holds for the proof. Returns the
/// verification result and the process log.
pub fn verify_proof(
    masterkey: &Expr,
    special_s: &Expr,
    kenc: &[Expr],
    cenc: &[Expr],
    benc: &[Expr],
    proof: &Proof,
) -> (bool, String) {
    let mut process_log: Vec<String> = Vec::new();

    let substitutions: Vec<(Expr, Matrix)> = proof
        .rvectors_nonlone
        .iter()
        .chain(proof.rvectors_lone.iter())
        .chain(proof.benc_mats.iter())
        .chain(proof.svectors_nonlone.iter())
        .chain(proof.svectors_lone.iter())
        .cloned()
        .collect();

    let masterkey_entry = proof.rvectors_lone.iter().find(|(k, _)| k == masterkey);
    let special_s_entry = proof.svectors_nonlone.iter().find(|(c, _)| c == special_s);

    let mut verifies_correctly = true;

    let blinding_nonzero = match (
        masterkey_entry.or(proof.rvectors_lone.first()),
        special_s_entry.or(proof.svectors_nonlone.first()),
    ) {
        (Some((_, mk_vec)), Some((_, s_vec))) => s_vec
            .mul(mk_vec)
            .map(|prod| !prod.is_zero_matrix())
            .unwrap_or(false),
        _ => false,
    };
    if !blinding_nonzero || masterkey_entry.is_none() || special_s_entry.is_none() {
        verifies_correctly = false;
        process_log.push(format!(
            "\n The proof does not verify correctly, because masterkey * special_s = \
             {masterkey} * {special_s} = 0. \n"
        ));
    }

    for k in kenc {
        if has_multiple_args(k) && is_poly(k, benc, &proof.rvectors_lone) {
            let ok = eval_poly(true, k, &substitutions, benc)
                .map(|m| m.is_zero_matrix())
                .unwrap_or(false);
            if !ok {
                process_log.push(format!(
                    "\n The proof does not verify correctly, because {k} != 0 \n"
                ));
                verifies_correctly = false;
            }
        }
    }
    for c in cenc {
        if has_multiple_args(c) && is_poly(c, benc, &proof.svectors_lone) {
            let ok = eval_poly(false, c, &substitutions, benc)
                .map(|m| m.is_zero_matrix())
                .unwrap_or(false);
            if !ok {
                process_log.push(format!(
                    "\n The proof does not verify correctly, because {c} != 0 \n"
                ));
                verifies_correctly = false;
            }
        }
    }

    (verifies_correctly, process_log.join("\n"))
}

/// Collusion check on top of [`verify_proof`]: the master-key and
/// special-s substitution vectors must be of the form (nonzero, 0, .., 0).
pub fn verify_collusion_security_only(
    masterkey: &Expr,
    special_s: &Expr,
    kenc: &[Expr],
    cenc: &[Expr],
    benc: &[Expr],
    proof: &Proof,
) -> (bool, String) {
    let (mut result, process_log) = verify_proof(masterkey, special_s, kenc, cenc, benc, proof);
    if result {
        if let Some((_, mk_vec)) = proof.rvectors_lone.iter().find(|(k, _)| k == masterkey) {
            let correct = !mk_vec.entry(0).is_zero()
                && (1..mk_vec.len()).all(|i| mk_vec.entry(i).is_zero());
            if !correct {
                result = false;
            }
        }
        if let Some((_, s_vec)) = proof.svectors_nonlone.iter().find(|(c, _)| c == special_s) {
            let correct = !s_vec.entry(0).is_zero()
                && (1..s_vec.len()).all(|i| s_vec.entry(i).is_zero());
            if !correct {
                result = false;
            }
        }
    }
    (result, process_log)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parse_expr;
    use crate::proof_generation::{
        generate_proof_co_selective, generate_proof_selective, normalize_substitutions,
    };

    fn e(s: &str) -> Expr {
        parse_expr(s).unwrap()
    }

    fn exprs(names: &[&str]) -> Vec<Expr> {
        names.iter().map(|n| e(n)).collect()
    }

    fn wat11() -> (Vec<Expr>, Vec<Expr>, Vec<Expr>, Vec<Expr>) {
        let k = vec![e("alpha + r*b"), e("r*b0"), e("r")];
        let c = vec![
            e("s*b - s1*b + sp*b1"),
            e("s"),
            e("sp"),
            e("s1*b + sp*b2"),
        ];
        let mpk = exprs(&["b0", "b1", "b", "b2"]);
        let unknown = exprs(&["alpha", "b", "b0", "b1", "b2", "r", "s", "s1", "sp"]);
        (k, c, mpk, unknown)
    }

    #[test]
    fn test_selective_proof_verifies() {
        let (k, c, mpk, unknown) = wat11();
        let (alpha, s) = (e("alpha"), e("s"));
        let proof = generate_proof_selective(&alpha, &s, &k, &c, &mpk, &unknown).unwrap();
        let proof = normalize_substitutions(&alpha, &s, proof);
        let (ok, log) = verify_proof(&alpha, &s, &k, &c, &mpk, &proof);
        assert!(ok, "log: {log}");
    }

    #[test]
    fn test_co_selective_proof_verifies() {
        let (k, c, mpk, unknown) = wat11();
        let (alpha, s) = (e("alpha"), e("s"));
        let proof = generate_proof_co_selective(&alpha, &s, &k, &c, &mpk, &unknown).unwrap();
        let proof = normalize_substitutions(&alpha, &s, proof);
        let (ok, log) = verify_proof(&alpha, &s, &k, &c, &mpk, &proof);
        assert!(ok, "log: {log}");
    }

    #[test]
    fn test_verification_is_idempotent() {
        let (k, c, mpk, unknown) = wat11();
        let (alpha, s) = (e("alpha"), e("s"));
        let proof = generate_proof_selective(&alpha, &s, &k, &c, &mpk, &unknown).unwrap();
        let proof = normalize_substitutions(&alpha, &s, proof);
        let (first, _) = verify_proof(&alpha, &s, &k, &c, &mpk, &proof);
        let (second, _) = verify_proof(&alpha, &s, &k, &c, &mpk, &proof);
        assert_eq!(first, second);
    }
}
