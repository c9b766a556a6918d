//! Generation of indexed encodings and access-structure shares.
//!
//! Scheme descriptions for conditional attacks use three fixed placeholder
//! symbols: `att_mpk_group` for an attribute's public-key group element,
//! `att_scalar` for an attribute scalar, and `lambda_policy_share` for a
//! policy share of the blinding factor. Instantiation replaces these per
//! attribute (and per key) so the same template yields every concrete
//! encoding the attacker can collect.

use crate::expr::Expr;
use crate::matrix::Matrix;
use crate::symbol::Symbol;

pub const ATT_MPK_GROUP: &str = "att_mpk_group";
pub const ATT_SCALAR: &str = "att_scalar";
pub const POLICY_SHARE: &str = "lambda_policy_share";

/// An indexed encoding placeholder, e.g. `indexed_enc_rp_1`.
pub fn get_indexed_encoding(prefix: &str, index: u32) -> Expr {
    Expr::symbol(&format!("indexed_enc_{prefix}_{index}"))
}

/// Public key `b_att` for the attribute with the given index.
pub fn get_attribute_in_group(index: u32) -> Expr {
    Expr::symbol(&format!("b_{index}"))
}

/// Scalar `x_att` for the attribute with the given index.
pub fn get_attribute_as_scalar(index: u32) -> Expr {
    Expr::symbol(&format!("x_{index}"))
}

/// Share vector (s, v_2, ..., v_n).
pub fn create_share_vector(length: usize, special_s: &Expr) -> Matrix {
    let mut entries = vec![special_s.clone()];
    for i in 1..length {
        entries.push(Expr::symbol(&format!("v_{}", i + 1)));
    }
    Matrix::col_vector(entries)
}

/// Policy matrix for an AND-gate of the given length.
pub fn create_policy_matrix_for_and(length: usize) -> Matrix {
    let mut a = Matrix::zeros(length, length);
    a.set(0, 0, Expr::from_int(1));
    if length > 1 {
        a.set(0, 1, Expr::from_int(1));
        a.set(length - 1, length - 1, Expr::from_int(-1));
    }
    for i in 1..length.saturating_sub(1) {
        a.set(i, i, Expr::from_int(-1));
        a.set(i, i + 1, Expr::from_int(1));
    }
    a
}

/// The i-th share of an AND policy of the given length.
pub fn get_policy_share(index: usize, length: usize, special_s: &Expr) -> Expr {
    let lambda = create_policy_matrix_for_and(length)
        .mul(&create_share_vector(length, special_s))
        .expect("square policy matrix times share vector");
    lambda.entry(index).clone()
}

fn subst(expr: &Expr, replacements: &[(&str, Expr)]) -> Expr {
    let mut out = expr.clone();
    for (name, value) in replacements {
        out = out.substitute_symbol(&Symbol::new(name), value);
    }
    out
}

/// Instantiates the common-variable encodings over the attribute range.
pub fn create_b_encoding(b_fixed: &[Expr], b_att: &[Expr], att_range: &[u32]) -> Vec<Expr> {
    let mut out = b_fixed.to_vec();
    for &a in att_range {
        for enc in b_att {
            out.push(subst(
                enc,
                &[
                    (ATT_MPK_GROUP, get_attribute_in_group(a)),
                    (ATT_SCALAR, get_attribute_as_scalar(a)),
                ],
            ));
        }
    }
    out
}

fn indexed_key_symbol(prefix: &str, n: u32, att: u32, key: u32) -> Expr {
    Expr::symbol(&format!("{prefix}_{n}_att{att}_key{key}"))
}

fn bare_key_symbol(prefix: &str, n: u32, key: u32) -> Expr {
    Expr::symbol(&format!("{prefix}_{n}_key{key}"))
}

/// Key encodings for the given key indices. Each key block is the fixed
/// encodings, then the attribute encodings instantiated per attribute in
/// the range, then the bare per-key indexed symbols.
pub fn create_key_encoding(
    k_fixed: &[Expr],
    k_att: &[Expr],
    att_range: &[u32],
    prefixes: &[String],
    nr_indexed_encodings: u32,
    key_indices: &[u32],
) -> Vec<Expr> {
    let mut out = Vec::new();
    for &key in key_indices {
        out.extend(k_fixed.iter().cloned());
        for &a in att_range {
            for enc in k_att {
                let mut inst = subst(
                    enc,
                    &[
                        (ATT_MPK_GROUP, get_attribute_in_group(a)),
                        (ATT_SCALAR, get_attribute_as_scalar(a)),
                    ],
                );
                for prefix in prefixes {
                    for n in 1..=nr_indexed_encodings {
                        inst = inst.substitute_symbol(
                            &Symbol::new(&format!("indexed_enc_{prefix}_{n}")),
                            &indexed_key_symbol(prefix, n, a, key),
                        );
                    }
                }
                out.push(inst);
            }
        }
        for prefix in prefixes {
            for n in 1..=nr_indexed_encodings {
                out.push(bare_key_symbol(prefix, n, key));
            }
        }
    }
    out
}

/// Ciphertext encodings over the attribute range: fixed encodings first,
/// then the attribute encodings with the policy share of `special_s` for
/// each attribute.
pub fn create_ciphertext_encoding(
    c_fixed: &[Expr],
    c_att: &[Expr],
    special_s: &Expr,
    att_range: &[u32],
    prefixes: &[String],
    nr_indexed_encodings: u32,
) -> Vec<Expr> {
    let mut out = c_fixed.to_vec();
    for (pos, &a) in att_range.iter().enumerate() {
        let share = get_policy_share(pos, att_range.len(), special_s);
        for enc in c_att {
            let mut inst = subst(
                enc,
                &[
                    (ATT_MPK_GROUP, get_attribute_in_group(a)),
                    (ATT_SCALAR, get_attribute_as_scalar(a)),
                    (POLICY_SHARE, share.clone()),
                ],
            );
            for prefix in prefixes {
                for n in 1..=nr_indexed_encodings {
                    inst = inst.substitute_symbol(
                        &Symbol::new(&format!("indexed_enc_{prefix}_{n}")),
                        &Expr::symbol(&format!("{prefix}_{n}_ct{a}")),
                    );
                }
            }
            out.push(inst);
        }
    }
    out
}

/// Unknown-variable set of generated encodings: every occurring symbol
/// except the attribute scalars, which the attacker chooses.
pub fn generate_unknown_variable_set(kenc: &[Expr], cenc: &[Expr], benc: &[Expr]) -> Vec<Expr> {
    let mut out: Vec<Expr> = Vec::new();
    for enc in kenc.iter().chain(cenc.iter()).chain(benc.iter()) {
        for sym in enc.symbols() {
            if is_attribute_scalar(sym.name()) {
                continue;
            }
            let expr = Expr::from_symbol(sym);
            if !out.contains(&expr) {
                out.push(expr);
            }
        }
    }
    out
}

fn is_attribute_scalar(name: &str) -> bool {
    name.strip_prefix("x_")
        .map(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parse_expr;

    fn e(s: &str) -> Expr {
        parse_expr(s).unwrap()
    }

    #[test]
    fn test_and_policy_shares_sum_to_secret() {
        let s = e("s");
        let total = (0..2)
            .map(|i| get_policy_share(i, 2, &s))
            .fold(Expr::zero(), |acc, sh| &acc + &sh);
        assert_eq!(total, s);
        assert_eq!(get_policy_share(0, 2, &e("s")), e("s + v_2"));
        assert_eq!(get_policy_share(1, 2, &e("s")), e("-v_2"));
    }

    #[test]
    fn test_key_encoding_block_layout() {
        let k_fixed = [e("alpha + r")];
        let k_att = [
            &e("r") + &(&get_indexed_encoding("rp", 1) * &e(ATT_MPK_GROUP)),
            get_indexed_encoding("rp", 1),
        ];
        let kenc = create_key_encoding(&k_fixed, &k_att, &[1], &["rp".to_string()], 1, &[1]);
        assert_eq!(kenc.len(), 4);
        assert_eq!(kenc[0], e("alpha + r"));
        assert_eq!(kenc[1], e("r + rp_1_att1_key1*b_1"));
        assert_eq!(kenc[2], e("rp_1_att1_key1"));
        assert_eq!(kenc[3], e("rp_1_key1"));
    }

    #[test]
    fn test_ciphertext_encoding_uses_shares() {
        let c_att = [&e(POLICY_SHARE) * &e(ATT_MPK_GROUP), e(POLICY_SHARE)];
        let cenc = create_ciphertext_encoding(&[], &c_att, &e("s"), &[1, 2], &[], 0);
        assert_eq!(cenc.len(), 4);
        assert_eq!(cenc[0], e("(s + v_2)*b_1"));
        assert_eq!(cenc[1], e("s + v_2"));
        assert_eq!(cenc[2], e("-v_2*b_2"));
        assert_eq!(cenc[3], e("-v_2"));
    }

    #[test]
    fn test_unknown_set_excludes_attribute_scalars() {
        let enc = [e("r + x_1*b_1")];
        let unknown = generate_unknown_variable_set(&enc, &[], &[]);
        assert!(unknown.contains(&e("r")));
        assert!(unknown.contains(&e("b_1")));
        assert!(!unknown.contains(&e("x_1")));
    }
}
