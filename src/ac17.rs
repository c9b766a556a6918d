//! Correctness checks for the AC17 pair-encoding form, and the lone /
//! non-lone classification of unknown variables.
//!
//! An unknown variable is non-lone when some monomial multiplies it with a
//! common (public-key) variable, and lone otherwise. The AC17 form allows
//! at most two unknowns per monomial and forbids a variable from acting as
//! both lone and non-lone; encodings where a non-lone variable behaves as
//! lone in isolated monomials are repaired by substitution.

use crate::decompose::{collect_denoms, decompose_encoding, decompose_poly, MonomialBasis};
use crate::expr::{Expr, Monomial};
use crate::solver::unknown_symbols;
use crate::symbol::Symbol;

/// Outcome of the form check for one encoding side.
pub struct FormCheck {
    pub ok: bool,
    pub message: String,
    pub repaired: Vec<Expr>,
}

fn expr_of(mono: &Monomial) -> Expr {
    Expr::from_monomial(mono.clone())
}

fn in_list(expr: &Expr, list: &[Expr]) -> bool {
    list.contains(expr)
}

fn symbol_in_list(sym: &Symbol, list: &[Expr]) -> bool {
    in_list(&Expr::from_symbol(sym.clone()), list)
}

/// Form check for one encoding list (`mes` names the side in messages).
pub fn enc_correct_form(enc: &[Expr], benc: &[Expr], unknown: &[Expr], mes: &str) -> FormCheck {
    let unknown_syms = unknown_symbols(unknown);
    let mut cenc: Vec<Expr> = enc.to_vec();

    // Non-lone variables occurring as singletons.
    let mut s_nonlone: Vec<Expr> = Vec::new();
    for c in &cenc {
        let mut basis = MonomialBasis::new();
        decompose_poly(c, &mut basis, &unknown_syms);
        if basis.len() == 1 {
            let mono = basis.get(0);
            if mono.factor_count() == 1 && !in_list(&expr_of(mono), benc) {
                s_nonlone.push(expr_of(mono));
            }
        }
    }

    // Variables multiplied with a common variable but never seen as a
    // singleton: lone variables in disguise.
    let mut lones_in_disguise: Vec<Symbol> = Vec::new();
    let mut associated_commons: Vec<Vec<Symbol>> = Vec::new();
    for c in &cenc {
        let mut basis = MonomialBasis::new();
        decompose_poly(c, &mut basis, &unknown_syms);
        if basis.len() > 1 {
            for mono in basis.entries() {
                if mono.is_one() {
                    continue;
                }
                let syms = mono.symbols();
                let with_benc = syms.iter().any(|v| symbol_in_list(v, benc));
                if !with_benc {
                    continue;
                }
                for var in &syms {
                    if symbol_in_list(var, benc) || in_list(&Expr::from_symbol(var.clone()), &s_nonlone)
                    {
                        continue;
                    }
                    let assoc: Vec<Symbol> =
                        syms.iter().filter(|s| *s != var).cloned().collect();
                    if let Some(pos) = lones_in_disguise.iter().position(|v| v == var) {
                        for a in assoc {
                            if !associated_commons[pos].contains(&a) {
                                associated_commons[pos].push(a);
                            }
                        }
                    } else {
                        lones_in_disguise.push(var.clone());
                        associated_commons.push(assoc);
                    }
                }
            }
        }
    }

    let mut message = String::new();
    let mut replaced = false;
    for (var, assoc) in lones_in_disguise.iter().zip(associated_commons.iter()) {
        if assoc.len() > 1 {
            s_nonlone.push(Expr::from_symbol(var.clone()));
            message = format!(
                "The {mes} encoding contained non-lone variables that do not occur as a singleton.\n"
            );
        } else if let Some(common) = assoc.first() {
            for c in &mut cenc {
                *c = c.replace_product(var, common);
            }
            replaced = true;
        }
    }
    if replaced {
        message.push_str(&format!(
            "The {mes} encoding previously contained non-lone variables that act as lone \
             variables. These have now been replaced by lone variables."
        ));
    }

    let mut ok = true;

    for c in &cenc {
        let mut basis = MonomialBasis::new();
        decompose_poly(c, &mut basis, &unknown_syms);
        for mono in basis.entries() {
            if mono.factor_count() > 2 {
                ok = false;
                message.push_str(&format!(
                    "\t - The {mes} encoding has monomials with more than two unknown variables \n"
                ));
            }
        }
    }

    for c in &cenc {
        let mut basis = MonomialBasis::new();
        decompose_poly(c, &mut basis, &unknown_syms);
        if basis.len() > 1 {
            let is_polynomial = basis.entries().iter().any(|mono| {
                mono.symbols().iter().any(|v| symbol_in_list(v, benc))
            });
            if is_polynomial {
                for mono in basis.entries() {
                    if mono.factor_count() == 1 && in_list(&expr_of(mono), &s_nonlone) {
                        ok = false;
                        message.push_str(&format!(
                            "\t - The {mes} encoding contains non-lone variables that are also \
                             used as lone variables \n"
                        ));
                    }
                }
            }
        }
    }

    FormCheck {
        ok,
        message,
        repaired: cenc,
    }
}

pub fn kenc_correct_form(kenc: &[Expr], benc: &[Expr], unknown: &[Expr]) -> FormCheck {
    enc_correct_form(kenc, benc, unknown, "key")
}

pub fn cenc_correct_form(cenc: &[Expr], benc: &[Expr], unknown: &[Expr]) -> FormCheck {
    enc_correct_form(cenc, benc, unknown, "ciphertext")
}

/// Outcome of the AC17 form check over both sides, with the process log.
pub struct Ac17FormResult {
    pub ok: bool,
    pub kenc: Vec<Expr>,
    pub cenc: Vec<Expr>,
    pub log: String,
}

pub fn correct_form(
    kenc: &[Expr],
    cenc: &[Expr],
    benc: &[Expr],
    unknown: &[Expr],
) -> Ac17FormResult {
    let k = kenc_correct_form(kenc, benc, unknown);
    let c = cenc_correct_form(cenc, benc, unknown);
    if k.ok && c.ok {
        Ac17FormResult {
            ok: true,
            log: format!(
                "\n The pair encoding scheme satisfies the AC17 form. {}{}\n",
                k.message, c.message
            ),
            kenc: k.repaired,
            cenc: c.repaired,
        }
    } else {
        let mut log =
            String::from("\n The pair encoding scheme does not satisfy the AC17 form, because \n");
        if !k.ok {
            log.push('\n');
            log.push_str(&k.message);
        }
        if !c.ok {
            log.push('\n');
            log.push_str(&c.message);
        }
        Ac17FormResult {
            ok: false,
            kenc: Vec::new(),
            cenc: Vec::new(),
            log,
        }
    }
}

/// As [`correct_form`] without producing a log.
pub fn correct_form_silent(
    kenc: &[Expr],
    cenc: &[Expr],
    benc: &[Expr],
    unknown: &[Expr],
) -> Option<(Vec<Expr>, Vec<Expr>)> {
    let k = kenc_correct_form(kenc, benc, unknown);
    let c = cenc_correct_form(cenc, benc, unknown);
    (k.ok && c.ok).then_some((k.repaired, c.repaired))
}

/// Variables occurring in the unknown monomials of an encoding that are
/// not common variables.
pub fn recover_list_enc_vars(enc: &[Expr], benc: &[Expr], unknown: &[Expr]) -> Vec<Symbol> {
    let (_, basis) = decompose_encoding(enc, &unknown_symbols(unknown));
    let mut out: Vec<Symbol> = Vec::new();
    for mono in basis.entries() {
        for var in mono.symbols() {
            if !symbol_in_list(&var, benc) && !out.contains(&var) {
                out.push(var);
            }
        }
    }
    out
}

/// Determines whether the blinding value has the `alpha * s` shape with
/// alpha on the key side and s on the ciphertext side.
pub fn blinding_value_correct_form(
    blindingval: &Expr,
    kenc: &[Expr],
    cenc: &[Expr],
    benc: &[Expr],
    unknown: &[Expr],
) -> Option<(Expr, Expr)> {
    let unknown_syms = unknown_symbols(unknown);
    let mut basis = MonomialBasis::new();
    decompose_poly(blindingval, &mut basis, &unknown_syms);
    if basis.len() != 1 {
        return None;
    }
    let vars = basis.get(0).symbols();
    if vars.len() != 2 {
        return None;
    }
    let (bv1, bv2) = (vars[0].clone(), vars[1].clone());

    let k_vars = recover_list_enc_vars(kenc, benc, unknown);
    let c_vars = recover_list_enc_vars(cenc, benc, unknown);

    let mut found = None;
    if k_vars.contains(&bv1) && c_vars.contains(&bv2) {
        found = Some((
            Expr::from_symbol(bv1.clone()),
            Expr::from_symbol(bv2.clone()),
        ));
    }
    if c_vars.contains(&bv1) && k_vars.contains(&bv2) {
        found = Some((Expr::from_symbol(bv2), Expr::from_symbol(bv1)));
    }
    found
}

pub fn enc_contains_no_fractions(enc: &[Expr], unknown: &[Expr]) -> bool {
    collect_denoms(enc, &unknown_symbols(unknown)).is_empty()
}

pub fn all_enc_contains_no_fractions(kenc: &[Expr], cenc: &[Expr], unknown: &[Expr]) -> bool {
    enc_contains_no_fractions(kenc, unknown) && enc_contains_no_fractions(cenc, unknown)
}

/// Classification of a basis's non-common variables as (variable,
/// non-lone) pairs, in discovery order.
pub fn determine_non_lone_vars(benc: &[Expr], basis: &MonomialBasis) -> Vec<(Expr, bool)> {
    let mut non_common: Vec<Symbol> = Vec::new();
    for mono in basis.entries() {
        for sym in mono.symbols() {
            if !symbol_in_list(&sym, benc) && !non_common.contains(&sym) {
                non_common.push(sym);
            }
        }
    }
    non_common
        .into_iter()
        .map(|x| {
            let non_lone = basis.entries().iter().any(|mono| {
                mono.contains(&x) && mono.symbols().iter().any(|y| symbol_in_list(y, benc))
            });
            (Expr::from_symbol(x), non_lone)
        })
        .collect()
}

/// Splits a classification into (non-lone, lone) variable lists.
pub fn split_lone_nonlone(classified: &[(Expr, bool)]) -> (Vec<Expr>, Vec<Expr>) {
    let mut nonlones = Vec::new();
    let mut lones = Vec::new();
    for (var, non_lone) in classified {
        if *non_lone {
            nonlones.push(var.clone());
        } else {
            lones.push(var.clone());
        }
    }
    (nonlones, lones)
}

/// Moves `special_s` to the first entry when present.
pub fn put_special_s_first(special_s: &Expr, mut list: Vec<Expr>) -> Vec<Expr> {
    if let Some(pos) = list.iter().position(|x| x == special_s) {
        list.swap(0, pos);
    }
    list
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parse_expr;

    fn e(s: &str) -> Expr {
        parse_expr(s).unwrap()
    }

    fn exprs(names: &[&str]) -> Vec<Expr> {
        names.iter().map(|n| e(n)).collect()
    }

    #[test]
    fn test_wat11_satisfies_form() {
        let k = vec![e("alpha + r*b"), e("r*b0"), e("r")];
        let c = vec![
            e("s*b - s1*b + sp*b1"),
            e("s"),
            e("sp"),
            e("s1*b + sp*b2"),
        ];
        let mpk = exprs(&["b0", "b1", "b", "b2"]);
        let unknown = exprs(&["alpha", "b", "b0", "b1", "b2", "r", "s", "s1", "sp"]);
        let result = correct_form(&k, &c, &mpk, &unknown);
        assert!(result.ok);
        assert!(result.log.contains("satisfies the AC17 form"));
    }

    #[test]
    fn test_three_unknowns_rejected() {
        let k = vec![e("alpha + r*rp*b")];
        let c = vec![e("s")];
        let mpk = exprs(&["b"]);
        let unknown = exprs(&["alpha", "b", "r", "rp", "s"]);
        let result = correct_form(&k, &c, &mpk, &unknown);
        assert!(!result.ok);
        assert!(result
            .log
            .contains("monomials with more than two unknown variables"));
    }

    #[test]
    fn test_lone_in_disguise_is_repaired() {
        // rp only occurs multiplied with b0; the repair rewrites rp*b0 to rp.
        let k = vec![e("r + rp*b0"), e("r")];
        let check = kenc_correct_form(&k, &exprs(&["b0"]), &exprs(&["r", "rp"]));
        assert!(check.ok);
        assert_eq!(check.repaired[0], e("r + rp"));
        assert!(check.message.contains("replaced by lone variables"));
    }

    #[test]
    fn test_blinding_value_form() {
        let k = vec![e("alpha + r*b"), e("r")];
        let c = vec![e("s*b"), e("s")];
        let mpk = exprs(&["b"]);
        let unknown = exprs(&["alpha", "b", "r", "s"]);
        let (alpha, s) = blinding_value_correct_form(&e("alpha*s"), &k, &c, &mpk, &unknown).unwrap();
        assert_eq!(alpha, e("alpha"));
        assert_eq!(s, e("s"));
        assert!(blinding_value_correct_form(&e("alpha*r"), &k, &c, &mpk, &unknown).is_none());
    }

    #[test]
    fn test_non_lone_classification() {
        let unknown = exprs(&["alpha", "b", "r", "s"]);
        let (_, basis) = decompose_encoding(
            &[e("alpha + r*b"), e("r"), e("s")],
            &unknown_symbols(&unknown),
        );
        let classes = determine_non_lone_vars(&exprs(&["b"]), &basis);
        let lookup = |name: &str| {
            classes
                .iter()
                .find(|(v, _)| v == &e(name))
                .map(|(_, nl)| *nl)
                .unwrap()
        };
        assert!(lookup("r"));
        assert!(!lookup("alpha"));
        assert!(!lookup("s"));
    }
}
