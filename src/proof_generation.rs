//! Automatic generation of symbolic-property proofs.
//!
//! A proof is a set of substitution artifacts: one matrix per common
//! variable, row vectors for the non-lone ciphertext variables, column
//! vectors for the non-lone key variables, and vectors for the lone
//! variables of both sides. The selective proof is built from the
//! ciphertext kernel; the co-selective proof is the selective proof with
//! key and ciphertext roles swapped and every artifact transposed back.

use std::fmt;

use tracing::debug;

use crate::ac17::{determine_non_lone_vars, put_special_s_first, split_lone_nonlone};
use crate::decompose::{decompose_encoding, rows_to_matrix, MonomialBasis};
use crate::expr::{Expr, Monomial};
use crate::matrix::Matrix;
use crate::solver::unknown_symbols;

/// Substitution artifacts of one symbolic-property proof. Never mutated
/// after normalization.
#[derive(Clone)]
pub struct Proof {
    pub benc_mats: Vec<(Expr, Matrix)>,
    pub svectors_nonlone: Vec<(Expr, Matrix)>,
    pub svectors_lone: Vec<(Expr, Matrix)>,
    pub rvectors_nonlone: Vec<(Expr, Matrix)>,
    pub rvectors_lone: Vec<(Expr, Matrix)>,
}

impl fmt::Display for Proof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let section = |f: &mut fmt::Formatter<'_>,
                       title: &str,
                       entries: &[(Expr, Matrix)]|
         -> fmt::Result {
            writeln!(f, "\t{title}:")?;
            for (var, mat) in entries {
                writeln!(f, "\t\t{var} : {mat}")?;
            }
            Ok(())
        };
        section(f, "substitution matrices for the common variables", &self.benc_mats)?;
        section(
            f,
            "substitution vectors for the non-lone ciphertext variables",
            &self.svectors_nonlone,
        )?;
        section(
            f,
            "substitution vectors for the lone ciphertext variables",
            &self.svectors_lone,
        )?;
        section(
            f,
            "substitution vectors for the non-lone key variables",
            &self.rvectors_nonlone,
        )?;
        section(
            f,
            "substitution vectors for the lone key variables",
            &self.rvectors_lone,
        )
    }
}

fn as_monomial(expr: &Expr) -> Option<Monomial> {
    if !expr.is_polynomial() || expr.numerator().num_terms() != 1 {
        return None;
    }
    let (mono, coeff) = expr.numerator().terms().next().unwrap();
    use num_traits::One;
    coeff.is_one().then(|| mono.clone())
}

fn mono_product(a: &Expr, b: &Expr) -> Option<Monomial> {
    Some(as_monomial(a)?.mul(&as_monomial(b)?))
}

/// Extends the ciphertext matrix with a zero column at `b * special_s` for
/// every common variable that occurs in no product with a non-lone
/// ciphertext variable.
fn extend_mat_and_vec2(
    matc: Matrix,
    uvectorc: &mut MonomialBasis,
    benc: &[Expr],
    nonlones: &[Expr],
) -> Matrix {
    let mut mat = matc;
    let spec_s = &nonlones[0];
    for x_b in benc {
        let b_in_uvec = nonlones.iter().any(|x_c| {
            mono_product(x_b, x_c)
                .map(|m| uvectorc.position(&m).is_some())
                .unwrap_or(false)
        });
        if !b_in_uvec {
            if let Some(prod) = mono_product(x_b, spec_s) {
                uvectorc.find_or_insert(prod);
                mat = mat
                    .append_col(vec![Expr::zero(); mat.nrows()])
                    .expect("zero column has matching height");
            }
        }
    }
    mat
}

/// One substitution matrix per common variable occurring in the basis,
/// entries read off the ciphertext kernel at the `b * svar` monomials.
fn construct_benc_mats(
    benc: &[Expr],
    nonlonesub: &[Expr],
    uvector: &MonomialBasis,
    kern: &[Matrix],
) -> Vec<(Expr, Matrix)> {
    let mut benc_mats = Vec::new();
    for bx in benc {
        let bx_mono = match as_monomial(bx) {
            Some(m) if m.factor_count() == 1 => m,
            _ => continue,
        };
        let bx_sym = bx_mono.symbols().remove(0);
        let mut occurs = false;
        let mut bmat = Matrix::zeros(nonlonesub.len(), kern.len());
        for (count, mono) in uvector.entries().iter().enumerate() {
            if mono.is_one() {
                continue;
            }
            if mono.contains(&bx_sym) && mono.factor_count() == 2 && mono.total_degree() == 2 {
                occurs = true;
                let svar = mono
                    .symbols()
                    .into_iter()
                    .find(|s| s != &bx_sym)
                    .expect("two distinct symbols");
                let svar_expr = Expr::from_symbol(svar);
                if let Some(row_s) = nonlonesub.iter().position(|x| x == &svar_expr) {
                    for (ck, v) in kern.iter().enumerate() {
                        bmat.set(row_s, ck, v.entry(count).clone());
                    }
                }
            }
        }
        if occurs {
            benc_mats.push((bx.clone(), bmat));
        }
    }
    benc_mats
}

/// Vectors for the lone ciphertext variables, read off the kernel at the
/// singleton monomials.
fn construct_lone_vects(
    lonesub: &[Expr],
    uvector: &MonomialBasis,
    kern: &[Matrix],
    len_vec: usize,
) -> Vec<(Expr, Matrix)> {
    let mut out = Vec::new();
    for slone in lonesub {
        let mut svec = vec![Expr::zero(); len_vec];
        if let Some(slone_mono) = as_monomial(slone) {
            for (count, mono) in uvector.entries().iter().enumerate() {
                if mono == &slone_mono {
                    for (i, v) in kern.iter().enumerate() {
                        svec[i] = v.entry(count).clone();
                    }
                }
            }
        }
        out.push((slone.clone(), Matrix::row_vector(svec)));
    }
    out
}

/// The merged key/ciphertext product matrix over
/// `nonloneK x uvectorC  U  nonloneC x uvectorK`.
fn merge_matrices(
    matc: &Matrix,
    matk: &Matrix,
    uvectorc: &MonomialBasis,
    uvectork: &MonomialBasis,
    nonlones_c: &[Expr],
    nonlones_k: &[Expr],
) -> (Matrix, Vec<Monomial>) {
    let mut big_uvectorc: Vec<Monomial> = Vec::new();
    for x_k in nonlones_k {
        for u in uvectorc.entries() {
            big_uvectorc.push(
                as_monomial(x_k)
                    .expect("non-lone variables are symbols")
                    .mul(u),
            );
        }
    }
    let mut big_uvectork: Vec<Monomial> = Vec::new();
    for x_c in nonlones_c {
        for u in uvectork.entries() {
            big_uvectork.push(
                as_monomial(x_c)
                    .expect("non-lone variables are symbols")
                    .mul(u),
            );
        }
    }
    let mut big_uvector: Vec<Monomial> = big_uvectorc.clone();
    for m in &big_uvectork {
        if !big_uvector.contains(m) {
            big_uvector.push(m.clone());
        }
    }

    let (mc_rows, mc_cols) = (matc.nrows(), matc.ncols());
    let (mk_rows, mk_cols) = (matk.nrows(), matk.ncols());
    let bmc_rows = mc_rows * nonlones_k.len();
    let bmk_rows = mk_rows * nonlones_c.len();

    let mut big_matc = Matrix::zeros(bmc_rows, mc_cols * nonlones_k.len());
    for (ctr, _) in nonlones_k.iter().enumerate() {
        for i in 0..mc_rows {
            for j in 0..mc_cols {
                big_matc.set(i + ctr * mc_rows, j + ctr * mc_cols, matc.get(i, j).clone());
            }
        }
    }
    let mut big_matk = Matrix::zeros(bmk_rows, mk_cols * nonlones_c.len());
    for (ctr, _) in nonlones_c.iter().enumerate() {
        for i in 0..mk_rows {
            for j in 0..mk_cols {
                big_matk.set(i + ctr * mk_rows, j + ctr * mk_cols, matk.get(i, j).clone());
            }
        }
    }

    let mut big_mat = Matrix::zeros(bmc_rows + bmk_rows, big_uvector.len());
    for (i_u, x_u) in big_uvector.iter().enumerate() {
        for (i, x_c) in big_uvectorc.iter().enumerate() {
            if x_u == x_c {
                for j in 0..bmc_rows {
                    let v = &*big_mat.get(j, i_u) + big_matc.get(j, i);
                    big_mat.set(j, i_u, v);
                }
            }
        }
        for (i, x_k) in big_uvectork.iter().enumerate() {
            if x_u == x_k {
                for j in 0..bmk_rows {
                    let v = &*big_mat.get(j + bmc_rows, i_u) + big_matk.get(j, i);
                    big_mat.set(j + bmc_rows, i_u, v);
                }
            }
        }
    }
    (big_mat, big_uvector)
}

/// Selects the kernel vector(s) with a nonzero entry at
/// `masterkey * special_s` and zero entries at every other
/// `masterkey * nonlone` position; qualifying vectors are summed. Falls
/// back to the first kernel vector when none qualify.
fn select_kern_vec(
    masterkey: &Expr,
    special_s: &Expr,
    nonlones: &[Expr],
    kern_bm: &[Matrix],
    big_uvector: &[Monomial],
) -> Matrix {
    let mk_mono = mono_product(masterkey, special_s);
    let mk_entry = mk_mono.and_then(|m| big_uvector.iter().position(|x| x == &m));
    let mk_entry = match mk_entry {
        Some(i) => i,
        None => return kern_bm[0].clone(),
    };
    let mut null_entries = Vec::new();
    for el in nonlones.iter().filter(|el| *el != special_s) {
        if let Some(prod) = mono_product(masterkey, el) {
            if let Some(pos) = big_uvector.iter().position(|x| x == &prod) {
                null_entries.push(pos);
            }
        }
    }
    let qualifying: Vec<&Matrix> = kern_bm
        .iter()
        .filter(|vec| {
            !vec.entry(mk_entry).is_zero()
                && null_entries.iter().all(|&en| vec.entry(en).is_zero())
        })
        .collect();
    match qualifying.split_first() {
        Some((first, rest)) => {
            let mut acc = (*first).clone();
            for vec in rest {
                acc = acc.add(*vec).expect("kernel vectors share one length");
            }
            acc
        }
        None => kern_bm[0].clone(),
    }
}

/// Expresses each non-lone-key block of the selected kernel vector in the
/// ciphertext kernel basis.
fn get_nonlone_vecs(
    kern_vec: &Matrix,
    kern_c: &[Matrix],
    uvectorc: &MonomialBasis,
    nonlones_k: &[Expr],
) -> Vec<(Expr, Matrix)> {
    let mut out = Vec::new();
    let block = uvectorc.len();
    let mut ctr = 0usize;
    for nl_el in nonlones_k {
        let sub_vec: Vec<Expr> = (ctr..ctr + block)
            .map(|i| kern_vec.entry(i).clone())
            .collect();
        // Columns: ciphertext kernel vectors, then the block itself.
        let mut cols: Vec<Vec<Expr>> = kern_c
            .iter()
            .map(|v| (0..v.len()).map(|i| v.entry(i).clone()).collect())
            .collect();
        cols.push(sub_vec);
        let mut new_mat = Matrix::zeros(block, cols.len());
        for (j, col) in cols.iter().enumerate() {
            for (i, value) in col.iter().enumerate() {
                new_mat.set(i, j, value.clone());
            }
        }
        for ns_vec in new_mat.nullspace() {
            let last = ns_vec.len() - 1;
            if !ns_vec.entry(last).is_zero() {
                let coeffs: Vec<Expr> = (0..last)
                    .map(|i| &(-ns_vec.entry(i)) / ns_vec.entry(last))
                    .collect();
                out.push((nl_el.clone(), Matrix::col_vector(coeffs)));
            }
        }
        ctr += block;
    }
    out
}

/// Reads the lone-key substitution vectors off the selected kernel vector.
fn get_lone_vecs(
    kern_vec: &Matrix,
    big_uvector: &[Monomial],
    lones_k: &[Expr],
    nonlones_c: &[Expr],
) -> Vec<(Expr, Matrix)> {
    let mut out = Vec::new();
    for l_el in lones_k {
        let mut rvec = Vec::new();
        for nl_el in nonlones_c {
            let entry = mono_product(l_el, nl_el)
                .and_then(|prd| big_uvector.iter().position(|x| x == &prd))
                .map(|ind| kern_vec.entry(ind).clone())
                .unwrap_or_else(Expr::zero);
            rvec.push(entry);
        }
        out.push((l_el.clone(), Matrix::col_vector(rvec)));
    }
    out
}

/// Generates the selective symbolic-property proof, or `None` when the
/// required kernels are empty.
pub fn generate_proof_selective(
    masterkey: &Expr,
    special_s: &Expr,
    kenc: &[Expr],
    cenc: &[Expr],
    benc: &[Expr],
    unknown: &[Expr],
) -> Option<Proof> {
    let unknown_syms = unknown_symbols(unknown);
    let (matk_rows, uvectork) = decompose_encoding(kenc, &unknown_syms);
    let (matc_rows, mut uvectorc) = decompose_encoding(cenc, &unknown_syms);
    let mat_k = rows_to_matrix(matk_rows);
    let mat_c = rows_to_matrix(matc_rows);

    let nonlone_c = determine_non_lone_vars(benc, &uvectorc);
    let (sublist_nonlones_c, sublist_lones_c) = split_lone_nonlone(&nonlone_c);
    let sublist_nonlones_c = put_special_s_first(special_s, sublist_nonlones_c);
    if sublist_nonlones_c.is_empty() {
        return None;
    }

    let mat_c = extend_mat_and_vec2(mat_c, &mut uvectorc, benc, &sublist_nonlones_c);

    let kern_c = mat_c.nullspace();
    if kern_c.is_empty() {
        debug!("ciphertext matrix has full column rank, no proof");
        return None;
    }
    let benc_mats = construct_benc_mats(benc, &sublist_nonlones_c, &uvectorc, &kern_c);
    if benc_mats.is_empty() {
        return None;
    }

    let nonlone_k = determine_non_lone_vars(benc, &uvectork);
    let (sublist_nonlones_k, sublist_lones_k) = split_lone_nonlone(&nonlone_k);

    let bm_rows = benc_mats[0].1.nrows();
    let bm_columns = benc_mats[0].1.ncols();

    let mut svectors_nonlone = Vec::new();
    for (count, c) in sublist_nonlones_c.iter().enumerate() {
        let mut vec = vec![Expr::zero(); bm_rows];
        vec[count] = Expr::one();
        svectors_nonlone.push((c.clone(), Matrix::row_vector(vec)));
    }

    let svectors_lone = construct_lone_vects(&sublist_lones_c, &uvectorc, &kern_c, bm_columns);

    let (big_matrix, big_uvector) = merge_matrices(
        &mat_c,
        &mat_k,
        &uvectorc,
        &uvectork,
        &sublist_nonlones_c,
        &sublist_nonlones_k,
    );
    let kern_bm = big_matrix.nullspace();
    if kern_bm.is_empty() {
        debug!("merged product matrix has full column rank, no proof");
        return None;
    }

    let kern_vec = select_kern_vec(
        masterkey,
        special_s,
        &sublist_nonlones_c,
        &kern_bm,
        &big_uvector,
    );

    let rvectors_nonlone = get_nonlone_vecs(&kern_vec, &kern_c, &uvectorc, &sublist_nonlones_k);
    let rvectors_lone = get_lone_vecs(&kern_vec, &big_uvector, &sublist_lones_k, &sublist_nonlones_c);

    Some(Proof {
        benc_mats,
        svectors_nonlone,
        svectors_lone,
        rvectors_nonlone,
        rvectors_lone,
    })
}

/// The co-selective proof: selective with key and ciphertext roles
/// swapped, every artifact transposed back.
pub fn generate_proof_co_selective(
    masterkey: &Expr,
    special_s: &Expr,
    kenc: &[Expr],
    cenc: &[Expr],
    benc: &[Expr],
    unknown: &[Expr],
) -> Option<Proof> {
    let swapped = generate_proof_selective(masterkey, special_s, cenc, kenc, benc, unknown)?;
    let transpose_all = |list: &[(Expr, Matrix)]| -> Vec<(Expr, Matrix)> {
        list.iter()
            .map(|(v, m)| (v.clone(), m.transpose()))
            .collect()
    };
    Some(Proof {
        benc_mats: transpose_all(&swapped.benc_mats),
        svectors_nonlone: transpose_all(&swapped.rvectors_nonlone),
        svectors_lone: transpose_all(&swapped.rvectors_lone),
        rvectors_nonlone: transpose_all(&swapped.svectors_nonlone),
        rvectors_lone: transpose_all(&swapped.svectors_lone),
    })
}

/// Rescales (and, when index 0 is degenerate, entry-swaps) the
/// substitution vectors so the master-key and special-s vectors lead with
/// equal nonzero entries. Required before verification and before the
/// collusion-only shape checks.
pub fn normalize_substitutions(masterkey: &Expr, special_s: &Expr, proof: Proof) -> Proof {
    let mut proof = proof;

    let master_key_vec = proof
        .rvectors_lone
        .iter()
        .find(|(k, _)| k == masterkey)
        .map(|(_, v)| v.clone());
    let special_s_vec = proof
        .svectors_nonlone
        .iter()
        .find(|(c, _)| c == special_s)
        .map(|(_, v)| v.clone());

    let (mk_vec, s_vec) = match (master_key_vec, special_s_vec) {
        (Some(mk), Some(s)) => (mk, s),
        _ => return proof,
    };

    let mut swap = false;
    let mut ind = 0usize;
    let mut nm_factor_keys = Expr::one();
    let mut nm_factor_ct = Expr::one();
    if mk_vec.entry(0).is_zero() || s_vec.entry(0).is_zero() {
        for i in 0..mk_vec.len().min(s_vec.len()) {
            if !mk_vec.entry(i).is_zero() && !s_vec.entry(i).is_zero() {
                ind = i;
                swap = true;
                nm_factor_keys = mk_vec.entry(i).clone();
                nm_factor_ct = s_vec.entry(i).clone();
            }
        }
    } else {
        nm_factor_keys = mk_vec.entry(0).clone();
        nm_factor_ct = s_vec.entry(0).clone();
    }

    let rescale = |mat: &Matrix, factor: &Expr| -> Matrix {
        let entries = (0..mat.len())
            .map(|i| mat.entry(i) / factor)
            .collect::<Vec<_>>();
        if mat.nrows() == 1 {
            Matrix::row_vector(entries)
        } else {
            Matrix::col_vector(entries)
        }
    };

    for (_, vec) in proof.rvectors_lone.iter_mut() {
        if swap {
            vec.swap_rows(0, ind);
        }
        *vec = rescale(vec, &nm_factor_keys);
    }
    for (_, vec) in proof.rvectors_nonlone.iter_mut() {
        *vec = rescale(vec, &nm_factor_keys);
    }
    for (_, vec) in proof.svectors_nonlone.iter_mut() {
        if swap {
            let mut t = vec.transpose();
            t.swap_rows(0, ind);
            *vec = t.transpose();
        }
        *vec = rescale(vec, &nm_factor_ct);
    }
    for (_, vec) in proof.svectors_lone.iter_mut() {
        *vec = rescale(vec, &nm_factor_ct);
    }
    if swap {
        for (_, mat) in proof.benc_mats.iter_mut() {
            mat.swap_rows(0, ind);
        }
    }
    proof
}

/// Whether the kernel of the full key-times-ciphertext product matrix has
/// a vector with a nonzero entry at `masterkey * special_s`; the nonzero
/// entries are the assumptions trivial security rests on.
pub fn check_kernel_products(
    masterkey: &Expr,
    special_s: &Expr,
    kenc: &[Expr],
    cenc: &[Expr],
    unknown: &[Expr],
) -> (bool, Vec<Expr>) {
    let unknown_syms = unknown_symbols(unknown);
    let mut penc = Vec::new();
    for k_el in kenc {
        for c_el in cenc {
            penc.push(k_el * c_el);
        }
    }
    let (rows, uvector) = decompose_encoding(&penc, &unknown_syms);
    let big_mat = rows_to_matrix(rows);

    let mk_index = mono_product(masterkey, special_s)
        .and_then(|m| uvector.position(&m))
        .unwrap_or(0);

    let mut eqs = Vec::new();
    for vec in big_mat.nullspace() {
        if !vec.entry(mk_index).is_zero() {
            eqs.push(vec.entry(mk_index).clone());
        }
    }
    (!eqs.is_empty(), eqs)
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

    // The classic one-use CP-ABE encodings (Wat11).
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
    fn test_selective_proof_exists_for_wat11() {
        let (k, c, mpk, unknown) = wat11();
        let proof = generate_proof_selective(&e("alpha"), &e("s"), &k, &c, &mpk, &unknown);
        let proof = proof.expect("Wat11 admits a selective proof");
        assert!(!proof.benc_mats.is_empty());
        assert!(proof.rvectors_lone.iter().any(|(v, _)| v == &e("alpha")));
        assert!(proof.svectors_nonlone.iter().any(|(v, _)| v == &e("s")));
    }

    #[test]
    fn test_normalization_leads_with_master_key() {
        let (k, c, mpk, unknown) = wat11();
        let proof =
            generate_proof_selective(&e("alpha"), &e("s"), &k, &c, &mpk, &unknown).unwrap();
        let proof = normalize_substitutions(&e("alpha"), &e("s"), proof);
        let mk = proof
            .rvectors_lone
            .iter()
            .find(|(v, _)| v == &e("alpha"))
            .map(|(_, m)| m.clone())
            .unwrap();
        let s = proof
            .svectors_nonlone
            .iter()
            .find(|(v, _)| v == &e("s"))
            .map(|(_, m)| m.clone())
            .unwrap();
        assert!(!mk.entry(0).is_zero());
        assert!(!s.entry(0).is_zero());
        assert_eq!(mk.entry(0), s.entry(0));
    }

    #[test]
    fn test_kernel_products_finds_blinding_entry() {
        let (k, c, _, unknown) = wat11();
        let (found, eqs) = check_kernel_products(&e("alpha"), &e("s"), &k, &c, &unknown);
        assert!(found);
        assert!(!eqs.is_empty());
    }
}
