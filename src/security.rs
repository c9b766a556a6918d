//! Security analysis orchestration.
//!
//! The pipeline decides between two paths. Schemes without fractions
//! whose blinding value has the `alpha * s` shape run the AC17 pipeline:
//! form check, trivial security, proof-based collusion check, FABEO
//! property, and a full proof transcript when everything passes. All
//! other schemes run the generalized trivial/collusion analysis.

use tracing::{debug, info};

use crate::ac17::{all_enc_contains_no_fractions, blinding_value_correct_form, correct_form, correct_form_silent};
use crate::decryption::fmt_expr_list;
use crate::expr::Expr;
use crate::fabeo::fabeo_properties;
use crate::proof_generation::{
    generate_proof_co_selective, generate_proof_selective, normalize_substitutions,
};
use crate::proof_verification::verify_proof;
use crate::trivial_collusion::{
    analysis_trivial_and_collusion_security, generate_the_proofs_and_check_collusion,
    verify_trivial_security,
};

pub const SELECTIVE_PROOF_HEADER: &str = "\n The selective proof: \n";
pub const CO_SELECTIVE_PROOF_HEADER: &str = "\n The co-selective proof: \n";

/// Generates, verifies and renders both proofs for a scheme that
/// satisfies the AC17 form.
pub fn generate_the_proofs(
    masterkey: &Expr,
    special_s: &Expr,
    kenc: &[Expr],
    cenc: &[Expr],
    benc: &[Expr],
    unknown: &[Expr],
) -> Vec<String> {
    let mut process_log: Vec<String> = Vec::new();
    let (kenc, cenc) = match correct_form_silent(kenc, cenc, benc, unknown) {
        Some(pair) => pair,
        None => return process_log,
    };

    process_log.push("\n== Generating a security proof for the following encodings: ==\n".into());
    process_log.push(format!("\t\tMPK encodings: \t\t\t{}\n", fmt_expr_list(benc)));
    process_log.push(format!("\t\tKey encodings: \t\t\t{}\n", fmt_expr_list(&kenc)));
    process_log.push(format!(
        "\t\tCiphertext encodings: \t{}\n",
        fmt_expr_list(&cenc)
    ));

    let selective = generate_proof_selective(masterkey, special_s, &kenc, &cenc, benc, unknown)
        .map(|p| normalize_substitutions(masterkey, special_s, p));
    match selective {
        Some(proof) => {
            process_log.push(SELECTIVE_PROOF_HEADER.into());
            process_log.push(proof.to_string());
            let (result, log) = verify_proof(masterkey, special_s, &kenc, &cenc, benc, &proof);
            process_log.push(log);
            if result {
                process_log.push("\n The selective proof verifies correctly. \n".into());
            } else {
                process_log.push("\n [!] The selective proof does *not* verify correctly! \n".into());
            }
        }
        None => process_log.push("\n No selective proof found.\n".into()),
    }

    let co_selective =
        generate_proof_co_selective(masterkey, special_s, &kenc, &cenc, benc, unknown)
            .map(|p| normalize_substitutions(masterkey, special_s, p));
    match co_selective {
        Some(proof) => {
            process_log.push(CO_SELECTIVE_PROOF_HEADER.into());
            process_log.push(proof.to_string());
            let (result, log) = verify_proof(masterkey, special_s, &kenc, &cenc, benc, &proof);
            process_log.push(log);
            if result {
                process_log.push("\n The co-selective proof verifies correctly. \n".into());
            } else {
                process_log
                    .push("\n [!] The co-selective proof does *not* verify correctly! \n".into());
            }
        }
        None => process_log.push("\n No co-selective proof found.\n".into()),
    }

    process_log
}

/// Every step of the AC17 security analysis, with the collected log and
/// the proof transcript when the scheme passes.
pub fn security_analysis(
    masterkey: &Expr,
    special_s: &Expr,
    kenc: &[Expr],
    cenc: &[Expr],
    benc: &[Expr],
    unknown: &[Expr],
) -> (bool, bool, String, Vec<String>) {
    let mut analysis_log: Vec<String> = Vec::new();
    let mut proof_log: Vec<String> = Vec::new();

    let form = correct_form(kenc, cenc, benc, unknown);
    analysis_log.push(form.log.clone());

    if !form.ok {
        analysis_log.push("\n Security analysis for AC17 schemes cannot be performed.".into());
        return (false, false, analysis_log.join("\n"), proof_log);
    }
    let (kenc, cenc) = (form.kenc, form.cenc);

    analysis_log.push("\n Performing security analysis on the following encodings:\n".into());
    analysis_log.push(format!("\t\tMPK encodings: \t\t\t{}\n", fmt_expr_list(benc)));
    analysis_log.push(format!("\t\tKey encodings: \t\t\t{}\n", fmt_expr_list(&kenc)));
    analysis_log.push(format!(
        "\t\tCiphertext encodings: \t{}\n",
        fmt_expr_list(&cenc)
    ));

    analysis_log.push("\n == Performing simple trivial security check.. ==".into());
    let (trivial_secure, log_trivial) =
        verify_trivial_security(masterkey, special_s, &kenc, &cenc, unknown);
    analysis_log.push(log_trivial);

    analysis_log.push("\n == Performing collusion security checks.. ==".into());
    let (collusion_secure, log_collusion) =
        generate_the_proofs_and_check_collusion(masterkey, special_s, &kenc, &cenc, benc, unknown);
    analysis_log.push(log_collusion);

    analysis_log.push(fabeo_properties(masterkey, special_s, &kenc, &cenc, benc, unknown));

    if trivial_secure && collusion_secure {
        proof_log = generate_the_proofs(masterkey, special_s, &kenc, &cenc, benc, unknown);
    }

    (
        trivial_secure,
        collusion_secure,
        analysis_log.join("\n"),
        proof_log,
    )
}

/// Analyzes the security of one scheme description.
pub struct SecurityAttack {
    key: Expr,
    k_encodings: Vec<Expr>,
    c_encodings: Vec<Expr>,
    mpk_encodings: Vec<Expr>,
    unknown: Vec<Expr>,
    pub trivial_secure: bool,
    pub collusion_secure: bool,
    is_fractional: Option<bool>,
    sol: Option<String>,
    proof_log: Vec<String>,
}

impl SecurityAttack {
    pub fn new(
        key: Expr,
        k_encodings: Vec<Expr>,
        c_encodings: Vec<Expr>,
        mpk_encodings: Vec<Expr>,
        unknown: Vec<Expr>,
    ) -> Self {
        SecurityAttack {
            key,
            k_encodings,
            c_encodings,
            mpk_encodings,
            unknown,
            trivial_secure: false,
            collusion_secure: false,
            is_fractional: None,
            sol: None,
            proof_log: Vec::new(),
        }
    }

    /// Moves a variable obtained by corruption out of the unknown set.
    pub fn add_corruptable_variable_generic(&mut self, corr: &Expr) {
        self.unknown.retain(|u| u != corr);
    }

    pub fn run(&mut self) {
        let fractional =
            !all_enc_contains_no_fractions(&self.k_encodings, &self.c_encodings, &self.unknown);
        self.is_fractional = Some(fractional);
        info!(fractional, "starting security analysis");

        let result_security;
        if !fractional {
            match blinding_value_correct_form(
                &self.key,
                &self.k_encodings,
                &self.c_encodings,
                &self.mpk_encodings,
                &self.unknown,
            ) {
                Some((alpha, special_s)) => {
                    let (trivial, collusion, log, proof_log) = security_analysis(
                        &alpha,
                        &special_s,
                        &self.k_encodings,
                        &self.c_encodings,
                        &self.mpk_encodings,
                        &self.unknown,
                    );
                    self.trivial_secure = trivial;
                    self.collusion_secure = collusion;
                    self.proof_log = proof_log;
                    result_security = log;
                }
                None => {
                    debug!("blinding value is not of the alpha*s form, using generalized checks");
                    let (trivial, collusion, log) = analysis_trivial_and_collusion_security(
                        &self.key,
                        &self.k_encodings,
                        &self.c_encodings,
                        &self.mpk_encodings,
                        &self.unknown,
                    );
                    self.trivial_secure = trivial;
                    self.collusion_secure = collusion;
                    result_security = log;
                }
            }
        } else {
            let (trivial, collusion, log) = analysis_trivial_and_collusion_security(
                &self.key,
                &self.k_encodings,
                &self.c_encodings,
                &self.mpk_encodings,
                &self.unknown,
            );
            self.trivial_secure = trivial;
            self.collusion_secure = collusion;
            result_security = log;
        }

        self.sol = Some(format!(
            "NOTE: If the scheme is MA-ABE you might try to run this check with corruption.\n\n{result_security}"
        ));
    }

    pub fn show_solution(&self) -> String {
        self.sol.clone().unwrap_or_default()
    }

    pub fn is_fractional(&self) -> bool {
        self.is_fractional.unwrap_or(false)
    }

    pub fn proof_log(&self) -> &[String] {
        &self.proof_log
    }

    /// The proof transcript and its header: everything up to the first
    /// proof separator is the header, the rest is the transcript body.
    pub fn show_proof_split(&self) -> (Option<String>, Option<String>) {
        if self.proof_log.is_empty() {
            return (None, None);
        }
        let mut header = Vec::new();
        let mut body = Vec::new();
        let mut in_body = false;
        for line in &self.proof_log {
            if line.as_str() == SELECTIVE_PROOF_HEADER {
                in_body = true;
            }
            if in_body {
                body.push(line.clone());
            } else {
                header.push(line.clone());
            }
        }
        (Some(body.join("\n")), Some(header.join("\n")))
    }
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
    fn test_wat11_full_analysis_secure() {
        let mut attack = SecurityAttack::new(
            e("alpha*s"),
            vec![e("alpha + r*b"), e("r*b0"), e("r")],
            vec![e("s*b - s1*b + sp*b1"), e("s"), e("sp"), e("s1*b + sp*b2")],
            exprs(&["b0", "b1", "b", "b2"]),
            exprs(&["alpha", "b", "b0", "b1", "b2", "r", "s", "s1", "sp"]),
        );
        attack.run();
        assert!(attack.trivial_secure);
        assert!(attack.collusion_secure);
        assert!(!attack.is_fractional());
        assert!(!attack.proof_log().is_empty());
        let sol = attack.show_solution();
        assert!(sol.starts_with("NOTE: If the scheme is MA-ABE"));
        assert!(sol.contains("satisfies the AC17 form"));
    }

    #[test]
    fn test_fractional_scheme_takes_generalized_path() {
        let mut attack = SecurityAttack::new(
            e("alpha*s"),
            vec![e("(alpha + r)/b"), e("r + rp*b0"), e("rp")],
            vec![e("s*b"), e("s"), e("s*b1")],
            exprs(&["b", "b0", "b1"]),
            exprs(&["alpha", "b", "b0", "b1", "r", "rp", "s"]),
        );
        attack.run();
        assert!(attack.is_fractional());
        assert!(attack.show_solution().contains("trivial security check"));
    }

    #[test]
    fn test_corruption_shrinks_unknown_set() {
        let mut attack = SecurityAttack::new(
            e("alpha*s"),
            vec![e("alpha + r*b")],
            vec![e("s*b")],
            exprs(&["b"]),
            exprs(&["alpha", "b", "r", "s"]),
        );
        attack.add_corruptable_variable_generic(&e("b"));
        assert_eq!(attack.unknown.len(), 3);
    }
}
