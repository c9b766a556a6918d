//! Attacks and analyses on published ABE schemes, asserting the exact
//! report strings.

use pairenc::{
    parse_expr, AnalysisWithCorruption, ConditionalDecryptionAttack, DecryptionAttack,
    DecryptionCorruptedVariable, DecryptionCorruptionModel, Expr, MasterKeyAttack,
    MasterKeyCorruptedVariable, MasterKeyCorruptionModel, MasterKeyParams, SecurityAttack,
};

fn e(s: &str) -> Expr {
    parse_expr(s).unwrap()
}

fn exprs(names: &[&str]) -> Vec<Expr> {
    names.iter().map(|n| e(n)).collect()
}

// NDCW15: accountable-authority CP-ABE with a complete decryption attack,
// no corruption required.
#[test]
fn test_ndcw15_decryption_attack() {
    let k = vec![
        e("alpha * (1/(b1 + x3)) + x2*b2*(1/(b1 + x3))"),
        e("x1"),
        e("x1 * b1"),
    ];
    let c = vec![e("s"), e("s * b1"), e("s * b2")];
    let gp = vec![e("b1"), e("b2"), e("1")];

    let mut attack = DecryptionAttack::new(
        e("alpha * s"),
        k,
        c,
        vec![],
        gp,
        exprs(&["alpha", "b1", "b2", "s"]),
    );
    attack.set_corruption_model(DecryptionCorruptionModel::NoCorruption);
    attack.run();

    assert_eq!(
        attack.show_solution().trim(),
        "[*] Decryption attack found: k0*c0*x3 + 1*k0*c1 + -x2/x1*k1*c2"
    );
}

// CM14: decentralized ABE broken by corrupting one attribute authority
// and interacting with a second one.
#[test]
fn test_cm14_decryption_attack_with_corruption() {
    let k = vec![e("(alpha_i + r) / b"), e("r")];
    let c = vec![e("s * b"), e("s * b2")];
    let mpk = vec![e("b")];

    let mut attack = DecryptionAttack::new(
        e("alpha_i * s"),
        k,
        c,
        mpk,
        vec![],
        exprs(&["alpha_i", "b", "b2", "r", "s"]),
    );
    attack.add_mpk_aai(e("b2"));
    attack.add_mpk_aaj(e("b"));
    attack.set_corruption_model(DecryptionCorruptionModel::AaExtended);
    attack.add_corruptable_var(DecryptionCorruptedVariable::MpkAAi, e("b2"));
    attack.run();

    assert_eq!(
        attack.show_solution().trim(),
        "[*] Decryption attack found: 1*k0[i]*c0 + -1/b2*k1[i]*c1"
    );
}

// PO17: same corruption setting as CM14, with the sign flipped in the key.
#[test]
fn test_po17_decryption_attack_with_corruption() {
    let k = vec![e("(alpha_i - r) / b"), e("r")];
    let c = vec![e("s * b"), e("s * b2")];
    let mpk = vec![e("b")];

    let mut attack = DecryptionAttack::new(
        e("alpha_i * s"),
        k,
        c,
        mpk,
        vec![],
        exprs(&["alpha_i", "b", "b2", "r", "s"]),
    );
    attack.add_mpk_aai(e("b2"));
    attack.add_mpk_aaj(e("b"));
    attack.set_corruption_model(DecryptionCorruptionModel::AaExtended);
    attack.add_corruptable_var(DecryptionCorruptedVariable::MpkAAi, e("b2"));
    attack.run();

    assert_eq!(
        attack.show_solution().trim(),
        "[*] Decryption attack found: 1*k0[i]*c0 + 1/b2*k1[i]*c1"
    );
}

// YJ14: the attribute scalar x leaks through a corrupted authority.
#[test]
fn test_yj14_decryption_attack_with_corruption() {
    let k = vec![e("alpha_i + x*b + r*bp"), e("r")];
    let c = vec![e("s"), e("s * bp")];
    let mpk = vec![e("b"), e("bp")];

    let mut attack = DecryptionAttack::new(
        e("alpha_i * s"),
        k,
        c,
        mpk,
        vec![],
        exprs(&["alpha_i", "b", "bp", "r", "s", "x"]),
    );
    attack.add_mpk_aaj(e("alpha_i"));
    attack.add_mpk_aaj(e("x"));
    attack.add_misc(e("x"));
    attack.set_corruption_model(DecryptionCorruptionModel::Aa);
    attack.add_corruptable_var(DecryptionCorruptedVariable::Misc, e("x"));
    attack.run();

    assert_eq!(
        attack.show_solution().trim(),
        "[*] Decryption attack found: 1*k0[i]*c0 + -1*k1[i]*c1 + -x*c0*mpk0"
    );
}

// LXXH16: master key attack after corrupting the central authority.
#[test]
fn test_lxxh16_master_key_attack() {
    let k = vec![e("alpha_i + r * b"), e("r")];

    let mut attack = MasterKeyAttack::new(e("alpha_i"), k, exprs(&["alpha_i", "r", "b"]));
    attack.add_mpk_ca(e("b"));
    attack.add_mpk_aa(e("alpha_i"));
    attack.set_corruption_model(MasterKeyCorruptionModel::MixedCa);
    attack.add_corruptable_var(MasterKeyCorruptedVariable::MpkCa, e("b"));
    attack.run();

    assert_eq!(
        attack.show_solution().trim(),
        "[*] Master key attack found: 1*k0[i][j] + -b*k1[i][j]"
    );
}

// QLZ13: master key attack with no corruption at all, despite the
// fractional key encodings.
#[test]
fn test_qlz13_master_key_attack() {
    let k = vec![
        e("r*b - rp*b1"),
        e("alpha + r*b + b1/(x + bp)"),
        e("(rp + 1/(x + bp)) * b1"),
    ];

    let mut attack = MasterKeyAttack::new(
        e("alpha"),
        k,
        exprs(&["alpha", "b", "b1", "bp", "r", "rp", "x"]),
    );
    attack.run();

    assert_eq!(
        attack.show_solution().trim(),
        "[*] Master key attack found: -1*k0 + 1*k1 + -1*k2"
    );
}

// MGZ19: the per-user randomness is handed out by the corrupted CA, so
// the added mpk encoding finishes the attack.
#[test]
fn test_mgz19_master_key_attack() {
    let k = vec![e("alpha_j + r * b_j")];

    let mut attack = MasterKeyAttack::new(e("alpha_j"), k, exprs(&["alpha_j", "b_j", "r"]));
    attack.add_mpk_aa(e("alpha_j"));
    attack.add_mpk_aa(e("b_j"));
    attack.add_mpk_ca(e("r"));
    attack.set_corruption_model(MasterKeyCorruptionModel::MixedCa);
    attack.add_mpk(e("b_j"));
    attack.add_corruptable_var(MasterKeyCorruptedVariable::MpkCa, e("r"));
    attack.run();

    assert_eq!(
        attack.show_solution().trim(),
        "[*] Master key attack found: 1*k0[i][j] + -r*mpk_i_j"
    );
}

// YJ12: global parameters join the key-encoding list; the corrupted
// authority reveals b/bp.
#[test]
fn test_yj12_master_key_attack() {
    let k = vec![e("r*b/bp + alpha_i/bp"), e("r")];

    let mut attack = MasterKeyAttack::new(e("alpha_i"), k, exprs(&["alpha_i", "r"]));
    attack.add_mpk_aa(e("alpha_i"));
    attack.add_mpk_aa(e("b/bp"));
    attack.add_gp_variable(e("bp"));
    attack.add_gp_variable(e("divb"));
    attack.set_corruption_model(MasterKeyCorruptionModel::MixedAa);
    attack.add_corruptable_var(MasterKeyCorruptedVariable::MpkAa, e("b/bp"));
    attack.run();

    assert_eq!(
        attack.show_solution().trim(),
        "[*] Master key attack found: bp*k0[i] + -b*k1[i]"
    );
}

// JLWW13: two single-attribute keys sharing their randomness combine into
// a conditional decryption attack.
#[test]
fn test_jlww13_conditional_decryption_attack() {
    let k_fixed = vec![e("alpha + r")];
    let k_att = vec![
        e("r + indexed_enc_rp_1 * att_mpk_group"),
        e("indexed_enc_rp_1"),
    ];
    let c_att = vec![
        e("lambda_policy_share * att_mpk_group"),
        e("lambda_policy_share"),
    ];

    let mut attack = ConditionalDecryptionAttack::new(
        e("alpha"),
        e("s"),
        vec![],
        k_fixed,
        k_att,
        vec![],
        c_att,
        exprs(&["alpha", "r", "s"]),
        vec!["rp".to_string()],
        1,
    );
    attack.run();

    assert_eq!(
        attack.show_solution()[0].trim(),
        "[*] Conditional decryption attack found: 1*k0*c1 + 1*k0*c3 + -1*k1*c1 + 1*k2*c0 + -1*k5*c3 + 1*k6*c2"
    );
}

// Wat11 passes the full AC17 security analysis.
#[test]
fn test_wat11_security_analysis() {
    let mut attack = SecurityAttack::new(
        e("alpha * s"),
        vec![e("alpha + r*b"), e("r*b0"), e("r")],
        vec![e("s*b - s1*b + sp*b1"), e("s"), e("sp"), e("s1*b + sp*b2")],
        exprs(&["b0", "b1", "b", "b2"]),
        exprs(&["alpha", "b", "b0", "b1", "b2", "r", "s", "s1", "sp"]),
    );
    attack.run();

    assert!(attack.trivial_secure);
    assert!(attack.collusion_secure);
    let sol = attack.show_solution();
    assert!(sol.contains("The pair encoding scheme satisfies the AC17 form."));
    assert!(sol.contains("Passed!"));
    assert!(sol.contains("secure against collusion"));
    let (proof, header) = attack.show_proof_split();
    assert!(proof.unwrap().contains("The selective proof"));
    assert!(header.is_some());
}

// RW13 admits verifying selective and co-selective proofs.
#[test]
fn test_rw13_proofs_verify() {
    use pairenc::{
        generate_proof_co_selective, generate_proof_selective, normalize_substitutions,
        verify_proof,
    };
    let k = vec![
        e("alpha + r*b"),
        e("r*bp + rp*(b0 + y*b1)"),
        e("r"),
        e("rp"),
    ];
    let c = vec![e("s*b + sp*bp"), e("sp*(b0 + x*b1)"), e("s"), e("sp")];
    let mpk = exprs(&["b0", "b1", "b", "bp"]);
    let unknown = exprs(&["alpha", "b", "b0", "b1", "bp", "r", "rp", "s", "sp"]);
    let (alpha, s) = (e("alpha"), e("s"));

    let selective = generate_proof_selective(&alpha, &s, &k, &c, &mpk, &unknown)
        .map(|p| normalize_substitutions(&alpha, &s, p))
        .expect("RW13 admits a selective proof");
    let (ok, log) = verify_proof(&alpha, &s, &k, &c, &mpk, &selective);
    assert!(ok, "selective proof log: {log}");

    let co_selective = generate_proof_co_selective(&alpha, &s, &k, &c, &mpk, &unknown)
        .map(|p| normalize_substitutions(&alpha, &s, p))
        .expect("RW13 admits a co-selective proof");
    let (ok, log) = verify_proof(&alpha, &s, &k, &c, &mpk, &co_selective);
    assert!(ok, "co-selective proof log: {log}");
}

// BSW07 is fractional, so the generalized path runs and finds a
// transcript.
#[test]
fn test_bsw07_generalized_security_analysis() {
    let mut attack = SecurityAttack::new(
        e("alpha * s"),
        vec![e("(alpha + r)/b"), e("r + rp*b0"), e("rp")],
        vec![e("s*b"), e("s"), e("s*b1")],
        exprs(&["b", "b0", "b1", "1"]),
        exprs(&["alpha", "b", "b0", "b1", "r", "rp", "s"]),
    );
    attack.run();

    assert!(attack.is_fractional());
    assert!(attack.trivial_secure);
    assert!(attack.collusion_secure);
}

// Boundary: empty ciphertext and key lists degrade to "no attack".
#[test]
fn test_empty_encodings_report_no_attack() {
    let mut attack = DecryptionAttack::new(
        e("alpha * s"),
        vec![],
        vec![],
        vec![],
        vec![],
        exprs(&["alpha", "s"]),
    );
    attack.run();
    assert_eq!(
        attack.show_solution().trim(),
        "[!] No decryption attack found"
    );
}

// Boundary: a target whose monomials the attacker cannot reach is
// detected at decomposition time.
#[test]
fn test_unreachable_target_is_no_attack() {
    let mut attack = MasterKeyAttack::new(
        e("alpha"),
        vec![e("r * b"), e("r")],
        exprs(&["alpha", "r", "b"]),
    );
    attack.run();
    assert_eq!(
        attack.show_solution().trim(),
        "[!] No Master key attack found"
    );
}

// The full analysis wrapper reports both the encodings and the attack.
#[test]
fn test_analysis_report_structure() {
    let params = MasterKeyParams {
        masterkey: e("alpha_i"),
        keyenco: vec![e("alpha_i + r*b"), e("r")],
        unknown: exprs(&["alpha_i", "r", "b"]),
        corruption_model: MasterKeyCorruptionModel::MixedCa,
        mpk_ca: vec![e("b")],
        mpk_aa: vec![e("alpha_i")],
        mpk_vars: vec![],
        gp_vars: vec![],
    };
    let corruptable = vec![(MasterKeyCorruptedVariable::MpkCa, e("b"))];
    let mut analysis =
        AnalysisWithCorruption::new(Some(params), None, Some(corruptable), None, None);
    analysis.run();
    let report = analysis.show_solution();
    assert_eq!(report.solutions[0], "mk_placeholder");
    assert!(report.solutions[1].contains("List of encodings:"));
    assert!(report.solutions[1].contains("List of variables obtained via corruption:"));
    assert!(report.solutions[1].contains("b from MPK_CA"));
}
