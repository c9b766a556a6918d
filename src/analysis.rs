//! Running several analyses over one scheme description, and batches of
//! independent schemes in parallel.

use rayon::prelude::*;
use tracing::info;

use crate::attack::AttackMessages;
use crate::config::{DecryptionParams, MasterKeyParams, SecurityParams};
use crate::decryption::{DecryptionAttack, DecryptionCorruptedVariable};
use crate::expr::Expr;
use crate::master_key::{MasterKeyAttack, MasterKeyCorruptedVariable, MasterKeyCorruptionModel};
use crate::security::SecurityAttack;

enum AttackInstance {
    Security(SecurityAttack),
    MasterKey(MasterKeyAttack),
    Decryption(DecryptionAttack),
}

struct Entry {
    attack: AttackInstance,
    enabled: bool,
}

/// Collected report of one full analysis run.
pub struct AnalysisReport {
    pub solutions: Vec<String>,
    pub proof_data: Option<String>,
    pub proof_header: Option<String>,
}

/// Builds and runs every analysis the supplied parameters enable:
/// security analysis, master key attack and decryption attack, each with
/// its corruption wiring. A `None` parameter struct means that analysis
/// is disabled.
#[derive(Default)]
pub struct AnalysisWithCorruption {
    list: Vec<Entry>,
}

impl AnalysisWithCorruption {
    pub fn new(
        master_key_params: Option<MasterKeyParams>,
        decryption_key_params: Option<DecryptionParams>,
        corruptable_vars_mk: Option<Vec<(MasterKeyCorruptedVariable, Expr)>>,
        corruptable_vars_dk: Option<Vec<(DecryptionCorruptedVariable, Expr)>>,
        security_analysis_params: Option<SecurityParams>,
    ) -> Self {
        let mut list = Vec::new();

        if let Some(params) = security_analysis_params {
            let mut attack = SecurityAttack::new(
                params.key,
                params.k_encodings,
                params.c_encodings,
                params.mpk_encodings,
                params.unknown,
            );
            for var in &params.corruptable_vars {
                attack.add_corruptable_variable_generic(var);
            }
            list.push(Entry {
                attack: AttackInstance::Security(attack),
                enabled: true,
            });
        }

        if let Some(params) = master_key_params {
            let mut attack =
                MasterKeyAttack::new(params.masterkey, params.keyenco, params.unknown);
            if params.corruption_model != MasterKeyCorruptionModel::NoCorruption {
                attack.set_messages(AttackMessages::master_key_with_corruption());
            }
            attack.set_corruption_model(params.corruption_model);
            for elem in params.mpk_ca {
                attack.add_mpk_ca(elem);
            }
            for elem in params.mpk_aa {
                attack.add_mpk_aa(elem);
            }
            for elem in params.mpk_vars {
                attack.add_mpk(elem);
            }
            for elem in params.gp_vars {
                attack.add_gp_variable(elem);
            }
            if let Some(vars) = &corruptable_vars_mk {
                for (kind, var) in vars {
                    attack.add_corruptable_var(*kind, var.clone());
                }
            }
            list.push(Entry {
                attack: AttackInstance::MasterKey(attack),
                enabled: true,
            });
        }

        if let Some(params) = decryption_key_params {
            let mut attack = DecryptionAttack::new(
                params.key,
                params.k_encodings,
                params.c_encodings,
                params.mpk_encodings,
                params.gp_encodings,
                params.unknown,
            );
            attack.set_corruption_model(params.corruption_model);
            for elem in params.mpk_aai {
                attack.add_mpk_aai(elem);
            }
            for elem in params.mpk_aaj {
                attack.add_mpk_aaj(elem);
            }
            for elem in params.misc_vars {
                attack.add_misc(elem);
            }
            if let Some(vars) = &corruptable_vars_dk {
                for (kind, var) in vars {
                    attack.add_corruptable_var(*kind, var.clone());
                }
            }
            list.push(Entry {
                attack: AttackInstance::Decryption(attack),
                enabled: true,
            });
        }

        AnalysisWithCorruption { list }
    }

    /// Runs every enabled analysis.
    pub fn run(&mut self) {
        for entry in self.list.iter_mut().filter(|e| e.enabled) {
            match &mut entry.attack {
                AttackInstance::Security(a) => a.run(),
                AttackInstance::MasterKey(a) => a.run(),
                AttackInstance::Decryption(a) => a.run(),
            }
        }
    }

    /// Runs the security analysis first and searches for attacks only when
    /// the scheme is reported insecure.
    pub fn run_logic(&mut self) {
        info!("starting complete analysis");
        let mut secure = false;
        for entry in self.list.iter_mut().filter(|e| e.enabled) {
            if let AttackInstance::Security(a) = &mut entry.attack {
                a.run();
                secure = a.trivial_secure || a.collusion_secure;
            }
        }
        if secure {
            for entry in self.list.iter_mut() {
                if !matches!(entry.attack, AttackInstance::Security(_)) {
                    entry.enabled = false;
                }
            }
        } else {
            info!("scheme reported insecure, looking for attacks");
            for entry in self.list.iter_mut().filter(|e| e.enabled) {
                match &mut entry.attack {
                    AttackInstance::MasterKey(a) => a.run(),
                    AttackInstance::Decryption(a) => a.run(),
                    AttackInstance::Security(_) => {}
                }
            }
        }
    }

    /// Collects the reports of every enabled analysis. Placeholder markers
    /// separate the sections for the presentation layer.
    pub fn show_solution(&self) -> AnalysisReport {
        let mut solutions = Vec::new();
        let mut proof_data = None;
        let mut proof_header = None;
        for entry in self.list.iter().filter(|e| e.enabled) {
            match &entry.attack {
                AttackInstance::Security(a) => {
                    solutions.push("sec_placeholder".to_string());
                    solutions.push(a.show_solution());
                    let (data, header) = a.show_proof_split();
                    proof_data = data;
                    proof_header = header;
                }
                AttackInstance::MasterKey(a) => {
                    solutions.push("mk_placeholder".to_string());
                    solutions.push(a.format_encodings_string());
                    solutions.push(a.show_solution());
                }
                AttackInstance::Decryption(a) => {
                    solutions.push("da_placeholder".to_string());
                    solutions.push(a.format_encodings_string());
                    solutions.push(a.show_solution());
                }
            }
        }
        AnalysisReport {
            solutions,
            proof_data,
            proof_header,
        }
    }

    /// Whether the attached security analysis detected a fractional
    /// scheme.
    pub fn is_scheme_fractional(&self) -> bool {
        self.list
            .iter()
            .filter(|e| e.enabled)
            .find_map(|e| match &e.attack {
                AttackInstance::Security(a) => Some(a.is_fractional()),
                _ => None,
            })
            .unwrap_or(false)
    }
}

/// Runs a batch of independent analyses in parallel. Analyses share no
/// state, so per-scheme parallelism is safe.
pub fn run_batch(analyses: &mut [AnalysisWithCorruption]) {
    analyses.par_iter_mut().for_each(|a| a.run());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parse_expr;

    fn e(s: &str) -> Expr {
        parse_expr(s).unwrap()
    }

    fn lxxh16_params() -> (MasterKeyParams, Vec<(MasterKeyCorruptedVariable, Expr)>) {
        (
            MasterKeyParams {
                masterkey: e("alpha_i"),
                keyenco: vec![e("alpha_i + r*b"), e("r")],
                unknown: vec![e("alpha_i"), e("r"), e("b")],
                corruption_model: MasterKeyCorruptionModel::MixedCa,
                mpk_ca: vec![e("b")],
                mpk_aa: vec![e("alpha_i")],
                mpk_vars: vec![],
                gp_vars: vec![],
            },
            vec![(MasterKeyCorruptedVariable::MpkCa, e("b"))],
        )
    }

    #[test]
    fn test_master_key_analysis_with_corruption() {
        let (params, corruptable) = lxxh16_params();
        let mut analysis =
            AnalysisWithCorruption::new(Some(params), None, Some(corruptable), None, None);
        analysis.run();
        let report = analysis.show_solution();
        assert_eq!(report.solutions[0], "mk_placeholder");
        assert!(report.solutions[2]
            .contains("[*] Master key attack with corruption found: 1*k0[i][j] + -b*k1[i][j]"));
    }

    #[test]
    fn test_batch_runs_all_entries() {
        let mut batch: Vec<AnalysisWithCorruption> = (0..3)
            .map(|_| {
                let (params, corruptable) = lxxh16_params();
                AnalysisWithCorruption::new(Some(params), None, Some(corruptable), None, None)
            })
            .collect();
        run_batch(&mut batch);
        for analysis in &batch {
            let report = analysis.show_solution();
            assert!(report.solutions[2].contains("Master key attack"));
        }
    }
}
