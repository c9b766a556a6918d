//! Master key attacks, optionally under corruption of central or attribute
//! authorities.
//!
//! The search itself is the decryption solver restricted to the key
//! encodings, with the master key as the target. What this module adds is
//! the authority bookkeeping: which variables belong to which master key
//! pair, which of them corruption disclosed, and how appended mpk/gp
//! variables are labeled in the report.

use tracing::debug;

use crate::attack::{AttackMessages, LabeledProduct};
use crate::decryption::{fmt_expr_list, CorruptionRecord, DecryptionAttack};
use crate::expr::Expr;

/// Allowed corruption models in master key attacks.
///
/// The mixed models describe settings where central and attribute
/// authorities are both involved but only one kind is corruptable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MasterKeyCorruptionModel {
    NoCorruption,
    Ca,
    Aa,
    MixedCa,
    MixedAa,
}

/// Origin of corruptable variables in master key attacks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MasterKeyCorruptedVariable {
    MpkCa,
    MskCa,
    MpkAa,
    MskAa,
}

/// Maps an appended variable to the label family it reports under.
#[derive(Clone, Debug)]
struct TranslationEntry {
    name: String,
    kind: String,
}

pub struct MasterKeyAttack {
    messages: AttackMessages,
    corr_model: MasterKeyCorruptionModel,
    masterkey: Expr,
    keyenco: Vec<Expr>,
    unknown: Vec<Expr>,
    solution: Option<String>,
    translation_table: Vec<TranslationEntry>,
    mpk_ca: Vec<Expr>,
    msk_ca: Vec<Expr>,
    mpk_aa: Vec<Expr>,
    msk_aa: Vec<Expr>,
    corruption_map: Vec<CorruptionRecord>,
    labeled: Vec<LabeledProduct>,
}

impl MasterKeyAttack {
    pub fn new(masterkey: Expr, keyenco: Vec<Expr>, unknown: Vec<Expr>) -> Self {
        MasterKeyAttack {
            messages: AttackMessages::master_key(),
            corr_model: MasterKeyCorruptionModel::NoCorruption,
            masterkey,
            keyenco,
            unknown,
            solution: None,
            translation_table: Vec::new(),
            mpk_ca: Vec::new(),
            msk_ca: Vec::new(),
            mpk_aa: Vec::new(),
            msk_aa: Vec::new(),
            corruption_map: Vec::new(),
            labeled: Vec::new(),
        }
    }

    pub fn set_corruption_model(&mut self, model: MasterKeyCorruptionModel) {
        self.corr_model = model;
    }

    pub fn set_messages(&mut self, messages: AttackMessages) {
        self.messages = messages;
    }

    pub fn add_mpk_ca(&mut self, elem: Expr) {
        self.mpk_ca.push(elem);
    }

    pub fn add_msk_ca(&mut self, elem: Expr) {
        self.msk_ca.push(elem);
    }

    pub fn add_mpk_aa(&mut self, elem: Expr) {
        self.mpk_aa.push(elem);
    }

    pub fn add_msk_aa(&mut self, elem: Expr) {
        self.msk_aa.push(elem);
    }

    /// Appends a master public key variable to the key-encoding list. Under
    /// the mixed-CA model it reports under the `mpk_i_j` label family.
    pub fn add_mpk(&mut self, mpkv: Expr) {
        let kind = if self.corr_model == MasterKeyCorruptionModel::MixedCa {
            "mpk_i_j"
        } else {
            "mpk"
        };
        self.translation_table.push(TranslationEntry {
            name: mpkv.to_string(),
            kind: kind.into(),
        });
        self.keyenco.push(mpkv);
    }

    /// Appends a global parameter to the key-encoding list.
    pub fn add_gp_variable(&mut self, gpv: Expr) {
        self.translation_table.push(TranslationEntry {
            name: gpv.to_string(),
            kind: "gp".into(),
        });
        self.keyenco.push(gpv);
    }

    /// Discloses a corruptable variable. A no-op unless the variable is
    /// registered to one of the CA/AA master key pairs.
    pub fn add_corruptable_var(&mut self, origin: MasterKeyCorruptedVariable, corr: Expr) {
        let belongs = self.mpk_ca.contains(&corr)
            || self.mpk_aa.contains(&corr)
            || self.msk_ca.contains(&corr)
            || self.msk_aa.contains(&corr);
        if !belongs {
            return;
        }
        let entry = match origin {
            MasterKeyCorruptedVariable::MpkCa => {
                self.unknown.retain(|u| u != &corr);
                Some(CorruptionRecord {
                    name: corr,
                    origin: "MPK_CA".into(),
                })
            }
            MasterKeyCorruptedVariable::MpkAa => {
                self.unknown.retain(|u| u != &corr);
                Some(CorruptionRecord {
                    name: corr,
                    origin: "MPK_AA".into(),
                })
            }
            MasterKeyCorruptedVariable::MskCa | MasterKeyCorruptedVariable::MskAa => {
                debug!("origin not handled for master key corruption");
                None
            }
        };
        if let Some(entry) = entry {
            self.corruption_map.push(entry);
        }
    }

    /// Annotates the key encodings with their report labels, first
    /// occurrence deciding the index of structurally equal entries.
    fn gen_labeled(&self) -> Vec<LabeledProduct> {
        self.keyenco
            .iter()
            .map(|enc| {
                let idx = self
                    .keyenco
                    .iter()
                    .position(|x| x == enc)
                    .expect("encoding is in its own list");
                let mut label = match self.corr_model {
                    MasterKeyCorruptionModel::MixedCa => format!("k{idx}[i][j]"),
                    MasterKeyCorruptionModel::MixedAa => format!("k{idx}[i]"),
                    _ => format!("k{idx}"),
                };
                if matches!(
                    self.corr_model,
                    MasterKeyCorruptionModel::MixedCa | MasterKeyCorruptionModel::MixedAa
                ) {
                    let name = enc.to_string();
                    if let Some(entry) = self.translation_table.iter().find(|e| e.name == name) {
                        label = entry.kind.clone();
                    }
                }
                LabeledProduct::new(enc.clone(), label)
            })
            .collect()
    }

    /// Runs the attack: the decryption solver over the key encodings only.
    pub fn run(&mut self) {
        self.labeled = self.gen_labeled();
        let mut inner = DecryptionAttack::new_master_key_only(
            self.masterkey.clone(),
            self.labeled.clone(),
            self.unknown.clone(),
        );
        inner.set_messages(self.messages.clone());
        inner.run();
        self.solution = inner.solution().map(str::to_string);
    }

    pub fn show_solution(&self) -> String {
        match &self.solution {
            Some(sol) => format!("\n{sol}\n"),
            None => String::new(),
        }
    }

    pub fn solution(&self) -> Option<&str> {
        self.solution.as_deref()
    }

    pub fn unknown(&self) -> &[Expr] {
        &self.unknown
    }

    pub fn corruption_map(&self) -> &[CorruptionRecord] {
        &self.corruption_map
    }

    /// Multi-line description of the encodings, corruption model,
    /// authority structure and corruption map.
    pub fn format_encodings_string(&self) -> String {
        let mut out: Vec<String> = Vec::new();

        if !self.labeled.is_empty() {
            out.push("\nList of encodings:".into());
            for elem in &self.labeled {
                out.push(format!("\t {} : {}", elem.label, elem.op));
            }
        }

        match self.corr_model {
            MasterKeyCorruptionModel::MixedAa => out.push(
                "\nFor the corruption of an attribute authority AA[j] and attacking an \
                 attribute authority AA[i]."
                    .into(),
            ),
            MasterKeyCorruptionModel::Ca => {
                out.push("\nFor the corruption of the Central Authority.".into())
            }
            MasterKeyCorruptionModel::MixedCa => out.push(
                "\nFor the corruption of a Central Authority [i] in a model with several \
                 Attribute Authorities [j]."
                    .into(),
            ),
            _ => {}
        }

        if !self.translation_table.is_empty() {
            out.push("\nInformation on additional encodings:".into());
            for (idx, elem) in self.translation_table.iter().enumerate() {
                out.push(format!("\t[*] {} corresponds to {}{idx}", elem.name, elem.kind));
            }
            out.push(
                "\nNOTE: Global parameters gp[i] are added to the matrix as key encodings \
                 and could appear as k[i] elements."
                    .into(),
            );
        }

        if !self.mpk_aa.is_empty()
            || !self.msk_aa.is_empty()
            || !self.mpk_ca.is_empty()
            || !self.msk_ca.is_empty()
        {
            out.push("\nStructure of CA/AAs:\n".into());
            match self.corr_model {
                MasterKeyCorruptionModel::Ca => {
                    out.push(format!(
                        "\tContents of the CA MPK encodings: {}",
                        fmt_expr_list(&self.mpk_ca)
                    ));
                }
                MasterKeyCorruptionModel::Aa => {
                    out.push(format!(
                        "\tContents of the AA MPK encodings: {}",
                        fmt_expr_list(&self.mpk_aa)
                    ));
                }
                _ => {
                    out.push(format!(
                        "\tContents of the CA MPK encodings: {}",
                        fmt_expr_list(&self.mpk_ca)
                    ));
                    out.push(format!(
                        "\tContents of the AA MPK encodings: {}",
                        fmt_expr_list(&self.mpk_aa)
                    ));
                }
            }
        }

        if self.corr_model != MasterKeyCorruptionModel::NoCorruption {
            if self.corr_model == MasterKeyCorruptionModel::MixedAa {
                out.push("\nList of variables obtained via the corruption of AA[j]:".into());
            } else {
                out.push("\nList of variables obtained via corruption:".into());
            }
            for elem in &self.corruption_map {
                out.push(format!("\t{} from {}", elem.name, elem.origin));
            }
        }

        out.join("\n")
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
    fn test_no_corruption_attack() {
        // k0 and k1 - k0 differ exactly by the master key.
        let mut attack = MasterKeyAttack::new(
            e("alpha"),
            vec![e("r*b"), e("alpha + r*b")],
            exprs(&["alpha", "r", "b"]),
        );
        attack.run();
        assert_eq!(
            attack.show_solution().trim(),
            "[*] Master key attack found: -1*k0 + 1*k1"
        );
    }

    #[test]
    fn test_unregistered_corruptable_var_is_noop() {
        let mut attack = MasterKeyAttack::new(
            e("alpha"),
            vec![e("alpha + r*b"), e("r")],
            exprs(&["alpha", "r", "b"]),
        );
        let before = attack.unknown().to_vec();
        attack.add_corruptable_var(MasterKeyCorruptedVariable::MpkCa, e("b"));
        assert_eq!(attack.unknown(), &before[..]);
        assert!(attack.corruption_map().is_empty());
    }

    #[test]
    fn test_mixed_ca_labels() {
        let mut attack = MasterKeyAttack::new(
            e("alpha_j"),
            vec![e("alpha_j + r*b_j")],
            exprs(&["alpha_j", "b_j", "r"]),
        );
        attack.set_corruption_model(MasterKeyCorruptionModel::MixedCa);
        attack.add_mpk(e("b_j"));
        let labels: Vec<String> = attack.gen_labeled().iter().map(|l| l.label.clone()).collect();
        assert_eq!(labels, vec!["k0[i][j]".to_string(), "mpk_i_j".to_string()]);
    }
}
