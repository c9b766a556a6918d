//! Decryption key attacks, optionally under attribute-authority corruption.

use std::fmt;

use tracing::debug;

use crate::attack::{format_solution, AttackMessages, LabeledProduct};
use crate::expr::Expr;
use crate::solver::solve_linear_attack;

/// Allowed corruption models in decryption key attacks.
///
/// `AaExtended` corrupts an attribute authority AA[i] where the
/// interaction with a second authority AA[j] is required: a second
/// attribute-independent ciphertext component is generated by the second
/// authority.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecryptionCorruptionModel {
    NoCorruption,
    Aa,
    AaExtended,
}

/// Origin of corruptable variables in decryption key attacks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecryptionCorruptedVariable {
    MpkAAi,
    MskAAi,
    Misc,
}

/// One disclosed variable together with its origin tag; reporting only.
#[derive(Clone, Debug)]
pub struct CorruptionRecord {
    pub name: Expr,
    pub origin: String,
}

/// Finds decryption attacks in a pair encoding, optionally assuming the
/// corruption of attribute authorities.
pub struct DecryptionAttack {
    messages: AttackMessages,
    corr_model: DecryptionCorruptionModel,
    key: Expr,
    unknown: Vec<Expr>,
    k_encodings: Vec<Expr>,
    c_encodings: Vec<Expr>,
    mpk_encodings: Vec<Expr>,
    gp_encodings: Vec<Expr>,
    is_master_key_attack: bool,
    labeled_keys: Option<Vec<LabeledProduct>>,
    mpk_aai: Vec<Expr>,
    mpk_aaj: Vec<Expr>,
    misc: Vec<Expr>,
    corruption_map: Vec<CorruptionRecord>,
    all_p: Vec<LabeledProduct>,
    sol: Option<String>,
}

impl DecryptionAttack {
    pub fn new(
        key: Expr,
        k_encodings: Vec<Expr>,
        c_encodings: Vec<Expr>,
        mpk_encodings: Vec<Expr>,
        gp_encodings: Vec<Expr>,
        unknown: Vec<Expr>,
    ) -> Self {
        let mut attack = DecryptionAttack {
            messages: AttackMessages::decryption(),
            corr_model: DecryptionCorruptionModel::NoCorruption,
            key,
            unknown,
            k_encodings,
            c_encodings,
            mpk_encodings,
            gp_encodings,
            is_master_key_attack: false,
            labeled_keys: None,
            mpk_aai: Vec::new(),
            mpk_aaj: Vec::new(),
            misc: Vec::new(),
            corruption_map: Vec::new(),
            all_p: Vec::new(),
            sol: None,
        };
        attack.regenerate_products();
        attack
    }

    /// Master-key-only mode: the product space is the supplied pre-labeled
    /// key list, with no pairing. Used by the master key attack.
    pub fn new_master_key_only(key: Expr, labeled_keys: Vec<LabeledProduct>, unknown: Vec<Expr>) -> Self {
        DecryptionAttack {
            messages: AttackMessages::master_key(),
            corr_model: DecryptionCorruptionModel::NoCorruption,
            key,
            unknown,
            k_encodings: Vec::new(),
            c_encodings: Vec::new(),
            mpk_encodings: Vec::new(),
            gp_encodings: Vec::new(),
            is_master_key_attack: true,
            all_p: labeled_keys.clone(),
            labeled_keys: Some(labeled_keys),
            mpk_aai: Vec::new(),
            mpk_aaj: Vec::new(),
            misc: Vec::new(),
            corruption_map: Vec::new(),
            sol: None,
        }
    }

    pub fn set_corruption_model(&mut self, model: DecryptionCorruptionModel) {
        self.corr_model = model;
    }

    pub fn set_messages(&mut self, messages: AttackMessages) {
        self.messages = messages;
    }

    /// Registers a component of the corrupted authority's public key.
    pub fn add_mpk_aai(&mut self, elem: Expr) {
        self.mpk_aai.push(elem);
    }

    /// Registers a component of the honest authority's public key.
    pub fn add_mpk_aaj(&mut self, elem: Expr) {
        self.mpk_aaj.push(elem);
    }

    /// Registers a miscellaneous authority variable.
    pub fn add_misc(&mut self, elem: Expr) {
        self.misc.push(elem);
    }

    /// Extends the mpk encodings (e.g. with material learned through
    /// corruption) and regenerates the product space.
    pub fn add_mpk_variable(&mut self, mpkv: Expr) {
        self.mpk_encodings.push(mpkv);
        self.regenerate_products();
    }

    /// Extends the global-parameter encodings and regenerates the product
    /// space.
    pub fn add_gp_variable(&mut self, gpv: Expr) {
        self.gp_encodings.push(gpv);
        self.regenerate_products();
    }

    /// Discloses a corruptable variable. A no-op unless the variable is
    /// registered to the corrupted authority's public key or misc list.
    pub fn add_corruptable_var(&mut self, origin: DecryptionCorruptedVariable, corr: Expr) {
        let belongs = self.mpk_aai.contains(&corr) || self.misc.contains(&corr);
        if !belongs {
            return;
        }
        let entry = match origin {
            DecryptionCorruptedVariable::MpkAAi => {
                self.disclose(&corr);
                Some(CorruptionRecord {
                    name: corr,
                    origin: "MPK_AAi".into(),
                })
            }
            DecryptionCorruptedVariable::Misc => {
                self.disclose(&corr);
                Some(CorruptionRecord {
                    name: corr,
                    origin: "AAi".into(),
                })
            }
            DecryptionCorruptedVariable::MskAAi => {
                debug!("origin not handled for decryption corruption");
                None
            }
        };
        if let Some(entry) = entry {
            self.corruption_map.push(entry);
        }
    }

    fn disclose(&mut self, corr: &Expr) {
        self.unknown.retain(|u| u != corr);
        if self.is_master_key_attack {
            if let Some(keys) = &self.labeled_keys {
                self.all_p = keys.clone();
            }
        } else {
            self.regenerate_products();
        }
    }

    fn key_label(&self, index: usize) -> String {
        if self.corr_model != DecryptionCorruptionModel::NoCorruption {
            format!("k{index}[i]")
        } else {
            format!("k{index}")
        }
    }

    /// First-occurrence index, so structurally equal encodings share one
    /// label.
    fn value_index(list: &[Expr], value: &Expr) -> usize {
        list.iter().position(|x| x == value).unwrap_or(0)
    }

    fn regenerate_products(&mut self) {
        let mut all = Vec::new();
        for i in &self.k_encodings {
            let ki = Self::value_index(&self.k_encodings, i);
            for j in &self.c_encodings {
                let cj = Self::value_index(&self.c_encodings, j);
                all.push(LabeledProduct::new(
                    i * j,
                    format!("{}*c{cj}", self.key_label(ki)),
                ));
            }
        }
        for i in &self.k_encodings {
            let ki = Self::value_index(&self.k_encodings, i);
            for j in &self.mpk_encodings {
                let mj = Self::value_index(&self.mpk_encodings, j);
                all.push(LabeledProduct::new(
                    i * j,
                    format!("{}*mpk{mj}", self.key_label(ki)),
                ));
            }
        }
        for i in &self.c_encodings {
            let ci = Self::value_index(&self.c_encodings, i);
            for j in &self.mpk_encodings {
                let mj = Self::value_index(&self.mpk_encodings, j);
                all.push(LabeledProduct::new(i * j, format!("c{ci}*mpk{mj}")));
            }
        }
        for i in &self.c_encodings {
            let ci = Self::value_index(&self.c_encodings, i);
            for j in &self.gp_encodings {
                let gj = Self::value_index(&self.gp_encodings, j);
                all.push(LabeledProduct::new(i * j, format!("c{ci}*gp{gj}")));
            }
        }
        for i in &self.k_encodings {
            let ki = Self::value_index(&self.k_encodings, i);
            for j in &self.gp_encodings {
                let gj = Self::value_index(&self.gp_encodings, j);
                all.push(LabeledProduct::new(
                    i * j,
                    format!("{}*gp{gj}", self.key_label(ki)),
                ));
            }
        }
        self.all_p = all;
    }

    /// Runs the attack search and stores the formatted result.
    pub fn run(&mut self) {
        let ops: Vec<Expr> = self.all_p.iter().map(|p| p.op.clone()).collect();
        let result = solve_linear_attack(&self.key, &ops, &self.unknown);
        self.sol = Some(match result {
            Some(solution) => {
                let labels: Vec<String> = solution
                    .kept_indices
                    .iter()
                    .map(|&i| self.all_p[i].label.clone())
                    .collect();
                format_solution(&labels, &solution.coefficients, &self.messages.found)
            }
            None => self.messages.not_found.clone(),
        });
    }

    /// The result of the attack, framed with surrounding blank lines.
    pub fn show_solution(&self) -> String {
        match &self.sol {
            Some(sol) => format!("\n{sol}\n"),
            None => String::new(),
        }
    }

    pub fn solution(&self) -> Option<&str> {
        self.sol.as_deref()
    }

    pub fn corruption_map(&self) -> &[CorruptionRecord] {
        &self.corruption_map
    }

    pub fn unknown(&self) -> &[Expr] {
        &self.unknown
    }

    /// Multi-line description of the involved encodings, corruption model
    /// and corruption map.
    pub fn format_encodings_string(&self) -> String {
        let mut out: Vec<String> = Vec::new();

        if !self.all_p.is_empty() {
            out.push("List of encodings:".into());
            for elem in &self.all_p {
                out.push(format!("\t {} : {}", elem.label, elem.op));
            }
        }

        for elem in &self.k_encodings {
            let i = Self::value_index(&self.k_encodings, elem);
            out.push(format!("\t{} : {}", self.key_label(i), elem));
        }
        for elem in &self.c_encodings {
            let i = Self::value_index(&self.c_encodings, elem);
            out.push(format!("\tc{i} : {elem}"));
        }
        for elem in &self.mpk_encodings {
            let i = Self::value_index(&self.mpk_encodings, elem);
            out.push(format!("\tmpk{i} : {elem}"));
        }
        for elem in &self.gp_encodings {
            let i = Self::value_index(&self.gp_encodings, elem);
            out.push(format!("\tgp{i} : {elem}"));
        }

        match self.corr_model {
            DecryptionCorruptionModel::Aa => {
                out.push("\nFor the corruption of an attribute authority AA[i].".into());
            }
            DecryptionCorruptionModel::AaExtended => {
                out.push(
                    "\nFor the corruption of an attribute authority AA[i] where c0 and c1 \
                     are obtained from different attribute authorities."
                        .into(),
                );
            }
            DecryptionCorruptionModel::NoCorruption => {}
        }

        if !self.mpk_aai.is_empty() || !self.mpk_aaj.is_empty() {
            out.push("\nStructure of CA/AAs:".into());
            match self.corr_model {
                DecryptionCorruptionModel::Aa => {
                    out.push(format!(
                        "\tMaster key pair of AA[i]: mpk[i]: {}",
                        fmt_expr_list(&self.mpk_aai)
                    ));
                }
                DecryptionCorruptionModel::AaExtended => {
                    out.push(format!(
                        "\tMaster key pair of AA[i]: mpk[i]: {}",
                        fmt_expr_list(&self.mpk_aai)
                    ));
                    out.push(format!(
                        "\tMaster key pair of AA[j]: mpk[j]: {}",
                        fmt_expr_list(&self.mpk_aaj)
                    ));
                }
                DecryptionCorruptionModel::NoCorruption => {}
            }
        }

        if self.corr_model != DecryptionCorruptionModel::NoCorruption {
            out.push("\nList of variables obtained via corruption:".into());
            for elem in &self.corruption_map {
                out.push(format!("\t{} from {}", elem.name, elem.origin));
            }
        }

        out.join("\n")
    }
}

pub(crate) fn fmt_expr_list(list: &[Expr]) -> String {
    let inner: Vec<String> = list.iter().map(|e| e.to_string()).collect();
    format!("[{}]", inner.join(", "))
}

impl fmt::Debug for DecryptionAttack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptionAttack")
            .field("corr_model", &self.corr_model)
            .field("products", &self.all_p.len())
            .finish()
    }
}
