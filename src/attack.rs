//! Shared attack reporting: per-instance message strings and the formatter
//! turning a coefficient vector into the published solution line.

use crate::expr::Expr;

/// Result and no-result message strings for one attack instance. Each
/// attack owns its copy; there is no shared default state.
#[derive(Clone, Debug)]
pub struct AttackMessages {
    pub found: String,
    pub not_found: String,
}

impl AttackMessages {
    pub fn decryption() -> Self {
        AttackMessages {
            found: "[*] Decryption attack found: ".into(),
            not_found: "[!] No decryption attack found".into(),
        }
    }

    pub fn master_key() -> Self {
        AttackMessages {
            found: "[*] Master key attack found: ".into(),
            not_found: "[!] No Master key attack found".into(),
        }
    }

    pub fn master_key_with_corruption() -> Self {
        AttackMessages {
            found: "[*] Master key attack with corruption found: ".into(),
            not_found: "[!] No Master key attack with corruption found".into(),
        }
    }

    pub fn conditional() -> Self {
        AttackMessages {
            found: "[*] Conditional decryption attack found: ".into(),
            not_found: "[!] No conditional decryption attack found".into(),
        }
    }
}

/// One attacker-computable value with its human-readable provenance label.
#[derive(Clone, Debug)]
pub struct LabeledProduct {
    pub op: Expr,
    pub label: String,
}

impl LabeledProduct {
    pub fn new(op: Expr, label: impl Into<String>) -> Self {
        LabeledProduct {
            op,
            label: label.into(),
        }
    }
}

/// Renders a found attack. Zero coefficients are skipped; each term joins
/// the coefficient and label strings with `*` in ascending byte order
/// (`k0*c0*x3`, `1*k0*c1`, `-x2/x1*k1*c2`).
pub fn format_solution(labels: &[String], coefficients: &[Expr], msg: &str) -> String {
    debug_assert_eq!(labels.len(), coefficients.len());
    let terms: Vec<String> = labels
        .iter()
        .zip(coefficients.iter())
        .filter(|(_, c)| !c.is_zero())
        .map(|(label, coeff)| {
            let c = coeff.to_string();
            if c.as_str() <= label.as_str() {
                format!("{c}*{label}")
            } else {
                format!("{label}*{c}")
            }
        })
        .collect();
    format!("{msg}{}", terms.join(" + "))
}
