//! JSON configuration parsing.
//!
//! Scheme descriptions arrive as JSON documents whose string fields are
//! expression syntax. A missing or malformed required field disables the
//! affected analysis (its parameter struct becomes `None`); parsing never
//! panics. Corruption models and corruptable-variable origins are mapped
//! to their closed enumerations here, at the boundary.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::decryption::{DecryptionCorruptedVariable, DecryptionCorruptionModel};
use crate::error::{AnalysisError, Result};
use crate::expr::{parse_expr, Expr};
use crate::master_key::{MasterKeyCorruptedVariable, MasterKeyCorruptionModel};

impl FromStr for DecryptionCorruptionModel {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "NoCorruption" => Ok(Self::NoCorruption),
            "AA" => Ok(Self::Aa),
            "AA_extended" => Ok(Self::AaExtended),
            other => Err(AnalysisError::ConfigurationInvalid(format!(
                "unknown decryption corruption model '{other}'"
            ))),
        }
    }
}

impl FromStr for MasterKeyCorruptionModel {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "NoCorruption" => Ok(Self::NoCorruption),
            "CA" => Ok(Self::Ca),
            "AA" => Ok(Self::Aa),
            "mixed_CA_corr" => Ok(Self::MixedCa),
            "mixed_AA_corr" => Ok(Self::MixedAa),
            other => Err(AnalysisError::ConfigurationInvalid(format!(
                "unknown master key corruption model '{other}'"
            ))),
        }
    }
}

impl FromStr for MasterKeyCorruptedVariable {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "MPK_CA" => Ok(Self::MpkCa),
            "MSK_CA" => Ok(Self::MskCa),
            "MPK_AA" => Ok(Self::MpkAa),
            "MSK_AA" => Ok(Self::MskAa),
            other => Err(AnalysisError::ConfigurationInvalid(format!(
                "unknown corruptable variable type '{other}'"
            ))),
        }
    }
}

impl FromStr for DecryptionCorruptedVariable {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "MPK_AAi" => Ok(Self::MpkAAi),
            "MSK_AAi" => Ok(Self::MskAAi),
            "misc" => Ok(Self::Misc),
            other => Err(AnalysisError::ConfigurationInvalid(format!(
                "unknown corruptable variable type '{other}'"
            ))),
        }
    }
}

/// Parameters for a master key attack.
#[derive(Clone, Debug)]
pub struct MasterKeyParams {
    pub masterkey: Expr,
    pub keyenco: Vec<Expr>,
    pub unknown: Vec<Expr>,
    pub corruption_model: MasterKeyCorruptionModel,
    pub mpk_ca: Vec<Expr>,
    pub mpk_aa: Vec<Expr>,
    pub mpk_vars: Vec<Expr>,
    pub gp_vars: Vec<Expr>,
}

/// Parameters for a decryption attack.
#[derive(Clone, Debug)]
pub struct DecryptionParams {
    pub key: Expr,
    pub k_encodings: Vec<Expr>,
    pub c_encodings: Vec<Expr>,
    pub mpk_encodings: Vec<Expr>,
    pub gp_encodings: Vec<Expr>,
    pub unknown: Vec<Expr>,
    pub corruption_model: DecryptionCorruptionModel,
    pub mpk_aai: Vec<Expr>,
    pub mpk_aaj: Vec<Expr>,
    pub misc_vars: Vec<Expr>,
}

/// Parameters for a security analysis.
#[derive(Clone, Debug)]
pub struct SecurityParams {
    pub key: Expr,
    pub k_encodings: Vec<Expr>,
    pub c_encodings: Vec<Expr>,
    pub mpk_encodings: Vec<Expr>,
    pub unknown: Vec<Expr>,
    pub corruptable_vars: Vec<Expr>,
}

/// Parameters for a conditional decryption attack.
#[derive(Clone, Debug)]
pub struct ConditionalParams {
    pub alpha: Expr,
    pub special_s: Expr,
    pub mpk: Vec<Expr>,
    pub k_fixed: Vec<Expr>,
    pub k_att: Vec<Expr>,
    pub c_fixed: Vec<Expr>,
    pub c_att: Vec<Expr>,
    pub unknown: Vec<Expr>,
    pub prefixes: Vec<String>,
    pub nr_indexed_encodings: u32,
}

#[derive(Deserialize)]
struct RawCorruptableVar {
    #[serde(rename = "type")]
    kind: String,
    var: String,
}

#[derive(Deserialize)]
struct MasterKeySection {
    k: Vec<String>,
    master_key: String,
    unknown_vars: Vec<String>,
    corruption_model: String,
    #[serde(rename = "MPK_CA")]
    mpk_ca: Vec<String>,
    #[serde(rename = "MPK_AA")]
    mpk_aa: Vec<String>,
    #[serde(rename = "MPK_vars")]
    mpk_vars: Vec<String>,
    #[serde(rename = "GP_vars")]
    gp_vars: Vec<String>,
    #[serde(default)]
    corruptable_vars: Vec<RawCorruptableVar>,
}

#[derive(Deserialize)]
struct DecryptionSection {
    key: String,
    k: Vec<String>,
    c: Vec<String>,
    mpk: Vec<String>,
    gp: Vec<String>,
    unknown_vars: Vec<String>,
    corruption_model: String,
    #[serde(rename = "MPK_AAi")]
    mpk_aai: Vec<String>,
    #[serde(rename = "MPK_AAj")]
    mpk_aaj: Vec<String>,
    misc_vars: Vec<String>,
    #[serde(default)]
    corruptable_vars: Vec<RawCorruptableVar>,
}

#[derive(Deserialize)]
struct SecuritySection {
    key: String,
    k: Vec<String>,
    c: Vec<String>,
    mpk: Vec<String>,
    unknown_vars: Vec<String>,
    #[serde(default)]
    corruptable_vars: Vec<String>,
}

#[derive(Deserialize)]
struct ConditionalSection {
    k_fixed: Vec<String>,
    k_indexed: Vec<String>,
    c_fixed: Vec<String>,
    c_indexed: Vec<String>,
    unknown: Vec<String>,
}

fn parse_list(list: &[String]) -> Result<Vec<Expr>> {
    list.iter().map(|s| parse_expr(s)).collect()
}

fn master_params_from(section: MasterKeySection) -> Result<(MasterKeyParams, Vec<(MasterKeyCorruptedVariable, Expr)>)> {
    let params = MasterKeyParams {
        keyenco: parse_list(&section.k)?,
        masterkey: parse_expr(&section.master_key)?,
        unknown: parse_list(&section.unknown_vars)?,
        corruption_model: section.corruption_model.parse()?,
        mpk_ca: parse_list(&section.mpk_ca)?,
        mpk_aa: parse_list(&section.mpk_aa)?,
        mpk_vars: parse_list(&section.mpk_vars)?,
        gp_vars: parse_list(&section.gp_vars)?,
    };
    let mut corruptable = Vec::new();
    for raw in &section.corruptable_vars {
        match (raw.kind.parse::<MasterKeyCorruptedVariable>(), parse_expr(&raw.var)) {
            (Ok(kind), Ok(var)) => corruptable.push((kind, var)),
            _ => warn!(kind = %raw.kind, var = %raw.var, "skipping malformed corruptable variable"),
        }
    }
    Ok((params, corruptable))
}

fn dec_params_from(section: DecryptionSection) -> Result<(DecryptionParams, Vec<(DecryptionCorruptedVariable, Expr)>)> {
    let params = DecryptionParams {
        key: parse_expr(&section.key)?,
        k_encodings: parse_list(&section.k)?,
        c_encodings: parse_list(&section.c)?,
        mpk_encodings: parse_list(&section.mpk)?,
        gp_encodings: parse_list(&section.gp)?,
        unknown: parse_list(&section.unknown_vars)?,
        corruption_model: section.corruption_model.parse()?,
        mpk_aai: parse_list(&section.mpk_aai)?,
        mpk_aaj: parse_list(&section.mpk_aaj)?,
        misc_vars: parse_list(&section.misc_vars)?,
    };
    let mut corruptable = Vec::new();
    for raw in &section.corruptable_vars {
        match (raw.kind.parse::<DecryptionCorruptedVariable>(), parse_expr(&raw.var)) {
            (Ok(kind), Ok(var)) => corruptable.push((kind, var)),
            _ => warn!(kind = %raw.kind, var = %raw.var, "skipping malformed corruptable variable"),
        }
    }
    Ok((params, corruptable))
}

fn security_params_from(section: SecuritySection) -> Result<SecurityParams> {
    Ok(SecurityParams {
        key: parse_expr(&section.key)?,
        k_encodings: parse_list(&section.k)?,
        c_encodings: parse_list(&section.c)?,
        mpk_encodings: parse_list(&section.mpk)?,
        unknown: parse_list(&section.unknown_vars)?,
        corruptable_vars: parse_list(&section.corruptable_vars)?,
    })
}

fn conditional_params_from(section: ConditionalSection) -> Result<ConditionalParams> {
    Ok(ConditionalParams {
        alpha: parse_expr("alpha")?,
        special_s: parse_expr("s")?,
        mpk: Vec::new(),
        k_fixed: parse_list(&section.k_fixed)?,
        k_att: parse_list(&section.k_indexed)?,
        c_fixed: parse_list(&section.c_fixed)?,
        c_att: parse_list(&section.c_indexed)?,
        unknown: parse_list(&section.unknown)?,
        prefixes: vec!["rp".to_string()],
        nr_indexed_encodings: 1,
    })
}

fn section_params<S, P>(value: &Value, convert: fn(S) -> Result<P>) -> Option<P>
where
    S: serde::de::DeserializeOwned,
{
    let section: S = match serde_json::from_value(value.clone()) {
        Ok(s) => s,
        Err(err) => {
            warn!(%err, "analysis section is missing or malformed, disabling it");
            return None;
        }
    };
    match convert(section) {
        Ok(p) => Some(p),
        Err(err) => {
            warn!(%err, "analysis section could not be interpreted, disabling it");
            None
        }
    }
}

/// Parsed configuration document with per-analysis parameter extraction.
pub struct ParseConfig {
    value: Value,
}

impl ParseConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    pub fn from_json_str(data: &str) -> Result<Self> {
        Ok(ParseConfig {
            value: serde_json::from_str(data)?,
        })
    }

    /// Master key attack parameters from a top-level document.
    pub fn generate_master_key_params(
        &self,
    ) -> Option<(MasterKeyParams, Vec<(MasterKeyCorruptedVariable, Expr)>)> {
        section_params(&self.value, master_params_from)
    }

    /// Decryption attack parameters from a top-level document.
    pub fn generate_dec_key_params(
        &self,
    ) -> Option<(DecryptionParams, Vec<(DecryptionCorruptedVariable, Expr)>)> {
        section_params(&self.value, dec_params_from)
    }

    /// Security analysis parameters from a top-level document.
    pub fn generate_security_analysis_params(&self) -> Option<SecurityParams> {
        section_params(&self.value, security_params_from)
    }

    /// Conditional attack parameters from a top-level document.
    pub fn generate_conditional_params(&self) -> Option<ConditionalParams> {
        section_params(&self.value, conditional_params_from)
    }

    /// Every analysis section of a combined document, each independently
    /// optional.
    #[allow(clippy::type_complexity)]
    pub fn generate_all_params(
        &self,
    ) -> (
        Option<SecurityParams>,
        Option<(MasterKeyParams, Vec<(MasterKeyCorruptedVariable, Expr)>)>,
        Option<(DecryptionParams, Vec<(DecryptionCorruptedVariable, Expr)>)>,
    ) {
        let security = self
            .value
            .get("security")
            .and_then(|v| section_params(v, security_params_from));
        let master = self
            .value
            .get("master_key")
            .and_then(|v| section_params(v, master_params_from));
        let dec = self
            .value
            .get("decryption")
            .and_then(|v| section_params(v, dec_params_from));
        (security, master, dec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_master_key_config_roundtrip() {
        let json = r#"{
            "k": ["alpha_i + r * b", "r"],
            "master_key": "alpha_i",
            "unknown_vars": ["alpha_i", "r", "b"],
            "corruption_model": "mixed_CA_corr",
            "MPK_CA": ["b"],
            "MPK_AA": ["alpha_i"],
            "MPK_vars": [],
            "GP_vars": [],
            "corruptable_vars": [{"type": "MPK_CA", "var": "b"}]
        }"#;
        let config = ParseConfig::from_json_str(json).unwrap();
        let (params, corruptable) = config.generate_master_key_params().unwrap();
        assert_eq!(params.corruption_model, MasterKeyCorruptionModel::MixedCa);
        assert_eq!(params.keyenco.len(), 2);
        assert_eq!(corruptable.len(), 1);
        assert_eq!(corruptable[0].0, MasterKeyCorruptedVariable::MpkCa);
    }

    #[test]
    fn test_malformed_section_disables_analysis() {
        let json = r#"{
            "k": ["alpha_i + ("],
            "master_key": "alpha_i",
            "unknown_vars": [],
            "corruption_model": "NoCorruption",
            "MPK_CA": [], "MPK_AA": [], "MPK_vars": [], "GP_vars": [],
            "corruptable_vars": []
        }"#;
        let config = ParseConfig::from_json_str(json).unwrap();
        assert!(config.generate_master_key_params().is_none());
    }

    #[test]
    fn test_unknown_corruption_model_disables_analysis() {
        let json = r#"{
            "key": "alpha*s",
            "k": ["alpha + r*b"], "c": ["s*b"], "mpk": ["b"], "gp": [],
            "unknown_vars": ["alpha", "r", "b", "s"],
            "corruption_model": "Everything",
            "MPK_AAi": [], "MPK_AAj": [], "misc_vars": [],
            "corruptable_vars": []
        }"#;
        let config = ParseConfig::from_json_str(json).unwrap();
        assert!(config.generate_dec_key_params().is_none());
    }

    #[test]
    fn test_combined_document_sections() {
        let json = r#"{
            "security": {
                "key": "alpha*s",
                "k": ["alpha + r*b"], "c": ["s*b", "s"], "mpk": ["b"],
                "unknown_vars": ["alpha", "r", "b", "s"],
                "corruptable_vars": []
            }
        }"#;
        let config = ParseConfig::from_json_str(json).unwrap();
        let (security, master, dec) = config.generate_all_params();
        assert!(security.is_some());
        assert!(master.is_none());
        assert!(dec.is_none());
    }
}
