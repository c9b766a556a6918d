//! Command-line front-end for analyzing ABE schemes from JSON inputs.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::{fmt, EnvFilter};

use pairenc::{AnalysisWithCorruption, ConditionalDecryptionAttack, ParseConfig};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum AnalysisKind {
    /// Master key attack.
    Mk,
    /// Decryption attack.
    Da,
    /// Security analysis.
    Sec,
    /// Conditional decryption attack.
    Cond,
    /// Every analysis type in the configuration.
    All,
    /// Run attacks only when the scheme is detected as insecure.
    Comp,
}

/// Analyzes ABE schemes described as pair encodings.
#[derive(Parser)]
#[command(name = "pairenc", version, about = "Pair-encodings security analyzer")]
struct Cli {
    /// The type of analysis to perform.
    #[arg(short, long, value_enum)]
    analysis: AnalysisKind,

    /// Configuration file describing the scheme, in JSON format.
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,
}

fn print_report(analysis: &AnalysisWithCorruption) {
    let report = analysis.show_solution();
    for line in &report.solutions {
        match line.as_str() {
            "sec_placeholder" => println!("\n[*] Security analysis results:\n"),
            "mk_placeholder" => println!("\n[*] Master key attack results:\n"),
            "da_placeholder" => println!("\n[*] Decryption key attack results:\n"),
            other => println!("{other}"),
        }
    }
    if let Some(header) = &report.proof_header {
        println!("{header}");
    }
    if let Some(proof) = &report.proof_data {
        println!("{proof}");
    }
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("[*] pairenc");
    let cli = Cli::parse();

    let config = ParseConfig::from_file(&cli.config)
        .with_context(|| format!("cannot read configuration {}", cli.config.display()))?;

    println!("\n[*] Analyzing scheme...\n");

    match cli.analysis {
        AnalysisKind::Mk => {
            let Some((params, corruptable)) = config.generate_master_key_params() else {
                bail!("the configuration does not describe a master key attack");
            };
            let mut analysis =
                AnalysisWithCorruption::new(Some(params), None, Some(corruptable), None, None);
            analysis.run();
            print_report(&analysis);
        }
        AnalysisKind::Da => {
            let Some((params, corruptable)) = config.generate_dec_key_params() else {
                bail!("the configuration does not describe a decryption attack");
            };
            let mut analysis =
                AnalysisWithCorruption::new(None, Some(params), None, Some(corruptable), None);
            analysis.run();
            print_report(&analysis);
        }
        AnalysisKind::Sec => {
            let Some(params) = config.generate_security_analysis_params() else {
                bail!("the configuration does not describe a security analysis");
            };
            let mut analysis = AnalysisWithCorruption::new(None, None, None, None, Some(params));
            analysis.run();
            print_report(&analysis);
        }
        AnalysisKind::Cond => {
            let Some(params) = config.generate_conditional_params() else {
                bail!("the configuration does not describe a conditional attack");
            };
            let mut attack = ConditionalDecryptionAttack::new(
                params.alpha,
                params.special_s,
                params.mpk,
                params.k_fixed,
                params.k_att,
                params.c_fixed,
                params.c_att,
                params.unknown,
                params.prefixes,
                params.nr_indexed_encodings,
            );
            attack.run();
            for msg in attack.show_solution() {
                println!("{msg}");
            }
        }
        AnalysisKind::All | AnalysisKind::Comp => {
            let (security, master, dec) = config.generate_all_params();
            if security.is_none() && master.is_none() && dec.is_none() {
                bail!("the configuration enables no analysis");
            }
            let (master_params, corruptable_mk) = match master {
                Some((p, c)) => (Some(p), Some(c)),
                None => (None, None),
            };
            let (dec_params, corruptable_dk) = match dec {
                Some((p, c)) => (Some(p), Some(c)),
                None => (None, None),
            };
            let mut analysis = AnalysisWithCorruption::new(
                master_params,
                dec_params,
                corruptable_mk,
                corruptable_dk,
                security,
            );
            match cli.analysis {
                AnalysisKind::Comp => analysis.run_logic(),
                _ => analysis.run(),
            }
            print_report(&analysis);
        }
    }
    Ok(())
}
