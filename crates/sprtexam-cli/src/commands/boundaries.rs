//! The `sprtexam boundaries` command.
//!
//! Prints the decision thresholds and the per-answer increments for either
//! an exam's configuration or ad-hoc parameters.

use std::path::PathBuf;

use anyhow::{Context, Result};

use sprtexam_core::model::SprtConfig;
use sprtexam_core::report::S_INDEX_DIGITS;
use sprtexam_core::statistics::{log_likelihood_delta, round_to};
use sprtexam_store::load_config_from;

pub fn execute(
    catalog_arg: Option<PathBuf>,
    exam: Option<String>,
    alpha: Option<f64>,
    beta: Option<f64>,
    p0: Option<f64>,
    p1: Option<f64>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let (label, mut sprt) = match (alpha, beta) {
        (Some(alpha), Some(beta)) => (
            "custom parameters".to_string(),
            SprtConfig {
                alpha,
                beta,
                ..SprtConfig::default()
            },
        ),
        _ => {
            let config = load_config_from(config_path.as_deref())?;
            let path = super::catalog_path(catalog_arg, &config)?;
            let catalogs = super::load_catalogs(&path)?;
            let catalog = super::select_exam(&catalogs, exam.as_deref())?;
            let sprt = catalog.exam.sprt_config.with_context(|| {
                format!("exam '{}' has no [sprt] section", catalog.exam.id)
            })?;
            (format!("{} ({})", catalog.exam.title, catalog.exam.id), sprt)
        }
    };
    if let Some(p0) = p0 {
        sprt.p0 = p0;
    }
    if let Some(p1) = p1 {
        sprt.p1 = p1;
    }
    sprt.validate()?;

    let limits = sprt.boundaries();
    let b = limits.rounded(S_INDEX_DIGITS);
    let on_correct = log_likelihood_delta(&sprt, true);
    let on_incorrect = log_likelihood_delta(&sprt, false);

    println!("SPRT limits for {label}");
    println!("  p0 = {}%, p1 = {}%", sprt.p0, sprt.p1);
    println!("  alpha = {}, beta = {}", sprt.alpha, sprt.beta);
    println!("  lower (approve) = {}", b.lower);
    println!("  upper (fail)    = {}", b.upper);
    println!(
        "  correct answer   {:+}",
        round_to(on_correct, S_INDEX_DIGITS)
    );
    println!(
        "  incorrect answer {:+}",
        round_to(on_incorrect, S_INDEX_DIGITS)
    );
    if on_correct < 0.0 {
        let to_approve = (limits.lower / on_correct).ceil();
        println!("  {to_approve} consecutive correct answers reach the lower limit");
    }

    Ok(())
}
