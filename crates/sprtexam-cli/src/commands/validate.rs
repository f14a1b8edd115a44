//! The `sprtexam validate` command.

use std::path::PathBuf;

use anyhow::Result;

use sprtexam_core::parser::validate_catalog;
use sprtexam_core::report::S_INDEX_DIGITS;
use sprtexam_store::load_config_from;

pub fn execute(catalog_arg: Option<PathBuf>, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let path = super::catalog_path(catalog_arg, &config)?;
    let catalogs = super::load_catalogs(&path)?;

    let mut total_warnings = 0;

    for catalog in &catalogs {
        println!(
            "Exam: {} ({}), {} questions, {} levels",
            catalog.exam.title,
            catalog.exam.id,
            catalog.questions.len(),
            catalog.levels.len()
        );
        if let Some(sprt) = &catalog.exam.sprt_config {
            let b = sprt.boundaries().rounded(S_INDEX_DIGITS);
            println!(
                "  p0={} p1={} alpha={} beta={} -> limits {} / {}",
                sprt.p0, sprt.p1, sprt.alpha, sprt.beta, b.lower, b.upper
            );
        }

        let warnings = validate_catalog(catalog);
        for w in &warnings {
            let prefix = w
                .entity
                .as_ref()
                .map(|entity| format!("  [{entity}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if total_warnings == 0 {
        println!("All catalogs valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
