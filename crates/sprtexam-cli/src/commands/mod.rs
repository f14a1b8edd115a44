pub mod boundaries;
pub mod init;
pub mod show;
pub mod simulate;
pub mod validate;

use std::path::{Path, PathBuf};

use anyhow::Result;

use sprtexam_core::parser::Catalog;
use sprtexam_store::SprtexamConfig;

/// The catalog path from the command line, else from the config file.
pub fn catalog_path(arg: Option<PathBuf>, config: &SprtexamConfig) -> Result<PathBuf> {
    arg.or_else(|| config.catalog.clone()).ok_or_else(|| {
        anyhow::anyhow!("no catalog given: pass --catalog or set `catalog` in sprtexam.toml")
    })
}

/// Load a catalog file, or every catalog in a directory; an empty
/// directory is an error.
pub fn load_catalogs(path: &Path) -> Result<Vec<Catalog>> {
    let catalogs = sprtexam_core::parser::load_catalogs(path)?;
    anyhow::ensure!(
        !catalogs.is_empty(),
        "no valid catalogs found in {}",
        path.display()
    );
    Ok(catalogs)
}

/// Pick the exam named `wanted`, or the only exam when none is named.
pub fn select_exam<'a>(catalogs: &'a [Catalog], wanted: Option<&str>) -> Result<&'a Catalog> {
    match wanted {
        Some(id) => catalogs.iter().find(|c| c.exam.id == id).ok_or_else(|| {
            anyhow::anyhow!(
                "exam '{id}' not found. Available: {:?}",
                exam_ids(catalogs)
            )
        }),
        None => match catalogs {
            [only] => Ok(only),
            _ => anyhow::bail!(
                "several exams loaded, pick one with --exam. Available: {:?}",
                exam_ids(catalogs)
            ),
        },
    }
}

fn exam_ids(catalogs: &[Catalog]) -> Vec<&str> {
    catalogs.iter().map(|c| c.exam.id.as_str()).collect()
}
