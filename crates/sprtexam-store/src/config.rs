//! Tool configuration and engine factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use sprtexam_core::engine::SprtEngine;
use sprtexam_core::parser::Catalog;
use sprtexam_core::selector::RandomPicker;

use crate::memory::{InMemoryAttemptStore, InMemoryCatalog};

/// Top-level sprtexam configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SprtexamConfig {
    /// Catalog file or directory used when no `--catalog` is given.
    #[serde(default)]
    pub catalog: Option<PathBuf>,
    /// Seed for the question draw; entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Output directory for session summaries.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Decimal places for the statistic in CLI output.
    #[serde(default = "default_round_digits")]
    pub round_digits: u32,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./sprtexam-results")
}
fn default_round_digits() -> u32 {
    4
}

impl Default for SprtexamConfig {
    fn default() -> Self {
        Self {
            catalog: None,
            seed: None,
            output_dir: default_output_dir(),
            round_digits: default_round_digits(),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        let Some(end) = result[start..].find('}') else {
            break;
        };
        let var_name = &result[start + 2..start + end];
        let value = std::env::var(var_name).unwrap_or_default();
        result = format!("{}{}{}", &result[..start], value, &result[start + end + 1..]);
    }
    result
}

fn resolve_path(path: &Path) -> PathBuf {
    PathBuf::from(resolve_env_vars(&path.to_string_lossy()))
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `sprtexam.toml` in the current directory
/// 2. `~/.config/sprtexam/config.toml`
///
/// Environment variable overrides: `SPRTEXAM_SEED`, `SPRTEXAM_CATALOG`.
pub fn load_config() -> Result<SprtexamConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<SprtexamConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from("sprtexam.toml");
            if local.exists() {
                Some(local)
            } else {
                dirs_path()
                    .map(|home| home.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            parse_config(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => SprtexamConfig::default(),
    };

    // Apply env var overrides
    if let Ok(seed) = std::env::var("SPRTEXAM_SEED") {
        let seed = seed
            .trim()
            .parse()
            .with_context(|| format!("SPRTEXAM_SEED is not an unsigned integer: {seed}"))?;
        config.seed = Some(seed);
    }
    if let Ok(catalog) = std::env::var("SPRTEXAM_CATALOG") {
        config.catalog = Some(PathBuf::from(catalog));
    }

    config.catalog = config.catalog.as_deref().map(resolve_path);
    config.output_dir = resolve_path(&config.output_dir);

    Ok(config)
}

/// Parse a config file's contents.
pub fn parse_config(content: &str) -> Result<SprtexamConfig> {
    Ok(toml::from_str(content)?)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("sprtexam"))
}

/// The stores behind an engine, kept for inspection and out-of-band
/// changes.
pub struct EngineParts {
    pub engine: SprtEngine,
    pub catalog: Arc<InMemoryCatalog>,
    pub attempts: Arc<InMemoryAttemptStore>,
}

/// Build an engine over in-memory stores loaded from `catalogs`.
///
/// With a seed the question draw is reproducible.
pub fn create_engine(catalogs: Vec<Catalog>, seed: Option<u64>) -> Result<EngineParts> {
    let catalog = Arc::new(
        InMemoryCatalog::from_catalogs(catalogs).context("failed to build exam catalog")?,
    );
    let attempts = Arc::new(InMemoryAttemptStore::new());
    let picker = match seed {
        Some(seed) => RandomPicker::seeded(seed),
        None => RandomPicker::from_entropy(),
    };

    let engine = SprtEngine::new(catalog.clone(), catalog.clone(), attempts.clone())
        .with_picker(Arc::new(picker));

    Ok(EngineParts {
        engine,
        catalog,
        attempts,
    })
}
