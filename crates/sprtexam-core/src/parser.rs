//! TOML exam catalog parser.
//!
//! A catalog file describes one exam together with the levels, banks and
//! questions it draws from. SPRT parameters are validated here, so an exam
//! with an invalid configuration never reaches the engine.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::answer::parse_timestamp;
use crate::model::{
    AnswerOption, BankId, DifficultyLevel, Exam, LevelId, Question, QuestionBank, SprtConfig,
};

/// Everything loaded from one catalog file.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    pub exam: Exam,
    pub levels: Vec<DifficultyLevel>,
    pub banks: Vec<QuestionBank>,
    pub questions: Vec<Question>,
}

/// Intermediate TOML structure for parsing catalog files.
#[derive(Debug, Deserialize)]
struct TomlCatalogFile {
    exam: TomlExam,
    #[serde(default)]
    sprt: Option<SprtConfig>,
    #[serde(default)]
    levels: Vec<TomlLevel>,
    #[serde(default)]
    banks: Vec<TomlBank>,
    #[serde(default)]
    questions: Vec<TomlQuestion>,
}

#[derive(Debug, Deserialize)]
struct TomlExam {
    id: String,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default = "default_max_questions")]
    max_questions: u32,
    #[serde(default = "default_max_attempts")]
    max_attempts: u32,
    #[serde(default = "default_true")]
    enforce_time_limits: bool,
    #[serde(default = "default_true")]
    enable_difficulty_progression: bool,
    #[serde(default)]
    banks: Vec<BankId>,
    #[serde(default)]
    starts_at: Option<String>,
    #[serde(default)]
    ends_at: Option<String>,
    #[serde(default = "default_true")]
    is_active: bool,
}

fn default_max_questions() -> u32 {
    20
}

fn default_max_attempts() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_time_secs() -> u32 {
    60
}

#[derive(Debug, Deserialize)]
struct TomlLevel {
    id: LevelId,
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct TomlBank {
    id: BankId,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default = "default_true")]
    is_active: bool,
}

#[derive(Debug, Deserialize)]
struct TomlQuestion {
    id: u64,
    bank: BankId,
    level: LevelId,
    #[serde(default)]
    topic: String,
    statement: String,
    #[serde(default = "default_time_secs")]
    time_secs: u32,
    #[serde(default = "default_true")]
    is_active: bool,
    #[serde(default)]
    options: Vec<TomlOption>,
}

#[derive(Debug, Deserialize)]
struct TomlOption {
    id: u64,
    text: String,
    #[serde(default)]
    correct: bool,
    #[serde(default)]
    feedback: String,
    #[serde(default = "default_true")]
    is_active: bool,
}

/// Parse a single TOML file into a [`Catalog`].
pub fn parse_catalog(path: &Path) -> Result<Catalog> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog file: {}", path.display()))?;

    parse_catalog_str(&content, path)
}

/// Parse a TOML string into a [`Catalog`] (useful for testing).
///
/// Fails when the TOML is malformed, a timestamp does not parse, or the
/// `[sprt]` section violates a parameter invariant.
pub fn parse_catalog_str(content: &str, source_path: &Path) -> Result<Catalog> {
    let parsed: TomlCatalogFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    if let Some(config) = &parsed.sprt {
        config.validate().with_context(|| {
            format!(
                "invalid [sprt] section for exam '{}' in {}",
                parsed.exam.id,
                source_path.display()
            )
        })?;
    }

    let window = |raw: Option<String>, field: &str| {
        raw.map(|r| {
            parse_timestamp(&r)
                .with_context(|| format!("invalid exam.{field} in {}", source_path.display()))
        })
        .transpose()
    };
    let starts_at = window(parsed.exam.starts_at, "starts_at")?;
    let ends_at = window(parsed.exam.ends_at, "ends_at")?;

    let exam = Exam {
        id: parsed.exam.id,
        title: parsed.exam.title,
        description: parsed.exam.description,
        max_questions: parsed.exam.max_questions,
        max_attempts: parsed.exam.max_attempts,
        enforce_time_limits: parsed.exam.enforce_time_limits,
        enable_difficulty_progression: parsed.exam.enable_difficulty_progression,
        question_banks: parsed.exam.banks,
        sprt_config: parsed.sprt,
        starts_at,
        ends_at,
        is_active: parsed.exam.is_active,
        deleted_at: None,
    };

    let levels = parsed
        .levels
        .into_iter()
        .map(|l| DifficultyLevel {
            id: l.id,
            name: l.name,
            description: l.description,
            deleted_at: None,
        })
        .collect();

    let banks = parsed
        .banks
        .into_iter()
        .map(|b| QuestionBank {
            id: b.id,
            name: b.name,
            description: b.description,
            is_active: b.is_active,
            deleted_at: None,
        })
        .collect();

    let questions = parsed
        .questions
        .into_iter()
        .map(|q| Question {
            id: q.id,
            bank_id: q.bank,
            level_id: q.level,
            topic: q.topic,
            statement: q.statement,
            time_secs: q.time_secs,
            options: q
                .options
                .into_iter()
                .map(|o| AnswerOption {
                    id: o.id,
                    text: o.text,
                    is_correct: o.correct,
                    feedback: o.feedback,
                    is_active: o.is_active,
                    deleted_at: None,
                })
                .collect(),
            is_active: q.is_active,
            deleted_at: None,
        })
        .collect();

    Ok(Catalog {
        exam,
        levels,
        banks,
        questions,
    })
}

/// Recursively load all `.toml` catalog files from a directory.
///
/// Files that fail to parse are skipped with a warning.
pub fn load_catalog_directory(dir: &Path) -> Result<Vec<Catalog>> {
    let mut catalogs = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut paths = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    paths.sort();

    for path in paths {
        if path.is_dir() {
            catalogs.extend(load_catalog_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_catalog(&path) {
                Ok(catalog) => catalogs.push(catalog),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(catalogs)
}

/// Load a single catalog file, or every catalog under a directory.
pub fn load_catalogs(path: &Path) -> Result<Vec<Catalog>> {
    if path.is_dir() {
        load_catalog_directory(path)
    } else {
        Ok(vec![parse_catalog(path)?])
    }
}

/// A warning from catalog validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    /// The entity the warning is about (e.g. `question 12`), if any.
    pub entity: Option<String>,
    /// Warning message.
    pub message: String,
}

impl ValidationWarning {
    fn new(entity: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            entity: Some(entity.into()),
            message: message.into(),
        }
    }

    fn exam(message: impl Into<String>) -> Self {
        Self {
            entity: None,
            message: message.into(),
        }
    }
}

/// Check a catalog for problems that do not prevent loading it but would
/// make sessions misbehave.
pub fn validate_catalog(catalog: &Catalog) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();
    let exam = &catalog.exam;

    if exam.sprt_config.is_none() {
        warnings.push(ValidationWarning::exam(
            "exam has no [sprt] section; sessions cannot be started",
        ));
    }
    if exam.max_questions == 0 {
        warnings.push(ValidationWarning::exam("max_questions is 0"));
    }
    if exam.max_attempts == 0 {
        warnings.push(ValidationWarning::exam("max_attempts is 0"));
    }
    if let (Some(start), Some(end)) = (exam.starts_at, exam.ends_at) {
        if end < start {
            warnings.push(ValidationWarning::exam("ends_at is before starts_at"));
        }
    }

    let mut level_ids = HashSet::new();
    for level in &catalog.levels {
        if !level_ids.insert(level.id) {
            warnings.push(ValidationWarning::new(
                format!("level {}", level.id),
                format!("duplicate level ID: {}", level.id),
            ));
        }
    }
    let mut bank_ids = HashSet::new();
    for bank in &catalog.banks {
        if !bank_ids.insert(bank.id) {
            warnings.push(ValidationWarning::new(
                format!("bank {}", bank.id),
                format!("duplicate bank ID: {}", bank.id),
            ));
        }
    }
    for bank in &exam.question_banks {
        if !bank_ids.contains(bank) {
            warnings.push(ValidationWarning::exam(format!(
                "exam references unknown bank {bank}"
            )));
        }
    }

    let mut question_ids = HashSet::new();
    let mut option_ids = HashSet::new();
    let mut per_level: HashMap<LevelId, usize> = HashMap::new();
    for question in &catalog.questions {
        let entity = format!("question {}", question.id);

        if !question_ids.insert(question.id) {
            warnings.push(ValidationWarning::new(
                &entity,
                format!("duplicate question ID: {}", question.id),
            ));
        }
        if !level_ids.contains(&question.level_id) {
            warnings.push(ValidationWarning::new(
                &entity,
                format!("unknown level {}", question.level_id),
            ));
        }
        if !bank_ids.contains(&question.bank_id) {
            warnings.push(ValidationWarning::new(
                &entity,
                format!("unknown bank {}", question.bank_id),
            ));
        } else if !exam.question_banks.contains(&question.bank_id) {
            warnings.push(ValidationWarning::new(
                &entity,
                format!("bank {} is not attached to the exam", question.bank_id),
            ));
        }
        if question.time_secs == 0 {
            warnings.push(ValidationWarning::new(&entity, "allowed time is 0 seconds"));
        }

        let active: Vec<_> = question.options.iter().filter(|o| o.is_selectable()).collect();
        if active.len() < 2 {
            warnings.push(ValidationWarning::new(
                &entity,
                format!("has {} active options, at least 2 expected", active.len()),
            ));
        }
        match active.iter().filter(|o| o.is_correct).count() {
            1 => {}
            0 => warnings.push(ValidationWarning::new(&entity, "has no correct option")),
            n => warnings.push(ValidationWarning::new(
                &entity,
                format!("has {n} correct options, exactly 1 expected"),
            )),
        }
        for option in &question.options {
            if !option_ids.insert(option.id) {
                warnings.push(ValidationWarning::new(
                    &entity,
                    format!("duplicate option ID: {}", option.id),
                ));
            }
        }

        if question.is_selectable() && exam.question_banks.contains(&question.bank_id) {
            *per_level.entry(question.level_id).or_default() += 1;
        }
    }

    for level in &catalog.levels {
        if !per_level.contains_key(&level.id) {
            warnings.push(ValidationWarning::new(
                format!("level {}", level.id),
                format!("level '{}' has no active questions", level.name),
            ));
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const VALID_TOML: &str = r#"
[exam]
id = "rust-101"
title = "Rust fundamentals"
max_questions = 10
max_attempts = 2
banks = [1]

[sprt]
p0 = 60
p1 = 40
alpha = 0.1
beta = 0.1

[[levels]]
id = 1
name = "basic"

[[levels]]
id = 2
name = "advanced"

[[banks]]
id = 1
name = "Ownership"

[[questions]]
id = 1
bank = 1
level = 1
statement = "Which keyword moves a closure's captures?"
time_secs = 30

[[questions.options]]
id = 10
text = "move"
correct = true
feedback = "move forces captures by value."

[[questions.options]]
id = 11
text = "ref"
feedback = "ref binds by reference in patterns."

[[questions]]
id = 2
bank = 1
level = 2
statement = "What does Pin guarantee?"

[[questions.options]]
id = 20
text = "The value will not move"
correct = true

[[questions.options]]
id = 21
text = "The value is heap allocated"
"#;

    fn parse(content: &str) -> Catalog {
        parse_catalog_str(content, &PathBuf::from("test.toml")).unwrap()
    }

    #[test]
    fn parse_valid_toml() {
        let catalog = parse(VALID_TOML);
        assert_eq!(catalog.exam.id, "rust-101");
        assert_eq!(catalog.exam.max_questions, 10);
        assert_eq!(catalog.exam.question_banks, vec![1]);
        assert_eq!(catalog.exam.sprt_config, Some(SprtConfig::default()));
        assert_eq!(catalog.levels.len(), 2);
        assert_eq!(catalog.questions.len(), 2);
        assert_eq!(catalog.questions[0].options.len(), 2);
        assert!(catalog.questions[0].options[0].is_correct);
        assert_eq!(catalog.questions[1].time_secs, 60);
        assert!(validate_catalog(&catalog).is_empty());
    }

    #[test]
    fn parse_missing_optional_fields() {
        let toml = r#"
[exam]
id = "minimal"
title = "Minimal"
"#;
        let catalog = parse(toml);
        assert_eq!(catalog.exam.max_questions, 20);
        assert_eq!(catalog.exam.max_attempts, 1);
        assert!(catalog.exam.enforce_time_limits);
        assert!(catalog.exam.is_active);
        assert!(catalog.exam.sprt_config.is_none());

        let warnings = validate_catalog(&catalog);
        assert!(warnings.iter().any(|w| w.message.contains("no [sprt] section")));
    }

    #[test]
    fn partial_sprt_section_uses_defaults() {
        let toml = r#"
[exam]
id = "strict"
title = "Strict"

[sprt]
alpha = 0.05
"#;
        let config = parse(toml).exam.sprt_config.unwrap();
        assert_eq!(config.alpha, 0.05);
        assert_eq!(config.beta, 0.1);
        assert_eq!(config.p0, 60.0);
        assert_eq!(config.min_questions_per_level, 3);
    }

    #[test]
    fn invalid_sprt_section_is_rejected() {
        let toml = r#"
[exam]
id = "backwards"
title = "Backwards"

[sprt]
p0 = 40
p1 = 60
"#;
        let err = parse_catalog_str(toml, &PathBuf::from("bad.toml")).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("invalid [sprt] section"), "{message}");
        assert!(message.contains("must be greater than p1"), "{message}");
    }

    #[test]
    fn availability_window_is_parsed() {
        let toml = r#"
[exam]
id = "windowed"
title = "Windowed"
starts_at = "2026-01-01T08:00:00Z"
ends_at = "2026-01-01T12:00:00+02:00"
"#;
        let exam = parse(toml).exam;
        assert!(exam.starts_at.is_some());
        assert_eq!(exam.ends_at.unwrap().to_rfc3339(), "2026-01-01T10:00:00+00:00");

        let bad = toml.replace("2026-01-01T08:00:00Z", "tomorrow");
        assert!(parse_catalog_str(&bad, &PathBuf::from("bad.toml")).is_err());
    }

    #[test]
    fn validate_question_problems() {
        let toml = r#"
[exam]
id = "messy"
title = "Messy"
banks = [1]

[sprt]

[[levels]]
id = 1
name = "basic"

[[levels]]
id = 2
name = "empty"

[[banks]]
id = 1
name = "Main"

[[banks]]
id = 2
name = "Detached"

[[questions]]
id = 1
bank = 1
level = 1
statement = "Only one option"
time_secs = 0

[[questions.options]]
id = 10
text = "a"

[[questions]]
id = 1
bank = 2
level = 9
statement = "Two correct"

[[questions.options]]
id = 10
text = "a"
correct = true

[[questions.options]]
id = 11
text = "b"
correct = true
"#;
        let warnings = validate_catalog(&parse(toml));
        let has = |needle: &str| warnings.iter().any(|w| w.message.contains(needle));

        assert!(has("duplicate question ID"));
        assert!(has("duplicate option ID"));
        assert!(has("allowed time is 0"));
        assert!(has("at least 2 expected"));
        assert!(has("no correct option"));
        assert!(has("2 correct options"));
        assert!(has("unknown level 9"));
        assert!(has("not attached to the exam"));
        assert!(has("'empty' has no active questions"));
        assert!(!has("'basic' has no active questions"));
    }

    #[test]
    fn parse_malformed_toml() {
        let bad = "this is not [valid toml }{";
        let result = parse_catalog_str(bad, &PathBuf::from("bad.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn load_directory_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("good.toml"), VALID_TOML).unwrap();
        std::fs::write(dir.path().join("bad.toml"), "not [valid").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(
            nested.join("other.toml"),
            VALID_TOML.replace("rust-101", "rust-201"),
        )
        .unwrap();

        let catalogs = load_catalog_directory(dir.path()).unwrap();
        let ids: Vec<_> = catalogs.iter().map(|c| c.exam.id.as_str()).collect();
        assert_eq!(ids, vec!["rust-101", "rust-201"]);
    }

    #[test]
    fn load_catalogs_accepts_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exam.toml");
        std::fs::write(&path, VALID_TOML).unwrap();
        assert_eq!(load_catalogs(&path).unwrap().len(), 1);
    }
}
