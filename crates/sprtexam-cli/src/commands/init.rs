//! The `sprtexam init` command.

use std::path::Path;

use anyhow::{Context, Result};

pub fn execute() -> Result<()> {
    write_if_missing(Path::new("sprtexam.toml"), SAMPLE_CONFIG)?;
    write_if_missing(Path::new("catalogs/example.toml"), EXAMPLE_CATALOG)?;
    write_if_missing(Path::new("scripts/example.toml"), EXAMPLE_SCRIPT)?;

    println!("\nNext steps:");
    println!("  1. Run: sprtexam validate --catalog catalogs/example.toml");
    println!("  2. Run: sprtexam boundaries --catalog catalogs/example.toml");
    println!("  3. Run: sprtexam simulate --catalog catalogs/example.toml --script scripts/example.toml");

    Ok(())
}

fn write_if_missing(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        println!("{} already exists, skipping.", path.display());
        return Ok(());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;
    println!("Created {}", path.display());
    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# sprtexam configuration

catalog = "catalogs"
output_dir = "./sprtexam-results"
round_digits = 4
# seed = 42
"#;

const EXAMPLE_CATALOG: &str = r#"[exam]
id = "example"
title = "Example Exam"
description = "A two-level exam to get started"
max_questions = 10
max_attempts = 3
banks = [1]

[sprt]
p0 = 60.0
p1 = 40.0
alpha = 0.1
beta = 0.1
min_questions_per_level = 3
success_threshold_to_advance = 0.7

[[levels]]
id = 1
name = "basic"

[[levels]]
id = 2
name = "intermediate"

[[banks]]
id = 1
name = "Arithmetic"

[[questions]]
id = 1
bank = 1
level = 1
statement = "What is 2 + 2?"
time_secs = 30

[[questions.options]]
id = 11
text = "4"
correct = true

[[questions.options]]
id = 12
text = "5"
feedback = "Count again."

[[questions]]
id = 2
bank = 1
level = 1
statement = "What is 3 * 3?"
time_secs = 30

[[questions.options]]
id = 21
text = "6"
feedback = "That is 3 + 3."

[[questions.options]]
id = 22
text = "9"
correct = true

[[questions]]
id = 3
bank = 1
level = 1
statement = "What is 10 - 7?"
time_secs = 30

[[questions.options]]
id = 31
text = "3"
correct = true

[[questions.options]]
id = 32
text = "17"
feedback = "That is 10 + 7."

[[questions]]
id = 4
bank = 1
level = 2
statement = "What is 12 * 12?"

[[questions.options]]
id = 41
text = "144"
correct = true

[[questions.options]]
id = 42
text = "124"

[[questions]]
id = 5
bank = 1
level = 2
statement = "What is 2 to the power of 10?"

[[questions.options]]
id = 51
text = "1000"

[[questions.options]]
id = 52
text = "1024"
correct = true

[[questions]]
id = 6
bank = 1
level = 2
statement = "What is 81 / 9?"

[[questions.options]]
id = 61
text = "9"
correct = true

[[questions.options]]
id = 62
text = "8"
"#;

const EXAMPLE_SCRIPT: &str = r#"# One entry per answer, in order.
student = "example-student"

[[answers]]
correct = true
elapsed_secs = 12

[[answers]]
correct = true
elapsed_secs = 20

[[answers]]
correct = true
elapsed_secs = 15

[[answers]]
correct = true
elapsed_secs = 40

[[answers]]
correct = true
elapsed_secs = 25

[[answers]]
correct = true
elapsed_secs = 30
"#;
