//! The `sprtexam simulate` command.
//!
//! Replays a scripted session against a catalog on a manual clock: each
//! scripted answer picks the correct or an incorrect option of whatever
//! question the engine serves next, and the clock moves by the scripted
//! elapsed time between showing and answering.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use serde::Deserialize;

use sprtexam_core::answer::parse_timestamp;
use sprtexam_core::engine::AnswerSubmission;
use sprtexam_core::model::{LevelId, OptionId, Question, QuestionId};
use sprtexam_core::report::SessionSummary;
use sprtexam_core::statistics::round_to;
use sprtexam_core::traits::Clock;
use sprtexam_store::{create_engine, load_config_from, ManualClock};

/// An answer script.
#[derive(Debug, Deserialize)]
struct Script {
    #[serde(default)]
    exam: Option<String>,
    #[serde(default = "default_student")]
    student: String,
    /// RFC 3339 start time; the current time when absent.
    #[serde(default)]
    started_at: Option<String>,
    #[serde(default)]
    answers: Vec<ScriptedAnswer>,
}

#[derive(Debug, Deserialize)]
struct ScriptedAnswer {
    correct: bool,
    #[serde(default = "default_elapsed")]
    elapsed_secs: i64,
}

fn default_student() -> String {
    "student".to_string()
}
fn default_elapsed() -> i64 {
    10
}

fn load_script(path: &Path) -> Result<Script> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read script: {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("failed to parse script: {}", path.display()))
}

/// One row of the console table.
struct Step {
    number: u32,
    question_id: QuestionId,
    level: String,
    correct: bool,
    late: bool,
    s_index: f64,
    verdict: String,
}

#[allow(clippy::too_many_arguments)]
pub async fn execute(
    catalog_arg: Option<PathBuf>,
    script_path: PathBuf,
    exam: Option<String>,
    seed: Option<u64>,
    student: Option<String>,
    output: Option<PathBuf>,
    format: String,
    config_path: Option<PathBuf>,
) -> Result<()> {
    anyhow::ensure!(
        matches!(format.as_str(), "text" | "json"),
        "unknown format '{format}', expected text or json"
    );

    let config = load_config_from(config_path.as_deref())?;
    let script = load_script(&script_path)?;
    let path = super::catalog_path(catalog_arg, &config)?;
    let catalogs = super::load_catalogs(&path)?;

    let wanted = exam.or(script.exam.clone());
    let exam_id = super::select_exam(&catalogs, wanted.as_deref())?.exam.id.clone();
    let student = student.unwrap_or_else(|| script.student.clone());
    let seed = seed.or(config.seed);

    let start = match &script.started_at {
        Some(raw) => parse_timestamp(raw).context("invalid started_at in script")?,
        None => Utc::now(),
    };
    let clock = Arc::new(ManualClock::new(start));

    let levels: HashMap<LevelId, String> = catalogs
        .iter()
        .flat_map(|c| c.levels.iter())
        .map(|l| (l.id, l.name.clone()))
        .collect();
    let parts = create_engine(catalogs, seed)?;
    let engine = parts.engine.with_clock(clock.clone());

    let attempt = engine.start_attempt(&exam_id, &student).await?;
    tracing::info!(
        attempt = %attempt.id,
        exam = %exam_id,
        seed = ?seed,
        "simulating {} scripted answers",
        script.answers.len()
    );

    let mut steps = Vec::new();
    for scripted in &script.answers {
        let Some(question) = engine.next_question(attempt.id).await? else {
            break;
        };
        let option_id = pick_option(&question, scripted.correct)?;

        let shown_at = clock.now();
        let answered_at = clock.advance(Duration::seconds(scripted.elapsed_secs));
        let submission = AnswerSubmission::new(question.id, option_id, shown_at.to_rfc3339())
            .answered_at(answered_at);
        let outcome = engine.submit_answer(attempt.id, submission).await?;

        steps.push(Step {
            number: outcome.question_number,
            question_id: outcome.question_id,
            level: levels
                .get(&question.level_id)
                .cloned()
                .unwrap_or_else(|| question.level_id.to_string()),
            correct: outcome.is_correct,
            late: outcome.time_violation,
            s_index: outcome.s_index,
            verdict: outcome.verdict.to_string(),
        });

        if outcome.verdict.is_terminal() {
            break;
        }
    }

    if !engine.attempt(attempt.id).await?.status.is_terminal() {
        eprintln!("Script ended before a decision, abandoning the attempt.");
        engine.abandon(attempt.id).await?;
    }

    let summary = engine.summary(attempt.id).await?;

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&summary)?),
        _ => print_session(&steps, &summary, config.round_digits),
    }

    let output = output.unwrap_or(config.output_dir);
    std::fs::create_dir_all(&output)
        .with_context(|| format!("failed to create output dir: {}", output.display()))?;
    let timestamp = Utc::now().format("%Y-%m-%dT%H%M%S");
    let summary_path = output.join(format!("summary-{timestamp}.json"));
    summary.save_json(&summary_path)?;
    eprintln!("Summary saved to: {}", summary_path.display());

    Ok(())
}

/// The first selectable option whose correctness matches `correct`.
fn pick_option(question: &Question, correct: bool) -> Result<OptionId> {
    question
        .options
        .iter()
        .find(|o| o.is_selectable() && o.is_correct == correct)
        .map(|o| o.id)
        .with_context(|| {
            format!(
                "question {} has no {} option",
                question.id,
                if correct { "correct" } else { "incorrect" }
            )
        })
}

fn print_session(steps: &[Step], summary: &SessionSummary, digits: u32) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec!["#", "Question", "Level", "Answer", "S-index", "Verdict"]);

    for step in steps {
        let answer = match (step.correct, step.late) {
            (true, _) => "correct",
            (false, true) => "late",
            (false, false) => "incorrect",
        };
        table.add_row(vec![
            Cell::new(step.number),
            Cell::new(step.question_id),
            Cell::new(&step.level),
            Cell::new(answer),
            Cell::new(format!("{:+}", round_to(step.s_index, digits))),
            Cell::new(&step.verdict),
        ]);
    }

    println!("{table}");
    println!();
    println!(
        "{} ({}) attempt {} for {}: {}",
        summary.exam_title, summary.exam_id, summary.attempt_number, summary.student_id, summary.status
    );
    println!(
        "  {} answered, {} correct, {} incorrect ({:.2}%)",
        summary.total_questions, summary.correct_answers, summary.incorrect_answers, summary.accuracy
    );
    println!(
        "  S-index {} (limits {} / {})",
        round_to(summary.s_index, digits),
        summary.boundaries.lower,
        summary.boundaries.upper
    );
    println!("  Consistency: {}", summary.consistency);
    for (name, level) in &summary.level_analysis.levels {
        println!(
            "  Level {name}: {}/{} correct{}",
            level.correct,
            level.questions_answered,
            if level.advanced { ", advanced" } else { "" }
        );
    }
}
