//! The `sprtexam show` command.

use std::path::PathBuf;

use anyhow::Result;

use sprtexam_core::report::SessionSummary;

pub fn execute(summary_path: PathBuf, format: String) -> Result<()> {
    let summary = SessionSummary::load_json(&summary_path)?;

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&summary)?),
        "markdown" | "md" => print!("{}", summary.to_markdown()),
        "text" => print_text(&summary),
        other => anyhow::bail!("unknown format '{other}', expected text, json or markdown"),
    }

    Ok(())
}

fn print_text(summary: &SessionSummary) {
    use comfy_table::{Cell, Table};

    println!(
        "{} ({}), student {} attempt {}",
        summary.exam_title, summary.exam_id, summary.student_id, summary.attempt_number
    );
    println!("Status: {}", summary.status);
    println!(
        "S-index: {} (limits {} / {}), consistency {}",
        summary.s_index, summary.boundaries.lower, summary.boundaries.upper, summary.consistency
    );
    if let Some(secs) = summary.duration_secs {
        println!("Duration: {secs}s");
    }

    let mut table = Table::new();
    table.set_header(vec!["Level", "Answered", "Correct", "Accuracy", "S-index", "Advanced"]);
    for (name, level) in &summary.level_analysis.levels {
        table.add_row(vec![
            Cell::new(name),
            Cell::new(level.questions_answered),
            Cell::new(level.correct),
            Cell::new(format!("{:.1}%", level.accuracy)),
            Cell::new(format!("{:.4}", level.s_index)),
            Cell::new(if level.advanced { "yes" } else { "no" }),
        ]);
    }
    println!("{table}");

    println!(
        "{} answered, {} correct ({:.2}%), {} late, {:.1}s average",
        summary.total_questions,
        summary.correct_answers,
        summary.accuracy,
        summary.time.violations,
        summary.time.avg_secs
    );
}
