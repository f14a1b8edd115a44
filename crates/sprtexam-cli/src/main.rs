//! sprtexam CLI: validate catalogs, inspect boundaries, and replay sessions.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "sprtexam", version, about = "SPRT adaptive exam engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate exam catalog TOML files
    Validate {
        /// Path to catalog file or directory
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the decision thresholds for an exam or for explicit error rates
    Boundaries {
        /// Catalog file or directory holding the exam
        #[arg(long, conflicts_with_all = ["alpha", "beta"])]
        catalog: Option<PathBuf>,

        /// Exam id (required when the catalog holds several exams)
        #[arg(long)]
        exam: Option<String>,

        /// Type-I error rate
        #[arg(long, requires = "beta")]
        alpha: Option<f64>,

        /// Type-II error rate
        #[arg(long, requires = "alpha")]
        beta: Option<f64>,

        /// Competence hypothesis, in percent
        #[arg(long)]
        p0: Option<f64>,

        /// Incompetence hypothesis, in percent
        #[arg(long)]
        p1: Option<f64>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Replay a scripted sequence of answers through the engine
    Simulate {
        /// Catalog file or directory holding the exam
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Answer script TOML
        #[arg(long)]
        script: PathBuf,

        /// Exam id (overrides the script's `exam`)
        #[arg(long)]
        exam: Option<String>,

        /// Seed for the question draw
        #[arg(long)]
        seed: Option<u64>,

        /// Student id (overrides the script's `student`)
        #[arg(long)]
        student: Option<String>,

        /// Output directory for the session summary
        #[arg(long)]
        output: Option<PathBuf>,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print a saved session summary
    Show {
        /// Summary JSON file
        #[arg(long)]
        summary: PathBuf,

        /// Output format: text, json, markdown
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Create starter config, example catalog, and example script
    Init,
}

#[tokio::main]
async fn main() {
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "sprtexam=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { catalog, config } => commands::validate::execute(catalog, config),
        Commands::Boundaries {
            catalog,
            exam,
            alpha,
            beta,
            p0,
            p1,
            config,
        } => commands::boundaries::execute(catalog, exam, alpha, beta, p0, p1, config),
        Commands::Simulate {
            catalog,
            script,
            exam,
            seed,
            student,
            output,
            format,
            config,
        } => {
            commands::simulate::execute(
                catalog, script, exam, seed, student, output, format, config,
            )
            .await
        }
        Commands::Show { summary, format } => commands::show::execute(summary, format),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
