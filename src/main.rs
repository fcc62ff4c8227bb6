use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use obe_attainment::attainment::student_rows;
use obe_attainment::course::{self, CourseConfig, SurveyScores};
use obe_attainment::gradebook::Gradebook;
use obe_attainment::models::MarkSource;
use obe_attainment::{config, import, report};

#[derive(Parser)]
#[command(name = "attainment")]
#[command(about = "Course and program outcome attainment calculator", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Args)]
struct Inputs {
    /// Course configuration (TOML)
    #[arg(long, default_value = "course.toml")]
    config: PathBuf,
    /// Roster CSV: id,name,enrollment
    #[arg(long, default_value = "roster.csv")]
    roster: PathBuf,
    /// Marks CSV: student_id,question_id,obtained
    #[arg(long, default_value = "marks.csv")]
    marks: PathBuf,
    /// Survey CSV: outcome,tool,score
    #[arg(long)]
    surveys: Option<PathBuf>,
}

struct Loaded {
    config: CourseConfig,
    book: Gradebook,
    surveys: SurveyScores,
}

impl Inputs {
    fn load(&self) -> anyhow::Result<Loaded> {
        let config = config::load(&self.config)?;
        let book = import::load_gradebook(&config, &self.roster, &self.marks)?;
        let surveys = match self.surveys.as_deref() {
            Some(path) => import::load_surveys(&config, path)?,
            None => {
                if config.indirect.is_some() {
                    tracing::warn!("indirect tools configured but no --surveys file given");
                }
                SurveyScores::default()
            }
        };
        Ok(Loaded {
            config,
            book,
            surveys,
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration and input files
    Check {
        #[command(flatten)]
        inputs: Inputs,
    },
    /// Print outcome attainment
    Score {
        #[command(flatten)]
        inputs: Inputs,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write the per-student attainment sheet as CSV
    Sheet {
        #[command(flatten)]
        inputs: Inputs,
        #[arg(long, default_value = "sheet.csv")]
        out: PathBuf,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        inputs: Inputs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Check { inputs } => {
            let loaded = inputs.load()?;
            course::compute(&loaded.config, &loaded.book, &loaded.surveys)?;
            println!(
                "{}: {} outcomes, {} students, {} graded marks. Inputs valid.",
                loaded.config.course,
                loaded.config.outcomes().len(),
                loaded.book.students().len(),
                loaded.book.graded_count()
            );
        }
        Commands::Score { inputs, json } => {
            let loaded = inputs.load()?;
            let result = course::compute(&loaded.config, &loaded.book, &loaded.surveys)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
                return Ok(());
            }

            if result.student_count == 0 {
                println!("No students on the roster.");
                return Ok(());
            }

            println!("Outcome attainment for {}:", result.course);
            for outcome in result.outcomes.iter() {
                println!(
                    "- {} {}/{} met ({:.1}%) level {}, final {:.2} (level {})",
                    outcome.outcome,
                    outcome.cie.met_count,
                    outcome.cie.total_count,
                    outcome.cie.percentage,
                    outcome.cie.level,
                    outcome.final_score,
                    outcome.final_level
                );
            }
            for program in result.programs.iter() {
                println!("- {} {:.2}", program.program, program.score);
            }
        }
        Commands::Sheet { inputs, out } => {
            let loaded = inputs.load()?;
            let rows = student_rows(
                &loaded.config.assessments,
                loaded.config.exam.as_ref(),
                &loaded.book,
                loaded.config.target_percent,
            )?;
            let file = std::fs::File::create(&out)
                .with_context(|| format!("failed to create {}", out.display()))?;
            report::write_sheet(file, &loaded.config, &rows)?;
            println!("Sheet with {} students written to {}.", rows.len(), out.display());
        }
        Commands::Report { inputs, out } => {
            let loaded = inputs.load()?;
            let result = course::compute(&loaded.config, &loaded.book, &loaded.surveys)?;
            let today = chrono::Utc::now().date_naive();
            let report = report::build_report(today, &result);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
