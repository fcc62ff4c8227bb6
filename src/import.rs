use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::course::{CourseConfig, SurveyScores};
use crate::error::AttainmentError;
use crate::gradebook::Gradebook;
use crate::models::{MarkSource, Student};

fn reader(path: &Path) -> anyhow::Result<csv::Reader<std::fs::File>> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))
}

pub fn load_roster(config: &CourseConfig, path: &Path) -> anyhow::Result<Gradebook> {
    let mut book = Gradebook::new(config.maxima());
    let mut reader = reader(path)?;

    for result in reader.deserialize::<Student>() {
        let student = result.with_context(|| format!("bad roster row in {}", path.display()))?;
        book.add_student(student)?;
    }

    tracing::debug!(students = book.students().len(), path = %path.display(), "loaded roster");
    Ok(book)
}

/// An empty `obtained` cell records the question as ungraded.
pub fn load_marks(book: &mut Gradebook, path: &Path) -> anyhow::Result<usize> {
    #[derive(Deserialize)]
    struct CsvRow {
        student_id: String,
        question_id: String,
        obtained: Option<f64>,
    }

    let mut reader = reader(path)?;
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut applied = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result.with_context(|| format!("bad marks row in {}", path.display()))?;
        if !seen.insert((row.student_id.clone(), row.question_id.clone())) {
            return Err(AttainmentError::validation(
                format!("marks.{}.{}", row.student_id, row.question_id),
                "mark entered more than once",
            )
            .into());
        }
        book.record(&row.student_id, &row.question_id, row.obtained)?;
        applied += 1;
    }

    tracing::debug!(
        rows = applied,
        graded = book.graded_count(),
        path = %path.display(),
        "loaded marks"
    );
    Ok(applied)
}

pub fn load_surveys(config: &CourseConfig, path: &Path) -> anyhow::Result<SurveyScores> {
    #[derive(Deserialize)]
    struct CsvRow {
        outcome: String,
        tool: String,
        score: f64,
    }

    let mut reader = reader(path)?;
    let mut surveys = SurveyScores::default();

    for result in reader.deserialize::<CsvRow>() {
        let row = result.with_context(|| format!("bad survey row in {}", path.display()))?;
        config.check_survey(&row.outcome, &row.tool)?;
        surveys.insert(&row.outcome, &row.tool, row.score)?;
    }

    tracing::debug!(scores = surveys.len(), path = %path.display(), "loaded surveys");
    Ok(surveys)
}

pub fn load_gradebook(
    config: &CourseConfig,
    roster: &Path,
    marks: &Path,
) -> anyhow::Result<Gradebook> {
    let mut book = load_roster(config, roster)?;
    load_marks(&mut book, marks)?;
    Ok(book)
}
