use std::fmt::Write;

use chrono::NaiveDate;

use crate::attainment::StudentRow;
use crate::course::{CourseAttainment, CourseConfig};

fn score_cell(score: Option<f64>) -> String {
    score.map(|v| format!("{v:.2}")).unwrap_or_else(|| "-".to_string())
}

pub fn build_report(generated_on: NaiveDate, result: &CourseAttainment) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Course Attainment Report: {}", result.course);
    let _ = writeln!(
        output,
        "Generated on {} for {} students (individual target {:.0}%)",
        generated_on, result.student_count, result.target_percent
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Outcome Attainment");

    if result.outcomes.is_empty() {
        let _ = writeln!(output, "No outcomes configured for this course.");
    } else {
        let _ = writeln!(
            output,
            "| Outcome | Met | CIE % | CIE Level | SEE Level | Direct | Indirect | Final | Level |"
        );
        let _ = writeln!(output, "|---|---|---|---|---|---|---|---|---|");
        for outcome in result.outcomes.iter() {
            let _ = writeln!(
                output,
                "| {} | {}/{} | {:.1} | {} | {} | {:.2} | {} | {:.2} | {} |",
                outcome.outcome,
                outcome.cie.met_count,
                outcome.cie.total_count,
                outcome.cie.percentage,
                outcome.cie.level,
                outcome
                    .see
                    .as_ref()
                    .map(|see| see.level.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                outcome.direct_score,
                score_cell(outcome.indirect_score),
                outcome.final_score,
                outcome.final_level
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Question Summary");

    if result.questions.is_empty() {
        let _ = writeln!(output, "No questions configured for this course.");
    } else {
        for question in result.questions.iter() {
            let _ = writeln!(
                output,
                "- {} ({}, {}): {} Y of {} ({:.1}%), level {}",
                question.question_id,
                question.assessment,
                question.outcome,
                question.met_count,
                question.total_count,
                question.percentage,
                question.level
            );
        }
    }

    if let Some(exam) = result.exam.as_ref() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## External Exam");
        let _ = writeln!(
            output,
            "- {}: {} Y of {} ({:.1}%), level {}",
            exam.outcome, exam.met_count, exam.total_count, exam.percentage, exam.level
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Program Outcomes");

    if result.programs.is_empty() {
        let _ = writeln!(output, "No articulation matrix configured.");
    } else {
        for program in result.programs.iter() {
            let _ = writeln!(
                output,
                "- {}: {:.2} from {} course outcomes",
                program.program, program.score, program.course_outcomes
            );
        }
    }

    let pending: Vec<_> = result
        .outcomes
        .iter()
        .filter(|o| o.cie.graded_count < o.cie.total_count)
        .collect();
    let _ = writeln!(output);
    let _ = writeln!(output, "## Pending Grading");

    if pending.is_empty() {
        let _ = writeln!(output, "All students graded on every outcome.");
    } else {
        for outcome in pending {
            let _ = writeln!(
                output,
                "- {}: {} of {} students ungraded (counted as not met)",
                outcome.outcome,
                outcome.cie.total_count - outcome.cie.graded_count,
                outcome.cie.total_count
            );
        }
    }

    output
}

fn mark_cell(mark: Option<f64>) -> String {
    mark.map(|v| v.to_string()).unwrap_or_default()
}

fn scaled_cell(mark: Option<f64>) -> String {
    mark.map(|v| format!("{v:.2}")).unwrap_or_default()
}

pub fn write_sheet<W: std::io::Write>(
    writer: W,
    config: &CourseConfig,
    rows: &[StudentRow],
) -> anyhow::Result<()> {
    let mut out = csv::Writer::from_writer(writer);

    let mut header = vec!["sl_no".to_string(), "enrollment".to_string(), "name".to_string()];
    for assessment in config.assessments.iter() {
        header.push(format!("{} total", assessment.id));
        if assessment.scaled_total.is_some() {
            header.push(format!("{} scaled", assessment.id));
        }
        for part in assessment.parts.iter() {
            header.push(format!("{} ({})", part.id, part.outcome));
            if part.scaled_max.is_some() {
                header.push(format!("{} scaled", part.id));
            }
            header.push(format!("{} target", part.id));
        }
    }
    if let Some(exam) = config.exam.as_ref() {
        header.push(exam.id.clone());
        header.push(format!("{} target", exam.id));
    }
    for outcome in config.outcomes() {
        header.push(outcome);
    }
    out.write_record(&header)?;

    for (idx, row) in rows.iter().enumerate() {
        let mut record = vec![
            (idx + 1).to_string(),
            row.student.enrollment.clone(),
            row.student.name.clone(),
        ];
        let mut cells = row.cells.iter();
        for (assessment, total) in config.assessments.iter().zip(row.totals.iter()) {
            record.push(mark_cell(total.raw));
            if assessment.scaled_total.is_some() {
                record.push(scaled_cell(total.scaled));
            }
            for part in assessment.parts.iter() {
                let Some(cell) = cells.next() else { break };
                record.push(mark_cell(cell.obtained));
                if part.scaled_max.is_some() {
                    record.push(scaled_cell(cell.scaled));
                }
                record.push(cell.status.symbol().to_string());
            }
        }
        if let Some(exam) = row.exam.as_ref() {
            record.push(mark_cell(exam.obtained));
            record.push(exam.status.symbol().to_string());
        }
        for (_, status) in row.outcomes.iter() {
            record.push(status.symbol().to_string());
        }
        out.write_record(&record)?;
    }

    out.flush()?;
    Ok(())
}
