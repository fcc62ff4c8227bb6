use serde::Serialize;

use crate::error::{AttainmentError, Result};
use crate::levels::ThresholdTable;
use crate::models::{
    check_positive, Assessment, Attainment, ExternalExam, MarkSource, OutcomeSummary, Question,
    QuestionSummary, Student,
};

pub fn meets_target(obtained: f64, maximum: f64, target_percent: f64) -> Result<bool> {
    check_positive("maximum", maximum)?;
    // Cross-multiplied so integral marks compare exactly.
    Ok(obtained * 100.0 >= target_percent * maximum)
}

/// Tri-state form of [`meets_target`]: an absent mark is ungraded.
pub fn evaluate(obtained: Option<f64>, maximum: f64, target_percent: f64) -> Result<Attainment> {
    check_positive("maximum", maximum)?;
    match obtained {
        None => Ok(Attainment::Ungraded),
        Some(value) => meets_target(value, maximum, target_percent).map(Attainment::from_flag),
    }
}

pub fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 * 100.0 / total as f64
    }
}

pub fn questions_by_outcome<'a, I>(questions: I) -> Vec<(String, Vec<&'a Question>)>
where
    I: IntoIterator<Item = &'a Question>,
{
    let mut groups: Vec<(String, Vec<&'a Question>)> = Vec::new();
    for question in questions {
        match groups.iter_mut().find(|(outcome, _)| *outcome == question.outcome) {
            Some((_, members)) => members.push(question),
            None => groups.push((question.outcome.clone(), vec![question])),
        }
    }
    groups
}

/// One student's standing on an outcome measured by several questions.
///
/// Graded marks are summed against the combined maximum of every question;
/// the student is ungraded only when none of the questions has a mark.
pub fn evaluate_outcome<M: MarkSource>(
    student_id: &str,
    questions: &[&Question],
    marks: &M,
    target_percent: f64,
) -> Result<Attainment> {
    let mut obtained = 0.0;
    let mut maximum = 0.0;
    let mut graded = false;

    for question in questions {
        maximum += question.max_marks;
        if let Some(mark) = marks.mark(student_id, &question.id) {
            obtained += mark;
            graded = true;
        }
    }

    evaluate(graded.then_some(obtained), maximum, target_percent)
}

/// Students without marks still count in the denominator.
pub fn aggregate_outcome<M: MarkSource>(
    outcome: &str,
    questions: &[Question],
    marks: &M,
    target_percent: f64,
    thresholds: &ThresholdTable,
) -> Result<OutcomeSummary> {
    let members: Vec<&Question> = questions.iter().filter(|q| q.outcome == outcome).collect();
    if members.is_empty() {
        return Err(AttainmentError::missing(outcome));
    }
    summarize_outcome(outcome, &members, marks, target_percent, thresholds)
}

pub fn aggregate<M: MarkSource>(
    questions: &[Question],
    marks: &M,
    target_percent: f64,
    thresholds: &ThresholdTable,
) -> Result<Vec<OutcomeSummary>> {
    questions_by_outcome(questions)
        .into_iter()
        .map(|(outcome, members)| {
            summarize_outcome(&outcome, &members, marks, target_percent, thresholds)
        })
        .collect()
}

fn summarize_outcome<M: MarkSource>(
    outcome: &str,
    members: &[&Question],
    marks: &M,
    target_percent: f64,
    thresholds: &ThresholdTable,
) -> Result<OutcomeSummary> {
    let students = marks.students();
    let mut met_count = 0usize;
    let mut graded_count = 0usize;

    for student in students {
        let result = evaluate_outcome(&student.id, members, marks, target_percent)?;
        if result.is_graded() {
            graded_count += 1;
        }
        if result.is_met() {
            met_count += 1;
        }
    }

    let pct = percentage(met_count, students.len());
    Ok(OutcomeSummary {
        outcome: outcome.to_string(),
        met_count,
        graded_count,
        total_count: students.len(),
        percentage: pct,
        level: thresholds.level_for(pct),
    })
}

/// Per-question footer rows: count of `Y`, share of roster, level.
pub fn summarize_questions<M: MarkSource>(
    questions: &[Question],
    marks: &M,
    target_percent: f64,
    thresholds: &ThresholdTable,
) -> Result<Vec<QuestionSummary>> {
    let students = marks.students();
    let mut summaries = Vec::with_capacity(questions.len());

    for question in questions {
        let mut met_count = 0usize;
        for student in students {
            let mark = marks.mark(&student.id, &question.id);
            if evaluate(mark, question.max_marks, target_percent)?.is_met() {
                met_count += 1;
            }
        }
        let pct = percentage(met_count, students.len());
        summaries.push(QuestionSummary {
            question_id: question.id.clone(),
            assessment: question.assessment.clone(),
            outcome: question.outcome.clone(),
            met_count,
            total_count: students.len(),
            percentage: pct,
            level: thresholds.level_for(pct),
        });
    }

    Ok(summaries)
}

pub fn summarize_exam<M: MarkSource>(
    exam: &ExternalExam,
    marks: &M,
    thresholds: &ThresholdTable,
) -> Result<OutcomeSummary> {
    let students = marks.students();
    let mut met_count = 0usize;
    let mut graded_count = 0usize;

    for student in students {
        let result = evaluate(
            marks.mark(&student.id, &exam.id),
            exam.max_marks,
            exam.target_percent,
        )?;
        graded_count += result.is_graded() as usize;
        met_count += result.is_met() as usize;
    }

    let pct = percentage(met_count, students.len());
    Ok(OutcomeSummary {
        outcome: exam.id.clone(),
        met_count,
        graded_count,
        total_count: students.len(),
        percentage: pct,
        level: exam.thresholds.as_ref().unwrap_or(thresholds).level_for(pct),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionCell {
    pub question_id: String,
    pub obtained: Option<f64>,
    pub scaled: Option<f64>,
    pub status: Attainment,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssessmentTotal {
    pub assessment: String,
    pub raw: Option<f64>,
    pub scaled: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentRow {
    pub student: Student,
    pub cells: Vec<QuestionCell>,
    pub totals: Vec<AssessmentTotal>,
    pub outcomes: Vec<(String, Attainment)>,
    pub exam: Option<QuestionCell>,
}

pub fn student_rows<M: MarkSource>(
    assessments: &[Assessment],
    exam: Option<&ExternalExam>,
    marks: &M,
    target_percent: f64,
) -> Result<Vec<StudentRow>> {
    let questions: Vec<&Question> = assessments.iter().flat_map(|a| a.parts.iter()).collect();
    let groups = questions_by_outcome(questions.iter().copied());
    let mut rows = Vec::with_capacity(marks.students().len());

    for student in marks.students() {
        let mut cells = Vec::with_capacity(questions.len());
        for question in questions.iter() {
            let obtained = marks.mark(&student.id, &question.id);
            cells.push(QuestionCell {
                question_id: question.id.clone(),
                obtained,
                scaled: obtained.and_then(|value| question.scaled(value)),
                status: evaluate(obtained, question.max_marks, target_percent)?,
            });
        }

        let totals = assessments
            .iter()
            .map(|assessment| {
                let graded: Vec<f64> = assessment
                    .parts
                    .iter()
                    .filter_map(|part| marks.mark(&student.id, &part.id))
                    .collect();
                let raw = (!graded.is_empty()).then(|| graded.iter().sum::<f64>());
                AssessmentTotal {
                    assessment: assessment.id.clone(),
                    raw,
                    scaled: raw.and_then(|value| assessment.scaled(value)),
                }
            })
            .collect();

        let mut outcomes = Vec::with_capacity(groups.len());
        for (outcome, members) in groups.iter() {
            let status = evaluate_outcome(&student.id, members, marks, target_percent)?;
            outcomes.push((outcome.clone(), status));
        }

        let exam = match exam {
            Some(exam) => {
                let obtained = marks.mark(&student.id, &exam.id);
                Some(QuestionCell {
                    question_id: exam.id.clone(),
                    obtained,
                    scaled: None,
                    status: evaluate(obtained, exam.max_marks, exam.target_percent)?,
                })
            }
            None => None,
        };

        rows.push(StudentRow {
            student: student.clone(),
            cells,
            totals,
            outcomes,
            exam,
        });
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Sheet {
        students: Vec<Student>,
        marks: HashMap<(String, String), f64>,
    }

    impl Sheet {
        fn new(count: usize) -> Self {
            let students = (0..count)
                .map(|idx| Student {
                    id: format!("s{idx}"),
                    name: format!("Student {idx}"),
                    enrollment: format!("1XX22CS{idx:03}"),
                })
                .collect();
            Self {
                students,
                marks: HashMap::new(),
            }
        }

        fn set(&mut self, student: usize, question: &str, value: f64) {
            self.marks
                .insert((format!("s{student}"), question.to_string()), value);
        }
    }

    impl MarkSource for Sheet {
        fn students(&self) -> &[Student] {
            &self.students
        }

        fn mark(&self, student_id: &str, question_id: &str) -> Option<f64> {
            self.marks
                .get(&(student_id.to_string(), question_id.to_string()))
                .copied()
        }
    }

    fn question(id: &str, outcome: &str, max: f64) -> Question {
        Question::new(id, "IA1", outcome, max).unwrap()
    }

    #[test]
    fn exam_uses_its_own_bands_when_given() {
        let mut sheet = Sheet::new(10);
        for (idx, mark) in [40.0, 35.0, 50.0, 31.0, 33.0, 10.0, 12.0, 20.0, 5.0, 0.0]
            .into_iter()
            .enumerate()
        {
            sheet.set(idx, "SEE", mark);
        }
        let mut exam = ExternalExam {
            id: "SEE".to_string(),
            max_marks: 60.0,
            target_percent: 50.0,
            outcomes: vec!["CO1".to_string()],
            thresholds: None,
        };
        let course = ThresholdTable::standard();

        // 5 of 10 at or above 30/60
        let summary = summarize_exam(&exam, &sheet, &course).unwrap();
        assert_eq!(summary.met_count, 5);
        assert_eq!(summary.level.value(), 0);

        let bands = [(60.0, 3), (50.0, 2), (0.0, 1)]
            .into_iter()
            .map(|(threshold, level)| crate::levels::ThresholdEntry {
                threshold,
                level: crate::levels::AttainmentLevel::new(level).unwrap(),
            })
            .collect();
        exam.thresholds = Some(ThresholdTable::with_field("see.thresholds", bands).unwrap());
        let summary = summarize_exam(&exam, &sheet, &course).unwrap();
        assert_eq!(summary.percentage, 50.0);
        assert_eq!(summary.level.value(), 2);
    }

    #[test]
    fn evaluate_distinguishes_ungraded() {
        assert_eq!(evaluate(None, 10.0, 50.0).unwrap(), Attainment::Ungraded);
        assert_eq!(evaluate(Some(0.0), 10.0, 50.0).unwrap(), Attainment::NotMet);
        assert_eq!(evaluate(Some(5.0), 10.0, 50.0).unwrap(), Attainment::Met);
        assert_eq!(evaluate(Some(0.0), 10.0, 0.0).unwrap(), Attainment::Met);
    }

    #[test]
    fn evaluate_rejects_non_positive_maximum() {
        let err = evaluate(Some(1.0), 0.0, 50.0).unwrap_err();
        assert_eq!(err.field(), Some("maximum"));
        assert!(evaluate(None, -3.0, 50.0).is_err());
    }

    #[test]
    fn evaluate_is_monotonic_in_obtained() {
        let max = 15.0;
        for target in [0.0, 33.3, 50.0, 60.0, 100.0] {
            let mut seen_met = false;
            for step in 0..=150 {
                let obtained = step as f64 / 10.0;
                let met = meets_target(obtained, max, target).unwrap();
                assert!(!(seen_met && !met), "dropped at {obtained} for {target}");
                seen_met |= met;
            }
        }
    }

    #[test]
    fn ten_students_six_meeting_half_reaches_level_one() {
        let mut sheet = Sheet::new(10);
        for idx in 0..10 {
            let mark = if idx < 6 { 5.0 + idx as f64 % 3.0 } else { 4.0 };
            sheet.set(idx, "Q1", mark);
        }
        let questions = vec![question("Q1", "CO1", 10.0)];

        let summaries =
            aggregate(&questions, &sheet, 50.0, &ThresholdTable::standard()).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].met_count, 6);
        assert_eq!(summaries[0].percentage, 60.0);
        assert_eq!(summaries[0].level.value(), 1);
    }

    #[test]
    fn roster_without_marks_counts_in_denominator() {
        let mut sheet = Sheet::new(4);
        sheet.set(0, "Q1", 9.0);
        sheet.set(1, "Q1", 1.0);
        let questions = vec![question("Q1", "CO1", 10.0)];

        let summary =
            aggregate_outcome("CO1", &questions, &sheet, 50.0, &ThresholdTable::standard())
                .unwrap();
        assert_eq!(summary.met_count, 1);
        assert_eq!(summary.graded_count, 2);
        assert_eq!(summary.total_count, 4);
        assert_eq!(summary.percentage, 25.0);
    }

    #[test]
    fn unknown_outcome_is_missing_data() {
        let sheet = Sheet::new(1);
        let questions = vec![question("Q1", "CO1", 10.0)];
        let err =
            aggregate_outcome("CO9", &questions, &sheet, 50.0, &ThresholdTable::standard())
                .unwrap_err();
        assert_eq!(err, AttainmentError::missing("CO9"));
    }

    #[test]
    fn outcome_spanning_questions_sums_marks() {
        let mut sheet = Sheet::new(3);
        // 4/10 + 8/10 = 12/20 meets 50%
        sheet.set(0, "IA1-B", 4.0);
        sheet.set(0, "IA2-A", 8.0);
        // only one part graded: 6/20 misses
        sheet.set(1, "IA1-B", 6.0);
        let questions = vec![
            question("IA1-A", "CO1", 10.0),
            question("IA1-B", "CO2", 10.0),
            question("IA2-A", "CO2", 10.0),
        ];
        let members: Vec<&Question> = questions.iter().filter(|q| q.outcome == "CO2").collect();

        assert_eq!(
            evaluate_outcome("s0", &members, &sheet, 50.0).unwrap(),
            Attainment::Met
        );
        assert_eq!(
            evaluate_outcome("s1", &members, &sheet, 50.0).unwrap(),
            Attainment::NotMet
        );
        assert_eq!(
            evaluate_outcome("s2", &members, &sheet, 50.0).unwrap(),
            Attainment::Ungraded
        );

        let summaries =
            aggregate(&questions, &sheet, 50.0, &ThresholdTable::standard()).unwrap();
        let outcomes: Vec<&str> = summaries.iter().map(|s| s.outcome.as_str()).collect();
        assert_eq!(outcomes, vec!["CO1", "CO2"]);
    }

    #[test]
    fn aggregate_ignores_roster_order_and_is_idempotent() {
        let mut sheet = Sheet::new(7);
        let marks = [3.0, 9.0, 5.0, 6.5, 0.0, 10.0, 4.9];
        for (idx, mark) in marks.iter().enumerate() {
            sheet.set(idx, "Q1", *mark);
            sheet.set(idx, "Q2", 10.0 - *mark);
        }
        let questions = vec![question("Q1", "CO1", 10.0), question("Q2", "CO2", 10.0)];
        let thresholds = ThresholdTable::standard();

        let first = aggregate(&questions, &sheet, 50.0, &thresholds).unwrap();
        let again = aggregate(&questions, &sheet, 50.0, &thresholds).unwrap();
        assert_eq!(first, again);

        sheet.students.reverse();
        sheet.students.swap(1, 4);
        let permuted = aggregate(&questions, &sheet, 50.0, &thresholds).unwrap();
        assert_eq!(first, permuted);
    }

    #[test]
    fn question_summaries_count_y_flags() {
        let mut sheet = Sheet::new(5);
        for idx in 0..4 {
            sheet.set(idx, "Q1", 8.0);
        }
        sheet.set(4, "Q1", 2.0);
        let questions = vec![question("Q1", "CO1", 10.0), question("Q2", "CO2", 5.0)];

        let summaries =
            summarize_questions(&questions, &sheet, 50.0, &ThresholdTable::standard()).unwrap();
        assert_eq!(summaries[0].met_count, 4);
        assert_eq!(summaries[0].percentage, 80.0);
        assert_eq!(summaries[0].level.value(), 3);
        assert_eq!(summaries[1].met_count, 0);
        assert_eq!(summaries[1].level.value(), 0);
    }

    #[test]
    fn student_rows_carry_scaled_totals_and_flags() {
        let mut sheet = Sheet::new(2);
        sheet.set(0, "A1-A", 8.0);
        sheet.set(0, "A1-B", 2.0);
        sheet.set(0, "SEE", 40.0);
        let assignment = Assessment {
            id: "A1".to_string(),
            title: "Assignment 1".to_string(),
            kind: crate::models::AssessmentKind::Assignment,
            total_marks: 20.0,
            scaled_total: Some(10.0),
            parts: vec![
                Question::new("A1-A", "A1", "CO1", 10.0)
                    .unwrap()
                    .with_scaled_max(5.0)
                    .unwrap(),
                Question::new("A1-B", "A1", "CO2", 10.0)
                    .unwrap()
                    .with_scaled_max(5.0)
                    .unwrap(),
            ],
        };
        let exam = ExternalExam {
            id: "SEE".to_string(),
            max_marks: 60.0,
            target_percent: 50.0,
            outcomes: vec!["CO1".to_string()],
            thresholds: None,
        };

        let rows = student_rows(&[assignment], Some(&exam), &sheet, 50.0).unwrap();
        let first = &rows[0];
        assert_eq!(first.cells[0].scaled, Some(4.0));
        assert_eq!(first.cells[0].status, Attainment::Met);
        assert_eq!(first.cells[1].status, Attainment::NotMet);
        assert_eq!(first.totals[0].raw, Some(10.0));
        assert_eq!(first.totals[0].scaled, Some(5.0));
        assert_eq!(first.exam.as_ref().map(|c| c.status), Some(Attainment::Met));

        let second = &rows[1];
        assert_eq!(second.cells[0].status, Attainment::Ungraded);
        assert_eq!(second.totals[0].raw, None);
        assert_eq!(second.outcomes[0], ("CO1".to_string(), Attainment::Ungraded));
    }
}
