use std::collections::BTreeMap;

use serde::Serialize;

use crate::attainment::{self, questions_by_outcome};
use crate::error::{AttainmentError, Result};
use crate::levels::{AttainmentLevel, ThresholdTable, MAX_LEVEL};
use crate::models::{
    check_percent, Assessment, ExternalExam, MarkSource, OutcomeSummary, Question,
    QuestionSummary,
};
use crate::program::{program_attainment, ArticulationMatrix, ProgramAttainment};
use crate::weights::{WeightPair, WeightSet};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseConfig {
    pub course: String,
    pub target_percent: f64,
    pub thresholds: ThresholdTable,
    /// CIE weight first, SEE second.
    pub cie_see: WeightPair,
    /// Direct weight first, indirect second.
    pub direct_indirect: WeightPair,
    pub assessments: Vec<Assessment>,
    pub exam: Option<ExternalExam>,
    pub indirect: Option<WeightSet>,
    pub articulation: ArticulationMatrix,
}

impl CourseConfig {
    /// Cross-field checks that individual constructors cannot see.
    pub fn validate(&self) -> Result<()> {
        check_percent("target_percent", self.target_percent)?;

        let mut seen: Vec<&str> = Vec::new();
        for assessment in self.assessments.iter() {
            assessment.validate()?;
            for part in assessment.parts.iter() {
                if seen.contains(&part.id.as_str()) {
                    return Err(AttainmentError::validation(
                        format!("questions.{}", part.id),
                        "duplicate question id",
                    ));
                }
                seen.push(&part.id);
            }
        }

        let outcomes = self.outcomes();
        if outcomes.is_empty() {
            return Err(AttainmentError::validation(
                "assessments",
                "no internal questions configured",
            ));
        }

        if let Some(exam) = self.exam.as_ref() {
            if seen.contains(&exam.id.as_str()) {
                return Err(AttainmentError::validation(
                    "see.id",
                    format!("{} collides with a question id", exam.id),
                ));
            }
            check_percent("see.target_percent", exam.target_percent)?;
            crate::models::check_positive("see.max_marks", exam.max_marks)?;
            for outcome in exam.outcomes.iter() {
                if !outcomes.contains(outcome) {
                    return Err(AttainmentError::missing(outcome.clone()));
                }
            }
        }

        for outcome in self.articulation.course_outcomes() {
            if !outcomes.iter().any(|o| o == outcome) {
                return Err(AttainmentError::missing(outcome));
            }
        }

        Ok(())
    }

    pub fn questions(&self) -> Vec<Question> {
        self.assessments
            .iter()
            .flat_map(|a| a.parts.iter().cloned())
            .collect()
    }

    /// Outcome tags in first-appearance order.
    pub fn outcomes(&self) -> Vec<String> {
        questions_by_outcome(self.assessments.iter().flat_map(|a| a.parts.iter()))
            .into_iter()
            .map(|(outcome, _)| outcome)
            .collect()
    }

    pub fn maxima(&self) -> Vec<(String, f64)> {
        let mut maxima: Vec<(String, f64)> = self
            .assessments
            .iter()
            .flat_map(|a| a.parts.iter())
            .map(|q| (q.id.clone(), q.max_marks))
            .collect();
        if let Some(exam) = self.exam.as_ref() {
            maxima.push((exam.id.clone(), exam.max_marks));
        }
        maxima
    }

    /// A survey score must belong to a known outcome and a configured tool.
    pub fn check_survey(&self, outcome: &str, tool: &str) -> Result<()> {
        let field = || format!("surveys.{outcome}.{tool}");
        if !self.outcomes().iter().any(|o| o == outcome) {
            return Err(AttainmentError::validation(field(), "unknown outcome"));
        }
        let known_tool = self
            .indirect
            .as_ref()
            .is_some_and(|tools| tools.names().any(|name| name == tool));
        if !known_tool {
            return Err(AttainmentError::validation(field(), "unknown survey tool"));
        }
        Ok(())
    }
}

/// Indirect (survey) scores on the level scale, keyed by outcome and tool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurveyScores {
    scores: BTreeMap<(String, String), f64>,
}

impl SurveyScores {
    pub fn insert(&mut self, outcome: &str, tool: &str, score: f64) -> Result<()> {
        if !(0.0..=MAX_LEVEL as f64).contains(&score) {
            return Err(AttainmentError::validation(
                format!("surveys.{outcome}.{tool}"),
                format!("score {score} is outside 0..={MAX_LEVEL}"),
            ));
        }
        let key = (outcome.to_string(), tool.to_string());
        if self.scores.contains_key(&key) {
            return Err(AttainmentError::validation(
                format!("surveys.{outcome}.{tool}"),
                "score entered more than once",
            ));
        }
        self.scores.insert(key, score);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, f64)> {
        self.scores
            .iter()
            .map(|((outcome, tool), score)| (outcome.as_str(), tool.as_str(), *score))
    }

    pub fn get(&self, outcome: &str, tool: &str) -> Option<f64> {
        self.scores
            .get(&(outcome.to_string(), tool.to_string()))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeAttainment {
    pub outcome: String,
    pub cie: OutcomeSummary,
    pub see: Option<OutcomeSummary>,
    pub direct_score: f64,
    pub indirect_score: Option<f64>,
    pub final_score: f64,
    pub final_level: AttainmentLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseAttainment {
    pub course: String,
    pub target_percent: f64,
    pub student_count: usize,
    pub questions: Vec<QuestionSummary>,
    pub exam: Option<OutcomeSummary>,
    pub outcomes: Vec<OutcomeAttainment>,
    pub programs: Vec<ProgramAttainment>,
}

pub fn compute<M: MarkSource>(
    config: &CourseConfig,
    marks: &M,
    surveys: &SurveyScores,
) -> Result<CourseAttainment> {
    config.validate()?;
    for (outcome, tool, _) in surveys.iter() {
        config.check_survey(outcome, tool)?;
    }

    let questions = config.questions();
    let thresholds = &config.thresholds;
    let cie = attainment::aggregate(&questions, marks, config.target_percent, thresholds)?;
    let summaries =
        attainment::summarize_questions(&questions, marks, config.target_percent, thresholds)?;
    let exam = match config.exam.as_ref() {
        Some(exam) => Some(attainment::summarize_exam(exam, marks, thresholds)?),
        None => None,
    };

    let mut outcomes = Vec::with_capacity(cie.len());
    for summary in cie {
        let see = match (config.exam.as_ref(), exam.as_ref()) {
            (Some(def), Some(see)) if def.covers(&summary.outcome) => Some(see.clone()),
            _ => None,
        };

        let direct_score = match see.as_ref() {
            Some(see) => config
                .cie_see
                .blend(summary.level.as_f64(), see.level.as_f64()),
            None => summary.level.as_f64(),
        };

        let indirect_score = match config.indirect.as_ref() {
            Some(tools) => Some(
                tools
                    .blend_with(|tool| surveys.get(&summary.outcome, tool))
                    .map_err(|tool| {
                        tracing::warn!(outcome = %summary.outcome, %tool, "missing survey score");
                        AttainmentError::missing(summary.outcome.clone())
                    })?,
            ),
            None => None,
        };

        let final_score = match indirect_score {
            Some(indirect) => config.direct_indirect.blend(direct_score, indirect),
            None => direct_score,
        };

        tracing::debug!(
            outcome = %summary.outcome,
            percentage = summary.percentage,
            level = summary.level.value(),
            final_score,
            "outcome attainment"
        );

        outcomes.push(OutcomeAttainment {
            outcome: summary.outcome.clone(),
            cie: summary,
            see,
            direct_score,
            indirect_score,
            final_score,
            final_level: AttainmentLevel::floor_of(final_score),
        });
    }

    let scores: Vec<(String, f64)> = outcomes
        .iter()
        .map(|o| (o.outcome.clone(), o.final_score))
        .collect();
    let programs = program_attainment(&config.articulation, &scores)?;

    Ok(CourseAttainment {
        course: config.course.clone(),
        target_percent: config.target_percent,
        student_count: marks.students().len(),
        questions: summaries,
        exam,
        outcomes,
        programs,
    })
}
