use serde::{Deserialize, Serialize};

use crate::error::{AttainmentError, Result};
use crate::levels::{AttainmentLevel, ThresholdTable};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    pub name: String,
    pub enrollment: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssessmentKind {
    Internal,
    Assignment,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Question {
    pub id: String,
    pub assessment: String,
    pub outcome: String,
    pub max_marks: f64,
    pub scaled_max: Option<f64>,
}

impl Question {
    pub fn new(
        id: impl Into<String>,
        assessment: impl Into<String>,
        outcome: impl Into<String>,
        max_marks: f64,
    ) -> Result<Self> {
        let id = id.into();
        check_positive(&format!("questions.{id}.max_marks"), max_marks)?;
        Ok(Self {
            id,
            assessment: assessment.into(),
            outcome: outcome.into(),
            max_marks,
            scaled_max: None,
        })
    }

    pub fn with_scaled_max(mut self, scaled_max: f64) -> Result<Self> {
        check_positive(&format!("questions.{}.scaled_max", self.id), scaled_max)?;
        self.scaled_max = Some(scaled_max);
        Ok(self)
    }

    pub fn scaled(&self, obtained: f64) -> Option<f64> {
        self.scaled_max
            .map(|scaled_max| obtained / self.max_marks * scaled_max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assessment {
    pub id: String,
    pub title: String,
    pub kind: AssessmentKind,
    pub total_marks: f64,
    pub scaled_total: Option<f64>,
    pub parts: Vec<Question>,
}

impl Assessment {
    /// Validate that the parts distribute exactly the declared total.
    pub fn validate(&self) -> Result<()> {
        check_positive(&format!("assessments.{}.total_marks", self.id), self.total_marks)?;
        if let Some(scaled_total) = self.scaled_total {
            check_positive(&format!("assessments.{}.scaled_total", self.id), scaled_total)?;
        }
        if self.parts.is_empty() {
            return Err(AttainmentError::validation(
                format!("assessments.{}.parts", self.id),
                "assessment has no parts",
            ));
        }
        let distributed: f64 = self.parts.iter().map(|part| part.max_marks).sum();
        if (distributed - self.total_marks).abs() > 1e-9 {
            return Err(AttainmentError::validation(
                format!("assessments.{}.total_marks", self.id),
                format!(
                    "parts distribute {distributed} marks but total is {}",
                    self.total_marks
                ),
            ));
        }
        Ok(())
    }

    pub fn scaled(&self, raw_total: f64) -> Option<f64> {
        self.scaled_total
            .map(|scaled_total| raw_total / self.total_marks * scaled_total)
    }
}

/// Semester end exam: one mark per student shared by several outcomes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExternalExam {
    pub id: String,
    pub max_marks: f64,
    pub target_percent: f64,
    pub outcomes: Vec<String>,
    /// Own banding for the exam; the course table applies when unset.
    pub thresholds: Option<ThresholdTable>,
}

impl ExternalExam {
    pub fn covers(&self, outcome: &str) -> bool {
        self.outcomes.iter().any(|o| o == outcome)
    }
}

/// Per-student evaluation result. Ungraded is kept apart from not-met so
/// reports can show a blank instead of `N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Attainment {
    Met,
    NotMet,
    Ungraded,
}

impl Attainment {
    pub fn from_flag(met: bool) -> Self {
        if met {
            Self::Met
        } else {
            Self::NotMet
        }
    }

    pub fn is_met(self) -> bool {
        matches!(self, Self::Met)
    }

    pub fn is_graded(self) -> bool {
        !matches!(self, Self::Ungraded)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Met => "Y",
            Self::NotMet => "N",
            Self::Ungraded => "",
        }
    }
}

pub trait MarkSource {
    fn students(&self) -> &[Student];

    /// `None` when the student has no grade for the question yet.
    fn mark(&self, student_id: &str, question_id: &str) -> Option<f64>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeSummary {
    pub outcome: String,
    pub met_count: usize,
    pub graded_count: usize,
    pub total_count: usize,
    pub percentage: f64,
    pub level: AttainmentLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionSummary {
    pub question_id: String,
    pub assessment: String,
    pub outcome: String,
    pub met_count: usize,
    pub total_count: usize,
    pub percentage: f64,
    pub level: AttainmentLevel,
}

pub fn check_positive(field: &str, value: f64) -> Result<()> {
    if !(value > 0.0) || !value.is_finite() {
        return Err(AttainmentError::validation(
            field,
            format!("{value} must be greater than zero"),
        ));
    }
    Ok(())
}

pub fn check_percent(field: &str, value: f64) -> Result<()> {
    if !(0.0..=100.0).contains(&value) {
        return Err(AttainmentError::validation(
            field,
            format!("{value} is outside 0..=100"),
        ));
    }
    Ok(())
}
