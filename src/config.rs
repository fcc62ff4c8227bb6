use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::course::CourseConfig;
use crate::error::AttainmentError;
use crate::levels::{AttainmentLevel, ThresholdEntry, ThresholdTable};
use crate::models::{Assessment, AssessmentKind, ExternalExam, Question};
use crate::program::ArticulationMatrix;
use crate::weights::{WeightPair, WeightSet};

pub const DEFAULT_CIE_WEIGHT: f64 = 50.0;
pub const DEFAULT_DIRECT_WEIGHT: f64 = 80.0;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCourseConfig {
    course: String,
    target_percent: f64,
    #[serde(default)]
    thresholds: Vec<RawThreshold>,
    #[serde(default)]
    weights: RawWeights,
    assessments: Vec<RawAssessment>,
    see: Option<RawExam>,
    indirect: Option<RawIndirect>,
    #[serde(default)]
    articulation: BTreeMap<String, BTreeMap<String, i64>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawThreshold {
    threshold: f64,
    level: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawWeights {
    cie: Option<f64>,
    see: Option<f64>,
    direct: Option<f64>,
    indirect: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAssessment {
    id: String,
    title: Option<String>,
    #[serde(default = "default_kind")]
    kind: AssessmentKind,
    total_marks: Option<f64>,
    scaled_total: Option<f64>,
    parts: Vec<RawPart>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPart {
    id: String,
    outcome: String,
    max_marks: f64,
    scaled_max: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawExam {
    #[serde(default = "default_exam_id")]
    id: String,
    max_marks: f64,
    target_percent: Option<f64>,
    #[serde(default)]
    outcomes: Vec<String>,
    #[serde(default)]
    thresholds: Vec<RawThreshold>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawIndirect {
    tools: Vec<RawTool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTool {
    name: String,
    weight: f64,
}

fn default_kind() -> AssessmentKind {
    AssessmentKind::Internal
}

fn default_exam_id() -> String {
    "SEE".to_string()
}

/// Resolve a coupled pair where either side may be omitted.
fn weight_pair(
    field: &str,
    first: Option<f64>,
    second: Option<f64>,
    default_first: f64,
) -> Result<WeightPair, AttainmentError> {
    match (first, second) {
        (Some(first), Some(second)) => WeightPair::new(field, first, second),
        (Some(first), None) => WeightPair::from_first(field, first),
        (None, Some(second)) => {
            let mut pair = WeightPair::from_first(field, default_first)?;
            pair.set_second(field, second)?;
            Ok(pair)
        }
        (None, None) => WeightPair::from_first(field, default_first),
    }
}

fn threshold_table(
    field: &str,
    raw: Vec<RawThreshold>,
) -> Result<ThresholdTable, AttainmentError> {
    let mut entries = Vec::with_capacity(raw.len());
    for (idx, entry) in raw.into_iter().enumerate() {
        entries.push(ThresholdEntry {
            threshold: entry.threshold,
            level: AttainmentLevel::checked(&format!("{field}[{idx}].level"), entry.level)?,
        });
    }
    ThresholdTable::with_field(field, entries)
}

impl RawCourseConfig {
    fn finalize(self) -> Result<CourseConfig, AttainmentError> {
        let thresholds = if self.thresholds.is_empty() {
            ThresholdTable::standard()
        } else {
            threshold_table("thresholds", self.thresholds)?
        };

        let cie_see = weight_pair(
            "weights.cie_see",
            self.weights.cie,
            self.weights.see,
            DEFAULT_CIE_WEIGHT,
        )?;
        let direct_indirect = weight_pair(
            "weights.direct_indirect",
            self.weights.direct,
            self.weights.indirect,
            DEFAULT_DIRECT_WEIGHT,
        )?;

        let mut assessments = Vec::with_capacity(self.assessments.len());
        for raw in self.assessments {
            let mut parts = Vec::with_capacity(raw.parts.len());
            for part in raw.parts {
                let mut question = Question::new(part.id, &raw.id, part.outcome, part.max_marks)?;
                if let Some(scaled_max) = part.scaled_max {
                    question = question.with_scaled_max(scaled_max)?;
                }
                parts.push(question);
            }
            let total_marks = raw
                .total_marks
                .unwrap_or_else(|| parts.iter().map(|p| p.max_marks).sum());
            assessments.push(Assessment {
                title: raw.title.unwrap_or_else(|| raw.id.clone()),
                id: raw.id,
                kind: raw.kind,
                total_marks,
                scaled_total: raw.scaled_total,
                parts,
            });
        }

        let indirect = match self.indirect {
            Some(raw) => Some(WeightSet::new(
                "indirect.tools",
                raw.tools.into_iter().map(|t| (t.name, t.weight)).collect(),
            )?),
            None => None,
        };

        let mut config = CourseConfig {
            course: self.course,
            target_percent: self.target_percent,
            thresholds,
            cie_see,
            direct_indirect,
            assessments,
            exam: None,
            indirect,
            articulation: ArticulationMatrix::new(self.articulation)?,
        };

        if let Some(raw) = self.see {
            // An exam without an explicit mapping covers every outcome.
            let outcomes = if raw.outcomes.is_empty() {
                config.outcomes()
            } else {
                raw.outcomes
            };
            let thresholds = if raw.thresholds.is_empty() {
                None
            } else {
                Some(threshold_table("see.thresholds", raw.thresholds)?)
            };
            config.exam = Some(ExternalExam {
                id: raw.id,
                max_marks: raw.max_marks,
                target_percent: raw.target_percent.unwrap_or(config.target_percent),
                outcomes,
                thresholds,
            });
        }

        config.validate()?;
        Ok(config)
    }
}

pub fn parse(contents: &str) -> anyhow::Result<CourseConfig> {
    let raw: RawCourseConfig = toml::from_str(contents).context("invalid course configuration")?;
    Ok(raw.finalize()?)
}

pub fn load(path: &Path) -> anyhow::Result<CourseConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config = parse(&contents).with_context(|| format!("in {}", path.display()))?;
    tracing::debug!(
        course = %config.course,
        assessments = config.assessments.len(),
        outcomes = config.outcomes().len(),
        "loaded course configuration"
    );
    Ok(config)
}
