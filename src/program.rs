use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{AttainmentError, Result};

/// CO to PO/PSO correlation strengths, each in `1..=3`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ArticulationMatrix {
    rows: BTreeMap<String, BTreeMap<String, u8>>,
}

impl ArticulationMatrix {
    pub fn new(rows: BTreeMap<String, BTreeMap<String, i64>>) -> Result<Self> {
        let mut checked = BTreeMap::new();
        for (outcome, programs) in rows {
            let mut strengths = BTreeMap::new();
            for (program, strength) in programs {
                match u8::try_from(strength) {
                    Ok(value) if (1..=3).contains(&value) => {
                        strengths.insert(program, value);
                    }
                    _ => {
                        return Err(AttainmentError::validation(
                            format!("articulation.{outcome}.{program}"),
                            format!("strength {strength} is outside 1..=3"),
                        ))
                    }
                }
            }
            checked.insert(outcome, strengths);
        }
        Ok(Self { rows: checked })
    }

    pub fn is_empty(&self) -> bool {
        self.rows.values().all(|programs| programs.is_empty())
    }

    pub fn course_outcomes(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    pub fn strength(&self, outcome: &str, program: &str) -> Option<u8> {
        self.rows.get(outcome).and_then(|p| p.get(program)).copied()
    }

    pub fn programs(&self) -> Vec<&str> {
        let mut programs: Vec<&str> = self
            .rows
            .values()
            .flat_map(|p| p.keys().map(String::as_str))
            .collect();
        programs.sort_by(|a, b| outcome_order(a, b));
        programs.dedup();
        programs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgramAttainment {
    pub program: String,
    pub score: f64,
    pub course_outcomes: usize,
}

/// Strength-weighted mean of course outcome scores for each program outcome.
pub fn program_attainment(
    matrix: &ArticulationMatrix,
    outcome_scores: &[(String, f64)],
) -> Result<Vec<ProgramAttainment>> {
    for outcome in matrix.course_outcomes() {
        if !outcome_scores.iter().any(|(o, _)| o == outcome) {
            return Err(AttainmentError::missing(outcome));
        }
    }

    let mut results = Vec::new();
    for program in matrix.programs() {
        let mut weighted = 0.0;
        let mut strength_total = 0u32;
        let mut count = 0usize;
        for (outcome, score) in outcome_scores {
            if let Some(strength) = matrix.strength(outcome, program) {
                weighted += score * strength as f64;
                strength_total += strength as u32;
                count += 1;
            }
        }
        if strength_total == 0 {
            continue;
        }
        results.push(ProgramAttainment {
            program: program.to_string(),
            score: weighted / strength_total as f64,
            course_outcomes: count,
        });
    }
    Ok(results)
}

/// Orders tags like `PO2` before `PO10`, and `PO*` before `PSO*`.
pub fn outcome_order(a: &str, b: &str) -> Ordering {
    let (a_prefix, a_num) = split_tag(a);
    let (b_prefix, b_num) = split_tag(b);
    a_prefix
        .cmp(b_prefix)
        .then(a_num.cmp(&b_num))
        .then_with(|| a.cmp(b))
}

fn split_tag(tag: &str) -> (&str, Option<u64>) {
    let digits = tag
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(idx, _)| idx);
    match digits {
        Some(idx) => (&tag[..idx], tag[idx..].parse().ok()),
        None => (tag, None),
    }
}
