use serde::Serialize;

use crate::error::{AttainmentError, Result};

pub const MAX_LEVEL: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "u8")]
pub struct AttainmentLevel(u8);

impl AttainmentLevel {
    pub const ZERO: AttainmentLevel = AttainmentLevel(0);
    pub const MAX: AttainmentLevel = AttainmentLevel(MAX_LEVEL);

    pub fn new(level: u8) -> Result<Self> {
        Self::checked("level", level.into())
    }

    pub fn checked(field: &str, level: i64) -> Result<Self> {
        match u8::try_from(level) {
            Ok(level) if level <= MAX_LEVEL => Ok(Self(level)),
            _ => Err(AttainmentError::validation(
                field,
                format!("{level} is outside 0..={MAX_LEVEL}"),
            )),
        }
    }

    /// Highest level not exceeding `score`. Within `1e-9` below a level
    /// counts as reaching it.
    pub fn floor_of(score: f64) -> Self {
        if !(score >= 0.0) {
            return Self::ZERO;
        }
        Self((score + 1e-9).floor().min(MAX_LEVEL as f64) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64
    }
}

impl From<AttainmentLevel> for u8 {
    fn from(level: AttainmentLevel) -> u8 {
        level.0
    }
}

impl std::fmt::Display for AttainmentLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThresholdEntry {
    pub threshold: f64,
    pub level: AttainmentLevel,
}

/// Percentage bands mapped to levels, strictly descending by threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdTable {
    entries: Vec<ThresholdEntry>,
}

impl ThresholdTable {
    pub fn new(entries: Vec<ThresholdEntry>) -> Result<Self> {
        Self::with_field("thresholds", entries)
    }

    pub fn with_field(field: &str, entries: Vec<ThresholdEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(AttainmentError::validation(
                field,
                "at least one threshold is required",
            ));
        }

        for (idx, entry) in entries.iter().enumerate() {
            if !(0.0..=100.0).contains(&entry.threshold) {
                return Err(AttainmentError::validation(
                    format!("{field}[{idx}].threshold"),
                    format!("{} is outside 0..=100", entry.threshold),
                ));
            }
            if idx == 0 {
                continue;
            }
            let prev = entries[idx - 1];
            if entry.threshold >= prev.threshold {
                return Err(AttainmentError::validation(
                    format!("{field}[{idx}].threshold"),
                    format!(
                        "{} does not descend from {}",
                        entry.threshold, prev.threshold
                    ),
                ));
            }
            if entry.level > prev.level {
                return Err(AttainmentError::validation(
                    format!("{field}[{idx}].level"),
                    format!("level {} rises above {} at a lower band", entry.level, prev.level),
                ));
            }
        }

        Ok(Self { entries })
    }

    /// The usual 80/70/60 banding.
    pub fn standard() -> Self {
        let entries = [(80.0, 3), (70.0, 2), (60.0, 1), (0.0, 0)]
            .into_iter()
            .map(|(threshold, level)| ThresholdEntry {
                threshold,
                level: AttainmentLevel(level),
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[ThresholdEntry] {
        &self.entries
    }

    pub fn lowest_level(&self) -> AttainmentLevel {
        self.entries
            .iter()
            .map(|entry| entry.level)
            .min()
            .unwrap_or(AttainmentLevel::ZERO)
    }

    pub fn level_for(&self, percentage: f64) -> AttainmentLevel {
        level_for(percentage, self)
    }
}

/// Equality meets the band. Percentages below every band (or NaN) fall to
/// the lowest defined level.
pub fn level_for(percentage: f64, thresholds: &ThresholdTable) -> AttainmentLevel {
    thresholds
        .entries
        .iter()
        .find(|entry| percentage >= entry.threshold)
        .map(|entry| entry.level)
        .unwrap_or_else(|| thresholds.lowest_level())
}
