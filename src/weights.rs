use serde::Serialize;

use crate::error::{AttainmentError, Result};

const SUM_TOLERANCE: f64 = 1e-9;

fn check_weight(field: &str, weight: f64) -> Result<()> {
    if !weight.is_finite() || !(0.0..=100.0).contains(&weight) {
        return Err(AttainmentError::validation(
            field,
            format!("weight {weight} is outside 0..=100"),
        ));
    }
    Ok(())
}

fn check_total(field: &str, total: f64) -> Result<()> {
    if (total - 100.0).abs() > SUM_TOLERANCE {
        return Err(AttainmentError::validation(
            field,
            format!("weights sum to {total}, expected 100"),
        ));
    }
    Ok(())
}

/// Two coupled percentages that always sum to 100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeightPair {
    first: f64,
    second: f64,
}

impl WeightPair {
    pub fn new(field: &str, first: f64, second: f64) -> Result<Self> {
        check_weight(field, first)?;
        check_weight(field, second)?;
        check_total(field, first + second)?;
        Ok(Self { first, second })
    }

    pub fn from_first(field: &str, first: f64) -> Result<Self> {
        check_weight(field, first)?;
        Ok(Self {
            first,
            second: 100.0 - first,
        })
    }

    pub fn first(&self) -> f64 {
        self.first
    }

    pub fn second(&self) -> f64 {
        self.second
    }

    pub fn set_first(&mut self, field: &str, first: f64) -> Result<()> {
        check_weight(field, first)?;
        self.first = first;
        self.second = 100.0 - first;
        Ok(())
    }

    pub fn set_second(&mut self, field: &str, second: f64) -> Result<()> {
        check_weight(field, second)?;
        self.second = second;
        self.first = 100.0 - second;
        Ok(())
    }

    pub fn blend(&self, a: f64, b: f64) -> f64 {
        a * (self.first / 100.0) + b * (self.second / 100.0)
    }
}

pub fn blend(a: f64, weight_a: f64, b: f64, weight_b: f64) -> Result<f64> {
    Ok(WeightPair::new("weights", weight_a, weight_b)?.blend(a, b))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightSet {
    weights: Vec<(String, f64)>,
}

impl WeightSet {
    pub fn new(field: &str, weights: Vec<(String, f64)>) -> Result<Self> {
        if weights.is_empty() {
            return Err(AttainmentError::validation(field, "no weights given"));
        }
        for (idx, (name, weight)) in weights.iter().enumerate() {
            check_weight(&format!("{field}.{name}"), *weight)?;
            if weights[..idx].iter().any(|(other, _)| other == name) {
                return Err(AttainmentError::validation(
                    format!("{field}.{name}"),
                    "duplicate name",
                ));
            }
        }
        let total: f64 = weights.iter().map(|(_, w)| w).sum();
        check_total(field, total)?;
        Ok(Self { weights })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.weights.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Errors with the first name `value_of` has no value for.
    pub fn blend_with<F>(&self, mut value_of: F) -> std::result::Result<f64, String>
    where
        F: FnMut(&str) -> Option<f64>,
    {
        let mut total = 0.0;
        for (name, weight) in self.weights.iter() {
            let value = value_of(name).ok_or_else(|| name.clone())?;
            total += value * (weight / 100.0);
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blend_endpoints_return_inputs() {
        assert_eq!(blend(2.4, 100.0, 1.1, 0.0).unwrap(), 2.4);
        assert_eq!(blend(2.4, 0.0, 1.1, 100.0).unwrap(), 1.1);
    }

    #[test]
    fn blend_is_linear_in_weight() {
        let a = 3.0;
        let b = 1.0;
        for w in (0..=100).step_by(5) {
            let w = w as f64;
            let got = blend(a, w, b, 100.0 - w).unwrap();
            let expected = b + (a - b) * w / 100.0;
            assert!((got - expected).abs() < 1e-12, "w={w}: {got} vs {expected}");
        }
    }

    #[test]
    fn rejects_pairs_not_summing_to_hundred() {
        let err = WeightPair::new("weights.direct_indirect", 80.0, 25.0).unwrap_err();
        assert!(matches!(err, AttainmentError::Validation { .. }));
        assert_eq!(err.field(), Some("weights.direct_indirect"));
        assert!(blend(1.0, 80.0, 2.0, 25.0).is_err());
        assert!(WeightPair::new("w", -10.0, 110.0).is_err());
    }

    #[test]
    fn setting_one_side_recomputes_other() {
        let mut pair = WeightPair::new("w", 80.0, 20.0).unwrap();
        pair.set_first("w", 65.0).unwrap();
        assert_eq!(pair.second(), 35.0);
        pair.set_second("w", 10.0).unwrap();
        assert_eq!(pair.first(), 90.0);
        assert!(pair.set_first("w", 140.0).is_err());
        assert_eq!(pair.first(), 90.0);
    }

    #[test]
    fn weight_set_blends_named_inputs() {
        let set = WeightSet::new(
            "indirect.tools",
            vec![("exit".to_string(), 60.0), ("alumni".to_string(), 40.0)],
        )
        .unwrap();
        let value = set
            .blend_with(|name| match name {
                "exit" => Some(3.0),
                "alumni" => Some(2.0),
                _ => None,
            })
            .unwrap();
        assert!((value - 2.6).abs() < 1e-12);

        let missing = set.blend_with(|name| (name == "exit").then_some(3.0));
        assert_eq!(missing, Err("alumni".to_string()));
    }

    #[test]
    fn weight_set_rejects_bad_totals_and_duplicates() {
        assert!(WeightSet::new("t", vec![("a".to_string(), 50.0)]).is_err());
        let err = WeightSet::new(
            "t",
            vec![("a".to_string(), 50.0), ("a".to_string(), 50.0)],
        )
        .unwrap_err();
        assert_eq!(err.field(), Some("t.a"));
    }
}
