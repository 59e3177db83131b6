//! Rescaling a per-region scalar onto a common reference scale.

use crate::error::{EngineError, Result};
use crate::types::{Normalization, NormalizedScalar, RegionScalar};
use crate::util::round_to;

pub fn normalize(scalar: &RegionScalar, policy: &Normalization) -> Result<NormalizedScalar> {
    match policy {
        Normalization::ReferenceRatio { reference } => reference_ratio(scalar, reference),
        Normalization::UnitRange => unit_range(scalar),
    }
}

/// `value / value[reference] * 100`, rounded to one decimal. The reference
/// region always maps to exactly 100.0.
pub fn reference_ratio(scalar: &RegionScalar, reference: &str) -> Result<NormalizedScalar> {
    if scalar.is_empty() {
        return Err(EngineError::incomplete(scalar.name(), reference));
    }
    let base = scalar
        .get(reference)
        .ok_or_else(|| EngineError::MissingReferenceRegion {
            metric: scalar.name().to_string(),
            region: reference.to_string(),
        })?;
    if base == 0.0 {
        return Err(EngineError::ZeroReference {
            metric: scalar.name().to_string(),
            region: reference.to_string(),
        });
    }
    let out = scalar.map_values(scalar.name(), |v| round_to(v / base * 100.0, 1));
    Ok(NormalizedScalar {
        policy: Normalization::ReferenceRatio {
            reference: reference.to_string(),
        },
        scalar: out,
    })
}

/// Min-max rescaling onto [0, 1] at full precision.
pub fn unit_range(scalar: &RegionScalar) -> Result<NormalizedScalar> {
    let (min, max) = match (scalar.min(), scalar.max()) {
        (Some(min), Some(max)) => (min, max),
        _ => return Err(EngineError::incomplete(scalar.name(), "<any>")),
    };
    if max == min {
        return Err(EngineError::DegenerateRange {
            metric: scalar.name().to_string(),
            value: min,
        });
    }
    let span = max - min;
    Ok(NormalizedScalar {
        policy: Normalization::UnitRange,
        scalar: scalar.map_values(scalar.name(), |v| (v - min) / span),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn abc() -> RegionScalar {
        RegionScalar::from_pairs("m", [("A", 100.0), ("B", 50.0), ("C", 25.0)])
    }

    #[test]
    fn test_reference_ratio_scenario() {
        let n = reference_ratio(&abc(), "A").unwrap();
        assert_eq!(n.scalar.get("A"), Some(100.0));
        assert_eq!(n.scalar.get("B"), Some(50.0));
        assert_eq!(n.scalar.get("C"), Some(25.0));
    }

    #[test]
    fn test_reference_ratio_rounds_to_one_decimal() {
        let s = RegionScalar::from_pairs("m", [("A", 3.0), ("B", 1.0)]);
        let n = reference_ratio(&s, "A").unwrap();
        assert_eq!(n.scalar.get("B"), Some(33.3));
    }

    #[test]
    fn test_missing_reference_region() {
        let err = reference_ratio(&abc(), "서울").unwrap_err();
        assert!(matches!(err, EngineError::MissingReferenceRegion { .. }));
    }

    #[test]
    fn test_zero_reference() {
        let s = RegionScalar::from_pairs("m", [("A", 0.0), ("B", 1.0)]);
        assert!(matches!(
            reference_ratio(&s, "A"),
            Err(EngineError::ZeroReference { .. })
        ));
    }

    #[test]
    fn test_unit_range_scenario() {
        let n = unit_range(&abc()).unwrap();
        assert_eq!(n.scalar.get("A"), Some(1.0));
        assert!((n.scalar.get("B").unwrap() - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(n.scalar.get("C"), Some(0.0));
    }

    #[test]
    fn test_unit_range_degenerate() {
        let s = RegionScalar::from_pairs("flat", [("A", 7.0), ("B", 7.0)]);
        match unit_range(&s) {
            Err(EngineError::DegenerateRange { metric, value }) => {
                assert_eq!(metric, "flat");
                assert_eq!(value, 7.0);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_normalize_dispatch_keeps_order() {
        let n = normalize(&abc(), &Normalization::UnitRange).unwrap();
        let regions: Vec<&str> = n.scalar.regions().collect();
        assert_eq!(regions, vec!["A", "B", "C"]);
    }

    proptest! {
        #[test]
        fn prop_reference_is_exactly_100(
            values in prop::collection::vec(0.1f64..1e6, 2..20),
            pick in 0usize..20,
        ) {
            let s = RegionScalar::from_pairs(
                "m",
                values.iter().enumerate().map(|(i, v)| (format!("R{}", i), *v)),
            );
            let reference = format!("R{}", pick % values.len());
            let n = reference_ratio(&s, &reference).unwrap();
            prop_assert_eq!(n.scalar.get(&reference), Some(100.0));
        }

        #[test]
        fn prop_unit_range_bounds_and_order(
            values in prop::collection::vec(-1e6f64..1e6, 2..20),
        ) {
            let s = RegionScalar::from_pairs(
                "m",
                values.iter().enumerate().map(|(i, v)| (format!("R{}", i), *v)),
            );
            prop_assume!(s.min() != s.max());
            let n = unit_range(&s).unwrap();
            prop_assert_eq!(n.scalar.min(), Some(0.0));
            prop_assert_eq!(n.scalar.max(), Some(1.0));
            let out: Vec<f64> = n.scalar.values().collect();
            for i in 0..values.len() {
                for j in 0..values.len() {
                    if values[i] < values[j] {
                        prop_assert!(out[i] < out[j]);
                    }
                }
            }
        }
    }
}
