//! Rule-based grouping of regions by composite score.
//!
//! Scores are split into `k` equal-width intervals over the observed
//! `[min, max]` range (width-based, not frequency-based). Intervals are
//! right-closed, `(lo, hi]`, with the minimum folded into the first bin,
//! so the top-scoring region always lands in bin `k - 1`.
//!
//! Boundaries follow the runtime min/max: a region can change bins when
//! other regions' scores move. Use [`classify_with_bounds`] to pin them.

use crate::error::{EngineError, Result};
use crate::types::{CompositeScore, RegionScalar};
use crate::util::average;
use serde::Serialize;
use tracing::debug;

pub const DEFAULT_BINS: usize = 4;

/// Name, description and color of one bin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterTier {
    pub name: String,
    pub description: String,
    pub color: String,
}

const FOUR_BIN_TIERS: [(&str, &str, &str); 4] = [
    ("개발필요형", "낮은 소득과 의료 접근성, 집중적 개발 필요", "#96CEB4"),
    ("성장형", "중간 수준의 발전도, 개선 여지 있음", "#45B7D1"),
    ("발전형", "중상 수준의 소득과 의료 인프라, 안정적 고용", "#4ECDC4"),
    ("선진형", "높은 소득, 우수한 의료 인프라, 높은 교육 수준", "#FF6B6B"),
];

const PALETTE: [&str; 6] = ["#96CEB4", "#45B7D1", "#4ECDC4", "#FFD93D", "#FFB347", "#FF6B6B"];

/// Static lookup from bin index to tier. Only the four-bin layout has
/// descriptive names.
pub fn tier_for_bin(bin: usize, bins: usize) -> ClusterTier {
    if bins == DEFAULT_BINS {
        let (name, description, color) = FOUR_BIN_TIERS[bin.min(DEFAULT_BINS - 1)];
        return ClusterTier {
            name: name.to_string(),
            description: description.to_string(),
            color: color.to_string(),
        };
    }
    ClusterTier {
        name: format!("Group {}", bin + 1),
        description: String::new(),
        color: PALETTE[bin % PALETTE.len()].to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub bins: usize,
    pub lower: f64,
    pub upper: f64,
    /// Region → bin index, in the score's region order.
    pub assignments: Vec<(String, usize)>,
}

impl Classification {
    pub fn bin_of(&self, region: &str) -> Option<usize> {
        self.assignments
            .iter()
            .find(|(r, _)| r == region)
            .map(|(_, b)| *b)
    }

    pub fn members(&self, bin: usize) -> Vec<&str> {
        self.assignments
            .iter()
            .filter(|(_, b)| *b == bin)
            .map(|(r, _)| r.as_str())
            .collect()
    }

    pub fn width(&self) -> f64 {
        (self.upper - self.lower) / self.bins as f64
    }
}

/// Bin index of `value` for `bins` right-closed intervals over
/// `[lower, upper]`. Values outside the bounds go to the edge bins.
pub fn bin_index(value: f64, lower: f64, upper: f64, bins: usize) -> usize {
    let t = (value - lower) / (upper - lower);
    let slot = (t * bins as f64).ceil() - 1.0;
    if slot <= 0.0 {
        0
    } else {
        (slot as usize).min(bins - 1)
    }
}

/// Equal-width binning over the observed score range.
pub fn classify(score: &CompositeScore, bins: usize) -> Result<Classification> {
    let scalar = &score.scalar;
    let (lower, upper) = match (scalar.min(), scalar.max()) {
        (Some(min), Some(max)) => (min, max),
        _ => return Err(EngineError::incomplete(scalar.name(), "<any>")),
    };
    if lower == upper {
        return Err(EngineError::DegenerateRange {
            metric: scalar.name().to_string(),
            value: lower,
        });
    }
    classify_with_bounds(score, lower, upper, bins)
}

/// Equal-width binning over caller-fixed bounds.
pub fn classify_with_bounds(
    score: &CompositeScore,
    lower: f64,
    upper: f64,
    bins: usize,
) -> Result<Classification> {
    if bins == 0 {
        return Err(EngineError::InvalidConfig("bin count must be at least 1".to_string()));
    }
    if lower.is_nan() || upper.is_nan() || lower >= upper {
        return Err(EngineError::DegenerateRange {
            metric: score.name().to_string(),
            value: lower,
        });
    }
    let assignments = score
        .scalar
        .iter()
        .map(|(region, value)| {
            if value < lower || value > upper {
                debug!("{} score {} outside [{}, {}]", region, value, lower, upper);
            }
            (region.to_string(), bin_index(value, lower, upper, bins))
        })
        .collect();
    Ok(Classification {
        bins,
        lower,
        upper,
        assignments,
    })
}

/// Summary of one occupied bin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterProfile {
    pub bin: usize,
    pub tier: ClusterTier,
    pub regions: Vec<String>,
    pub mean_score: f64,
    /// Mean of each raw input over the bin's members.
    pub metric_means: Vec<(String, f64)>,
}

impl ClusterProfile {
    pub fn count(&self) -> usize {
        self.regions.len()
    }
}

/// Profiles of occupied bins, lowest bin first.
pub fn profile(
    classification: &Classification,
    score: &CompositeScore,
    raw: &[&RegionScalar],
) -> Result<Vec<ClusterProfile>> {
    let mut profiles = Vec::new();
    for bin in 0..classification.bins {
        let members = classification.members(bin);
        if members.is_empty() {
            continue;
        }
        let scores = members
            .iter()
            .map(|r| score.scalar.require(r))
            .collect::<Result<Vec<f64>>>()?;
        let mut metric_means = Vec::with_capacity(raw.len());
        for metric in raw {
            let values = members
                .iter()
                .map(|r| metric.require(r))
                .collect::<Result<Vec<f64>>>()?;
            metric_means.push((metric.name().to_string(), average(&values)));
        }
        profiles.push(ClusterProfile {
            bin,
            tier: tier_for_bin(bin, classification.bins),
            regions: members.iter().map(|r| r.to_string()).collect(),
            mean_score: average(&scores),
            metric_means,
        });
    }
    Ok(profiles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn composite(values: &[f64]) -> CompositeScore {
        CompositeScore {
            scalar: RegionScalar::from_pairs(
                "score",
                values.iter().enumerate().map(|(i, v)| (format!("R{}", i), *v)),
            ),
        }
    }

    fn bins_of(c: &Classification) -> Vec<usize> {
        c.assignments.iter().map(|(_, b)| *b).collect()
    }

    #[test]
    fn test_four_bin_scenario() {
        let c = classify(&composite(&[0.0, 0.24, 0.26, 0.51, 0.76, 1.0]), 4).unwrap();
        assert_eq!(bins_of(&c), vec![0, 0, 1, 2, 3, 3]);
        assert!((c.width() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_boundary_values_go_to_lower_bin() {
        let c = classify(&composite(&[0.0, 0.25, 0.5, 0.75, 1.0]), 4).unwrap();
        assert_eq!(bins_of(&c), vec![0, 0, 1, 2, 3]);
    }

    #[test]
    fn test_width_based_not_frequency_based() {
        // Skewed scores: most regions crowd the bottom bin.
        let c = classify(&composite(&[0.0, 0.01, 0.02, 0.03, 0.04, 1.0]), 4).unwrap();
        assert_eq!(c.members(0).len(), 5);
        assert!(c.members(1).is_empty());
        assert_eq!(c.members(3), vec!["R5"]);
    }

    #[test]
    fn test_constant_scores_are_degenerate() {
        assert!(matches!(
            classify(&composite(&[0.4, 0.4, 0.4]), 4),
            Err(EngineError::DegenerateRange { .. })
        ));
    }

    #[test]
    fn test_zero_bins_rejected() {
        assert!(matches!(
            classify(&composite(&[0.0, 1.0]), 0),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_single_bin_holds_everything() {
        let c = classify(&composite(&[0.0, 0.5, 1.0]), 1).unwrap();
        assert_eq!(bins_of(&c), vec![0, 0, 0]);
    }

    #[test]
    fn test_pinned_bounds_clamp_outliers() {
        let c = classify_with_bounds(&composite(&[-0.5, 0.3, 1.7]), 0.0, 1.0, 4).unwrap();
        assert_eq!(bins_of(&c), vec![0, 1, 3]);
    }

    #[test]
    fn test_scaling_keeps_bins_away_from_edges() {
        let values = [0.05, 0.3, 0.6, 0.95, 0.41];
        let base = bins_of(&classify(&composite(&values), 4).unwrap());
        assert_eq!(base, vec![0, 1, 2, 3, 1]);
        for factor in [0.37, 3.0, 245.234, 1.0e4] {
            let scaled: Vec<f64> = values.iter().map(|v| v * factor).collect();
            let c = classify(&composite(&scaled), 4).unwrap();
            assert_eq!(bins_of(&c), base, "factor {}", factor);
        }
    }

    #[test]
    fn test_tier_lookup() {
        assert_eq!(tier_for_bin(3, 4).name, "선진형");
        assert_eq!(tier_for_bin(0, 4).name, "개발필요형");
        assert_eq!(tier_for_bin(2, 5).name, "Group 3");
    }

    #[test]
    fn test_profile_means() {
        let score = composite(&[0.0, 0.1, 0.9, 1.0]);
        let raw = RegionScalar::from_pairs("income", [("R0", 10.0), ("R1", 20.0), ("R2", 30.0), ("R3", 50.0)]);
        let c = classify(&score, 2).unwrap();
        let profiles = profile(&c, &score, &[&raw]).unwrap();
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[0].regions, vec!["R0", "R1"]);
        assert_eq!(profiles[0].metric_means, vec![("income".to_string(), 15.0)]);
        assert!((profiles[1].mean_score - 0.95).abs() < 1e-12);
        assert_eq!(profiles[1].count(), 2);
    }

    #[test]
    fn test_profile_skips_empty_bins() {
        let score = composite(&[0.0, 1.0]);
        let c = classify(&score, 4).unwrap();
        let profiles = profile(&c, &score, &[]).unwrap();
        let bins: Vec<usize> = profiles.iter().map(|p| p.bin).collect();
        assert_eq!(bins, vec![0, 3]);
    }

    proptest! {
        #[test]
        fn prop_extremes_land_in_edge_bins(
            values in prop::collection::vec(-1e3f64..1e3, 2..20),
            bins in 1usize..8,
        ) {
            let score = composite(&values);
            prop_assume!(score.scalar.min() != score.scalar.max());
            let c = classify(&score, bins).unwrap();
            let min = score.scalar.min().unwrap();
            let max = score.scalar.max().unwrap();
            for ((_, value), (_, bin)) in score.scalar.iter().zip(c.assignments.iter()) {
                if value == min { prop_assert_eq!(*bin, 0); }
                if value == max { prop_assert_eq!(*bin, bins - 1); }
                prop_assert!(*bin < bins);
            }
        }

        // Scaling by a power of two is exact in binary floating point, so
        // every value, including one sitting exactly on a bin edge, keeps
        // its bin. Other factors can move an exact edge value by one ulp.
        #[test]
        fn prop_invariant_under_power_of_two_scaling(
            values in prop::collection::vec(0.0f64..1.0, 2..20),
            exp in -4i32..8,
        ) {
            let score = composite(&values);
            prop_assume!(score.scalar.min() != score.scalar.max());
            let factor = 2f64.powi(exp);
            let scaled: Vec<f64> = values.iter().map(|v| v * factor).collect();
            let a = classify(&score, 4).unwrap();
            let b = classify(&composite(&scaled), 4).unwrap();
            prop_assert_eq!(bins_of(&a), bins_of(&b));
        }
    }
}
