use crate::error::{EngineError, Result};
use serde::Serialize;
use std::collections::HashMap;
use tabled::Tabled;

pub type Year = i32;

/// The seventeen first-level administrative regions, in the order the
/// source tables list them.
pub const REGIONS: [&str; 17] = [
    "서울", "부산", "대구", "인천", "광주", "대전", "울산", "세종", "경기", "강원", "충북", "충남",
    "전북", "전남", "경북", "경남", "제주",
];

pub fn is_standard_region(name: &str) -> bool {
    REGIONS.contains(&name)
}

/// Capital region; the reference point of the inequality index.
pub const CAPITAL_REGION: &str = "서울";

/// One metric as loaded from a source table, keyed by (region, year).
#[derive(Debug, Clone, PartialEq)]
pub struct RegionMetricTable {
    metric: String,
    regions: Vec<String>,
    years: Vec<Year>,
    values: HashMap<(String, Year), f64>,
}

impl RegionMetricTable {
    pub fn new(metric: impl Into<String>, years: impl IntoIterator<Item = Year>) -> Self {
        let mut years: Vec<Year> = years.into_iter().collect();
        years.sort_unstable();
        years.dedup();
        Self {
            metric: metric.into(),
            regions: Vec::new(),
            years,
            values: HashMap::new(),
        }
    }

    pub fn metric(&self) -> &str {
        &self.metric
    }

    pub fn regions(&self) -> &[String] {
        &self.regions
    }

    pub fn years(&self) -> &[Year] {
        &self.years
    }

    /// Declare a region without cells, so completeness checks see it.
    pub fn add_region(&mut self, region: &str) {
        if !self.regions.iter().any(|r| r == region) {
            self.regions.push(region.to_string());
        }
    }

    /// Record a cell. Regions keep the order in which they first appear.
    pub fn insert(&mut self, region: &str, year: Year, value: f64) {
        self.add_region(region);
        self.values.insert((region.to_string(), year), value);
    }

    pub fn get(&self, region: &str, year: Year) -> Option<f64> {
        self.values.get(&(region.to_string(), year)).copied()
    }

    /// Cells of one region in year order; `None` where a cell is missing.
    pub fn series(&self, region: &str) -> Vec<Option<f64>> {
        self.years.iter().map(|y| self.get(region, *y)).collect()
    }

    /// Every region must carry a value for every year of the table.
    pub fn missing_cells(&self) -> Vec<(String, Year)> {
        let mut missing = Vec::new();
        for region in &self.regions {
            for year in &self.years {
                if self.get(region, *year).is_none() {
                    missing.push((region.clone(), *year));
                }
            }
        }
        missing
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

/// A named region → value mapping that preserves insertion order.
///
/// Order matters: the ranker breaks ties by it, and report tables list
/// regions in it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionScalar {
    name: String,
    entries: Vec<(String, f64)>,
}

impl RegionScalar {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    pub fn from_pairs<I, S>(name: impl Into<String>, pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut scalar = Self::new(name);
        for (region, value) in pairs {
            scalar.insert(region, value);
        }
        scalar
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Insert or overwrite; an overwritten region keeps its position.
    pub fn insert(&mut self, region: impl Into<String>, value: f64) {
        let region = region.into();
        match self.entries.iter_mut().find(|(r, _)| *r == region) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((region, value)),
        }
    }

    pub fn get(&self, region: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(r, _)| r == region)
            .map(|(_, v)| *v)
    }

    /// Like `get`, but a missing region is an `IncompleteInput` failure.
    pub fn require(&self, region: &str) -> Result<f64> {
        self.get(region)
            .ok_or_else(|| EngineError::incomplete(&self.name, region))
    }

    pub fn contains(&self, region: &str) -> bool {
        self.entries.iter().any(|(r, _)| r == region)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.entries.iter().map(|(r, v)| (r.as_str(), *v))
    }

    pub fn regions(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|(r, _)| r.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.entries.iter().map(|(_, v)| *v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn min(&self) -> Option<f64> {
        self.values().reduce(f64::min)
    }

    pub fn max(&self) -> Option<f64> {
        self.values().reduce(f64::max)
    }

    pub fn map_values(&self, name: impl Into<String>, f: impl Fn(f64) -> f64) -> Self {
        Self {
            name: name.into(),
            entries: self.entries.iter().map(|(r, v)| (r.clone(), f(*v))).collect(),
        }
    }
}

/// Anything that can feed the weighted aggregator.
pub trait AsScalar {
    fn as_scalar(&self) -> &RegionScalar;
}

impl AsScalar for RegionScalar {
    fn as_scalar(&self) -> &RegionScalar {
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Normalization {
    /// `value / value[reference] * 100`, rounded to one decimal.
    ReferenceRatio { reference: String },
    /// `(value - min) / (max - min)`, full precision.
    UnitRange,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedScalar {
    pub policy: Normalization,
    pub scalar: RegionScalar,
}

impl AsScalar for NormalizedScalar {
    fn as_scalar(&self) -> &RegionScalar {
        &self.scalar
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    /// Lowest value gets rank 1.
    Ascending,
    /// Highest value gets rank 1.
    Descending,
}

/// Ranks 1..N, stored as floats so they combine like any other scalar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedScalar {
    pub direction: Direction,
    pub scalar: RegionScalar,
}

impl RankedScalar {
    pub fn rank(&self, region: &str) -> Option<usize> {
        self.scalar.get(region).map(|r| r as usize)
    }
}

impl AsScalar for RankedScalar {
    fn as_scalar(&self) -> &RegionScalar {
        &self.scalar
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositeScore {
    pub scalar: RegionScalar,
}

impl CompositeScore {
    pub fn name(&self) -> &str {
        self.scalar.name()
    }

    pub fn get(&self, region: &str) -> Option<f64> {
        self.scalar.get(region)
    }

    /// Round every score to `decimals` places, as the display tables do.
    pub fn rounded(&self, decimals: u32) -> Self {
        Self {
            scalar: self
                .scalar
                .map_values(self.scalar.name(), |v| crate::util::round_to(v, decimals)),
        }
    }
}

impl AsScalar for CompositeScore {
    fn as_scalar(&self) -> &RegionScalar {
        &self.scalar
    }
}

/// Rank band used for presentation grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Tier {
    Top,
    Middle,
    Bottom,
}

/// Names and colors of the three rank bands for one report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierLabels {
    pub top: (&'static str, &'static str),
    pub middle: (&'static str, &'static str),
    pub bottom: (&'static str, &'static str),
}

impl TierLabels {
    pub const POLICY: TierLabels = TierLabels {
        top: ("최우선", "#FF6B6B"),
        middle: ("우선", "#FFB347"),
        bottom: ("안정", "#90EE90"),
    };

    pub const INEQUALITY: TierLabels = TierLabels {
        top: ("상위권", "#2E8B57"),
        middle: ("중위권", "#FFD700"),
        bottom: ("하위권", "#DC143C"),
    };

    pub fn label(&self, tier: Tier) -> &'static str {
        self.entry(tier).0
    }

    pub fn color(&self, tier: Tier) -> &'static str {
        self.entry(tier).1
    }

    fn entry(&self, tier: Tier) -> (&'static str, &'static str) {
        match tier {
            Tier::Top => self.top,
            Tier::Middle => self.middle,
            Tier::Bottom => self.bottom,
        }
    }
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct InequalityRow {
    #[serde(rename = "Rank")]
    #[tabled(rename = "Rank")]
    pub rank: usize,
    #[serde(rename = "Region")]
    #[tabled(rename = "Region")]
    pub region: String,
    #[serde(rename = "Activity")]
    #[tabled(rename = "Activity")]
    pub activity: String,
    #[serde(rename = "Hospitals")]
    #[tabled(rename = "Hospitals")]
    pub hospitals: String,
    #[serde(rename = "Doctors")]
    #[tabled(rename = "Doctors")]
    pub doctors: String,
    #[serde(rename = "Income")]
    #[tabled(rename = "Income")]
    pub income: String,
    #[serde(rename = "Education")]
    #[tabled(rename = "Education")]
    pub education: String,
    #[serde(rename = "Employment")]
    #[tabled(rename = "Employment")]
    pub employment: String,
    #[serde(rename = "InequalityIndex")]
    #[tabled(rename = "InequalityIndex")]
    pub index: String,
    #[serde(rename = "Tier")]
    #[tabled(rename = "Tier")]
    pub tier: String,
    #[serde(rename = "TierColor")]
    #[tabled(skip)]
    pub tier_color: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct PolicyRow {
    #[serde(rename = "Rank")]
    #[tabled(rename = "Rank")]
    pub rank: usize,
    #[serde(rename = "Region")]
    #[tabled(rename = "Region")]
    pub region: String,
    #[serde(rename = "Economic")]
    #[tabled(rename = "Economic")]
    pub economic: String,
    #[serde(rename = "Education")]
    #[tabled(rename = "Education")]
    pub education: String,
    #[serde(rename = "Medical")]
    #[tabled(rename = "Medical")]
    pub medical: String,
    #[serde(rename = "HealthPromotion")]
    #[tabled(rename = "HealthPromotion")]
    pub health_promotion: String,
    #[serde(rename = "OverallPriority")]
    #[tabled(rename = "OverallPriority")]
    pub overall: String,
    #[serde(rename = "Tier")]
    #[tabled(rename = "Tier")]
    pub tier: String,
    #[serde(rename = "TierColor")]
    #[tabled(skip)]
    pub tier_color: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct RecommendationRow {
    #[serde(rename = "Region")]
    #[tabled(rename = "Region")]
    pub region: String,
    #[serde(rename = "Rank")]
    #[tabled(rename = "Rank")]
    pub rank: usize,
    #[serde(rename = "TopPriority")]
    #[tabled(rename = "TopPriority")]
    pub top_priority: String,
    #[serde(rename = "SecondPriority")]
    #[tabled(rename = "SecondPriority")]
    pub second_priority: String,
    #[serde(rename = "Primary")]
    #[tabled(rename = "Primary")]
    pub primary: String,
    #[serde(rename = "Secondary")]
    #[tabled(rename = "Secondary")]
    pub secondary: String,
    #[serde(rename = "Actions")]
    #[tabled(rename = "Actions")]
    pub actions: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct ClusterRow {
    #[serde(rename = "Region")]
    #[tabled(rename = "Region")]
    pub region: String,
    #[serde(rename = "CompositeScore")]
    #[tabled(rename = "CompositeScore")]
    pub score: String,
    #[serde(rename = "Cluster")]
    #[tabled(rename = "Cluster")]
    pub cluster: usize,
    #[serde(rename = "ClusterName")]
    #[tabled(rename = "ClusterName")]
    pub cluster_name: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct InsightRow {
    #[serde(rename = "Metric")]
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[serde(rename = "Highest")]
    #[tabled(rename = "Highest")]
    pub highest: String,
    #[serde(rename = "Lowest")]
    #[tabled(rename = "Lowest")]
    pub lowest: String,
    #[serde(rename = "Gap")]
    #[tabled(rename = "Gap")]
    pub gap: String,
    #[serde(rename = "Average")]
    #[tabled(rename = "Average")]
    pub average: String,
    #[serde(rename = "StdDev")]
    #[tabled(rename = "StdDev")]
    pub std_dev: String,
    #[serde(rename = "Disparity")]
    #[tabled(rename = "Disparity")]
    pub disparity: String,
    #[serde(rename = "MeanChange")]
    #[tabled(rename = "MeanChange")]
    pub mean_change: String,
    #[serde(rename = "TotalChangePct")]
    #[tabled(rename = "TotalChangePct")]
    pub total_change_pct: String,
    /// Yearly change of the cross-region mean.
    #[serde(rename = "TrendPerYear")]
    #[tabled(rename = "TrendPerYear")]
    pub trend: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct CorrelationRow {
    #[serde(rename = "X")]
    #[tabled(rename = "X")]
    pub x: String,
    #[serde(rename = "Y")]
    #[tabled(rename = "Y")]
    pub y: String,
    #[serde(rename = "R")]
    #[tabled(rename = "R")]
    pub r: String,
    #[serde(rename = "RSquared")]
    #[tabled(rename = "RSquared")]
    pub r_squared: String,
    #[serde(rename = "Slope")]
    #[tabled(rename = "Slope")]
    pub slope: String,
    #[serde(rename = "Intercept")]
    #[tabled(rename = "Intercept")]
    pub intercept: String,
    #[serde(rename = "Strength")]
    #[tabled(rename = "Strength")]
    pub strength: String,
}

#[derive(Debug, Serialize)]
pub struct SummaryStats {
    pub generated_at: String,
    pub regions: usize,
    pub metrics_loaded: usize,
    pub metrics_failed: Vec<String>,
    pub inequality_top: Option<String>,
    pub inequality_bottom: Option<String>,
    pub inequality_gap: Option<f64>,
    pub policy_most_urgent: Option<String>,
    pub policy_average: Option<f64>,
    pub cluster_sizes: Vec<(String, usize)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_keeps_insertion_order_on_overwrite() {
        let mut s = RegionScalar::from_pairs("x", [("B", 1.0), ("A", 2.0)]);
        s.insert("B", 5.0);
        let regions: Vec<&str> = s.regions().collect();
        assert_eq!(regions, vec!["B", "A"]);
        assert_eq!(s.get("B"), Some(5.0));
    }

    #[test]
    fn test_require_reports_incomplete_input() {
        let s = RegionScalar::from_pairs("income", [("A", 1.0)]);
        match s.require("B") {
            Err(EngineError::IncompleteInput { input, region }) => {
                assert_eq!(input, "income");
                assert_eq!(region, "B");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_table_reports_missing_cells() {
        let mut t = RegionMetricTable::new("hospitals", 2020..=2021);
        t.insert("A", 2020, 1.0);
        t.insert("A", 2021, 2.0);
        t.insert("B", 2020, 3.0);
        assert_eq!(t.missing_cells(), vec![("B".to_string(), 2021)]);
        assert_eq!(t.series("A"), vec![Some(1.0), Some(2.0)]);
    }

    #[test]
    fn test_tier_labels() {
        assert_eq!(TierLabels::POLICY.label(Tier::Top), "최우선");
        assert_eq!(TierLabels::INEQUALITY.color(Tier::Bottom), "#DC143C");
    }

    #[test]
    fn test_standard_regions() {
        assert!(is_standard_region("세종"));
        assert!(is_standard_region(CAPITAL_REGION));
        assert!(!is_standard_region("전국"));
        assert!(!is_standard_region("서울특별시"));
    }
}
