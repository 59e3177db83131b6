//! Run configuration.
//!
//! Every field has a default matching the regional dataset layout, so a
//! config file only needs to name what it overrides:
//!
//! ```toml
//! data_dir = "data"
//! reference_region = "서울"
//!
//! [clustering]
//! bins = 4
//!
//! [policy_weights]
//! economic = 0.3
//! education = 0.2
//! medical = 0.3
//! health_promotion = 0.2
//! ```

use crate::aggregate::validate_weights;
use crate::error::{EngineError, Result};
use crate::rank::TierCuts;
use crate::types::{Year, CAPITAL_REGION};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Metric keys used by the reports.
pub mod metric {
    pub const INCOME: &str = "income";
    pub const EDUCATION: &str = "education";
    pub const EMPLOYMENT: &str = "employment";
    pub const UNEMPLOYMENT: &str = "unemployment";
    pub const HOSPITALS: &str = "hospitals";
    pub const DOCTORS: &str = "doctors";
    pub const HEALTH_CENTERS: &str = "healthcenters";
    pub const ACTIVITY: &str = "activity";
    pub const SMOKING: &str = "smoking";
    pub const DRINKING: &str = "drinking";
    pub const OBESITY: &str = "obesity";
}

/// How a source CSV is oriented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableLayout {
    /// One row per region, one column per year.
    RegionRows,
    /// One row per year, one column per region.
    YearRows,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub metric: String,
    pub label: String,
    /// Relative to `data_dir` unless absolute.
    pub path: PathBuf,
    pub layout: TableLayout,
    /// Row-key column; the first column when absent.
    #[serde(default)]
    pub key_column: Option<String>,
}

impl SourceSpec {
    fn new(metric: &str, label: &str, path: &str, layout: TableLayout, key: Option<&str>) -> Self {
        Self {
            metric: metric.to_string(),
            label: label.to_string(),
            path: PathBuf::from(path),
            layout,
            key_column: key.map(str::to_string),
        }
    }
}

pub fn default_sources() -> Vec<SourceSpec> {
    use metric::*;
    use TableLayout::*;
    vec![
        SourceSpec::new(DRINKING, "음주율", "health_region/drinking_2020_2024_kr.csv", YearRows, None),
        SourceSpec::new(OBESITY, "비만율", "health_region/obesity_2020_2024_kr.csv", YearRows, None),
        SourceSpec::new(SMOKING, "흡연율", "health_region/smoking_2020_2024_kr.csv", YearRows, None),
        SourceSpec::new(ACTIVITY, "신체활동률", "health_region/activity_2020_2024_kr.csv", YearRows, None),
        SourceSpec::new(HOSPITALS, "병원수", "health_accessibility/hospitals_2020_2024.csv", RegionRows, Some("지역")),
        SourceSpec::new(DOCTORS, "의사수", "health_accessibility/doctors_2020_2024.csv", RegionRows, Some("지역")),
        SourceSpec::new(HEALTH_CENTERS, "보건소수", "health_accessibility/healthcenters_2020_2024.csv", RegionRows, Some("지역")),
        SourceSpec::new(INCOME, "소득", "socioeconomic/소득_2020_2024.csv", YearRows, Some("년도")),
        SourceSpec::new(EDUCATION, "교육수준", "socioeconomic/교육수준_2020_2024.csv", YearRows, Some("년도")),
        SourceSpec::new(EMPLOYMENT, "고용률", "socioeconomic/고용률_2020_2024.csv", YearRows, Some("년도")),
        SourceSpec::new(UNEMPLOYMENT, "실업률", "socioeconomic/실업률_2020_2024.csv", YearRows, Some("년도")),
    ]
}

/// Weights of the reference-ratio inequality index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InequalityWeights {
    pub activity: f64,
    pub hospitals: f64,
    pub doctors: f64,
    pub income: f64,
    pub education: f64,
    pub employment: f64,
}

impl Default for InequalityWeights {
    fn default() -> Self {
        Self {
            activity: 0.15,
            hospitals: 0.15,
            doctors: 0.20,
            income: 0.25,
            education: 0.15,
            employment: 0.10,
        }
    }
}

impl InequalityWeights {
    pub fn validate(&self) -> Result<()> {
        validate_weights(
            "inequality_index",
            [
                self.activity,
                self.hospitals,
                self.doctors,
                self.income,
                self.education,
                self.employment,
            ],
        )
    }
}

/// Weights of the four policy domains in the overall priority score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyWeights {
    pub economic: f64,
    pub education: f64,
    pub medical: f64,
    pub health_promotion: f64,
}

impl Default for PolicyWeights {
    fn default() -> Self {
        Self {
            economic: 0.3,
            education: 0.2,
            medical: 0.3,
            health_promotion: 0.2,
        }
    }
}

impl PolicyWeights {
    pub fn validate(&self) -> Result<()> {
        validate_weights(
            "overall_priority",
            [self.economic, self.education, self.medical, self.health_promotion],
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterWeights {
    pub income: f64,
    pub education: f64,
    pub employment: f64,
    pub hospitals: f64,
    pub doctors: f64,
    pub activity: f64,
}

impl Default for ClusterWeights {
    fn default() -> Self {
        Self {
            income: 0.30,
            education: 0.20,
            employment: 0.15,
            hospitals: 0.15,
            doctors: 0.15,
            activity: 0.05,
        }
    }
}

impl ClusterWeights {
    pub fn validate(&self) -> Result<()> {
        validate_weights(
            "development_score",
            [
                self.income,
                self.education,
                self.employment,
                self.hospitals,
                self.doctors,
                self.activity,
            ],
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterSettings {
    pub bins: usize,
    pub weights: ClusterWeights,
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            bins: 4,
            weights: ClusterWeights::default(),
        }
    }
}

/// Fixed rank cut points; `top` and `middle` are inclusive last positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CutOverride {
    pub top: usize,
    pub middle: usize,
}

/// Rank cuts per report. Absent entries scale with the region count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierSettings {
    pub policy: Option<CutOverride>,
    pub inequality: Option<CutOverride>,
}

impl TierSettings {
    /// 5 / 10 of 17 regions by default.
    pub fn policy_cuts(&self, regions: usize) -> Result<TierCuts> {
        match self.policy {
            Some(c) => TierCuts::new(c.top, c.middle),
            None => Ok(TierCuts::for_region_count(regions)),
        }
    }

    /// 5 / 12 of 17 regions by default.
    pub fn inequality_cuts(&self, regions: usize) -> Result<TierCuts> {
        match self.inequality {
            Some(c) => TierCuts::new(c.top, c.middle),
            None => Ok(TierCuts::proportional(regions, 5, 12, 17)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStyle {
    Markdown,
    Ascii,
    Modern,
    Psql,
}

/// Console presentation settings handed to the output layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderStyle {
    pub preview_rows: usize,
    pub table_style: TableStyle,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            preview_rows: 5,
            table_style: TableStyle::Markdown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: PathBuf,
    pub out_dir: PathBuf,
    pub reference_region: String,
    pub first_year: Year,
    pub last_year: Year,
    /// Year used by single-year reductions.
    pub analysis_year: Year,
    /// Aggregate rows/columns such as a national total.
    pub exclude_regions: Vec<String>,
    pub sources: Vec<SourceSpec>,
    pub inequality_weights: InequalityWeights,
    pub policy_weights: PolicyWeights,
    pub clustering: ClusterSettings,
    pub tiers: TierSettings,
    pub render: RenderStyle,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            out_dir: PathBuf::from("."),
            reference_region: CAPITAL_REGION.to_string(),
            first_year: 2020,
            last_year: 2024,
            analysis_year: 2024,
            exclude_regions: vec!["전국".to_string(), "전체".to_string(), "합계".to_string()],
            sources: default_sources(),
            inequality_weights: InequalityWeights::default(),
            policy_weights: PolicyWeights::default(),
            clustering: ClusterSettings::default(),
            tiers: TierSettings::default(),
            render: RenderStyle::default(),
        }
    }
}

impl Config {
    /// Load from a TOML file, or use defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(p) => {
                let contents = fs::read_to_string(p)?;
                let config = Self::from_toml(&contents)?;
                debug!("Loaded config from {}", p.display());
                config
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str::<Config>(contents)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.first_year > self.last_year {
            return Err(EngineError::InvalidConfig(format!(
                "first_year {} is after last_year {}",
                self.first_year, self.last_year
            )));
        }
        if !self.years().contains(&self.analysis_year) {
            return Err(EngineError::InvalidConfig(format!(
                "analysis_year {} is outside {}..={}",
                self.analysis_year, self.first_year, self.last_year
            )));
        }
        if self.clustering.bins == 0 {
            return Err(EngineError::InvalidConfig(
                "clustering.bins must be at least 1".to_string(),
            ));
        }
        if self.reference_region.trim().is_empty() {
            return Err(EngineError::InvalidConfig(
                "reference_region must not be empty".to_string(),
            ));
        }
        for (i, source) in self.sources.iter().enumerate() {
            if self.sources[..i].iter().any(|s| s.metric == source.metric) {
                return Err(EngineError::InvalidConfig(format!(
                    "metric '{}' is defined by more than one source",
                    source.metric
                )));
            }
        }
        for cut in [self.tiers.policy, self.tiers.inequality].into_iter().flatten() {
            TierCuts::new(cut.top, cut.middle)?;
        }
        self.inequality_weights.validate()?;
        self.policy_weights.validate()?;
        self.clustering.weights.validate()?;
        Ok(())
    }

    pub fn years(&self) -> std::ops::RangeInclusive<Year> {
        self.first_year..=self.last_year
    }

    pub fn source_path(&self, source: &SourceSpec) -> PathBuf {
        if source.path.is_absolute() {
            source.path.clone()
        } else {
            self.data_dir.join(&source.path)
        }
    }

    pub fn label_of<'a>(&'a self, metric: &'a str) -> &'a str {
        self.sources
            .iter()
            .find(|s| s.metric == metric)
            .map(|s| s.label.as_str())
            .unwrap_or(metric)
    }
}
