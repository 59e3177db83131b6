//! Report generators. Each one pulls its inputs from the loaded dataset,
//! runs them through the normalize / aggregate / rank / classify stages and
//! returns display rows alongside the numbers behind them.
//!
//! A generator fails as a whole when any input is unavailable; callers
//! decide how to present that.

use crate::aggregate::{mean_of, weighted_sum};
use crate::classify::{classify, profile, tier_for_bin, Classification, ClusterProfile};
use crate::config::{metric, Config};
use crate::error::{EngineError, Result};
use crate::loader::{Dataset, LoadReport};
use crate::normalize::{reference_ratio, unit_range};
use crate::rank::{bucket, order_by_score, rank};
use crate::reduce::{mean_over_years, reduce, Reduction};
use crate::stats::{correlate, metric_insight};
use crate::types::{
    AsScalar, ClusterRow, CompositeScore, CorrelationRow, Direction, InequalityRow, InsightRow,
    PolicyRow, RecommendationRow, RegionScalar, SummaryStats, TierLabels,
};
use crate::util::{average, format_number, round_to};
use chrono::Local;
use tracing::{debug, info, warn};

fn input(data: &Dataset, metric: &str, reduction: Reduction) -> Result<RegionScalar> {
    reduce(data.get(metric)?, reduction)
}

fn fmt1(scalar: &dyn AsScalar, region: &str) -> Result<String> {
    Ok(format_number(scalar.as_scalar().require(region)?, 1))
}

pub struct InequalityReport {
    pub rows: Vec<InequalityRow>,
    pub score: CompositeScore,
    pub best: (String, f64),
    pub worst: (String, f64),
    pub gap: f64,
    pub mean: f64,
}

/// Reference-ratio index: every input as a percentage of the reference
/// region, weighted, rounded to one decimal and sorted best first.
pub fn generate_inequality(data: &Dataset, config: &Config) -> Result<InequalityReport> {
    let year = Reduction::Year(config.analysis_year);
    let reference = config.reference_region.as_str();
    let weights = &config.inequality_weights;

    let activity = reference_ratio(&input(data, metric::ACTIVITY, Reduction::MeanOverYears)?, reference)?;
    let hospitals = reference_ratio(&input(data, metric::HOSPITALS, year)?, reference)?;
    let doctors = reference_ratio(&input(data, metric::DOCTORS, year)?, reference)?;
    let income = reference_ratio(&input(data, metric::INCOME, year)?, reference)?;
    let education = reference_ratio(&input(data, metric::EDUCATION, year)?, reference)?;
    let employment = reference_ratio(&input(data, metric::EMPLOYMENT, year)?, reference)?;

    let score = weighted_sum(
        "inequality_index",
        &[
            (&activity, weights.activity),
            (&hospitals, weights.hospitals),
            (&doctors, weights.doctors),
            (&income, weights.income),
            (&education, weights.education),
            (&employment, weights.employment),
        ],
    )?
    .rounded(1);

    let ordered = order_by_score(&score.scalar, Direction::Descending);
    let cuts = config.tiers.inequality_cuts(ordered.len())?;
    let mut rows = Vec::with_capacity(ordered.len());
    for (position, region, value, tier) in bucket(&ordered, &cuts) {
        rows.push(InequalityRow {
            rank: position,
            activity: fmt1(&activity, &region)?,
            hospitals: fmt1(&hospitals, &region)?,
            doctors: fmt1(&doctors, &region)?,
            income: fmt1(&income, &region)?,
            education: fmt1(&education, &region)?,
            employment: fmt1(&employment, &region)?,
            index: format_number(value, 1),
            tier: TierLabels::INEQUALITY.label(tier).to_string(),
            tier_color: TierLabels::INEQUALITY.color(tier).to_string(),
            region,
        });
    }

    let (best, worst) = match (ordered.first(), ordered.last()) {
        (Some(b), Some(w)) => (b.clone(), w.clone()),
        _ => return Err(EngineError::incomplete(score.name(), "<any>")),
    };
    let values: Vec<f64> = score.scalar.values().collect();
    info!("Inequality index computed for {} regions", rows.len());
    Ok(InequalityReport {
        gap: best.1 - worst.1,
        mean: average(&values),
        rows,
        score,
        best,
        worst,
    })
}

/// One of the four policy areas scored by the priority matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDomain {
    Economic,
    Education,
    Medical,
    HealthPromotion,
}

impl PolicyDomain {
    pub const ALL: [PolicyDomain; 4] = [
        PolicyDomain::Economic,
        PolicyDomain::Education,
        PolicyDomain::Medical,
        PolicyDomain::HealthPromotion,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            PolicyDomain::Economic => "경제정책",
            PolicyDomain::Education => "교육정책",
            PolicyDomain::Medical => "의료정책",
            PolicyDomain::HealthPromotion => "건강증진정책",
        }
    }

    fn primary_text(&self, region: &str) -> String {
        match self {
            PolicyDomain::Economic => format!("{}은 소득 증대와 고용 창출이 최우선 과제입니다.", region),
            PolicyDomain::Education => {
                format!("{}은 교육 인프라 확충과 교육 격차 해소가 시급합니다.", region)
            }
            PolicyDomain::Medical => format!("{}은 의료 접근성 개선이 가장 중요한 과제입니다.", region),
            PolicyDomain::HealthPromotion => format!("{}은 건강한 생활습관 증진이 필요합니다.", region),
        }
    }

    fn secondary_text(&self) -> &'static str {
        match self {
            PolicyDomain::Economic => "경제 활성화 지원이 추가로 필요합니다.",
            PolicyDomain::Education => "교육 기회 확대가 보완적으로 요구됩니다.",
            PolicyDomain::Medical => "의료 서비스 개선이 동반되어야 합니다.",
            PolicyDomain::HealthPromotion => "건강증진 프로그램 확대가 필요합니다.",
        }
    }
}

/// Domains ordered by score, largest first. Ties keep `PolicyDomain::ALL`
/// order.
pub fn rank_domains(scores: &[(PolicyDomain, f64)]) -> Vec<PolicyDomain> {
    let mut sorted = scores.to_vec();
    sorted.sort_by(|a, b| b.1.total_cmp(&a.1));
    sorted.into_iter().map(|(d, _)| d).collect()
}

/// Raw values consulted by the action rules, one region at a time.
struct RawInputs {
    income: RegionScalar,
    education: RegionScalar,
    unemployment: RegionScalar,
    hospitals: RegionScalar,
    doctors: RegionScalar,
    activity: RegionScalar,
    smoking: RegionScalar,
}

fn actions_for(domain: PolicyDomain, raw: &RawInputs, region: &str) -> Result<Vec<&'static str>> {
    let mut actions = Vec::new();
    match domain {
        PolicyDomain::Economic => {
            if raw.unemployment.require(region)? > 4.0 {
                actions.extend(["청년 일자리 창출 프로그램 강화", "지역 특화 산업 육성"]);
            }
            if raw.income.require(region)? < 4000.0 {
                actions.extend(["중소기업 지원 확대", "기업 유치 인센티브 제공"]);
            }
        }
        PolicyDomain::Education => {
            if raw.education.require(region)? < 60.0 {
                actions.extend(["평생교육 프로그램 확대", "원격교육 인프라 구축", "교육시설 현대화"]);
            }
        }
        PolicyDomain::Medical => {
            if raw.doctors.require(region)? < 2000.0 {
                actions.extend(["의료인력 확충 지원", "응급의료 시스템 강화"]);
            }
            if raw.hospitals.require(region)? < 2000.0 {
                actions.extend(["지역 의료기관 확충", "의료 접근성 개선 (교통)"]);
            }
        }
        PolicyDomain::HealthPromotion => {
            if raw.activity.require(region)? < 25.0 {
                actions.extend(["체육시설 확충", "건강걷기 프로그램 운영"]);
            }
            if raw.smoking.require(region)? > 20.0 {
                actions.extend(["금연 지원 프로그램 강화", "금연 환경 조성"]);
            }
        }
    }
    Ok(actions)
}

pub struct PolicyReport {
    pub rows: Vec<PolicyRow>,
    pub recommendations: Vec<RecommendationRow>,
    pub domains: Vec<(PolicyDomain, CompositeScore)>,
    pub overall: CompositeScore,
}

impl PolicyReport {
    pub fn domain_score(&self, domain: PolicyDomain, region: &str) -> Option<f64> {
        self.domains
            .iter()
            .find(|(d, _)| *d == domain)
            .and_then(|(_, score)| score.get(region))
    }
}

/// Rank-based priority matrix. Weaker regions collect larger ranks, so a
/// larger domain score means a more urgent need.
pub fn generate_policy(data: &Dataset, config: &Config) -> Result<PolicyReport> {
    let year = Reduction::Year(config.analysis_year);
    let raw = RawInputs {
        income: input(data, metric::INCOME, year)?,
        education: input(data, metric::EDUCATION, year)?,
        unemployment: input(data, metric::UNEMPLOYMENT, year)?,
        hospitals: input(data, metric::HOSPITALS, year)?,
        doctors: input(data, metric::DOCTORS, year)?,
        activity: input(data, metric::ACTIVITY, Reduction::MeanOverYears)?,
        smoking: input(data, metric::SMOKING, Reduction::MeanOverYears)?,
    };
    let employment = input(data, metric::EMPLOYMENT, year)?;
    let health_centers = input(data, metric::HEALTH_CENTERS, year)?;

    let desc = |s: &RegionScalar| rank(s, Direction::Descending);
    let asc = |s: &RegionScalar| rank(s, Direction::Ascending);
    let income_rank = desc(&raw.income);
    let employment_rank = desc(&employment);
    let unemployment_rank = asc(&raw.unemployment);
    let education_rank = desc(&raw.education);
    let hospital_rank = desc(&raw.hospitals);
    let doctor_rank = desc(&raw.doctors);
    let center_rank = desc(&health_centers);
    let activity_rank = desc(&raw.activity);
    let smoking_rank = asc(&raw.smoking);

    let economic = mean_of("economic", &[&income_rank, &employment_rank, &unemployment_rank])?.rounded(1);
    let education = mean_of("education", &[&education_rank])?.rounded(1);
    let medical = mean_of("medical", &[&hospital_rank, &doctor_rank, &center_rank])?.rounded(1);
    let health = mean_of("health_promotion", &[&activity_rank, &smoking_rank])?.rounded(1);

    let weights = &config.policy_weights;
    let overall = weighted_sum(
        "overall_priority",
        &[
            (&economic, weights.economic),
            (&education, weights.education),
            (&medical, weights.medical),
            (&health, weights.health_promotion),
        ],
    )?
    .rounded(1);

    let ordered = order_by_score(&overall.scalar, Direction::Descending);
    let cuts = config.tiers.policy_cuts(ordered.len())?;
    let mut rows = Vec::with_capacity(ordered.len());
    let mut recommendations = Vec::with_capacity(ordered.len());
    for (position, region, value, tier) in bucket(&ordered, &cuts) {
        let scores = [
            (PolicyDomain::Economic, economic.scalar.require(&region)?),
            (PolicyDomain::Education, education.scalar.require(&region)?),
            (PolicyDomain::Medical, medical.scalar.require(&region)?),
            (PolicyDomain::HealthPromotion, health.scalar.require(&region)?),
        ];
        let priorities = rank_domains(&scores);
        let (top, second) = (priorities[0], priorities[1]);
        debug!("{}: top {} / second {}", region, top.label(), second.label());

        recommendations.push(RecommendationRow {
            region: region.clone(),
            rank: position,
            top_priority: top.label().to_string(),
            second_priority: second.label().to_string(),
            primary: top.primary_text(&region),
            secondary: second.secondary_text().to_string(),
            actions: actions_for(top, &raw, &region)?.join(" / "),
        });
        rows.push(PolicyRow {
            rank: position,
            economic: format_number(scores[0].1, 1),
            education: format_number(scores[1].1, 1),
            medical: format_number(scores[2].1, 1),
            health_promotion: format_number(scores[3].1, 1),
            overall: format_number(value, 1),
            tier: TierLabels::POLICY.label(tier).to_string(),
            tier_color: TierLabels::POLICY.color(tier).to_string(),
            region,
        });
    }
    info!("Policy priorities computed for {} regions", rows.len());
    Ok(PolicyReport {
        rows,
        recommendations,
        domains: PolicyDomain::ALL
            .into_iter()
            .zip([economic, education, medical, health])
            .collect(),
        overall,
    })
}

pub struct ClusterReport {
    pub rows: Vec<ClusterRow>,
    pub score: CompositeScore,
    pub classification: Classification,
    pub profiles: Vec<ClusterProfile>,
}

/// Display rows, highest score first. Every scored region must have a bin.
fn cluster_rows(score: &CompositeScore, classification: &Classification) -> Result<Vec<ClusterRow>> {
    let mut rows = Vec::with_capacity(score.scalar.len());
    for (region, value) in order_by_score(&score.scalar, Direction::Descending) {
        let bin = classification
            .bin_of(&region)
            .ok_or_else(|| EngineError::incomplete("classification", region.as_str()))?;
        rows.push(ClusterRow {
            cluster_name: tier_for_bin(bin, classification.bins).name,
            region,
            score: format_number(value, 3),
            cluster: bin,
        });
    }
    Ok(rows)
}

/// Unit-range development score split into equal-width bins.
pub fn generate_clusters(data: &Dataset, config: &Config) -> Result<ClusterReport> {
    let year = Reduction::Year(config.analysis_year);
    let raw = [
        input(data, metric::INCOME, year)?,
        input(data, metric::EDUCATION, year)?,
        input(data, metric::EMPLOYMENT, year)?,
        input(data, metric::HOSPITALS, year)?,
        input(data, metric::DOCTORS, year)?,
        input(data, metric::ACTIVITY, Reduction::MeanOverYears)?,
    ];
    let w = &config.clustering.weights;
    let weights = [w.income, w.education, w.employment, w.hospitals, w.doctors, w.activity];
    let normalized = raw.iter().map(unit_range).collect::<Result<Vec<_>>>()?;
    let inputs: Vec<(&dyn AsScalar, f64)> = normalized
        .iter()
        .zip(weights)
        .map(|(n, w)| (n as &dyn AsScalar, w))
        .collect();
    let score = weighted_sum("development_score", &inputs)?;

    let classification = classify(&score, config.clustering.bins)?;
    let raw_refs: Vec<&RegionScalar> = raw.iter().collect();
    let profiles = profile(&classification, &score, &raw_refs)?;

    let rows = cluster_rows(&score, &classification)?;
    info!(
        "Classified {} regions into {} bins ({} occupied)",
        rows.len(),
        classification.bins,
        profiles.len()
    );
    Ok(ClusterReport {
        rows,
        score,
        classification,
        profiles,
    })
}

/// Metric pairs examined by the correlation panel.
pub const CORRELATION_PAIRS: [(&str, &str); 6] = [
    (metric::ACTIVITY, metric::SMOKING),
    (metric::DRINKING, metric::SMOKING),
    (metric::DRINKING, metric::OBESITY),
    (metric::HOSPITALS, metric::DOCTORS),
    (metric::INCOME, metric::EDUCATION),
    (metric::EMPLOYMENT, metric::UNEMPLOYMENT),
];

pub struct InsightReport {
    pub metrics: Vec<InsightRow>,
    pub correlations: Vec<CorrelationRow>,
    /// (subject, reason) of every metric or pair that could not be computed.
    pub skipped: Vec<(String, String)>,
}

/// Per-metric headline numbers plus correlations between related metrics.
/// Unlike the composite reports, one bad metric only drops its own row.
pub fn generate_insights(data: &Dataset, config: &Config) -> Result<InsightReport> {
    let mut metrics = Vec::new();
    let mut skipped = Vec::new();
    for table in data.tables() {
        match metric_insight(table) {
            Ok(m) => metrics.push(InsightRow {
                metric: config.label_of(&m.metric).to_string(),
                highest: format!("{} ({})", m.highest.0, format_number(m.highest.1, 1)),
                lowest: format!("{} ({})", m.lowest.0, format_number(m.lowest.1, 1)),
                gap: format_number(m.gap, 1),
                average: format_number(m.average, 1),
                std_dev: format_number(m.std_dev, 2),
                disparity: m.disparity.label().to_string(),
                mean_change: format_number(m.mean_change, 2),
                total_change_pct: m
                    .total_change_pct
                    .map(|p| format!("{}%", format_number(p, 1)))
                    .unwrap_or_else(|| "-".to_string()),
                trend: format_number(m.yearly_slope, 2),
            }),
            Err(e) => {
                warn!("No insight for {}: {}", table.metric(), e);
                skipped.push((table.metric().to_string(), e.to_string()));
            }
        }
    }

    let mut correlations = Vec::new();
    for (x, y) in CORRELATION_PAIRS {
        let pair = || -> Result<CorrelationRow> {
            let xs = mean_over_years(data.get(x)?)?;
            let ys = mean_over_years(data.get(y)?)?;
            let c = correlate(&xs, &ys)?;
            Ok(CorrelationRow {
                x: config.label_of(x).to_string(),
                y: config.label_of(y).to_string(),
                r: format_number(c.r, 3),
                r_squared: format_number(c.r_squared(), 3),
                slope: format_number(c.fit.slope, 4),
                intercept: format_number(c.fit.intercept, 2),
                strength: c.describe(),
            })
        };
        match pair() {
            Ok(row) => correlations.push(row),
            Err(e) => {
                warn!("No correlation for {} vs {}: {}", x, y, e);
                skipped.push((format!("{} vs {}", x, y), e.to_string()));
            }
        }
    }
    Ok(InsightReport {
        metrics,
        correlations,
        skipped,
    })
}

/// Headline numbers of whichever reports succeeded.
pub fn generate_summary(
    load: &LoadReport,
    inequality: Option<&InequalityReport>,
    policy: Option<&PolicyReport>,
    clusters: Option<&ClusterReport>,
) -> SummaryStats {
    let overall: Vec<f64> = policy
        .map(|p| p.overall.scalar.values().collect())
        .unwrap_or_default();
    SummaryStats {
        generated_at: Local::now().to_rfc3339(),
        regions: load.regions,
        metrics_loaded: load.loaded,
        metrics_failed: load.failed.iter().map(|(m, _)| m.clone()).collect(),
        inequality_top: inequality.map(|r| r.best.0.clone()),
        inequality_bottom: inequality.map(|r| r.worst.0.clone()),
        inequality_gap: inequality.map(|r| round_to(r.gap, 1)),
        policy_most_urgent: policy.and_then(|p| p.rows.first().map(|r| r.region.clone())),
        policy_average: if overall.is_empty() {
            None
        } else {
            Some(round_to(average(&overall), 2))
        },
        cluster_sizes: clusters
            .map(|c| {
                c.profiles
                    .iter()
                    .map(|p| (p.tier.name.clone(), p.count()))
                    .collect()
            })
            .unwrap_or_default(),
    }
}
