//! Descriptive statistics feeding the insight and correlation panels.

use crate::error::{EngineError, Result};
use crate::reduce::mean_over_years;
use crate::types::{RegionMetricTable, RegionScalar};
use crate::util::{average, sample_std_dev};
use serde::Serialize;

/// Values of two scalars over the regions they share, in `x`'s order.
/// Both must cover the same region set.
pub fn paired(x: &RegionScalar, y: &RegionScalar) -> Result<(Vec<f64>, Vec<f64>)> {
    if let Some(extra) = y.regions().find(|r| !x.contains(r)) {
        return Err(EngineError::incomplete(y.name(), extra));
    }
    let mut xs = Vec::with_capacity(x.len());
    let mut ys = Vec::with_capacity(x.len());
    for (region, value) in x.iter() {
        xs.push(value);
        ys.push(y.require(region)?);
    }
    Ok((xs, ys))
}

/// Pearson correlation coefficient.
pub fn pearson(x: &[f64], y: &[f64]) -> Result<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return Err(EngineError::incomplete(
            "correlation",
            format!("{} vs {} values", x.len(), y.len()),
        ));
    }
    let mx = average(x);
    let my = average(y);
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in x.iter().zip(y) {
        sxy += (a - mx) * (b - my);
        sxx += (a - mx).powi(2);
        syy += (b - my).powi(2);
    }
    if sxx == 0.0 {
        return Err(EngineError::DegenerateRange { metric: "x".to_string(), value: mx });
    }
    if syy == 0.0 {
        return Err(EngineError::DegenerateRange { metric: "y".to_string(), value: my });
    }
    Ok((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LineFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LineFit {
    pub fn at(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Ordinary least squares line `y = slope * x + intercept`.
pub fn linear_fit(x: &[f64], y: &[f64]) -> Result<LineFit> {
    if x.len() != y.len() || x.len() < 2 {
        return Err(EngineError::incomplete(
            "trend",
            format!("{} vs {} values", x.len(), y.len()),
        ));
    }
    let mx = average(x);
    let my = average(y);
    let sxx: f64 = x.iter().map(|a| (a - mx).powi(2)).sum();
    if sxx == 0.0 {
        return Err(EngineError::DegenerateRange { metric: "x".to_string(), value: mx });
    }
    let sxy: f64 = x.iter().zip(y).map(|(a, b)| (a - mx) * (b - my)).sum();
    let slope = sxy / sxx;
    Ok(LineFit {
        slope,
        intercept: my - slope * mx,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Strength {
    Strong,
    Moderate,
    Weak,
}

impl Strength {
    /// |r| ≥ 0.7 strong, ≥ 0.3 moderate, else weak.
    pub fn of(r: f64) -> Self {
        let a = r.abs();
        if a >= 0.7 {
            Strength::Strong
        } else if a >= 0.3 {
            Strength::Moderate
        } else {
            Strength::Weak
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Strength::Strong => "강한",
            Strength::Moderate => "중간",
            Strength::Weak => "약한",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Correlation {
    pub x: String,
    pub y: String,
    pub r: f64,
    pub fit: LineFit,
}

impl Correlation {
    pub fn r_squared(&self) -> f64 {
        self.r * self.r
    }

    pub fn strength(&self) -> Strength {
        Strength::of(self.r)
    }

    pub fn direction_label(&self) -> &'static str {
        if self.r > 0.0 {
            "양의"
        } else {
            "음의"
        }
    }

    /// e.g. "강한 양의 상관관계".
    pub fn describe(&self) -> String {
        format!("{} {} 상관관계", self.strength().label(), self.direction_label())
    }
}

/// Correlation and fitted line of two per-region scalars.
pub fn correlate(x: &RegionScalar, y: &RegionScalar) -> Result<Correlation> {
    let (xs, ys) = paired(x, y)?;
    Ok(Correlation {
        x: x.name().to_string(),
        y: y.name().to_string(),
        r: pearson(&xs, &ys)?,
        fit: linear_fit(&xs, &ys)?,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Disparity {
    High,
    Medium,
    Low,
}

impl Disparity {
    /// std > 0.5·mean high, > 0.3·mean medium, else low.
    pub fn of(std_dev: f64, mean: f64) -> Self {
        if std_dev > mean * 0.5 {
            Disparity::High
        } else if std_dev > mean * 0.3 {
            Disparity::Medium
        } else {
            Disparity::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Disparity::High => "높음",
            Disparity::Medium => "중간",
            Disparity::Low => "낮음",
        }
    }
}

/// Headline numbers of one metric over its multi-year means.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricInsight {
    pub metric: String,
    pub highest: (String, f64),
    pub lowest: (String, f64),
    pub gap: f64,
    pub average: f64,
    pub std_dev: f64,
    pub disparity: Disparity,
    /// Cross-region mean of the last year minus that of the first year.
    pub mean_change: f64,
    /// Percent change of the all-region total between first and last year.
    pub total_change_pct: Option<f64>,
    /// OLS slope of the cross-region mean against the year.
    pub yearly_slope: f64,
}

pub fn metric_insight(table: &RegionMetricTable) -> Result<MetricInsight> {
    let means = mean_over_years(table)?;
    let (mut highest, mut lowest) = match means.iter().next() {
        Some((r, v)) => ((r.to_string(), v), (r.to_string(), v)),
        None => return Err(EngineError::incomplete(table.metric(), "<any>")),
    };
    for (region, value) in means.iter() {
        // Strict comparisons keep the first region on ties.
        if value > highest.1 {
            highest = (region.to_string(), value);
        }
        if value < lowest.1 {
            lowest = (region.to_string(), value);
        }
    }
    let values: Vec<f64> = means.values().collect();
    let average = average(&values);
    let std_dev = sample_std_dev(&values);

    let years = table.years();
    let yearly: Vec<(f64, f64, f64)> = years
        .iter()
        .map(|y| {
            let cells: Vec<f64> = table.regions().iter().filter_map(|r| table.get(r, *y)).collect();
            (*y as f64, crate::util::average(&cells), cells.iter().sum())
        })
        .collect();
    let (first, last) = match (yearly.first(), yearly.last()) {
        (Some(f), Some(l)) => (*f, *l),
        _ => return Err(EngineError::incomplete(table.metric(), "<any year>")),
    };
    let total_change_pct = if first.2 != 0.0 {
        Some((last.2 - first.2) / first.2 * 100.0)
    } else {
        None
    };
    let yearly_slope = if yearly.len() >= 2 {
        let xs: Vec<f64> = yearly.iter().map(|t| t.0).collect();
        let ys: Vec<f64> = yearly.iter().map(|t| t.1).collect();
        linear_fit(&xs, &ys)?.slope
    } else {
        0.0
    };

    Ok(MetricInsight {
        metric: table.metric().to_string(),
        gap: highest.1 - lowest.1,
        highest,
        lowest,
        average,
        std_dev,
        disparity: Disparity::of(std_dev, average),
        mean_change: last.1 - first.1,
        total_change_pct,
        yearly_slope,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pearson_perfect_and_inverse() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [2.0, 4.0, 6.0, 8.0, 10.0];
        assert!((pearson(&x, &y).unwrap() - 1.0).abs() < 1e-12);
        let z = [5.0, 4.0, 3.0, 2.0, 1.0];
        assert!((pearson(&x, &z).unwrap() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pearson_constant_input_is_degenerate() {
        assert!(matches!(
            pearson(&[1.0, 2.0, 3.0], &[4.0, 4.0, 4.0]),
            Err(EngineError::DegenerateRange { .. })
        ));
        assert!(pearson(&[1.0], &[1.0]).is_err());
    }

    #[test]
    fn test_linear_fit_five_points() {
        let x = [2020.0, 2021.0, 2022.0, 2023.0, 2024.0];
        let y = [10.0, 12.0, 14.0, 16.0, 18.0];
        let fit = linear_fit(&x, &y).unwrap();
        assert!((fit.slope - 2.0).abs() < 1e-9);
        assert!((fit.at(2025.0) - 20.0).abs() < 1e-6);
    }

    #[test]
    fn test_strength_bands() {
        assert_eq!(Strength::of(0.7), Strength::Strong);
        assert_eq!(Strength::of(-0.71), Strength::Strong);
        assert_eq!(Strength::of(0.3), Strength::Moderate);
        assert_eq!(Strength::of(0.29), Strength::Weak);
    }

    #[test]
    fn test_correlate_named_scalars() {
        let x = RegionScalar::from_pairs("hospitals", [("A", 1.0), ("B", 2.0), ("C", 3.0)]);
        let y = RegionScalar::from_pairs("doctors", [("C", 30.0), ("A", 10.0), ("B", 20.0)]);
        let c = correlate(&x, &y).unwrap();
        assert!((c.r - 1.0).abs() < 1e-12);
        assert!((c.fit.slope - 10.0).abs() < 1e-9);
        assert_eq!(c.describe(), "강한 양의 상관관계");
    }

    #[test]
    fn test_correlate_mismatched_regions() {
        let x = RegionScalar::from_pairs("x", [("A", 1.0), ("B", 2.0)]);
        let y = RegionScalar::from_pairs("y", [("A", 1.0), ("C", 2.0)]);
        match correlate(&x, &y) {
            Err(EngineError::IncompleteInput { input, region }) => {
                assert_eq!(input, "y");
                assert_eq!(region, "C");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_metric_insight() {
        let mut t = RegionMetricTable::new("hospitals", 2020..=2021);
        t.insert("A", 2020, 10.0);
        t.insert("A", 2021, 30.0);
        t.insert("B", 2020, 10.0);
        t.insert("B", 2021, 10.0);
        let insight = metric_insight(&t).unwrap();
        assert_eq!(insight.highest, ("A".to_string(), 20.0));
        assert_eq!(insight.lowest, ("B".to_string(), 10.0));
        assert_eq!(insight.gap, 10.0);
        assert_eq!(insight.average, 15.0);
        assert_eq!(insight.mean_change, 10.0);
        assert_eq!(insight.total_change_pct, Some(100.0));
        assert!((insight.yearly_slope - 10.0).abs() < 1e-9);
        assert_eq!(insight.disparity, Disparity::Medium);
    }
}
