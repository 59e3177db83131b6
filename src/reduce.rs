//! Collapsing a (region, year) table to one value per region.

use crate::error::{EngineError, Result};
use crate::types::{RegionMetricTable, RegionScalar, Year};
use crate::util::average;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Reduction {
    /// Mean over every year of the table.
    MeanOverYears,
    /// The value of one year.
    Year(Year),
}

pub fn reduce(table: &RegionMetricTable, reduction: Reduction) -> Result<RegionScalar> {
    match reduction {
        Reduction::MeanOverYears => mean_over_years(table),
        Reduction::Year(year) => year_value(table, year),
    }
}

pub fn mean_over_years(table: &RegionMetricTable) -> Result<RegionScalar> {
    let mut out = RegionScalar::new(table.metric());
    for region in table.regions() {
        let series = table.series(region);
        let values: Vec<f64> = series.iter().flatten().copied().collect();
        if values.len() != series.len() || values.is_empty() {
            return Err(EngineError::incomplete(table.metric(), region.as_str()));
        }
        out.insert(region.as_str(), average(&values));
    }
    Ok(out)
}

pub fn year_value(table: &RegionMetricTable, year: Year) -> Result<RegionScalar> {
    if !table.years().contains(&year) {
        return Err(EngineError::incomplete(
            format!("{}[{}]", table.metric(), year),
            "<all>",
        ));
    }
    let mut out = RegionScalar::new(table.metric());
    for region in table.regions() {
        let value = table
            .get(region, year)
            .ok_or_else(|| EngineError::incomplete(table.metric(), region.as_str()))?;
        out.insert(region.as_str(), value);
    }
    Ok(out)
}
