//! Ranking and rank-band bucketing.

use crate::error::{EngineError, Result};
use crate::types::{Direction, RankedScalar, RegionScalar, Tier};
use std::cmp::Ordering;

/// Regions sorted by value. The sort is stable, so equal values keep
/// their input order.
pub fn order_by_score(scalar: &RegionScalar, direction: Direction) -> Vec<(String, f64)> {
    let mut entries: Vec<(String, f64)> = scalar.iter().map(|(r, v)| (r.to_string(), v)).collect();
    entries.sort_by(|a, b| compare(a.1, b.1, direction));
    entries
}

fn compare(a: f64, b: f64, direction: Direction) -> Ordering {
    match direction {
        Direction::Ascending => a.total_cmp(&b),
        Direction::Descending => b.total_cmp(&a),
    }
}

/// Ranks 1..N with no gaps; ties go to the region that comes first in the
/// input. The output keeps the input's region order.
pub fn rank(scalar: &RegionScalar, direction: Direction) -> RankedScalar {
    let ordered = order_by_score(scalar, direction);
    let name = format!("{}_rank", scalar.name());
    let mut out = scalar.map_values(name, |_| 0.0);
    for (position, (region, _)) in ordered.iter().enumerate() {
        out.insert(region.as_str(), (position + 1) as f64);
    }
    RankedScalar {
        direction,
        scalar: out,
    }
}

/// Rank cut points: positions `1..=top` are `Tier::Top`, `top+1..=middle`
/// are `Tier::Middle`, everything after is `Tier::Bottom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierCuts {
    top: usize,
    middle: usize,
}

impl TierCuts {
    pub fn new(top: usize, middle: usize) -> Result<Self> {
        if top > middle {
            return Err(EngineError::InvalidConfig(format!(
                "tier cut top ({}) exceeds middle ({})",
                top, middle
            )));
        }
        Ok(Self { top, middle })
    }

    /// Cuts expressed as shares of a reference size, e.g. `5 / 17` and
    /// `10 / 17`, scaled to `regions` and rounded to the nearest position.
    pub fn proportional(regions: usize, top: usize, middle: usize, of: usize) -> Self {
        let scale = |k: usize| (regions * k + of / 2) / of.max(1);
        let t = if regions > 0 { scale(top).max(1) } else { 0 };
        Self {
            top: t,
            middle: scale(middle).max(t),
        }
    }

    /// Top 5 / next 5 / remainder for seventeen regions, scaled otherwise.
    pub fn for_region_count(regions: usize) -> Self {
        Self::proportional(regions, 5, 10, 17)
    }

    pub fn top(&self) -> usize {
        self.top
    }

    pub fn middle(&self) -> usize {
        self.middle
    }

    /// `position` is 1-based.
    pub fn tier_for(&self, position: usize) -> Tier {
        if position <= self.top {
            Tier::Top
        } else if position <= self.middle {
            Tier::Middle
        } else {
            Tier::Bottom
        }
    }
}

/// Ordered regions with their 1-based position and band.
pub fn bucket(ordered: &[(String, f64)], cuts: &TierCuts) -> Vec<(usize, String, f64, Tier)> {
    ordered
        .iter()
        .enumerate()
        .map(|(i, (region, value))| (i + 1, region.clone(), *value, cuts.tier_for(i + 1)))
        .collect()
}
