//! Weighted aggregation of normalized or ranked scalars.
//!
//! ```text
//! Composite(r) = Σ value_i(r) · weight_i,   Σ weight_i = 1
//! ```
//!
//! The same contract serves every level: domain sub-scores built from raw
//! ranks, and an overall score built from those sub-scores.

use crate::error::{EngineError, Result};
use crate::types::{AsScalar, CompositeScore, RegionScalar};
use tracing::debug;

/// Allowed drift of a weight set's sum from 1.0.
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Reject weight sets that are empty, negative, non-finite or that do not
/// sum to 1.0. Nothing is rescaled.
pub fn validate_weights(composite: &str, weights: impl IntoIterator<Item = f64>) -> Result<()> {
    let invalid = |reason: String| EngineError::InvalidWeights {
        composite: composite.to_string(),
        reason,
    };
    let mut sum = 0.0;
    let mut count = 0usize;
    for w in weights {
        if !w.is_finite() || w < 0.0 {
            return Err(invalid(format!("weight {} is not a non-negative number", w)));
        }
        sum += w;
        count += 1;
    }
    if count == 0 {
        return Err(invalid("no inputs".to_string()));
    }
    if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
        return Err(invalid(format!("weights sum to {:.6}, expected 1.0", sum)));
    }
    Ok(())
}

/// `n` equal weights of `1 / n`, for plain averages of ranks.
pub fn equal_weights(n: usize) -> Vec<f64> {
    vec![1.0 / n as f64; n]
}

/// Combine `(input, weight)` pairs into one composite score per region.
///
/// The region set and order come from the first input. Every other input
/// must cover exactly that set.
pub fn weighted_sum(name: &str, inputs: &[(&dyn AsScalar, f64)]) -> Result<CompositeScore> {
    validate_weights(name, inputs.iter().map(|(_, w)| *w))?;

    let base = inputs[0].0.as_scalar();
    if base.is_empty() {
        return Err(EngineError::incomplete(base.name(), "<any>"));
    }
    for (input, _) in inputs {
        let scalar = input.as_scalar();
        if let Some(extra) = scalar.regions().find(|r| !base.contains(r)) {
            return Err(EngineError::incomplete(scalar.name(), extra));
        }
    }

    let mut out = RegionScalar::new(name);
    for region in base.regions() {
        let mut total = 0.0;
        for (input, weight) in inputs {
            total += input.as_scalar().require(region)? * weight;
        }
        out.insert(region, total);
    }
    debug!("Composite '{}' over {} inputs, {} regions", name, inputs.len(), out.len());
    Ok(CompositeScore { scalar: out })
}

/// Equal-weight composite, e.g. the mean of several rank inputs.
pub fn mean_of(name: &str, inputs: &[&dyn AsScalar]) -> Result<CompositeScore> {
    let weights = equal_weights(inputs.len());
    let pairs: Vec<(&dyn AsScalar, f64)> = inputs.iter().copied().zip(weights).collect();
    weighted_sum(name, &pairs)
}
