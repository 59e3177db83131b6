//! Composite indicator engine for regional health and socioeconomic data.
//!
//! Per-region metric tables are loaded from CSV ([`loader`]), reduced to
//! one value per region ([`reduce`]), normalized ([`normalize`]), combined
//! with validated weights ([`aggregate`]), ranked into tiers ([`rank`]) and
//! grouped into equal-width bins ([`classify`]). [`reports`] wires these
//! stages into the inequality, policy, clustering and insight reports.

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod error;
pub mod loader;
pub mod normalize;
pub mod output;
pub mod rank;
pub mod reduce;
pub mod reports;
pub mod stats;
pub mod types;
pub mod util;

pub use config::Config;
pub use error::{EngineError, Result};
pub use loader::{load_dataset, Dataset, LoadReport};
pub use types::{CompositeScore, Direction, Normalization, RegionMetricTable, RegionScalar};
