//! Cohort analysis.
//!
//! Pure functions over a cohort: score aggregation, target comparison and
//! geographic distribution.

pub mod aggregator;
pub mod comparison;
pub mod distribution;

pub use aggregator::*;
pub use comparison::*;
pub use distribution::*;
