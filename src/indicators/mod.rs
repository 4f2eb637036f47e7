// =============================================================================
// Indicators Module
// =============================================================================
//
// The fixed set of twelve market indicators tracked per metal, with their
// cadence, units and cross-indicator dependencies.

pub mod registry;

pub use registry::{catalogue, Cadence, Domain, IndicatorId, IndicatorInfo};
