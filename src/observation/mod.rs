// =============================================================================
// Observation Module
// =============================================================================
//
// Canonical observation record, the append-only per-series history, and the
// read-only accessors the evaluation engine consumes.

pub mod history;
pub mod model;
pub mod store;

pub use history::History;
pub use model::{
    success_values, DeliveryPressureRaw, DeliveryRaw, LeaseRaw, MarginRaw, Observation,
    PositioningRaw, PremiumRaw, RangeRaw, RatioRaw, RawPayload, RollRaw, SpreadRaw, VaultRaw,
};
pub use store::{ObservationSource, ObservationStore, SeriesKey};
