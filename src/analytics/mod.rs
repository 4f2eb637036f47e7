// =============================================================================
// Analytics Module
// =============================================================================
//
// Pure, side-effect-free numeric helpers shared by the scorers: empirical
// percentile ranking and week-over-week trend. Missing history always has a
// defined neutral answer rather than an error.

pub mod percentile;
pub mod trend;

pub use percentile::{percentile_rank, BaselineStatus, PercentileBaseline, NEUTRAL_RANK};
pub use trend::{percent_change, trend, trend_between, Direction, Trend, WEEK_DAYS};
