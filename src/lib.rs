//! Silver and gold market signal scoring.
//!
//! Twelve indicators are scored into traffic-light signals with a plain
//! reason each, resolved for display, combined into a market posture and
//! cross-checked by a short-squeeze ("slam") risk checklist.

pub mod analytics;
pub mod api;
pub mod app_state;
pub mod calendar;
pub mod display_state;
pub mod engine;
pub mod error;
pub mod indicators;
pub mod observation;
pub mod posture;
pub mod runtime_config;
pub mod scoring;
pub mod slam_risk;
pub mod types;
