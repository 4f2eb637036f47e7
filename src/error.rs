// =============================================================================
// Scoring Errors: caller contract violations
// =============================================================================
//
// The core performs no I/O, so every error here means an input broke its
// contract. Missing history is never an error: each component has an explicit
// default for it. A `ScoreError` stops evaluation of one indicator for one
// pass and is surfaced as an ERROR verdict whose reason is the Display text.

use chrono::NaiveDate;
use thiserror::Error;

use crate::indicators::IndicatorId;
use crate::types::{FetchStatus, Signal};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoreError {
    #[error("{indicator} observation {observation_id} has non-finite computed value {value}")]
    NonFiniteValue {
        indicator: IndicatorId,
        observation_id: u64,
        value: f64,
    },

    #[error("{indicator} observation {observation_id} reports success but carries no computed value")]
    MissingValue {
        indicator: IndicatorId,
        observation_id: u64,
    },

    #[error("{indicator} observation {observation_id} carries a '{found}' payload")]
    PayloadMismatch {
        indicator: IndicatorId,
        observation_id: u64,
        found: &'static str,
    },

    #[error("{indicator} payload field '{field}' is invalid: {value}")]
    InvalidField {
        indicator: IndicatorId,
        field: &'static str,
        value: f64,
    },

    #[error("{indicator} observation {observation_id} has fetch status {status} but persisted signal {signal}")]
    ContradictorySignal {
        indicator: IndicatorId,
        observation_id: u64,
        status: FetchStatus,
        signal: Signal,
    },

    #[error("{indicator} cannot be derived: upstream {upstream} has no observation")]
    MissingUpstream {
        indicator: IndicatorId,
        upstream: IndicatorId,
    },

    #[error("{indicator} cannot be derived: upstream {upstream} fetch {status} for {data_date}")]
    FailedUpstream {
        indicator: IndicatorId,
        upstream: IndicatorId,
        status: FetchStatus,
        data_date: NaiveDate,
    },

    #[error("{indicator} observation {observation_id} was passed to the {scorer} scorer")]
    WrongScorer {
        indicator: IndicatorId,
        observation_id: u64,
        scorer: IndicatorId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_indicator_and_numbers() {
        let e = ScoreError::NonFiniteValue {
            indicator: IndicatorId::MarginLevel,
            observation_id: 42,
            value: f64::NAN,
        };
        let msg = e.to_string();
        assert!(msg.contains("margin_level"));
        assert!(msg.contains("42"));
        assert!(msg.contains("NaN"));
    }

    #[test]
    fn missing_upstream_names_both_sides() {
        let e = ScoreError::MissingUpstream {
            indicator: IndicatorId::LeaseRate,
            upstream: IndicatorId::Backwardation,
        };
        assert_eq!(
            e.to_string(),
            "lease_rate cannot be derived: upstream backwardation has no observation"
        );
    }
}
